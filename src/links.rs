//! Rewriting of root-relative links found in converted documents.

use std::collections::HashMap;

use url::Url;

use crate::{config::LinksConfig, util::site_url};

/// Hook applied to every link and image destination during conversion.
pub trait LinkRewrite {
    fn rewrite(&self, url: &str) -> String;
}

impl<F> LinkRewrite for F
where
    F: Fn(&str) -> String,
{
    fn rewrite(&self, url: &str) -> String {
        self(url)
    }
}

/// Prefixes `link` with `base` when it starts with `/`.
pub fn prefix_root_relative(link: &str, base: &Url) -> String {
    if link.starts_with('/') {
        format!("{}{}", base.as_str().trim_end_matches('/'), link)
    } else {
        link.to_string()
    }
}

/// `url` without its query and fragment.
fn path_part(url: &str) -> &str {
    let end = url.find(['#', '?']).unwrap_or(url.len());
    &url[..end]
}

fn target_key(url: &str) -> &str {
    path_part(url).trim_matches('/')
}

/// Link rules for a Jekyll site republished over Gemini.
///
/// Paper permalinks point at the PDF that is copied next to the papers
/// index, assets are mapped in at deploy time, and pages that were
/// generated in this run resolve to their `.gmi` file under the base URL.
/// Post links that cannot be resolved land on the posts listing.
pub struct SiteLinks {
    base_url: Url,
    prefixes: LinksConfig,
    targets: HashMap<String, String>,
}

impl SiteLinks {
    pub fn new(base_url: Url, prefixes: LinksConfig) -> Self {
        Self {
            base_url,
            prefixes,
            targets: HashMap::new(),
        }
    }

    /// Registers the generated file for a front matter permalink.
    ///
    /// `gmi_path` is relative to the output root.
    pub fn add_target(&mut self, permalink: &str, gmi_path: &str) -> anyhow::Result<()> {
        let url = site_url(&self.base_url, gmi_path)?;
        self.targets.insert(target_key(permalink).to_string(), url);
        Ok(())
    }

    fn is_family(url: &str, prefix: &str) -> bool {
        url.starts_with(prefix) && url.trim_end_matches('/') != prefix.trim_end_matches('/')
    }
}

impl LinkRewrite for SiteLinks {
    fn rewrite(&self, url: &str) -> String {
        if !url.starts_with('/') {
            return url.to_string();
        }
        let p = &self.prefixes;
        let path = path_part(url);
        if Self::is_family(path, &p.papers) {
            if path.ends_with(".pdf") {
                path.to_string()
            } else {
                format!("{}.pdf", path.trim_end_matches('/'))
            }
        } else if url.starts_with(&p.assets) {
            url.to_string()
        } else if let Some(target) = self.targets.get(target_key(url)) {
            target.clone()
        } else if url.starts_with(&p.posts) {
            prefix_root_relative(&p.posts_listing, &self.base_url)
        } else {
            prefix_root_relative(url, &self.base_url)
        }
    }
}
