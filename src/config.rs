use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{feed::FeedMeta, gemini::LinkStyle, util::PathHelper};

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    // Basic roots
    pub roots: RootsConfig,
    // Site wide settings
    pub site: SiteConfig,
    // Link rewriting
    #[serde(default)]
    pub links: LinksConfig,
    /// Document categories
    ///
    /// If empty, defaults to posts (one file each plus a listing) and
    /// papers (a single aggregated page)
    #[serde(default)]
    pub categories: Vec<CategoryConfig>,
    // Structured list pages
    #[serde(default)]
    pub lists: Vec<ListConfig>,
    // Atom feed
    pub feed: Option<FeedConfig>,
}

pub struct ResolvedConfig {
    pub roots: ResolvedRootsConfig,
    pub site: ResolvedSiteConfig,
    pub links: LinksConfig,
    pub categories: Vec<ResolvedCategory>,
    pub lists: Vec<ResolvedList>,
    pub feed: Option<ResolvedFeed>,
}

impl Config {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let s = fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
        toml::from_str(&s).with_context(|| format!("Parsing {}", path.display()))
    }

    pub fn resolve(self, config_folder: &Path) -> anyhow::Result<ResolvedConfig> {
        let roots = self.roots.resolve(config_folder);
        let site = self.site.resolve()?;
        let categories = if self.categories.is_empty() {
            CategoryConfig::defaults()
        } else {
            self.categories
        };
        let categories = categories
            .into_iter()
            .map(|c| c.resolve(&roots, config_folder))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let lists = self
            .lists
            .into_iter()
            .map(|l| l.resolve(&roots, config_folder))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let feed = self.feed.map(FeedConfig::resolve);

        let resolved = ResolvedConfig {
            roots,
            site,
            links: self.links,
            categories,
            lists,
            feed,
        };
        resolved.validate()?;
        Ok(resolved)
    }
}

impl ResolvedConfig {
    fn validate(&self) -> anyhow::Result<()> {
        let mut names = HashSet::new();
        for name in self
            .categories
            .iter()
            .map(|c| &c.name)
            .chain(self.lists.iter().map(|l| &l.name))
        {
            if !names.insert(name) {
                bail!("Output folder {:?} is used twice", name);
            }
        }
        for category in &self.categories {
            if category.index == IndexStyle::Listing && !category.write_files {
                bail!(
                    "Category {:?} is a listing but writes no files to list",
                    category.name
                );
            }
        }
        if let Some(feed) = &self.feed {
            match self.categories.iter().find(|c| c.name == feed.category) {
                Some(c) if c.write_files => {}
                Some(_) => bail!("Feed category {:?} writes no files", feed.category),
                None => bail!("Feed category {:?} is not configured", feed.category),
            }
        }
        Ok(())
    }
}

fn check_name(name: &str) -> anyhow::Result<()> {
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        bail!("{:?} is not usable as a folder name", name);
    }
    Ok(())
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RootsConfig {
    /// Jekyll source root
    pub source: PathBuf,
    /// Gemtext templates root
    pub templates: PathBuf,
    /// Output root
    pub output: PathBuf,
    /// Structured data root
    ///
    /// If none, defaults to the _data folder in the source root
    pub data: Option<PathBuf>,
}

pub struct ResolvedRootsConfig {
    pub source: PathBuf,
    pub templates: PathBuf,
    pub output: PathBuf,
    pub data: PathBuf,
}

impl RootsConfig {
    pub fn resolve(self, config_location: &Path) -> ResolvedRootsConfig {
        let source = self
            .source
            .maybe_suffix(config_location)
            .maybe_canonicalize();
        ResolvedRootsConfig {
            data: self
                .data
                .map(|x| x.maybe_suffix(config_location))
                .unwrap_or_else(|| source.join("_data"))
                .maybe_canonicalize(),
            templates: self
                .templates
                .maybe_suffix(config_location)
                .maybe_canonicalize(),
            output: self
                .output
                .maybe_suffix(config_location)
                .maybe_canonicalize(),
            source,
        }
    }
}

/// How attachments (paper PDFs, slides) are linked.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AttachmentMode {
    /// Copy next to the index and link by file name.
    #[default]
    Local,
    /// Link to the base URL; files are served from elsewhere.
    Absolute,
}

fn default_true() -> bool {
    true
}

fn default_pages() -> Vec<PathBuf> {
    vec![PathBuf::from("index.gmi")]
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SiteConfig {
    /// Base URL, e.g. gemini://example.org
    pub base_url: String,
    #[serde(default)]
    pub attachments: AttachmentMode,
    #[serde(default)]
    pub link_style: LinkStyle,
    #[serde(default = "default_true")]
    pub strip_html: bool,
    /// Templates copied as they are, relative to the templates root
    #[serde(default = "default_pages")]
    pub pages: Vec<PathBuf>,
}

pub struct ResolvedSiteConfig {
    pub base_url: Url,
    pub attachments: AttachmentMode,
    pub link_style: LinkStyle,
    pub strip_html: bool,
    pub pages: Vec<PathBuf>,
}

impl SiteConfig {
    pub fn resolve(self) -> anyhow::Result<ResolvedSiteConfig> {
        let base_url = Url::parse(&self.base_url)
            .with_context(|| format!("Base URL {:?}", self.base_url))?;
        if base_url.cannot_be_a_base() {
            bail!("Base URL {:?} cannot have paths appended", self.base_url);
        }
        for page in &self.pages {
            if page.is_absolute() {
                bail!("Page {} must be relative to the templates root", page.display());
            }
        }
        Ok(ResolvedSiteConfig {
            base_url,
            attachments: self.attachments,
            link_style: self.link_style,
            strip_html: self.strip_html,
            pages: self.pages,
        })
    }
}

/// URL prefixes that select a rewrite rule.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct LinksConfig {
    pub papers: String,
    pub posts: String,
    pub assets: String,
    /// Where unresolved post links go
    pub posts_listing: String,
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            papers: "/papers/".into(),
            posts: "/posts/".into(),
            assets: "/assets/".into(),
            posts_listing: "/posts/".into(),
        }
    }
}

/// Index page shape for a category.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum IndexStyle {
    /// One link line per document
    #[default]
    Listing,
    /// Every document's title, content and attachments on one page
    Aggregate,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CategoryConfig {
    /// Output folder name
    pub name: String,
    /// Markdown folder
    ///
    /// If none, defaults to the _<name> folder in the source root
    pub source: Option<PathBuf>,
    /// Index template
    ///
    /// If none, defaults to <name>.gmi in the templates root
    pub template: Option<PathBuf>,
    #[serde(default)]
    pub index: IndexStyle,
    #[serde(default = "default_true")]
    pub write_files: bool,
}

pub struct ResolvedCategory {
    pub name: String,
    pub source: PathBuf,
    pub template: PathBuf,
    pub index: IndexStyle,
    pub write_files: bool,
}

impl CategoryConfig {
    pub fn defaults() -> Vec<Self> {
        vec![
            Self {
                name: "posts".into(),
                source: None,
                template: None,
                index: IndexStyle::Listing,
                write_files: true,
            },
            Self {
                name: "papers".into(),
                source: None,
                template: None,
                index: IndexStyle::Aggregate,
                write_files: false,
            },
        ]
    }

    pub fn resolve(
        self,
        roots: &ResolvedRootsConfig,
        config_folder: &Path,
    ) -> anyhow::Result<ResolvedCategory> {
        check_name(&self.name)?;
        Ok(ResolvedCategory {
            source: self
                .source
                .map(|x| x.maybe_suffix(config_folder))
                .unwrap_or_else(|| roots.source.join(format!("_{}", self.name)))
                .maybe_canonicalize(),
            template: self
                .template
                .map(|x| x.maybe_suffix(config_folder))
                .unwrap_or_else(|| roots.templates.join(format!("{}.gmi", self.name)))
                .maybe_canonicalize(),
            index: self.index,
            write_files: self.write_files,
            name: self.name,
        })
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ListConfig {
    /// Output folder name
    pub name: String,
    /// YAML list
    ///
    /// If none, defaults to <name>.yml in the data root
    pub data: Option<PathBuf>,
    /// Page template
    ///
    /// If none, defaults to <name>.gmi in the templates root
    pub template: Option<PathBuf>,
}

pub struct ResolvedList {
    pub name: String,
    pub data: PathBuf,
    pub template: PathBuf,
}

impl ListConfig {
    pub fn resolve(
        self,
        roots: &ResolvedRootsConfig,
        config_folder: &Path,
    ) -> anyhow::Result<ResolvedList> {
        check_name(&self.name)?;
        Ok(ResolvedList {
            data: self
                .data
                .map(|x| x.maybe_suffix(config_folder))
                .unwrap_or_else(|| roots.data.join(format!("{}.yml", self.name)))
                .maybe_canonicalize(),
            template: self
                .template
                .map(|x| x.maybe_suffix(config_folder))
                .unwrap_or_else(|| roots.templates.join(format!("{}.gmi", self.name)))
                .maybe_canonicalize(),
            name: self.name,
        })
    }
}

fn default_feed_category() -> String {
    "posts".into()
}

fn default_max_entries() -> usize {
    10
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FeedConfig {
    #[serde(default = "default_feed_category")]
    pub category: String,
    /// Feed location relative to the output root
    ///
    /// If none, defaults to atom.xml in the category's folder
    pub output: Option<String>,
    pub title: String,
    pub subtitle: Option<String>,
    pub author: Option<String>,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

pub struct ResolvedFeed {
    pub category: String,
    /// Relative to the output root, `/` separated
    pub output: String,
    pub meta: FeedMeta,
    pub max_entries: usize,
}

impl FeedConfig {
    pub fn resolve(self) -> ResolvedFeed {
        ResolvedFeed {
            output: self
                .output
                .map(|o| o.trim_start_matches('/').to_string())
                .unwrap_or_else(|| format!("{}/atom.xml", self.category)),
            meta: FeedMeta {
                title: self.title,
                subtitle: self.subtitle,
                author: self.author,
            },
            max_entries: self.max_entries,
            category: self.category,
        }
    }
}
