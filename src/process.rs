/*!
 * Building the capsule: documents, index pages, list pages and the feed.
 */

use std::{
    ffi::OsStr,
    fs,
    path::Path,
};

use anyhow::{bail, Context};
use tracing::{event, instrument, Level};
use url::Url;

use crate::{
    config::{
        AttachmentMode, IndexStyle, ResolvedCategory, ResolvedConfig, ResolvedFeed, ResolvedList,
    },
    feed,
    frontmatter::{self, Split},
    gemini::GeminiOptions,
    library::{output_name, Builder, Record, SourceDocument},
    links::SiteLinks,
    lists,
    util::{join_url_path, site_url},
};

/// Places attachments referenced from front matter (`pdf`, `slides`).
pub struct Attachments<'a> {
    pub mode: AttachmentMode,
    pub source_root: &'a Path,
    /// Folder holding the index page that links the attachment
    pub output_dir: &'a Path,
    pub base_url: &'a Url,
}

impl Attachments<'_> {
    /// Returns the link target for `attachment`, copying the file if needed.
    pub fn place(&self, attachment: &str) -> anyhow::Result<String> {
        if Url::parse(attachment).is_ok() {
            return Ok(attachment.to_string());
        }
        match self.mode {
            AttachmentMode::Local => {
                let src = join_url_path(self.source_root, attachment);
                let file_name = src
                    .file_name()
                    .and_then(OsStr::to_str)
                    .with_context(|| format!("Attachment {:?} has no file name", attachment))?
                    .to_string();
                let dst = self.output_dir.join(&file_name);
                fs::copy(&src, &dst)
                    .with_context(|| format!("Copying {} to {}", src.display(), dst.display()))?;
                event!(Level::INFO, r#type = "copy", path = ?dst);
                Ok(file_name)
            }
            AttachmentMode::Absolute => Ok(format!(
                "{}/{}",
                self.base_url.as_str().trim_end_matches('/'),
                attachment.trim_start_matches('/')
            )),
        }
    }
}

/// Template text followed by one link line per written record.
///
/// Links are `base_url` plus the record's encoded output path.
pub fn listing_index(
    template: &str,
    records: &[Record],
    base_url: &Url,
) -> anyhow::Result<String> {
    let mut lines = Vec::with_capacity(records.len());
    for record in records {
        let path = match &record.gmi_path {
            Some(path) => path,
            None => continue,
        };
        let url = site_url(base_url, path)?;
        lines.push(match record.title() {
            Some(title) => format!("=> {} {}", url, title),
            None => format!("=> {}", url),
        });
    }
    Ok(format!("{}\n{}\n", template, lines.join("\n")))
}

/// Template text followed by every titled record in full.
pub fn aggregate_index(
    template: &str,
    records: &[Record],
    attachments: &Attachments<'_>,
) -> anyhow::Result<String> {
    let mut page = template.to_string();
    for record in records {
        let title = match record.title() {
            Some(title) => title,
            None => continue,
        };
        page.push_str(&format!("\n## {}\n\n", title));
        if !record.content.is_empty() {
            page.push_str(&record.content);
            page.push_str("\n\n");
        }
        let fm = &record.front_matter;
        for (attachment, label) in [(fm.pdf(), "Paper"), (fm.slides(), "Slides")] {
            if let Some(attachment) = attachment {
                page.push_str(&format!("=> {} {}\n", attachments.place(&attachment)?, label));
            }
        }
    }
    Ok(page)
}

fn read_template(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("Reading template {}", path.display()))
}

fn write_page(path: &Path, page: &str) -> anyhow::Result<()> {
    fs::write(path, page).with_context(|| format!("Writing {}", path.display()))?;
    event!(Level::INFO, r#type = "new", ?path);
    Ok(())
}

/// Builds the whole output tree
pub struct Processor {
    /// Stuff is derived from this
    config: ResolvedConfig,
}

impl Processor {
    pub fn new(config: ResolvedConfig) -> Self {
        Self { config }
    }

    pub fn build_site(&self, clean: bool) -> anyhow::Result<()> {
        if clean {
            self.clean()?;
        }
        self.prepare_output()?;

        let mut sources = Vec::with_capacity(self.config.categories.len());
        for category in &self.config.categories {
            event!(Level::INFO, r#type = "read", category = %category.name, source = ?category.source);
            sources.push((category, SourceDocument::read_dir(&category.source)?));
        }

        // Pages written in this run are linkable before any of them is converted.
        let mut links = SiteLinks::new(
            self.config.site.base_url.clone(),
            self.config.links.clone(),
        );
        for (category, docs) in &sources {
            if category.write_files {
                register_targets(&mut links, category, docs)?;
            }
        }
        let options = GeminiOptions {
            link_style: self.config.site.link_style,
            strip_html: self.config.site.strip_html,
            rewrite: Some(&links),
        };

        for (category, docs) in sources {
            self.render_category(category, docs, options)?;
        }
        for list in &self.config.lists {
            self.render_list(list)?;
        }
        self.copy_pages()?;
        if let Some(feed) = &self.config.feed {
            self.render_feed(feed)?;
        }
        Ok(())
    }

    fn clean(&self) -> anyhow::Result<()> {
        let roots = &self.config.roots;
        let out = &roots.output;
        for input in [&roots.source, &roots.templates, &roots.data] {
            if input.starts_with(out) {
                bail!(
                    "Refusing to clean {}: it contains input {}",
                    out.display(),
                    input.display()
                );
            }
        }
        if out.exists() {
            fs::remove_dir_all(out).with_context(|| format!("Removing {}", out.display()))?;
            event!(Level::INFO, r#type = "clean", path = ?out);
        }
        Ok(())
    }

    fn prepare_output(&self) -> anyhow::Result<()> {
        let out = &self.config.roots.output;
        let mut dirs = vec![out.clone()];
        dirs.extend(self.config.categories.iter().map(|c| out.join(&c.name)));
        dirs.extend(self.config.lists.iter().map(|l| out.join(&l.name)));
        if let Some(parent) = self
            .config
            .feed
            .as_ref()
            .and_then(|f| join_url_path(out, &f.output).parent().map(Path::to_path_buf))
        {
            dirs.push(parent);
        }
        for dir in dirs {
            fs::create_dir_all(&dir).with_context(|| format!("Creating {}", dir.display()))?;
        }
        Ok(())
    }

    #[instrument(name = "category", skip_all, fields(name = %category.name))]
    fn render_category(
        &self,
        category: &ResolvedCategory,
        docs: Vec<SourceDocument>,
        options: GeminiOptions<'_>,
    ) -> anyhow::Result<()> {
        let out_dir = self.config.roots.output.join(&category.name);
        let records = Builder::new(category.name.clone(), out_dir.clone(), options)
            .build(docs, category.write_files)?;
        event!(Level::INFO, r#type = "records", count = records.len());

        let template = read_template(&category.template)?;
        let page = match category.index {
            IndexStyle::Listing => {
                listing_index(&template, &records, &self.config.site.base_url)?
            }
            IndexStyle::Aggregate => {
                let attachments = Attachments {
                    mode: self.config.site.attachments,
                    source_root: &self.config.roots.source,
                    output_dir: &out_dir,
                    base_url: &self.config.site.base_url,
                };
                aggregate_index(&template, &records, &attachments)?
            }
        };
        write_page(&out_dir.join("index.gmi"), &page)
    }

    fn render_list(&self, list: &ResolvedList) -> anyhow::Result<()> {
        let entries = lists::load(&list.data)?;
        let template = read_template(&list.template)?;
        let page = format!(
            "{}\n{}\n",
            template,
            lists::render(&entries, &self.config.site.base_url)
        );
        write_page(
            &self.config.roots.output.join(&list.name).join("index.gmi"),
            &page,
        )
    }

    fn copy_pages(&self) -> anyhow::Result<()> {
        for page in &self.config.site.pages {
            let src = self.config.roots.templates.join(page);
            if !src.exists() {
                event!(Level::WARN, r#type = "missing_page", path = ?src);
                continue;
            }
            let dst = self.config.roots.output.join(page);
            if let Some(parent) = dst.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&src, &dst)
                .with_context(|| format!("Copying {} to {}", src.display(), dst.display()))?;
            event!(Level::INFO, r#type = "copy", path = ?dst);
        }
        Ok(())
    }

    fn render_feed(&self, feed: &ResolvedFeed) -> anyhow::Result<()> {
        let out = &self.config.roots.output;
        let base = &self.config.site.base_url;
        let dir_url = format!("{}/", site_url(base, &feed.category)?);
        let dir_url = Url::parse(&dir_url).with_context(|| format!("Feed URL {:?}", dir_url))?;
        feed::generate(
            &out.join(&feed.category),
            &dir_url,
            &site_url(base, &feed.output)?,
            &join_url_path(out, &feed.output),
            &feed.meta,
            feed.max_entries,
        )
    }
}

fn register_targets(
    links: &mut SiteLinks,
    category: &ResolvedCategory,
    docs: &[SourceDocument],
) -> anyhow::Result<()> {
    for doc in docs {
        let front_matter = match frontmatter::split(&doc.text)
            .with_context(|| format!("Front matter of {}", doc.path.display()))?
        {
            Split::Parsed { front_matter, .. } => front_matter,
            Split::Empty | Split::Invalid => continue,
        };
        if let (Some(permalink), Some(name)) =
            (front_matter.permalink(), output_name(&doc.path, &front_matter))
        {
            links.add_target(&permalink, &format!("{}/{}", category.name, name))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontmatter::FrontMatter;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn record(yaml: &str, content: &str, gmi_path: Option<&str>) -> Record {
        Record {
            source: PathBuf::from("x.md"),
            front_matter: FrontMatter::parse_from_str(yaml).unwrap(),
            content: content.into(),
            gmi_path: gmi_path.map(str::to_string),
        }
    }

    #[test]
    fn listing_links_each_written_record() {
        let records = vec![
            record("title: Second", "", Some("posts/second.gmi")),
            record("", "", Some("posts/untitled.gmi")),
            record("title: Data only", "", None),
        ];
        let base = Url::parse("gemini://example.org").unwrap();
        assert_eq!(
            listing_index("# Posts\n", &records, &base).unwrap(),
            "# Posts\n\n=> gemini://example.org/posts/second.gmi Second\n=> gemini://example.org/posts/untitled.gmi\n"
        );
    }

    #[test]
    fn listing_links_are_encoded_under_the_base_path() {
        let records = vec![record("title: Spaced", "", Some("posts/my post.gmi"))];
        let base = Url::parse("gemini://example.org/~user/").unwrap();
        assert_eq!(
            listing_index("", &records, &base).unwrap(),
            "\n=> gemini://example.org/~user/posts/my%20post.gmi Spaced\n"
        );
    }

    #[test]
    fn aggregate_copies_local_attachments() {
        let src = tempdir().unwrap();
        let out = tempdir().unwrap();
        fs::create_dir_all(src.path().join("assets/pdf")).unwrap();
        fs::write(src.path().join("assets/pdf/p.pdf"), "%PDF").unwrap();
        fs::write(src.path().join("assets/pdf/p-slides.pdf"), "%PDF").unwrap();
        let base = Url::parse("https://example.org").unwrap();
        let attachments = Attachments {
            mode: AttachmentMode::Local,
            source_root: src.path(),
            output_dir: out.path(),
            base_url: &base,
        };
        let records = vec![
            record(
                "title: A Paper\npdf: /assets/pdf/p.pdf\nslides: assets/pdf/p-slides.pdf",
                "Abstract.",
                None,
            ),
            record("pdf: /assets/pdf/ignored.pdf", "untitled", None),
        ];
        let page = aggregate_index("# Papers\n", &records, &attachments).unwrap();
        assert_eq!(
            page,
            "# Papers\n\n## A Paper\n\nAbstract.\n\n=> p.pdf Paper\n=> p-slides.pdf Slides\n"
        );
        assert!(out.path().join("p.pdf").exists());
        assert!(out.path().join("p-slides.pdf").exists());
    }

    #[test]
    fn aggregate_links_absolute_attachments() {
        let out = tempdir().unwrap();
        let base = Url::parse("https://example.org").unwrap();
        let attachments = Attachments {
            mode: AttachmentMode::Absolute,
            source_root: Path::new("/nonexistent"),
            output_dir: out.path(),
            base_url: &base,
        };
        let records = vec![record(
            "title: B\npdf: /assets/pdf/b.pdf\nslides: https://slides.example/b",
            "",
            None,
        )];
        let page = aggregate_index("", &records, &attachments).unwrap();
        assert_eq!(
            page,
            "\n## B\n\n=> https://example.org/assets/pdf/b.pdf Paper\n=> https://slides.example/b Slides\n"
        );
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[test]
    fn missing_local_attachment_is_an_error() {
        let src = tempdir().unwrap();
        let base = Url::parse("https://example.org").unwrap();
        let attachments = Attachments {
            mode: AttachmentMode::Local,
            source_root: src.path(),
            output_dir: src.path(),
            base_url: &base,
        };
        assert!(attachments.place("/assets/missing.pdf").is_err());
    }
}
