/*!
 * Turning a directory of Jekyll documents into records.
 */

use std::{
    collections::HashMap,
    ffi::OsStr,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use tracing::{event, instrument, Level};
use walkdir::WalkDir;

use crate::{
    frontmatter::{self, FrontMatter, Split},
    gemini::{self, GeminiOptions},
    util::leading_date,
};

/// A Markdown source file, read once.
#[derive(Clone, Debug)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub text: String,
}

impl SourceDocument {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }

    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Reading {}", path.display()))?;
        Ok(Self::new(path, text))
    }

    /// Reads every `*.md` file directly inside `dir`.
    pub fn read_dir(dir: &Path) -> anyhow::Result<Vec<Self>> {
        let mut docs = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.with_context(|| format!("Listing {}", dir.display()))?;
            let path = entry.path();
            if entry.file_type().is_file() && path.extension() == Some(OsStr::new("md")) {
                docs.push(Self::read(path)?);
            }
        }
        Ok(docs)
    }

    pub fn file_name(&self) -> Option<&OsStr> {
        self.path.file_name()
    }
}

/// Front matter of one document plus what the build derived from it.
#[derive(Clone, Debug)]
pub struct Record {
    pub source: PathBuf,
    pub front_matter: FrontMatter,
    /// Converted body, without the title heading.
    pub content: String,
    /// Output file relative to the output root, when one was written.
    pub gmi_path: Option<String>,
}

impl Record {
    pub fn has_gmi(&self) -> bool {
        self.gmi_path.is_some()
    }

    pub fn title(&self) -> Option<String> {
        self.front_matter.title()
    }

    /// Publication date: front matter `date`, else the `YYYY-MM-DD` prefix
    /// of the source file name.
    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.front_matter
            .get_str("date")
            .and_then(|d| leading_date(&d))
            .or_else(|| {
                self.source
                    .file_name()
                    .and_then(OsStr::to_str)
                    .and_then(leading_date)
            })
    }
}

/// Name of the `.gmi` file generated for a document.
///
/// Uses the last segment of the `permalink` when there is one, otherwise
/// the source file's stem.
pub fn output_name(source: &Path, front_matter: &FrontMatter) -> Option<String> {
    let from_permalink = front_matter.permalink().and_then(|p| {
        p.split('/')
            .filter(|s| !s.is_empty())
            .last()
            .map(|s| s.trim_end_matches(".html").to_string())
    });
    let stem = match from_permalink {
        Some(s) if !s.is_empty() => s,
        _ => source.file_stem()?.to_str()?.to_string(),
    };
    Some(format!("{}.gmi", stem))
}

/// Converts the documents of one category.
pub struct Builder<'a> {
    category: String,
    output_dir: PathBuf,
    options: GeminiOptions<'a>,
}

impl<'a> Builder<'a> {
    /// `output_dir` is where files for `category` land; it must exist.
    pub fn new(
        category: impl Into<String>,
        output_dir: impl Into<PathBuf>,
        options: GeminiOptions<'a>,
    ) -> Self {
        Self {
            category: category.into(),
            output_dir: output_dir.into(),
            options,
        }
    }

    /// Builds records newest first (descending file name).
    ///
    /// Empty and malformed documents are skipped; I/O and YAML errors abort,
    /// and so do two documents claiming the same output file.
    pub fn build(
        &self,
        mut documents: Vec<SourceDocument>,
        write_files: bool,
    ) -> anyhow::Result<Vec<Record>> {
        documents.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
        let mut records = Vec::with_capacity(documents.len());
        let mut written = HashMap::new();
        for document in documents {
            if let Some(record) = self.build_one(document, write_files, &mut written)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    #[instrument(name = "document", skip_all, fields(path = %document.path.display()))]
    fn build_one(
        &self,
        document: SourceDocument,
        write_files: bool,
        written: &mut HashMap<String, PathBuf>,
    ) -> anyhow::Result<Option<Record>> {
        let (front_matter, body) = match frontmatter::split(&document.text)
            .with_context(|| format!("Front matter of {}", document.path.display()))?
        {
            Split::Parsed { front_matter, body } => (front_matter, body),
            Split::Empty => {
                event!(Level::WARN, r#type = "skip", reason = "empty");
                return Ok(None);
            }
            Split::Invalid => {
                event!(Level::WARN, r#type = "skip", reason = "invalid front matter");
                return Ok(None);
            }
        };

        let content = gemini::convert(&body, &self.options);
        let mut record = Record {
            source: document.path,
            front_matter,
            content,
            gmi_path: None,
        };

        if write_files {
            let name = output_name(&record.source, &record.front_matter)
                .with_context(|| format!("No output name for {}", record.source.display()))?;
            if let Some(first) = written.get(&name) {
                bail!(
                    "{} and {} both map to {}/{}",
                    first.display(),
                    record.source.display(),
                    self.category,
                    name
                );
            }
            written.insert(name.clone(), record.source.clone());
            let out_path = self.output_dir.join(&name);
            let gemtext = match record.title() {
                Some(title) => format!("# {}\n\n{}", title, record.content),
                None => record.content.clone(),
            };
            fs::write(&out_path, gemtext)
                .with_context(|| format!("Writing {}", out_path.display()))?;
            // the feed dates undated file names by mtime
            if let Some(date) = record.date() {
                fs::File::options()
                    .write(true)
                    .open(&out_path)
                    .and_then(|f| f.set_modified(date.into()))
                    .with_context(|| format!("Dating {}", out_path.display()))?;
            }
            event!(Level::INFO, r#type = "new", path = ?out_path);
            record.gmi_path = Some(format!("{}/{}", self.category, name));
        }

        Ok(Some(record))
    }
}
