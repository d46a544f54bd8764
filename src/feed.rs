/*!
 * Atom feed over a directory of gemtext files.
 */

use std::{ffi::OsStr, fs, path::Path};

use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use html_escape::{encode_double_quoted_attribute, encode_text};
use serde::{Deserialize, Serialize};
use tracing::{event, Level};
use url::Url;

use crate::util::{leading_date, site_url};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FeedMeta {
    pub title: String,
    pub subtitle: Option<String>,
    pub author: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FeedEntry {
    pub url: String,
    pub title: String,
    pub updated: DateTime<Utc>,
}

fn title_from_text(text: &str) -> Option<&str> {
    text.lines()
        .find_map(|l| l.strip_prefix("# "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Collects one entry per `*.gmi` file in `dir`, skipping `index.gmi`.
///
/// Entries are newest first. The date comes from a `YYYY-MM-DD` file name
/// prefix, or from the modification time, which the builder sets to the
/// source document's date.
pub fn collect_entries(dir: &Path, dir_url: &Url) -> anyhow::Result<Vec<FeedEntry>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Listing {}", dir.display()))? {
        let path = entry?.path();
        let name = match path.file_name().and_then(OsStr::to_str) {
            Some(name) => name,
            None => continue,
        };
        if path.extension() != Some(OsStr::new("gmi")) || name == "index.gmi" {
            continue;
        }
        let text =
            fs::read_to_string(&path).with_context(|| format!("Reading {}", path.display()))?;
        let updated = match leading_date(name) {
            Some(date) => date,
            None => fs::metadata(&path)?.modified()?.into(),
        };
        let title = match title_from_text(&text) {
            Some(title) => title.to_string(),
            None => name.trim_end_matches(".gmi").to_string(),
        };
        entries.push(FeedEntry {
            url: site_url(dir_url, name)?,
            title,
            updated,
        });
    }
    entries.sort_by(|a, b| b.updated.cmp(&a.updated).then_with(|| b.url.cmp(&a.url)));
    Ok(entries)
}

fn timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Serialises entries as an Atom 1.0 document.
pub fn to_atom(entries: &[FeedEntry], dir_url: &str, feed_url: &str, meta: &FeedMeta) -> String {
    let updated = entries
        .iter()
        .map(|e| e.updated)
        .max()
        .unwrap_or_else(Utc::now);

    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    xml.push_str("<feed xmlns=\"http://www.w3.org/2005/Atom\">\n");
    xml.push_str(&format!("  <id>{}</id>\n", encode_text(dir_url)));
    xml.push_str(&format!("  <title>{}</title>\n", encode_text(&meta.title)));
    if let Some(subtitle) = &meta.subtitle {
        xml.push_str(&format!("  <subtitle>{}</subtitle>\n", encode_text(subtitle)));
    }
    xml.push_str(&format!("  <updated>{}</updated>\n", timestamp(&updated)));
    if let Some(author) = &meta.author {
        xml.push_str(&format!(
            "  <author>\n    <name>{}</name>\n  </author>\n",
            encode_text(author)
        ));
    }
    xml.push_str(&format!(
        "  <link href=\"{}\" rel=\"self\"/>\n",
        encode_double_quoted_attribute(feed_url)
    ));
    xml.push_str(&format!(
        "  <link href=\"{}\" rel=\"alternate\"/>\n",
        encode_double_quoted_attribute(dir_url)
    ));
    for entry in entries {
        xml.push_str("  <entry>\n");
        xml.push_str(&format!("    <id>{}</id>\n", encode_text(&entry.url)));
        xml.push_str(&format!("    <title>{}</title>\n", encode_text(&entry.title)));
        xml.push_str(&format!("    <updated>{}</updated>\n", timestamp(&entry.updated)));
        xml.push_str(&format!(
            "    <link href=\"{}\" rel=\"alternate\"/>\n",
            encode_double_quoted_attribute(&entry.url)
        ));
        xml.push_str("  </entry>\n");
    }
    xml.push_str("</feed>\n");
    xml
}

/// Writes the feed for `dir` to `output`, keeping the newest `max_entries`.
pub fn generate(
    dir: &Path,
    dir_url: &Url,
    feed_url: &str,
    output: &Path,
    meta: &FeedMeta,
    max_entries: usize,
) -> anyhow::Result<()> {
    let mut entries = collect_entries(dir, dir_url)?;
    entries.truncate(max_entries);
    fs::write(output, to_atom(&entries, dir_url.as_str(), feed_url, meta))
        .with_context(|| format!("Writing {}", output.display()))?;
    event!(Level::INFO, r#type = "feed", path = ?output, entries = entries.len());
    Ok(())
}
