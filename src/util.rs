//! Path, URL and date helpers shared by the config and the build.

use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use regex::Regex;
use url::Url;

static DATE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4}-\d{2}-\d{2})").expect("valid date regex"));

/// Resolves config paths against the folder holding the config file.
pub trait PathHelper {
    /// Attempts to canonicalize the path, otherwise
    /// returns it as is.
    fn maybe_canonicalize(&self) -> PathBuf;
    /// Attempts to join the given path with self,
    /// unless self is an absolute path.
    fn maybe_suffix(&self, p: &Path) -> PathBuf;
}

impl PathHelper for Path {
    fn maybe_canonicalize(&self) -> PathBuf {
        self.canonicalize().unwrap_or_else(|_| self.to_path_buf())
    }
    fn maybe_suffix(&self, p: &Path) -> PathBuf {
        if self.is_absolute() {
            self.to_path_buf()
        } else {
            p.join(self)
        }
    }
}

/// Joins a `/` separated relative path onto `root`.
pub fn join_url_path(root: &Path, rel: &str) -> PathBuf {
    rel.split('/')
        .filter(|s| !s.is_empty())
        .fold(root.to_path_buf(), |acc, s| acc.join(s))
}

/// Midnight UTC of the `YYYY-MM-DD` date that `s` starts with.
///
/// Works for Jekyll post names (`2020-01-01-hello.md`) and front matter
/// dates (`2020-01-01 10:00:00 +0000`).
pub fn leading_date(s: &str) -> Option<DateTime<Utc>> {
    let date = DATE_PREFIX.captures(s.trim())?.get(1)?.as_str();
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

/// Appends the `/` separated `rel` to the path of `base`, percent-encoding
/// each segment.
pub fn site_url(base: &Url, rel: &str) -> anyhow::Result<String> {
    let mut url = base.clone();
    if url.path().is_empty() {
        url.set_path("/");
    }
    url.path_segments_mut()
        .map_err(|_| anyhow!("{} cannot be a base URL", base))?
        .pop_if_empty()
        .extend(rel.split('/').filter(|s| !s.is_empty()));
    Ok(url.into())
}
