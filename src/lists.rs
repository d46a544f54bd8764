use std::{fs, path::Path};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::links::prefix_root_relative;

/// One entry of a structured list such as `_data/projects.yml`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ListEntry {
    pub title: String,
    pub description: String,
    /// Project website
    pub url: Option<String>,
    /// Source repository
    pub github: Option<String>,
}

pub fn load(path: &Path) -> anyhow::Result<Vec<ListEntry>> {
    let s = fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    serde_yaml::from_str(&s).with_context(|| format!("Parsing {}", path.display()))
}

/// Renders entries in order, separated by blank lines.
pub fn render(entries: &[ListEntry], base_url: &Url) -> String {
    entries
        .iter()
        .map(|entry| {
            let mut lines = vec![
                format!("## {}", entry.title.trim()),
                entry.description.trim().to_string(),
            ];
            if let Some(url) = &entry.url {
                lines.push(format!("=> {} Website", prefix_root_relative(url, base_url)));
            }
            if let Some(github) = &entry.github {
                lines.push(format!("=> {} GitHub", prefix_root_relative(github, base_url)));
            }
            lines.join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
