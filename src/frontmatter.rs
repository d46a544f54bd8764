use serde_yaml::{Mapping, Value};
use thiserror::Error;

/// Line that opens and closes a front matter block.
pub const DELIMITER: &str = "---";

#[derive(Debug, Error)]
pub enum FrontMatterError {
    #[error("front matter is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("front matter must be a mapping, found {0}")]
    NotAMapping(&'static str),
}

/// Front matter that can be parsed at the beginning of a Markdown file.
///
/// Keys are kept as written so fields the build doesn't know about still
/// travel with the record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrontMatter(Mapping);

impl FrontMatter {
    pub fn parse_from_str(s: &str) -> Result<Self, FrontMatterError> {
        if s.trim().is_empty() {
            return Ok(Self::default());
        }
        match serde_yaml::from_str::<Value>(s)? {
            Value::Null => Ok(Self::default()),
            Value::Mapping(m) => Ok(Self(m)),
            Value::Bool(_) => Err(FrontMatterError::NotAMapping("a boolean")),
            Value::Number(_) => Err(FrontMatterError::NotAMapping("a number")),
            Value::String(_) => Err(FrontMatterError::NotAMapping("a string")),
            Value::Sequence(_) => Err(FrontMatterError::NotAMapping("a sequence")),
            Value::Tagged(_) => Err(FrontMatterError::NotAMapping("a tagged value")),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Scalar value under `key` rendered as text.
    ///
    /// Nested sequences and mappings yield `None`.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn title(&self) -> Option<String> {
        self.get_str("title")
    }

    pub fn permalink(&self) -> Option<String> {
        self.get_str("permalink")
    }

    pub fn pdf(&self) -> Option<String> {
        self.get_str("pdf")
    }

    pub fn slides(&self) -> Option<String> {
        self.get_str("slides")
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Mapping> for FrontMatter {
    fn from(m: Mapping) -> Self {
        Self(m)
    }
}

/// Outcome of separating a document into front matter and body.
#[derive(Debug, PartialEq)]
pub enum Split {
    Parsed { front_matter: FrontMatter, body: String },
    /// Nothing to read.
    Empty,
    /// Unterminated front matter, or nothing after it.
    Invalid,
}

/// Splits a Jekyll style document.
///
/// Only the first `---` after the opening one closes the block, so rules
/// further down in the body are left alone.
pub fn split(text: &str) -> Result<Split, FrontMatterError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Split::Empty);
    }

    let lines: Vec<&str> = trimmed.lines().collect();
    if lines[0] != DELIMITER {
        return Ok(Split::Parsed {
            front_matter: FrontMatter::default(),
            body: trimmed.to_string(),
        });
    }

    let close = match lines[1..].iter().position(|l| *l == DELIMITER) {
        Some(i) => i + 1,
        None => return Ok(Split::Invalid),
    };
    let body = &lines[close + 1..];
    if body.is_empty() {
        return Ok(Split::Invalid);
    }

    let front_matter = FrontMatter::parse_from_str(&lines[1..close].join("\n"))?;
    Ok(Split::Parsed {
        front_matter,
        body: body.join("\n"),
    })
}
