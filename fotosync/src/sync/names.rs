use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const ACCEPTED_EXTENSIONS: [&str; 3] = [".jpg", ".jpeg", ".png"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("file name is empty")]
    Empty,
    #[error("file name contains a directory component: {0}")]
    HasDirectory(String),
    #[error("file name is not an accepted image: {0}")]
    NotAnImage(String),
}

/// Base name of an image file, the unit of work everywhere in the sync pipeline.
///
/// Case-sensitive; only the extension check ignores case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FileName(String);

impl FileName {
    pub fn parse(value: impl Into<String>) -> Result<Self, NameError> {
        let value = value.into();
        if value.is_empty() {
            return Err(NameError::Empty);
        }
        if value.contains(['/', '\\']) {
            return Err(NameError::HasDirectory(value));
        }
        if !is_accepted_image(&value) {
            return Err(NameError::NotAnImage(value));
        }
        Ok(Self(value))
    }

    /// Normalizes one line of a remote listing.
    ///
    /// Returns `None` for blank lines, directory headings (`dir:` or `dir/`) and
    /// anything that is not an accepted image.
    pub fn from_listing_line(line: &str) -> Option<Self> {
        let cleaned: String = line.chars().filter(|c| *c != '\0').collect();
        let cleaned = cleaned.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}');
        if cleaned.is_empty() || cleaned.ends_with(':') || cleaned.ends_with('/') {
            return None;
        }
        Self::parse(base_name(cleaned)).ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for FileName {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<FileName> for String {
    fn from(value: FileName) -> Self {
        value.0
    }
}

impl AsRef<str> for FileName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn is_accepted_image(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    ACCEPTED_EXTENSIONS
        .iter()
        .any(|ext| lower.len() > ext.len() && lower.ends_with(ext))
}

fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}
