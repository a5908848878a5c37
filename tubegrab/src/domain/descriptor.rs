//! Cross-platform track descriptor.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A bare `{title, artist}` pair sourced from another platform. It has no
/// locator until the resolver finds one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackDescriptor {
    pub title: String,
    #[serde(default)]
    pub artist: String,
}

impl TrackDescriptor {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
        }
    }

    /// Query sent to the search capability: `"<title> <artist>"`.
    pub fn search_query(&self) -> String {
        format!("{} {}", self.title.trim(), self.artist.trim())
            .trim()
            .to_string()
    }

    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::validation("descriptor title must not be empty"));
        }
        Ok(())
    }
}
