//! Tenant identifier shared across MagnetoDB crates.

use std::fmt;

/// Project (tenant) identifier. Every table name is scoped to one project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    /// Project used when a request does not name one.
    pub const DEFAULT: &'static str = "default";

    /// Maximum identifier length.
    pub const MAX_LEN: usize = 64;

    /// Create a new project id.
    ///
    /// # Errors
    /// Returns an error if the id is empty, longer than 64 characters, or
    /// contains characters outside `[a-zA-Z0-9_-]`.
    pub fn new(id: impl Into<String>) -> Result<Self, crate::MagnetoCoreError> {
        let id = id.into();
        let valid = !id.is_empty()
            && id.len() <= Self::MAX_LEN
            && id
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
        if !valid {
            return Err(crate::MagnetoCoreError::InvalidProjectId(id));
        }
        Ok(Self(id))
    }

    /// Get the project id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self(Self::DEFAULT.to_owned())
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for ProjectId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}
