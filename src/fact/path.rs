//! Dotted field paths such as `Payout.PaymentMethod.Name`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A dotted path naming a fact and a field reached through it.
///
/// The first segment is the name the fact was registered under in a
/// [`FactContext`](super::FactContext); the remaining segments walk nested
/// records down to a terminal field.
///
/// Construction never fails so that rule builders stay infallible;
/// [`FieldPath::validate`] runs when a knowledge base is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct FieldPath {
    raw: String,
    segments: Vec<String>,
}

impl FieldPath {
    /// Parses a dotted path without validating it.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let segments = raw.split('.').map(|s| s.trim().to_string()).collect();
        Self { raw, segments }
    }

    /// The path exactly as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// All segments, root fact name first.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Name of the fact this path starts from.
    #[must_use]
    pub fn root(&self) -> &str {
        self.segments.first().map_or("", String::as_str)
    }

    /// Nested record names between the root and the terminal field.
    #[must_use]
    pub fn intermediate(&self) -> &[String] {
        match self.segments.len() {
            0..=2 => &[],
            n => &self.segments[1..n - 1],
        }
    }

    /// The terminal field name.
    #[must_use]
    pub fn field(&self) -> &str {
        if self.segments.len() < 2 {
            return "";
        }
        self.segments.last().map_or("", String::as_str)
    }

    /// The path without its terminal field, e.g. `Payout.PaymentMethod`.
    #[must_use]
    pub fn parent(&self) -> String {
        let n = self.segments.len().saturating_sub(1);
        self.segments[..n].join(".")
    }

    /// Checks that the path names a fact and at least one field, and that no
    /// segment is empty or contains whitespace.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.segments.len() < 2 {
            return Err(ValidationError::InvalidFieldPath {
                path: self.raw.clone(),
                reason: "expected <Fact>.<Field>".to_string(),
            });
        }
        for segment in &self.segments {
            if segment.is_empty() {
                return Err(ValidationError::InvalidFieldPath {
                    path: self.raw.clone(),
                    reason: "empty segment".to_string(),
                });
            }
            if segment.chars().any(char::is_whitespace) {
                return Err(ValidationError::InvalidFieldPath {
                    path: self.raw.clone(),
                    reason: format!("segment '{segment}' contains whitespace"),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<String> for FieldPath {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for FieldPath {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.raw
    }
}
