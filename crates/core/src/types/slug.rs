//! URL slugs for products and categories.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Errors that can occur when parsing a [`Slug`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SlugError {
    /// Nothing slug-worthy was left after normalization.
    #[error("slug cannot be empty")]
    Empty,
    /// The slug is too long.
    #[error("slug must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The slug contains characters outside `[a-z0-9-]` or malformed dashes.
    #[error("slug may only contain lowercase letters, digits and single dashes")]
    InvalidCharacters,
}

/// A lower-case, dash-separated identifier used in URLs.
///
/// ```
/// use bazaar_core::Slug;
///
/// assert_eq!(Slug::from_name("Summer Sale: 50% Off!").unwrap().as_str(), "summer-sale-50-off");
/// assert!(Slug::parse("Bad Slug").is_err());
/// ```
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    /// Maximum slug length.
    pub const MAX_LENGTH: usize = 120;

    /// Parse an already-formed slug, rejecting anything not in canonical form.
    ///
    /// # Errors
    ///
    /// Returns a [`SlugError`] when the input is empty, too long or not canonical.
    pub fn parse(s: &str) -> Result<Self, SlugError> {
        if s.is_empty() {
            return Err(SlugError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(SlugError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        let canonical = s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
            && !s.starts_with('-')
            && !s.ends_with('-')
            && !s.contains("--");
        if !canonical {
            return Err(SlugError::InvalidCharacters);
        }
        Ok(Self(s.to_owned()))
    }

    /// Derive a slug from a display name.
    ///
    /// ASCII letters and digits are kept (lower-cased); every other run of
    /// characters collapses into a single dash.
    ///
    /// # Errors
    ///
    /// Returns [`SlugError::Empty`] if the name has no ASCII alphanumerics.
    pub fn from_name(name: &str) -> Result<Self, SlugError> {
        let mut out = String::with_capacity(name.len());
        let mut pending_dash = false;
        for c in name.chars() {
            if c.is_ascii_alphanumeric() {
                if pending_dash && !out.is_empty() {
                    out.push('-');
                }
                pending_dash = false;
                out.push(c.to_ascii_lowercase());
            } else {
                pending_dash = true;
            }
        }
        out.truncate(Self::MAX_LENGTH);
        let trimmed = out.trim_end_matches('-');
        Self::parse(trimmed)
    }

    /// Returns the slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the slug and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Slug {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_collapses_separators() {
        assert_eq!(
            Slug::from_name("  Men's   T-Shirts ").unwrap().as_str(),
            "men-s-t-shirts"
        );
        assert_eq!(Slug::from_name("Café Crème").unwrap().as_str(), "caf-cr-me");
    }

    #[test]
    fn test_from_name_without_alphanumerics() {
        assert_eq!(Slug::from_name("!!! ???"), Err(SlugError::Empty));
    }

    #[test]
    fn test_parse_requires_canonical_form() {
        assert!(Slug::parse("winter-coats-2026").is_ok());
        assert_eq!(Slug::parse("Winter"), Err(SlugError::InvalidCharacters));
        assert_eq!(Slug::parse("-lead"), Err(SlugError::InvalidCharacters));
        assert_eq!(Slug::parse("double--dash"), Err(SlugError::InvalidCharacters));
    }

    #[test]
    fn test_from_name_truncates() {
        let slug = Slug::from_name(&"ab ".repeat(100)).unwrap();
        assert!(slug.as_str().len() <= Slug::MAX_LENGTH);
        assert!(!slug.as_str().ends_with('-'));
    }
}
