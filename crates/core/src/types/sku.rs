//! Stock keeping units.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Errors that can occur when parsing a [`Sku`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SkuError {
    /// The SKU is empty after trimming.
    #[error("SKU cannot be empty")]
    Empty,
    /// The SKU is too long.
    #[error("SKU must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The SKU contains characters other than letters, digits, `-`, `_` or `.`.
    #[error("SKU may only contain letters, digits, '-', '_' and '.'")]
    InvalidCharacters,
}

/// A stock keeping unit, unique across products and variants.
///
/// SKUs are trimmed and upper-cased so `ab-1` and `AB-1` collide.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Sku(String);

impl Sku {
    /// Maximum SKU length.
    pub const MAX_LENGTH: usize = 64;

    /// Parse and normalize a SKU.
    ///
    /// # Errors
    ///
    /// Returns a [`SkuError`] for empty, over-long or malformed input.
    pub fn parse(s: &str) -> Result<Self, SkuError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(SkuError::Empty);
        }
        if trimmed.len() > Self::MAX_LENGTH {
            return Err(SkuError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(SkuError::InvalidCharacters);
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Returns the SKU as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Sku {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes() {
        assert_eq!(Sku::parse(" tee-blk.l ").map(|s| s.to_string()), Ok("TEE-BLK.L".to_owned()));
    }

    #[test]
    fn test_parse_rejects() {
        assert_eq!(Sku::parse(""), Err(SkuError::Empty));
        assert_eq!(Sku::parse("A B"), Err(SkuError::InvalidCharacters));
        assert!(matches!(
            Sku::parse(&"X".repeat(65)),
            Err(SkuError::TooLong { max: 64 })
        ));
    }
}
