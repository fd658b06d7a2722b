//! License plate number type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`PlateNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PlateNumberError {
    /// The input is empty after trimming.
    #[error("plate number cannot be empty")]
    Empty,
    /// The input is too long.
    #[error("plate number must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
}

/// A normalized license plate number.
///
/// Plates are the primary search key, so every plate is trimmed and
/// uppercased on the way in. `"gr-1234-24"` and `" GR-1234-24 "` parse to the
/// same value. Plates are not unique: many stories can share one plate.
///
/// ## Examples
///
/// ```
/// use sharerides_core::PlateNumber;
///
/// let plate = PlateNumber::parse("  gr-1234-24 ").unwrap();
/// assert_eq!(plate.as_str(), "GR-1234-24");
///
/// assert!(PlateNumber::parse("   ").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct PlateNumber(String);

impl PlateNumber {
    /// Maximum length of a plate number, in characters.
    pub const MAX_LENGTH: usize = 32;

    /// Parse and normalize a plate number.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty or longer than
    /// [`Self::MAX_LENGTH`] characters.
    pub fn parse(s: &str) -> Result<Self, PlateNumberError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(PlateNumberError::Empty);
        }
        if trimmed.chars().count() > Self::MAX_LENGTH {
            return Err(PlateNumberError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        Ok(Self(trimmed.to_uppercase()))
    }

    /// Returns the plate as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the plate and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for PlateNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for PlateNumber {
    type Err = PlateNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for PlateNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for PlateNumber {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for PlateNumber {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for PlateNumber {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uppercases_and_trims() {
        let plate = PlateNumber::parse(" gr-1234-24\t").unwrap();
        assert_eq!(plate.as_str(), "GR-1234-24");
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(PlateNumber::parse(""), Err(PlateNumberError::Empty));
        assert_eq!(PlateNumber::parse("  "), Err(PlateNumberError::Empty));
    }

    #[test]
    fn test_parse_too_long() {
        let long = "A".repeat(PlateNumber::MAX_LENGTH + 1);
        assert!(matches!(
            PlateNumber::parse(&long),
            Err(PlateNumberError::TooLong { .. })
        ));
        assert!(PlateNumber::parse(&"A".repeat(PlateNumber::MAX_LENGTH)).is_ok());
    }

    #[test]
    fn test_equal_after_normalization() {
        assert_eq!(
            PlateNumber::parse("abc 123").unwrap(),
            PlateNumber::parse("ABC 123 ").unwrap()
        );
    }
}
