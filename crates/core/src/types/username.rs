//! Username type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Username`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum UsernameError {
    /// Shorter than [`Username::MIN_LENGTH`].
    #[error("username must be at least {min} characters")]
    TooShort {
        /// Minimum allowed length.
        min: usize,
    },
    /// Longer than [`Username::MAX_LENGTH`].
    #[error("username must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// Contains a character outside `[A-Za-z0-9._-]`.
    #[error("username may only contain letters, digits, '.', '_' and '-'")]
    InvalidCharacter,
}

/// A login name.
///
/// Usernames are ASCII so they can be typed on any keyboard layout the shop's
/// Mongolian and Russian customers use. Case is preserved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    /// Minimum number of characters.
    pub const MIN_LENGTH: usize = 3;
    /// Maximum number of characters.
    pub const MAX_LENGTH: usize = 50;

    /// Parse a username.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is out of bounds or contains
    /// characters other than ASCII letters, digits, `.`, `_`, `-`.
    pub fn parse(s: &str) -> Result<Self, UsernameError> {
        let trimmed = s.trim();
        if trimmed.len() < Self::MIN_LENGTH {
            return Err(UsernameError::TooShort {
                min: Self::MIN_LENGTH,
            });
        }
        if trimmed.len() > Self::MAX_LENGTH {
            return Err(UsernameError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return Err(UsernameError::InvalidCharacter);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Build a username from arbitrary text, dropping invalid characters
    /// and padding short results.
    ///
    /// Used when an account is created from a Google profile.
    #[must_use]
    pub fn sanitized(raw: &str) -> Self {
        let mut cleaned: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
            .take(Self::MAX_LENGTH)
            .collect();
        while cleaned.len() < Self::MIN_LENGTH {
            cleaned.push('_');
        }
        Self(cleaned)
    }

    /// Returns the username as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Username {
    type Error = UsernameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Username> for String {
    fn from(username: Username) -> Self {
        username.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        assert_eq!(Username::parse(" bat_erdene ").unwrap().as_str(), "bat_erdene");
        assert!(Username::parse("a.b-c").is_ok());
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!(
            Username::parse("ab"),
            Err(UsernameError::TooShort { min: 3 })
        );
        assert_eq!(
            Username::parse(&"x".repeat(51)),
            Err(UsernameError::TooLong { max: 50 })
        );
        assert_eq!(
            Username::parse("Батаа"),
            Err(UsernameError::InvalidCharacter)
        );
    }

    #[test]
    fn test_sanitized_pads_and_filters() {
        assert_eq!(Username::sanitized("Бат").as_str(), "___");
        assert_eq!(Username::sanitized("bold+bat").as_str(), "boldbat");
    }
}
