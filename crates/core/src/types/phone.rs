//! Mobile number type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Phone`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    #[error("mobile number cannot be empty")]
    Empty,
    #[error("mobile number may only contain digits, spaces, dashes and a leading +")]
    InvalidCharacter,
    #[error("mobile number must have between {min} and {max} digits")]
    InvalidLength { min: usize, max: usize },
}

/// A mobile number, stored without separators.
///
/// Spaces and dashes are stripped, a single leading `+` is kept.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Phone(String);

impl Phone {
    pub const MIN_DIGITS: usize = 7;
    pub const MAX_DIGITS: usize = 15;

    /// Parse a mobile number.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, contains anything besides
    /// digits, spaces, dashes and a leading `+`, or has the wrong number of
    /// digits.
    pub fn parse(s: &str) -> Result<Self, PhoneError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PhoneError::Empty);
        }

        let (prefix, rest) = s
            .strip_prefix('+')
            .map_or(("", s), |rest| ("+", rest));

        let mut digits = String::with_capacity(rest.len() + 1);
        digits.push_str(prefix);
        for c in rest.chars() {
            match c {
                '0'..='9' => digits.push(c),
                ' ' | '-' => {}
                _ => return Err(PhoneError::InvalidCharacter),
            }
        }

        let count = digits.len() - prefix.len();
        if !(Self::MIN_DIGITS..=Self::MAX_DIGITS).contains(&count) {
            return Err(PhoneError::InvalidLength {
                min: Self::MIN_DIGITS,
                max: Self::MAX_DIGITS,
            });
        }

        Ok(Self(digits))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Phone {
    type Error = PhoneError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Phone> for String {
    fn from(phone: Phone) -> Self {
        phone.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strips_separators() {
        assert_eq!(Phone::parse("98765 43210").unwrap().as_str(), "9876543210");
        assert_eq!(
            Phone::parse("+91-98765-43210").unwrap().as_str(),
            "+919876543210"
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!(Phone::parse(""), Err(PhoneError::Empty));
        assert_eq!(Phone::parse("98765x3210"), Err(PhoneError::InvalidCharacter));
        assert_eq!(Phone::parse("++9876543210"), Err(PhoneError::InvalidCharacter));
        assert!(matches!(
            Phone::parse("12345"),
            Err(PhoneError::InvalidLength { .. })
        ));
        assert!(matches!(
            Phone::parse("1234567890123456"),
            Err(PhoneError::InvalidLength { .. })
        ));
    }
}
