//! Advertising identifier (ERID) value object.

use std::sync::LazyLock;

use chrono::Utc;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::OrderError;

static ERID_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[A-Z0-9-]{8,}$").expect("ERID format pattern is valid")
});

const BASE36_DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Prefix of locally synthesized identifiers.
pub const FALLBACK_PREFIX: &str = "ERID";

/// A validated advertising identifier.
///
/// Custom, authority-issued and fallback identifiers all pass the same
/// check: letters, digits and hyphens only, at least 8 characters,
/// case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Erid(String);

impl Erid {
    /// Validates and wraps an identifier. Surrounding whitespace is ignored.
    pub fn parse(value: &str) -> Result<Self, OrderError> {
        let trimmed = value.trim();
        if Self::is_valid(trimmed) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(OrderError::InvalidErid {
                value: value.to_string(),
            })
        }
    }

    /// Returns true if `value` passes the identifier format check.
    pub fn is_valid(value: &str) -> bool {
        ERID_FORMAT.is_match(value.trim())
    }

    /// Synthesizes an identifier locally, for when the compliance authority
    /// cannot be reached or returns nothing usable.
    ///
    /// Layout: `ERID-{unix millis}-{group base36}-{user base36}-{random}`.
    pub fn fallback(group_id: i64, user_id: Option<i64>) -> Self {
        let timestamp = Utc::now().timestamp_millis();
        let group_hash = to_base36(group_id.unsigned_abs());
        let user_hash = to_base36(user_id.unwrap_or(0).unsigned_abs());
        let mut rng = rand::thread_rng();
        let random: String = (0..6)
            .map(|_| BASE36_DIGITS[rng.gen_range(0..BASE36_DIGITS.len())] as char)
            .collect();

        Self(format!(
            "{FALLBACK_PREFIX}-{timestamp}-{group_hash:0>6}-{user_hash:0>6}-{random}"
        ))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Erid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Erid {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Erid {
    type Error = OrderError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Erid> for String {
    fn from(erid: Erid) -> Self {
        erid.0
    }
}

impl AsRef<str> for Erid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Uppercase radix-36 rendering of an unsigned integer.
fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36_DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}
