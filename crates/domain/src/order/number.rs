//! Human-readable order numbers: `ORD-<8 digits>-<4 chars>`.

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};

use crate::ValidationError;

const PREFIX: &str = "ORD-";
const TIMESTAMP_DIGITS: usize = 8;
const TOKEN_LEN: usize = 4;

/// A globally unique, human-readable order number.
///
/// Uniqueness comes from the millisecond timestamp suffix plus a random
/// token; storage additionally enforces a unique constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Generates a new order number using the thread-local RNG.
    pub fn generate(now: DateTime<Utc>) -> Self {
        Self::generate_with(now, &mut rand::rng())
    }

    /// Generates a new order number from the given RNG.
    pub fn generate_with<R: Rng>(now: DateTime<Utc>, rng: &mut R) -> Self {
        let suffix = now.timestamp_millis().rem_euclid(100_000_000);
        let token: String = (0..TOKEN_LEN)
            .map(|_| char::from(rng.sample(Alphanumeric)).to_ascii_uppercase())
            .collect();
        Self(format!("{PREFIX}{suffix:08}-{token}"))
    }

    /// Parses an existing order number, checking its shape.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidOrderNumber(value.to_string());

        let rest = value.strip_prefix(PREFIX).ok_or_else(invalid)?;
        let (digits, token) = rest.split_once('-').ok_or_else(invalid)?;

        let digits_ok =
            digits.len() == TIMESTAMP_DIGITS && digits.chars().all(|c| c.is_ascii_digit());
        let token_ok = token.len() == TOKEN_LEN
            && token
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase());

        if digits_ok && token_ok {
            Ok(Self(value.to_string()))
        } else {
            Err(invalid())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn test_generated_number_has_expected_shape() {
        let number = OrderNumber::generate(Utc::now());
        assert_eq!(number.as_str().len(), "ORD-12345678-ABCD".len());
        assert!(OrderNumber::parse(number.as_str()).is_ok());
    }

    #[test]
    fn test_timestamp_suffix_is_last_eight_millis_digits() {
        let now = Utc.timestamp_millis_opt(1_700_000_123_456).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let number = OrderNumber::generate_with(now, &mut rng);
        assert!(number.as_str().starts_with("ORD-00123456-"));
    }

    #[test]
    fn test_token_is_uppercase_alphanumeric() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let number = OrderNumber::generate_with(Utc::now(), &mut rng);
            let token = number.as_str().rsplit('-').next().unwrap();
            assert!(
                token
                    .chars()
                    .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
            );
        }
    }

    #[test]
    fn test_parse_rejects_malformed_numbers() {
        for bad in [
            "",
            "ORD-1234-ABCD",
            "ORD-12345678-abcd",
            "ORD-12345678-ABCDE",
            "XYZ-12345678-ABCD",
            "ORD-1234567A-ABCD",
        ] {
            assert!(OrderNumber::parse(bad).is_err(), "{bad} should not parse");
        }
    }
}
