//! Validation boundary between raw service JSON and typed results.
//!
//! The generation service is trusted for transport but not for shape:
//! every terminal payload passes through a [`PayloadValidator`] before it
//! reaches a caller. Numeric fields the service sometimes renders as
//! strings (`id`, `minutes`) are coerced here rather than in callers.

use std::marker::PhantomData;

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serializer};

use crate::error::CoreError;

/// Turns an untyped payload into a validated, typed result.
pub trait PayloadValidator {
    type Output;

    fn validate(&self, payload: serde_json::Value) -> Result<Self::Output, CoreError>;
}

/// Validator that accepts exactly the payloads `T` deserializes from.
///
/// Unknown keys are ignored; missing or mistyped required keys fail.
pub struct SchemaValidator<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> SchemaValidator<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for SchemaValidator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned> PayloadValidator for SchemaValidator<T> {
    type Output = T;

    fn validate(&self, payload: serde_json::Value) -> Result<T, CoreError> {
        serde_json::from_value(payload).map_err(|e| CoreError::Validation(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Field coercion
// ---------------------------------------------------------------------------

/// Deserialize a number that may arrive as a JSON number or as a numeric
/// string (`"12"`, `" 7.5 "`). A blank string counts as `0`.
pub fn coerce_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(f64),
        Text(String),
    }

    let value = match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(n) => n,
        NumberOrText::Text(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed
                    .parse::<f64>()
                    .map_err(|_| D::Error::custom(format!("expected a number, got {text:?}")))?
            }
        }
    };

    if !value.is_finite() {
        return Err(D::Error::custom(format!("expected a finite number, got {value}")));
    }
    Ok(value)
}

/// Largest integer an `f64` holds exactly.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Serialize a number as a JSON integer when it has no fractional part,
/// so `1.0` goes out as `1`.
pub fn serialize_number<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if value.fract() == 0.0 && value.abs() <= MAX_EXACT_INTEGER {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}

/// Serialize a number as its shortest decimal string (`15.0` as `"15"`).
pub fn serialize_as_string<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(value)
}

// ---------------------------------------------------------------------------
// Payload clean-up helpers
// ---------------------------------------------------------------------------

/// Parse the leading base-10 integer of `input`, ignoring leading
/// whitespace and any trailing garbage. Returns `0` when no digits lead.
pub fn parse_leading_int(input: &str) -> i64 {
    let trimmed = input.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    match digits.parse::<i64>() {
        Ok(n) if negative => -n,
        Ok(n) => n,
        Err(_) => 0,
    }
}

/// Drop entries that are empty or whitespace-only.
pub fn drop_blank(items: &[String]) -> Vec<String> {
    items
        .iter()
        .filter(|item| !item.trim().is_empty())
        .cloned()
        .collect()
}

/// Reject a required text field that is empty or whitespace-only.
pub fn require_non_blank(field: &'static str, value: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::MissingField(field));
    }
    Ok(())
}
