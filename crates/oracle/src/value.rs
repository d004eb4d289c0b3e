//! The value type flowing through adapter graphs.

use serde::{Deserialize, Serialize};

/// A string-or-number value, matching the JSON shapes oracle specs and
/// adapter stores use on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GenericValue {
    Number(f64),
    Text(String),
}

impl GenericValue {
    /// Numeric view; parses text payloads that hold decimals.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            GenericValue::Number(n) => Some(*n),
            GenericValue::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Whether this value carries nothing submittable.
    pub fn is_empty(&self) -> bool {
        match self {
            GenericValue::Number(n) => !n.is_finite(),
            GenericValue::Text(s) => s.is_empty(),
        }
    }
}

impl std::fmt::Display for GenericValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenericValue::Number(n) => write!(f, "{n}"),
            GenericValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for GenericValue {
    fn from(n: f64) -> Self {
        GenericValue::Number(n)
    }
}

impl From<String> for GenericValue {
    fn from(s: String) -> Self {
        GenericValue::Text(s)
    }
}

impl From<&str> for GenericValue {
    fn from(s: &str) -> Self {
        GenericValue::Text(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untagged_json_round_trip() {
        let n: GenericValue = serde_json::from_str("42.5").unwrap();
        assert_eq!(n, GenericValue::Number(42.5));
        let s: GenericValue = serde_json::from_str("\"42.5\"").unwrap();
        assert_eq!(s, GenericValue::Text("42.5".to_string()));
        assert_eq!(n.as_f64(), s.as_f64());
    }

    #[test]
    fn emptiness() {
        assert!(GenericValue::Text(String::new()).is_empty());
        assert!(GenericValue::Number(f64::NAN).is_empty());
        assert!(!GenericValue::Text("0".to_string()).is_empty());
    }
}
