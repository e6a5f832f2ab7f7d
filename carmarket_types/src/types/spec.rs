use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single free-form specification attribute (engine, power, fuel, ...).
///
/// Listings carry these as loosely-typed JSON, so every accessor is total:
/// a value that cannot be coerced falls back to the caller's default.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum SpecValue {
    Number(f64),
    Text(String),
    Bool(bool),
    Null,
}

impl SpecValue {
    /// Numeric value, parsing text such as `"150"`. Non-finite numbers fall back.
    pub fn as_number_or(&self, default: f64) -> f64 {
        match self {
            SpecValue::Number(n) if n.is_finite() => *n,
            SpecValue::Text(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .unwrap_or(default),
            _ => default,
        }
    }

    /// Lower-cased string form. `Null` yields the default.
    pub fn as_lowercased_string_or(&self, default: &str) -> String {
        match self {
            SpecValue::Text(s) => s.to_lowercase(),
            SpecValue::Number(n) => n.to_string(),
            SpecValue::Bool(b) => b.to_string(),
            SpecValue::Null => default.to_string(),
        }
    }

    /// Number made of every ASCII digit found in a text descriptor,
    /// e.g. `"2.0 TDI"` -> `20`. Numbers pass through unchanged.
    pub fn as_digits_or(&self, default: f64) -> f64 {
        match self {
            SpecValue::Number(n) if n.is_finite() => *n,
            SpecValue::Text(s) => {
                let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
                digits.parse::<f64>().unwrap_or(default)
            }
            _ => default,
        }
    }
}

/// Key/value map of specification attributes attached to a listing.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct Specs(pub BTreeMap<String, SpecValue>);

impl Specs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&SpecValue> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: SpecValue) {
        self.0.insert(key.into(), value);
    }

    pub fn with(mut self, key: impl Into<String>, value: SpecValue) -> Self {
        self.insert(key, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn number_or(&self, key: &str, default: f64) -> f64 {
        self.get(key).map_or(default, |v| v.as_number_or(default))
    }

    pub fn text_or(&self, key: &str, default: &str) -> String {
        self.get(key)
            .map_or_else(|| default.to_string(), |v| v.as_lowercased_string_or(default))
    }

    pub fn digits_or(&self, key: &str, default: f64) -> f64 {
        self.get(key).map_or(default, |v| v.as_digits_or(default))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_from_text_and_number() {
        assert_eq!(SpecValue::Number(110.0).as_number_or(0.0), 110.0);
        assert_eq!(SpecValue::Text(" 150 ".into()).as_number_or(0.0), 150.0);
        assert_eq!(SpecValue::Text("150 hp".into()).as_number_or(0.0), 0.0);
        assert_eq!(SpecValue::Null.as_number_or(7.0), 7.0);
        assert_eq!(SpecValue::Bool(true).as_number_or(1.5), 1.5);
    }

    #[test]
    fn digits_extraction() {
        assert_eq!(SpecValue::Text("2.0 TDI".into()).as_digits_or(0.0), 20.0);
        assert_eq!(SpecValue::Text("1598 cc".into()).as_digits_or(0.0), 1598.0);
        assert_eq!(SpecValue::Text("electric".into()).as_digits_or(0.0), 0.0);
        assert_eq!(SpecValue::Number(1.6).as_digits_or(0.0), 1.6);
    }

    #[test]
    fn lowercased_strings() {
        assert_eq!(SpecValue::Text("Diesel".into()).as_lowercased_string_or(""), "diesel");
        assert_eq!(SpecValue::Number(6.0).as_lowercased_string_or(""), "6");
        assert_eq!(SpecValue::Null.as_lowercased_string_or("unknown"), "unknown");
    }

    #[test]
    fn specs_missing_key_uses_default() {
        let specs = Specs::new().with("fuel", SpecValue::Text("Petrol".into()));
        assert_eq!(specs.text_or("fuel", ""), "petrol");
        assert_eq!(specs.text_or("transmission", ""), "");
        assert_eq!(specs.number_or("power", 0.0), 0.0);
        assert_eq!(specs.digits_or("engine", 0.0), 0.0);
    }

    #[test]
    fn specs_deserialize_mixed_json() {
        let specs: Specs =
            serde_json::from_str(r#"{"power": 150, "engine": "2.0", "fuel": null, "awd": true}"#)
                .unwrap();
        assert_eq!(specs.get("power"), Some(&SpecValue::Number(150.0)));
        assert_eq!(specs.get("engine"), Some(&SpecValue::Text("2.0".into())));
        assert_eq!(specs.get("fuel"), Some(&SpecValue::Null));
        assert_eq!(specs.get("awd"), Some(&SpecValue::Bool(true)));
    }
}
