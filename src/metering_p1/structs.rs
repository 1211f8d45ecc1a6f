use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{BreakerState, ChannelKind, ProtocolProfile, Tariff};
use super::FieldError;

/// A single decoded value
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
    Tariff(Tariff),
    Breaker(BreakerState),
    Channel(ChannelKind),
    Log(BTreeMap<NaiveDateTime, i64>),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Field name -> decoded value for one telegram
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(transparent)]
pub struct FlatFieldMap {
    fields: BTreeMap<String, FieldValue>,
}

impl FlatFieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: FieldValue) {
        self.fields.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(FieldValue::as_f64)
    }

    pub fn i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(FieldValue::as_i64)
    }

    pub fn text(&self, key: &str) -> Option<String> {
        self.get(key).and_then(FieldValue::as_str).map(|s| s.to_string())
    }

    pub fn timestamp(&self, key: &str) -> Option<NaiveDateTime> {
        match self.get(key) {
            Some(FieldValue::Timestamp(t)) => Some(*t),
            _ => None,
        }
    }

    pub fn tariff(&self, key: &str) -> Option<Tariff> {
        match self.get(key) {
            Some(FieldValue::Tariff(t)) => Some(*t),
            _ => None,
        }
    }

    pub fn breaker(&self, key: &str) -> Option<BreakerState> {
        match self.get(key) {
            Some(FieldValue::Breaker(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn channel(&self, key: &str) -> Option<ChannelKind> {
        match self.get(key) {
            Some(FieldValue::Channel(c)) => Some(*c),
            _ => None,
        }
    }

    pub fn log(&self, key: &str) -> Option<BTreeMap<NaiveDateTime, i64>> {
        match self.get(key) {
            Some(FieldValue::Log(l)) => Some(l.clone()),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }
}

/// Per-telegram decoding context
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DecoderConfig {
    pub profile: ProtocolProfile,
}

impl DecoderConfig {
    pub fn new(profile: ProtocolProfile) -> Self {
        DecoderConfig { profile }
    }
}

pub type TokenFn = fn(&str, &DecoderConfig) -> Result<FieldValue, FieldError>;
pub type TokensFn = fn(&[String], &DecoderConfig) -> Result<FieldValue, FieldError>;

#[derive(Clone, Copy)]
pub enum Conversion {
    /// Takes the token at the rule's position
    Token(TokenFn),
    /// Takes every token of the line
    AllTokens(TokensFn),
}

/// How one token position of a reference line is decoded.
/// A rule without a field only holds its position.
#[derive(Clone)]
pub struct DecodeRule {
    pub field: Option<String>,
    pub conversion: Conversion,
}

impl DecodeRule {
    pub fn token(field: &str, f: TokenFn) -> Self {
        DecodeRule { field: Some(field.to_string()), conversion: Conversion::Token(f) }
    }

    pub fn all_tokens(field: &str, f: TokensFn) -> Self {
        DecodeRule { field: Some(field.to_string()), conversion: Conversion::AllTokens(f) }
    }

    pub fn skip() -> Self {
        DecodeRule { field: None, conversion: Conversion::Token(|_, _| Ok(FieldValue::Integer(0))) }
    }

    pub fn consumes_all_tokens(&self) -> bool {
        matches!(self.conversion, Conversion::AllTokens(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_map_accessors() {
        let mut map = FlatFieldMap::new();
        map.insert("power", FieldValue::Float(276.0));
        map.insert("failures_short", FieldValue::Integer(2));
        map.insert("id", FieldValue::Text("E0045004014698317".to_string()));

        assert_eq!(map.f64("power"), Some(276.0));
        assert_eq!(map.f64("failures_short"), Some(2.0));
        assert_eq!(map.i64("power"), None);
        assert_eq!(map.text("id").as_deref(), Some("E0045004014698317"));
        assert!(map.contains("id"));
        assert!(!map.contains("tariff"));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_skip_rule_has_no_field() {
        let rule = DecodeRule::skip();
        assert!(rule.field.is_none());
        assert!(!rule.consumes_all_tokens());
    }
}
