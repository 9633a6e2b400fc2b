//! Typed connection properties.
//!
//! Databases store every property as text. Text is converted with the rules
//! below, in order:
//! - empty text (or `None`/`null`) becomes [`PropertyValue::Null`]
//! - text wrapped in matching quotes is kept verbatim without the quotes
//! - `true`/`false` in any case become [`PropertyValue::Bool`]
//! - integers and floats become [`PropertyValue::Int`] / [`PropertyValue::Float`]
//! - `LF`, `CR` and their concatenations (`CRLF`, `CR+LF`, ...) become the
//!   termination bytes they name
//! - anything else is [`PropertyValue::Text`]

use crate::constants::{CR, LF};
use crate::database::DatabaseError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Connection properties keyed by name
pub type Properties = BTreeMap<String, PropertyValue>;

/// A single connection property value
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// No value
    Null,
    /// Boolean flag
    Bool(bool),
    /// Integer
    Int(i64),
    /// Floating-point number
    Float(f64),
    /// Line-termination byte sequence
    Bytes(Vec<u8>),
    /// Free text
    Text(String),
}

impl PropertyValue {
    /// Convert database text into a typed value
    pub fn parse(raw: &str) -> Self {
        let text = raw.trim();
        if text.is_empty()
            || text.eq_ignore_ascii_case("none")
            || text.eq_ignore_ascii_case("null")
        {
            return PropertyValue::Null;
        }
        if let Some(inner) = strip_quotes(text) {
            return PropertyValue::Text(inner.to_string());
        }
        if text.eq_ignore_ascii_case("true") {
            return PropertyValue::Bool(true);
        }
        if text.eq_ignore_ascii_case("false") {
            return PropertyValue::Bool(false);
        }
        if let Ok(i) = text.parse::<i64>() {
            return PropertyValue::Int(i);
        }
        if text.chars().any(|c| c.is_ascii_digit()) {
            if let Ok(f) = text.parse::<f64>() {
                return PropertyValue::Float(f);
            }
        }
        if let Some(bytes) = parse_termination(text) {
            return PropertyValue::Bytes(bytes);
        }
        PropertyValue::Text(text.to_string())
    }

    /// Convert a JSON value produced by [`PropertyValue::to_json`]
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => PropertyValue::Null,
            Value::Bool(b) => PropertyValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => PropertyValue::Int(i),
                None => PropertyValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => match parse_termination(s) {
                Some(bytes) => PropertyValue::Bytes(bytes),
                None => PropertyValue::Text(s.clone()),
            },
            other => PropertyValue::Text(other.to_string()),
        }
    }

    /// JSON form; termination bytes are written as their `CR`/`LF` token
    pub fn to_json(&self) -> Value {
        match self {
            PropertyValue::Null => Value::Null,
            PropertyValue::Bool(b) => Value::Bool(*b),
            PropertyValue::Int(i) => Value::from(*i),
            PropertyValue::Float(f) => Value::from(*f),
            PropertyValue::Bytes(b) => Value::String(termination_token(b)),
            PropertyValue::Text(s) => Value::String(s.clone()),
        }
    }

    /// Boolean value, if this is one
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            PropertyValue::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    /// Integer value, if this is one
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(i) => Some(*i),
            PropertyValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    /// Numeric value; integers widen
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Int(i) => Some(*i as f64),
            PropertyValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Text value, if this is one
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Termination bytes, or the UTF-8 bytes of text
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            PropertyValue::Bytes(b) => Some(b),
            PropertyValue::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Whether the value was empty
    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }

    /// Text form that [`PropertyValue::parse`] converts back to `self`
    pub(crate) fn to_source_text(&self) -> String {
        match self {
            PropertyValue::Null => String::new(),
            PropertyValue::Text(s) if PropertyValue::parse(s) != *self => format!("\"{s}\""),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Null => f.write_str("None"),
            PropertyValue::Bool(true) => f.write_str("True"),
            PropertyValue::Bool(false) => f.write_str("False"),
            PropertyValue::Int(i) => write!(f, "{i}"),
            PropertyValue::Float(v) => write!(f, "{v:?}"),
            PropertyValue::Bytes(b) => f.write_str(&termination_token(b)),
            PropertyValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::Text(s.to_string())
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        PropertyValue::Int(i)
    }
}

impl From<f64> for PropertyValue {
    fn from(f: f64) -> Self {
        PropertyValue::Float(f)
    }
}

fn strip_quotes(text: &str) -> Option<&str> {
    if text.len() < 2 {
        return None;
    }
    let first = text.chars().next()?;
    if (first == '"' || first == '\'') && text.ends_with(first) {
        Some(&text[1..text.len() - 1])
    } else {
        None
    }
}

/// `LF`, `CR`, `CRLF`, `CR+LF`, ... into the bytes they name
fn parse_termination(text: &str) -> Option<Vec<u8>> {
    let compact: String = text
        .chars()
        .filter(|c| *c != '+' && !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase();
    if compact.is_empty() || compact.len() % 2 != 0 {
        return None;
    }
    let mut bytes = Vec::with_capacity(compact.len() / 2);
    for token in compact.as_bytes().chunks(2) {
        match token {
            b"LF" => bytes.extend_from_slice(LF),
            b"CR" => bytes.extend_from_slice(CR),
            _ => return None,
        }
    }
    Some(bytes)
}

fn termination_token(bytes: &[u8]) -> String {
    let tokens: Option<Vec<&str>> = bytes
        .iter()
        .map(|b| match b {
            b'\n' => Some("LF"),
            b'\r' => Some("CR"),
            _ => None,
        })
        .collect();
    match tokens {
        Some(tokens) => tokens.join("+"),
        None => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Parse `key=value; key=value` text into properties
pub(crate) fn parse_properties_text(text: &str) -> Result<Properties, DatabaseError> {
    let mut properties = Properties::new();
    for item in text.split(';') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        let (key, value) = item.split_once('=').ok_or_else(|| {
            DatabaseError::invalid_value("properties", format!("'{item}' is not a key=value pair"))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(DatabaseError::invalid_value(
                "properties",
                format!("'{item}' has an empty key"),
            ));
        }
        properties.insert(key.to_string(), PropertyValue::parse(value));
    }
    Ok(properties)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rules() {
        assert_eq!(PropertyValue::parse("1"), PropertyValue::Int(1));
        assert_eq!(PropertyValue::parse("1.1"), PropertyValue::Float(1.1));
        assert_eq!(PropertyValue::parse("TRUE"), PropertyValue::Bool(true));
        assert_eq!(PropertyValue::parse("false"), PropertyValue::Bool(false));
        assert_eq!(PropertyValue::parse(""), PropertyValue::Null);
        assert_eq!(PropertyValue::parse("None"), PropertyValue::Null);
        assert_eq!(PropertyValue::parse("''"), PropertyValue::Text(String::new()));
        assert_eq!(
            PropertyValue::parse("some text"),
            PropertyValue::Text("some text".into())
        );
        assert_eq!(PropertyValue::parse("inf"), PropertyValue::Text("inf".into()));
        assert_eq!(
            PropertyValue::parse(r"D:\Data\"),
            PropertyValue::Text(r"D:\Data\".into())
        );
    }

    #[test]
    fn test_termination_tokens() {
        assert_eq!(PropertyValue::parse("LF"), PropertyValue::Bytes(LF.to_vec()));
        assert_eq!(PropertyValue::parse("cr"), PropertyValue::Bytes(CR.to_vec()));
        assert_eq!(
            PropertyValue::parse("CR+LF"),
            PropertyValue::Bytes(b"\r\n".to_vec())
        );
        assert_eq!(
            PropertyValue::parse("CRLF"),
            PropertyValue::Bytes(b"\r\n".to_vec())
        );
        assert_eq!(PropertyValue::parse("CRX"), PropertyValue::Text("CRX".into()));
    }

    #[test]
    fn test_json_form_restores_value() {
        for value in [
            PropertyValue::Null,
            PropertyValue::Bool(true),
            PropertyValue::Int(-3),
            PropertyValue::Float(2.5),
            PropertyValue::Bytes(b"\r\n".to_vec()),
            PropertyValue::Text(String::new()),
        ] {
            assert_eq!(PropertyValue::from_json(&value.to_json()), value);
        }
    }

    #[test]
    fn test_source_text_restores_value() {
        for value in [
            PropertyValue::Null,
            PropertyValue::Bool(false),
            PropertyValue::Int(9600),
            PropertyValue::Float(0.5),
            PropertyValue::Bytes(b"\n".to_vec()),
            PropertyValue::Text(String::new()),
            PropertyValue::Text("42".into()),
            PropertyValue::Text("COM4".into()),
        ] {
            assert_eq!(PropertyValue::parse(&value.to_source_text()), value);
        }
    }

    #[test]
    fn test_properties_text() {
        let props = parse_properties_text("baud_rate=9600; parity=N; read_termination=CR+LF;").unwrap();
        assert_eq!(props["baud_rate"], PropertyValue::Int(9600));
        assert_eq!(props["parity"], PropertyValue::Text("N".into()));
        assert_eq!(props["read_termination"], PropertyValue::Bytes(b"\r\n".to_vec()));
        assert!(parse_properties_text("novalue").is_err());
    }
}
