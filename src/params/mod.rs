//! Per-job submission parameters
//!
//! Keys are normalized on insertion (uppercase, spaces and `-` become `_`),
//! so `era version`, `Era-Version` and `ERA_VERSION` address the same entry.

use crate::error::{CrabError, ErrorCode, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<ParamValue>),
}

impl ParamValue {
    /// Convert a YAML scalar or sequence; mappings and nulls have no
    /// parameter form
    pub fn from_yaml(value: &serde_yaml::Value) -> Option<Self> {
        use serde_yaml::Value;
        match value {
            Value::String(s) => Some(Self::Str(s.clone())),
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float)),
            Value::Sequence(items) => items
                .iter()
                .map(Self::from_yaml)
                .collect::<Option<Vec<_>>>()
                .map(Self::List),
            Value::Tagged(tagged) => Self::from_yaml(&tagged.value),
            Value::Null | Value::Mapping(_) => None,
        }
    }

    /// Truthiness used for flags such as `NLAYERS`
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => matches!(s.to_ascii_lowercase().as_str(), "true" | "yes" | "1"),
            Self::List(items) => !items.is_empty(),
        }
    }

    /// Flatten into strings: a list yields one string per element
    pub fn as_strings(&self) -> Vec<String> {
        match self {
            Self::List(items) => items.iter().map(ToString::to_string).collect(),
            other => vec![other.to_string()],
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            // Rendered templates are Python configs
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::List(items) => {
                let joined: Vec<String> = items.iter().map(ToString::to_string).collect();
                f.write_str(&joined.join(","))
            }
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(items: Vec<String>) -> Self {
        Self::List(items.into_iter().map(Self::Str).collect())
    }
}

pub fn normalize_key(key: &str) -> String {
    key.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            other => other.to_ascii_uppercase(),
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ParameterMap {
    values: BTreeMap<String, ParamValue>,
}

impl ParameterMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from one batch-description entry
    pub fn from_yaml_mapping(mapping: &serde_yaml::Mapping) -> Result<Self> {
        let mut map = Self::new();
        for (key, value) in mapping {
            let key = key.as_str().ok_or_else(|| {
                CrabError::config_with_code(
                    ErrorCode::CONFIG_INVALID_VALUE,
                    format!("Job entry key {key:?} is not a string"),
                )
            })?;
            match ParamValue::from_yaml(value) {
                Some(value) => map.insert(key, value),
                None => {
                    return Err(CrabError::config_with_code(
                        ErrorCode::CONFIG_INVALID_VALUE,
                        format!("Job entry key '{key}' has no scalar or list value"),
                    ))
                }
            }
        }
        Ok(map)
    }

    pub fn insert(&mut self, key: &str, value: impl Into<ParamValue>) {
        self.values.insert(normalize_key(key), value.into());
    }

    pub fn with(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(&normalize_key(key))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Textual form of a value, as rendering would produce it
    pub fn text(&self, key: &str) -> Option<String> {
        self.get(key).map(ToString::to_string)
    }

    pub fn flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(ParamValue::is_truthy)
    }

    /// Values of a key that may hold one string or a list
    pub fn strings(&self, key: &str) -> Vec<String> {
        self.get(key).map(ParamValue::as_strings).unwrap_or_default()
    }

    /// Keys from `required` that are absent, in the order given
    pub fn missing<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required
            .iter()
            .copied()
            .filter(|key| !self.contains_key(key))
            .collect()
    }

    /// Layer `other` on top: its values win, no key is removed
    pub fn merge(&mut self, other: ParameterMap) {
        self.values.extend(other.values);
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_normalized() {
        let mut map = ParameterMap::new();
        map.insert("era version", 1i64);
        map.insert("Dataset-Version", 0i64);

        assert!(map.contains_key("ERA_VERSION"));
        assert!(map.contains_key("era_version"));
        assert_eq!(map.text("DATASET_VERSION").as_deref(), Some("0"));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["DATASET_VERSION", "ERA_VERSION"]);
    }

    #[test]
    fn test_textual_forms() {
        let map = ParameterMap::new()
            .with("flag", true)
            .with("off", false)
            .with("sel", vec!["A".to_string(), "B".to_string()])
            .with("mem", 2500i64);

        assert_eq!(map.text("FLAG").as_deref(), Some("True"));
        assert_eq!(map.text("OFF").as_deref(), Some("False"));
        assert_eq!(map.text("SEL").as_deref(), Some("A,B"));
        assert_eq!(map.text("MEM").as_deref(), Some("2500"));
        assert_eq!(map.strings("SEL"), vec!["A", "B"]);
        assert_eq!(map.strings("MEM"), vec!["2500"]);
    }

    #[test]
    fn test_merge_later_layer_wins() {
        let mut base = ParameterMap::new().with("YEAR", "2022").with("ERA", "C");
        base.merge(ParameterMap::new().with("ERA", "D").with("REQUEST_NAME", "x"));

        assert_eq!(base.text("YEAR").as_deref(), Some("2022"));
        assert_eq!(base.text("ERA").as_deref(), Some("D"));
        assert_eq!(base.len(), 3);
    }

    #[test]
    fn test_missing_preserves_order() {
        let map = ParameterMap::new().with("YEAR", "2023");
        assert_eq!(map.missing(&["SELECTION", "YEAR", "ERA"]), vec!["SELECTION", "ERA"]);
    }

    #[test]
    fn test_from_yaml_mapping() {
        let yaml: serde_yaml::Mapping = serde_yaml::from_str(
            "year: 2023\nera: C\nera version: 1\nselection: [MuonTagSkim, EGammaTagSkim]\nNLayers: true\n",
        )
        .unwrap();
        let map = ParameterMap::from_yaml_mapping(&yaml).unwrap();

        assert_eq!(map.get("YEAR"), Some(&ParamValue::Int(2023)));
        assert_eq!(map.text("ERA_VERSION").as_deref(), Some("1"));
        assert_eq!(map.strings("SELECTION").len(), 2);
        assert!(map.flag("NLAYERS"));
        assert!(!map.flag("MISSING"));
    }

    #[test]
    fn test_from_yaml_rejects_nested_mapping() {
        let yaml: serde_yaml::Mapping = serde_yaml::from_str("year:\n  nested: 1\n").unwrap();
        let err = ParameterMap::from_yaml_mapping(&yaml).unwrap_err();
        assert_eq!(err.code(), ErrorCode::CONFIG_INVALID_VALUE);
    }
}
