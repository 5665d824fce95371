//! The recursive attribute value type
//!
//! Every attribute in the tree is built from this tagged union. Mappings
//! use `BTreeMap`, which gives the deterministic lexicographic key order
//! the merge pass depends on: multiple suffix-variants of one base key
//! must always be processed in the same order.

use std::collections::BTreeMap;
use std::fmt;

use crate::{Error, Result};

/// String-keyed mapping of values.
pub type Map = BTreeMap<String, Value>;

/// A single attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Sequence(Vec<Value>),
    Mapping(Map),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Self::Sequence(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Map> {
        match self {
            Self::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut Map> {
        match self {
            Self::Mapping(map) => Some(map),
            _ => None,
        }
    }

    /// Short type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Sequence(_) => "list",
            Self::Mapping(_) => "dict",
        }
    }

    /// Convert from a parsed YAML value.
    ///
    /// Mapping keys must be strings and tagged values are not part of
    /// the metadata format; both are `Error::Format`.
    pub fn from_yaml(yaml: serde_yaml::Value) -> Result<Self> {
        Ok(match yaml {
            serde_yaml::Value::Null => Self::Null,
            serde_yaml::Value::Bool(value) => Self::Bool(value),
            serde_yaml::Value::Number(number) => match number.as_i64() {
                Some(value) => Self::Int(value),
                None => Self::Float(number.as_f64().unwrap_or(f64::NAN)),
            },
            serde_yaml::Value::String(value) => Self::String(value),
            serde_yaml::Value::Sequence(values) => Self::Sequence(
                values
                    .into_iter()
                    .map(Self::from_yaml)
                    .collect::<Result<_>>()?,
            ),
            serde_yaml::Value::Mapping(mapping) => {
                let mut map = Map::new();
                for (key, value) in mapping {
                    let serde_yaml::Value::String(key) = key else {
                        return Err(Error::format(format!(
                            "Invalid mapping key '{key:?}', expected a string."
                        )));
                    };
                    map.insert(key, Self::from_yaml(value)?);
                }
                Self::Mapping(map)
            }
            serde_yaml::Value::Tagged(tagged) => {
                return Err(Error::format(format!(
                    "Unsupported YAML tag '{}'.",
                    tagged.tag
                )));
            }
        })
    }

    /// Convert back into a YAML value for serialization.
    pub fn to_yaml(&self) -> serde_yaml::Value {
        match self {
            Self::Null => serde_yaml::Value::Null,
            Self::Bool(value) => serde_yaml::Value::Bool(*value),
            Self::Int(value) => serde_yaml::Value::Number((*value).into()),
            Self::Float(value) => serde_yaml::Value::Number((*value).into()),
            Self::String(value) => serde_yaml::Value::String(value.clone()),
            Self::Sequence(values) => {
                serde_yaml::Value::Sequence(values.iter().map(Value::to_yaml).collect())
            }
            Self::Mapping(map) => {
                let mut mapping = serde_yaml::Mapping::new();
                for (key, value) in map {
                    mapping.insert(
                        serde_yaml::Value::String(key.clone()),
                        value.to_yaml(),
                    );
                }
                serde_yaml::Value::Mapping(mapping)
            }
        }
    }
}

impl fmt::Display for Value {
    /// Compact single-line rendering for logs and listings.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::String(value) => write!(f, "{value}"),
            Self::Sequence(values) => {
                write!(f, "[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "]")
            }
            Self::Mapping(map) => {
                write!(f, "{{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Self::Sequence(values)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Self::Mapping(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_yaml_rejects_non_string_keys() {
        let yaml: serde_yaml::Value = serde_yaml::from_str("1: one\n2: two\n").unwrap();
        assert!(matches!(Value::from_yaml(yaml), Err(Error::Format(_))));
    }

    #[test]
    fn test_round_trip_preserves_structure() {
        let yaml: serde_yaml::Value =
            serde_yaml::from_str("key: value\nlist: [1, 2.5, true, null]\n").unwrap();
        let value = Value::from_yaml(yaml).unwrap();
        let map = value.as_mapping().unwrap();
        assert_eq!(map["key"], Value::from("value"));
        assert_eq!(
            map["list"],
            Value::Sequence(vec![
                Value::Int(1),
                Value::Float(2.5),
                Value::Bool(true),
                Value::Null,
            ])
        );
    }

    #[test]
    fn test_display_is_compact() {
        let yaml: serde_yaml::Value = serde_yaml::from_str("a: [1, 2]\nb: text\n").unwrap();
        let value = Value::from_yaml(yaml).unwrap();
        assert_eq!(value.to_string(), "{a: [1, 2], b: text}");
    }
}
