//! YAML boundary
//!
//! All serde_yaml usage is kept behind this module. Parsing converts
//! into the crate's own [`Value`] right away; duplicate mapping keys
//! are rejected by serde_yaml during mapping construction and surface
//! as a format error here.

use crate::value::{Map, Value};
use crate::{Error, Result};

/// Parse a YAML document into a [`Value`].
pub fn load(text: &str) -> Result<Value> {
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|error| Error::format(error.to_string()))?;
    Value::from_yaml(yaml)
}

/// Parse a metadata file body.
///
/// Returns `None` for an empty document (an empty file is a valid node
/// with no data of its own). Any other non-mapping document is a
/// format error.
pub fn load_map(text: &str) -> Result<Option<Map>> {
    match load(text)? {
        Value::Null => Ok(None),
        Value::Mapping(map) => Ok(Some(map)),
        other => Err(Error::format(format!(
            "Expected a mapping at the document root, got {}.",
            other.type_name()
        ))),
    }
}

/// Serialize a [`Value`] to a YAML document.
pub fn dump(value: &Value) -> Result<String> {
    serde_yaml::to_string(&value.to_yaml()).map_err(|error| Error::format(error.to_string()))
}

/// Serialize a mapping to a YAML document.
pub fn dump_map(map: &Map) -> Result<String> {
    dump(&Value::Mapping(map.clone()))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_load_map_accepts_empty_document() {
        assert_eq!(load_map("").unwrap(), None);
        assert_eq!(load_map("# just a comment\n").unwrap(), None);
    }

    #[test]
    fn test_load_map_rejects_scalar_document() {
        assert!(matches!(load_map("just a string"), Err(Error::Format(_))));
    }

    #[test]
    fn test_load_map_rejects_duplicate_keys() {
        let error = load_map("key: one\nkey: two\n").unwrap_err();
        assert!(error.to_string().contains("duplicate"));
    }

    #[test]
    fn test_load_map_reports_syntax_errors() {
        assert!(matches!(load_map("key: [unclosed"), Err(Error::Format(_))));
    }

    #[test]
    fn test_dump_round_trips() {
        let map = load_map("summary: Smoke test\ntier: 1\n").unwrap().unwrap();
        let text = dump_map(&map).unwrap();
        assert_eq!(load_map(&text).unwrap().unwrap(), map);
    }
}
