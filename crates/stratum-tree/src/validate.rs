//! Schema validation
//!
//! A validator for the JSON-Schema subset metadata schemas actually
//! use: `type`, `enum`, `const`, `required`, `properties`,
//! `additionalProperties`, `items`, `pattern`, `minimum`/`maximum`,
//! `anyOf`/`allOf`/`oneOf`, `not` and `$ref` resolved through a named
//! schema store. A malformed schema is an [`Error::Schema`], distinct
//! from data that merely fails validation.

use std::collections::HashMap;
use std::fmt;

use regex::Regex;

use crate::value::Value;
use crate::{Error, Result};

/// Named schemas referenced through `$ref`.
pub type SchemaStore = HashMap<String, Value>;

/// One validation failure, located by a slash-path into the data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Outcome of a validation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
}

/// Validate `data` against `schema`.
pub fn validate(data: &Value, schema: &Value, store: &SchemaStore) -> Result<ValidationResult> {
    let mut errors = Vec::new();
    check(data, schema, "/", store, &mut errors, 0)?;
    Ok(ValidationResult {
        valid: errors.is_empty(),
        errors,
    })
}

const MAX_REF_CHAIN: usize = 32;

fn fail(errors: &mut Vec<ValidationError>, path: &str, message: impl Into<String>) {
    errors.push(ValidationError {
        path: path.to_string(),
        message: message.into(),
    });
}

fn join(path: &str, segment: &str) -> String {
    if path == "/" {
        format!("/{segment}")
    } else {
        format!("{path}/{segment}")
    }
}

fn check(
    data: &Value,
    schema: &Value,
    path: &str,
    store: &SchemaStore,
    errors: &mut Vec<ValidationError>,
    refs: usize,
) -> Result<()> {
    let Value::Mapping(schema) = schema else {
        return Err(Error::Schema(format!(
            "Schema must be a mapping, got {}.",
            schema.type_name()
        )));
    };

    if let Some(reference) = schema.get("$ref") {
        let Value::String(name) = reference else {
            return Err(Error::Schema("The '$ref' value must be a string.".to_string()));
        };
        if refs >= MAX_REF_CHAIN {
            return Err(Error::Schema(format!(
                "Too many chained '$ref' resolutions at '{name}'."
            )));
        }
        let Some(resolved) = store.get(name) else {
            return Err(Error::Schema(format!("Schema reference '{name}' not found.")));
        };
        return check(data, resolved, path, store, errors, refs + 1);
    }

    if let Some(types) = schema.get("type") {
        check_type(data, types, path, errors)?;
    }

    if let Some(allowed) = schema.get("enum") {
        let Value::Sequence(allowed) = allowed else {
            return Err(Error::Schema("The 'enum' value must be a list.".to_string()));
        };
        if !allowed.contains(data) {
            fail(errors, path, format!("'{data}' is not one of the allowed values"));
        }
    }

    if let Some(expected) = schema.get("const") {
        if data != expected {
            fail(errors, path, format!("'{data}' does not equal the constant '{expected}'"));
        }
    }

    if let Some(pattern) = schema.get("pattern") {
        let Value::String(pattern) = pattern else {
            return Err(Error::Schema("The 'pattern' value must be a string.".to_string()));
        };
        let regex = Regex::new(pattern)
            .map_err(|error| Error::Schema(format!("Invalid pattern '{pattern}': {error}")))?;
        if let Value::String(text) = data {
            if !regex.is_match(text) {
                fail(errors, path, format!("'{text}' does not match pattern '{pattern}'"));
            }
        }
    }

    check_bounds(data, schema.get("minimum"), schema.get("maximum"), path, errors)?;

    if let Some(required) = schema.get("required") {
        let Value::Sequence(required) = required else {
            return Err(Error::Schema("The 'required' value must be a list.".to_string()));
        };
        if let Value::Mapping(map) = data {
            for key in required {
                let Value::String(key) = key else {
                    return Err(Error::Schema(
                        "Items of 'required' must be strings.".to_string(),
                    ));
                };
                if !map.contains_key(key) {
                    fail(errors, path, format!("required key '{key}' is missing"));
                }
            }
        }
    }

    if let Value::Mapping(map) = data {
        let properties = match schema.get("properties") {
            None => None,
            Some(Value::Mapping(properties)) => Some(properties),
            Some(_) => {
                return Err(Error::Schema(
                    "The 'properties' value must be a mapping.".to_string(),
                ));
            }
        };
        if let Some(properties) = properties {
            for (key, subschema) in properties {
                if let Some(value) = map.get(key) {
                    check(value, subschema, &join(path, key), store, errors, 0)?;
                }
            }
        }
        if let Some(additional) = schema.get("additionalProperties") {
            for (key, value) in map {
                if properties.is_some_and(|properties| properties.contains_key(key)) {
                    continue;
                }
                match additional {
                    Value::Bool(true) => {}
                    Value::Bool(false) => {
                        fail(errors, path, format!("unexpected key '{key}'"));
                    }
                    subschema => {
                        check(value, subschema, &join(path, key), store, errors, 0)?;
                    }
                }
            }
        }
    }

    if let (Some(items), Value::Sequence(values)) = (schema.get("items"), data) {
        for (index, value) in values.iter().enumerate() {
            check(value, items, &join(path, &index.to_string()), store, errors, 0)?;
        }
    }

    for keyword in ["anyOf", "allOf", "oneOf"] {
        let Some(alternatives) = schema.get(keyword) else {
            continue;
        };
        let Value::Sequence(alternatives) = alternatives else {
            return Err(Error::Schema(format!("The '{keyword}' value must be a list.")));
        };
        let mut passed = 0;
        let mut collected = Vec::new();
        for subschema in alternatives {
            let mut scratch = Vec::new();
            check(data, subschema, path, store, &mut scratch, 0)?;
            if scratch.is_empty() {
                passed += 1;
            } else {
                collected.extend(scratch);
            }
        }
        match keyword {
            "anyOf" if passed == 0 => {
                fail(errors, path, "no alternative matched");
                errors.extend(collected);
            }
            "allOf" if passed < alternatives.len() => {
                errors.extend(collected);
            }
            "oneOf" if passed != 1 => {
                fail(errors, path, format!("{passed} alternatives matched, expected one"));
            }
            _ => {}
        }
    }

    if let Some(negated) = schema.get("not") {
        let mut scratch = Vec::new();
        check(data, negated, path, store, &mut scratch, 0)?;
        if scratch.is_empty() {
            fail(errors, path, "matches a disallowed schema");
        }
    }

    Ok(())
}

fn check_type(
    data: &Value,
    types: &Value,
    path: &str,
    errors: &mut Vec<ValidationError>,
) -> Result<()> {
    let names: Vec<&str> = match types {
        Value::String(name) => vec![name.as_str()],
        Value::Sequence(names) => names
            .iter()
            .map(|name| match name {
                Value::String(name) => Ok(name.as_str()),
                _ => Err(Error::Schema("Type names must be strings.".to_string())),
            })
            .collect::<Result<_>>()?,
        _ => {
            return Err(Error::Schema(
                "The 'type' value must be a string or a list of strings.".to_string(),
            ));
        }
    };

    let matched = names.iter().copied().try_fold(false, |matched, name| {
        let accepts = match name {
            "null" => matches!(data, Value::Null),
            "boolean" => matches!(data, Value::Bool(_)),
            "integer" => matches!(data, Value::Int(_)),
            "number" => matches!(data, Value::Int(_) | Value::Float(_)),
            "string" => matches!(data, Value::String(_)),
            "array" => matches!(data, Value::Sequence(_)),
            "object" => matches!(data, Value::Mapping(_)),
            other => {
                return Err(Error::Schema(format!("Unknown type name '{other}'.")));
            }
        };
        Ok(matched || accepts)
    })?;
    if !matched {
        fail(
            errors,
            path,
            format!("{} is not of type {}", data.type_name(), names.join(" or ")),
        );
    }
    Ok(())
}

fn check_bounds(
    data: &Value,
    minimum: Option<&Value>,
    maximum: Option<&Value>,
    path: &str,
    errors: &mut Vec<ValidationError>,
) -> Result<()> {
    let number = match data {
        Value::Int(value) => Some(*value as f64),
        Value::Float(value) => Some(*value),
        _ => None,
    };
    for (bound, below, keyword) in [(minimum, true, "minimum"), (maximum, false, "maximum")] {
        let Some(bound) = bound else { continue };
        let limit = match bound {
            Value::Int(value) => *value as f64,
            Value::Float(value) => *value,
            _ => {
                return Err(Error::Schema(format!(
                    "The '{keyword}' value must be a number."
                )));
            }
        };
        if let Some(number) = number {
            if (below && number < limit) || (!below && number > limit) {
                fail(errors, path, format!("{number} violates {keyword} {limit}"));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::yaml;

    fn load(text: &str) -> Value {
        yaml::load(text).unwrap()
    }

    fn run(data: &str, schema: &str) -> ValidationResult {
        validate(&load(data), &load(schema), &SchemaStore::new()).unwrap()
    }

    #[test]
    fn test_valid_document() {
        let result = run(
            "summary: Smoke test\ntier: 1\n",
            concat!(
                "type: object\n",
                "required: [summary]\n",
                "properties:\n",
                "  summary: {type: string}\n",
                "  tier: {type: integer, minimum: 0}\n",
            ),
        );
        assert!(result.valid);
        assert_eq!(result.errors, vec![]);
    }

    #[test]
    fn test_type_mismatch_is_located() {
        let result = run(
            "tier: high\n",
            "type: object\nproperties:\n  tier: {type: integer}\n",
        );
        assert!(!result.valid);
        assert_eq!(result.errors[0].path, "/tier");
    }

    #[test]
    fn test_required_and_additional_properties() {
        let result = run(
            "extra: value\n",
            concat!(
                "type: object\n",
                "required: [summary]\n",
                "properties: {summary: {type: string}}\n",
                "additionalProperties: false\n",
            ),
        );
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_enum_and_pattern() {
        let result = run(
            "how: fmf\nurl: 'not a url'\n",
            concat!(
                "properties:\n",
                "  how: {enum: [fmf, shell]}\n",
                "  url: {type: string, pattern: '^https?://'}\n",
            ),
        );
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path, "/url");
    }

    #[test]
    fn test_items_are_checked() {
        let result = run(
            "[1, two, 3]",
            "type: array\nitems: {type: integer}\n",
        );
        assert!(!result.valid);
        assert_eq!(result.errors[0].path, "/1");
    }

    #[test]
    fn test_any_of_accepts_either_shape() {
        let schema = "anyOf:\n  - {type: string}\n  - {type: array, items: {type: string}}\n";
        assert!(run("single", schema).valid);
        assert!(run("[one, two]", schema).valid);
        assert!(!run("42", schema).valid);
    }

    #[test]
    fn test_one_of_requires_exactly_one() {
        let schema = "oneOf:\n  - {type: integer}\n  - {type: number}\n";
        assert!(!run("1", schema).valid);
        assert!(run("1.5", schema).valid);
    }

    #[test]
    fn test_ref_resolution() {
        let mut store = SchemaStore::new();
        store.insert(
            "summary".to_string(),
            load("{type: string, pattern: '^[A-Z]'}"),
        );
        let schema = load("properties:\n  summary: {$ref: summary}\n");
        let good = validate(&load("summary: Fine"), &schema, &store).unwrap();
        assert!(good.valid);
        let bad = validate(&load("summary: lowercase"), &schema, &store).unwrap();
        assert!(!bad.valid);
    }

    #[test]
    fn test_missing_ref_is_schema_error() {
        let result = validate(
            &load("key: value"),
            &load("properties: {key: {$ref: nowhere}}"),
            &SchemaStore::new(),
        );
        assert!(matches!(result, Err(Error::Schema(_))));
    }

    #[test]
    fn test_unknown_type_is_schema_error() {
        let result = validate(
            &load("key: value"),
            &load("type: dictionary"),
            &SchemaStore::new(),
        );
        assert!(matches!(result, Err(Error::Schema(_))));
    }
}
