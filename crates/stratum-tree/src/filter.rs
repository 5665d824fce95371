//! Ad-hoc attribute filtering
//!
//! A small expression language for selecting nodes by attribute value,
//! independent of the context rule grammar: `|` separates alternative
//! clauses, `&` joins required literals, a literal is `dimension:
//! value[, value...]` where comma-separated values are alternatives
//! and a `-` prefix negates one value.
//!
//! ```
//! use stratum_tree::{filter, yaml};
//!
//! let data = yaml::load_map("tag: [Tier1, TIPpass]").unwrap().unwrap();
//! assert!(filter("tag: Tier1", &data, true, false).unwrap());
//! assert!(!filter("tag: -Tier1", &data, true, false).unwrap());
//! ```

use std::collections::HashMap;

use regex::Regex;

use crate::value::{Map, Value};
use crate::{Error, Result};

/// Check whether a node's data matches a filter expression.
///
/// `sensitive` toggles case-sensitive matching, `regexp` switches
/// value matching from plain equality to full-string regular
/// expressions. A dimension the data does not contain is an error so
/// that callers can tell "no match" from "nothing to match against".
pub fn filter(expression: &str, data: &Map, sensitive: bool, regexp: bool) -> Result<bool> {
    let expression = expression.trim();
    if expression.is_empty() {
        return Ok(true);
    }

    let mut dimensions: HashMap<String, Vec<String>> = HashMap::new();
    for (key, value) in data {
        let values = match value {
            Value::Sequence(items) => items.iter().map(Value::to_string).collect(),
            other => vec![other.to_string()],
        };
        dimensions.insert(key.clone(), values);
    }

    let mut expression = expression.to_string();
    if !sensitive {
        expression = expression.to_lowercase();
        dimensions = dimensions
            .into_iter()
            .map(|(key, values)| {
                (
                    key.to_lowercase(),
                    values.into_iter().map(|value| value.to_lowercase()).collect(),
                )
            })
            .collect();
    }

    for clause in expression.split('|') {
        if check_clause(clause, &dimensions, regexp)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn check_clause(
    clause: &str,
    dimensions: &HashMap<String, Vec<String>>,
    regexp: bool,
) -> Result<bool> {
    for literal in clause.split('&') {
        let literal = literal.trim();
        let Some((dimension, value)) = literal.split_once(':') else {
            return Err(Error::Filter(format!("Invalid expression '{literal}'")));
        };
        let dimension = dimension.trim();
        let Some(present) = dimensions.get(dimension) else {
            return Err(Error::Filter(format!("Invalid filter '{dimension}'")));
        };
        if !check_value(value.trim(), present, regexp)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// One literal's value: comma-separated alternatives, `-` negates.
fn check_value(value: &str, present: &[String], regexp: bool) -> Result<bool> {
    for atom in value.split(',') {
        let atom = atom.trim();
        if let Some(negated) = atom.strip_prefix('-') {
            if !matches_any(negated, present, regexp)? {
                return Ok(true);
            }
        } else if matches_any(atom, present, regexp)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn matches_any(pattern: &str, present: &[String], regexp: bool) -> Result<bool> {
    if regexp {
        let regex = Regex::new(&format!("^(?:{pattern})$"))
            .map_err(|error| Error::Filter(format!("Invalid pattern '{pattern}': {error}")))?;
        Ok(present.iter().any(|item| regex.is_match(item)))
    } else {
        Ok(present.iter().any(|item| item == pattern))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::yaml;

    fn data() -> Map {
        yaml::load_map("tag: [Tier1, TIPpass]\ncategory: Sanity\ntier: 1\n")
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_simple_match() {
        assert!(filter("tag: Tier1", &data(), true, false).unwrap());
        assert!(!filter("tag: Tier2", &data(), true, false).unwrap());
    }

    #[test]
    fn test_and_requires_both() {
        assert!(filter("tag: Tier1 & category: Sanity", &data(), true, false).unwrap());
        assert!(!filter("tag: Tier1 & category: Security", &data(), true, false).unwrap());
    }

    #[test]
    fn test_or_requires_any() {
        assert!(filter("tag: Tier2 | category: Sanity", &data(), true, false).unwrap());
        assert!(!filter("tag: Tier2 | category: Security", &data(), true, false).unwrap());
    }

    #[test]
    fn test_comma_separated_alternatives() {
        assert!(filter("tag: Tier2, Tier1", &data(), true, false).unwrap());
        assert!(!filter("tag: Tier2, Tier3", &data(), true, false).unwrap());
    }

    #[test]
    fn test_negated_value() {
        assert!(filter("tag: -Tier2", &data(), true, false).unwrap());
        assert!(!filter("tag: -Tier1", &data(), true, false).unwrap());
    }

    #[test]
    fn test_case_sensitivity() {
        assert!(!filter("tag: tier1", &data(), true, false).unwrap());
        assert!(filter("tag: tier1", &data(), false, false).unwrap());
    }

    #[test]
    fn test_regexp_mode_is_full_match() {
        assert!(filter("tag: Tier.*", &data(), true, true).unwrap());
        assert!(!filter("tag: Tier", &data(), true, true).unwrap());
    }

    #[test]
    fn test_scalar_values_are_stringified() {
        assert!(filter("tier: 1", &data(), true, false).unwrap());
    }

    #[test]
    fn test_missing_dimension_is_an_error() {
        assert!(matches!(
            filter("component: bash", &data(), true, false),
            Err(Error::Filter(_))
        ));
    }

    #[test]
    fn test_empty_expression_matches() {
        assert!(filter("  ", &data(), true, false).unwrap());
    }

    #[test]
    fn test_missing_colon_is_an_error() {
        assert!(matches!(
            filter("just-a-word", &data(), true, false),
            Err(Error::Filter(_))
        ));
    }
}
