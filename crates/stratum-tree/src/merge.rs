//! Suffix-aware attribute merging
//!
//! Inheritance combines a parent mapping with a child mapping one key at
//! a time. A key suffix selects the operator: `+` extends, `+<` extends
//! by prepending, `-` reduces, `-~` removes by regex, `~` substitutes by
//! regex. Without a suffix the child value overwrites the parent one.
//! The source mapping is never mutated; type combinations no operator
//! covers are merge errors.

use regex::Regex;

use crate::value::{Map, Value};
use crate::{Error, Result};

/// Merge `source` into `target`, interpreting key suffixes.
///
/// `node` names the tree node being merged, for error messages only.
pub fn merge_special(target: &mut Map, source: &Map, node: &str) -> Result<()> {
    for (key, value) in source {
        if let Some(base) = key.strip_suffix("+<") {
            merge_plus(target, key, base, value, true, node)?;
        } else if let Some(base) = key.strip_suffix('+') {
            merge_plus(target, key, base, value, false, node)?;
        } else if let Some(base) = key.strip_suffix("-~") {
            merge_regexp_remove(target, key, base, value, node)?;
        } else if let Some(base) = key.strip_suffix('-') {
            merge_minus(target, key, base, value, node)?;
        } else if let Some(base) = key.strip_suffix('~') {
            merge_substitute(target, key, base, value, node)?;
        } else {
            target.insert(key.clone(), value.clone());
        }
    }
    Ok(())
}

/// The `+` and `+<` operators.
fn merge_plus(
    target: &mut Map,
    key: &str,
    base: &str,
    value: &Value,
    prepend: bool,
    node: &str,
) -> Result<()> {
    let Some(existing) = target.get_mut(base) else {
        // Fresh key, but a mapping value may itself carry suffixed keys.
        if let Value::Mapping(source) = value {
            let mut fresh = Map::new();
            merge_special(&mut fresh, source, node)?;
            target.insert(base.to_string(), Value::Mapping(fresh));
        } else {
            target.insert(base.to_string(), value.clone());
        }
        return Ok(());
    };

    match (existing, value) {
        // Nested mappings merge recursively.
        (Value::Mapping(existing), Value::Mapping(source)) => {
            merge_special(existing, source, node)
        }
        // A mapping patches every element of an inherited list.
        (Value::Sequence(items), Value::Mapping(patch)) => {
            for item in items.iter_mut() {
                let Value::Mapping(item) = item else {
                    return Err(Error::merge(
                        key,
                        node,
                        "cannot patch a list item which is not a dict",
                    ));
                };
                merge_special(item, patch, node)?;
            }
            Ok(())
        }
        // An inherited mapping templated by a list of patches.
        (existing @ Value::Mapping(_), Value::Sequence(patches)) => {
            let template = existing.as_mapping().cloned().unwrap_or_default();
            let mut result = Vec::with_capacity(patches.len());
            for patch in patches {
                let Value::Mapping(patch) = patch else {
                    return Err(Error::merge(
                        key,
                        node,
                        "cannot template a dict with a list item which is not a dict",
                    ));
                };
                let mut copy = template.clone();
                merge_special(&mut copy, patch, node)?;
                result.push(Value::Mapping(copy));
            }
            *existing = Value::Sequence(result);
            Ok(())
        }
        (existing, value) => concatenate(existing, value, prepend)
            .ok_or_else(|| Error::merge(key, node, "incompatible types")),
    }
}

/// Scalar and list concatenation for `+`; `prepend` flips the operand
/// order.
fn concatenate(existing: &mut Value, value: &Value, prepend: bool) -> Option<()> {
    let combined = match (&*existing, value) {
        (Value::Int(a), Value::Int(b)) => Value::Int(a + b),
        (Value::Int(a), Value::Float(b)) => Value::Float(*a as f64 + b),
        (Value::Float(a), Value::Int(b)) => Value::Float(a + *b as f64),
        (Value::Float(a), Value::Float(b)) => Value::Float(a + b),
        (Value::String(a), Value::String(b)) => {
            if prepend {
                Value::String(format!("{b}{a}"))
            } else {
                Value::String(format!("{a}{b}"))
            }
        }
        (Value::Sequence(a), Value::Sequence(b)) => {
            let mut items = if prepend { b.clone() } else { a.clone() };
            items.extend(if prepend { a.clone() } else { b.clone() });
            Value::Sequence(items)
        }
        _ => return None,
    };
    *existing = combined;
    Some(())
}

/// The `-` operator.
fn merge_minus(target: &mut Map, key: &str, base: &str, value: &Value, node: &str) -> Result<()> {
    let Some(existing) = target.get_mut(base) else {
        return Err(Error::merge(key, node, "not inherited"));
    };
    match (existing, value) {
        (Value::Int(a), Value::Int(b)) => {
            *a -= b;
            Ok(())
        }
        (Value::Float(a), Value::Float(b)) => {
            *a -= b;
            Ok(())
        }
        (existing @ Value::String(_), Value::String(pattern)) => {
            let regex = Regex::new(pattern)
                .map_err(|error| Error::merge(key, node, &error.to_string()))?;
            let text = existing.as_str().unwrap_or_default();
            *existing = Value::String(regex.replace_all(text, "").into_owned());
            Ok(())
        }
        (Value::Sequence(items), Value::Sequence(removed)) => {
            items.retain(|item| !removed.contains(item));
            Ok(())
        }
        (Value::Mapping(map), Value::Sequence(keys)) => {
            for removed in keys {
                let Value::String(removed) = removed else {
                    return Err(Error::merge(key, node, "key names must be strings"));
                };
                map.remove(removed);
            }
            Ok(())
        }
        _ => Err(Error::merge(key, node, "incompatible types")),
    }
}

/// Compile the regex pattern list shared by `-~` and `~`.
fn patterns(key: &str, value: &Value, node: &str) -> Result<Vec<String>> {
    match value {
        Value::String(pattern) => Ok(vec![pattern.clone()]),
        Value::Sequence(items) => items
            .iter()
            .map(|item| match item {
                Value::String(pattern) => Ok(pattern.clone()),
                _ => Err(Error::merge(key, node, "patterns must be strings")),
            })
            .collect(),
        _ => Err(Error::merge(key, node, "patterns must be strings")),
    }
}

fn compile(key: &str, pattern: &str, node: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|error| Error::merge(key, node, &error.to_string()))
}

/// The `-~` operator. Absent base key is a no-op.
fn merge_regexp_remove(
    target: &mut Map,
    key: &str,
    base: &str,
    value: &Value,
    node: &str,
) -> Result<()> {
    let Some(existing) = target.get_mut(base) else {
        return Ok(());
    };
    let regexes = patterns(key, value, node)?
        .iter()
        .map(|pattern| compile(key, pattern, node))
        .collect::<Result<Vec<_>>>()?;

    match existing {
        existing @ Value::String(_) => {
            let text = existing.as_str().unwrap_or_default();
            if regexes.iter().any(|regex| regex.is_match(text)) {
                *existing = Value::String(String::new());
            }
            Ok(())
        }
        Value::Sequence(items) => {
            items.retain(|item| match item {
                Value::String(text) => !regexes.iter().any(|regex| regex.is_match(text)),
                _ => true,
            });
            Ok(())
        }
        Value::Mapping(map) => {
            map.retain(|name, _| !regexes.iter().any(|regex| regex.is_match(name)));
            Ok(())
        }
        _ => Err(Error::merge(key, node, "incompatible types")),
    }
}

/// Split a `pattern/replacement` spec.
///
/// A single `/` is the delimiter. When the pattern itself needs `/`,
/// any leading punctuation character works sed-style, with an optional
/// trailing delimiter: `|pat/tern|replacement|`.
fn parse_substitution<'a>(key: &str, spec: &'a str, node: &str) -> Result<(&'a str, &'a str)> {
    if spec.matches('/').count() == 1 {
        // Unwrap is fine, the count above guarantees a split point.
        return Ok(spec.split_once('/').unwrap_or_default());
    }
    let mut chars = spec.chars();
    let delimiter = chars
        .next()
        .ok_or_else(|| Error::merge(key, node, "empty substitution"))?;
    if delimiter.is_alphanumeric() {
        return Err(Error::merge(
            key,
            node,
            "substitution needs a 'pattern/replacement' pair",
        ));
    }
    let rest = chars.as_str();
    let rest = rest.strip_suffix(delimiter).unwrap_or(rest);
    rest.split_once(delimiter)
        .ok_or_else(|| Error::merge(key, node, "substitution needs a 'pattern/replacement' pair"))
}

/// The `~` operator. Absent base key is a no-op.
fn merge_substitute(
    target: &mut Map,
    key: &str,
    base: &str,
    value: &Value,
    node: &str,
) -> Result<()> {
    let Some(existing) = target.get_mut(base) else {
        return Ok(());
    };
    let mut substitutions = Vec::new();
    for spec in patterns(key, value, node)? {
        let (pattern, replacement) = parse_substitution(key, &spec, node)?;
        substitutions.push((compile(key, pattern, node)?, replacement.to_string()));
    }

    let apply = |text: &str| {
        let mut text = text.to_string();
        for (regex, replacement) in &substitutions {
            text = regex.replace_all(&text, replacement.as_str()).into_owned();
        }
        text
    };

    match existing {
        existing @ Value::String(_) => {
            let text = existing.as_str().unwrap_or_default();
            *existing = Value::String(apply(text));
            Ok(())
        }
        Value::Sequence(items) => {
            for item in items.iter_mut() {
                if let Value::String(text) = item {
                    *text = apply(text);
                }
            }
            Ok(())
        }
        _ => Err(Error::merge(key, node, "incompatible types")),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::yaml;

    fn merged(target: &str, source: &str) -> Result<Map> {
        let mut target = yaml::load_map(target).unwrap().unwrap();
        let source = yaml::load_map(source).unwrap().unwrap();
        merge_special(&mut target, &source, "/test")?;
        Ok(target)
    }

    #[test]
    fn test_plain_overwrite() {
        let result = merged("key: old\nother: kept", "key: new").unwrap();
        assert_eq!(result, yaml::load_map("key: new\nother: kept").unwrap().unwrap());
    }

    #[test]
    fn test_plus_concatenates_lists_and_strings() {
        let result = merged("tag: [a]\nnote: 'one'", "tag+: [b, c]\nnote+: ' two'").unwrap();
        assert_eq!(
            result,
            yaml::load_map("tag: [a, b, c]\nnote: one two").unwrap().unwrap()
        );
    }

    #[test]
    fn test_plus_adds_numbers() {
        let result = merged("tier: 1", "tier+: 2").unwrap();
        assert_eq!(result["tier"], Value::Int(3));
    }

    #[test]
    fn test_plus_prepend() {
        let result = merged("require: [b]", "require+<: [a]").unwrap();
        assert_eq!(result, yaml::load_map("require: [a, b]").unwrap().unwrap());
    }

    #[test]
    fn test_plus_merges_nested_mappings() {
        let result = merged(
            "environment:\n  FOO: old\n  KEEP: yes",
            "environment+:\n  FOO: new\n  BAR: added",
        )
        .unwrap();
        assert_eq!(
            result,
            yaml::load_map("environment:\n  FOO: new\n  KEEP: yes\n  BAR: added")
                .unwrap()
                .unwrap()
        );
    }

    #[test]
    fn test_plus_fresh_mapping_resolves_inner_suffixes() {
        // The inserted mapping carries its own suffixed key.
        let result = merged("other: x", "extra+:\n  inner+: value").unwrap();
        assert_eq!(
            result["extra"],
            Value::Mapping(yaml::load_map("inner: value").unwrap().unwrap())
        );
    }

    #[test]
    fn test_plus_patches_list_of_mappings() {
        let result = merged(
            "discover:\n  - how: fmf\n  - how: shell",
            "discover+:\n  url: https://example.org",
        )
        .unwrap();
        assert_eq!(
            result,
            yaml::load_map(concat!(
                "discover:\n",
                "  - how: fmf\n",
                "    url: https://example.org\n",
                "  - how: shell\n",
                "    url: https://example.org\n",
            ))
            .unwrap()
            .unwrap()
        );
    }

    #[test]
    fn test_plus_templates_mapping_with_list() {
        let result = merged(
            "check:\n  how: avc\n  enabled: true",
            "check+:\n  - name: one\n  - name: two",
        )
        .unwrap();
        assert_eq!(
            result,
            yaml::load_map(concat!(
                "check:\n",
                "  - enabled: true\n",
                "    how: avc\n",
                "    name: one\n",
                "  - enabled: true\n",
                "    how: avc\n",
                "    name: two\n",
            ))
            .unwrap()
            .unwrap()
        );
    }

    #[test]
    fn test_plus_type_mismatch() {
        assert!(matches!(
            merged("tag: [a]", "tag+: 1"),
            Err(Error::Merge { .. })
        ));
    }

    #[test]
    fn test_minus_requires_inherited_key() {
        assert!(matches!(
            merged("other: x", "tag-: [a]"),
            Err(Error::Merge { .. })
        ));
    }

    #[test]
    fn test_minus_subtracts_and_removes() {
        let result = merged("tier: 3\ntag: [a, b, c]", "tier-: 1\ntag-: [b]").unwrap();
        assert_eq!(result, yaml::load_map("tier: 2\ntag: [a, c]").unwrap().unwrap());
    }

    #[test]
    fn test_minus_strips_string_matches() {
        let result = merged("summary: a long description", "summary-: 'long '").unwrap();
        assert_eq!(result["summary"], Value::from("a description"));
    }

    #[test]
    fn test_minus_deletes_mapping_keys() {
        let result = merged(
            "environment:\n  FOO: 1\n  BAR: 2",
            "environment-: [FOO]",
        )
        .unwrap();
        assert_eq!(
            result["environment"],
            Value::Mapping(yaml::load_map("BAR: 2").unwrap().unwrap())
        );
    }

    #[test]
    fn test_regexp_remove_filters_lists_and_keys() {
        let result = merged(
            "tag: [slow, fast, flaky]\nenvironment:\n  DEBUG: 1\n  PATH: /bin",
            "tag-~: ['^f']\nenvironment-~: DEBUG",
        )
        .unwrap();
        assert_eq!(
            result,
            yaml::load_map("tag: [slow]\nenvironment:\n  PATH: /bin")
                .unwrap()
                .unwrap()
        );
    }

    #[test]
    fn test_regexp_remove_clears_matching_string() {
        let result = merged("summary: obsolete text", "summary-~: obso").unwrap();
        assert_eq!(result["summary"], Value::from(""));
    }

    #[test]
    fn test_regexp_remove_missing_key_is_noop() {
        let result = merged("other: x", "tag-~: anything").unwrap();
        assert_eq!(result, yaml::load_map("other: x").unwrap().unwrap());
    }

    #[test]
    fn test_substitute_string_and_list() {
        let result = merged(
            "summary: centos-8 test\ntag: [centos-8, other]",
            "summary~: centos-8/centos-9\ntag~: [centos-8/centos-9]",
        )
        .unwrap();
        assert_eq!(
            result,
            yaml::load_map("summary: centos-9 test\ntag: [centos-9, other]")
                .unwrap()
                .unwrap()
        );
    }

    #[test]
    fn test_substitute_alternate_delimiter() {
        let result = merged("path: /usr/bin", "path~: '|/usr/bin|/usr/sbin|'").unwrap();
        assert_eq!(result["path"], Value::from("/usr/sbin"));
    }

    #[test]
    fn test_substitute_capture_groups() {
        let result = merged("url: https://old.org/repo", "url~: '|old\\.org/(.*)|new.org/$1|'")
            .unwrap();
        assert_eq!(result["url"], Value::from("https://new.org/repo"));
    }

    #[test]
    fn test_source_is_never_mutated() {
        let mut target = yaml::load_map("tag: [a]").unwrap().unwrap();
        let source = yaml::load_map("tag+: [b]").unwrap().unwrap();
        let snapshot = source.clone();
        merge_special(&mut target, &source, "/test").unwrap();
        assert_eq!(source, snapshot);
    }
}
