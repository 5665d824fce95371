//! Dimension values with version-aware comparison

use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::{ContextError, Result};

/// Separators between the name part and the version parts of a value.
static SPLIT_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[:\-.]").unwrap());

/// A single value of a context dimension.
///
/// The value is decomposed into an ordered tuple of parts: the first is
/// the "name", the rest are "version parts". `centos-8.3.0` becomes
/// `["centos", "8", "3", "0"]`, `x86_64` stays a bare name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextValue {
    parts: Vec<String>,
}

impl ContextValue {
    /// Decompose a string on `:`, `-` and `.` separators.
    pub fn new(text: &str) -> Self {
        Self {
            parts: SPLIT_VERSION.split(text).map(str::to_string).collect(),
        }
    }

    /// Take an already split tuple of parts literally.
    pub fn from_parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    /// The name part followed by version parts.
    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// Compare two values with version semantics.
    ///
    /// `other` defines the precision: `centos` compares just the name,
    /// `centos-7` name and major, `centos-7.4` down to the minor. A left
    /// side missing a version part the right side asks for is treated as
    /// lower, but only when the left side carries at least one version
    /// part of its own.
    ///
    /// `minor_mode` (the `~` operators) requires equal majors before any
    /// minor comparison: `centos-6.3 ~< centos-7` is fine because the
    /// right side does not care about the minor, while
    /// `centos-6.3 ~< centos-7.2` cannot be decided.
    ///
    /// `ordered` selects between full ordering (`Less`/`Equal`/`Greater`,
    /// undecidable when the names differ) and equality-only comparison
    /// (`Equal` or `Greater` meaning "not equal").
    pub fn version_cmp(
        &self,
        other: &ContextValue,
        minor_mode: bool,
        ordered: bool,
        case_sensitive: bool,
    ) -> Result<Ordering> {
        let this = &self.parts;
        let that = &other.parts;

        if this.is_empty() || that.is_empty() {
            return Err(ContextError::undecided("Empty name part."));
        }

        let eq = |first: &str, second: &str| {
            if case_sensitive {
                first == second
            } else {
                first.to_lowercase() == second.to_lowercase()
            }
        };

        if !eq(&this[0], &that[0]) {
            if ordered {
                return Err(ContextError::undecided(
                    "Name parts differ, cannot compare for order.",
                ));
            }
            return Ok(Ordering::Greater); // not equal
        }

        // From here name parts are equal
        if minor_mode && that.len() > 1 {
            // The right side cares about the major version
            let major = this.get(1).ok_or_else(|| {
                ContextError::undecided(
                    "Missing major version in the left (dimension) value.",
                )
            })?;
            if !eq(major, &that[1]) {
                if ordered {
                    if that.len() > 2 {
                        return Err(ContextError::undecided(
                            "Cannot compare minors between mismatched majors.",
                        ));
                    }
                } else {
                    return Ok(Ordering::Greater); // not equal
                }
            }
        }

        // Compare version parts as long as the right side needs to
        for (first, second) in this[1..].iter().zip(that[1..].iter()) {
            let compared = compare_parts(first, second, case_sensitive);
            if compared != Ordering::Equal {
                return Ok(compared);
            }
        }

        if that.len() <= this.len() {
            // Everything wanted by the right side compared equal
            Ok(Ordering::Equal)
        } else if minor_mode {
            Err(ContextError::undecided("Not enough version parts."))
        } else if !ordered {
            Ok(Ordering::Greater) // not equal
        } else if this.len() == 1 {
            Err(ContextError::undecided(
                "No version part defined for the left side.",
            ))
        } else {
            Ok(Ordering::Less) // the right side carries more parts
        }
    }
}

/// Compare two version parts, numerically when both parse as integers.
fn compare_parts(first: &str, second: &str, case_sensitive: bool) -> Ordering {
    match (first.parse::<i64>(), second.parse::<i64>()) {
        (Ok(first), Ok(second)) => first.cmp(&second),
        _ if case_sensitive => first.cmp(second),
        _ => first.to_lowercase().cmp(&second.to_lowercase()),
    }
}

impl fmt::Display for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.parts.join("-"))
    }
}
