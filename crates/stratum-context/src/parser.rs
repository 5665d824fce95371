//! Parsing of context rules
//!
//! A rule is a flat boolean formula: expressions joined by `and` inside
//! groups, groups joined by `or`. There is no nesting, so the parsed form
//! is simply an OR-list of AND-lists. Comma separated value lists are
//! OR-sugar within a single expression: `dim == a, b` means
//! `dim == a or dim == b`.

use std::sync::LazyLock;

use regex::Regex;

use crate::value::ContextValue;
use crate::{ContextError, Result};

/// Comparison operators of the rule language.
///
/// The `Minor*` variants are the `~`-prefixed forms that gate version
/// comparison on an equal major version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    MinorEq,
    MinorNotEq,
    MinorLess,
    MinorLessOrEqual,
    MinorGreater,
    MinorGreaterOrEqual,
}

impl Operator {
    fn from_str(text: &str) -> Option<Self> {
        Some(match text {
            "==" => Self::Eq,
            "!=" => Self::NotEq,
            "<" => Self::Less,
            "<=" => Self::LessOrEqual,
            ">" => Self::Greater,
            ">=" => Self::GreaterOrEqual,
            "~=" => Self::MinorEq,
            "~!=" => Self::MinorNotEq,
            "~<" => Self::MinorLess,
            "~<=" => Self::MinorLessOrEqual,
            "~>" => Self::MinorGreater,
            "~>=" => Self::MinorGreaterOrEqual,
            _ => return None,
        })
    }

    /// True for the `~`-prefixed operators.
    pub fn minor_mode(self) -> bool {
        matches!(
            self,
            Self::MinorEq
                | Self::MinorNotEq
                | Self::MinorLess
                | Self::MinorLessOrEqual
                | Self::MinorGreater
                | Self::MinorGreaterOrEqual
        )
    }

    /// Equality-family operators compare unordered, the rest ordered.
    pub fn ordered(self) -> bool {
        !matches!(
            self,
            Self::Eq | Self::NotEq | Self::MinorEq | Self::MinorNotEq
        )
    }

    /// Decide the operator from a comparison result.
    pub fn decide(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            Self::Eq | Self::MinorEq => ordering == Equal,
            Self::NotEq | Self::MinorNotEq => ordering != Equal,
            Self::Less | Self::MinorLess => ordering == Less,
            Self::LessOrEqual | Self::MinorLessOrEqual => ordering != Greater,
            Self::Greater | Self::MinorGreater => ordering == Greater,
            Self::GreaterOrEqual | Self::MinorGreaterOrEqual => ordering != Less,
        }
    }
}

/// One expression of a rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Literal `true`/`false`, a zero-dimension shortcut that always decides.
    Bool(bool),
    /// `dimension is defined`
    Defined(String),
    /// `dimension is not defined`
    NotDefined(String),
    /// `dimension <op> value[, value...]`
    Compare {
        dimension: String,
        operator: Operator,
        values: Vec<ContextValue>,
    },
}

/// A parsed rule: OR-list of AND-lists of expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub or_groups: Vec<Vec<Expression>>,
}

impl Rule {
    /// Rule that unconditionally decides to the given value.
    ///
    /// Used for bare boolean `when` conditions in adjust rules.
    pub fn always(value: bool) -> Self {
        Self {
            or_groups: vec![vec![Expression::Bool(value)]],
        }
    }
}

// Sentinels protecting backslash-escaped tokens across the and/or split.
// Private-use code points cannot appear in a sane rule string.
const ESCAPED_AND: char = '\u{E000}';
const ESCAPED_OR: char = '\u{E001}';
const ESCAPED_AMP: char = '\u{E002}';
const ESCAPED_PIPE: char = '\u{E003}';

static RE_OR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bor\b").unwrap());
static RE_AND: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\band\b").unwrap());
static RE_TRIPLE: LazyLock<Regex> = LazyLock::new(|| {
    // Longest operators first so the alternation never under-matches
    Regex::new(r"^(\w+)\s*(~!=|~<=|~>=|~=|~<|~>|==|!=|<=|>=|<|>)\s*([^=].*)$").unwrap()
});
static RE_DOUBLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+)\s+is\s+(not\s+)?defined\s*$").unwrap());

/// Parse a rule string into its OR/AND structure.
pub fn parse_rule(rule: &str) -> Result<Rule> {
    let protected = protect_escapes(rule)?;
    let normalized = normalize_equals(&protected);

    let mut or_groups = Vec::new();
    for or_part in RE_OR.split(&normalized) {
        if or_part.trim().is_empty() {
            return Err(ContextError::invalid_rule(format!(
                "Empty OR expression in '{rule}'."
            )));
        }
        let mut and_group = Vec::new();
        for and_part in RE_AND.split(or_part) {
            let expression = and_part.trim();
            if expression.is_empty() {
                return Err(ContextError::invalid_rule(format!(
                    "Empty AND expression in '{rule}'."
                )));
            }
            and_group.push(parse_expression(expression)?);
        }
        or_groups.push(and_group);
    }
    Ok(Rule { or_groups })
}

/// Replace backslash-escaped tokens with sentinels and reject unescaped
/// `&`/`|` characters, which are ambiguous with the filter language.
fn protect_escapes(rule: &str) -> Result<String> {
    let protected = rule
        .replace(r"\and", &ESCAPED_AND.to_string())
        .replace(r"\or", &ESCAPED_OR.to_string())
        .replace(r"\&", &ESCAPED_AMP.to_string())
        .replace(r"\|", &ESCAPED_PIPE.to_string());
    if protected.contains('&') || protected.contains('|') {
        return Err(ContextError::invalid_rule(format!(
            "Unescaped '&' or '|' in '{rule}', use 'and'/'or' or escape with a backslash."
        )));
    }
    Ok(protected)
}

/// Restore escaped tokens inside a literal value.
fn restore_escapes(value: &str) -> String {
    value
        .replace(ESCAPED_AND, "and")
        .replace(ESCAPED_OR, "or")
        .replace(ESCAPED_AMP, "&")
        .replace(ESCAPED_PIPE, "|")
}

/// Rewrite a lone `=` into `==`, leaving `==`, `!=`, `~=`, `<=`, `>=` alone.
fn normalize_equals(rule: &str) -> String {
    let chars: Vec<char> = rule.chars().collect();
    let mut output = String::with_capacity(rule.len());
    for (i, &c) in chars.iter().enumerate() {
        output.push(c);
        if c != '=' {
            continue;
        }
        let prev = i.checked_sub(1).map(|p| chars[p]);
        let next = chars.get(i + 1).copied();
        let part_of_operator = matches!(prev, Some('=' | '!' | '~' | '<' | '>'))
            || next == Some('=');
        if !part_of_operator {
            output.push('=');
        }
    }
    output
}

/// Parse a single expression (no and/or inside).
fn parse_expression(expression: &str) -> Result<Expression> {
    // Literal booleans stand on their own
    match expression {
        "true" => return Ok(Expression::Bool(true)),
        "false" => return Ok(Expression::Bool(false)),
        _ => {}
    }

    if let Some(captures) = RE_TRIPLE.captures(expression) {
        let dimension = captures[1].to_string();
        let operator = Operator::from_str(&captures[2]).ok_or_else(|| {
            ContextError::invalid_rule(format!("Cannot parse expression '{expression}'."))
        })?;
        let values = captures[3]
            .split(',')
            .map(|value| ContextValue::new(&restore_escapes(value.trim())))
            .collect();
        return Ok(Expression::Compare {
            dimension,
            operator,
            values,
        });
    }

    if let Some(captures) = RE_DOUBLE.captures(expression) {
        let dimension = captures[1].to_string();
        return Ok(if captures.get(2).is_some() {
            Expression::NotDefined(dimension)
        } else {
            Expression::Defined(dimension)
        });
    }

    Err(ContextError::invalid_rule(format!(
        "Cannot parse expression '{expression}'."
    )))
}
