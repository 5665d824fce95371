//! Context dimensions and rule matching

use std::collections::{HashMap, HashSet};

use crate::parser::{Expression, Rule, parse_rule};
use crate::value::ContextValue;
use crate::{ContextError, Result};

/// Tri-valued outcome of evaluating an expression or group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    True,
    False,
    Undecided,
}

impl Outcome {
    /// AND reduction: false dominates, undecided infects the rest.
    fn and(self, other: Outcome) -> Outcome {
        use Outcome::*;
        match (self, other) {
            (False, _) | (_, False) => False,
            (True, True) => True,
            _ => Undecided,
        }
    }

    fn from_bool(value: bool) -> Outcome {
        if value { Outcome::True } else { Outcome::False }
    }
}

/// The runtime environment rules are decided against.
///
/// A set of named dimensions, each holding one or more values. Built
/// once, used for a whole `adjust` pass; only the `case_sensitive` toggle
/// is mutable so one pass can opt into case-insensitive comparison
/// consistently.
#[derive(Debug, Clone)]
pub struct Context {
    dimensions: HashMap<String, HashSet<ContextValue>>,
    /// When false, names and version parts compare case-insensitively.
    pub case_sensitive: bool,
}

impl Context {
    /// An empty context: every dimension lookup is undecidable.
    pub fn new() -> Self {
        Self {
            dimensions: HashMap::new(),
            case_sensitive: true,
        }
    }

    /// Builder-style dimension definition.
    ///
    /// ```
    /// use stratum_context::Context;
    ///
    /// let context = Context::new()
    ///     .with_dimension("distro", ["centos-8.4.0"])
    ///     .with_dimension("arch", ["x86_64"]);
    /// assert_eq!(context.matches("distro == centos"), Ok(true));
    /// ```
    pub fn with_dimension<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.dimensions.insert(
            name.into(),
            values
                .into_iter()
                .map(|value| ContextValue::new(value.as_ref()))
                .collect(),
        );
        self
    }

    /// Build a context from name/values pairs.
    pub fn from_dimensions<I, N, V, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        pairs
            .into_iter()
            .fold(Self::new(), |context, (name, values)| {
                context.with_dimension(name, values)
            })
    }

    /// Build a context from a restricted rule string.
    ///
    /// Only a conjunction of `==` expressions is accepted, e.g.
    /// `distro == centos-8 and arch == x86_64`; anything richer (or
    /// groups, other operators) is `InvalidContext`.
    pub fn from_rule(rule: &str) -> Result<Self> {
        let parsed = parse_rule(rule)
            .map_err(|error| ContextError::InvalidContext(error.to_string()))?;
        let [and_group] = parsed.or_groups.as_slice() else {
            return Err(ContextError::InvalidContext(format!(
                "Expected a single AND-only rule, got '{rule}'."
            )));
        };
        let mut context = Self::new();
        for expression in and_group {
            let Expression::Compare {
                dimension,
                operator: crate::Operator::Eq,
                values,
            } = expression
            else {
                return Err(ContextError::InvalidContext(format!(
                    "Only '==' expressions are allowed, got '{rule}'."
                )));
            };
            context
                .dimensions
                .entry(dimension.clone())
                .or_default()
                .extend(values.iter().cloned());
        }
        Ok(context)
    }

    /// True when the context defines no dimension at all.
    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    /// True when the dimension is present in the context.
    pub fn has_dimension(&self, name: &str) -> bool {
        self.dimensions.contains_key(name)
    }

    /// Values of a dimension, if defined.
    pub fn dimension(&self, name: &str) -> Option<&HashSet<ContextValue>> {
        self.dimensions.get(name)
    }

    /// Does the rule match this context?
    ///
    /// Returns `Ok(true)`/`Ok(false)` for a decided rule and
    /// `Err(CannotDecide)` only when the rule as a whole is undecidable:
    ///
    /// ```text
    /// CannotDecide and True  == CannotDecide
    /// CannotDecide and False == False
    /// CannotDecide or  True  == True
    /// CannotDecide or  False == CannotDecide
    /// ```
    pub fn matches(&self, rule: &str) -> Result<bool> {
        self.matches_rule(&parse_rule(rule)?)
    }

    /// [`Self::matches`] over an already parsed rule.
    pub fn matches_rule(&self, rule: &Rule) -> Result<bool> {
        let mut undecided_seen = false;
        for and_group in &rule.or_groups {
            let mut outcome = Outcome::True;
            for expression in and_group {
                outcome = outcome.and(self.evaluate(expression));
                if outcome == Outcome::False {
                    // No need to check the rest of the AND group
                    break;
                }
            }
            match outcome {
                // Any true group decides the whole rule
                Outcome::True => return Ok(true),
                Outcome::False => {}
                Outcome::Undecided => undecided_seen = true,
            }
        }
        if undecided_seen {
            Err(ContextError::undecided(
                "Rule is undecidable for this context.",
            ))
        } else {
            Ok(false)
        }
    }

    /// Evaluate a single expression to its tri-valued outcome.
    fn evaluate(&self, expression: &Expression) -> Outcome {
        match expression {
            Expression::Bool(value) => Outcome::from_bool(*value),
            Expression::Defined(name) => Outcome::from_bool(self.has_dimension(name)),
            Expression::NotDefined(name) => Outcome::from_bool(!self.has_dimension(name)),
            Expression::Compare {
                dimension,
                operator,
                values,
            } => self.compare(dimension, *operator, values),
        }
    }

    /// Evaluate dimension values against target values.
    ///
    /// The first pair deciding true wins. A pair deciding false is
    /// remembered: some evidence beats no evidence, so mixed
    /// false/incomparable results decide false. Only when every pair is
    /// incomparable (or the dimension is missing) is the expression
    /// undecided.
    fn compare(
        &self,
        dimension: &str,
        operator: crate::Operator,
        values: &[ContextValue],
    ) -> Outcome {
        let Some(dimension_values) = self.dimensions.get(dimension) else {
            tracing::debug!(dimension, "Dimension not defined, cannot decide");
            return Outcome::Undecided;
        };
        let mut decided = false;
        for dimension_value in dimension_values {
            for value in values {
                match dimension_value.version_cmp(
                    value,
                    operator.minor_mode(),
                    operator.ordered(),
                    self.case_sensitive,
                ) {
                    Ok(ordering) => {
                        if operator.decide(ordering) {
                            return Outcome::True;
                        }
                        decided = true;
                    }
                    Err(_) => {}
                }
            }
        }
        if decided {
            Outcome::False
        } else {
            Outcome::Undecided
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> Context {
        Context::new()
            .with_dimension("distro", ["centos-8.4.0"])
            .with_dimension("arch", ["x86_64"])
    }

    #[test]
    fn test_equality_ignores_extra_precision() {
        assert_eq!(context().matches("distro == centos"), Ok(true));
        assert_eq!(context().matches("distro == centos-8"), Ok(true));
        assert_eq!(context().matches("distro == centos-8.4"), Ok(true));
        assert_eq!(context().matches("distro == centos-8.5"), Ok(false));
    }

    #[test]
    fn test_ordering_operators() {
        assert_eq!(context().matches("distro < centos-9"), Ok(true));
        assert_eq!(context().matches("distro > centos-8.3"), Ok(true));
        assert_eq!(context().matches("distro <= centos-8.4.0"), Ok(true));
        assert_eq!(context().matches("distro >= centos-9"), Ok(false));
    }

    #[test]
    fn test_defined_operators_always_decide() {
        assert_eq!(context().matches("arch is defined"), Ok(true));
        assert_eq!(context().matches("foo is defined"), Ok(false));
        assert_eq!(context().matches("foo is not defined"), Ok(true));
    }

    #[test]
    fn test_missing_dimension_cannot_decide() {
        assert!(matches!(
            context().matches("foo == bar"),
            Err(ContextError::CannotDecide(_))
        ));
    }

    #[test]
    fn test_minor_mode_across_majors() {
        let context = Context::new().with_dimension("distro", ["centos-7.3.0"]);
        assert!(matches!(
            context.matches("distro ~>= centos-6.9.0"),
            Err(ContextError::CannotDecide(_))
        ));
        assert_eq!(context.matches("distro ~< centos-8"), Ok(true));
    }

    #[test]
    fn test_tri_valued_and() {
        let context = Context::new().with_dimension("bar", ["true"]);
        // A false conjunct decides the group, an undecidable one infects it
        assert_eq!(context.matches("foo == x and bar == false"), Ok(false));
        assert!(matches!(
            context.matches("foo == x and bar == true"),
            Err(ContextError::CannotDecide(_))
        ));
    }

    #[test]
    fn test_tri_valued_or() {
        let context = Context::new().with_dimension("bar", ["true"]);
        assert_eq!(context.matches("foo == x or bar == true"), Ok(true));
        assert!(matches!(
            context.matches("foo == x or bar == false"),
            Err(ContextError::CannotDecide(_))
        ));
    }

    #[test]
    fn test_spec_degradation_example() {
        // 'foo' undefined, 'bar' defined as true
        let context = Context::new().with_dimension("bar", ["true"]);
        assert_eq!(context.matches("bar == true and foo == x or bar == true"), Ok(true));
    }

    #[test]
    fn test_comma_values_or_sugar() {
        assert_eq!(context().matches("distro == fedora, centos"), Ok(true));
        assert_eq!(context().matches("distro == fedora, suse"), Ok(false));
    }

    #[test]
    fn test_mixed_evidence_decides_false() {
        // 'fedora' comparison decides false, 'fedora-33 < ...' style
        // incomparable values alone would be undecidable
        let context = Context::new().with_dimension("distro", ["centos-8"]);
        assert_eq!(context.matches("distro < fedora-33, centos-9"), Ok(true));
        assert_eq!(context.matches("distro < fedora-33, centos-7"), Ok(false));
        assert!(matches!(
            context.matches("distro < fedora-33, suse-15"),
            Err(ContextError::CannotDecide(_))
        ));
    }

    #[test]
    fn test_boolean_shortcut_rules() {
        assert_eq!(Context::new().matches("true"), Ok(true));
        assert_eq!(Context::new().matches("false"), Ok(false));
        assert_eq!(Context::new().matches("false or true"), Ok(true));
    }

    #[test]
    fn test_case_sensitivity_toggle() {
        let mut context = Context::new().with_dimension("distro", ["CentOS-8"]);
        assert_eq!(context.matches("distro == centos"), Ok(false));
        context.case_sensitive = false;
        assert_eq!(context.matches("distro == centos"), Ok(true));
    }

    #[test]
    fn test_from_rule_equality_only() {
        let context = Context::from_rule("distro == centos-8 and arch == x86_64").unwrap();
        assert!(context.has_dimension("distro"));
        assert!(context.has_dimension("arch"));

        assert!(matches!(
            Context::from_rule("distro == centos or arch == x86_64"),
            Err(ContextError::InvalidContext(_))
        ));
        assert!(matches!(
            Context::from_rule("distro != centos"),
            Err(ContextError::InvalidContext(_))
        ));
        assert!(matches!(
            Context::from_rule("distro is defined"),
            Err(ContextError::InvalidContext(_))
        ));
    }

    #[test]
    fn test_from_dimensions_pairs() {
        let context =
            Context::from_dimensions([("distro", vec!["centos-8", "fedora-33"])]);
        assert_eq!(context.dimension("distro").map(HashSet::len), Some(2));
        assert_eq!(context.matches("distro == fedora"), Ok(true));
    }
}
