//! Rewrite rules and the ordered rule set.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tfold_graph::{Graph, OpKind, ValueRef};

use crate::builder::RewriteBuilder;
use crate::error::{BuildError, RewriteError};
use crate::pattern::{match_pattern, Bindings, Pattern, Predicate};
use crate::termination::Termination;

/// Rule families, in application order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RuleFamily {
    /// `Add` chains.
    Additive,
    /// `Sub` and the unary operators.
    Subtractive,
    /// `Mul` chains and `Div`.
    Multiplicative,
    /// `Transpose` and `Unsqueeze`.
    ShapeTransform,
}

impl RuleFamily {
    /// All families in application order.
    pub const ALL: [RuleFamily; 4] = [
        Self::Additive,
        Self::Subtractive,
        Self::Multiplicative,
        Self::ShapeTransform,
    ];

    /// Name used in configuration files.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Additive => "additive",
            Self::Subtractive => "subtractive",
            Self::Multiplicative => "multiplicative",
            Self::ShapeTransform => "shape-transform",
        }
    }
}

impl fmt::Display for RuleFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RuleFamily {
    type Err = RewriteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|family| family.name() == s)
            .ok_or_else(|| RewriteError::UnknownFamily(s.to_string()))
    }
}

/// Whether a rule computes a constant or reshapes an expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RuleKind {
    /// Replaces an operator on constants with the computed constant.
    Fold,
    /// Reorders a commutative/associative expression.
    Normalize,
}

/// Builds the replacement for a match.
pub type BuildFn = Arc<dyn Fn(&mut RewriteBuilder<'_>, &Bindings) -> Result<ValueRef, BuildError> + Send + Sync>;

/// A declarative rewrite rule.
///
/// ```ignore
/// Rule::new("add-commute", RuleFamily::Additive, RuleKind::Normalize, pattern)
///     .with_predicate(Predicate::NotConstant("x"))
///     .with_build(|b, m| b.binary(OpKind::Add, m.value("x")?, m.value("c")?))
/// ```
#[derive(Clone)]
pub struct Rule {
    name: &'static str,
    family: RuleFamily,
    kind: RuleKind,
    pattern: Pattern,
    predicates: Vec<Predicate>,
    build: BuildFn,
    termination: Termination,
}

impl Rule {
    /// Creates a rule with no predicates and a build that always declines.
    ///
    /// The termination measure defaults to [`Termination::Eliminates`] of
    /// the root operator for folds and [`Termination::Chain`] of it for
    /// normalizations.
    #[must_use]
    pub fn new(name: &'static str, family: RuleFamily, kind: RuleKind, pattern: Pattern) -> Self {
        let termination = match (kind, pattern.root_kind()) {
            (_, None) => Termination::Unchecked,
            (RuleKind::Fold, Some(op)) => Termination::Eliminates(op),
            (RuleKind::Normalize, Some(op)) => Termination::Chain(op),
        };
        Self {
            name,
            family,
            kind,
            pattern,
            predicates: Vec::new(),
            build: Arc::new(|_, _| Err(BuildError::Declined("rule has no build"))),
            termination,
        }
    }

    /// Adds a side-predicate. Predicates run in insertion order.
    #[must_use]
    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Sets the build function.
    #[must_use]
    pub fn with_build(
        mut self,
        build: impl Fn(&mut RewriteBuilder<'_>, &Bindings) -> Result<ValueRef, BuildError> + Send + Sync + 'static,
    ) -> Self {
        self.build = Arc::new(build);
        self
    }

    /// Overrides the termination measure.
    #[must_use]
    pub fn with_termination(mut self, termination: Termination) -> Self {
        self.termination = termination;
        self
    }

    /// The rule's name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The rule's family.
    #[must_use]
    pub fn family(&self) -> RuleFamily {
        self.family
    }

    /// Fold or normalize.
    #[must_use]
    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    /// The rule's pattern.
    #[must_use]
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// The declared termination measure.
    #[must_use]
    pub fn termination(&self) -> Termination {
        self.termination
    }

    /// Matches the pattern at `value` and checks every predicate.
    #[must_use]
    pub fn matches(&self, graph: &Graph, value: ValueRef) -> Option<Bindings> {
        let bindings = match_pattern(graph, &self.pattern, value)?;
        self.predicates
            .iter()
            .all(|p| p.holds(graph, &bindings))
            .then_some(bindings)
    }

    /// Runs the build.
    ///
    /// # Errors
    ///
    /// Propagates the build's error.
    pub fn build(&self, builder: &mut RewriteBuilder<'_>, bindings: &Bindings) -> Result<ValueRef, BuildError> {
        (self.build)(builder, bindings)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("family", &self.family)
            .field("kind", &self.kind)
            .field("pattern", &self.pattern.to_string())
            .field("predicates", &self.predicates)
            .field("termination", &self.termination)
            .finish_non_exhaustive()
    }
}

/// An ordered collection of rules, grouped by family.
#[derive(Clone, Debug, Default)]
pub struct RuleSet {
    families: Vec<(RuleFamily, Vec<Rule>)>,
}

impl RuleSet {
    /// An empty rule set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `rule` to the end of its family, adding the family if needed.
    pub fn register(&mut self, rule: Rule) {
        match self.families.iter_mut().find(|(family, _)| *family == rule.family) {
            Some((_, rules)) => rules.push(rule),
            None => self.families.push((rule.family, vec![rule])),
        }
    }

    /// All rules in family order, then registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Rule> + '_ {
        self.families.iter().flat_map(|(_, rules)| rules.iter())
    }

    /// Rules that may match a node of `kind`, in application order.
    pub fn candidates(&self, kind: OpKind) -> impl Iterator<Item = &Rule> + '_ {
        self.iter()
            .filter(move |rule| rule.pattern.root_kind().map_or(true, |root| root == kind))
    }

    /// Looks up a rule by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.iter().find(|rule| rule.name == name)
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.families.iter().map(|(_, rules)| rules.len()).sum()
    }

    /// Returns true if the set has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(name: &'static str, family: RuleFamily, kind: OpKind) -> Rule {
        Rule::new(name, family, RuleKind::Fold, Pattern::op(kind, [Pattern::constant("c")]))
    }

    #[test]
    fn test_register_keeps_family_then_rule_order() {
        let mut set = RuleSet::new();
        set.register(rule("a1", RuleFamily::Additive, OpKind::Neg));
        set.register(rule("s1", RuleFamily::Subtractive, OpKind::Neg));
        set.register(rule("a2", RuleFamily::Additive, OpKind::Neg));
        let names: Vec<_> = set.candidates(OpKind::Neg).map(Rule::name).collect();
        assert_eq!(names, ["a1", "a2", "s1"]);
        assert_eq!(set.candidates(OpKind::Sqrt).count(), 0);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_default_termination() {
        let fold = rule("f", RuleFamily::Subtractive, OpKind::Sqrt);
        assert_eq!(fold.termination(), Termination::Eliminates(OpKind::Sqrt));
        let norm = Rule::new(
            "n",
            RuleFamily::Additive,
            RuleKind::Normalize,
            Pattern::op(OpKind::Add, [Pattern::any("a"), Pattern::any("b")]),
        );
        assert_eq!(norm.termination(), Termination::Chain(OpKind::Add));
    }

    #[test]
    fn test_family_names_round_trip() {
        for family in RuleFamily::ALL {
            assert_eq!(family.name().parse::<RuleFamily>().unwrap(), family);
        }
        assert!(matches!("bogus".parse::<RuleFamily>(), Err(RewriteError::UnknownFamily(_))));
    }
}
