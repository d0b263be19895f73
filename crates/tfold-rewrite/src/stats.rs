//! Statistics of a rewrite run.

use std::collections::BTreeMap;
use std::fmt;

use crate::rule::{Rule, RuleKind};

/// Statistics from a rewrite run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RewriteStats {
    /// Sweeps that rewrote something; this is what the ceiling counts.
    pub iterations: usize,
    /// Rewrites applied before reaching the fixpoint.
    pub rewrites: usize,
    /// Applied fold rewrites.
    pub folds: usize,
    /// Applied normalization rewrites.
    pub normalizations: usize,
    /// Matches whose build failed recoverably and were skipped.
    pub skipped: usize,
    /// Applications per rule name.
    pub per_rule: BTreeMap<&'static str, usize>,
    /// Node count of the input graph.
    pub nodes_before: usize,
    /// Node count of the output graph.
    pub nodes_after: usize,
}

impl RewriteStats {
    /// Records one applied rewrite.
    pub fn record(&mut self, rule: &Rule) {
        self.rewrites += 1;
        match rule.kind() {
            RuleKind::Fold => self.folds += 1,
            RuleKind::Normalize => self.normalizations += 1,
        }
        *self.per_rule.entry(rule.name()).or_default() += 1;
    }

    /// Returns true if any rewrite was applied.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.rewrites > 0
    }

    /// Accumulates another run's statistics into this one.
    pub fn merge(&mut self, other: &RewriteStats) {
        self.iterations += other.iterations;
        self.rewrites += other.rewrites;
        self.folds += other.folds;
        self.normalizations += other.normalizations;
        self.skipped += other.skipped;
        for (name, count) in &other.per_rule {
            *self.per_rule.entry(*name).or_default() += count;
        }
        self.nodes_before += other.nodes_before;
        self.nodes_after += other.nodes_after;
    }
}

impl fmt::Display for RewriteStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} rewrites in {} sweeps ({} folds, {} normalizations, {} skipped), nodes {} -> {}",
            self.rewrites, self.iterations, self.folds, self.normalizations, self.skipped, self.nodes_before, self.nodes_after
        )?;
        for (name, count) in &self.per_rule {
            writeln!(f, "  {name:<34} {count}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Pattern;
    use crate::rule::RuleFamily;
    use tfold_graph::OpKind;

    #[test]
    fn test_record_and_merge() {
        let fold = Rule::new("neg-fold", RuleFamily::Subtractive, RuleKind::Fold, Pattern::op(OpKind::Neg, [Pattern::constant("c")]));
        let mut a = RewriteStats {
            nodes_before: 5,
            nodes_after: 3,
            ..RewriteStats::default()
        };
        a.record(&fold);
        a.iterations = 1;
        let mut b = RewriteStats::default();
        b.record(&fold);
        b.skipped = 2;
        a.merge(&b);
        assert_eq!(a.rewrites, 2);
        assert_eq!(a.iterations, 1);
        assert_eq!(a.folds, 2);
        assert_eq!(a.skipped, 2);
        assert_eq!(a.per_rule["neg-fold"], 2);
        assert!(a.has_changes());
        assert!(!RewriteStats::default().has_changes());
    }

    #[test]
    fn test_display_report() {
        let fold = Rule::new("sqrt-fold", RuleFamily::Subtractive, RuleKind::Fold, Pattern::op(OpKind::Sqrt, [Pattern::constant("c")]));
        let mut stats = RewriteStats {
            nodes_before: 4,
            nodes_after: 2,
            ..RewriteStats::default()
        };
        stats.record(&fold);
        stats.iterations = 1;
        let report = stats.to_string();
        assert!(report.starts_with("1 rewrites in 1 sweeps (1 folds, 0 normalizations, 0 skipped), nodes 4 -> 2\n"));
        assert!(report.contains("sqrt-fold"));
    }
}
