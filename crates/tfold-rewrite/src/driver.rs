//! The fixpoint driver.
//!
//! The driver works in sweeps. A sweep visits the live nodes in topological
//! order and tries every enabled rule whose pattern root matches the node's
//! kind, in family order and then rule order. The first rule that matches,
//! passes its predicates, and builds a replacement is applied at that node,
//! and the sweep moves on. A node with an operand rewritten earlier in the
//! same sweep is left for the next one, so every match sees the graph as it
//! was when the sweep started. At the end of the sweep all uses of the
//! rewritten roots are redirected and the graph is compacted once. A sweep
//! that applies nothing ends the run.
//!
//! The ceiling counts sweeps, not rewrites: any number of independent folds
//! costs one sweep, while a rule set that never settles keeps sweeping.

use rustc_hash::{FxHashMap, FxHashSet};
use tfold_graph::{Graph, GraphError, NodeId, ValueRef};
use tracing::{debug, info, instrument, trace};

use crate::builder::RewriteBuilder;
use crate::config::RewriteConfig;
use crate::error::RewriteError;
use crate::rule::{Rule, RuleSet};
use crate::stats::RewriteStats;

/// Applies a rule set to graphs until nothing changes.
#[derive(Clone, Debug)]
pub struct Rewriter<'r> {
    rules: &'r RuleSet,
    config: RewriteConfig,
}

impl<'r> Rewriter<'r> {
    /// Creates a driver over `rules`.
    #[must_use]
    pub fn new(rules: &'r RuleSet, config: RewriteConfig) -> Self {
        Self { rules, config }
    }

    /// The driver configuration.
    #[must_use]
    pub fn config(&self) -> &RewriteConfig {
        &self.config
    }

    /// Rewrites `graph` to its fixpoint.
    ///
    /// The returned graph is compacted: it keeps every declared input and
    /// only the nodes reachable from the declared outputs.
    ///
    /// # Errors
    ///
    /// Returns an error if the input graph is malformed, if a rewrite breaks
    /// an invariant (declared type, termination measure), if evaluation hits
    /// an inconsistency, or if the rewrite ceiling is exceeded. No partially
    /// rewritten graph is returned.
    #[instrument(skip(self, graph), fields(graph = %graph.name(), nodes = graph.len()))]
    pub fn run(&self, graph: Graph) -> Result<(Graph, RewriteStats), RewriteError> {
        graph.validate()?;
        let mut stats = RewriteStats {
            nodes_before: graph.len(),
            ..RewriteStats::default()
        };

        let mut graph = graph.compact(&FxHashMap::default())?;
        while let Some(next) = self.sweep(&mut graph, &mut stats)? {
            graph = next;
        }

        stats.nodes_after = graph.len();
        info!(
            graph = %graph.name(),
            iterations = stats.iterations,
            rewrites = stats.rewrites,
            folds = stats.folds,
            normalizations = stats.normalizations,
            nodes_before = stats.nodes_before,
            nodes_after = stats.nodes_after,
            "rewrite fixpoint reached"
        );
        Ok((graph, stats))
    }

    /// Runs one sweep. Returns the compacted graph if anything was
    /// rewritten, `None` at the fixpoint.
    fn sweep(&self, graph: &mut Graph, stats: &mut RewriteStats) -> Result<Option<Graph>, RewriteError> {
        let mut forwards = FxHashMap::default();
        let mut touched = FxHashSet::default();

        for id in graph.live_order()? {
            if graph.node(id).inputs.iter().any(|input| touched.contains(&input.node)) {
                touched.insert(id);
                continue;
            }
            if let Some((rule, replacement)) = self.first_rewrite(graph, id, stats)? {
                let root = ValueRef::first(id);
                debug!(
                    rule = rule.name(),
                    node = %root,
                    replacement = %graph.node(replacement.node),
                    "applied rewrite"
                );
                forwards.insert(root, replacement);
                touched.insert(id);
                stats.record(rule);
            }
        }

        if forwards.is_empty() {
            return Ok(None);
        }
        if stats.iterations >= self.config.max_iterations {
            return Err(RewriteError::IterationLimit {
                limit: self.config.max_iterations,
            });
        }
        stats.iterations += 1;
        debug!(sweep = stats.iterations, rewrites = forwards.len(), "sweep applied");
        Ok(Some(graph.compact(&forwards)?))
    }

    /// Finds the first rule that fires at `id` and builds its replacement.
    ///
    /// Nodes appended by builds that decline or fail recoverably are rolled
    /// back; the nodes of the returned replacement stay in `graph`.
    fn first_rewrite(
        &self,
        graph: &mut Graph,
        id: NodeId,
        stats: &mut RewriteStats,
    ) -> Result<Option<(&'r Rule, ValueRef)>, RewriteError> {
        let rules: &'r RuleSet = self.rules;
        let kind = graph.node(id).kind;
        let root = ValueRef::first(id);
        for rule in rules.candidates(kind).filter(|rule| self.config.enables(rule)) {
            let Some(bindings) = rule.matches(graph, root) else {
                continue;
            };

            let mark = graph.len();
            let built = rule.build(&mut RewriteBuilder::new(graph), &bindings);
            match built {
                Ok(value) if value != root => {
                    self.check(graph, rule, id, value)?;
                    return Ok(Some((rule, value)));
                }
                Ok(_) => graph.truncate(mark),
                Err(err) if err.is_recoverable() => {
                    graph.truncate(mark);
                    stats.skipped += 1;
                    trace!(rule = rule.name(), node = %root, error = %err, "rewrite skipped");
                }
                Err(err) => return Err(RewriteError::from_build(rule.name(), id, err)),
            }
        }
        Ok(None)
    }

    /// Checks the invariants of a built replacement before it is applied.
    fn check(&self, graph: &Graph, rule: &Rule, node: NodeId, replacement: ValueRef) -> Result<(), RewriteError> {
        let root = ValueRef::first(node);
        let dangling = |value| GraphError::DanglingValue { node: Some(node), value };
        let expected = graph.value_type(root).ok_or_else(|| dangling(root))?;
        let found = graph.value_type(replacement).ok_or_else(|| dangling(replacement))?;
        if expected != found {
            return Err(RewriteError::TypeChanged {
                rule: rule.name(),
                node,
                expected: expected.clone(),
                found: found.clone(),
            });
        }

        if self.config.verify_termination {
            let termination = rule.termination();
            if let (Some(before), Some(after)) =
                (termination.measure(graph, root), termination.measure(graph, replacement))
            {
                if !after.is_below(&before) {
                    return Err(RewriteError::NonDecreasing {
                        rule: rule.name(),
                        node,
                        before,
                        after,
                    });
                }
            }
        }
        Ok(())
    }
}
