//! Error types for the rewrite pass.

use tfold_graph::{GraphError, NodeId, ValueType};
use tfold_tensor::EvalError;

use crate::termination::Measure;

/// Why a rule's `build` did not produce a replacement.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum BuildError {
    /// Constant evaluation failed.
    #[error(transparent)]
    Eval(#[from] EvalError),

    /// A node the rule tried to create could not be typed.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// The build refers to a pattern variable the pattern never binds.
    #[error("pattern variable `{0}` is not bound")]
    Unbound(&'static str),

    /// The build looked at its operands and chose not to fire.
    #[error("declined: {0}")]
    Declined(&'static str),
}

impl BuildError {
    /// Returns true if the rule should simply be skipped.
    ///
    /// Evaluation failures defer to [`EvalError::is_recoverable`]; an
    /// untypeable intermediate or a declined build is always recoverable;
    /// an unbound variable is a defect in the rule itself.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Eval(err) => err.is_recoverable(),
            Self::Graph(_) | Self::Declined(_) => true,
            Self::Unbound(_) => false,
        }
    }
}

/// Fatal errors of the rewrite pass.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum RewriteError {
    /// The input graph is malformed, or a rewrite produced a malformed one.
    #[error("invalid graph: {0}")]
    Graph(#[from] GraphError),

    /// Constant evaluation hit an internal inconsistency.
    #[error("rule `{rule}` at {node:?}: {source}")]
    Eval {
        /// Rule being applied.
        rule: &'static str,
        /// Root node of the match.
        node: NodeId,
        /// The evaluator error.
        source: EvalError,
    },

    /// A rule's build is inconsistent with its pattern.
    #[error("rule `{rule}` at {node:?}: {source}")]
    Build {
        /// Rule being applied.
        rule: &'static str,
        /// Root node of the match.
        node: NodeId,
        /// The build error.
        source: BuildError,
    },

    /// More sweeps were needed than the configured ceiling allows.
    #[error("no fixpoint after {limit} sweeps")]
    IterationLimit {
        /// The ceiling.
        limit: usize,
    },

    /// A rewrite changed the declared type of the value it replaced.
    #[error("rule `{rule}` at {node:?} changed the type from {expected} to {found}")]
    TypeChanged {
        /// Rule being applied.
        rule: &'static str,
        /// Root node of the match.
        node: NodeId,
        /// The root's declared type.
        expected: ValueType,
        /// The replacement's declared type.
        found: ValueType,
    },

    /// A rewrite did not decrease the rule's termination measure.
    #[error("rule `{rule}` at {node:?} did not decrease its measure ({before:?} -> {after:?})")]
    NonDecreasing {
        /// Rule being applied.
        rule: &'static str,
        /// Root node of the match.
        node: NodeId,
        /// Measure of the root.
        before: Measure,
        /// Measure of the replacement.
        after: Measure,
    },

    /// `disabled_families` names a family that does not exist.
    #[error("unknown rule family `{0}`")]
    UnknownFamily(String),
}

impl RewriteError {
    /// Wraps a non-recoverable build error.
    pub(crate) fn from_build(rule: &'static str, node: NodeId, err: BuildError) -> Self {
        match err {
            BuildError::Eval(source) => Self::Eval { rule, node, source },
            source => Self::Build { rule, node, source },
        }
    }
}
