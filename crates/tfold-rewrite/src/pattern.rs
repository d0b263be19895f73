//! Tagged pattern trees and the structural matcher.
//!
//! A [`Pattern`] describes the shape of a subgraph rooted at one value.
//! Matching walks the pattern and the graph together and records what each
//! named variable stood for in a [`Bindings`] map. Matching never touches
//! the graph.
//!
//! ```text
//! Add(Add(x, c1), c2)
//!
//! Pattern::op(Add, [Pattern::op(Add, [any("x"), constant("c1")]), constant("c2")])
//! ```
//!
//! Binding one name twice makes the pattern non-linear: both occurrences
//! must be the same value.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tfold_graph::{Graph, OpKind, SparseLayout, ValueRef};
use tfold_tensor::TensorLiteral;

use crate::error::BuildError;

/// Name of a pattern variable.
pub type Var = &'static str;

/// A pattern over the graph.
#[derive(Clone, Debug, PartialEq)]
pub enum Pattern {
    /// Matches any value.
    Wildcard(Var),
    /// Matches the output of a constant node.
    Constant(Var),
    /// Matches a node of the given kind whose operands match `inputs`.
    Op {
        /// Required operator kind.
        kind: OpKind,
        /// Operand patterns; the operand count must match exactly.
        inputs: Vec<Pattern>,
        /// Optional name for the matched value.
        bind: Option<Var>,
    },
}

impl Pattern {
    /// `Wildcard(name)`.
    #[must_use]
    pub const fn any(name: Var) -> Self {
        Self::Wildcard(name)
    }

    /// `Constant(name)`.
    #[must_use]
    pub const fn constant(name: Var) -> Self {
        Self::Constant(name)
    }

    /// An unbound operator pattern.
    #[must_use]
    pub fn op(kind: OpKind, inputs: impl IntoIterator<Item = Pattern>) -> Self {
        Self::Op {
            kind,
            inputs: inputs.into_iter().collect(),
            bind: None,
        }
    }

    /// Names the value matched by an operator pattern.
    ///
    /// Has no effect on leaf patterns, which always bind.
    #[must_use]
    pub fn bind(self, name: Var) -> Self {
        match self {
            Self::Op { kind, inputs, .. } => Self::Op {
                kind,
                inputs,
                bind: Some(name),
            },
            leaf => leaf,
        }
    }

    /// The operator kind of the pattern root.
    ///
    /// `Wildcard` roots have none and are tried on every node.
    #[must_use]
    pub fn root_kind(&self) -> Option<OpKind> {
        match self {
            Self::Wildcard(_) => None,
            Self::Constant(_) => Some(OpKind::Constant),
            Self::Op { kind, .. } => Some(*kind),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wildcard(name) => write!(f, "{name}"),
            Self::Constant(name) => write!(f, "const {name}"),
            Self::Op { kind, inputs, bind } => {
                if let Some(name) = bind {
                    write!(f, "{name}@")?;
                }
                write!(f, "{kind}(")?;
                for (i, input) in inputs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{input}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// What a pattern variable was bound to.
#[derive(Clone, Debug, PartialEq)]
pub struct Binding {
    /// The matched value.
    pub value: ValueRef,
    /// The literal, for `Constant` variables.
    pub literal: Option<Arc<TensorLiteral>>,
    /// The sparse-layout marker, for `Constant` variables.
    pub sparse: Option<SparseLayout>,
}

/// Variable bindings of a successful match.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bindings {
    map: FxHashMap<Var, Binding>,
}

impl Bindings {
    /// The binding of `name`, if any.
    #[must_use]
    pub fn get(&self, name: Var) -> Option<&Binding> {
        self.map.get(name)
    }

    /// The value bound to `name`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Unbound`] if the pattern does not bind `name`.
    pub fn value(&self, name: Var) -> Result<ValueRef, BuildError> {
        self.map.get(name).map(|b| b.value).ok_or(BuildError::Unbound(name))
    }

    /// The literal bound to a `Constant` variable.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Unbound`] if `name` is not a bound constant.
    pub fn literal(&self, name: Var) -> Result<&Arc<TensorLiteral>, BuildError> {
        self.map
            .get(name)
            .and_then(|b| b.literal.as_ref())
            .ok_or(BuildError::Unbound(name))
    }

    /// The sparse marker bound to a `Constant` variable.
    #[must_use]
    pub fn sparse(&self, name: Var) -> Option<SparseLayout> {
        self.map.get(name).and_then(|b| b.sparse)
    }

    /// Number of bound variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Binds `name`, or checks an existing binding refers to the same value.
    fn bind(&mut self, name: Var, binding: Binding) -> bool {
        match self.map.get(name) {
            Some(existing) => existing.value == binding.value,
            None => {
                self.map.insert(name, binding);
                true
            }
        }
    }
}

/// Matches `pattern` against the subgraph rooted at `value`.
///
/// Returns the bindings on structural success. Side-predicates are not
/// checked here.
#[must_use]
pub fn match_pattern(graph: &Graph, pattern: &Pattern, value: ValueRef) -> Option<Bindings> {
    let mut bindings = Bindings::default();
    match_into(graph, pattern, value, &mut bindings).then_some(bindings)
}

fn match_into(graph: &Graph, pattern: &Pattern, value: ValueRef, bindings: &mut Bindings) -> bool {
    let Some(node) = graph.producer(value) else {
        return false;
    };
    match pattern {
        Pattern::Wildcard(name) => bindings.bind(
            *name,
            Binding {
                value,
                literal: None,
                sparse: None,
            },
        ),
        Pattern::Constant(name) => match node.literal() {
            Some(literal) => bindings.bind(
                *name,
                Binding {
                    value,
                    literal: Some(Arc::clone(literal)),
                    sparse: node.sparse_layout(),
                },
            ),
            None => false,
        },
        Pattern::Op { kind, inputs, bind } => {
            if node.kind != *kind || node.inputs.len() != inputs.len() {
                return false;
            }
            let operands_match = inputs
                .iter()
                .zip(&node.inputs)
                .all(|(sub, &operand)| match_into(graph, sub, operand, bindings));
            operands_match
                && bind.map_or(true, |name| {
                    bindings.bind(
                        name,
                        Binding {
                            value,
                            literal: None,
                            sparse: None,
                        },
                    )
                })
        }
    }
}

/// A boolean side-condition checked after structural matching.
#[derive(Clone)]
pub enum Predicate {
    /// The bound value is not produced by a constant node.
    NotConstant(Var),
    /// The bound value is not a constant carrying a sparse-layout marker.
    Dense(Var),
    /// An arbitrary check.
    Custom(Arc<dyn Fn(&Graph, &Bindings) -> bool + Send + Sync>),
}

impl Predicate {
    /// Wraps a closure as a predicate.
    pub fn custom(f: impl Fn(&Graph, &Bindings) -> bool + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(f))
    }

    /// Evaluates the predicate. Unbound variables make it false.
    #[must_use]
    pub fn holds(&self, graph: &Graph, bindings: &Bindings) -> bool {
        match self {
            Self::NotConstant(name) => bindings
                .get(*name)
                .and_then(|b| graph.producer(b.value))
                .is_some_and(|node| !node.is_constant()),
            Self::Dense(name) => bindings.get(*name).is_some_and(|b| {
                b.sparse.is_none() && graph.producer(b.value).is_some_and(|node| node.sparse_layout().is_none())
            }),
            Self::Custom(f) => f(graph, bindings),
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConstant(name) => write!(f, "NotConstant({name})"),
            Self::Dense(name) => write!(f, "Dense({name})"),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}
