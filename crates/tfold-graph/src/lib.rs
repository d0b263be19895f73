//! # tfold Graph IR
//!
//! The tensor dataflow graph that the rewrite pass consumes and produces.
//!
//! ## Pipeline Position
//!
//! ```text
//! [Graph builder]     <- shape/type inference (external)
//!     |
//!     v
//! [Graph IR]          <- This crate
//!     |
//!     v
//! [Rewrite pass]      <- tfold-rewrite: folding + normalization
//!     |
//!     v
//! [Lowering pipeline] <- explicit loop nests (external)
//! ```
//!
//! ## Model
//!
//! - A [`Node`] has an [`OpKind`], ordered input [`ValueRef`]s, one declared
//!   [`ValueType`] per output, and a set of named [`AttrValue`]s.
//! - A [`ValueRef`] names output `k` of exactly one producing node. External
//!   graph inputs are [`OpKind::Input`] nodes, so every value has a producer.
//! - Constant nodes carry their literal in the `value` attribute and may
//!   carry a [`SparseLayout`] marker in `sparse_layout`.
//! - Nodes are never mutated after creation. Rewrites append new nodes and
//!   redirect uses; [`Graph::compact`] then rebuilds the graph from its live
//!   roots and drops the garbage.
//!
//! ## Main Types
//!
//! - [`Graph`]: node arena plus declared inputs and outputs
//! - [`GraphBuilder`]: typed construction for front ends and tests
//! - [`GraphError`]: structural problems in a graph

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod builder;
mod graph;
pub mod infer;
mod pretty;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tfold_index::define_index;
use tfold_tensor::{DType, TensorLiteral};

pub use builder::GraphBuilder;
pub use graph::{Graph, GraphOutput};

define_index! {
    /// Index into a graph's node arena.
    pub struct NodeId;

    /// A symbolic (dynamic) dimension size.
    pub struct DimVar;
}

/// Well-known attribute names.
pub mod attr {
    /// Literal payload of a constant node.
    pub const VALUE: &str = "value";
    /// Sparse-layout marker of a constant node.
    pub const SPARSE_LAYOUT: &str = "sparse_layout";
    /// External name of a graph input.
    pub const NAME: &str = "name";
    /// Axis order of a transpose.
    pub const PERM: &str = "perm";
    /// Inserted axes of an unsqueeze.
    pub const AXES: &str = "axes";
}

/// A reference to output `output` of node `node`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueRef {
    /// The producing node.
    pub node: NodeId,
    /// Output slot of the producer.
    pub output: u32,
}

impl ValueRef {
    /// The first (usually only) output of `node`.
    #[must_use]
    pub const fn first(node: NodeId) -> Self {
        Self { node, output: 0 }
    }
}

/// A dimension of a declared value type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dim {
    /// A statically known size.
    Static(usize),
    /// A size fixed only at run time.
    Dynamic(DimVar),
}

impl Dim {
    /// Returns the static value if known.
    #[must_use]
    pub const fn static_value(&self) -> Option<usize> {
        match self {
            Self::Static(n) => Some(*n),
            Self::Dynamic(_) => None,
        }
    }
}

/// The declared type of a value: element type plus dimensions.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueType {
    /// Element type.
    pub dtype: DType,
    /// Dimensions, outermost first.
    pub dims: SmallVec<[Dim; 4]>,
}

impl ValueType {
    /// A type with only static dimensions.
    #[must_use]
    pub fn new(dtype: DType, dims: impl IntoIterator<Item = usize>) -> Self {
        Self {
            dtype,
            dims: dims.into_iter().map(Dim::Static).collect(),
        }
    }

    /// A type with arbitrary (possibly dynamic) dimensions.
    #[must_use]
    pub fn with_dims(dtype: DType, dims: impl IntoIterator<Item = Dim>) -> Self {
        Self {
            dtype,
            dims: dims.into_iter().collect(),
        }
    }

    /// The type of a literal.
    #[must_use]
    pub fn of_literal(literal: &TensorLiteral) -> Self {
        Self::new(literal.dtype(), literal.shape().dims().iter().copied())
    }

    /// Number of dimensions.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// The static dimension sizes, if every dimension is static.
    #[must_use]
    pub fn static_dims(&self) -> Option<SmallVec<[usize; 4]>> {
        self.dims.iter().map(Dim::static_value).collect()
    }
}

/// Operator tags.
///
/// Only the elementwise and shape-transform kinds take part in rewriting;
/// the others pass through the optimizer untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OpKind {
    /// External graph input.
    Input,
    /// Compile-time constant.
    Constant,
    /// Elementwise addition with broadcasting.
    Add,
    /// Elementwise subtraction with broadcasting.
    Sub,
    /// Elementwise multiplication with broadcasting.
    Mul,
    /// Elementwise division with broadcasting.
    Div,
    /// Elementwise negation.
    Neg,
    /// Elementwise square root.
    Sqrt,
    /// Elementwise exponential.
    Exp,
    /// Rectified linear unit.
    Relu,
    /// Axis permutation (attribute `perm`).
    Transpose,
    /// Size-1 axis insertion (attribute `axes`).
    Unsqueeze,
    /// Reshape to the declared output type.
    Reshape,
    /// Matrix product. Not elementwise.
    MatMul,
    /// Convolution.
    Conv,
    /// Sum reduction.
    ReduceSum,
}

impl OpKind {
    /// Number of inputs, if fixed for this kind.
    #[must_use]
    pub const fn arity(self) -> Option<usize> {
        match self {
            Self::Input | Self::Constant => Some(0),
            Self::Neg | Self::Sqrt | Self::Exp | Self::Relu | Self::Transpose | Self::Unsqueeze => {
                Some(1)
            }
            Self::Add | Self::Sub | Self::Mul | Self::Div | Self::MatMul | Self::Reshape => Some(2),
            Self::Conv | Self::ReduceSum => None,
        }
    }

    /// Returns true for broadcasting elementwise binary operators.
    #[must_use]
    pub const fn is_elementwise_binary(self) -> bool {
        matches!(self, Self::Add | Self::Sub | Self::Mul | Self::Div)
    }

    /// Operator name as printed.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Input => "Input",
            Self::Constant => "Constant",
            Self::Add => "Add",
            Self::Sub => "Sub",
            Self::Mul => "Mul",
            Self::Div => "Div",
            Self::Neg => "Neg",
            Self::Sqrt => "Sqrt",
            Self::Exp => "Exp",
            Self::Relu => "Relu",
            Self::Transpose => "Transpose",
            Self::Unsqueeze => "Unsqueeze",
            Self::Reshape => "Reshape",
            Self::MatMul => "MatMul",
            Self::Conv => "Conv",
            Self::ReduceSum => "ReduceSum",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Compressed storage formats a constant may be marked with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SparseLayout {
    /// Coordinate list.
    Coo,
    /// Compressed sparse row.
    Csr,
    /// Compressed sparse column.
    Csc,
}

/// An attribute value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    /// Integer.
    Int(i64),
    /// Integer list.
    Ints(Vec<i64>),
    /// Float.
    Float(f64),
    /// String.
    Str(String),
    /// Tensor literal, shared.
    Tensor(Arc<TensorLiteral>),
    /// Sparse-layout marker.
    Sparse(SparseLayout),
}

/// Named attributes of a node, kept sorted by name.
pub type Attributes = BTreeMap<String, AttrValue>;

/// An operation node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Operator tag.
    pub kind: OpKind,
    /// Ordered operands.
    pub inputs: SmallVec<[ValueRef; 2]>,
    /// Declared type of each output.
    pub outputs: SmallVec<[ValueType; 1]>,
    /// Attributes.
    pub attrs: Attributes,
}

impl Node {
    /// Creates a single-output node.
    #[must_use]
    pub fn new(kind: OpKind, inputs: impl IntoIterator<Item = ValueRef>, output: ValueType) -> Self {
        Self {
            kind,
            inputs: inputs.into_iter().collect(),
            outputs: smallvec::smallvec![output],
            attrs: Attributes::new(),
        }
    }

    /// Creates a dense constant node holding `literal`.
    #[must_use]
    pub fn constant(literal: Arc<TensorLiteral>) -> Self {
        let ty = ValueType::of_literal(&literal);
        Self::new(OpKind::Constant, [], ty).with_attr(attr::VALUE, AttrValue::Tensor(literal))
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attr(mut self, name: &str, value: AttrValue) -> Self {
        self.attrs.insert(name.to_string(), value);
        self
    }

    /// Returns the named attribute.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    /// Returns the named integer-list attribute.
    #[must_use]
    pub fn ints_attr(&self, name: &str) -> Option<&[i64]> {
        match self.attrs.get(name) {
            Some(AttrValue::Ints(values)) => Some(values),
            _ => None,
        }
    }

    /// Returns true if this is a constant node.
    #[must_use]
    pub fn is_constant(&self) -> bool {
        self.kind == OpKind::Constant
    }

    /// The literal of a constant node.
    #[must_use]
    pub fn literal(&self) -> Option<&Arc<TensorLiteral>> {
        if !self.is_constant() {
            return None;
        }
        match self.attrs.get(attr::VALUE) {
            Some(AttrValue::Tensor(literal)) => Some(literal),
            _ => None,
        }
    }

    /// The sparse-layout marker of a constant node, if present.
    #[must_use]
    pub fn sparse_layout(&self) -> Option<SparseLayout> {
        match self.attrs.get(attr::SPARSE_LAYOUT) {
            Some(AttrValue::Sparse(layout)) => Some(*layout),
            _ => None,
        }
    }
}

/// Structural errors in a graph.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum GraphError {
    /// A value refers to a node that does not exist.
    #[error("{node:?} refers to missing value {value:?}")]
    DanglingValue {
        /// The referring node (`None` for a graph output).
        node: Option<NodeId>,
        /// The bad reference.
        value: ValueRef,
    },

    /// A node reads a value produced at or after its own position.
    #[error("{node:?} reads {value:?}, which is not produced before it")]
    ForwardReference {
        /// The reading node.
        node: NodeId,
        /// The reference.
        value: ValueRef,
    },

    /// Following the operands of a node leads back to the node itself.
    #[error("cycle through {node:?}")]
    Cycle {
        /// A node on the cycle.
        node: NodeId,
    },

    /// A declared graph input is not an `Input` node.
    #[error("declared input {0:?} is not an Input node")]
    NotAnInput(NodeId),

    /// Wrong number of inputs for the operator.
    #[error("{kind} node {node:?} takes {expected} inputs, got {got}")]
    Arity {
        /// The node.
        node: NodeId,
        /// Its kind.
        kind: OpKind,
        /// Expected input count.
        expected: usize,
        /// Actual input count.
        got: usize,
    },

    /// A constant node without a literal, or whose literal disagrees with its
    /// declared type.
    #[error("constant {node:?} has a missing or mistyped literal")]
    BadConstant {
        /// The node.
        node: NodeId,
    },

    /// Operand types that cannot be combined.
    #[error("cannot combine {lhs:?} and {rhs:?}")]
    Incompatible {
        /// Left operand type.
        lhs: ValueType,
        /// Right operand type.
        rhs: ValueType,
    },

    /// A missing or malformed attribute.
    #[error("invalid attribute `{name}` on {kind} node")]
    InvalidAttribute {
        /// Operator kind.
        kind: OpKind,
        /// Attribute name.
        name: &'static str,
    },

    /// The operator kind cannot be built by this constructor.
    #[error("{0} cannot be built here")]
    UnexpectedKind(OpKind),

    /// Two declared outputs share a name.
    #[error("duplicate graph output `{0}`")]
    DuplicateOutput(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tfold_index::Idx;

    #[test]
    fn test_constant_node_accessors() {
        let lit = Arc::new(TensorLiteral::vector(vec![1.0f32, 2.0]));
        let node = Node::constant(lit.clone());
        assert!(node.is_constant());
        assert_eq!(node.literal(), Some(&lit));
        assert_eq!(node.sparse_layout(), None);
        assert_eq!(node.outputs[0], ValueType::new(DType::Float32, [2]));

        let sparse = node.with_attr(attr::SPARSE_LAYOUT, AttrValue::Sparse(SparseLayout::Csr));
        assert_eq!(sparse.sparse_layout(), Some(SparseLayout::Csr));
    }

    #[test]
    fn test_literal_only_on_constants() {
        let lit = Arc::new(TensorLiteral::scalar(1i32));
        let node = Node::new(OpKind::Neg, [ValueRef::first(NodeId::new(0))], ValueType::of_literal(&lit))
            .with_attr(attr::VALUE, AttrValue::Tensor(lit));
        assert!(node.literal().is_none());
    }

    #[test]
    fn test_arity() {
        assert_eq!(OpKind::Add.arity(), Some(2));
        assert_eq!(OpKind::Transpose.arity(), Some(1));
        assert_eq!(OpKind::Constant.arity(), Some(0));
        assert_eq!(OpKind::Conv.arity(), None);
        assert!(!OpKind::MatMul.is_elementwise_binary());
    }

    #[test]
    fn test_static_dims() {
        let ty = ValueType::with_dims(DType::Float32, [Dim::Dynamic(DimVar::new(0)), Dim::Static(3)]);
        assert_eq!(ty.static_dims(), None);
        assert_eq!(ValueType::new(DType::Int8, [2, 3]).static_dims().unwrap().as_slice(), &[2, 3]);
    }
}
