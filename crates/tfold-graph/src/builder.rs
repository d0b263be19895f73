//! Typed graph construction.

use std::sync::Arc;

use tfold_tensor::TensorLiteral;

use crate::graph::Graph;
use crate::{attr, infer, AttrValue, GraphError, Node, OpKind, SparseLayout, ValueRef, ValueType};

/// Builds a [`Graph`] one operator at a time, computing result types for
/// the operators it knows and checking operands as it goes.
///
/// ```ignore
/// let mut b = GraphBuilder::new("affine");
/// let x = b.input("x", ValueType::new(DType::Float32, [4]));
/// let c = b.constant(TensorLiteral::vector(vec![1.0f32; 4]));
/// let y = b.add(x, c)?;
/// b.output("y", y);
/// let graph = b.finish()?;
/// ```
#[derive(Debug)]
pub struct GraphBuilder {
    graph: Graph,
}

impl GraphBuilder {
    /// Starts an empty graph.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { graph: Graph::new(name) }
    }

    /// The type of an existing value.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DanglingValue`] if `value` does not exist.
    pub fn value_type(&self, value: ValueRef) -> Result<&ValueType, GraphError> {
        self.graph
            .value_type(value)
            .ok_or(GraphError::DanglingValue { node: None, value })
    }

    /// Declares an external input.
    pub fn input(&mut self, name: &str, ty: ValueType) -> ValueRef {
        self.graph.add_input(name, ty)
    }

    /// Adds a dense constant.
    pub fn constant(&mut self, literal: TensorLiteral) -> ValueRef {
        ValueRef::first(self.graph.push_node(Node::constant(Arc::new(literal))))
    }

    /// Adds a constant carrying a sparse-layout marker.
    pub fn sparse_constant(&mut self, literal: TensorLiteral, layout: SparseLayout) -> ValueRef {
        let node = Node::constant(Arc::new(literal)).with_attr(attr::SPARSE_LAYOUT, AttrValue::Sparse(layout));
        ValueRef::first(self.graph.push_node(node))
    }

    /// Adds a broadcasting elementwise binary operator.
    ///
    /// # Errors
    ///
    /// Returns an error if `kind` is not elementwise binary or the operands
    /// do not broadcast.
    pub fn binary(&mut self, kind: OpKind, lhs: ValueRef, rhs: ValueRef) -> Result<ValueRef, GraphError> {
        if !kind.is_elementwise_binary() {
            return Err(GraphError::UnexpectedKind(kind));
        }
        let ty = infer::broadcast(self.value_type(lhs)?, self.value_type(rhs)?)?;
        Ok(self.push(Node::new(kind, [lhs, rhs], ty)))
    }

    /// `lhs + rhs`.
    ///
    /// # Errors
    ///
    /// Returns an error if the operands do not broadcast.
    pub fn add(&mut self, lhs: ValueRef, rhs: ValueRef) -> Result<ValueRef, GraphError> {
        self.binary(OpKind::Add, lhs, rhs)
    }

    /// `lhs - rhs`.
    ///
    /// # Errors
    ///
    /// Returns an error if the operands do not broadcast.
    pub fn sub(&mut self, lhs: ValueRef, rhs: ValueRef) -> Result<ValueRef, GraphError> {
        self.binary(OpKind::Sub, lhs, rhs)
    }

    /// `lhs * rhs`, elementwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the operands do not broadcast.
    pub fn mul(&mut self, lhs: ValueRef, rhs: ValueRef) -> Result<ValueRef, GraphError> {
        self.binary(OpKind::Mul, lhs, rhs)
    }

    /// `lhs / rhs`, elementwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the operands do not broadcast.
    pub fn div(&mut self, lhs: ValueRef, rhs: ValueRef) -> Result<ValueRef, GraphError> {
        self.binary(OpKind::Div, lhs, rhs)
    }

    /// Adds a type-preserving unary operator (`Neg`, `Sqrt`, `Exp`, `Relu`).
    ///
    /// # Errors
    ///
    /// Returns an error if `value` does not exist or `kind` is not one of
    /// the type-preserving unary operators.
    pub fn unary(&mut self, kind: OpKind, value: ValueRef) -> Result<ValueRef, GraphError> {
        if !matches!(kind, OpKind::Neg | OpKind::Sqrt | OpKind::Exp | OpKind::Relu) {
            return Err(GraphError::UnexpectedKind(kind));
        }
        let ty = self.value_type(value)?.clone();
        Ok(self.push(Node::new(kind, [value], ty)))
    }

    /// `-value`.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` does not exist.
    pub fn neg(&mut self, value: ValueRef) -> Result<ValueRef, GraphError> {
        self.unary(OpKind::Neg, value)
    }

    /// `sqrt(value)`.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` does not exist.
    pub fn sqrt(&mut self, value: ValueRef) -> Result<ValueRef, GraphError> {
        self.unary(OpKind::Sqrt, value)
    }

    /// Permutes axes; `None` reverses them.
    ///
    /// # Errors
    ///
    /// Returns an error if `perm` is not a permutation of the axes.
    pub fn transpose(&mut self, value: ValueRef, perm: Option<&[i64]>) -> Result<ValueRef, GraphError> {
        let ty = infer::transpose(self.value_type(value)?, perm)?;
        let mut node = Node::new(OpKind::Transpose, [value], ty);
        if let Some(perm) = perm {
            node = node.with_attr(attr::PERM, AttrValue::Ints(perm.to_vec()));
        }
        Ok(self.push(node))
    }

    /// Inserts size-1 axes.
    ///
    /// # Errors
    ///
    /// Returns an error for out-of-range or repeated axes.
    pub fn unsqueeze(&mut self, value: ValueRef, axes: &[i64]) -> Result<ValueRef, GraphError> {
        let ty = infer::unsqueeze(self.value_type(value)?, axes)?;
        let node = Node::new(OpKind::Unsqueeze, [value], ty).with_attr(attr::AXES, AttrValue::Ints(axes.to_vec()));
        Ok(self.push(node))
    }

    /// 2-D matrix product.
    ///
    /// # Errors
    ///
    /// Returns an error if the operands are not compatible matrices.
    pub fn matmul(&mut self, lhs: ValueRef, rhs: ValueRef) -> Result<ValueRef, GraphError> {
        let ty = infer::matmul(self.value_type(lhs)?, self.value_type(rhs)?)?;
        Ok(self.push(Node::new(OpKind::MatMul, [lhs, rhs], ty)))
    }

    /// Adds an arbitrary pre-typed node.
    ///
    /// # Errors
    ///
    /// Returns an error if an operand does not exist.
    pub fn node(&mut self, node: Node) -> Result<ValueRef, GraphError> {
        for &value in &node.inputs {
            self.value_type(value)?;
        }
        Ok(self.push(node))
    }

    /// Declares a named output.
    pub fn output(&mut self, name: &str, value: ValueRef) {
        self.graph.add_output(name, value);
    }

    /// Validates and returns the graph.
    ///
    /// # Errors
    ///
    /// Returns the first structural problem [`Graph::validate`] finds.
    pub fn finish(self) -> Result<Graph, GraphError> {
        self.graph.validate()?;
        Ok(self.graph)
    }

    fn push(&mut self, node: Node) -> ValueRef {
        ValueRef::first(self.graph.push_node(node))
    }
}
