//! The construction handle passed to rule builds.

use std::sync::Arc;

use tfold_graph::{infer, Graph, Node, OpKind, ValueRef, ValueType};
use tfold_tensor::TensorLiteral;

use crate::error::BuildError;

/// Appends nodes to the graph being rewritten.
///
/// A build only ever appends; if it fails the driver truncates the graph
/// back to where the build started, so partially built replacements never
/// survive.
#[derive(Debug)]
pub struct RewriteBuilder<'g> {
    graph: &'g mut Graph,
    start: usize,
}

impl<'g> RewriteBuilder<'g> {
    /// Wraps `graph`; nodes appended from here on belong to this build.
    pub fn new(graph: &'g mut Graph) -> Self {
        let start = graph.len();
        Self { graph, start }
    }

    /// Read access to the graph, including nodes this build appended.
    #[must_use]
    pub fn graph(&self) -> &Graph {
        self.graph
    }

    /// Number of nodes appended so far.
    #[must_use]
    pub fn appended(&self) -> usize {
        self.graph.len() - self.start
    }

    /// The declared type of a value.
    ///
    /// # Errors
    ///
    /// Returns a graph error if `value` does not exist.
    pub fn value_type(&self, value: ValueRef) -> Result<&ValueType, BuildError> {
        self.graph
            .value_type(value)
            .ok_or(BuildError::Graph(tfold_graph::GraphError::DanglingValue { node: None, value }))
    }

    /// Appends a dense constant.
    pub fn constant(&mut self, literal: TensorLiteral) -> ValueRef {
        ValueRef::first(self.graph.push_node(Node::constant(Arc::new(literal))))
    }

    /// Appends a broadcasting elementwise binary node, typing it from its
    /// operands.
    ///
    /// # Errors
    ///
    /// Returns a recoverable graph error if the operands cannot be combined.
    pub fn binary(&mut self, kind: OpKind, lhs: ValueRef, rhs: ValueRef) -> Result<ValueRef, BuildError> {
        if !kind.is_elementwise_binary() {
            return Err(BuildError::Graph(tfold_graph::GraphError::UnexpectedKind(kind)));
        }
        let ty = infer::broadcast(self.value_type(lhs)?, self.value_type(rhs)?)?;
        Ok(ValueRef::first(self.graph.push_node(Node::new(kind, [lhs, rhs], ty))))
    }

    /// The integer-list attribute `name` of the node producing `value`.
    #[must_use]
    pub fn ints_attr(&self, value: ValueRef, name: &str) -> Option<&[i64]> {
        self.graph.producer(value)?.ints_attr(name)
    }
}
