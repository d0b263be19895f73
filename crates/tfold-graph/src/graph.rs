//! The graph container: node arena, declared interface, traversal and
//! compaction.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tfold_index::{Idx, IndexVec};

use crate::{attr, AttrValue, GraphError, Node, NodeId, OpKind, ValueRef, ValueType};

/// A named graph result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphOutput {
    /// External name.
    pub name: String,
    /// The value returned under that name.
    pub value: ValueRef,
}

/// An acyclic tensor dataflow graph.
///
/// Nodes live in an append-only arena. Appending never invalidates existing
/// [`ValueRef`]s; unused nodes are only dropped by [`Graph::compact`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    name: String,
    nodes: IndexVec<NodeId, Node>,
    inputs: Vec<NodeId>,
    outputs: Vec<GraphOutput>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    New,
    Open,
    Done,
}

impl Graph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: IndexVec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// The graph's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of nodes in the arena, live or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns a node.
    ///
    /// # Panics
    ///
    /// Panics if `id` is out of range.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// Returns a node if `id` is in range.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Iterates over all nodes with their ids.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.nodes.iter_enumerated()
    }

    /// The declared input nodes, in interface order.
    #[must_use]
    pub fn inputs(&self) -> &[NodeId] {
        &self.inputs
    }

    /// The declared outputs, in interface order.
    #[must_use]
    pub fn outputs(&self) -> &[GraphOutput] {
        &self.outputs
    }

    /// The declared type of a value.
    #[must_use]
    pub fn value_type(&self, value: ValueRef) -> Option<&ValueType> {
        self.nodes
            .get(value.node)
            .and_then(|node| node.outputs.get(value.output as usize))
    }

    /// The node producing a value.
    #[must_use]
    pub fn producer(&self, value: ValueRef) -> Option<&Node> {
        self.nodes.get(value.node)
    }

    /// Appends a node and returns its id.
    ///
    /// The caller is responsible for only referencing existing values;
    /// [`Graph::validate`] checks this.
    pub fn push_node(&mut self, node: Node) -> NodeId {
        self.nodes.push(node)
    }

    /// Appends a named external input of the given type.
    pub fn add_input(&mut self, name: &str, ty: ValueType) -> ValueRef {
        let node = Node::new(OpKind::Input, [], ty).with_attr(attr::NAME, AttrValue::Str(name.to_string()));
        let id = self.nodes.push(node);
        self.inputs.push(id);
        ValueRef::first(id)
    }

    /// Declares a named output.
    pub fn add_output(&mut self, name: &str, value: ValueRef) {
        self.outputs.push(GraphOutput {
            name: name.to_string(),
            value,
        });
    }

    /// Drops every node at position `len` or later.
    ///
    /// Used to roll back nodes appended by an abandoned rewrite. Nodes
    /// before `len` are untouched, so existing references stay valid.
    pub fn truncate(&mut self, len: usize) {
        self.nodes.truncate(len);
        self.inputs.retain(|id| id.index() < len);
    }

    /// The external name of an input node.
    #[must_use]
    pub fn input_name(&self, id: NodeId) -> Option<&str> {
        match self.nodes.get(id)?.attr(attr::NAME) {
            Some(AttrValue::Str(name)) => Some(name),
            _ => None,
        }
    }

    /// The live nodes in topological order: declared inputs first, then a
    /// depth-first post-order from the declared outputs.
    ///
    /// # Errors
    ///
    /// Returns an error if a reference dangles or the graph has a cycle.
    pub fn live_order(&self) -> Result<Vec<NodeId>, GraphError> {
        self.post_order(&|value| value)
    }

    /// Rebuilds the graph from its live roots.
    ///
    /// Every use of a key in `forwards` is redirected to its value (chains
    /// are followed). The result keeps every declared input plus every node
    /// reachable from the declared outputs, renumbered in the order of
    /// [`Graph::live_order`], so node ids are topological afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if a reference dangles or a forward creates a cycle.
    pub fn compact(&self, forwards: &FxHashMap<ValueRef, ValueRef>) -> Result<Graph, GraphError> {
        let resolve = |value| resolve_forward(forwards, value);
        let order = self.post_order(&resolve)?;

        let mut remap: Vec<Option<NodeId>> = vec![None; self.nodes.len()];
        let mut nodes = IndexVec::with_capacity(order.len());
        for old in order {
            let mut node = self.nodes[old].clone();
            for input in &mut node.inputs {
                let target = resolve(*input);
                let new = remap[target.node.index()].ok_or(GraphError::DanglingValue {
                    node: Some(old),
                    value: target,
                })?;
                *input = ValueRef {
                    node: new,
                    output: target.output,
                };
            }
            remap[old.index()] = Some(nodes.push(node));
        }

        let inputs = self.inputs.iter().filter_map(|id| remap[id.index()]).collect();
        let outputs = self
            .outputs
            .iter()
            .map(|out| {
                let target = resolve(out.value);
                let node = remap
                    .get(target.node.index())
                    .copied()
                    .flatten()
                    .ok_or(GraphError::DanglingValue { node: None, value: target })?;
                Ok(GraphOutput {
                    name: out.name.clone(),
                    value: ValueRef {
                        node,
                        output: target.output,
                    },
                })
            })
            .collect::<Result<_, GraphError>>()?;

        Ok(Graph {
            name: self.name.clone(),
            nodes,
            inputs,
            outputs,
        })
    }

    /// Checks structural consistency.
    ///
    /// - every operand refers to an existing output of an earlier node
    /// - operators with a fixed arity have that many operands
    /// - constants carry a literal matching their declared type
    /// - declared inputs are `Input` nodes and declared outputs exist
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub fn validate(&self) -> Result<(), GraphError> {
        for (id, node) in self.nodes.iter_enumerated() {
            if let Some(expected) = node.kind.arity() {
                if node.inputs.len() != expected {
                    return Err(GraphError::Arity {
                        node: id,
                        kind: node.kind,
                        expected,
                        got: node.inputs.len(),
                    });
                }
            }
            for &value in &node.inputs {
                if value.node >= id {
                    return Err(GraphError::ForwardReference { node: id, value });
                }
                if self.value_type(value).is_none() {
                    return Err(GraphError::DanglingValue { node: Some(id), value });
                }
            }
            if node.is_constant() {
                let matches = node.outputs.len() == 1
                    && node
                        .literal()
                        .is_some_and(|lit| ValueType::of_literal(lit) == node.outputs[0]);
                if !matches {
                    return Err(GraphError::BadConstant { node: id });
                }
            }
        }

        for &id in &self.inputs {
            if self.nodes.get(id).map(|node| node.kind) != Some(OpKind::Input) {
                return Err(GraphError::NotAnInput(id));
            }
        }

        for (i, out) in self.outputs.iter().enumerate() {
            if self.value_type(out.value).is_none() {
                return Err(GraphError::DanglingValue {
                    node: None,
                    value: out.value,
                });
            }
            if self.outputs[..i].iter().any(|prev| prev.name == out.name) {
                return Err(GraphError::DuplicateOutput(out.name.clone()));
            }
        }
        Ok(())
    }

    fn post_order(&self, resolve: &dyn Fn(ValueRef) -> ValueRef) -> Result<Vec<NodeId>, GraphError> {
        let mut marks = vec![Mark::New; self.nodes.len()];
        let mut order = Vec::with_capacity(self.nodes.len());

        for &input in &self.inputs {
            if marks[input.index()] == Mark::New {
                marks[input.index()] = Mark::Done;
                order.push(input);
            }
        }

        for out in &self.outputs {
            let root = resolve(out.value);
            match marks.get(root.node.index()) {
                None => return Err(GraphError::DanglingValue { node: None, value: root }),
                Some(Mark::New) => {}
                Some(_) => continue,
            }
            marks[root.node.index()] = Mark::Open;
            let mut stack: Vec<(NodeId, usize)> = vec![(root.node, 0)];

            while let Some(top) = stack.last_mut() {
                let (node, next) = *top;
                let inputs = &self.nodes[node].inputs;
                if next < inputs.len() {
                    top.1 += 1;
                    let child = resolve(inputs[next]);
                    match marks.get(child.node.index()) {
                        None => {
                            return Err(GraphError::DanglingValue {
                                node: Some(node),
                                value: child,
                            })
                        }
                        Some(Mark::New) => {
                            marks[child.node.index()] = Mark::Open;
                            stack.push((child.node, 0));
                        }
                        Some(Mark::Open) => return Err(GraphError::Cycle { node: child.node }),
                        Some(Mark::Done) => {}
                    }
                } else {
                    marks[node.index()] = Mark::Done;
                    order.push(node);
                    stack.pop();
                }
            }
        }
        Ok(order)
    }
}

fn resolve_forward(forwards: &FxHashMap<ValueRef, ValueRef>, mut value: ValueRef) -> ValueRef {
    // A well-formed forward map has no cycles; bound the walk anyway.
    for _ in 0..=forwards.len() {
        match forwards.get(&value) {
            Some(&next) => value = next,
            None => break,
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use tfold_tensor::{DType, TensorLiteral};

    fn f32_ty(dims: &[usize]) -> ValueType {
        ValueType::new(DType::Float32, dims.iter().copied())
    }

    /// x, dead constant, c, Add(x, c) -> "y"
    fn sample() -> (Graph, ValueRef, ValueRef) {
        let mut g = Graph::new("sample");
        let x = g.add_input("x", f32_ty(&[2]));
        g.push_node(Node::constant(Arc::new(TensorLiteral::vector(vec![9.0f32, 9.0]))));
        let c = ValueRef::first(g.push_node(Node::constant(Arc::new(TensorLiteral::vector(vec![1.0f32, 2.0])))));
        let add = ValueRef::first(g.push_node(Node::new(OpKind::Add, [x, c], f32_ty(&[2]))));
        g.add_output("y", add);
        (g, x, add)
    }

    #[test]
    fn test_live_order_skips_dead_nodes() {
        let (g, _, _) = sample();
        let order = g.live_order().unwrap();
        assert_eq!(order, vec![NodeId::new(0), NodeId::new(2), NodeId::new(3)]);
    }

    #[test]
    fn test_compact_drops_garbage_and_renumbers() {
        let (g, _, _) = sample();
        let compacted = g.compact(&FxHashMap::default()).unwrap();
        assert_eq!(compacted.len(), 3);
        assert_eq!(compacted.inputs(), &[NodeId::new(0)]);
        assert_eq!(compacted.outputs()[0].value, ValueRef::first(NodeId::new(2)));
        assert!(compacted.validate().is_ok());
    }

    #[test]
    fn test_compact_follows_forwards() {
        let (mut g, x, add) = sample();
        let neg = ValueRef::first(g.push_node(Node::new(OpKind::Neg, [x], f32_ty(&[2]))));
        let mut forwards = FxHashMap::default();
        forwards.insert(add, neg);
        let compacted = g.compact(&forwards).unwrap();
        assert_eq!(compacted.len(), 2);
        let out = compacted.outputs()[0].value;
        assert_eq!(compacted.node(out.node).kind, OpKind::Neg);
    }

    #[test]
    fn test_compact_keeps_unused_inputs() {
        let mut g = Graph::new("unused");
        g.add_input("a", f32_ty(&[1]));
        let b = g.add_input("b", f32_ty(&[1]));
        g.add_output("out", b);
        let compacted = g.compact(&FxHashMap::default()).unwrap();
        assert_eq!(compacted.inputs().len(), 2);
        assert_eq!(compacted.input_name(compacted.inputs()[0]), Some("a"));
    }

    #[test]
    fn test_forward_into_own_operand_is_a_cycle() {
        let (g, _, add) = sample();
        let mut forwards = FxHashMap::default();
        // Redirect the constant operand to the Add that reads it.
        forwards.insert(ValueRef::first(NodeId::new(2)), add);
        assert!(matches!(g.compact(&forwards), Err(GraphError::Cycle { .. })));
    }

    #[test]
    fn test_truncate_rolls_back_appended_nodes() {
        let (mut g, x, _) = sample();
        let before = g.clone();
        g.push_node(Node::new(OpKind::Neg, [x], f32_ty(&[2])));
        g.truncate(before.len());
        assert_eq!(g, before);
    }

    #[test]
    fn test_validate_rejects_forward_reference() {
        let mut g = Graph::new("bad");
        let x = g.add_input("x", f32_ty(&[2]));
        g.push_node(Node::new(OpKind::Add, [x, ValueRef::first(NodeId::new(1))], f32_ty(&[2])));
        assert!(matches!(g.validate(), Err(GraphError::ForwardReference { .. })));
    }

    #[test]
    fn test_validate_rejects_mistyped_constant() {
        let mut g = Graph::new("bad");
        let mut node = Node::constant(Arc::new(TensorLiteral::vector(vec![1i32, 2])));
        node.outputs[0] = f32_ty(&[2]);
        let id = g.push_node(node);
        g.add_output("c", ValueRef::first(id));
        assert_eq!(g.validate(), Err(GraphError::BadConstant { node: id }));
    }

    #[test]
    fn test_validate_rejects_duplicate_outputs() {
        let (mut g, x, _) = sample();
        g.add_output("y", x);
        assert_eq!(g.validate(), Err(GraphError::DuplicateOutput("y".into())));
    }

    #[test]
    fn test_serde_json_dump() {
        let (g, _, _) = sample();
        let json = serde_json::to_string(&g).unwrap();
        let back: Graph = serde_json::from_str(&json).unwrap();
        assert_eq!(back, g);
    }
}
