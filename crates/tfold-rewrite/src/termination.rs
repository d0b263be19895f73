//! Termination measures.
//!
//! Every rule declares a well-founded measure on the expression it rewrites.
//! With verification on, the driver evaluates the measure on the matched
//! root and on the replacement and refuses any application that does not
//! strictly decrease it.
//!
//! ## Chain measure
//!
//! For a commutative/associative operator `op`, the *chain* rooted at a
//! value is the binary tree of `op` nodes reachable through `op` operands;
//! every other value is a leaf. A subtree whose leaves are all constants is
//! a *constant group* and counts as one item. The measure is the tuple
//!
//! | Component | Meaning |
//! |-----------|---------|
//! | groups | number of maximal constant groups |
//! | inversions | pairs (constant item, later variable item) in operand order |
//! | right weight | sum over open nodes of `items(right operand) - 1` |
//! | nodes | number of `op` nodes in the chain |
//!
//! compared lexicographically.

use rustc_hash::FxHashSet;
use tfold_graph::{Graph, OpKind, ValueRef};

/// The measure a rule promises to decrease.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Termination {
    /// The chain measure of `op` chains.
    Chain(OpKind),
    /// The number of `op` nodes reachable from the value.
    Eliminates(OpKind),
    /// No measure; only the iteration ceiling bounds the rule.
    Unchecked,
}

/// An evaluated measure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Measure {
    /// See [`ChainMeasure`].
    Chain(ChainMeasure),
    /// Node count of [`Termination::Eliminates`].
    Count(usize),
}

/// Lexicographic chain measure. Field order is comparison order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChainMeasure {
    /// Maximal constant groups.
    pub groups: usize,
    /// Constant-before-variable item pairs.
    pub inversions: usize,
    /// Right-nesting weight.
    pub right_weight: usize,
    /// `op` nodes in the chain.
    pub nodes: usize,
}

impl Termination {
    /// Evaluates the measure at `value`; `None` for [`Termination::Unchecked`].
    #[must_use]
    pub fn measure(self, graph: &Graph, value: ValueRef) -> Option<Measure> {
        match self {
            Self::Chain(op) => Some(Measure::Chain(chain_measure(graph, op, value))),
            Self::Eliminates(op) => Some(Measure::Count(count_reachable(graph, op, value))),
            Self::Unchecked => None,
        }
    }
}

impl Measure {
    /// Returns true if `self` is strictly smaller than `other`. Measures of
    /// different kinds are incomparable.
    #[must_use]
    pub fn is_below(&self, other: &Measure) -> bool {
        match (self, other) {
            (Self::Chain(a), Self::Chain(b)) => a < b,
            (Self::Count(a), Self::Count(b)) => a < b,
            _ => false,
        }
    }
}

enum ChainNode {
    Leaf,
    Op { left: usize, right: usize },
}

struct ChainTree {
    nodes: Vec<ChainNode>,
    constant_only: Vec<bool>,
    items: Vec<usize>,
}

impl ChainTree {
    fn build(graph: &Graph, op: OpKind, root: ValueRef) -> (Self, usize) {
        let mut tree = Self {
            nodes: Vec::new(),
            constant_only: Vec::new(),
            items: Vec::new(),
        };
        let root = tree.add(graph, op, root);
        (tree, root)
    }

    fn add(&mut self, graph: &Graph, op: OpKind, value: ValueRef) -> usize {
        let node = graph.producer(value);
        let operands = node
            .filter(|n| n.kind == op && n.inputs.len() == 2)
            .map(|n| (n.inputs[0], n.inputs[1]));

        let (entry, constant_only, items) = match operands {
            Some((lhs, rhs)) => {
                let left = self.add(graph, op, lhs);
                let right = self.add(graph, op, rhs);
                let constant_only = self.constant_only[left] && self.constant_only[right];
                let items = if constant_only {
                    1
                } else {
                    self.items[left] + self.items[right]
                };
                (ChainNode::Op { left, right }, constant_only, items)
            }
            None => {
                let constant = node.is_some_and(tfold_graph::Node::is_constant);
                (ChainNode::Leaf, constant, 1)
            }
        };
        self.nodes.push(entry);
        self.constant_only.push(constant_only);
        self.items.push(items);
        self.nodes.len() - 1
    }

    fn score(&self, idx: usize, constants_seen: &mut usize, m: &mut ChainMeasure) {
        if self.constant_only[idx] {
            m.groups += 1;
            *constants_seen += 1;
            return;
        }
        match self.nodes[idx] {
            ChainNode::Leaf => m.inversions += *constants_seen,
            ChainNode::Op { left, right } => {
                m.right_weight += self.items[right] - 1;
                self.score(left, constants_seen, m);
                self.score(right, constants_seen, m);
            }
        }
    }
}

/// Computes the [`ChainMeasure`] of the `op` chain rooted at `value`.
#[must_use]
pub fn chain_measure(graph: &Graph, op: OpKind, value: ValueRef) -> ChainMeasure {
    let (tree, root) = ChainTree::build(graph, op, value);
    let mut measure = ChainMeasure {
        nodes: tree.nodes.iter().filter(|n| matches!(n, ChainNode::Op { .. })).count(),
        ..ChainMeasure::default()
    };
    tree.score(root, &mut 0, &mut measure);
    measure
}

/// Returns true if the `op` chain rooted at `value` has at least one leaf
/// that is not a constant.
///
/// Normalization only moves variables relative to constants, so chains made
/// purely of constants that could not be folded are left alone.
#[must_use]
pub fn has_variable_leaf(graph: &Graph, op: OpKind, value: ValueRef) -> bool {
    let (tree, root) = ChainTree::build(graph, op, value);
    !tree.constant_only[root]
}

/// Counts the distinct `op` nodes reachable from `value`.
#[must_use]
pub fn count_reachable(graph: &Graph, op: OpKind, value: ValueRef) -> usize {
    let mut seen = FxHashSet::default();
    let mut stack = vec![value.node];
    let mut count = 0;
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        let Some(node) = graph.get(id) else { continue };
        if node.kind == op {
            count += 1;
        }
        stack.extend(node.inputs.iter().map(|input| input.node));
    }
    count
}
