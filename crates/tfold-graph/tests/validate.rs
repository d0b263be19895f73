//! Structural validation of hand-assembled graphs.

use std::sync::Arc;

use tfold_graph::{Graph, GraphBuilder, GraphError, Node, OpKind, ValueRef, ValueType};
use tfold_tensor::{DType, TensorLiteral};

fn ty() -> ValueType {
    ValueType::new(DType::Float32, [2])
}

#[test]
fn test_builder_output_validates() {
    let mut b = GraphBuilder::new("ok");
    let x = b.input("x", ty());
    let c = b.constant(TensorLiteral::vector(vec![1.0f32, 2.0]));
    let s = b.add(x, c).unwrap();
    let t = b.sqrt(s).unwrap();
    b.output("t", t);
    let g = b.finish().unwrap();
    assert_eq!(g.len(), 4);
    assert_eq!(g.value_type(t), Some(&ty()));
}

#[test]
fn test_wrong_arity() {
    let mut g = Graph::new("arity");
    let x = g.add_input("x", ty());
    let id = g.push_node(Node::new(OpKind::Add, [x], ty()));
    g.add_output("y", ValueRef::first(id));
    assert_eq!(
        g.validate(),
        Err(GraphError::Arity {
            node: id,
            kind: OpKind::Add,
            expected: 2,
            got: 1
        })
    );
}

#[test]
fn test_forward_reference() {
    let mut other = GraphBuilder::new("other");
    let a = other.input("a", ty());
    let b = other.input("b", ty());
    let later = other.add(a, b).unwrap();

    let mut g = Graph::new("forward");
    let x = g.add_input("x", ty());
    let id = g.push_node(Node::new(OpKind::Add, [x, later], ty()));
    g.add_output("y", ValueRef::first(id));
    assert!(matches!(g.validate(), Err(GraphError::ForwardReference { .. })));
}

#[test]
fn test_constant_type_mismatch() {
    let mut g = Graph::new("constant");
    let mut node = Node::constant(Arc::new(TensorLiteral::vector(vec![1i32, 2])));
    node.outputs[0] = ty();
    let id = g.push_node(node);
    g.add_output("c", ValueRef::first(id));
    assert_eq!(g.validate(), Err(GraphError::BadConstant { node: id }));
}

#[test]
fn test_duplicate_output_name() {
    let mut b = GraphBuilder::new("dup");
    let x = b.input("x", ty());
    b.output("y", x);
    b.output("y", x);
    assert_eq!(b.finish(), Err(GraphError::DuplicateOutput("y".into())));
}

#[test]
fn test_incompatible_operands_are_rejected_by_builder() {
    let mut b = GraphBuilder::new("bad");
    let x = b.input("x", ty());
    let y = b.input("y", ValueType::new(DType::Float32, [3]));
    assert!(matches!(b.add(x, y), Err(GraphError::Incompatible { .. })));
    let i = b.input("i", ValueType::new(DType::Int32, [2]));
    assert!(matches!(b.mul(x, i), Err(GraphError::Incompatible { .. })));
}
