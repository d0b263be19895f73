//! Behaviour of the built-in rule families on small graphs.

use std::sync::Arc;

use tfold_graph::{attr, AttrValue, Graph, GraphBuilder, Node, OpKind, SparseLayout, ValueRef, ValueType};
use tfold_rewrite::{default_rules, Pattern, RewriteConfig, RewriteError, RewriteStats, Rewriter};
use tfold_tensor::{DType, EvalError, TensorLiteral};

fn config() -> RewriteConfig {
    RewriteConfig {
        verify_termination: true,
        ..RewriteConfig::default()
    }
}

fn run(graph: Graph) -> (Graph, RewriteStats) {
    let rules = default_rules();
    Rewriter::new(&rules, config()).run(graph).unwrap()
}

fn output<'g>(graph: &'g Graph, name: &str) -> &'g Node {
    let out = graph.outputs().iter().find(|o| o.name == name).unwrap();
    graph.producer(out.value).unwrap()
}

fn folded(graph: &Graph, name: &str) -> Arc<TensorLiteral> {
    Arc::clone(output(graph, name).literal().expect("output is not a constant"))
}

fn scalar_input(b: &mut GraphBuilder, name: &str) -> ValueRef {
    b.input(name, ValueType::new(DType::Int32, []))
}

#[test]
fn test_add_fold() {
    let mut b = GraphBuilder::new("fold");
    let c1 = b.constant(TensorLiteral::vector(vec![1.0f32, 2.0, 3.0]));
    let c2 = b.constant(TensorLiteral::vector(vec![4.0f32, 5.0, 6.0]));
    let sum = b.add(c1, c2).unwrap();
    b.output("y", sum);

    let (g, stats) = run(b.finish().unwrap());
    assert_eq!(folded(&g, "y").as_slice::<f32>(), Some(&[5.0f32, 7.0, 9.0][..]));
    assert_eq!(g.len(), 1);
    assert_eq!(stats.per_rule.get("add-fold"), Some(&1));
}

#[test]
fn test_mul_fold() {
    let mut b = GraphBuilder::new("fold");
    let c1 = b.constant(TensorLiteral::vector(vec![2i32, 3]));
    let c2 = b.constant(TensorLiteral::vector(vec![4i32, 5]));
    let product = b.mul(c1, c2).unwrap();
    b.output("y", product);

    let (g, _) = run(b.finish().unwrap());
    assert_eq!(folded(&g, "y").as_slice::<i32>(), Some(&[8, 15][..]));
}

#[test]
fn test_float_division_by_zero_folds_to_infinity() {
    let mut b = GraphBuilder::new("fold");
    let c1 = b.constant(TensorLiteral::vector(vec![10.0f32]));
    let c2 = b.constant(TensorLiteral::vector(vec![0.0f32]));
    let q = b.div(c1, c2).unwrap();
    b.output("y", q);

    let (g, _) = run(b.finish().unwrap());
    assert_eq!(folded(&g, "y").as_slice::<f32>(), Some(&[f32::INFINITY][..]));
}

#[test]
fn test_broadcasting_fold() {
    let mut b = GraphBuilder::new("fold");
    let m = b.constant(TensorLiteral::from_vec(&[2, 2], vec![1i32, 2, 3, 4]).unwrap());
    let row = b.constant(TensorLiteral::vector(vec![10i32, 20]));
    let sum = b.add(m, row).unwrap();
    b.output("y", sum);

    let (g, _) = run(b.finish().unwrap());
    let lit = folded(&g, "y");
    assert_eq!(lit.shape().dims(), &[2, 2]);
    assert_eq!(lit.as_slice::<i32>(), Some(&[11, 22, 13, 24][..]));
}

#[test]
fn test_commute_moves_constant_right() {
    let mut b = GraphBuilder::new("commute");
    let x = scalar_input(&mut b, "x");
    let five = b.constant(TensorLiteral::scalar(5i32));
    let sum = b.add(five, x).unwrap();
    b.output("y", sum);

    let (g, stats) = run(b.finish().unwrap());
    let add = output(&g, "y");
    assert_eq!(add.kind, OpKind::Add);
    assert_eq!(g.node(add.inputs[0].node).kind, OpKind::Input);
    let rhs = g.producer(add.inputs[1]).unwrap();
    assert_eq!(rhs.literal().unwrap().as_slice::<i32>(), Some(&[5][..]));
    assert_eq!(stats.per_rule.get("add-commute"), Some(&1));
}

#[test]
fn test_constants_meet_and_fold() {
    // (x + 3) + 4  ->  x + 7
    let mut b = GraphBuilder::new("chain");
    let x = scalar_input(&mut b, "x");
    let three = b.constant(TensorLiteral::scalar(3i32));
    let four = b.constant(TensorLiteral::scalar(4i32));
    let inner = b.add(x, three).unwrap();
    let outer = b.add(inner, four).unwrap();
    b.output("y", outer);

    let (g, stats) = run(b.finish().unwrap());
    let add = output(&g, "y");
    assert_eq!(add.kind, OpKind::Add);
    assert_eq!(g.node(add.inputs[0].node).kind, OpKind::Input);
    let c = g.producer(add.inputs[1]).unwrap().literal().unwrap();
    assert_eq!(c.as_slice::<i32>(), Some(&[7][..]));
    assert_eq!(g.len(), 3);
    assert_eq!(stats.folds, 1);
    assert_eq!(stats.normalizations, 1);
}

#[test]
fn test_sub_becomes_add_and_joins_chain() {
    // (x - 2) + 5  ->  x + 3
    let mut b = GraphBuilder::new("sub");
    let x = scalar_input(&mut b, "x");
    let two = b.constant(TensorLiteral::scalar(2i32));
    let five = b.constant(TensorLiteral::scalar(5i32));
    let diff = b.sub(x, two).unwrap();
    let sum = b.add(diff, five).unwrap();
    b.output("y", sum);

    let (g, stats) = run(b.finish().unwrap());
    let add = output(&g, "y");
    assert_eq!(add.kind, OpKind::Add);
    let c = g.producer(add.inputs[1]).unwrap().literal().unwrap();
    assert_eq!(c.as_slice::<i32>(), Some(&[3][..]));
    assert_eq!(stats.per_rule.get("sub-to-add"), Some(&1));
    assert!(g.nodes().all(|(_, n)| n.kind != OpKind::Sub));
}

#[test]
fn test_variables_are_gathered_before_constants() {
    // (x * 2) * (y * 3)  ->  (x * y) * 6
    let mut b = GraphBuilder::new("mul");
    let x = scalar_input(&mut b, "x");
    let y = scalar_input(&mut b, "y");
    let two = b.constant(TensorLiteral::scalar(2i32));
    let three = b.constant(TensorLiteral::scalar(3i32));
    let l = b.mul(x, two).unwrap();
    let r = b.mul(y, three).unwrap();
    let root = b.mul(l, r).unwrap();
    b.output("z", root);

    let (g, stats) = run(b.finish().unwrap());
    let top = output(&g, "z");
    assert_eq!(top.kind, OpKind::Mul);
    let xy = g.producer(top.inputs[0]).unwrap();
    assert_eq!(xy.kind, OpKind::Mul);
    assert!(xy.inputs.iter().all(|v| g.node(v.node).kind == OpKind::Input));
    let c = g.producer(top.inputs[1]).unwrap().literal().unwrap();
    assert_eq!(c.as_slice::<i32>(), Some(&[6][..]));
    assert_eq!(stats.per_rule.get("mul-reassociate-double"), Some(&1));
}

#[test]
fn test_unary_folds() {
    let mut b = GraphBuilder::new("unary");
    let c = b.constant(TensorLiteral::vector(vec![4.0f64, 9.0]));
    let root = b.sqrt(c).unwrap();
    let neg = b.neg(root).unwrap();
    b.output("y", neg);

    let (g, stats) = run(b.finish().unwrap());
    assert_eq!(folded(&g, "y").as_slice::<f64>(), Some(&[-2.0, -3.0][..]));
    assert_eq!(stats.folds, 2);
}

#[test]
fn test_transpose_fold() {
    let mut b = GraphBuilder::new("shape");
    let c = b.constant(TensorLiteral::from_vec(&[2, 2], vec![1i32, 2, 3, 4]).unwrap());
    let t = b.transpose(c, Some(&[1, 0])).unwrap();
    b.output("y", t);

    let (g, _) = run(b.finish().unwrap());
    let lit = folded(&g, "y");
    assert_eq!(lit.shape().dims(), &[2, 2]);
    assert_eq!(lit.as_slice::<i32>(), Some(&[1, 3, 2, 4][..]));
}

#[test]
fn test_transpose_without_perm_reverses_axes() {
    let mut b = GraphBuilder::new("shape");
    let c = b.constant(TensorLiteral::from_vec(&[2, 3], vec![1i32, 2, 3, 4, 5, 6]).unwrap());
    let t = b.transpose(c, None).unwrap();
    b.output("y", t);

    let (g, _) = run(b.finish().unwrap());
    let lit = folded(&g, "y");
    assert_eq!(lit.shape().dims(), &[3, 2]);
    assert_eq!(lit.as_slice::<i32>(), Some(&[1, 4, 2, 5, 3, 6][..]));
}

#[test]
fn test_unsqueeze_fold() {
    let mut b = GraphBuilder::new("shape");
    let c = b.constant(TensorLiteral::from_vec(&[2, 3], vec![0.5f32; 6]).unwrap());
    let u = b.unsqueeze(c, &[0]).unwrap();
    b.output("y", u);

    let (g, _) = run(b.finish().unwrap());
    let lit = folded(&g, "y");
    assert_eq!(lit.shape().dims(), &[1, 2, 3]);
    assert_eq!(g.value_type(g.outputs()[0].value), Some(&ValueType::new(DType::Float32, [1, 2, 3])));
}

#[test]
fn test_integer_division_by_zero_is_skipped() {
    let mut b = GraphBuilder::new("skip");
    let c1 = b.constant(TensorLiteral::vector(vec![1i32, 2]));
    let c2 = b.constant(TensorLiteral::vector(vec![0i32, 1]));
    let q = b.div(c1, c2).unwrap();
    b.output("y", q);

    let (g, stats) = run(b.finish().unwrap());
    assert_eq!(output(&g, "y").kind, OpKind::Div);
    assert_eq!(stats.iterations, 0);
    assert_eq!(stats.skipped, 1);
}

#[test]
fn test_unsupported_dtypes_are_skipped() {
    let mut b = GraphBuilder::new("skip");
    let bytes = b.constant(TensorLiteral::vector(vec![1u8, 2]));
    let ints = b.constant(TensorLiteral::vector(vec![4i32, 9]));
    let neg = b.neg(bytes).unwrap();
    let root = b.sqrt(ints).unwrap();
    b.output("neg", neg);
    b.output("sqrt", root);

    let (g, stats) = run(b.finish().unwrap());
    assert_eq!(output(&g, "neg").kind, OpKind::Neg);
    assert_eq!(output(&g, "sqrt").kind, OpKind::Sqrt);
    assert!(!stats.has_changes());
    assert_eq!(stats.skipped, 2);
}

#[test]
fn test_integer_overflow_is_skipped() {
    let mut b = GraphBuilder::new("skip");
    let x = scalar_input(&mut b, "x");
    let big = b.constant(TensorLiteral::scalar(i32::MAX));
    let one = b.constant(TensorLiteral::scalar(1i32));
    let inner = b.add(x, big).unwrap();
    let outer = b.add(inner, one).unwrap();
    b.output("y", outer);

    // Re-association builds `MAX + 1`, which cannot fold; the chain stays
    // in its re-associated form and the run still terminates.
    let (g, stats) = run(b.finish().unwrap());
    assert_eq!(stats.per_rule.get("add-reassociate-constants"), Some(&1));
    assert_eq!(stats.per_rule.get("add-fold"), None);
    assert!(stats.skipped >= 1);
    let top = output(&g, "y");
    assert_eq!(g.node(top.inputs[0].node).kind, OpKind::Input);
}

#[test]
fn test_invalid_permutation_is_fatal() {
    let mut b = GraphBuilder::new("bad");
    let c = b.constant(TensorLiteral::from_vec(&[2, 2], vec![1i32, 2, 3, 4]).unwrap());
    let node = Node::new(OpKind::Transpose, [c], ValueType::new(DType::Int32, [2, 2]))
        .with_attr(attr::PERM, AttrValue::Ints(vec![0, 0]));
    let t = b.node(node).unwrap();
    b.output("y", t);

    let rules = default_rules();
    let err = Rewriter::new(&rules, config()).run(b.finish().unwrap()).unwrap_err();
    assert!(matches!(err, RewriteError::Eval { rule: "transpose-fold", .. }), "{err}");
}

#[test]
fn test_negative_permutation_entry_is_reported_as_given() {
    let mut b = GraphBuilder::new("negative");
    let c = b.constant(TensorLiteral::from_vec(&[2, 2], vec![1i32, 2, 3, 4]).unwrap());
    let node = Node::new(OpKind::Transpose, [c], ValueType::new(DType::Int32, [2, 2]))
        .with_attr(attr::PERM, AttrValue::Ints(vec![1, -1]));
    let t = b.node(node).unwrap();
    b.output("y", t);

    let rules = default_rules();
    let err = Rewriter::new(&rules, config()).run(b.finish().unwrap()).unwrap_err();
    assert!(
        matches!(
            err,
            RewriteError::Eval {
                rule: "transpose-fold",
                source: EvalError::NegativePermutation { entry: -1 },
                ..
            }
        ),
        "{err}"
    );
    assert!(err.to_string().contains("negative permutation entry -1"), "{err}");
}

#[test]
fn test_matmul_is_never_touched() {
    let mut b = GraphBuilder::new("matmul");
    let c1 = b.constant(TensorLiteral::from_vec(&[2, 2], vec![1i32, 0, 0, 1]).unwrap());
    let c2 = b.constant(TensorLiteral::from_vec(&[2, 2], vec![5i32, 6, 7, 8]).unwrap());
    let p = b.matmul(c1, c2).unwrap();
    b.output("y", p);

    let (g, stats) = run(b.finish().unwrap());
    assert_eq!(output(&g, "y").kind, OpKind::MatMul);
    assert_eq!(stats.iterations, 0);
}

/// Builds one instance of `pattern`, wildcards becoming fresh inputs and
/// constants becoming literals of type `f32[2,2]`.
fn instantiate(b: &mut GraphBuilder, pattern: &Pattern, sparse: bool, inputs: &mut usize) -> ValueRef {
    let ty = ValueType::new(DType::Float32, [2, 2]);
    match pattern {
        Pattern::Wildcard(name) => {
            *inputs += 1;
            b.input(&format!("{name}{inputs}"), ty)
        }
        Pattern::Constant(_) => {
            let lit = TensorLiteral::from_vec(&[2, 2], vec![1.0f32, 0.0, 0.0, 2.0]).unwrap();
            if sparse {
                b.sparse_constant(lit, SparseLayout::Coo)
            } else {
                b.constant(lit)
            }
        }
        Pattern::Op { kind, inputs: subs, .. } => {
            let args: Vec<_> = subs.iter().map(|p| instantiate(b, p, sparse, inputs)).collect();
            match kind {
                OpKind::Transpose => b.transpose(args[0], Some(&[1, 0])),
                OpKind::Unsqueeze => b.unsqueeze(args[0], &[0]),
                k if k.is_elementwise_binary() => b.binary(*k, args[0], args[1]),
                k => b.unary(*k, args[0]),
            }
            .unwrap()
        }
    }
}

#[test]
fn test_sparse_constants_block_every_rule() {
    let rules = default_rules();
    for rule in rules.iter() {
        for sparse in [true, false] {
            let mut b = GraphBuilder::new(rule.name());
            let root = instantiate(&mut b, rule.pattern(), sparse, &mut 0);
            b.output("out", root);
            let graph = b.finish().unwrap();
            assert!(rule.matches(&graph, root).is_some() != sparse, "{}", rule.name());

            let (_, stats) = Rewriter::new(&rules, config()).run(graph).unwrap();
            if sparse {
                assert_eq!(stats.iterations, 0, "{} rewrote a sparse constant", rule.name());
            } else {
                assert!(stats.has_changes(), "{} did not fire", rule.name());
            }
        }
    }
}
