//! Normalization of commutative/associative chains.
//!
//! Shared by the additive and multiplicative families. The rules move
//! constants right and up so that they meet and can be folded:
//!
//! ```text
//! commute           op(c, x)                    -> op(x, c)
//! constants         op(op(x, c1), c2)           -> op(x, op(c1, c2))
//! double            op(op(x, c1), op(y, c2))    -> op(op(x, y), op(c1, c2))
//! variables         op(op(x, c), y)             -> op(op(x, y), c)
//! variables-mirror  op(x, op(y, c))             -> op(op(x, y), c)
//! ```
//!
//! `double` is tried before the single-constant shapes, which would
//! otherwise always match first.
//!
//! `x` and `y` must not be constant nodes, and must not be chains built
//! only from constants that failed to fold.

use tfold_graph::OpKind;

use super::rebuild;
use crate::pattern::{Pattern, Predicate, Var};
use crate::rule::{Rule, RuleFamily, RuleKind};
use crate::termination::has_variable_leaf;

/// Rule names for one chain operator.
pub(super) struct ChainNames {
    pub commute: &'static str,
    pub constants: &'static str,
    pub double: &'static str,
    pub variables: &'static str,
    pub variables_mirror: &'static str,
}

/// `name` is bound to a non-constant value whose `op` chain has at least
/// one variable leaf.
fn variable(rule: Rule, op: OpKind, name: Var) -> Rule {
    rule.with_predicate(Predicate::NotConstant(name))
        .with_predicate(Predicate::custom(move |graph, m| {
            m.get(name).is_some_and(|b| has_variable_leaf(graph, op, b.value))
        }))
}

fn normalize(name: &'static str, family: RuleFamily, pattern: Pattern) -> Rule {
    Rule::new(name, family, RuleKind::Normalize, pattern)
}

pub(super) fn rules(op: OpKind, family: RuleFamily, names: &ChainNames) -> Vec<Rule> {
    let any = Pattern::any;
    let constant = Pattern::constant;
    let node = |lhs, rhs| Pattern::op(op, [lhs, rhs]);

    let commute = variable(normalize(names.commute, family, node(constant("c"), any("x"))), op, "x")
        .with_predicate(Predicate::Dense("c"))
        .with_build(move |b, m| rebuild(b, m, op, "x", "c"));

    let constants = variable(
        normalize(names.constants, family, node(node(any("x"), constant("c1")), constant("c2"))),
        op,
        "x",
    )
    .with_predicate(Predicate::Dense("c1"))
    .with_predicate(Predicate::Dense("c2"))
    .with_build(move |b, m| {
        let folded = rebuild(b, m, op, "c1", "c2")?;
        b.binary(op, m.value("x")?, folded)
    });

    let variables = variable(
        variable(
            normalize(names.variables, family, node(node(any("x"), constant("c")), any("y"))),
            op,
            "x",
        ),
        op,
        "y",
    )
    .with_predicate(Predicate::Dense("c"))
    .with_build(move |b, m| {
        let xy = rebuild(b, m, op, "x", "y")?;
        b.binary(op, xy, m.value("c")?)
    });

    let variables_mirror = variable(
        variable(
            normalize(names.variables_mirror, family, node(any("x"), node(any("y"), constant("c")))),
            op,
            "x",
        ),
        op,
        "y",
    )
    .with_predicate(Predicate::Dense("c"))
    .with_build(move |b, m| {
        let xy = rebuild(b, m, op, "x", "y")?;
        b.binary(op, xy, m.value("c")?)
    });

    let double = variable(
        variable(
            normalize(
                names.double,
                family,
                node(node(any("x"), constant("c1")), node(any("y"), constant("c2"))),
            ),
            op,
            "x",
        ),
        op,
        "y",
    )
    .with_predicate(Predicate::Dense("c1"))
    .with_predicate(Predicate::Dense("c2"))
    .with_build(move |b, m| {
        let xy = rebuild(b, m, op, "x", "y")?;
        let cc = rebuild(b, m, op, "c1", "c2")?;
        b.binary(op, xy, cc)
    });

    vec![commute, constants, double, variables, variables_mirror]
}
