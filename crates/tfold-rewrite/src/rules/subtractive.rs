//! Subtractive family: `Sub` and the elementwise unary operators.

use tfold_graph::OpKind;
use tfold_tensor::{eval, BinaryOp, UnaryOp};

use super::{binary_fold, unary_fold};
use crate::pattern::{Pattern, Predicate};
use crate::rule::{Rule, RuleFamily, RuleKind};
use crate::termination::Termination;

/// Rule names, in application order.
pub const NAMES: [&str; 4] = ["sub-fold", "neg-fold", "sub-to-add", "sqrt-fold"];

/// The subtractive rules, in application order.
#[must_use]
pub fn rules() -> Vec<Rule> {
    let family = RuleFamily::Subtractive;

    // x - c  ->  x + (-c), with the negation evaluated now so the result
    // joins the additive chain.
    let sub_to_add = Rule::new(
        NAMES[2],
        family,
        RuleKind::Normalize,
        Pattern::op(OpKind::Sub, [Pattern::any("x"), Pattern::constant("c")]),
    )
    .with_predicate(Predicate::NotConstant("x"))
    .with_predicate(Predicate::Dense("c"))
    .with_termination(Termination::Eliminates(OpKind::Sub))
    .with_build(|b, m| {
        let negated = b.constant(eval::unary(UnaryOp::Neg, m.literal("c")?)?);
        b.binary(OpKind::Add, m.value("x")?, negated)
    });

    vec![
        binary_fold(NAMES[0], family, OpKind::Sub, BinaryOp::Sub),
        unary_fold(NAMES[1], family, OpKind::Neg, UnaryOp::Neg),
        sub_to_add,
        unary_fold(NAMES[3], family, OpKind::Sqrt, UnaryOp::Sqrt),
    ]
}
