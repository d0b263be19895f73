//! Multiplicative family: normalization and folding of elementwise `Mul`
//! chains, plus `Div` folding.
//!
//! Only the broadcasting elementwise product is touched; `MatMul` is a
//! different operator kind and never matches.

use tfold_graph::OpKind;
use tfold_tensor::BinaryOp;

use super::binary_fold;
use super::chain::{self, ChainNames};
use crate::rule::{Rule, RuleFamily};

/// Rule names, in application order.
pub const NAMES: [&str; 7] = [
    "mul-commute",
    "mul-reassociate-constants",
    "mul-reassociate-double",
    "mul-reassociate-variables",
    "mul-reassociate-variables-mirror",
    "mul-fold",
    "div-fold",
];

/// The multiplicative rules, in application order.
#[must_use]
pub fn rules() -> Vec<Rule> {
    let names = ChainNames {
        commute: NAMES[0],
        constants: NAMES[1],
        double: NAMES[2],
        variables: NAMES[3],
        variables_mirror: NAMES[4],
    };
    let family = RuleFamily::Multiplicative;
    let mut rules = chain::rules(OpKind::Mul, family, &names);
    rules.push(binary_fold(NAMES[5], family, OpKind::Mul, BinaryOp::Mul));
    rules.push(binary_fold(NAMES[6], family, OpKind::Div, BinaryOp::Div));
    rules
}
