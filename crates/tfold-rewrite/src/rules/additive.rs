//! Additive family: normalization and folding of `Add` chains.

use tfold_graph::OpKind;
use tfold_tensor::BinaryOp;

use super::chain::{self, ChainNames};
use super::binary_fold;
use crate::rule::{Rule, RuleFamily};

/// Rule names, in application order.
pub const NAMES: [&str; 6] = [
    "add-commute",
    "add-reassociate-constants",
    "add-reassociate-double",
    "add-reassociate-variables",
    "add-reassociate-variables-mirror",
    "add-fold",
];

/// The additive rules, in application order.
#[must_use]
pub fn rules() -> Vec<Rule> {
    let names = ChainNames {
        commute: NAMES[0],
        constants: NAMES[1],
        double: NAMES[2],
        variables: NAMES[3],
        variables_mirror: NAMES[4],
    };
    let mut rules = chain::rules(OpKind::Add, RuleFamily::Additive, &names);
    rules.push(binary_fold(NAMES[5], RuleFamily::Additive, OpKind::Add, BinaryOp::Add));
    rules
}
