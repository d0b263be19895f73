//! The built-in rule families.
//!
//! | Family | Module | Rules |
//! |--------|--------|-------|
//! | additive | [`additive`] | commute, re-associate (3 shapes + mirror), fold |
//! | subtractive | [`subtractive`] | fold `Sub`/`Neg`/`Sqrt`, `Sub` to `Add` |
//! | multiplicative | [`multiplicative`] | as additive over `Mul`, fold `Div` |
//! | shape-transform | [`shape`] | fold `Transpose`/`Unsqueeze` |
//!
//! Every constant a rule captures is gated on [`Predicate::Dense`], so a
//! constant carrying a sparse-layout marker never takes part in a rewrite.

pub mod additive;
mod chain;
pub mod multiplicative;
pub mod shape;
pub mod subtractive;

use tfold_graph::{OpKind, ValueRef};
use tfold_tensor::{eval, BinaryOp, UnaryOp};

use crate::builder::RewriteBuilder;
use crate::error::BuildError;
use crate::pattern::{Bindings, Pattern, Predicate, Var};
use crate::rule::{Rule, RuleFamily, RuleKind, RuleSet};

/// The default rule set: every family, in order.
#[must_use]
pub fn default_rules() -> RuleSet {
    let mut set = RuleSet::new();
    for rule in additive::rules()
        .into_iter()
        .chain(subtractive::rules())
        .chain(multiplicative::rules())
        .chain(shape::rules())
    {
        set.register(rule);
    }
    set
}

/// `op(const c1, const c2)` folded with the evaluator's `bop`.
fn binary_fold(name: &'static str, family: RuleFamily, op: OpKind, bop: BinaryOp) -> Rule {
    Rule::new(
        name,
        family,
        RuleKind::Fold,
        Pattern::op(op, [Pattern::constant("c1"), Pattern::constant("c2")]),
    )
    .with_predicate(Predicate::Dense("c1"))
    .with_predicate(Predicate::Dense("c2"))
    .with_build(move |b, m| {
        let folded = eval::binary(bop, m.literal("c1")?, m.literal("c2")?)?;
        Ok(b.constant(folded))
    })
}

/// `op(const c)` folded with the evaluator's `uop`.
fn unary_fold(name: &'static str, family: RuleFamily, op: OpKind, uop: UnaryOp) -> Rule {
    Rule::new(name, family, RuleKind::Fold, Pattern::op(op, [Pattern::constant("c")]))
        .with_predicate(Predicate::Dense("c"))
        .with_build(move |b, m| {
            let folded = eval::unary(uop, m.literal("c")?)?;
            Ok(b.constant(folded))
        })
}

/// Builds `op(lhs, rhs)` from two bound variables.
fn rebuild(b: &mut RewriteBuilder<'_>, m: &Bindings, op: OpKind, lhs: Var, rhs: Var) -> Result<ValueRef, BuildError> {
    b.binary(op, m.value(lhs)?, m.value(rhs)?)
}
