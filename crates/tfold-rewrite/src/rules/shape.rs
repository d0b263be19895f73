//! Shape-transform family: folding `Transpose` and `Unsqueeze` of
//! constants.

use tfold_graph::{attr, GraphError, OpKind};
use tfold_tensor::{eval, Permutation};

use crate::error::BuildError;
use crate::pattern::{Pattern, Predicate};
use crate::rule::{Rule, RuleFamily, RuleKind};

/// Rule names, in application order.
pub const NAMES: [&str; 2] = ["transpose-fold", "unsqueeze-fold"];

/// The shape-transform rules, in application order.
#[must_use]
pub fn rules() -> Vec<Rule> {
    let family = RuleFamily::ShapeTransform;

    let transpose = Rule::new(
        NAMES[0],
        family,
        RuleKind::Fold,
        Pattern::op(OpKind::Transpose, [Pattern::constant("c")]).bind("root"),
    )
    .with_predicate(Predicate::Dense("c"))
    .with_build(|b, m| {
        let literal = m.literal("c")?;
        // A missing perm reverses the axes.
        let perm = match b.ints_attr(m.value("root")?, attr::PERM) {
            Some(perm) => eval::permutation(perm)?,
            None => Permutation::reversed(literal.shape().rank()),
        };
        let folded = eval::transpose(literal, &perm)?;
        Ok(b.constant(folded))
    });

    let unsqueeze = Rule::new(
        NAMES[1],
        family,
        RuleKind::Fold,
        Pattern::op(OpKind::Unsqueeze, [Pattern::constant("c")]).bind("root"),
    )
    .with_predicate(Predicate::Dense("c"))
    .with_build(|b, m| {
        let axes = b
            .ints_attr(m.value("root")?, attr::AXES)
            .ok_or(BuildError::Graph(GraphError::InvalidAttribute {
                kind: OpKind::Unsqueeze,
                name: attr::AXES,
            }))?
            .to_vec();
        let folded = eval::unsqueeze(m.literal("c")?, &axes)?;
        Ok(b.constant(folded))
    });

    vec![transpose, unsqueeze]
}
