//! # tfold Rewrite Pass
//!
//! Algebraic simplification and constant folding over the tfold graph IR.
//!
//! ## Overview
//!
//! The pass takes a validated [`Graph`](tfold_graph::Graph) and rewrites it
//! to a fixpoint with a declarative [`RuleSet`]. Each [`Rule`] is a
//! [`Pattern`] over the graph, a list of [`Predicate`]s, a build function
//! that appends the replacement through a [`RewriteBuilder`], and a
//! [`Termination`] measure the rewrite must decrease.
//!
//! ## Rule families
//!
//! | Family | Effect |
//! |--------|--------|
//! | additive | constants move right in `Add` chains and are folded |
//! | subtractive | `Sub`, `Neg`, `Sqrt` of constants fold; `x - c` becomes `x + (-c)` |
//! | multiplicative | as additive for `Mul`; `Div` of constants folds |
//! | shape-transform | `Transpose`, `Unsqueeze` of constants fold |
//!
//! Constants carrying a sparse-layout marker are never rewritten.
//!
//! ## Usage
//!
//! ```ignore
//! let rules = default_rules();
//! let rewriter = Rewriter::new(&rules, RewriteConfig::default());
//! let (graph, stats) = rewriter.run(graph)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod builder;
mod config;
mod driver;
mod error;
mod pattern;
mod rule;
pub mod rules;
mod stats;
pub mod termination;

pub use builder::RewriteBuilder;
pub use config::{RewriteConfig, AGGRESSIVE_MAX_ITERATIONS, DEFAULT_MAX_ITERATIONS};
pub use driver::Rewriter;
pub use error::{BuildError, RewriteError};
pub use pattern::{match_pattern, Binding, Bindings, Pattern, Predicate, Var};
pub use rule::{BuildFn, Rule, RuleFamily, RuleKind, RuleSet};
pub use rules::default_rules;
pub use stats::RewriteStats;
pub use termination::{ChainMeasure, Measure, Termination};
