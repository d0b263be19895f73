//! Driver configuration.

use tfold_session::{OptLevel, Options};

use crate::error::RewriteError;
use crate::rule::{Rule, RuleFamily, RuleKind};

/// Default ceiling on rewriting sweeps.
pub const DEFAULT_MAX_ITERATIONS: usize = 10_000;

/// Sweep ceiling at [`OptLevel::Aggressive`].
pub const AGGRESSIVE_MAX_ITERATIONS: usize = 100_000;

/// Configuration for the rewrite driver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RewriteConfig {
    /// Maximum number of rewriting sweeps before giving up (default
    /// 10 000). A sweep applies every independent rewrite it finds, so this
    /// bounds the depth of rewrite chains, not the size of the graph.
    pub max_iterations: usize,
    /// Whether to check every rule's termination measure (default: on in
    /// debug builds).
    pub verify_termination: bool,
    /// Whether fold rules run (default true).
    pub fold: bool,
    /// Whether normalization rules run (default true).
    pub normalize: bool,
    /// Families that never run.
    pub disabled_families: Vec<RuleFamily>,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            verify_termination: cfg!(debug_assertions),
            fold: true,
            normalize: true,
            disabled_families: Vec::new(),
        }
    }
}

impl RewriteConfig {
    /// Create a config from an optimization level alone.
    #[must_use]
    pub fn from_opt_level(level: OptLevel) -> Self {
        let max_iterations = match level {
            OptLevel::Aggressive => AGGRESSIVE_MAX_ITERATIONS,
            _ => DEFAULT_MAX_ITERATIONS,
        };
        Self {
            max_iterations,
            fold: level != OptLevel::None,
            normalize: level.normalizes(),
            ..Self::default()
        }
    }

    /// Create a config from session options, applying their overrides.
    ///
    /// # Errors
    ///
    /// Returns [`RewriteError::UnknownFamily`] if `disabled_families` names
    /// a family that does not exist.
    pub fn from_options(options: &Options) -> Result<Self, RewriteError> {
        let mut config = Self::from_opt_level(options.opt_level);
        if let Some(max) = options.max_rewrite_iterations {
            config.max_iterations = max;
        }
        if let Some(verify) = options.verify_termination {
            config.verify_termination = verify;
        }
        config.disabled_families = options
            .disabled_families
            .iter()
            .map(|name| name.parse())
            .collect::<Result<_, _>>()?;
        Ok(config)
    }

    /// Returns true if `rule` may run under this configuration.
    #[must_use]
    pub fn enables(&self, rule: &Rule) -> bool {
        let kind_enabled = match rule.kind() {
            RuleKind::Fold => self.fold,
            RuleKind::Normalize => self.normalize,
        };
        kind_enabled && !self.disabled_families.contains(&rule.family())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels() {
        let none = RewriteConfig::from_opt_level(OptLevel::None);
        assert!(!none.fold && !none.normalize);
        let less = RewriteConfig::from_opt_level(OptLevel::Less);
        assert!(less.fold && !less.normalize);
        assert_eq!(
            RewriteConfig::from_opt_level(OptLevel::Aggressive).max_iterations,
            AGGRESSIVE_MAX_ITERATIONS
        );
        assert_eq!(RewriteConfig::default().max_iterations, DEFAULT_MAX_ITERATIONS);
    }

    #[test]
    fn test_overrides() {
        let options = Options {
            max_rewrite_iterations: Some(7),
            verify_termination: Some(false),
            disabled_families: vec!["shape-transform".into()],
            ..Options::default()
        };
        let config = RewriteConfig::from_options(&options).unwrap();
        assert_eq!(config.max_iterations, 7);
        assert!(!config.verify_termination);
        assert_eq!(config.disabled_families, vec![RuleFamily::ShapeTransform]);
    }

    #[test]
    fn test_unknown_family() {
        let options = Options {
            disabled_families: vec!["trigonometric".into()],
            ..Options::default()
        };
        assert_eq!(
            RewriteConfig::from_options(&options),
            Err(RewriteError::UnknownFamily("trigonometric".into()))
        );
    }
}
