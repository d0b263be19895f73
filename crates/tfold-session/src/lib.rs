//! Options and configuration for the tfold rewrite pass.
//!
//! [`Options`] is what an embedding compiler hands to the optimizer. It can
//! be built in code, or loaded from a TOML file:
//!
//! ```toml
//! opt_level = "aggressive"
//! max_rewrite_iterations = 50000
//! disabled_families = ["shape-transform"]
//! jobs = 4
//! ```

#![warn(missing_docs)]

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

/// Optimization level for the rewrite pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OptLevel {
    /// No rewriting at all.
    None,
    /// Constant folding only; operator chains are left as written.
    Less,
    /// Folding plus chain normalization (default).
    #[default]
    Default,
    /// Like `Default`, with a higher sweep ceiling for very deep rewrite chains.
    Aggressive,
}

impl OptLevel {
    /// Returns true if chain normalization rules run at this level.
    #[must_use]
    pub const fn normalizes(self) -> bool {
        matches!(self, Self::Default | Self::Aggressive)
    }
}

/// Options controlling one run of the optimizer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Optimization level.
    pub opt_level: OptLevel,
    /// Overrides the iteration ceiling implied by `opt_level`.
    pub max_rewrite_iterations: Option<usize>,
    /// Overrides whether termination measures are checked on every rewrite.
    /// Defaults to on in debug builds.
    pub verify_termination: Option<bool>,
    /// Rule families to switch off, by name (`additive`, `subtractive`,
    /// `multiplicative`, `shape-transform`).
    pub disabled_families: Vec<String>,
    /// Worker threads for batch optimization; `None` uses the global pool.
    pub jobs: Option<usize>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            opt_level: OptLevel::Default,
            max_rewrite_iterations: None,
            verify_termination: None,
            disabled_families: Vec::new(),
            jobs: None,
        }
    }
}

impl Options {
    /// Parses options from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML or does not describe
    /// [`Options`], or if the resulting options are inconsistent.
    pub fn from_toml_str(text: &str) -> Result<Self, SessionError> {
        let options: Self = toml::from_str(text)?;
        options.validate()?;
        Ok(options)
    }

    /// Loads options from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Utf8Path>) -> Result<Self, SessionError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SessionError::ConfigNotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<(), SessionError> {
        if self.max_rewrite_iterations == Some(0) {
            return Err(SessionError::InvalidConfig(
                "max_rewrite_iterations must be positive".to_string(),
            ));
        }
        if self.jobs == Some(0) {
            return Err(SessionError::InvalidConfig(
                "jobs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Errors that can occur while loading options.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Configuration file not found.
    #[error("configuration file not found: {0}")]
    ConfigNotFound(Utf8PathBuf),
    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// TOML parsing error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
