//! # tfold
//!
//! Algebraic simplification and constant folding for tensor dataflow
//! graphs.
//!
//! This crate is the entry point for embedders. It ties together the
//! session options, the default rule set, and the fixpoint driver, and runs
//! batches of independent graphs in parallel.
//!
//! ## Usage
//!
//! ```ignore
//! use tfold::{Optimizer, Options};
//!
//! let optimizer = Optimizer::new(Options::default())?;
//! let (graph, stats) = optimizer.optimize(graph)?;
//! println!("{stats}");
//! ```
//!
//! ## Crates
//!
//! | Crate | Role |
//! |-------|------|
//! | `tfold-session` | options and TOML configuration |
//! | `tfold-tensor` | tensor literals and the constant evaluator |
//! | `tfold-graph` | the graph IR |
//! | `tfold-rewrite` | patterns, rules, and the rewrite driver |

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use camino::{Utf8Path, Utf8PathBuf};
use rayon::prelude::*;
use thiserror::Error;
use tracing::{info, instrument, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

pub use tfold_graph::{Graph, GraphBuilder, GraphError};
pub use tfold_rewrite::{default_rules, RewriteConfig, RewriteError, RewriteStats, Rewriter, RuleSet};
pub use tfold_session::{OptLevel, Options, SessionError};
pub use tfold_tensor::TensorLiteral;

/// Errors from the optimizer facade.
#[derive(Debug, Error)]
pub enum OptimizeError {
    /// Options could not be loaded or are invalid.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Options name something the rewrite pass does not know.
    #[error("invalid rewrite configuration: {0}")]
    Config(#[source] RewriteError),

    /// The rewrite pass failed on a graph.
    #[error("optimizing graph `{graph}` failed: {source}")]
    Rewrite {
        /// Name of the graph.
        graph: String,
        /// The underlying error.
        #[source]
        source: RewriteError,
    },

    /// A graph file could not be read.
    #[error("failed to read graph file: {path}")]
    Read {
        /// The path that could not be read.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A graph file is not a serialized graph.
    #[error("failed to parse graph file {path}: {source}")]
    Parse {
        /// The file being parsed.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// The worker pool for a batch could not be built.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Several graphs of a batch failed.
    #[error("{} graphs failed", .0.len())]
    Multiple(Vec<OptimizeError>),
}

/// Result type for facade operations.
pub type OptimizeResult<T> = Result<T, OptimizeError>;

/// The optimizer: options, the derived rewrite configuration, and a rule set.
#[derive(Debug)]
pub struct Optimizer {
    options: Options,
    config: RewriteConfig,
    rules: RuleSet,
}

impl Optimizer {
    /// Creates an optimizer with the default rule set.
    ///
    /// # Errors
    ///
    /// Returns an error if the options disable an unknown rule family.
    pub fn new(options: Options) -> OptimizeResult<Self> {
        let config = RewriteConfig::from_options(&options).map_err(OptimizeError::Config)?;
        Ok(Self {
            options,
            config,
            rules: default_rules(),
        })
    }

    /// Creates an optimizer from a TOML options file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be loaded or the options are
    /// invalid.
    pub fn from_config_file(path: impl AsRef<Utf8Path>) -> OptimizeResult<Self> {
        Self::new(Options::load(path)?)
    }

    /// Replaces the rule set.
    #[must_use]
    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    /// The rule set, for registering additional rules.
    pub fn rules_mut(&mut self) -> &mut RuleSet {
        &mut self.rules
    }

    /// The options this optimizer was created with.
    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// The rewrite configuration derived from the options.
    #[must_use]
    pub fn config(&self) -> &RewriteConfig {
        &self.config
    }

    /// Optimizes one graph.
    ///
    /// # Errors
    ///
    /// Returns [`OptimizeError::Rewrite`] if the graph is malformed or the
    /// rewrite pass hits a fatal error.
    #[instrument(skip(self, graph), fields(graph = %graph.name()))]
    pub fn optimize(&self, graph: Graph) -> OptimizeResult<(Graph, RewriteStats)> {
        let name = graph.name().to_string();
        Rewriter::new(&self.rules, self.config.clone())
            .run(graph)
            .map_err(|source| OptimizeError::Rewrite { graph: name, source })
    }

    /// Optimizes independent graphs in parallel.
    ///
    /// Results are returned in input order. Uses a dedicated pool of
    /// `options.jobs` threads if set, otherwise the global rayon pool.
    ///
    /// # Errors
    ///
    /// Returns the error of the failing graph, or
    /// [`OptimizeError::Multiple`] if more than one failed.
    #[instrument(skip(self, graphs), fields(graphs = graphs.len()))]
    pub fn optimize_all(&self, graphs: Vec<Graph>) -> OptimizeResult<Vec<(Graph, RewriteStats)>> {
        let run = || {
            graphs
                .into_par_iter()
                .map(|graph| self.optimize(graph))
                .collect::<Vec<_>>()
        };
        let results = match self.options.jobs {
            Some(jobs) => rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?.install(run),
            None => run(),
        };

        let outputs = collect_results(results)?;
        let mut total = RewriteStats::default();
        for (_, stats) in &outputs {
            total.merge(stats);
        }
        info!(
            graphs = outputs.len(),
            iterations = total.iterations,
            rewrites = total.rewrites,
            nodes_before = total.nodes_before,
            nodes_after = total.nodes_after,
            "batch optimized"
        );
        Ok(outputs)
    }

    /// Loads and optimizes graph files in parallel.
    ///
    /// # Errors
    ///
    /// Returns an error if any file fails to load or optimize, collecting
    /// all errors.
    #[instrument(skip(self, paths))]
    pub fn optimize_files(
        &self,
        paths: impl IntoIterator<Item = impl AsRef<Utf8Path>>,
    ) -> OptimizeResult<Vec<(Graph, RewriteStats)>> {
        let paths: Vec<Utf8PathBuf> = paths.into_iter().map(|p| p.as_ref().to_path_buf()).collect();
        let graphs = collect_results(paths.par_iter().map(load_graph).collect())?;
        self.optimize_all(graphs)
    }
}

fn collect_results<T>(results: Vec<OptimizeResult<T>>) -> OptimizeResult<Vec<T>> {
    let mut outputs = Vec::with_capacity(results.len());
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(output) => outputs.push(output),
            Err(err) => {
                warn!(error = %err, "graph failed");
                errors.push(err);
            }
        }
    }
    match errors.len() {
        0 => Ok(outputs),
        1 => Err(errors.remove(0)),
        _ => Err(OptimizeError::Multiple(errors)),
    }
}

/// Optimizes one graph with the default rule set.
///
/// # Errors
///
/// See [`Optimizer::new`] and [`Optimizer::optimize`].
pub fn optimize(graph: Graph, options: &Options) -> OptimizeResult<(Graph, RewriteStats)> {
    Optimizer::new(options.clone())?.optimize(graph)
}

/// Optimizes a batch of graphs with the default rule set.
///
/// # Errors
///
/// See [`Optimizer::new`] and [`Optimizer::optimize_all`].
pub fn optimize_all(graphs: Vec<Graph>, options: &Options) -> OptimizeResult<Vec<(Graph, RewriteStats)>> {
    Optimizer::new(options.clone())?.optimize_all(graphs)
}

/// Reads a graph serialized as JSON.
///
/// The graph is not validated here; the rewrite pass validates its input.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_graph(path: impl AsRef<Utf8Path>) -> OptimizeResult<Graph> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| OptimizeError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| OptimizeError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Installs a `tracing` subscriber writing to stderr, filtered by
/// `RUST_LOG`.
///
/// Returns false if a global subscriber was already installed.
pub fn init_logging() -> bool {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).is_ok()
}
