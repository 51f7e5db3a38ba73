//! Executor configuration, error taxonomy, and run reports.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::build::BuildError;
use crate::fetch::{FetchError, IntegrityError};
use crate::install::InstallError;
use crate::pipeline::state::RunState;
use crate::tree::OutputTree;
use crate::util::hash::ContentHash;

/// Bounded retry policy for transient fetch failures.
///
/// Applies only to [`FetchError`]; an [`IntegrityError`] is never retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
  /// Total attempts, including the first.
  pub max_attempts: u32,

  /// Delay before the second attempt; doubles after each failure.
  pub backoff: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts: 3,
      backoff: Duration::from_millis(500),
    }
  }
}

/// Configuration for one pipeline run.
///
/// Everything a build expression would otherwise pick up from ambient state
/// lives here explicitly, so the same recipe and config always describe the
/// same run.
#[derive(Debug, Clone)]
pub struct ExecuteConfig {
  /// Build backend program handed the bound flag set.
  pub backend: String,

  /// URL prefix source archives are fetched from.
  pub forge_base: String,

  /// Scratch directory for the run. A fresh temp dir when unset.
  pub work_dir: Option<PathBuf>,

  /// Retry policy for transient fetch failures.
  pub retry: RetryPolicy,
}

impl Default for ExecuteConfig {
  fn default() -> Self {
    Self {
      backend: "go".to_string(),
      forge_base: "https://github.com".to_string(),
      work_dir: None,
      retry: RetryPolicy::default(),
    }
  }
}

/// The stage a pipeline error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
  Fetch,
  Verify,
  Build,
  Install,
}

impl Stage {
  pub fn as_str(self) -> &'static str {
    match self {
      Stage::Fetch => "fetch",
      Stage::Verify => "verify",
      Stage::Build => "build",
      Stage::Install => "install",
    }
  }
}

impl std::fmt::Display for Stage {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// First unrecoverable error of a run, tagged with its stage.
///
/// Every stage fails fast: the underlying cause propagates unchanged, and
/// no stage attempts partial recovery or silent degradation.
#[derive(Debug, Error)]
pub enum PipelineError {
  #[error("fetch: {0}")]
  Fetch(#[from] FetchError),

  #[error("verify: {0}")]
  Integrity(#[from] IntegrityError),

  #[error("build: {0}")]
  Build(#[from] BuildError),

  #[error("install: {0}")]
  Install(#[from] InstallError),
}

impl PipelineError {
  /// Which stage the run failed in.
  pub fn stage(&self) -> Stage {
    match self {
      PipelineError::Fetch(_) => Stage::Fetch,
      PipelineError::Integrity(_) => Stage::Verify,
      PipelineError::Build(_) => Stage::Build,
      PipelineError::Install(_) => Stage::Install,
    }
  }

  /// Transient errors may be retried by the caller; everything else is
  /// final.
  pub fn is_transient(&self) -> bool {
    matches!(self, PipelineError::Fetch(_))
  }
}

/// Result of a successful run.
#[derive(Debug)]
pub struct RunReport {
  /// Everything the run produced, ready to materialize.
  pub tree: OutputTree,

  /// Terminal state; always `Complete` for a report.
  pub state: RunState,

  /// Deterministic hash of the tree, for reproducibility checks.
  pub output_hash: ContentHash,
}
