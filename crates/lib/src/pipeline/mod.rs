//! The fixed-stage executor.
//!
//! [`realize`] interprets one recipe: fetch, verify, build, install. Stages
//! run strictly in order with no concurrency inside a run; the first error
//! aborts everything after it and is reported with the failing stage
//! attached. Independent runs share no mutable state and may proceed in
//! parallel.

mod state;
mod types;

pub use state::RunState;
pub use types::{ExecuteConfig, PipelineError, RetryPolicy, RunReport, Stage};

use std::path::PathBuf;

use tempfile::TempDir;
use tracing::{debug, error, info, warn};

use crate::build::{bind_flags, invoke_backend};
use crate::fetch::{self, FetchError};
use crate::install::run_install_steps;
use crate::recipe::Recipe;

/// Evaluate one recipe into its output tree.
///
/// On success the report's state is [`RunState::Complete`] and its tree is
/// ready to materialize. On failure nothing has been written outside the
/// run's scratch directory.
pub async fn realize(recipe: &Recipe, config: &ExecuteConfig) -> Result<RunReport, PipelineError> {
  info!(name = %recipe.name, version = %recipe.version, "realizing recipe");

  let mut state = RunState::Pending;
  match run_stages(recipe, config, &mut state).await {
    Ok(report) => {
      info!(state = %report.state, hash = %report.output_hash, "run complete");
      Ok(report)
    }
    Err(e) => {
      let state = state.fail();
      error!(stage = %e.stage(), state = %state, error = %e, "run failed");
      Err(e)
    }
  }
}

async fn run_stages(
  recipe: &Recipe,
  config: &ExecuteConfig,
  state: &mut RunState,
) -> Result<RunReport, PipelineError> {
  // Scratch directory exclusively owned by this run.
  let mut scratch_guard = None;
  let scratch: PathBuf = match &config.work_dir {
    Some(dir) => {
      std::fs::create_dir_all(dir).map_err(FetchError::Io)?;
      dir.clone()
    }
    None => {
      let tmp = TempDir::new().map_err(FetchError::Io)?;
      let path = tmp.path().to_path_buf();
      scratch_guard = Some(tmp);
      path
    }
  };
  // Keep an unnamed temp dir alive until the run finishes.
  let _scratch_guard = scratch_guard;

  // Fetch: archive bytes, with bounded retries for transient failures.
  let url = fetch::archive_url(&config.forge_base, &recipe.source);
  let bytes = fetch_with_retry(&url, &config.retry).await?;
  state.advance();
  debug!(state = %state, size = bytes.len(), "archive fetched");

  // Verify: fail closed before anything is unpacked or built.
  fetch::verify_digest(&bytes, &recipe.sha256, &url)?;
  state.advance();
  debug!(state = %state, "digest verified");

  let src_dir = scratch.join("src");
  fetch::unpack_source(&bytes, recipe.source.archive, &scratch, &src_dir).await?;

  // Build: bind parameters, invoke the backend, collect artifacts.
  let flags = bind_flags(&recipe.build, &recipe.version);
  let artifacts = invoke_backend(&config.backend, recipe, &flags, &src_dir, &scratch.join("out")).await?;
  state.advance();
  debug!(state = %state, artifacts = artifacts.len(), "backend build finished");

  // Install: populate the output tree from the artifact set.
  let tree = run_install_steps(recipe, &artifacts).await?;
  state.advance();
  debug!(state = %state, files = tree.len(), "output tree populated");

  let output_hash = tree.content_hash();
  state.advance();

  Ok(RunReport {
    tree,
    state: *state,
    output_hash,
  })
}

async fn fetch_with_retry(url: &str, retry: &RetryPolicy) -> Result<Vec<u8>, FetchError> {
  let mut delay = retry.backoff;
  let mut attempt = 1;

  loop {
    match fetch::fetch_archive(url).await {
      Ok(bytes) => return Ok(bytes),
      Err(e) if attempt < retry.max_attempts => {
        warn!(attempt, error = %e, "fetch attempt failed, retrying");
        tokio::time::sleep(delay).await;
        delay *= 2;
        attempt += 1;
      }
      Err(e) => return Err(e),
    }
  }
}
