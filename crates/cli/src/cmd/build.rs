//! Implementation of the `ingot build` command.
//!
//! Loads a recipe, runs the full pipeline, and materializes the resulting
//! output tree into the target directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ingot_lib::pipeline::{ExecuteConfig, realize};
use ingot_lib::recipe::Recipe;
use tracing::info;

use crate::output;

pub fn cmd_build(
  recipe_path: &Path,
  out: &Path,
  backend: Option<String>,
  forge_base: Option<String>,
  work_dir: Option<PathBuf>,
) -> Result<()> {
  let recipe = Recipe::from_path(recipe_path)
    .with_context(|| format!("failed to load recipe {}", recipe_path.display()))?;

  let mut config = ExecuteConfig::default();
  if let Some(backend) = backend {
    config.backend = backend;
  }
  if let Some(base) = forge_base {
    config.forge_base = base;
  }
  config.work_dir = work_dir;

  let rt = tokio::runtime::Runtime::new().context("failed to create async runtime")?;
  let report = match rt.block_on(realize(&recipe, &config)) {
    Ok(report) => report,
    Err(e) => {
      output::print_error(&format!("{} {} failed in {} stage: {}", recipe.name, recipe.version, e.stage(), e));
      std::process::exit(1);
    }
  };

  report
    .tree
    .materialize(out)
    .with_context(|| format!("failed to write output tree to {}", out.display()))?;
  info!(path = %out.display(), hash = %report.output_hash, "output tree written");

  output::print_success(&format!("built {} {}", recipe.name, recipe.version));
  output::print_stat("files", &report.tree.len().to_string());
  output::print_stat("hash", output::truncate_hash(&report.output_hash.0));
  output::print_stat("out", &out.display().to_string());

  Ok(())
}
