//! Backend invocation and artifact collection.
//!
//! The backend is a black box with one contract: identical source and flags
//! produce an identical binary. This module only constructs the invocation,
//! surfaces backend failures verbatim, and hands back the produced
//! artifacts unmodified.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, info};

use crate::recipe::Recipe;

/// Binaries produced by one backend invocation, keyed by logical name.
#[derive(Debug, Clone, Default)]
pub struct ArtifactSet {
  bins: BTreeMap<String, PathBuf>,
}

impl ArtifactSet {
  pub fn insert(&mut self, name: impl Into<String>, path: PathBuf) {
    self.bins.insert(name.into(), path);
  }

  pub fn get(&self, name: &str) -> Option<&Path> {
    self.bins.get(name).map(PathBuf::as_path)
  }

  pub fn len(&self) -> usize {
    self.bins.len()
  }

  pub fn is_empty(&self) -> bool {
    self.bins.is_empty()
  }
}

/// Backend compile failures. Fatal and reported as-is.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
  /// The backend exited non-zero. Its stderr is carried verbatim, never
  /// summarized or swallowed.
  #[error("backend '{program}' exited with {code:?}:\n{stderr}")]
  BackendFailed {
    program: String,
    code: Option<i32>,
    stderr: String,
  },

  #[error("backend reported success but produced no artifact at {path}")]
  MissingArtifact { path: String },

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Invoke the build backend over the unpacked source tree.
///
/// Runs `<backend> build -o <bin_dir>/<name> <flags…> <target>` in
/// `src_dir`, with the recipe's extra env merged in. Returns the artifact
/// set on success.
pub async fn invoke_backend(
  backend: &str,
  recipe: &Recipe,
  flags: &[String],
  src_dir: &Path,
  bin_dir: &Path,
) -> Result<ArtifactSet, BuildError> {
  tokio::fs::create_dir_all(bin_dir).await?;
  let out_path = bin_dir.join(&recipe.name);

  let mut command = Command::new(backend);
  command
    .arg("build")
    .arg("-o")
    .arg(&out_path)
    .args(flags)
    .arg(recipe.build.target.as_deref().unwrap_or("."))
    .current_dir(src_dir);
  for (key, value) in &recipe.build.env {
    command.env(key, value);
  }

  info!(backend = %backend, name = %recipe.name, "invoking build backend");
  debug!(flags = ?flags, "bound build flags");

  let output = command.output().await?;

  if !output.status.success() {
    return Err(BuildError::BackendFailed {
      program: backend.to_string(),
      code: output.status.code(),
      stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    });
  }

  if !out_path.exists() {
    return Err(BuildError::MissingArtifact {
      path: out_path.display().to_string(),
    });
  }

  let mut artifacts = ArtifactSet::default();
  artifacts.insert(recipe.name.clone(), out_path);
  info!(artifacts = artifacts.len(), "backend build complete");
  Ok(artifacts)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::recipe::Recipe;
  use tempfile::TempDir;

  fn test_recipe() -> Recipe {
    Recipe::from_toml(
      r#"
name = "tool"
version = "0.1.0"
sha256 = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"

[source]
owner = "example"
repo = "tool"
rev = "v0.1.0"

[build]
version-symbol = "example.com/tool/cli.Version"
"#,
    )
    .unwrap()
  }

  #[test]
  fn artifact_set_lookup() {
    let mut artifacts = ArtifactSet::default();
    assert!(artifacts.is_empty());

    artifacts.insert("tool", PathBuf::from("/scratch/out/tool"));
    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts.get("tool"), Some(Path::new("/scratch/out/tool")));
    assert!(artifacts.get("other").is_none());
  }

  #[tokio::test]
  #[cfg(unix)]
  async fn backend_failure_surfaces_exit_code() {
    let temp = TempDir::new().unwrap();
    let recipe = test_recipe();
    let flags = vec!["-ldflags=-X x=y".to_string()];

    let result = invoke_backend("false", &recipe, &flags, temp.path(), &temp.path().join("out")).await;

    assert!(matches!(
      result,
      Err(BuildError::BackendFailed { code: Some(1), .. })
    ));
  }

  #[tokio::test]
  #[cfg(unix)]
  async fn successful_backend_without_artifact_is_an_error() {
    let temp = TempDir::new().unwrap();
    let recipe = test_recipe();

    let result = invoke_backend("true", &recipe, &[], temp.path(), &temp.path().join("out")).await;

    assert!(matches!(result, Err(BuildError::MissingArtifact { .. })));
  }

  #[tokio::test]
  async fn missing_backend_program_is_an_io_error() {
    let temp = TempDir::new().unwrap();
    let recipe = test_recipe();

    let result = invoke_backend(
      "definitely-not-a-real-backend",
      &recipe,
      &[],
      temp.path(),
      &temp.path().join("out"),
    )
    .await;

    assert!(matches!(result, Err(BuildError::Io(_))));
  }
}
