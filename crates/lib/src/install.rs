//! Post-build installation and derived artifact generation.
//!
//! Consumes the artifact set and the recipe's install steps to assemble the
//! output tree: the executable itself plus completion scripts captured from
//! the binary's own introspection subcommands. The tree is built entirely in
//! memory and handed back only when every step succeeded, so a failing step
//! can never leave a half-populated installation behind.

use tokio::process::Command;
use tracing::{debug, info};

use crate::build::ArtifactSet;
use crate::recipe::{InstallStep, Recipe};
use crate::shell::Shell;
use crate::tree::OutputTree;

/// Fatal installation failures.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
  /// The built binary does not support the introspection subcommand.
  #[error("completion introspection for {shell} exited with {code:?}: {stderr}")]
  Introspection {
    shell: Shell,
    code: Option<i32>,
    stderr: String,
  },

  #[error("no artifact named '{name}' to install")]
  MissingArtifact { name: String },

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Run every install step in declared order and return the populated tree.
pub async fn run_install_steps(recipe: &Recipe, artifacts: &ArtifactSet) -> Result<OutputTree, InstallError> {
  let mut tree = OutputTree::new();

  for step in &recipe.install {
    match step {
      InstallStep::Bin => install_bin(recipe, artifacts, &mut tree).await?,
      InstallStep::Completions { shell } => {
        install_completions(recipe, artifacts, *shell, &mut tree).await?;
      }
    }
  }

  info!(files = tree.len(), "install steps complete");
  Ok(tree)
}

fn named_artifact<'a>(
  recipe: &Recipe,
  artifacts: &'a ArtifactSet,
) -> Result<&'a std::path::Path, InstallError> {
  artifacts.get(&recipe.name).ok_or_else(|| InstallError::MissingArtifact {
    name: recipe.name.clone(),
  })
}

async fn install_bin(
  recipe: &Recipe,
  artifacts: &ArtifactSet,
  tree: &mut OutputTree,
) -> Result<(), InstallError> {
  let artifact = named_artifact(recipe, artifacts)?;
  let bytes = tokio::fs::read(artifact).await?;

  let dest = format!("bin/{}", recipe.name);
  debug!(path = %dest, size = bytes.len(), "installing executable");
  tree.insert(dest, bytes, true);
  Ok(())
}

async fn install_completions(
  recipe: &Recipe,
  artifacts: &ArtifactSet,
  shell: Shell,
  tree: &mut OutputTree,
) -> Result<(), InstallError> {
  let artifact = named_artifact(recipe, artifacts)?;

  info!(shell = %shell, "capturing completion script");
  let output = Command::new(artifact)
    .arg("completion")
    .arg(shell.as_str())
    .output()
    .await?;

  if !output.status.success() {
    return Err(InstallError::Introspection {
      shell,
      code: output.status.code(),
      stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    });
  }

  // stdout is taken verbatim; only the zsh compdef line is ours to add
  let mut content = shell
    .preamble(&recipe.name)
    .map(String::into_bytes)
    .unwrap_or_default();
  content.extend_from_slice(&output.stdout);

  tree.insert(shell.completion_path(&recipe.name), content, false);
  Ok(())
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
  use super::*;
  use std::fs;
  use std::os::unix::fs::PermissionsExt;
  use std::path::{Path, PathBuf};
  use tempfile::TempDir;

  /// Script that answers `completion bash` and `completion zsh` but fails
  /// for every other shell, like a binary built before fish support.
  const STUB_BINARY: &str = r#"#!/bin/sh
case "$1 $2" in
  "completion bash") printf 'complete -F _tool tool\n' ;;
  "completion zsh") printf '_tool() { compadd run; }\n' ;;
  *) echo "unknown shell" >&2; exit 3 ;;
esac
"#;

  fn write_stub(dir: &Path) -> PathBuf {
    let path = dir.join("tool");
    fs::write(&path, STUB_BINARY).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
  }

  fn recipe_with_steps(steps: &str) -> Recipe {
    Recipe::from_toml(&format!(
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
{}
"#,
      steps
    ))
    .unwrap()
  }

  fn artifact_set(path: PathBuf) -> ArtifactSet {
    let mut artifacts = ArtifactSet::default();
    artifacts.insert("tool", path);
    artifacts
  }

  #[tokio::test]
  async fn bin_step_installs_executable_bytes() {
    let temp = TempDir::new().unwrap();
    let stub = write_stub(temp.path());
    let recipe = recipe_with_steps("[[install]]\nstep = \"bin\"");

    let tree = run_install_steps(&recipe, &artifact_set(stub)).await.unwrap();

    let entry = tree.get("bin/tool").unwrap();
    assert!(entry.executable);
    assert_eq!(entry.bytes, STUB_BINARY.as_bytes());
  }

  #[tokio::test]
  async fn completion_output_is_captured_verbatim() {
    let temp = TempDir::new().unwrap();
    let stub = write_stub(temp.path());
    let recipe = recipe_with_steps(
      "[[install]]\nstep = \"completions\"\nshell = \"bash\"\n\n[[install]]\nstep = \"completions\"\nshell = \"zsh\"",
    );

    let tree = run_install_steps(&recipe, &artifact_set(stub)).await.unwrap();

    let bash = tree.get("share/bash-completion/completions/tool").unwrap();
    assert_eq!(bash.bytes, b"complete -F _tool tool\n");
    assert!(!bash.executable);

    let zsh = tree.get("share/zsh/vendor-completions/_tool").unwrap();
    assert_eq!(zsh.bytes, b"#compdef tool\n_tool() { compadd run; }\n");
  }

  #[tokio::test]
  async fn unsupported_shell_is_fatal() {
    let temp = TempDir::new().unwrap();
    let stub = write_stub(temp.path());
    let recipe = recipe_with_steps(
      "[[install]]\nstep = \"completions\"\nshell = \"bash\"\n\n[[install]]\nstep = \"completions\"\nshell = \"fish\"",
    );

    let result = run_install_steps(&recipe, &artifact_set(stub)).await;

    match result {
      Err(InstallError::Introspection { shell, code, stderr }) => {
        assert_eq!(shell, Shell::Fish);
        assert_eq!(code, Some(3));
        assert!(stderr.contains("unknown shell"));
      }
      other => panic!("expected introspection failure, got {:?}", other),
    }
  }

  #[tokio::test]
  async fn missing_artifact_is_reported() {
    let recipe = recipe_with_steps("[[install]]\nstep = \"bin\"");

    let result = run_install_steps(&recipe, &ArtifactSet::default()).await;

    assert!(matches!(result, Err(InstallError::MissingArtifact { .. })));
  }

  #[tokio::test]
  async fn empty_step_list_yields_empty_tree() {
    let recipe = recipe_with_steps("");
    let tree = run_install_steps(&recipe, &ArtifactSet::default()).await.unwrap();
    assert!(tree.is_empty());
  }
}
