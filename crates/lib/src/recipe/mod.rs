//! Recipe loading and validation.
//!
//! A recipe is the declarative descriptor for one package build: where the
//! pinned source archive lives, how to invoke the build backend, and which
//! install steps produce the final output tree. Recipes are plain TOML
//! documents; everything execution-related lives in [`crate::pipeline`].

mod types;

pub use types::{ArchiveKind, BuildParams, InstallStep, Meta, Recipe, Sha256Digest, SourceSpec};

use std::path::Path;

use thiserror::Error;
use tracing::debug;

/// Revision strings that name a moving target rather than a pin.
const FLOATING_REVS: &[&str] = &["main", "master", "HEAD", "latest"];

/// Errors while loading or validating a recipe.
#[derive(Debug, Error)]
pub enum RecipeError {
  #[error("failed to read {path}: {message}")]
  Read { path: String, message: String },

  #[error("failed to parse recipe: {0}")]
  Parse(#[from] toml::de::Error),

  #[error("recipe field '{field}' must not be empty")]
  EmptyField { field: &'static str },

  #[error("invalid sha256 digest '{found}': expected 64 lowercase hex characters")]
  InvalidDigest { found: String },

  /// Reproducibility requires that re-fetching the archive at any later
  /// time yields byte-identical input, which a branch ref cannot promise.
  #[error("source rev '{rev}' is a floating reference; pin a fixed tag")]
  FloatingRev { rev: String },
}

impl Recipe {
  /// Load and validate a recipe from a TOML file.
  pub fn from_path(path: &Path) -> Result<Self, RecipeError> {
    let input = std::fs::read_to_string(path).map_err(|e| RecipeError::Read {
      path: path.display().to_string(),
      message: e.to_string(),
    })?;
    let recipe = Self::from_toml(&input)?;
    debug!(path = %path.display(), name = %recipe.name, "recipe loaded");
    Ok(recipe)
  }

  /// Parse and validate a recipe from TOML text.
  pub fn from_toml(input: &str) -> Result<Self, RecipeError> {
    let recipe: Recipe = toml::from_str(input)?;
    recipe.validate()?;
    Ok(recipe)
  }

  /// Check the invariants parsing alone cannot enforce.
  pub fn validate(&self) -> Result<(), RecipeError> {
    non_empty(&self.name, "name")?;
    non_empty(&self.version, "version")?;
    non_empty(&self.source.owner, "source.owner")?;
    non_empty(&self.source.repo, "source.repo")?;
    non_empty(&self.source.rev, "source.rev")?;
    non_empty(&self.build.version_symbol, "build.version-symbol")?;

    let digest = &self.sha256.0;
    let is_hex = digest.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
    if digest.len() != 64 || !is_hex {
      return Err(RecipeError::InvalidDigest { found: digest.clone() });
    }

    let rev = self.source.rev.as_str();
    if FLOATING_REVS.contains(&rev) || rev.starts_with("refs/heads/") {
      return Err(RecipeError::FloatingRev { rev: rev.to_string() });
    }

    Ok(())
  }
}

fn non_empty(value: &str, field: &'static str) -> Result<(), RecipeError> {
  if value.is_empty() {
    return Err(RecipeError::EmptyField { field });
  }
  Ok(())
}
