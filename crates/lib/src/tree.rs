//! The installable output tree.
//!
//! An `OutputTree` is the complete set of files a successful pipeline run
//! produces: relative install paths mapped to file content. Trees are
//! assembled fully in memory and written out in one explicit step, so a
//! failed run can never leave a half-populated output directory behind.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use crate::util::hash::{ContentHash, hash_bytes};

/// A single file in the output tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
  pub bytes: Vec<u8>,
  pub executable: bool,
}

/// Relative install paths mapped to file content.
///
/// Paths use `/` separators and are relative to the (eventual) install root,
/// e.g. `bin/hcloud` or `share/zsh/vendor-completions/_hcloud`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputTree {
  entries: BTreeMap<String, TreeEntry>,
}

/// Error while writing a tree to disk.
#[derive(Debug, Error)]
pub enum MaterializeError {
  /// The target directory already contains files. Output directories are
  /// owned by exactly one run; stale content must not mask a failure.
  #[error("output directory {0} is not empty; refusing to reuse it")]
  DirtyTarget(String),

  #[error("io error: {0}")]
  Io(#[from] io::Error),
}

impl OutputTree {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn insert(&mut self, path: impl Into<String>, bytes: Vec<u8>, executable: bool) {
    self.entries.insert(path.into(), TreeEntry { bytes, executable });
  }

  pub fn get(&self, path: &str) -> Option<&TreeEntry> {
    self.entries.get(path)
  }

  pub fn paths(&self) -> impl Iterator<Item = &str> {
    self.entries.keys().map(String::as_str)
  }

  /// Deterministic hash over the tree's contents.
  ///
  /// Entries are visited in sorted path order and contribute their path,
  /// executable bit, and content hash, so two trees hash equally exactly
  /// when they are byte-identical.
  pub fn content_hash(&self) -> ContentHash {
    let mut hasher = Sha256::new();
    for (path, entry) in &self.entries {
      let kind = if entry.executable { "X" } else { "F" };
      let file_hash = hash_bytes(&entry.bytes);
      hasher.update(format!("{}:{}:{}\n", kind, path, file_hash.0).as_bytes());
    }
    ContentHash(hex::encode(hasher.finalize()))
  }

  /// Write every entry under `root`.
  ///
  /// The target must be absent or empty; a non-empty directory is refused
  /// rather than merged over.
  pub fn materialize(&self, root: &Path) -> Result<(), MaterializeError> {
    if root.exists() {
      let mut existing = fs::read_dir(root)?;
      if existing.next().is_some() {
        return Err(MaterializeError::DirtyTarget(root.display().to_string()));
      }
    } else {
      fs::create_dir_all(root)?;
    }

    for (path, entry) in &self.entries {
      let dest = root.join(path);
      if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
      }
      fs::write(&dest, &entry.bytes)?;

      #[cfg(unix)]
      if entry.executable {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&dest, fs::Permissions::from_mode(0o755))?;
      }
    }

    debug!(root = %root.display(), files = self.len(), "output tree materialized");
    Ok(())
  }
}
