use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::shell::Shell;

/// The immutable descriptor for one package build.
///
/// A recipe ties a pinned source archive, the build parameters, and the
/// post-build install steps into a single reproducible unit. It is
/// constructed once (parsed from a TOML document), evaluated per run by the
/// executor, and never mutated after evaluation begins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
  /// Package name; also the logical name of the produced executable.
  pub name: String,

  /// Version string embedded into the binary's reported identity.
  pub version: String,

  /// SHA256 digest pinning the expected archive bytes.
  pub sha256: Sha256Digest,

  /// Where the source archive lives.
  pub source: SourceSpec,

  /// Parameters threaded into the backend invocation.
  pub build: BuildParams,

  /// Post-build install steps, run in declared order.
  #[serde(default)]
  pub install: Vec<InstallStep>,

  /// Descriptive metadata. Not load-bearing for execution.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub meta: Option<Meta>,
}

/// Identifies a remote source archive on a forge.
///
/// `rev` must be a fixed, non-moving reference (typically a version tag);
/// floating refs are rejected at validation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
  pub owner: String,
  pub repo: String,
  pub rev: String,

  /// Archive format served by the forge.
  #[serde(default)]
  pub archive: ArchiveKind,
}

/// Supported source archive formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ArchiveKind {
  #[default]
  #[serde(rename = "tar.gz")]
  TarGz,
  #[serde(rename = "tar")]
  Tar,
  #[serde(rename = "zip")]
  Zip,
}

impl ArchiveKind {
  pub fn extension(&self) -> &'static str {
    match self {
      ArchiveKind::TarGz => "tar.gz",
      ArchiveKind::Tar => "tar",
      ArchiveKind::Zip => "zip",
    }
  }
}

/// A pinned SHA256 digest over archive bytes.
///
/// # Format
///
/// 64 lowercase hexadecimal characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sha256Digest(pub String);

impl std::fmt::Display for Sha256Digest {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Build-time parameters bound into the backend invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildParams {
  /// Fully-qualified symbol that receives the recipe's version string.
  pub version_symbol: String,

  /// Apply the `-s -w` size/strip directive.
  #[serde(default = "default_strip")]
  pub strip: bool,

  /// Package path handed to the backend. Defaults to the source root.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub target: Option<String>,

  /// Extra flags appended after the linker flags, in declared order.
  #[serde(default)]
  pub flags: Vec<String>,

  /// Extra environment for the backend process.
  #[serde(default)]
  pub env: BTreeMap<String, String>,
}

fn default_strip() -> bool {
  true
}

/// One post-build install step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "kebab-case")]
pub enum InstallStep {
  /// Install the built executable at `bin/<name>`.
  Bin,

  /// Capture a completion script from the built binary's introspection
  /// subcommand and install it at the shell's conventional path.
  Completions { shell: Shell },
}

/// Descriptive package metadata.
///
/// Carried through parsing and display only; the executor never reads it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Meta {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub homepage: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub license: Option<String>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub platforms: Vec<String>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn archive_kind_extensions() {
    assert_eq!(ArchiveKind::TarGz.extension(), "tar.gz");
    assert_eq!(ArchiveKind::Tar.extension(), "tar");
    assert_eq!(ArchiveKind::Zip.extension(), "zip");
  }

  #[test]
  fn archive_kind_defaults_to_tar_gz() {
    assert_eq!(ArchiveKind::default(), ArchiveKind::TarGz);
  }

  #[test]
  fn digest_displays_as_hex() {
    let digest = Sha256Digest("ab".repeat(32));
    assert_eq!(digest.to_string(), "ab".repeat(32));
  }
}
