//! Supported completion shells and their install conventions.

use serde::{Deserialize, Serialize};

/// Shells the post-install generator can derive completion scripts for.
///
/// Each shell names an introspection argument (`<binary> completion <shell>`)
/// and a conventional install path for the captured script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shell {
  Bash,
  Zsh,
  Fish,
}

impl Shell {
  /// The shell name as passed to the introspection subcommand.
  pub fn as_str(&self) -> &'static str {
    match self {
      Shell::Bash => "bash",
      Shell::Zsh => "zsh",
      Shell::Fish => "fish",
    }
  }

  /// Relative install path for a completion script, per shell convention.
  ///
  /// These paths are what shell integration tooling scans, so they must be
  /// reproduced exactly.
  pub fn completion_path(&self, bin: &str) -> String {
    match self {
      Shell::Bash => format!("share/bash-completion/completions/{}", bin),
      Shell::Zsh => format!("share/zsh/vendor-completions/_{}", bin),
      Shell::Fish => format!("share/fish/vendor_completions.d/{}.fish", bin),
    }
  }

  /// Header line the binary itself does not emit.
  ///
  /// zsh scripts in a vendor completion directory need a `#compdef` line
  /// before the generated body; the other shells need nothing.
  pub fn preamble(&self, bin: &str) -> Option<String> {
    match self {
      Shell::Zsh => Some(format!("#compdef {}\n", bin)),
      Shell::Bash | Shell::Fish => None,
    }
  }
}

impl std::fmt::Display for Shell {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.as_str())
  }
}
