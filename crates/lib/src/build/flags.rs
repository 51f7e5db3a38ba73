//! Build flag binding.
//!
//! The binder is pure: the same parameters and version string always produce
//! the same ordered flag sequence. Nothing here reads the environment.

use crate::recipe::BuildParams;

/// Assemble the ordered flag sequence for one backend invocation.
///
/// The version string is embedded through a linker symbol assignment
/// (`-X <symbol>=<version>`) so the built binary reports its own identity;
/// the optional `-s -w` directive strips symbol tables for size. Extra
/// flags follow in declared order.
pub fn bind_flags(params: &BuildParams, version: &str) -> Vec<String> {
  let mut ldflags = String::new();
  if params.strip {
    ldflags.push_str("-s -w ");
  }
  ldflags.push_str(&format!("-X {}={}", params.version_symbol, version));

  let mut flags = Vec::with_capacity(1 + params.flags.len());
  flags.push(format!("-ldflags={}", ldflags));
  flags.extend(params.flags.iter().cloned());
  flags
}
