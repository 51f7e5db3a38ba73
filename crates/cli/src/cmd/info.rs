//! Implementation of the `ingot info` command.
//!
//! Prints the parsed recipe: the pinned source, the install steps, and the
//! descriptive metadata. Nothing here touches the network or the backend.

use std::path::Path;

use anyhow::{Context, Result};
use ingot_lib::fetch::archive_url;
use ingot_lib::pipeline::ExecuteConfig;
use ingot_lib::recipe::{InstallStep, Recipe};

use crate::output;

pub fn cmd_info(recipe_path: &Path, json: bool) -> Result<()> {
  let recipe = Recipe::from_path(recipe_path)
    .with_context(|| format!("failed to load recipe {}", recipe_path.display()))?;

  if json {
    return output::print_json(&recipe);
  }

  let config = ExecuteConfig::default();

  println!("{} {}", recipe.name, recipe.version);
  output::print_stat("source", &archive_url(&config.forge_base, &recipe.source));
  output::print_stat("sha256", &recipe.sha256.0);
  output::print_stat("backend", &config.backend);

  println!("  steps:");
  for step in &recipe.install {
    match step {
      InstallStep::Bin => println!("    - bin/{}", recipe.name),
      InstallStep::Completions { shell } => println!("    - completions ({})", shell),
    }
  }

  if let Some(meta) = &recipe.meta {
    if let Some(description) = &meta.description {
      output::print_stat("description", description);
    }
    if let Some(homepage) = &meta.homepage {
      output::print_stat("homepage", homepage);
    }
    if let Some(license) = &meta.license {
      output::print_stat("license", license);
    }
    if !meta.platforms.is_empty() {
      output::print_stat("platforms", &meta.platforms.join(", "));
    }
  }

  Ok(())
}
