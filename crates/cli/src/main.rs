use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cmd;
mod output;

/// ingot - reproducible package builds from pinned source archives
#[derive(Parser)]
#[command(name = "ingot")]
#[command(author, version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Evaluate a recipe and materialize its output tree
  Build {
    /// Path to the recipe file
    recipe: PathBuf,

    /// Directory the output tree is written into (must be empty)
    #[arg(short, long)]
    out: PathBuf,

    /// Build backend program
    #[arg(long)]
    backend: Option<String>,

    /// Source forge base URL
    #[arg(long)]
    forge_base: Option<String>,

    /// Keep build scratch files here instead of a temp dir
    #[arg(long)]
    work_dir: Option<PathBuf>,
  },

  /// Print a parsed recipe
  Info {
    /// Path to the recipe file
    recipe: PathBuf,

    /// Emit JSON instead of text
    #[arg(long)]
    json: bool,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .without_time()
    .init();

  let cli = Cli::parse();

  match cli.command {
    Commands::Build {
      recipe,
      out,
      backend,
      forge_base,
      work_dir,
    } => cmd::cmd_build(&recipe, &out, backend, forge_base, work_dir),
    Commands::Info { recipe, json } => cmd::cmd_info(&recipe, json),
  }
}
