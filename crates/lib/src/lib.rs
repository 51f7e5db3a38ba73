//! ingot-lib: Descriptor evaluation for content-verified package builds
//!
//! This crate provides the pieces of the build pipeline:
//! - `Recipe`: immutable build descriptors loaded from TOML
//! - `fetch`: pinned source archive acquisition and integrity verification
//! - `build`: parameter binding and opaque backend invocation
//! - `install`: post-build generation of the installable output tree
//! - `pipeline`: the fixed-stage executor tying the stages together

pub mod build;
pub mod fetch;
pub mod install;
pub mod pipeline;
pub mod recipe;
pub mod shell;
pub mod tree;
pub mod util;
