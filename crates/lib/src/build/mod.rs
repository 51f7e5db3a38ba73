//! Parameterized invocation of the opaque build backend.

mod flags;
mod invoke;

pub use flags::bind_flags;
pub use invoke::{ArtifactSet, BuildError, invoke_backend};
