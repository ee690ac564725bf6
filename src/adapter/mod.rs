//! Adapter that turns a Claude Code session into a stream of typed chunks.

mod chunk;
mod error;
mod normalizer;
mod policy;
mod session;
mod usage;

pub use chunk::*;
pub use error::*;
pub use normalizer::*;
pub use policy::*;
pub use session::*;
pub use usage::*;
