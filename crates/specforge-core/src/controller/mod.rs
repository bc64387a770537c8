//! The two writers of discovery and PRD state. Every mutation runs under a
//! per-entity lock from [`crate::locks::KeyedLocks`].

mod discovery;
mod prd;

pub use discovery::{Confirmation, DiscoveryController};
pub use prd::{PrdController, PrdPolicy};
