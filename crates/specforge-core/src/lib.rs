//! Discovery intake and per-feature PRD lifecycle.
//!
//! Synchronous throughout: the server calls in through `spawn_blocking`, the
//! CLI calls in directly.

pub mod config;
pub mod controller;
pub mod discovery;
pub mod error;
pub mod generation;
pub mod io;
pub mod locks;
pub mod metadata;
pub mod orchestration;
pub mod paths;
pub mod prd;
pub mod store;
pub mod types;

pub use error::{ForgeError, Result};
