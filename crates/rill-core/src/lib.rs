//! Core sparse containers for rill (pure Rust)

pub mod csc;
pub mod csr;

pub use csc::Csc;
pub use csr::Csr;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
