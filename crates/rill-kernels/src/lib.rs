//! Streaming tiled SpMV kernels for rill (pure Rust, SIMD/parallel ready)

pub mod block;
pub mod error;
pub mod partition;
pub mod pipeline;
pub mod spmv;
pub mod tiled;
mod util;

pub use block::{TileStreams, BLOCK_WIDTH};
pub use error::{Error, Result};
pub use partition::{partition_balanced, validate_matrix, PartitionConfig, Tile};
pub use pipeline::compute_tile;
pub use spmv::spmv_f64_i64;
pub use tiled::{scatter, tiled_spmv, tiled_spmv_scattered};
