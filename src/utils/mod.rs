//! Utility functions and types

pub mod artifacts;
pub mod data_loader;
pub mod parallel;

pub use artifacts::ArtifactBatch;
pub use data_loader::{ensure_parent_dir, DataLoader, DataSaver};
pub use parallel::{CancellationToken, ParallelConfig};
