//! PowerGuard Core - Smart meter electricity theft detection
//!
//! Hourly readings per meter go in, one scored record per meter comes out:
//! feature extraction, an unsupervised detector fitted on the batch, a
//! textual explanation and a risk tier.

pub mod config;
pub mod constants;
pub mod error;
pub mod logic;

pub use config::Settings;
pub use error::{PipelineError, PipelineResult};
