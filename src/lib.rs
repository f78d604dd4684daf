//! Heart rate entropy estimation.
//!
//! Reconstructs heartbeat times from a repeated-value R-R channel, turns them
//! into heart-rate trajectories on a regular grid, quantizes the successive
//! differences and estimates their entropy rate with a context tree predictor.
//!
//! The [`pipeline::EntropyPipeline`] runs every stage for one recording; the
//! stages are also usable on their own.

pub mod analysis;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod preprocessing;
pub mod sources;
pub mod trajectory;

pub use error::{EntropyError, Result};
