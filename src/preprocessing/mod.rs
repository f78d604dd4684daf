//! This module contains submodules for preprocessing raw recordings.
//!
//! The `segmentation` submodule reconstructs heartbeat times from a repeated-value channel.
//! The `smoothing` submodule smooths and decimates posterior draws.
pub mod segmentation;
pub mod smoothing;
