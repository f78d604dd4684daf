/// This module contains the analysis stages of the entropy pipeline.
///
/// The available submodules are:
///
/// - `interpolation`: Cubic spline resampling of trajectories onto regular axes.
/// - `symbols`: Quantization and frozen-alphabet encoding.
/// - `entropy`: Entropy rate estimation from predictor log-loss.
/// - `ctw`: Decomposed context tree weighting predictor.
pub mod ctw;
pub mod entropy;
pub mod interpolation;
pub mod symbols;
