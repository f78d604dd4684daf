//! Quantization of heart rate series into symbol sequences.
//!
//! A series is mean-centered and mapped to small integer symbols. The alphabet
//! (the sorted set of symbols observed in a reference series) is built once and
//! frozen; every other series is encoded through it. A symbol missing from the
//! frozen alphabet is an error, never a silent truncation.

use std::collections::BTreeSet;

use nalgebra::DVectorView;

use crate::error::{EntropyError, Result};
use crate::trajectory::Trajectory;

/// Rule mapping a mean-centered value to a symbol.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quantizer {
    /// `1` if the value lies above the series mean, `0` otherwise.
    #[default]
    MeanThreshold,
    /// `k` equal-width bins spanning the mean-centered range.
    UniformBins(u8),
}

impl Quantizer {
    /// Quantizes a series.
    ///
    /// # Errors
    ///
    /// Returns [`EntropyError::InvalidInput`] if the series contains non-finite
    /// values or `UniformBins` has no bins.
    pub fn quantize(&self, series: &[f64]) -> Result<Vec<u8>> {
        if series.iter().any(|v| !v.is_finite()) {
            return Err(EntropyError::invalid("cannot quantize non-finite values"));
        }
        if series.is_empty() {
            return Ok(Vec::new());
        }
        let mean = DVectorView::from(series).mean();
        let centered = series.iter().map(|v| v - mean);
        match *self {
            Quantizer::MeanThreshold => Ok(centered.map(|v| u8::from(v > 0.0)).collect()),
            Quantizer::UniformBins(0) => Err(EntropyError::invalid(
                "uniform quantizer needs at least one bin",
            )),
            Quantizer::UniformBins(bins) => {
                let centered: Vec<f64> = centered.collect();
                let lo = centered.iter().copied().fold(f64::INFINITY, f64::min);
                let hi = centered.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let width = (hi - lo) / bins as f64;
                if width <= 0.0 {
                    return Ok(vec![0; centered.len()]);
                }
                Ok(centered
                    .iter()
                    .map(|v| (((v - lo) / width).floor() as usize).min(bins as usize - 1) as u8)
                    .collect())
            }
        }
    }
}

/// Frozen mapping from quantized symbols to consecutive codes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Alphabet {
    symbols: Vec<u8>,
}

impl Alphabet {
    /// Collects the sorted distinct symbols of a reference sequence.
    pub fn from_symbols(reference: &[u8]) -> Self {
        let symbols: BTreeSet<u8> = reference.iter().copied().collect();
        Self {
            symbols: symbols.into_iter().collect(),
        }
    }

    pub fn size(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Symbols in code order.
    pub fn symbols(&self) -> &[u8] {
        &self.symbols
    }

    pub fn code_of(&self, symbol: u8) -> Option<u8> {
        self.symbols.binary_search(&symbol).ok().map(|code| code as u8)
    }

    /// Maps quantized symbols to codes.
    ///
    /// # Errors
    ///
    /// Returns [`EntropyError::AlphabetMismatch`] for the first symbol outside
    /// the alphabet.
    pub fn encode(&self, name: &str, symbols: &[u8]) -> Result<SymbolSequence> {
        let codes = symbols
            .iter()
            .map(|&s| {
                self.code_of(s).ok_or(EntropyError::AlphabetMismatch {
                    symbol: s,
                    alphabet_size: self.size(),
                })
            })
            .collect::<Result<Vec<u8>>>()?;
        Ok(SymbolSequence::new(name, codes))
    }
}

/// A named sequence of alphabet codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolSequence {
    name: String,
    codes: Vec<u8>,
}

impl SymbolSequence {
    pub fn new(name: &str, codes: Vec<u8>) -> Self {
        Self {
            name: name.to_owned(),
            codes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn codes(&self) -> &[u8] {
        &self.codes
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Quantizes series and encodes them through a frozen alphabet.
///
/// # Example
///
/// ```rust
/// use hrv_entropy::analysis::symbols::{Quantizer, SymbolCodec};
///
/// let codec = SymbolCodec::new(Quantizer::MeanThreshold);
/// let reference = [0.5, -0.2, 0.1, -0.4];
/// let alphabet = codec.build_alphabet(&reference).unwrap();
/// assert_eq!(alphabet.size(), 2);
/// let seq = codec.encode("run_0", &[1.0, 2.0, 0.0], &alphabet).unwrap();
/// assert_eq!(seq.codes(), &[0, 1, 0]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SymbolCodec {
    quantizer: Quantizer,
}

impl SymbolCodec {
    pub fn new(quantizer: Quantizer) -> Self {
        Self { quantizer }
    }

    pub fn quantizer(&self) -> Quantizer {
        self.quantizer
    }

    /// Builds the alphabet from the quantized reference series.
    pub fn build_alphabet(&self, reference: &[f64]) -> Result<Alphabet> {
        Ok(Alphabet::from_symbols(&self.quantizer.quantize(reference)?))
    }

    /// Quantizes a series and encodes it through `alphabet`.
    pub fn encode(&self, name: &str, series: &[f64], alphabet: &Alphabet) -> Result<SymbolSequence> {
        alphabet.encode(name, &self.quantizer.quantize(series)?)
    }

    /// Encodes every series of a trajectory.
    ///
    /// The series at `reference` defines the alphabet.
    ///
    /// # Errors
    ///
    /// Returns [`EntropyError::InvalidInput`] if `reference` is out of range and
    /// [`EntropyError::AlphabetMismatch`] if another series quantizes to a
    /// symbol the reference never produced.
    pub fn encode_trajectory(
        &self,
        trajectory: &Trajectory,
        reference: usize,
    ) -> Result<(Alphabet, Vec<SymbolSequence>)> {
        let reference = trajectory.series_values(reference).ok_or_else(|| {
            EntropyError::invalid(format!(
                "reference series {reference} out of range ({} series)",
                trajectory.n_series()
            ))
        })?;
        let alphabet = self.build_alphabet(&reference)?;
        let sequences = trajectory
            .names()
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let values: Vec<f64> = trajectory.values().column(idx).iter().copied().collect();
                self.encode(name, &values, &alphabet)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((alphabet, sequences))
    }
}
