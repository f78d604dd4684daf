//! Entropy rate estimation from the log-loss of a trained sequence predictor.
//!
//! The estimator trains a predictor on a set of symbol sequences and scores a
//! second set. The average log-loss per symbol of an evaluation sequence is a
//! plug-in estimate of the entropy rate (bits per symbol) of the process that
//! generated it. Training and evaluation sets may be the same (self-entropy)
//! or different (generalisation between runs).
//!
//! # Example
//!
//! ```rust
//! use hrv_entropy::analysis::entropy::{EntropyEstimator, PredictorStrategy};
//! use hrv_entropy::analysis::symbols::{Alphabet, SymbolSequence};
//!
//! let alphabet = Alphabet::from_symbols(&[0, 1]);
//! let periodic: Vec<u8> = (0..400).map(|i| (i % 2) as u8).collect();
//! let sequences = vec![SymbolSequence::new("run_0", periodic)];
//!
//! let estimator = EntropyEstimator::new(PredictorStrategy::ContextTreeWeighting, 4);
//! let result = estimator.estimate_self(&alphabet, &sequences).unwrap();
//! assert!(result.mean() < 0.1);
//! ```

use anyhow::Result as AnyResult;
use log::{debug, trace};

use super::ctw::ContextTreeWeighting;
use super::symbols::{Alphabet, SymbolSequence};
use crate::error::{EntropyError, Result};

/// A trained predictor for one alphabet.
///
/// Sessions are opened per estimate and dropped when it returns, so no
/// statistics leak between recordings.
#[cfg_attr(test, mockall::automock)]
pub trait PredictorSession {
    /// Adds the statistics of one sequence to the model.
    fn learn(&mut self, sequence: &[u8]) -> AnyResult<()>;

    /// Cumulative log-loss of `sequence` in bits, i.e. `-log2 P(sequence)`,
    /// under the current model. Scoring does not train the model.
    fn log_loss(&self, sequence: &[u8]) -> AnyResult<f64>;
}

/// Factory for predictor sessions.
///
/// # Example
///
/// ```
/// use hrv_entropy::analysis::entropy::{PredictorEngine, PredictorSession};
/// use anyhow::Result;
///
/// struct Uniform(usize);
///
/// impl PredictorSession for Uniform {
///     fn learn(&mut self, _sequence: &[u8]) -> Result<()> {
///         Ok(())
///     }
///     fn log_loss(&self, sequence: &[u8]) -> Result<f64> {
///         Ok(sequence.len() as f64 * (self.0 as f64).log2())
///     }
/// }
///
/// struct UniformEngine;
///
/// impl PredictorEngine for UniformEngine {
///     fn open_session(&self, alphabet_size: usize, _order: usize) -> Result<Box<dyn PredictorSession>> {
///         Ok(Box::new(Uniform(alphabet_size)))
///     }
/// }
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait PredictorEngine {
    /// Opens an untrained session for `alphabet_size` symbols conditioning on at
    /// most `order` preceding symbols.
    fn open_session(&self, alphabet_size: usize, order: usize) -> AnyResult<Box<dyn PredictorSession>>;
}

/// Available predictor engines.
/// User provided engines can be passed via the `Custom` variant.
#[derive(Default)]
pub enum PredictorStrategy {
    /// Native decomposed context tree weighting.
    #[default]
    ContextTreeWeighting,
    /// A custom engine implementing the `PredictorEngine` trait.
    Custom(Box<dyn PredictorEngine + Send + Sync>),
}

impl std::fmt::Debug for PredictorStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PredictorStrategy::ContextTreeWeighting => f.write_str("ContextTreeWeighting"),
            PredictorStrategy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl PredictorEngine for PredictorStrategy {
    fn open_session(&self, alphabet_size: usize, order: usize) -> AnyResult<Box<dyn PredictorSession>> {
        match self {
            PredictorStrategy::ContextTreeWeighting => {
                ContextTreeWeighting.open_session(alphabet_size, order)
            }
            PredictorStrategy::Custom(engine) => engine.open_session(alphabet_size, order),
        }
    }
}

/// Entropy of one evaluation sequence.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct EntropyEntry {
    pub index: String,
    /// Bits per symbol; NaN for an empty sequence.
    pub entropy: f64,
}

/// Per-sequence entropies and their mean.
///
/// With the `serde` feature the result serializes as the bare list of
/// `(index, entropy)` rows.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntropyResult {
    entries: Vec<EntropyEntry>,
}

impl EntropyResult {
    pub fn new(entries: Vec<EntropyEntry>) -> Self {
        Self { entries }
    }

    /// Rows of the `(index, entropy)` table.
    pub fn entries(&self) -> &[EntropyEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Arithmetic mean of all entries.
    ///
    /// NaN if any entry is NaN or there are no entries.
    pub fn mean(&self) -> f64 {
        if self.entries.is_empty() {
            return f64::NAN;
        }
        self.entries.iter().map(|e| e.entropy).sum::<f64>() / self.entries.len() as f64
    }
}

/// Trains a predictor on training sequences and scores evaluation sequences.
#[derive(Debug)]
pub struct EntropyEstimator {
    engine: PredictorStrategy,
    order: usize,
}

impl Default for EntropyEstimator {
    fn default() -> Self {
        Self::new(PredictorStrategy::default(), Self::DEFAULT_ORDER)
    }
}

impl EntropyEstimator {
    /// Default maximum context order.
    pub const DEFAULT_ORDER: usize = 30;

    pub fn new(engine: PredictorStrategy, order: usize) -> Self {
        Self { engine, order }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Estimates the entropy rate of every evaluation sequence.
    ///
    /// # Protocol
    ///
    /// 1. A session is opened for the alphabet size and the context order.
    /// 2. Every training sequence is learned once.
    /// 3. Every evaluation sequence is scored; its cumulative log-loss divided
    ///    by its length is its entropy. Empty sequences yield NaN.
    ///
    /// # Arguments
    ///
    /// * `alphabet` - The frozen alphabet every code refers to.
    /// * `train` - Sequences the predictor learns from.
    /// * `eval` - Sequences scored under the trained predictor.
    ///
    /// # Returns
    ///
    /// One entry per evaluation sequence, in input order.
    ///
    /// # Errors
    ///
    /// - [`EntropyError::AlphabetMismatch`] if a sequence holds a code outside
    ///   the alphabet; checked before the session is opened.
    /// - [`EntropyError::ExternalFailure`] if the engine fails.
    pub fn estimate(
        &self,
        alphabet: &Alphabet,
        train: &[SymbolSequence],
        eval: &[SymbolSequence],
    ) -> Result<EntropyResult> {
        for seq in train.iter().chain(eval.iter()) {
            if let Some(&code) = seq.codes().iter().find(|&&c| c as usize >= alphabet.size()) {
                return Err(EntropyError::AlphabetMismatch {
                    symbol: code,
                    alphabet_size: alphabet.size(),
                });
            }
        }

        let mut session = self
            .engine
            .open_session(alphabet.size(), self.order)
            .map_err(EntropyError::ExternalFailure)?;
        for seq in train {
            session
                .learn(seq.codes())
                .map_err(EntropyError::ExternalFailure)?;
            trace!("learned sequence `{}` ({} symbols)", seq.name(), seq.len());
        }

        let entries = eval
            .iter()
            .map(|seq| -> Result<EntropyEntry> {
                let entropy = if seq.is_empty() {
                    f64::NAN
                } else {
                    session
                        .log_loss(seq.codes())
                        .map_err(EntropyError::ExternalFailure)?
                        / seq.len() as f64
                };
                Ok(EntropyEntry {
                    index: seq.name().to_owned(),
                    entropy,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let result = EntropyResult::new(entries);
        debug!(
            "estimated entropy of {} sequences (alphabet {}, order {}): mean {:.4}",
            result.len(),
            alphabet.size(),
            self.order,
            result.mean()
        );
        Ok(result)
    }

    /// Estimates self-entropy: every sequence is both trained on and scored.
    pub fn estimate_self(
        &self,
        alphabet: &Alphabet,
        sequences: &[SymbolSequence],
    ) -> Result<EntropyResult> {
        self.estimate(alphabet, sequences, sequences)
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;
    use mockall::Sequence;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn binary() -> Alphabet {
        Alphabet::from_symbols(&[0, 1])
    }

    #[test]
    fn protocol_trains_then_scores() {
        let mut order = Sequence::new();
        let mut session = MockPredictorSession::new();
        session
            .expect_learn()
            .with(eq(vec![0u8, 1, 1]))
            .times(1)
            .in_sequence(&mut order)
            .returning(|_| Ok(()));
        session
            .expect_learn()
            .with(eq(vec![1u8, 0]))
            .times(1)
            .in_sequence(&mut order)
            .returning(|_| Ok(()));
        session
            .expect_log_loss()
            .with(eq(vec![0u8, 0, 1, 1]))
            .times(1)
            .in_sequence(&mut order)
            .returning(|_| Ok(6.0));

        let mut engine = MockPredictorEngine::new();
        engine
            .expect_open_session()
            .with(eq(2), eq(7))
            .times(1)
            .return_once(move |_, _| Ok(Box::new(session) as Box<dyn PredictorSession>));

        let estimator = EntropyEstimator::new(PredictorStrategy::Custom(Box::new(engine)), 7);
        let train = vec![
            SymbolSequence::new("a", vec![0, 1, 1]),
            SymbolSequence::new("b", vec![1, 0]),
        ];
        let eval = vec![SymbolSequence::new("c", vec![0, 0, 1, 1])];
        let result = estimator.estimate(&binary(), &train, &eval).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.entries()[0].index, "c");
        assert_eq!(result.entries()[0].entropy, 1.5);
        assert_eq!(result.mean(), 1.5);
    }

    #[test]
    fn empty_sequence_is_nan_and_propagates() {
        let estimator = EntropyEstimator::new(PredictorStrategy::ContextTreeWeighting, 4);
        let seqs = vec![
            SymbolSequence::new("full", vec![0, 1, 0, 1]),
            SymbolSequence::new("empty", vec![]),
        ];
        let result = estimator.estimate_self(&binary(), &seqs).unwrap();
        assert!(result.entries()[0].entropy.is_finite());
        assert!(result.entries()[1].entropy.is_nan());
        assert!(result.mean().is_nan());
        assert!(EntropyResult::default().mean().is_nan());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn result_serializes_as_flat_table() {
        let result = EntropyResult::new(vec![
            EntropyEntry {
                index: "draw_0".into(),
                entropy: 0.5,
            },
            EntropyEntry {
                index: "draw_1".into(),
                entropy: 0.25,
            },
        ]);
        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(
            json,
            r#"[{"index":"draw_0","entropy":0.5},{"index":"draw_1","entropy":0.25}]"#
        );
        let parsed: EntropyResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, result);
    }

    #[test]
    fn code_outside_alphabet_is_rejected_before_session() {
        let mut engine = MockPredictorEngine::new();
        engine.expect_open_session().times(0);
        let estimator = EntropyEstimator::new(PredictorStrategy::Custom(Box::new(engine)), 4);
        let seqs = vec![SymbolSequence::new("bad", vec![0, 2])];
        let result = estimator.estimate_self(&binary(), &seqs);
        assert!(matches!(
            result,
            Err(EntropyError::AlphabetMismatch {
                symbol: 2,
                alphabet_size: 2
            })
        ));
    }

    #[test]
    fn engine_failure_is_surfaced() {
        let mut engine = MockPredictorEngine::new();
        engine
            .expect_open_session()
            .returning(|_, _| Err(anyhow::anyhow!("engine unavailable")));
        let estimator = EntropyEstimator::new(PredictorStrategy::Custom(Box::new(engine)), 4);
        let seqs = vec![SymbolSequence::new("a", vec![0, 1])];
        let err = estimator.estimate_self(&binary(), &seqs).unwrap_err();
        assert!(matches!(err, EntropyError::ExternalFailure(_)));
        assert!(err.to_string().contains("external collaborator failed"));
    }

    #[test]
    fn constant_sequence_has_near_zero_entropy() {
        let estimator = EntropyEstimator::default();
        let alphabet = Alphabet::from_symbols(&[0]);
        let seqs = vec![SymbolSequence::new("flat", vec![0; 500])];
        let result = estimator.estimate_self(&alphabet, &seqs).unwrap();
        assert!(result.mean().abs() < 1e-12);

        // a constant run is also cheap under a binary alphabet
        let result = estimator.estimate_self(&binary(), &seqs).unwrap();
        assert!(result.mean() < 0.05, "entropy {}", result.mean());
    }

    #[test]
    fn fair_coin_generalises_to_one_bit() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let mut draw = |name: &str| {
            SymbolSequence::new(name, (0..3000).map(|_| u8::from(rng.gen_bool(0.5))).collect())
        };
        let train = vec![draw("t0"), draw("t1")];
        let eval = vec![draw("e0"), draw("e1")];
        let estimator = EntropyEstimator::new(PredictorStrategy::default(), EntropyEstimator::DEFAULT_ORDER);
        let result = estimator.estimate(&binary(), &train, &eval).unwrap();
        for entry in result.entries() {
            assert!((entry.entropy - 1.0).abs() < 0.1, "entropy {}", entry.entropy);
        }
    }

    #[test]
    fn sessions_are_not_shared_between_estimates() {
        let mut engine = MockPredictorEngine::new();
        engine.expect_open_session().times(2).returning(|size, order| {
            ContextTreeWeighting.open_session(size, order)
        });
        let estimator = EntropyEstimator::new(PredictorStrategy::Custom(Box::new(engine)), 3);
        let seqs = vec![SymbolSequence::new("a", vec![0, 1, 1, 0, 1, 0, 0, 1])];
        let first = estimator.estimate_self(&binary(), &seqs).unwrap();
        let second = estimator.estimate_self(&binary(), &seqs).unwrap();
        assert_eq!(first, second);
    }
}
