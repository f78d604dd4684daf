//! Decomposed context tree weighting (CTW) predictor.
//!
//! Native implementation of the [`PredictorEngine`] contract. Symbols of a
//! `k`-ary alphabet are written as `ceil(log2 k)` bits, most significant first,
//! and every bit prefix owns a binary context tree. Each tree conditions on up
//! to `order` preceding symbols and mixes all context lengths with the usual
//! CTW weighting:
//!
//! ```text
//! P_w(node) = P_e(node)                                  at maximum depth
//! P_w(node) = 1/2 P_e(node) + 1/2 prod_c P_w(child c)    otherwise
//! ```
//!
//! where `P_e` is the Krichevsky-Trofimov estimate `(n_b + 1/2) / (n_0 + n_1 + 1)`.
//! All probabilities are kept in the natural log domain; log-losses are
//! reported in bits.
//!
//! # References
//!
//! - Willems, F., Shtarkov, Y., Tjalkens, T. (1995). *The context-tree weighting method: basic properties*. IEEE Trans. Inf. Theory, 41(3), 653-664.
//! - Begleiter, R., El-Yaniv, R., Yona, G. (2004). *On prediction using variable order Markov models*. JAIR, 22, 385-421.

use std::f64::consts::LN_2;

use anyhow::{anyhow, Result};
use log::trace;

use super::entropy::{PredictorEngine, PredictorSession};

/// Largest alphabet a session accepts; codes are stored as `u8`.
pub const MAX_ALPHABET_SIZE: usize = 256;

const NONE: u32 = u32::MAX;

/// Engine opening [`CtwSession`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextTreeWeighting;

impl PredictorEngine for ContextTreeWeighting {
    fn open_session(&self, alphabet_size: usize, order: usize) -> Result<Box<dyn PredictorSession>> {
        Ok(Box::new(CtwSession::new(alphabet_size, order)?))
    }
}

#[derive(Debug, Clone, Copy)]
struct Node {
    symbol: u8,
    first_child: u32,
    next_sibling: u32,
    counts: [u32; 2],
    log_pe: f64,
    log_pw: f64,
    /// Sum of the children's `log_pw`.
    log_children: f64,
}

impl Node {
    fn new(symbol: u8) -> Self {
        Self {
            symbol,
            first_child: NONE,
            next_sibling: NONE,
            counts: [0, 0],
            log_pe: 0.0,
            log_pw: 0.0,
            log_children: 0.0,
        }
    }
}

/// Node statistics after a hypothetical update, one entry per depth.
#[derive(Debug, Clone, Copy)]
struct Update {
    log_pe: f64,
    log_pw: f64,
    log_children: f64,
}

/// Binary context tree over `k`-ary contexts, stored as an arena.
#[derive(Debug, Clone)]
struct ContextTree {
    nodes: Vec<Node>,
    depth: usize,
}

impl ContextTree {
    fn new(depth: usize) -> Self {
        Self {
            nodes: vec![Node::new(0)],
            depth,
        }
    }

    fn child(&self, parent: usize, symbol: u8) -> Option<usize> {
        let mut cursor = self.nodes[parent].first_child;
        while cursor != NONE {
            let node = &self.nodes[cursor as usize];
            if node.symbol == symbol {
                return Some(cursor as usize);
            }
            cursor = node.next_sibling;
        }
        None
    }

    /// Existing nodes along the context path, root first.
    fn path(&self, context: &[u8]) -> Vec<Option<usize>> {
        let mut path = Vec::with_capacity(self.depth + 1);
        let mut current = Some(0);
        path.push(current);
        for &symbol in context.iter().take(self.depth) {
            current = current.and_then(|parent| self.child(parent, symbol));
            path.push(current);
        }
        path
    }

    /// Statistics of every node on `path` after observing `bit`, root first.
    fn updated(&self, path: &[Option<usize>], bit: usize) -> Vec<Update> {
        let mut updates = vec![
            Update {
                log_pe: 0.0,
                log_pw: 0.0,
                log_children: 0.0
            };
            path.len()
        ];
        for d in (0..path.len()).rev() {
            let node = path[d].map(|idx| self.nodes[idx]).unwrap_or(Node::new(0));
            let total = (node.counts[0] + node.counts[1]) as f64;
            let log_pe = node.log_pe + ((node.counts[bit] as f64 + 0.5) / (total + 1.0)).ln();
            if d == self.depth {
                updates[d] = Update {
                    log_pe,
                    log_pw: log_pe,
                    log_children: 0.0,
                };
            } else {
                let old_child = path[d + 1].map_or(0.0, |idx| self.nodes[idx].log_pw);
                let log_children = node.log_children - old_child + updates[d + 1].log_pw;
                updates[d] = Update {
                    log_pe,
                    log_pw: log_add_exp(log_pe, log_children) - LN_2,
                    log_children,
                };
            }
        }
        updates
    }

    /// Natural log of the probability of `bit` in `context`, without learning.
    fn log_prob(&self, context: &[u8], bit: usize) -> f64 {
        let path = self.path(context);
        let updates = self.updated(&path, bit);
        updates[0].log_pw - self.nodes[0].log_pw
    }

    /// Learns `bit` in `context` and returns its log probability before the update.
    fn learn(&mut self, context: &[u8], bit: usize) -> f64 {
        let path = self.path(context);
        let updates = self.updated(&path, bit);
        let log_prob = updates[0].log_pw - self.nodes[0].log_pw;

        let mut parent = 0;
        for (d, update) in updates.iter().enumerate() {
            let idx = match path[d] {
                Some(idx) => idx,
                None => self.insert_child(parent, context[d - 1]),
            };
            let node = &mut self.nodes[idx];
            node.counts[bit] += 1;
            node.log_pe = update.log_pe;
            node.log_pw = update.log_pw;
            node.log_children = update.log_children;
            parent = idx;
        }
        log_prob
    }

    fn insert_child(&mut self, parent: usize, symbol: u8) -> usize {
        let idx = self.nodes.len();
        let mut node = Node::new(symbol);
        node.next_sibling = self.nodes[parent].first_child;
        self.nodes.push(node);
        self.nodes[parent].first_child = idx as u32;
        idx
    }
}

fn log_add_exp(a: f64, b: f64) -> f64 {
    let (hi, lo) = if a > b { (a, b) } else { (b, a) };
    hi + (lo - hi).exp().ln_1p()
}

/// A trained CTW model for one alphabet.
///
/// Each sequence passed to [`PredictorSession::learn`] or
/// [`PredictorSession::log_loss`] starts with an empty history padded with
/// code `0`.
#[derive(Debug, Clone)]
pub struct CtwSession {
    alphabet_size: usize,
    order: usize,
    bits: usize,
    /// One tree per bit prefix, indexed as a binary heap (root prefix at 1).
    trees: Vec<ContextTree>,
}

impl CtwSession {
    /// Creates an untrained session.
    ///
    /// # Errors
    ///
    /// Returns an error if the alphabet has more than [`MAX_ALPHABET_SIZE`] symbols.
    pub fn new(alphabet_size: usize, order: usize) -> Result<Self> {
        if alphabet_size > MAX_ALPHABET_SIZE {
            return Err(anyhow!(
                "alphabet size {alphabet_size} exceeds the supported maximum of {MAX_ALPHABET_SIZE}"
            ));
        }
        let bits = if alphabet_size <= 1 {
            0
        } else {
            (usize::BITS - (alphabet_size - 1).leading_zeros()) as usize
        };
        Ok(Self {
            alphabet_size,
            order,
            bits,
            trees: (0..1usize << bits).map(|_| ContextTree::new(order)).collect(),
        })
    }

    pub fn alphabet_size(&self) -> usize {
        self.alphabet_size
    }

    pub fn order(&self) -> usize {
        self.order
    }

    fn validate(&self, sequence: &[u8]) -> Result<()> {
        match sequence
            .iter()
            .find(|&&s| s as usize >= self.alphabet_size)
        {
            Some(s) => Err(anyhow!(
                "symbol {s} outside alphabet of size {}",
                self.alphabet_size
            )),
            None => Ok(()),
        }
    }

    /// Whether the bit following `prefix` (with `remaining` bits after it) can
    /// only be zero because larger codes do not exist.
    fn forced_zero(&self, prefix: usize, remaining: usize) -> bool {
        ((prefix << 1) | 1) << remaining >= self.alphabet_size
    }

    /// Tree index and value of every bit that codes `symbol`.
    ///
    /// Trees are indexed as a binary heap over bit prefixes with the root at 1.
    /// Bits forced to zero by the alphabet size are skipped.
    fn coded_bits(&self, symbol: u8) -> Vec<(usize, usize)> {
        let mut coded = Vec::with_capacity(self.bits);
        let mut node = 1usize;
        for level in 0..self.bits {
            let remaining = self.bits - level - 1;
            let bit = ((symbol as usize) >> remaining) & 1;
            if !self.forced_zero(node - (1 << level), remaining) {
                coded.push((node, bit));
            }
            node = (node << 1) | bit;
        }
        coded
    }

    /// Natural log-probability of `symbol` after `context` under the frozen model.
    fn symbol_log_prob(&self, context: &[u8], symbol: u8) -> f64 {
        self.coded_bits(symbol)
            .into_iter()
            .map(|(tree, bit)| self.trees[tree].log_prob(context, bit))
            .sum()
    }

    fn learn_symbol(&mut self, context: &[u8], symbol: u8) -> f64 {
        self.coded_bits(symbol)
            .into_iter()
            .map(|(tree, bit)| self.trees[tree].learn(context, bit))
            .sum()
    }
}

/// Shifts `symbol` into the most recent position of the context.
fn push_context(context: &mut [u8], symbol: u8) {
    if !context.is_empty() {
        context.rotate_right(1);
        context[0] = symbol;
    }
}

impl PredictorSession for CtwSession {
    fn learn(&mut self, sequence: &[u8]) -> Result<()> {
        self.validate(sequence)?;
        let mut context = vec![0u8; self.order];
        let mut log_prob = 0.0;
        for &symbol in sequence {
            log_prob += self.learn_symbol(&context, symbol);
            push_context(&mut context, symbol);
        }
        trace!(
            "learned {} symbols, adaptive code length {:.1} bits",
            sequence.len(),
            -log_prob / LN_2
        );
        Ok(())
    }

    fn log_loss(&self, sequence: &[u8]) -> Result<f64> {
        self.validate(sequence)?;
        let mut context = vec![0u8; self.order];
        let mut log_prob = 0.0;
        for &symbol in sequence {
            log_prob += self.symbol_log_prob(&context, symbol);
            push_context(&mut context, symbol);
        }
        Ok(-log_prob / LN_2)
    }
}
