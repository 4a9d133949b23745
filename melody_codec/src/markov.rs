// Count-based Markov predictor over vocabulary ids.
//
// A reference `Predictor` so the pipeline runs end to end without an
// external numeric model. Trained from the same sliding windows a neural
// model would see. For every window and every order k in 1..=order it counts
// `target` after the last k context ids.
//
// Prediction backs off from the highest order whose context was seen in
// training down to order 1, then to the unigram distribution of targets. The
// first table that matches supplies the whole distribution (no mixing across
// orders). Saved and loaded as JSON.

use crate::corpus::TrainingWindows;
use crate::error::{MelodyError, Result};
use crate::predictor::Predictor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Next id -> number of times it followed the context.
type TransitionTable = BTreeMap<usize, f64>;

/// Backoff n-gram predictor over vocabulary ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkovPredictor {
    /// Longest context (in ids) the model conditions on.
    pub order: usize,
    /// Length of every predicted vector.
    pub vocab_len: usize,
    /// `tables[k - 1]` maps an order-k context key to its transition table.
    pub tables: Vec<BTreeMap<String, TransitionTable>>,
    /// Overall distribution of targets.
    pub unigram: TransitionTable,
}

impl MarkovPredictor {
    /// Count transitions over `windows`.
    pub fn train(windows: TrainingWindows<'_>, vocab_len: usize, order: usize) -> Result<Self> {
        if order == 0 {
            return Err(MelodyError::invalid_parameter("order", "must be at least 1"));
        }
        if vocab_len == 0 {
            return Err(MelodyError::invalid_parameter("vocab_len", "must be at least 1"));
        }
        let mut model = Self {
            order,
            vocab_len,
            tables: vec![BTreeMap::new(); order],
            unigram: TransitionTable::new(),
        };
        let mut count = 0usize;
        for window in windows {
            if window.target >= vocab_len {
                return Err(MelodyError::InvalidId {
                    id: window.target,
                    len: vocab_len,
                });
            }
            let ctx = window.context;
            for k in 1..=order.min(ctx.len()) {
                let key = context_key(&ctx[ctx.len() - k..]);
                *model.tables[k - 1]
                    .entry(key)
                    .or_default()
                    .entry(window.target)
                    .or_default() += 1.0;
            }
            *model.unigram.entry(window.target).or_default() += 1.0;
            count += 1;
        }
        info!(windows = count, order, vocab_len, "trained Markov predictor");
        Ok(model)
    }

    fn table_for(&self, context: &[usize]) -> Option<&TransitionTable> {
        let longest = self.order.min(context.len());
        (1..=longest).rev().find_map(|k| {
            let key = context_key(&context[context.len() - k..]);
            self.tables[k - 1].get(&key)
        })
    }

    /// Write the model as JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string(self).map_err(|e| MelodyError::json(path, e))?;
        std::fs::write(path, json).map_err(|e| MelodyError::io(path, e))
    }

    /// Read a JSON model, rejecting tables with ids outside `vocab_len`.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| MelodyError::io(path, e))?;
        let model: MarkovPredictor =
            serde_json::from_str(&data).map_err(|e| MelodyError::json(path, e))?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<()> {
        if self.order == 0 || self.tables.len() != self.order || self.vocab_len == 0 {
            return Err(MelodyError::Predictor(format!(
                "inconsistent model shape: order {}, {} tables, vocab_len {}",
                self.order,
                self.tables.len(),
                self.vocab_len
            )));
        }
        let ids = self
            .tables
            .iter()
            .flat_map(|t| t.values())
            .chain(std::iter::once(&self.unigram))
            .flat_map(|t| t.keys());
        for &id in ids {
            if id >= self.vocab_len {
                return Err(MelodyError::InvalidId {
                    id,
                    len: self.vocab_len,
                });
            }
        }
        Ok(())
    }
}

impl Predictor for MarkovPredictor {
    fn predict(&self, context: &[usize]) -> Result<Vec<f64>> {
        let table = self.table_for(context).unwrap_or(&self.unigram);
        let total: f64 = table.values().sum();
        if total <= 0.0 {
            // Untrained: every id equally likely.
            return Ok(vec![1.0 / self.vocab_len as f64; self.vocab_len]);
        }
        let mut probs = vec![0.0; self.vocab_len];
        for (&id, &count) in table {
            probs[id] = count / total;
        }
        Ok(probs)
    }
}

/// Encode a context as a string key so the tables serialize as JSON objects.
fn context_key(context: &[usize]) -> String {
    context
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
