use serde::{Deserialize, Serialize};

use crate::error::{NetError, Result};

/// Search space and schedule of a [`MagicNet`](crate::magic::MagicNet).
///
/// Decay and learning rate bounds are base-10 exponents: a candidate's L2
/// decay is `10^u` with `u` drawn from `[l2_decay_min, l2_decay_max]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MagicNetOptions {
    /// Share of the examples each fold trains on; the rest validate.
    pub train_ratio: f64,
    pub num_folds: usize,
    /// Candidates evaluated side by side in one batch.
    pub num_candidates: usize,
    /// Passes over a fold's training examples before it is scored.
    pub num_epochs: usize,
    /// Best evaluated candidates averaged by `predict_soft`.
    pub ensemble_size: usize,
    pub batch_size_min: usize,
    pub batch_size_max: usize,
    pub l2_decay_min: f64,
    pub l2_decay_max: f64,
    pub learning_rate_min: f64,
    pub learning_rate_max: f64,
    pub momentum_min: f64,
    pub momentum_max: f64,
    /// Width range of sampled hidden layers.
    pub neurons_min: usize,
    pub neurons_max: usize,
}

impl Default for MagicNetOptions {
    fn default() -> Self {
        MagicNetOptions {
            train_ratio: 0.7,
            num_folds: 10,
            num_candidates: 50,
            num_epochs: 50,
            ensemble_size: 10,
            batch_size_min: 10,
            batch_size_max: 300,
            l2_decay_min: -4.0,
            l2_decay_max: 2.0,
            learning_rate_min: -4.0,
            learning_rate_max: 0.0,
            momentum_min: 0.9,
            momentum_max: 0.9,
            neurons_min: 5,
            neurons_max: 30,
        }
    }
}

impl MagicNetOptions {
    /// Checks the options against a data set of `num_examples` examples.
    pub fn validate(&self, num_examples: usize) -> Result<()> {
        let num_train = self.num_train(num_examples);
        if num_train == 0 || num_train >= num_examples {
            return Err(NetError::invalid_option(
                "train_ratio",
                format!(
                    "{} of {num_examples} examples leaves an empty training or validation split",
                    self.train_ratio
                ),
            ));
        }
        for (name, value) in [
            ("num_folds", self.num_folds),
            ("num_candidates", self.num_candidates),
            ("num_epochs", self.num_epochs),
            ("ensemble_size", self.ensemble_size),
            ("batch_size_min", self.batch_size_min),
        ] {
            if value == 0 {
                return Err(NetError::invalid_option(name, "must be at least 1"));
            }
        }
        // maxout hidden layers pair up neurons
        if self.neurons_min < 2 {
            return Err(NetError::invalid_option("neurons_min", "must be at least 2"));
        }
        check_range("batch_size", self.batch_size_min as f64, self.batch_size_max as f64)?;
        check_range("l2_decay", self.l2_decay_min, self.l2_decay_max)?;
        check_range("learning_rate", self.learning_rate_min, self.learning_rate_max)?;
        check_range("momentum", self.momentum_min, self.momentum_max)?;
        check_range("neurons", self.neurons_min as f64, self.neurons_max as f64)?;
        Ok(())
    }

    /// Training examples per fold.
    pub fn num_train(&self, num_examples: usize) -> usize {
        (self.train_ratio * num_examples as f64).floor() as usize
    }
}

fn check_range(name: &'static str, min: f64, max: f64) -> Result<()> {
    if !min.is_finite() || !max.is_finite() || min > max {
        return Err(NetError::invalid_option(name, format!("empty range [{min}, {max}]")));
    }
    Ok(())
}
