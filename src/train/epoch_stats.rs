use serde::{Deserialize, Serialize};

/// Summary of one pass over the training set.
///
/// `train_loop` sends one of these through `TrainConfig::progress_tx` after
/// every epoch it finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// Counts from 1.
    pub epoch: usize,
    pub total_epochs: usize,
    /// Average cost loss the solver reported while training this epoch.
    pub train_loss: f64,
    pub val_loss: Option<f64>,
    /// Share of correctly classified training examples; `None` unless every
    /// target is a class.
    pub train_accuracy: Option<f64>,
    pub val_accuracy: Option<f64>,
    pub elapsed_ms: u64,
}
