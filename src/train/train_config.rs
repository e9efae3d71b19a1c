use std::sync::mpsc;

use crate::train::epoch_stats::EpochStats;

/// How many epochs `train_loop` runs and where it reports them.
///
/// With `shuffle` set the examples are visited in a fresh random order
/// every epoch. Dropping the `progress_tx` receiver ends the run after the
/// current epoch. Batching and the update rule live in the `Solver`.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub epochs: usize,
    pub shuffle: bool,
    pub progress_tx: Option<mpsc::Sender<EpochStats>>,
}

impl TrainConfig {
    /// Shuffling run with no progress channel.
    pub fn new(epochs: usize) -> Self {
        TrainConfig {
            epochs,
            shuffle: true,
            progress_tx: None,
        }
    }

    pub fn with_progress(mut self, tx: mpsc::Sender<EpochStats>) -> Self {
        self.progress_tx = Some(tx);
        self
    }
}
