use std::time::Instant;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::info;

use crate::error::{NetError, Result};
use crate::loss::Target;
use crate::math::volume::Volume;
use crate::network::Network;
use crate::optim::Solver;
use crate::train::epoch_stats::EpochStats;
use crate::train::train_config::TrainConfig;

/// Paired examples and targets.
#[derive(Debug, Clone, Copy)]
pub struct Dataset<'a> {
    inputs: &'a [Volume],
    targets: &'a [Target],
}

impl<'a> Dataset<'a> {
    /// Fails when the set is empty or the two slices differ in length.
    pub fn new(inputs: &'a [Volume], targets: &'a [Target]) -> Result<Dataset<'a>> {
        if inputs.is_empty() {
            return Err(NetError::invalid_option("inputs", "dataset is empty"));
        }
        if inputs.len() != targets.len() {
            return Err(NetError::invalid_option(
                "targets",
                format!("{} inputs but {} targets", inputs.len(), targets.len()),
            ));
        }
        Ok(Dataset { inputs, targets })
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    fn is_classification(&self) -> bool {
        self.targets.iter().all(Target::is_classification)
    }
}

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

/// Trains `solver` for `config.epochs` epochs and returns the mean training
/// loss of the **last completed epoch**.
///
/// # Early termination
/// The loop stops after the current epoch if the `progress_tx` receiver has
/// been dropped.
pub fn train_loop(
    solver: &mut Solver,
    train: Dataset<'_>,
    validation: Option<Dataset<'_>>,
    config: &TrainConfig,
    rng: &mut impl Rng,
) -> Result<f64> {
    let mut order: Vec<usize> = (0..train.len()).collect();
    let mut last_train_loss = 0.0;

    for epoch in 1..=config.epochs {
        let t_start = Instant::now();

        // ── One full pass over the training data ───────────────────────────
        if config.shuffle {
            order.shuffle(rng);
        }
        let mut total = 0.0;
        for &i in &order {
            total += solver.train(&train.inputs[i], &train.targets[i])?.cost_loss;
        }
        let train_loss = total / train.len() as f64;
        last_train_loss = train_loss;

        let elapsed_ms = t_start.elapsed().as_millis() as u64;

        // ── Accuracy and validation ────────────────────────────────────────
        let train_accuracy = if train.is_classification() {
            Some(accuracy(solver.network_mut(), train)?)
        } else {
            None
        };
        let (val_loss, val_accuracy) = match validation {
            Some(set) => {
                let (loss, acc) = evaluate(solver.network_mut(), set)?;
                (Some(loss), acc)
            }
            None => (None, None),
        };

        let stats = EpochStats {
            epoch,
            total_epochs: config.epochs,
            train_loss,
            val_loss,
            train_accuracy,
            val_accuracy,
            elapsed_ms,
        };
        info!(
            epoch,
            total = config.epochs,
            train_loss,
            val_loss = ?stats.val_loss,
            train_accuracy = ?stats.train_accuracy,
            "epoch finished"
        );

        if let Some(ref tx) = config.progress_tx {
            if tx.send(stats).is_err() {
                break;
            }
        }
    }

    Ok(last_train_loss)
}

/// Mean cost loss over `data` in inference mode, plus accuracy when every
/// target is a class.
pub fn evaluate(net: &mut Network, data: Dataset<'_>) -> Result<(f64, Option<f64>)> {
    let mut total = 0.0;
    for (x, y) in data.inputs.iter().zip(data.targets) {
        total += net.cost_loss(x, y)?;
    }
    let acc = if data.is_classification() {
        Some(accuracy(net, data)?)
    } else {
        None
    };
    Ok((total / data.len() as f64, acc))
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// Fraction of classification targets whose class gets the highest score.
fn accuracy(net: &mut Network, data: Dataset<'_>) -> Result<f64> {
    let mut correct = 0;
    for (x, y) in data.inputs.iter().zip(data.targets) {
        let predicted = net.forward(x, false)?.argmax();
        if let (Some(p), Target::Class(c)) = (predicted, y) {
            if p == *c {
                correct += 1;
            }
        }
    }
    Ok(correct as f64 / data.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::activation::Activation;
    use crate::network::LayerSpec;
    use crate::optim::{Method, SolverOptions};

    fn xor() -> (Vec<Volume>, Vec<Target>) {
        let inputs = [[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]]
            .iter()
            .map(|x| Volume::from_values(x.to_vec()))
            .collect();
        let targets = [0, 1, 1, 0].into_iter().map(Target::Class).collect();
        (inputs, targets)
    }

    #[test]
    fn empty_or_mismatched_datasets_are_rejected() {
        let (inputs, targets) = xor();
        assert!(Dataset::new(&[], &[]).is_err());
        assert!(Dataset::new(&inputs, &targets[..3]).is_err());
    }

    #[test]
    fn learns_xor_and_reports_every_epoch() {
        let mut rng = StdRng::seed_from_u64(42);
        let net = Network::new(
            &[
                LayerSpec::input(1, 1, 2),
                LayerSpec::dense(8, Activation::Tanh),
                LayerSpec::softmax(2),
            ],
            &mut rng,
        )
        .unwrap();
        let opts = SolverOptions::new(Method::Sgd).with_learning_rate(0.1);
        let mut solver = Solver::new(net, opts).unwrap();

        let (inputs, targets) = xor();
        let data = Dataset::new(&inputs, &targets).unwrap();
        let (tx, rx) = mpsc::channel();
        let config = TrainConfig::new(300).with_progress(tx);

        let loss = train_loop(&mut solver, data, Some(data), &config, &mut rng).unwrap();
        drop(config);
        let stats: Vec<EpochStats> = rx.iter().collect();
        assert_eq!(stats.len(), 300);
        assert_eq!(stats[299].epoch, 300);
        assert_eq!(stats[299].train_loss, loss);
        assert!(stats[299].train_loss < stats[0].train_loss);
        assert!(stats[299].val_accuracy.is_some());
    }

    #[test]
    fn dropped_receiver_stops_the_loop() {
        let mut rng = StdRng::seed_from_u64(7);
        let net = Network::new(&[LayerSpec::input(1, 1, 2), LayerSpec::regression(1)], &mut rng).unwrap();
        let mut solver = Solver::new(net, SolverOptions::default()).unwrap();

        let inputs = vec![Volume::from_values(vec![1.0, 2.0])];
        let targets = vec![Target::Scalar(3.0)];
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let config = TrainConfig::new(50).with_progress(tx);
        train_loop(&mut solver, Dataset::new(&inputs, &targets).unwrap(), None, &config, &mut rng).unwrap();
        assert_eq!(solver.examples_seen(), 1);
    }
}
