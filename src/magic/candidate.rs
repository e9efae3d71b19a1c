use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::activation::Activation;
use crate::error::{NetError, Result};
use crate::loss::Target;
use crate::magic::options::MagicNetOptions;
use crate::math::volume::{Shape, Volume};
use crate::network::{FullyConnectedSpec, LayerSpec, Network};
use crate::optim::{Method, Solver, SolverOptions};

/// Odds of 0, 1, 2 or 3 hidden layers; one or two are preferred.
const HIDDEN_LAYER_WEIGHTS: [f64; 4] = [0.2, 0.3, 0.3, 0.2];

/// One random train/validation split of the example indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl Fold {
    /// Shuffles `0..num_examples` and trains on the first `num_train`.
    pub fn sample(num_examples: usize, num_train: usize, rng: &mut impl Rng) -> Fold {
        let mut order: Vec<usize> = (0..num_examples).collect();
        order.shuffle(rng);
        let test = order.split_off(num_train.min(num_examples));
        Fold { train: order, test }
    }
}

/// A sampled architecture and solver setting, with the network currently
/// being trained and its validation accuracy on every finished fold.
#[derive(Debug, Clone)]
pub struct Candidate {
    layer_specs: Vec<LayerSpec>,
    solver_options: SolverOptions,
    solver: Solver,
    accuracies: Vec<f64>,
    /// Set when training broke down numerically on the current fold.
    diverged: bool,
}

impl Candidate {
    pub fn new(layer_specs: Vec<LayerSpec>, solver_options: SolverOptions, rng: &mut impl Rng) -> Result<Candidate> {
        let net = Network::new(&layer_specs, rng)?;
        let solver = Solver::new(net, solver_options.clone())?;
        Ok(Candidate {
            layer_specs,
            solver_options,
            solver,
            accuracies: Vec::new(),
            diverged: false,
        })
    }

    /// Draws a softmax classifier with 0 to 3 fully-connected hidden
    /// layers and an Adadelta, Adagrad or SGD solver.
    pub fn sample(
        in_shape: Shape,
        num_classes: usize,
        options: &MagicNetOptions,
        rng: &mut impl Rng,
    ) -> Result<Candidate> {
        let mut specs = vec![LayerSpec::input(in_shape.width, in_shape.height, in_shape.depth)];

        let depth = WeightedIndex::new(&HIDDEN_LAYER_WEIGHTS)
            .map_err(|e| NetError::invalid_option("hidden_layers", e.to_string()))?;
        for _ in 0..depth.sample(rng) {
            let neurons = rng.gen_range(options.neurons_min..=options.neurons_max);
            let activation = *[Activation::Tanh, Activation::Maxout { group_size: 2 }, Activation::Relu]
                .choose(rng)
                .ok_or(NetError::invalid_option("activation", "no activations to choose from"))?;
            let mut fc = FullyConnectedSpec::new(neurons).with_activation(activation);
            if rng.gen::<f64>() < 0.5 {
                fc = fc.with_dropout(rng.gen());
            }
            specs.push(LayerSpec::FullyConnected(fc));
        }
        specs.push(LayerSpec::softmax(num_classes));

        let batch_size = rng.gen_range(options.batch_size_min..=options.batch_size_max);
        let l2_decay = 10f64.powf(rng.gen_range(options.l2_decay_min..=options.l2_decay_max));
        let learning_rate = 10f64.powf(rng.gen_range(options.learning_rate_min..=options.learning_rate_max));
        let momentum = rng.gen_range(options.momentum_min..=options.momentum_max);

        let kind: f64 = rng.gen();
        let solver_options = if kind < 0.33 {
            SolverOptions::new(Method::Adadelta)
        } else if kind < 0.66 {
            SolverOptions::new(Method::Adagrad).with_learning_rate(learning_rate)
        } else {
            SolverOptions::new(Method::Sgd)
                .with_learning_rate(learning_rate)
                .with_momentum(momentum)
        }
        .with_batch_size(batch_size)
        .with_l2_decay(l2_decay);

        Candidate::new(specs, solver_options, rng)
    }

    /// Rebuilds the network from scratch for the next fold; recorded
    /// accuracies are kept.
    pub fn reset(&mut self, rng: &mut impl Rng) -> Result<()> {
        let net = Network::new(&self.layer_specs, rng)?;
        self.solver = Solver::new(net, self.solver_options.clone())?;
        self.diverged = false;
        Ok(())
    }

    /// Trains on one example. A numeric breakdown marks the candidate as
    /// diverged instead of failing, and it sits out the rest of the fold.
    pub fn train(&mut self, x: &Volume, target: &Target) -> Result<()> {
        if self.diverged {
            return Ok(());
        }
        match self.solver.train(x, target) {
            Ok(result) if result.loss.is_finite() => Ok(()),
            Ok(_) | Err(NetError::DivisionByZero(_)) => {
                debug!(method = ?self.solver_options.method, "candidate diverged");
                self.diverged = true;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub fn is_diverged(&self) -> bool {
        self.diverged
    }

    pub fn layer_specs(&self) -> &[LayerSpec] {
        &self.layer_specs
    }

    pub fn solver_options(&self) -> &SolverOptions {
        &self.solver_options
    }

    pub fn solver(&self) -> &Solver {
        &self.solver
    }

    pub fn solver_mut(&mut self) -> &mut Solver {
        &mut self.solver
    }

    pub fn network_mut(&mut self) -> &mut Network {
        self.solver.network_mut()
    }

    pub fn accuracies(&self) -> &[f64] {
        &self.accuracies
    }

    pub(crate) fn record(&mut self, accuracy: f64) {
        self.accuracies.push(accuracy);
    }

    /// Mean validation accuracy over the finished folds, 0 before any.
    pub fn mean_accuracy(&self) -> f64 {
        if self.accuracies.is_empty() {
            return 0.0;
        }
        self.accuracies.iter().sum::<f64>() / self.accuracies.len() as f64
    }
}
