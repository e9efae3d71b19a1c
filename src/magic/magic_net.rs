use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, info};

use crate::error::{NetError, Result};
use crate::loss::Target;
use crate::magic::candidate::{Candidate, Fold};
use crate::magic::options::MagicNetOptions;
use crate::math::volume::{Shape, Volume};

/// What a call to [`MagicNet::step`] completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Every candidate trained on one more example.
    Stepped,
    /// The active fold was scored; candidates restart on the next fold.
    FoldFinished { fold: usize },
    /// The last fold was scored; the batch joined the evaluated candidates
    /// and a fresh batch was sampled.
    BatchFinished,
}

/// Hyperparameter search over small softmax classifiers.
///
/// Samples `num_folds` random train/validation splits and a batch of
/// candidate networks, trains every candidate on each fold in turn and
/// scores it by validation accuracy. Finished candidates are kept best
/// first, and predictions average the outputs of the best
/// `ensemble_size` of them.
pub struct MagicNet<R: Rng = StdRng> {
    data: Vec<Volume>,
    labels: Vec<usize>,
    options: MagicNetOptions,
    in_shape: Shape,
    num_classes: usize,
    folds: Vec<Fold>,
    candidates: Vec<Candidate>,
    evaluated: Vec<Candidate>,
    /// Steps taken on the active fold.
    iter: usize,
    fold_index: usize,
    rng: R,
}

impl<R: Rng> MagicNet<R> {
    /// Labels are class indices; the number of classes is one past the
    /// largest label. Every example must have the shape of the first.
    pub fn new(data: Vec<Volume>, labels: Vec<usize>, options: MagicNetOptions, mut rng: R) -> Result<MagicNet<R>> {
        if data.is_empty() {
            return Err(NetError::invalid_option("data", "no examples to search with"));
        }
        if data.len() != labels.len() {
            return Err(NetError::invalid_option(
                "labels",
                format!("{} examples but {} labels", data.len(), labels.len()),
            ));
        }
        options.validate(data.len())?;

        let in_shape = data[0].shape();
        if let Some(odd) = data.iter().find(|x| x.shape() != in_shape) {
            return Err(NetError::ShapeMismatch {
                context: "magic net example",
                expected: in_shape,
                actual: odd.shape(),
            });
        }
        let num_classes = labels.iter().max().map_or(0, |&l| l + 1);

        let num_train = options.num_train(data.len());
        let folds = (0..options.num_folds)
            .map(|_| Fold::sample(data.len(), num_train, &mut rng))
            .collect();

        let mut magic = MagicNet {
            data,
            labels,
            options,
            in_shape,
            num_classes,
            folds,
            candidates: Vec::new(),
            evaluated: Vec::new(),
            iter: 0,
            fold_index: 0,
            rng,
        };
        magic.sample_candidates()?;
        debug!(
            examples = magic.data.len(),
            num_classes,
            folds = magic.folds.len(),
            candidates = magic.candidates.len(),
            "magic net ready"
        );
        Ok(magic)
    }

    /// Replaces the current batch with freshly sampled candidates.
    pub fn sample_candidates(&mut self) -> Result<()> {
        self.candidates = (0..self.options.num_candidates)
            .map(|_| Candidate::sample(self.in_shape, self.num_classes, &self.options, &mut self.rng))
            .collect::<Result<_>>()?;
        Ok(())
    }

    /// Trains every candidate on one random training example of the active
    /// fold, then scores the fold once it has seen `num_epochs` epochs.
    pub fn step(&mut self) -> Result<Progress> {
        self.iter += 1;

        let fold = &self.folds[self.fold_index];
        let ix = fold.train[self.rng.gen_range(0..fold.train.len())];
        let target = Target::Class(self.labels[ix]);
        for candidate in &mut self.candidates {
            candidate.train(&self.data[ix], &target)?;
        }

        if self.iter < self.options.num_epochs * fold.train.len() {
            return Ok(Progress::Stepped);
        }

        let accuracies = self.validation_accuracies()?;
        for (candidate, accuracy) in self.candidates.iter_mut().zip(accuracies) {
            candidate.record(accuracy);
        }
        let finished = self.fold_index;
        self.iter = 0;
        self.fold_index += 1;

        if self.fold_index < self.folds.len() {
            for candidate in &mut self.candidates {
                candidate.reset(&mut self.rng)?;
            }
            debug!(fold = finished, "fold finished");
            return Ok(Progress::FoldFinished { fold: finished });
        }

        self.evaluated.append(&mut self.candidates);
        self.evaluated
            .sort_by(|a, b| b.mean_accuracy().total_cmp(&a.mean_accuracy()));
        self.evaluated.truncate(3 * self.options.ensemble_size);
        info!(
            evaluated = self.evaluated.len(),
            best_accuracy = self.evaluated.first().map(Candidate::mean_accuracy),
            "candidate batch evaluated"
        );
        self.sample_candidates()?;
        self.fold_index = 0;
        Ok(Progress::BatchFinished)
    }

    /// Validation accuracy of every current candidate on the active fold.
    pub fn validation_accuracies(&mut self) -> Result<Vec<f64>> {
        let fold = &self.folds[self.fold_index];
        let mut accuracies = Vec::with_capacity(self.candidates.len());
        for candidate in &mut self.candidates {
            if candidate.is_diverged() {
                accuracies.push(0.0);
                continue;
            }
            let net = candidate.network_mut();
            let mut correct = 0;
            for &ix in &fold.test {
                net.forward(&self.data[ix], false)?;
                if net.prediction()? == self.labels[ix] {
                    correct += 1;
                }
            }
            accuracies.push(correct as f64 / fold.test.len() as f64);
        }
        Ok(accuracies)
    }

    /// Class probabilities for `x`, averaged over the best `ensemble_size`
    /// evaluated candidates. Before the first batch is evaluated the
    /// current candidates vote instead.
    pub fn predict_soft(&mut self, x: &Volume) -> Result<Volume> {
        let voters = if self.evaluated.is_empty() {
            &mut self.candidates[..]
        } else {
            let n = self.options.ensemble_size.min(self.evaluated.len());
            &mut self.evaluated[..n]
        };
        if voters.is_empty() {
            return Err(NetError::DivisionByZero("prediction with no candidates"));
        }

        let mut sum = Volume::zeros(Shape::flat(self.num_classes));
        for candidate in voters.iter_mut() {
            let out = candidate.network_mut().forward(x, false)?;
            sum.add_from(out)?;
        }
        let n = voters.len() as f64;
        sum.values_mut().iter_mut().for_each(|p| *p /= n);
        Ok(sum)
    }

    /// Most probable class under [`MagicNet::predict_soft`].
    pub fn predict(&mut self, x: &Volume) -> Result<usize> {
        self.predict_soft(x)?
            .argmax()
            .ok_or(NetError::DivisionByZero("prediction over zero classes"))
    }

    pub fn options(&self) -> &MagicNetOptions {
        &self.options
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn folds(&self) -> &[Fold] {
        &self.folds
    }

    /// The batch being evaluated.
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Fully evaluated candidates, best mean accuracy first.
    pub fn evaluated_candidates(&self) -> &[Candidate] {
        &self.evaluated
    }

    pub fn fold_index(&self) -> usize {
        self.fold_index
    }
}
