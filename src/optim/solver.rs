use serde::Serialize;
use tracing::{debug, trace};

use crate::error::{NetError, Result};
use crate::loss::Target;
use crate::math::volume::Volume;
use crate::network::Network;
use crate::optim::options::{Method, SolverOptions};

/// Losses reported by one [`Solver::train`] call.
///
/// The decay losses are only non-zero on calls that applied an update.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TrainResult {
    pub cost_loss: f64,
    pub l1_decay_loss: f64,
    pub l2_decay_loss: f64,
    pub loss: f64,
}

/// Trains a network one example at a time, applying an update every
/// `batch_size` examples.
///
/// Owns the network together with the per-parameter accumulators of the
/// chosen update rule. The accumulators are allocated on the first update
/// and mirror the network's parameter list from then on.
#[derive(Debug, Clone)]
pub struct Solver {
    net: Network,
    options: SolverOptions,
    /// Examples seen.
    k: usize,
    /// Parameter updates applied.
    updates: usize,
    gsum: Vec<Vec<f64>>,
    xsum: Vec<Vec<f64>>,
}

impl Solver {
    pub fn new(net: Network, options: SolverOptions) -> Result<Solver> {
        if options.batch_size == 0 {
            return Err(NetError::DivisionByZero("solver batch size"));
        }
        Ok(Solver {
            net,
            options,
            k: 0,
            updates: 0,
            gsum: Vec::new(),
            xsum: Vec::new(),
        })
    }

    pub fn network(&self) -> &Network {
        &self.net
    }

    pub fn network_mut(&mut self) -> &mut Network {
        &mut self.net
    }

    pub fn into_network(self) -> Network {
        self.net
    }

    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    /// Number of examples trained on so far.
    pub fn examples_seen(&self) -> usize {
        self.k
    }

    /// Forward (training mode), backward, and an update if this example
    /// completes a batch.
    ///
    /// A target that cannot train the network's loss layer is rejected before
    /// anything runs.
    pub fn train(&mut self, x: &Volume, target: &Target) -> Result<TrainResult> {
        self.net.check_target(target)?;

        self.net.forward(x, true)?;
        let cost_loss = self.net.backward(target)?;

        self.k += 1;
        let (l1_decay_loss, l2_decay_loss) = if self.k % self.options.batch_size == 0 {
            self.update()
        } else {
            (0.0, 0.0)
        };

        Ok(TrainResult {
            cost_loss,
            l1_decay_loss,
            l2_decay_loss,
            loss: cost_loss + l1_decay_loss + l2_decay_loss,
        })
    }

    fn uses_accumulators(&self) -> bool {
        self.options.method != Method::Sgd || self.options.momentum > 0.0
    }

    /// Applies the update rule to every parameter and clears its gradient.
    /// Returns the L1 and L2 decay losses.
    fn update(&mut self) -> (f64, f64) {
        let opts = self.options.clone();
        let needs_accumulators = self.uses_accumulators();
        self.updates += 1;
        let t = self.updates as i32;

        let mut pglist = self.net.params_and_grads();

        if needs_accumulators && self.gsum.is_empty() {
            self.gsum = pglist.iter().map(|pg| vec![0.0; pg.volume.len()]).collect();
            self.xsum = pglist
                .iter()
                .map(|pg| if opts.method.needs_xsum() { vec![0.0; pg.volume.len()] } else { Vec::new() })
                .collect();
            debug!(
                method = ?opts.method,
                tensors = self.gsum.len(),
                "allocated solver accumulators"
            );
        }

        let batch = opts.batch_size as f64;
        let mut l1_decay_loss = 0.0;
        let mut l2_decay_loss = 0.0;

        for (i, pg) in pglist.iter_mut().enumerate() {
            let l1_decay = opts.l1_decay * pg.l1_decay_mul;
            let l2_decay = opts.l2_decay * pg.l2_decay_mul;
            let (p, g) = pg.volume.split_mut();

            for j in 0..p.len() {
                l2_decay_loss += l2_decay * p[j] * p[j] / 2.0;
                l1_decay_loss += l1_decay * p[j].abs();
                let l1_grad = l1_decay * sign(p[j]);
                let l2_grad = l2_decay * p[j];
                let gij = (l2_grad + l1_grad + g[j]) / batch;

                let dx = match opts.method {
                    Method::Sgd if opts.momentum > 0.0 => {
                        let dx = opts.momentum * self.gsum[i][j] - opts.learning_rate * gij;
                        self.gsum[i][j] = dx;
                        dx
                    }
                    Method::Sgd => -opts.learning_rate * gij,
                    Method::Adagrad => {
                        let gsum = &mut self.gsum[i][j];
                        *gsum += gij * gij;
                        -opts.learning_rate / (*gsum + opts.eps).sqrt() * gij
                    }
                    Method::Windowgrad => {
                        let gsum = &mut self.gsum[i][j];
                        *gsum = opts.rho * *gsum + (1.0 - opts.rho) * gij * gij;
                        -opts.learning_rate / (*gsum + opts.eps).sqrt() * gij
                    }
                    Method::Adadelta => {
                        let gsum = &mut self.gsum[i][j];
                        let xsum = &mut self.xsum[i][j];
                        *gsum = opts.rho * *gsum + (1.0 - opts.rho) * gij * gij;
                        let dx = -((*xsum + opts.eps) / (*gsum + opts.eps)).sqrt() * gij;
                        *xsum = opts.rho * *xsum + (1.0 - opts.rho) * dx * dx;
                        dx
                    }
                    Method::Adam => {
                        let m = &mut self.gsum[i][j];
                        let v = &mut self.xsum[i][j];
                        *m = *m * opts.beta1 + (1.0 - opts.beta1) * gij;
                        *v = *v * opts.beta2 + (1.0 - opts.beta2) * gij * gij;
                        let m_hat = *m / (1.0 - opts.beta1.powi(t));
                        let v_hat = *v / (1.0 - opts.beta2.powi(t));
                        -opts.learning_rate * m_hat / (v_hat.sqrt() + opts.eps)
                    }
                    Method::Nesterov => {
                        let gsum = &mut self.gsum[i][j];
                        let prev = *gsum;
                        *gsum = *gsum * opts.momentum + opts.learning_rate * gij;
                        opts.momentum * prev - (1.0 + opts.momentum) * *gsum
                    }
                };

                p[j] += dx;
                g[j] = 0.0;
            }
        }

        trace!(
            update = self.updates,
            examples = self.k,
            l1_decay_loss,
            l2_decay_loss,
            "applied parameter update"
        );
        (l1_decay_loss, l2_decay_loss)
    }
}

/// `-1`, `0` or `1`; zero weights feel no L1 pull.
fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{FullyConnectedSpec, LayerSpec};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn regressor(rng: &mut StdRng) -> Network {
        Network::new(&[LayerSpec::input(1, 1, 2), LayerSpec::regression(1)], rng).unwrap()
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        let opts = SolverOptions::default().with_batch_size(0);
        assert!(matches!(
            Solver::new(regressor(&mut rng), opts),
            Err(NetError::DivisionByZero(_))
        ));
    }

    #[test]
    fn mismatched_target_is_rejected_before_training() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut solver = Solver::new(regressor(&mut rng), SolverOptions::default()).unwrap();
        let x = Volume::from_values(vec![1.0, 2.0]);
        assert!(matches!(
            solver.train(&x, &Target::Class(0)),
            Err(NetError::TargetMismatch { .. })
        ));
        assert_eq!(solver.examples_seen(), 0);
    }

    #[test]
    fn updates_wait_for_a_full_batch() {
        let mut rng = StdRng::seed_from_u64(2);
        let opts = SolverOptions::default().with_batch_size(3).with_momentum(0.0);
        let mut solver = Solver::new(regressor(&mut rng), opts).unwrap();
        let before = solver.network_mut().params_and_grads()[0].volume.values().to_vec();

        let x = Volume::from_values(vec![1.0, -1.0]);
        solver.train(&x, &Target::Scalar(5.0)).unwrap();
        solver.train(&x, &Target::Scalar(5.0)).unwrap();
        let mid = solver.network_mut().params_and_grads()[0].volume.values().to_vec();
        assert_eq!(before, mid);

        solver.train(&x, &Target::Scalar(5.0)).unwrap();
        let params = solver.network_mut().params_and_grads();
        assert_ne!(before, params[0].volume.values());
        assert!(params.iter().all(|pg| pg.volume.gradients().iter().all(|&g| g == 0.0)));
    }

    #[test]
    fn plain_sgd_allocates_no_accumulators() {
        let mut rng = StdRng::seed_from_u64(3);
        let opts = SolverOptions::default().with_momentum(0.0);
        let mut solver = Solver::new(regressor(&mut rng), opts).unwrap();
        solver.train(&Volume::from_values(vec![1.0, 0.0]), &Target::Scalar(1.0)).unwrap();
        assert!(solver.gsum.is_empty());

        let mut rng = StdRng::seed_from_u64(3);
        let mut solver = Solver::new(regressor(&mut rng), SolverOptions::new(Method::Adam)).unwrap();
        solver.train(&Volume::from_values(vec![1.0, 0.0]), &Target::Scalar(1.0)).unwrap();
        assert_eq!(solver.gsum.len(), 2);
        assert_eq!(solver.xsum[0].len(), 2);
    }

    #[test]
    fn l2_decay_loss_is_reported() {
        let mut rng = StdRng::seed_from_u64(4);
        let opts = SolverOptions::default().with_l2_decay(0.5);
        let mut solver = Solver::new(regressor(&mut rng), opts).unwrap();
        let result = solver.train(&Volume::from_values(vec![1.0, 1.0]), &Target::Scalar(0.0)).unwrap();
        assert!(result.l2_decay_loss > 0.0);
        assert_eq!(result.l1_decay_loss, 0.0);
        assert!((result.loss - result.cost_loss - result.l2_decay_loss).abs() < 1e-12);
    }

    #[test]
    fn decay_terms_are_averaged_over_the_batch() {
        let mut rng = StdRng::seed_from_u64(5);
        let fc = FullyConnectedSpec {
            l1_decay_mul: 1.0,
            ..FullyConnectedSpec::new(1)
        };
        let net = Network::new(
            &[LayerSpec::input(1, 1, 2), LayerSpec::FullyConnected(fc), LayerSpec::regression(1)],
            &mut rng,
        )
        .unwrap();
        let opts = SolverOptions::new(Method::Sgd)
            .with_learning_rate(0.1)
            .with_momentum(0.9)
            .with_batch_size(2)
            .with_l1_decay(0.01)
            .with_l2_decay(0.1);
        let mut solver = Solver::new(net, opts).unwrap();

        for pg in solver.network_mut().params_and_grads().iter_mut() {
            pg.volume.set_const(0.0);
            pg.volume.zero_gradients();
        }
        {
            let mut params = solver.network_mut().params_and_grads();
            let (p, g) = params[0].volume.split_mut();
            p.copy_from_slice(&[0.5, -2.0]);
            g.copy_from_slice(&[0.3, 0.0]);
        }

        let (l1_loss, l2_loss) = solver.update();
        assert!((l1_loss - 0.01 * (0.5 + 2.0)).abs() < 1e-12);
        assert!((l2_loss - 0.1 * (0.25 + 4.0) / 2.0).abs() < 1e-12);

        // (0.1 * 0.5 + 0.01 * 1 + 0.3) / 2 = 0.18, then dx = -0.1 * 0.18
        // (0.1 * -2 + 0.01 * -1 + 0.0) / 2 = -0.105, then dx = 0.0105
        let params = solver.network_mut().params_and_grads();
        let p = params[0].volume.values();
        assert!((p[0] - 0.482).abs() < 1e-12);
        assert!((p[1] - -1.9895).abs() < 1e-12);
        assert!(params[0].volume.gradients().iter().all(|&g| g == 0.0));
        drop(params);

        assert!((solver.gsum[0][0] - -0.018).abs() < 1e-12);
        assert!((solver.gsum[0][1] - 0.0105).abs() < 1e-12);
        // biases carry no decay
        assert!(solver.gsum[1].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn l1_pull_skips_zero_weights() {
        assert_eq!(sign(0.0), 0.0);
        assert_eq!(sign(-3.0), -1.0);
        assert_eq!(sign(2.5), 1.0);
    }
}
