use serde::{Deserialize, Serialize};

/// Parameter update rule applied once per batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Plain SGD, with momentum when `momentum > 0`.
    #[default]
    Sgd,
    Adagrad,
    /// Adagrad over an exponentially decaying window of squared gradients.
    Windowgrad,
    Adadelta,
    Adam,
    Nesterov,
}

impl Method {
    /// Whether this rule keeps a second accumulator per parameter.
    pub fn needs_xsum(&self) -> bool {
        matches!(self, Method::Adadelta | Method::Adam)
    }
}

/// Hyperparameters of a [`Solver`](crate::optim::Solver).
///
/// Every field has a default, so a partial JSON object is enough:
/// `{"method": "adam", "learning_rate": 0.001}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    pub method: Method,
    /// Examples per parameter update.
    pub batch_size: usize,
    pub l1_decay: f64,
    pub l2_decay: f64,
    pub learning_rate: f64,
    pub momentum: f64,
    /// Decay of the squared-gradient window (Windowgrad, Adadelta).
    pub rho: f64,
    pub eps: f64,
    pub beta1: f64,
    pub beta2: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        SolverOptions {
            method: Method::Sgd,
            batch_size: 1,
            l1_decay: 0.0,
            l2_decay: 0.0,
            learning_rate: 0.01,
            momentum: 0.9,
            rho: 0.95,
            eps: 1e-8,
            beta1: 0.9,
            beta2: 0.999,
        }
    }
}

impl SolverOptions {
    pub fn new(method: Method) -> Self {
        SolverOptions {
            method,
            ..SolverOptions::default()
        }
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_momentum(mut self, momentum: f64) -> Self {
        self.momentum = momentum;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_l2_decay(mut self, l2_decay: f64) -> Self {
        self.l2_decay = l2_decay;
        self
    }

    pub fn with_l1_decay(mut self, l1_decay: f64) -> Self {
        self.l1_decay = l1_decay;
        self
    }
}
