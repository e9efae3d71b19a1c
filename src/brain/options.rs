use serde::{Deserialize, Serialize};

use crate::network::LayerSpec;
use crate::optim::SolverOptions;

/// Settings of a [`Brain`](crate::brain::Brain).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrainOptions {
    /// Past (state, action) pairs fed to the value network next to the
    /// current observation. 0 means the network sees only the present.
    pub temporal_window: usize,
    /// Capacity of the replay memory.
    pub experience_size: usize,
    /// Replay size that must be exceeded before learning starts.
    pub start_learn_threshold: usize,
    /// Discount of future reward, in `[0, 1]`.
    pub gamma: f64,
    /// Age at which epsilon reaches `epsilon_min`.
    pub learning_steps_total: usize,
    /// Steps of purely random behaviour at the start.
    pub learning_steps_burnin: usize,
    pub epsilon_min: f64,
    /// Epsilon used once learning is switched off.
    pub epsilon_test_time: f64,
    /// Bias for random actions. Empty means uniform; otherwise one
    /// probability per action, summing to 1.
    pub random_action_distribution: Vec<f64>,
    /// Custom value network. Must start with an input of `net_inputs` units
    /// and end with a regression over `num_actions` outputs.
    pub layer_specs: Option<Vec<LayerSpec>>,
    /// ReLU hidden layers of the default value network.
    pub hidden_layer_sizes: Vec<usize>,
    /// Solver for the temporal-difference updates; see
    /// [`BrainOptions::default_td_solver`].
    pub td_solver: Option<SolverOptions>,
}

impl Default for BrainOptions {
    fn default() -> Self {
        BrainOptions {
            temporal_window: 1,
            experience_size: 30000,
            start_learn_threshold: 1000,
            gamma: 0.8,
            learning_steps_total: 100_000,
            learning_steps_burnin: 3000,
            epsilon_min: 0.05,
            epsilon_test_time: 0.01,
            random_action_distribution: Vec::new(),
            layer_specs: None,
            hidden_layer_sizes: Vec::new(),
            td_solver: None,
        }
    }
}

impl BrainOptions {
    pub fn default_td_solver() -> SolverOptions {
        SolverOptions {
            learning_rate: 0.01,
            momentum: 0.0,
            batch_size: 64,
            l2_decay: 0.01,
            ..SolverOptions::default()
        }
    }

    pub fn td_solver(&self) -> SolverOptions {
        self.td_solver.clone().unwrap_or_else(BrainOptions::default_td_solver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_other_defaults() {
        let opts: BrainOptions =
            serde_json::from_str(r#"{"temporal_window": 3, "hidden_layer_sizes": [20, 10]}"#).unwrap();
        assert_eq!(opts.temporal_window, 3);
        assert_eq!(opts.hidden_layer_sizes, vec![20, 10]);
        assert_eq!(opts.experience_size, 30000);
        assert_eq!(opts.td_solver().batch_size, 64);
        assert_eq!(opts.td_solver().momentum, 0.0);
    }
}
