use std::collections::VecDeque;
use std::fmt;

use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, info, trace};

use crate::activation::Activation;
use crate::brain::experience::{Experience, ExperienceReplay};
use crate::brain::options::BrainOptions;
use crate::brain::window::Window;
use crate::error::{NetError, Result};
use crate::loss::Target;
use crate::math::volume::{argmax, Shape, Volume};
use crate::network::{LayerSpec, Network};
use crate::optim::Solver;

const AVERAGE_WINDOW: usize = 1000;
const AVERAGE_MIN: usize = 10;

/// Greedy action under the value network and its estimated value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Policy {
    pub action: usize,
    pub value: f64,
}

/// Where the agent is on its exploration schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Acting randomly before any learning.
    BurnIn,
    /// Epsilon is decaying linearly towards its minimum.
    Annealing,
    /// Epsilon has reached its minimum.
    Exploiting,
    /// Learning is off; epsilon is the test-time value.
    Testing,
}

/// Deep Q-learning agent.
///
/// Each step the caller hands an observation to [`Brain::forward`], acts on
/// the returned action, then reports the reward with [`Brain::backward`].
/// Transitions go into an experience replay memory which the value network
/// is trained from once it holds enough of them.
pub struct Brain<R: Rng = StdRng> {
    options: BrainOptions,
    num_states: usize,
    num_actions: usize,
    net_inputs: usize,
    solver: Solver,
    rng: R,

    window_size: usize,
    state_window: VecDeque<Vec<f64>>,
    action_window: VecDeque<usize>,
    reward_window: VecDeque<f64>,
    /// Value-network input per step; `None` for the first steps, before
    /// enough history exists to build one.
    net_window: VecDeque<Option<Vec<f64>>>,

    experience: ExperienceReplay,
    age: usize,
    forward_passes: usize,
    epsilon: f64,
    latest_reward: f64,
    last_input: Vec<f64>,
    average_reward: Window,
    average_loss: Window,
    learning: bool,
    started_learning: bool,
}

impl<R: Rng> Brain<R> {
    pub fn new(num_states: usize, num_actions: usize, options: BrainOptions, mut rng: R) -> Result<Brain<R>> {
        if num_states == 0 {
            return Err(NetError::invalid_option("num_states", "must be at least 1"));
        }
        if num_actions == 0 {
            return Err(NetError::invalid_option("num_actions", "must be at least 1"));
        }
        if options.learning_steps_total <= options.learning_steps_burnin {
            return Err(NetError::invalid_option(
                "learning_steps_total",
                format!(
                    "{} must exceed learning_steps_burnin ({})",
                    options.learning_steps_total, options.learning_steps_burnin
                ),
            ));
        }
        if !(0.0..=1.0).contains(&options.gamma) {
            return Err(NetError::invalid_option("gamma", format!("{} is outside [0, 1]", options.gamma)));
        }
        check_distribution(&options.random_action_distribution, num_actions)?;

        let tw = options.temporal_window;
        let net_inputs = num_states * tw + num_actions * tw + num_states;
        let specs = value_net_specs(&options, net_inputs, num_actions)?;
        let net = Network::new(&specs, &mut rng)?;
        let solver = Solver::new(net, options.td_solver())?;

        let window_size = tw.max(2);
        debug!(
            num_states,
            num_actions,
            net_inputs,
            parameters = solver.network().num_parameters(),
            "brain constructed"
        );

        Ok(Brain {
            num_states,
            num_actions,
            net_inputs,
            solver,
            rng,
            window_size,
            state_window: vec![vec![0.0; num_states]; window_size].into(),
            action_window: vec![0; window_size].into(),
            reward_window: vec![0.0; window_size].into(),
            net_window: vec![None; window_size].into(),
            experience: ExperienceReplay::new(options.experience_size),
            age: 0,
            forward_passes: 0,
            epsilon: 1.0,
            latest_reward: 0.0,
            last_input: Vec::new(),
            average_reward: Window::new(AVERAGE_WINDOW, AVERAGE_MIN),
            average_loss: Window::new(AVERAGE_WINDOW, AVERAGE_MIN),
            learning: true,
            started_learning: false,
            options,
        })
    }

    /// A random action, drawn from `random_action_distribution` when one is
    /// configured and uniformly otherwise.
    pub fn random_action(&mut self) -> usize {
        let distribution = &self.options.random_action_distribution;
        if distribution.is_empty() {
            return self.rng.gen_range(0..self.num_actions);
        }
        let p: f64 = self.rng.gen();
        let mut cumulative = 0.0;
        for (k, prob) in distribution.iter().enumerate() {
            cumulative += prob;
            if p < cumulative {
                return k;
            }
        }
        // rounding left the sum just under p
        self.num_actions - 1
    }

    /// Best action for a value-network input.
    pub fn policy(&mut self, net_input: &[f64]) -> Result<Policy> {
        greedy(self.solver.network_mut(), net_input)
    }

    /// Current observation followed by the last `temporal_window` states and
    /// one-hot actions, most recent first. Actions are scaled by
    /// `num_states` so weight decay does not drown them out.
    pub fn net_input(&self, observation: &[f64]) -> Vec<f64> {
        let mut w = Vec::with_capacity(self.net_inputs);
        w.extend_from_slice(observation);
        let n = self.window_size;
        for k in 0..self.options.temporal_window {
            w.extend_from_slice(&self.state_window[n - 1 - k]);
            let mut one_hot = vec![0.0; self.num_actions];
            one_hot[self.action_window[n - 1 - k]] = self.num_states as f64;
            w.extend(one_hot);
        }
        w
    }

    /// Picks an action for `observation`: random with probability epsilon,
    /// greedy otherwise.
    pub fn forward(&mut self, observation: &[f64]) -> Result<usize> {
        if observation.len() != self.num_states {
            return Err(NetError::ShapeMismatch {
                context: "brain observation",
                expected: Shape::flat(self.num_states),
                actual: Shape::flat(observation.len()),
            });
        }
        self.forward_passes += 1;
        self.last_input = observation.to_vec();

        let (action, net_input) = if self.forward_passes > self.options.temporal_window {
            let net_input = self.net_input(observation);
            self.epsilon = if self.learning {
                self.annealed_epsilon()
            } else {
                self.options.epsilon_test_time
            };
            let action = if self.rng.gen::<f64>() < self.epsilon {
                self.random_action()
            } else {
                self.policy(&net_input)?.action
            };
            (action, Some(net_input))
        } else {
            (self.random_action(), None)
        };

        self.net_window.pop_front();
        self.net_window.push_back(net_input);
        self.state_window.pop_front();
        self.state_window.push_back(observation.to_vec());
        self.action_window.pop_front();
        self.action_window.push_back(action);
        Ok(action)
    }

    fn annealed_epsilon(&self) -> f64 {
        let age = self.age as f64;
        let burnin = self.options.learning_steps_burnin as f64;
        let total = self.options.learning_steps_total as f64;
        (1.0 - (age - burnin) / (total - burnin)).clamp(self.options.epsilon_min, 1.0)
    }

    /// Reports the reward for the last action, stores the completed
    /// transition and, once the replay memory is large enough, trains the
    /// value network on a batch of replayed transitions.
    pub fn backward(&mut self, reward: f64) -> Result<()> {
        self.latest_reward = reward;
        self.average_reward.add(reward);
        self.reward_window.pop_front();
        self.reward_window.push_back(reward);

        if !self.learning {
            return Ok(());
        }
        self.age += 1;

        if self.forward_passes > self.options.temporal_window + 1 {
            let n = self.window_size;
            if let (Some(state0), Some(state1)) = (&self.net_window[n - 2], &self.net_window[n - 1]) {
                let e = Experience {
                    state0: state0.clone(),
                    action0: self.action_window[n - 2],
                    reward0: self.reward_window[n - 2],
                    state1: state1.clone(),
                };
                self.experience.push(e, &mut self.rng);
            }
        }

        if self.experience.len() > self.options.start_learn_threshold {
            if !self.started_learning {
                self.started_learning = true;
                info!(
                    age = self.age,
                    replay = self.experience.len(),
                    "experience replay is large enough, learning starts"
                );
            }
            let avcost = self.replay_batch()?;
            self.average_loss.add(avcost);
        }
        Ok(())
    }

    /// One temporal-difference pass over `batch_size` replayed transitions;
    /// returns their mean loss.
    fn replay_batch(&mut self) -> Result<f64> {
        let batch = self.solver.options().batch_size;
        let gamma = self.options.gamma;
        let in_shape = self.solver.network().in_shape();
        let mut total = 0.0;

        for _ in 0..batch {
            let Some(e) = self.experience.sample(&mut self.rng) else {
                break;
            };
            let next = greedy(self.solver.network_mut(), &e.state1)?;
            let target = Target::Dimension {
                dim: e.action0,
                value: e.reward0 + gamma * next.value,
            };
            let x = Volume::with_values(in_shape, e.state0.clone())?;
            total += self.solver.train(&x, &target)?.loss;
        }

        let avcost = total / batch as f64;
        trace!(age = self.age, avcost, "td batch");
        Ok(avcost)
    }

    pub fn set_learning(&mut self, learning: bool) {
        self.learning = learning;
    }

    pub fn is_learning(&self) -> bool {
        self.learning
    }

    pub fn phase(&self) -> Phase {
        if !self.learning {
            Phase::Testing
        } else if self.age < self.options.learning_steps_burnin {
            Phase::BurnIn
        } else if self.age < self.options.learning_steps_total {
            Phase::Annealing
        } else {
            Phase::Exploiting
        }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Number of learning `backward` calls.
    pub fn age(&self) -> usize {
        self.age
    }

    pub fn forward_passes(&self) -> usize {
        self.forward_passes
    }

    pub fn latest_reward(&self) -> f64 {
        self.latest_reward
    }

    pub fn last_input(&self) -> &[f64] {
        &self.last_input
    }

    pub fn average_reward(&self) -> Option<f64> {
        self.average_reward.average()
    }

    pub fn average_loss(&self) -> Option<f64> {
        self.average_loss.average()
    }

    pub fn experience(&self) -> &ExperienceReplay {
        &self.experience
    }

    pub fn value_net(&self) -> &Network {
        self.solver.network()
    }

    pub fn num_states(&self) -> usize {
        self.num_states
    }

    pub fn num_actions(&self) -> usize {
        self.num_actions
    }

    pub fn net_inputs(&self) -> usize {
        self.net_inputs
    }
}

impl<R: Rng> fmt::Display for Brain<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn or_dash(v: Option<f64>) -> String {
            v.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"))
        }
        writeln!(f, "experience replay size: {}", self.experience.len())?;
        writeln!(f, "exploration epsilon: {:.4}", self.epsilon)?;
        writeln!(f, "age: {}", self.age)?;
        writeln!(f, "average Q-learning loss: {}", or_dash(self.average_loss()))?;
        write!(f, "smooth-ish reward: {}", or_dash(self.average_reward()))
    }
}

fn greedy(net: &mut Network, net_input: &[f64]) -> Result<Policy> {
    let x = Volume::with_values(net.in_shape(), net_input.to_vec())?;
    let values = net.forward(&x, false)?.values();
    let action = argmax(values).ok_or(NetError::DivisionByZero("policy over zero actions"))?;
    Ok(Policy {
        action,
        value: values[action],
    })
}

fn check_distribution(distribution: &[f64], num_actions: usize) -> Result<()> {
    if distribution.is_empty() {
        return Ok(());
    }
    if distribution.len() != num_actions {
        return Err(NetError::invalid_option(
            "random_action_distribution",
            format!("has {} entries for {num_actions} actions", distribution.len()),
        ));
    }
    if distribution.iter().any(|&p| !p.is_finite()) {
        return Err(NetError::invalid_option("random_action_distribution", "has non-finite entries"));
    }
    if distribution.iter().any(|&p| p < 0.0) {
        return Err(NetError::invalid_option("random_action_distribution", "has negative entries"));
    }
    let sum: f64 = distribution.iter().sum();
    if (sum - 1.0).abs() > 1e-4 {
        return Err(NetError::invalid_option(
            "random_action_distribution",
            format!("sums to {sum}, not 1"),
        ));
    }
    Ok(())
}

/// The value network's layer list: the caller's, after checking its ends,
/// or `input -> relu hidden layers -> regression`.
fn value_net_specs(options: &BrainOptions, net_inputs: usize, num_actions: usize) -> Result<Vec<LayerSpec>> {
    let Some(specs) = &options.layer_specs else {
        let mut specs = vec![LayerSpec::input(1, 1, net_inputs)];
        specs.extend(
            options
                .hidden_layer_sizes
                .iter()
                .map(|&h| LayerSpec::dense(h, Activation::Relu)),
        );
        specs.push(LayerSpec::regression(num_actions));
        return Ok(specs);
    };

    match specs.first() {
        Some(LayerSpec::Input { width, height, depth }) if width * height * depth == net_inputs => {}
        _ => {
            return Err(NetError::Topology(format!(
                "value network must start with an input of {net_inputs} units"
            )))
        }
    }
    match specs.last() {
        Some(LayerSpec::Regression { num_neurons }) if *num_neurons == num_actions => {}
        _ => {
            return Err(NetError::Topology(format!(
                "value network must end with a regression over {num_actions} actions"
            )))
        }
    }
    Ok(specs.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn brain(options: BrainOptions) -> Brain {
        Brain::new(2, 3, options, StdRng::seed_from_u64(17)).unwrap()
    }

    #[test]
    fn net_input_layout() {
        let options = BrainOptions {
            temporal_window: 2,
            ..BrainOptions::default()
        };
        let mut b = brain(options);
        assert_eq!(b.net_inputs(), 2 * 2 + 3 * 2 + 2);

        b.forward(&[0.1, 0.2]).unwrap();
        let last_action = b.forward(&[0.3, 0.4]).unwrap();
        let input = b.net_input(&[0.5, 0.6]);
        assert_eq!(input.len(), b.net_inputs());
        assert_eq!(&input[..2], &[0.5, 0.6]);
        assert_eq!(&input[2..4], &[0.3, 0.4]);
        let one_hot = &input[4..7];
        assert_eq!(one_hot[last_action], 2.0);
        assert_eq!(one_hot.iter().sum::<f64>(), 2.0);
        assert_eq!(&input[7..9], &[0.1, 0.2]);
    }

    #[test]
    fn phases_follow_the_schedule() {
        let options = BrainOptions {
            learning_steps_burnin: 2,
            learning_steps_total: 4,
            start_learn_threshold: 1000,
            ..BrainOptions::default()
        };
        let mut b = brain(options);
        assert_eq!(b.phase(), Phase::BurnIn);
        let mut phases = Vec::new();
        for _ in 0..5 {
            b.forward(&[0.0, 1.0]).unwrap();
            b.backward(0.0).unwrap();
            phases.push(b.phase());
        }
        assert_eq!(
            phases,
            [Phase::BurnIn, Phase::Annealing, Phase::Annealing, Phase::Exploiting, Phase::Exploiting]
        );
        assert_eq!(b.epsilon(), 0.05);

        b.set_learning(false);
        b.forward(&[0.0, 1.0]).unwrap();
        assert_eq!(b.phase(), Phase::Testing);
        assert_eq!(b.epsilon(), 0.01);
    }

    #[test]
    fn learning_starts_past_the_threshold() {
        let options = BrainOptions {
            start_learn_threshold: 5,
            td_solver: Some(BrainOptions::default_td_solver().with_batch_size(4)),
            hidden_layer_sizes: vec![4],
            ..BrainOptions::default()
        };
        let mut b = brain(options);
        for step in 0..40 {
            let obs = [step as f64 / 40.0, 1.0];
            b.forward(&obs).unwrap();
            b.backward(if step % 2 == 0 { 1.0 } else { 0.0 }).unwrap();
        }
        assert_eq!(b.experience().len(), 38);
        assert!(b.average_loss().is_some());
        assert!(b.average_reward().is_some());
        assert!(b.to_string().contains("experience replay size: 38"));
    }

    #[test]
    fn rejects_bad_configuration() {
        let rng = || StdRng::seed_from_u64(0);
        let bad_distribution = BrainOptions {
            random_action_distribution: vec![0.5, 0.6, 0.0],
            ..BrainOptions::default()
        };
        assert!(Brain::new(2, 3, bad_distribution, rng()).is_err());

        let short_distribution = BrainOptions {
            random_action_distribution: vec![1.0],
            ..BrainOptions::default()
        };
        assert!(Brain::new(2, 3, short_distribution, rng()).is_err());

        let nan_distribution = BrainOptions {
            random_action_distribution: vec![f64::NAN, 0.5, 0.5],
            ..BrainOptions::default()
        };
        assert!(matches!(
            Brain::new(2, 3, nan_distribution, rng()),
            Err(NetError::InvalidOption { name: "random_action_distribution", .. })
        ));

        let bad_schedule = BrainOptions {
            learning_steps_total: 10,
            learning_steps_burnin: 10,
            ..BrainOptions::default()
        };
        assert!(Brain::new(2, 3, bad_schedule, rng()).is_err());

        let wrong_head = BrainOptions {
            layer_specs: Some(vec![LayerSpec::input(1, 1, 7), LayerSpec::regression(2)]),
            ..BrainOptions::default()
        };
        assert!(matches!(Brain::new(2, 3, wrong_head, rng()), Err(NetError::Topology(_))));

        let custom = BrainOptions {
            layer_specs: Some(vec![
                LayerSpec::input(1, 1, 7),
                LayerSpec::dense(5, Activation::Tanh),
                LayerSpec::regression(3),
            ]),
            ..BrainOptions::default()
        };
        assert!(Brain::new(2, 3, custom, rng()).is_ok());
    }

    #[test]
    fn biased_random_actions_follow_the_distribution() {
        let options = BrainOptions {
            random_action_distribution: vec![0.0, 1.0, 0.0],
            ..BrainOptions::default()
        };
        let mut b = brain(options);
        assert!((0..100).all(|_| b.random_action() == 1));
    }

    #[test]
    fn observation_length_is_checked() {
        let mut b = brain(BrainOptions::default());
        assert!(matches!(b.forward(&[1.0]), Err(NetError::ShapeMismatch { .. })));
    }
}
