use rand::rngs::StdRng;
use rand::SeedableRng;

use convnet::brain::Phase;
use convnet::{Brain, BrainOptions};

#[test]
fn uniform_random_actions_pass_chi_square() {
    let num_actions = 4;
    let mut brain = Brain::new(2, num_actions, BrainOptions::default(), StdRng::seed_from_u64(21)).unwrap();

    let draws = 8000;
    let mut counts = vec![0usize; num_actions];
    for _ in 0..draws {
        let a = brain.random_action();
        assert!(a < num_actions);
        counts[a] += 1;
    }

    let expected = draws as f64 / num_actions as f64;
    let chi2: f64 = counts
        .iter()
        .map(|&c| (c as f64 - expected).powi(2) / expected)
        .sum();
    // 3 degrees of freedom, p = 0.001
    assert!(chi2 < 16.27, "chi-square {chi2} for counts {counts:?}");
}

#[test]
fn replay_memory_never_exceeds_its_capacity() {
    let options = BrainOptions {
        experience_size: 50,
        start_learn_threshold: 10_000,
        ..BrainOptions::default()
    };
    let mut brain = Brain::new(3, 2, options, StdRng::seed_from_u64(5)).unwrap();

    for step in 0..300 {
        let obs = [step as f64, (step % 7) as f64, 1.0];
        brain.forward(&obs).unwrap();
        brain.backward(0.5).unwrap();
        assert!(brain.experience().len() <= 50);
    }
    assert_eq!(brain.experience().len(), 50);
    assert_eq!(brain.experience().capacity(), 50);
    assert_eq!(brain.age(), 300);
    assert_eq!(brain.phase(), Phase::BurnIn);
    assert!(brain.average_loss().is_none());
    assert_eq!(brain.average_reward(), Some(0.5));
}

#[test]
fn stored_states_are_full_network_inputs() {
    let options = BrainOptions {
        temporal_window: 2,
        start_learn_threshold: 10_000,
        ..BrainOptions::default()
    };
    let mut brain = Brain::new(2, 3, options, StdRng::seed_from_u64(8)).unwrap();
    for step in 0..10 {
        brain.forward(&[step as f64, -(step as f64)]).unwrap();
        brain.backward(step as f64).unwrap();
    }

    let net_inputs = brain.net_inputs();
    assert!(!brain.experience().is_empty());
    for e in brain.experience().iter() {
        assert_eq!(e.state0.len(), net_inputs);
        assert_eq!(e.state1.len(), net_inputs);
        assert!(e.action0 < 3);
        // state1 starts with the observation that followed state0's
        assert_eq!(e.state1[0], e.state0[0] + 1.0);
    }
}
