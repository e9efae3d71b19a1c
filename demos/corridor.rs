// A Brain learns to walk right along a short corridor: it sees its position,
// can step left or right, and is rewarded only at the far end.
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::filter::EnvFilter;

use convnet::{Brain, BrainOptions};

const LENGTH: usize = 8;

fn main() -> convnet::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let options = BrainOptions {
        temporal_window: 0,
        experience_size: 5000,
        start_learn_threshold: 200,
        learning_steps_burnin: 500,
        learning_steps_total: 5000,
        hidden_layer_sizes: vec![16],
        ..BrainOptions::default()
    };
    let mut brain = Brain::new(1, 2, options, StdRng::seed_from_u64(3))?;

    let mut position: usize = 0;
    let mut episodes = 0;
    for step in 0..8000 {
        let observation = [position as f64 / (LENGTH - 1) as f64];
        let action = brain.forward(&observation)?;
        position = match action {
            0 => position.saturating_sub(1),
            _ => (position + 1).min(LENGTH - 1),
        };

        let reward = if position == LENGTH - 1 { 1.0 } else { 0.0 };
        brain.backward(reward)?;
        if position == LENGTH - 1 {
            position = 0;
            episodes += 1;
        }

        if step % 1000 == 0 {
            println!("step {step} ({:?})\n{brain}\n", brain.phase());
        }
    }
    println!("reached the end {episodes} times");

    brain.set_learning(false);
    for p in 0..LENGTH {
        let policy = brain.policy(&[p as f64 / (LENGTH - 1) as f64])?;
        println!("position {p}: {}", if policy.action == 1 { "right" } else { "left" });
    }
    Ok(())
}
