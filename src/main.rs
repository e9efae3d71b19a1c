// Loads a network description from JSON, builds it and prints its layers.
//
//   cargo run -- path/to/network.json --seed 7
//
// Set RUST_LOG=debug to see every layer as it is built.
use std::process::ExitCode;

use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::error;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format;

use convnet::{Network, NetworkSpec};

use self::args::Args;

mod args;

fn main() -> ExitCode {
    let args = Args::parse();

    let event_format = format().with_target(false).without_time();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .event_format(event_format)
        .init();

    let spec = match NetworkSpec::load_json(&args.path) {
        Ok(spec) => spec,
        Err(e) => {
            error!(path = %args.path.display(), "could not read network description: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let net = match Network::new(&spec.layers, &mut rng) {
        Ok(net) => net,
        Err(e) => {
            error!(name = %spec.name, "could not build network: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!("{}", spec.name);
    println!("{net}");
    if let Some(solver) = &spec.solver {
        println!(
            "solver: {:?}, learning rate {}, batch size {}",
            solver.method, solver.learning_rate, solver.batch_size
        );
    }
    ExitCode::SUCCESS
}
