use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::filter::EnvFilter;

use convnet::{
    train_loop, Activation, Dataset, LayerSpec, Method, Network, Solver, SolverOptions, Target, TrainConfig, Volume,
};

fn main() -> convnet::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut rng = StdRng::seed_from_u64(7);
    let network = Network::new(
        &[
            LayerSpec::input(1, 1, 2),
            LayerSpec::dense(8, Activation::Tanh),
            LayerSpec::softmax(2),
        ],
        &mut rng,
    )?;
    println!("{network}");

    let inputs: Vec<Volume> = [[1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]
        .iter()
        .map(|x| Volume::from_values(x.to_vec()))
        .collect();
    let targets: Vec<Target> = [1, 0, 1, 0].into_iter().map(Target::Class).collect();

    let options = SolverOptions::new(Method::Adam).with_learning_rate(0.05);
    let mut solver = Solver::new(network, options)?;

    let data = Dataset::new(&inputs, &targets)?;
    let loss = train_loop(&mut solver, data, None, &TrainConfig::new(500), &mut rng)?;
    println!("final loss = {loss:.6}");

    let net = solver.network_mut();
    for x in &inputs {
        let p = net.forward(x, false)?.values().to_vec();
        println!("Input: {:?} -> P(1) = {:.4}", x.values(), p[1]);
    }
    Ok(())
}
