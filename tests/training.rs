use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use convnet::{Activation, LayerSpec, Method, Network, Solver, SolverOptions, Target, Volume};

fn classifier(rng: &mut StdRng) -> Network {
    Network::new(
        &[
            LayerSpec::input(1, 1, 2),
            LayerSpec::dense(50, Activation::Tanh),
            LayerSpec::dense(40, Activation::Tanh),
            LayerSpec::softmax(3),
        ],
        rng,
    )
    .unwrap()
}

#[test]
fn classifier_expands_to_seven_layers() {
    let mut rng = StdRng::seed_from_u64(0);
    let net = classifier(&mut rng);
    assert_eq!(net.layers().len(), 7);
}

#[test]
fn one_step_raises_the_trained_class_probability() {
    let mut rng = StdRng::seed_from_u64(10);
    let options = SolverOptions::new(Method::Sgd)
        .with_learning_rate(0.0001)
        .with_momentum(0.0)
        .with_batch_size(1)
        .with_l2_decay(0.0);
    let mut solver = Solver::new(classifier(&mut rng), options).unwrap();

    for _ in 0..100 {
        let x = Volume::from_values(vec![rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)]);
        let label = rng.gen_range(0..3);

        let before = solver.network_mut().forward(&x, false).unwrap().values()[label];
        solver.train(&x, &Target::Class(label)).unwrap();
        let after = solver.network_mut().forward(&x, false).unwrap().values()[label];
        assert!(after > before, "p({label}) went from {before} to {after}");
    }
}

/// Noiseless `y = w·x + b` over 32 points; the optimum has zero loss.
fn linear_data(rng: &mut StdRng) -> Vec<(Volume, Target)> {
    let w = [1.5, -2.0, 0.5];
    let b = 0.3;
    (0..32)
        .map(|_| {
            let x: Vec<f64> = (0..3).map(|_| rng.gen_range(-1.0..1.0)).collect();
            let y = x.iter().zip(w).map(|(xi, wi)| xi * wi).sum::<f64>() + b;
            (Volume::from_values(x), Target::Scalar(y))
        })
        .collect()
}

fn fit(options: SolverOptions, seed: u64) -> f64 {
    let mut rng = StdRng::seed_from_u64(seed);
    let data = linear_data(&mut rng);
    let net = Network::new(&[LayerSpec::input(1, 1, 3), LayerSpec::regression(1)], &mut rng).unwrap();
    let mut solver = Solver::new(net, options).unwrap();

    for _ in 0..200 {
        for (x, y) in &data {
            solver.train(x, y).unwrap();
        }
    }

    let net = solver.network_mut();
    data.iter().map(|(x, y)| net.cost_loss(x, y).unwrap()).sum::<f64>() / data.len() as f64
}

#[test]
fn every_method_fits_a_linear_model() {
    let methods = [
        SolverOptions::new(Method::Sgd).with_learning_rate(0.01),
        SolverOptions::new(Method::Nesterov).with_learning_rate(0.01),
        SolverOptions::new(Method::Adagrad).with_learning_rate(0.5),
        SolverOptions::new(Method::Windowgrad).with_learning_rate(0.005),
        SolverOptions {
            eps: 1e-6,
            ..SolverOptions::new(Method::Adadelta)
        },
        SolverOptions::new(Method::Adam).with_learning_rate(0.01),
    ];

    for options in methods {
        for seed in 0..3 {
            let loss = fit(options.clone(), seed);
            assert!(loss < 1e-3, "{:?} (seed {seed}) ended at loss {loss}", options.method);
        }
    }
}
