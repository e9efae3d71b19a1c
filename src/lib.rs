pub mod error;
pub mod math;
pub mod activation;
pub mod layers;
pub mod loss;
pub mod network;
pub mod optim;
pub mod train;
pub mod brain;
pub mod magic;

// Convenience re-exports
pub use error::{NetError, Result};
pub use math::volume::{Shape, Volume};
pub use activation::activation::{Activation, ActivationFunction};
pub use layers::Layer;
pub use loss::target::Target;
pub use network::network::Network;
pub use network::spec::{LayerSpec, NetworkSpec};
pub use optim::{Method, Solver, SolverOptions, TrainResult};
pub use train::{train_loop, Dataset, TrainConfig};
pub use brain::{Brain, BrainOptions};
pub use magic::{MagicNet, MagicNetOptions};
