pub mod options;
pub mod solver;

pub use options::{Method, SolverOptions};
pub use solver::{Solver, TrainResult};
