pub mod candidate;
pub mod magic_net;
pub mod options;

pub use candidate::{Candidate, Fold};
pub use magic_net::{MagicNet, Progress};
pub use options::MagicNetOptions;
