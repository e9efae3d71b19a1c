pub mod network;
pub mod spec;

pub use network::Network;
pub use spec::{desugar, ConvolutionSpec, FullyConnectedSpec, LayerSpec, LrnSpec, NetworkSpec, PoolingSpec};
