use serde::{Deserialize, Serialize};

/// Element-wise nonlinearities that keep the shape of their input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivationFunction {
    ReLU,
    Sigmoid,
    Tanh,
}

impl ActivationFunction {
    pub fn function(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::ReLU => if x > 0.0 { x } else { 0.0 },
            ActivationFunction::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            ActivationFunction::Tanh => x.tanh(),
        }
    }

    /// Derivative expressed through the activation's *output* `y = f(x)`,
    /// which is what the layer keeps around after the forward pass.
    pub fn derivative(&self, y: f64) -> f64 {
        match self {
            ActivationFunction::ReLU => if y > 0.0 { 1.0 } else { 0.0 },
            ActivationFunction::Sigmoid => y * (1.0 - y),
            ActivationFunction::Tanh => 1.0 - y * y,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActivationFunction::ReLU => "relu",
            ActivationFunction::Sigmoid => "sigmoid",
            ActivationFunction::Tanh => "tanh",
        }
    }
}

/// Activation requested on a fully-connected or convolution layer spec.
///
/// The network expands it into a separate activation layer placed right
/// after the dot-product layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Activation {
    Relu,
    Sigmoid,
    Tanh,
    /// Max over groups of `group_size` consecutive depth channels.
    Maxout {
        #[serde(default = "default_group_size")]
        group_size: usize,
    },
}

pub(crate) fn default_group_size() -> usize {
    2
}

impl Activation {
    /// The element-wise function for this activation, `None` for maxout.
    pub fn elementwise(&self) -> Option<ActivationFunction> {
        match self {
            Activation::Relu => Some(ActivationFunction::ReLU),
            Activation::Sigmoid => Some(ActivationFunction::Sigmoid),
            Activation::Tanh => Some(ActivationFunction::Tanh),
            Activation::Maxout { .. } => None,
        }
    }
}
