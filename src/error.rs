use thiserror::Error;

use crate::math::volume::Shape;

/// Errors raised while building, running or training a network.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NetError {
    /// The layer list cannot form a network (missing input layer, no loss
    /// layer at the end, too few layers, ...).
    #[error("invalid network topology: {0}")]
    Topology(String),

    #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: &'static str,
        expected: Shape,
        actual: Shape,
    },

    #[error("index ({x}, {y}, {d}) is out of range for a {shape} volume")]
    OutOfRange {
        x: usize,
        y: usize,
        d: usize,
        shape: Shape,
    },

    /// `backward()` was called on a layer (or network) that has not run a
    /// matching `forward()`.
    #[error("{layer} layer: backward called before forward")]
    NotForwarded { layer: &'static str },

    /// The training target kind does not fit the terminal loss layer.
    #[error("{target} target cannot train a network ending in a {layer} layer")]
    TargetMismatch {
        layer: &'static str,
        target: &'static str,
    },

    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("invalid option `{name}`: {reason}")]
    InvalidOption { name: &'static str, reason: String },

    #[error("division by zero in {0}")]
    DivisionByZero(&'static str),
}

pub type Result<T> = std::result::Result<T, NetError>;

impl NetError {
    pub(crate) fn invalid_option(name: &'static str, reason: impl Into<String>) -> Self {
        NetError::InvalidOption {
            name,
            reason: reason.into(),
        }
    }
}
