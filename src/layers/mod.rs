pub mod convolution;
pub mod dropout;
pub mod fully_connected;
pub mod input;
pub mod lrn;
pub mod maxout;
pub mod nonlinearity;
pub mod pooling;

use rand::Rng;

use crate::activation::activation::ActivationFunction;
use crate::error::{NetError, Result};
use crate::loss::{RegressionLayer, SoftmaxLayer, SvmLayer, Target};
use crate::math::volume::{Shape, Volume};
use crate::network::spec::LayerSpec;

pub use convolution::ConvolutionLayer;
pub use dropout::DropoutLayer;
pub use fully_connected::FullyConnectedLayer;
pub use input::InputLayer;
pub use lrn::LrnLayer;
pub use maxout::MaxoutLayer;
pub use nonlinearity::NonlinearityLayer;
pub use pooling::PoolingLayer;

/// A learnable volume handed to the solver, with the decay multipliers
/// that apply to it.
#[derive(Debug)]
pub struct ParamsAndGrads<'a> {
    pub volume: &'a mut Volume,
    pub l1_decay_mul: f64,
    pub l2_decay_mul: f64,
}

impl<'a> ParamsAndGrads<'a> {
    pub fn new(volume: &'a mut Volume, l1_decay_mul: f64, l2_decay_mul: f64) -> Self {
        ParamsAndGrads {
            volume,
            l1_decay_mul,
            l2_decay_mul,
        }
    }
}

/// One built layer of a network.
#[derive(Debug, Clone)]
pub enum Layer {
    Input(InputLayer),
    FullyConnected(FullyConnectedLayer),
    Convolution(ConvolutionLayer),
    Pooling(PoolingLayer),
    Nonlinearity(NonlinearityLayer),
    Maxout(MaxoutLayer),
    Dropout(DropoutLayer),
    LocalResponseNormalization(LrnLayer),
    Softmax(SoftmaxLayer),
    Svm(SvmLayer),
    Regression(RegressionLayer),
}

impl Layer {
    /// Builds the layer described by `spec`. `previous` is the output shape of
    /// the layer before it, `None` for the first layer.
    ///
    /// Expects a desugared spec: loss specs become only the loss layer and
    /// activation or dropout fields on dot-product specs are ignored here.
    pub fn from_spec(spec: &LayerSpec, previous: Option<Shape>, rng: &mut impl Rng) -> Result<Layer> {
        let in_shape = match (spec, previous) {
            (LayerSpec::Input { width, height, depth }, None) => {
                return Ok(Layer::Input(InputLayer::new(Shape::new(*width, *height, *depth))?));
            }
            (LayerSpec::Input { .. }, Some(_)) => {
                return Err(NetError::Topology("an input layer can only come first".into()));
            }
            (_, None) => {
                return Err(NetError::Topology("the first layer must be an input layer".into()));
            }
            (_, Some(shape)) => shape,
        };

        let layer = match spec {
            LayerSpec::Input { .. } => {
                return Err(NetError::Topology("an input layer can only come first".into()));
            }
            LayerSpec::FullyConnected(fc) => Layer::FullyConnected(FullyConnectedLayer::new(in_shape, fc, rng)?),
            LayerSpec::Convolution(conv) => Layer::Convolution(ConvolutionLayer::new(in_shape, conv, rng)?),
            LayerSpec::Pooling(pool) => Layer::Pooling(PoolingLayer::new(in_shape, pool)?),
            LayerSpec::Relu => Layer::Nonlinearity(NonlinearityLayer::new(in_shape, ActivationFunction::ReLU)),
            LayerSpec::Sigmoid => Layer::Nonlinearity(NonlinearityLayer::new(in_shape, ActivationFunction::Sigmoid)),
            LayerSpec::Tanh => Layer::Nonlinearity(NonlinearityLayer::new(in_shape, ActivationFunction::Tanh)),
            LayerSpec::Maxout { group_size } => Layer::Maxout(MaxoutLayer::new(in_shape, *group_size)?),
            LayerSpec::Dropout { drop_prob } => Layer::Dropout(DropoutLayer::new(in_shape, *drop_prob, rng)?),
            LayerSpec::LocalResponseNormalization(lrn) => {
                Layer::LocalResponseNormalization(LrnLayer::new(in_shape, lrn)?)
            }
            LayerSpec::Softmax { num_classes } | LayerSpec::Svm { num_classes } => {
                if in_shape.len() != *num_classes {
                    return Err(NetError::ShapeMismatch {
                        context: "classifier input",
                        expected: Shape::flat(*num_classes),
                        actual: in_shape,
                    });
                }
                match spec {
                    LayerSpec::Softmax { .. } => Layer::Softmax(SoftmaxLayer::new(in_shape)?),
                    _ => Layer::Svm(SvmLayer::new(in_shape)),
                }
            }
            LayerSpec::Regression { num_neurons } => {
                if in_shape.len() != *num_neurons {
                    return Err(NetError::ShapeMismatch {
                        context: "regression input",
                        expected: Shape::flat(*num_neurons),
                        actual: in_shape,
                    });
                }
                Layer::Regression(RegressionLayer::new(in_shape))
            }
        };
        Ok(layer)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Layer::Input(_) => "input",
            Layer::FullyConnected(_) => "fc",
            Layer::Convolution(_) => "conv",
            Layer::Pooling(_) => "pool",
            Layer::Nonlinearity(layer) => layer.function().name(),
            Layer::Maxout(_) => "maxout",
            Layer::Dropout(_) => "dropout",
            Layer::LocalResponseNormalization(_) => "lrn",
            Layer::Softmax(_) => "softmax",
            Layer::Svm(_) => "svm",
            Layer::Regression(_) => "regression",
        }
    }

    pub fn out_shape(&self) -> Shape {
        match self {
            Layer::Input(layer) => layer.out_shape(),
            Layer::FullyConnected(layer) => layer.out_shape(),
            Layer::Convolution(layer) => layer.out_shape(),
            Layer::Pooling(layer) => layer.out_shape(),
            Layer::Nonlinearity(layer) => layer.out_shape(),
            Layer::Maxout(layer) => layer.out_shape(),
            Layer::Dropout(layer) => layer.out_shape(),
            Layer::LocalResponseNormalization(layer) => layer.out_shape(),
            Layer::Softmax(layer) => layer.out_shape(),
            Layer::Svm(layer) => layer.out_shape(),
            Layer::Regression(layer) => layer.out_shape(),
        }
    }

    pub fn is_loss(&self) -> bool {
        matches!(self, Layer::Softmax(_) | Layer::Svm(_) | Layer::Regression(_))
    }

    pub fn forward(&mut self, input: &Volume, is_training: bool) -> Result<Volume> {
        match self {
            Layer::Input(layer) => layer.forward(input),
            Layer::FullyConnected(layer) => layer.forward(input),
            Layer::Convolution(layer) => layer.forward(input),
            Layer::Pooling(layer) => layer.forward(input),
            Layer::Nonlinearity(layer) => Ok(layer.forward(input)),
            Layer::Maxout(layer) => layer.forward(input),
            Layer::Dropout(layer) => Ok(layer.forward(input, is_training)),
            Layer::LocalResponseNormalization(layer) => layer.forward(input),
            Layer::Softmax(layer) => layer.forward(input),
            Layer::Svm(layer) => Ok(layer.forward(input)),
            Layer::Regression(layer) => Ok(layer.forward(input)),
        }
    }

    /// Hidden-layer backward: reads `output.gradients`, overwrites
    /// `input.gradients` and accumulates parameter gradients.
    pub fn backward(&mut self, input: &mut Volume, output: &Volume) -> Result<()> {
        match self {
            Layer::Input(layer) => {
                layer.backward(input, output);
                Ok(())
            }
            Layer::FullyConnected(layer) => {
                layer.backward(input, output);
                Ok(())
            }
            Layer::Convolution(layer) => layer.backward(input, output),
            Layer::Pooling(layer) => layer.backward(input, output),
            Layer::Nonlinearity(layer) => layer.backward(input, output),
            Layer::Maxout(layer) => layer.backward(input, output),
            Layer::Dropout(layer) => layer.backward(input, output),
            Layer::LocalResponseNormalization(layer) => layer.backward(input, output),
            Layer::Softmax(_) | Layer::Svm(_) | Layer::Regression(_) => Err(NetError::Topology(format!(
                "{} is a loss layer and needs a target to run backward",
                self.name()
            ))),
        }
    }

    /// Loss-layer backward: seeds `input.gradients` from `target` and returns
    /// the loss.
    pub fn loss_backward(&mut self, input: &mut Volume, target: &Target) -> Result<f64> {
        match self {
            Layer::Softmax(layer) => layer.backward(input, target),
            Layer::Svm(layer) => layer.backward(input, target),
            Layer::Regression(layer) => layer.backward(input, target),
            other => Err(NetError::Topology(format!("{} is not a loss layer", other.name()))),
        }
    }

    /// Number of learnable scalars, biases included.
    pub fn num_parameters(&self) -> usize {
        let (filters, biases) = match self {
            Layer::FullyConnected(layer) => (layer.filters(), layer.biases()),
            Layer::Convolution(layer) => (layer.filters(), layer.biases()),
            _ => return 0,
        };
        filters.iter().map(Volume::len).sum::<usize>() + biases.len()
    }

    pub fn params_and_grads(&mut self) -> Vec<ParamsAndGrads<'_>> {
        match self {
            Layer::FullyConnected(layer) => layer.params_and_grads(),
            Layer::Convolution(layer) => layer.params_and_grads(),
            _ => Vec::new(),
        }
    }
}
