use serde::{Deserialize, Serialize};

use crate::activation::activation::{default_group_size, Activation};
use crate::optim::options::SolverOptions;

fn one() -> f64 {
    1.0
}

fn default_conv_stride() -> usize {
    1
}

fn default_pool_stride() -> usize {
    2
}

/// A dense (fully-connected) layer description.
///
/// `activation` and `drop_prob` are conveniences: the network expands them
/// into separate activation and dropout layers placed after this one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullyConnectedSpec {
    pub num_neurons: usize,
    #[serde(default)]
    pub l1_decay_mul: f64,
    #[serde(default = "one")]
    pub l2_decay_mul: f64,
    /// Initial value of every bias.
    #[serde(default)]
    pub bias_pref: f64,
    #[serde(default)]
    pub activation: Option<Activation>,
    #[serde(default)]
    pub drop_prob: Option<f64>,
}

impl FullyConnectedSpec {
    pub fn new(num_neurons: usize) -> Self {
        FullyConnectedSpec {
            num_neurons,
            l1_decay_mul: 0.0,
            l2_decay_mul: 1.0,
            bias_pref: 0.0,
            activation: None,
            drop_prob: None,
        }
    }

    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = Some(activation);
        self
    }

    pub fn with_dropout(mut self, drop_prob: f64) -> Self {
        self.drop_prob = Some(drop_prob);
        self
    }
}

/// A spatial convolution with `filters` kernels of `sx × sy`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvolutionSpec {
    pub sx: usize,
    /// Kernel height; defaults to `sx`.
    #[serde(default)]
    pub sy: Option<usize>,
    pub filters: usize,
    #[serde(default = "default_conv_stride")]
    pub stride: usize,
    #[serde(default)]
    pub pad: usize,
    #[serde(default)]
    pub l1_decay_mul: f64,
    #[serde(default = "one")]
    pub l2_decay_mul: f64,
    #[serde(default)]
    pub bias_pref: f64,
    #[serde(default)]
    pub activation: Option<Activation>,
}

impl ConvolutionSpec {
    pub fn new(sx: usize, filters: usize) -> Self {
        ConvolutionSpec {
            sx,
            sy: None,
            filters,
            stride: 1,
            pad: 0,
            l1_decay_mul: 0.0,
            l2_decay_mul: 1.0,
            bias_pref: 0.0,
            activation: None,
        }
    }

    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    pub fn with_pad(mut self, pad: usize) -> Self {
        self.pad = pad;
        self
    }

    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = Some(activation);
        self
    }

    pub fn kernel_height(&self) -> usize {
        self.sy.unwrap_or(self.sx)
    }
}

/// Max pooling over `sx × sy` windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolingSpec {
    pub sx: usize,
    #[serde(default)]
    pub sy: Option<usize>,
    #[serde(default = "default_pool_stride")]
    pub stride: usize,
    #[serde(default)]
    pub pad: usize,
}

impl PoolingSpec {
    pub fn new(sx: usize) -> Self {
        PoolingSpec { sx, sy: None, stride: 2, pad: 0 }
    }

    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    pub fn window_height(&self) -> usize {
        self.sy.unwrap_or(self.sx)
    }
}

/// Local response normalization across depth: `a / (k + alpha/n · Σ a_j²)^beta`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LrnSpec {
    pub k: f64,
    /// Window size along depth; should be odd.
    pub n: usize,
    pub alpha: f64,
    pub beta: f64,
}

/// One entry of a network description.
///
/// The first entry must be `Input` and the last one of the loss layers
/// (`Softmax`, `Svm`, `Regression`). Every layer after the input takes its
/// input shape from the layer before it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerSpec {
    Input {
        #[serde(default = "one_usize")]
        width: usize,
        #[serde(default = "one_usize")]
        height: usize,
        depth: usize,
    },
    FullyConnected(FullyConnectedSpec),
    Convolution(ConvolutionSpec),
    Pooling(PoolingSpec),
    Relu,
    Sigmoid,
    Tanh,
    Maxout {
        #[serde(default = "default_group_size")]
        group_size: usize,
    },
    Dropout {
        drop_prob: f64,
    },
    LocalResponseNormalization(LrnSpec),
    /// Classifier over `num_classes` classes; gets its own fully-connected
    /// layer in front of it.
    Softmax {
        num_classes: usize,
    },
    /// Multiclass hinge loss; gets its own fully-connected layer.
    Svm {
        num_classes: usize,
    },
    /// L2 regression onto `num_neurons` outputs; gets its own
    /// fully-connected layer.
    Regression {
        #[serde(default = "one_usize")]
        num_neurons: usize,
    },
}

fn one_usize() -> usize {
    1
}

impl LayerSpec {
    pub fn input(width: usize, height: usize, depth: usize) -> Self {
        LayerSpec::Input { width, height, depth }
    }

    pub fn fully_connected(num_neurons: usize) -> Self {
        LayerSpec::FullyConnected(FullyConnectedSpec::new(num_neurons))
    }

    /// Fully-connected layer followed by `activation`.
    pub fn dense(num_neurons: usize, activation: Activation) -> Self {
        LayerSpec::FullyConnected(FullyConnectedSpec::new(num_neurons).with_activation(activation))
    }

    pub fn softmax(num_classes: usize) -> Self {
        LayerSpec::Softmax { num_classes }
    }

    pub fn svm(num_classes: usize) -> Self {
        LayerSpec::Svm { num_classes }
    }

    pub fn regression(num_neurons: usize) -> Self {
        LayerSpec::Regression { num_neurons }
    }

    pub fn is_input(&self) -> bool {
        matches!(self, LayerSpec::Input { .. })
    }

    pub fn is_loss(&self) -> bool {
        matches!(
            self,
            LayerSpec::Softmax { .. } | LayerSpec::Svm { .. } | LayerSpec::Regression { .. }
        )
    }
}

/// Expands convenience declarations into the flat list of layers the
/// network actually builds:
///
/// - loss layers get a fully-connected layer of matching width in front;
/// - fully-connected and convolution layers with a ReLU activation get a
///   bias of 0.1 so that units start out active;
/// - an `activation` becomes its own activation layer;
/// - a fully-connected `drop_prob` becomes a dropout layer.
pub fn desugar(specs: &[LayerSpec]) -> Vec<LayerSpec> {
    let mut out = Vec::with_capacity(specs.len() * 2);

    for spec in specs {
        let mut spec = spec.clone();
        let mut activation = None;
        let mut dropout = None;

        match &mut spec {
            LayerSpec::Softmax { num_classes } | LayerSpec::Svm { num_classes } => {
                out.push(LayerSpec::fully_connected(*num_classes));
            }
            LayerSpec::Regression { num_neurons } => {
                out.push(LayerSpec::fully_connected(*num_neurons));
            }
            LayerSpec::FullyConnected(fc) => {
                if fc.activation == Some(Activation::Relu) {
                    fc.bias_pref = 0.1;
                }
                activation = fc.activation;
                dropout = fc.drop_prob;
            }
            LayerSpec::Convolution(conv) => {
                if conv.activation == Some(Activation::Relu) {
                    conv.bias_pref = 0.1;
                }
                activation = conv.activation;
            }
            _ => {}
        }

        out.push(spec);

        match activation {
            Some(Activation::Relu) => out.push(LayerSpec::Relu),
            Some(Activation::Sigmoid) => out.push(LayerSpec::Sigmoid),
            Some(Activation::Tanh) => out.push(LayerSpec::Tanh),
            Some(Activation::Maxout { group_size }) => out.push(LayerSpec::Maxout { group_size }),
            None => {}
        }

        if let Some(drop_prob) = dropout {
            out.push(LayerSpec::Dropout { drop_prob });
        }
    }

    out
}

/// A fully serializable description of a network architecture plus the
/// solver settings to train it with.
///
/// Only the architecture is stored; trained parameters are never written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub name: String,
    /// From the input layer to the loss layer.
    pub layers: Vec<LayerSpec>,
    #[serde(default)]
    pub solver: Option<SolverOptions>,
}

impl NetworkSpec {
    /// Writes the description as indented JSON.
    pub fn save_json(&self, path: impl AsRef<std::path::Path>) -> std::io::Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }

    /// Reads a description written by [`NetworkSpec::save_json`] or by hand.
    pub fn load_json(path: impl AsRef<std::path::Path>) -> std::io::Result<NetworkSpec> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifier_desugars_into_seven_layers() {
        let specs = vec![
            LayerSpec::input(1, 1, 2),
            LayerSpec::dense(50, Activation::Tanh),
            LayerSpec::dense(40, Activation::Tanh),
            LayerSpec::softmax(3),
        ];
        let flat = desugar(&specs);
        assert_eq!(flat.len(), 7);
        assert_eq!(flat[1], LayerSpec::dense(50, Activation::Tanh));
        assert_eq!(flat[2], LayerSpec::Tanh);
        assert_eq!(flat[5], LayerSpec::fully_connected(3));
        assert_eq!(flat[6], LayerSpec::softmax(3));
    }

    #[test]
    fn relu_gets_positive_bias_and_dropout_is_appended() {
        let specs = vec![LayerSpec::FullyConnected(
            FullyConnectedSpec::new(8).with_activation(Activation::Relu).with_dropout(0.25),
        )];
        let flat = desugar(&specs);
        assert_eq!(flat.len(), 3);
        match &flat[0] {
            LayerSpec::FullyConnected(fc) => assert_eq!(fc.bias_pref, 0.1),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(flat[1], LayerSpec::Relu);
        assert_eq!(flat[2], LayerSpec::Dropout { drop_prob: 0.25 });
    }

    #[test]
    fn maxout_activation_keeps_group_size() {
        let specs = vec![LayerSpec::Convolution(
            ConvolutionSpec::new(3, 4).with_activation(Activation::Maxout { group_size: 4 }),
        )];
        let flat = desugar(&specs);
        assert_eq!(flat[1], LayerSpec::Maxout { group_size: 4 });
    }

    #[test]
    fn spec_json_uses_defaults() {
        let json = r#"{
            "name": "tiny",
            "layers": [
                {"type": "input", "depth": 2},
                {"type": "fully_connected", "num_neurons": 4, "activation": {"kind": "relu"}},
                {"type": "softmax", "num_classes": 2}
            ],
            "solver": {"method": "adadelta", "batch_size": 4}
        }"#;
        let spec: NetworkSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.layers[0], LayerSpec::input(1, 1, 2));
        match &spec.layers[1] {
            LayerSpec::FullyConnected(fc) => {
                assert_eq!(fc.l2_decay_mul, 1.0);
                assert_eq!(fc.activation, Some(Activation::Relu));
            }
            other => panic!("unexpected {:?}", other),
        }
        let solver = spec.solver.unwrap();
        assert_eq!(solver.batch_size, 4);
        assert_eq!(solver.learning_rate, 0.01);
    }
}
