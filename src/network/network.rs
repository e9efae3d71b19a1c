use std::fmt;

use rand::Rng;
use tracing::debug;

use crate::error::{NetError, Result};
use crate::layers::{Layer, ParamsAndGrads};
use crate::loss::Target;
use crate::math::volume::{Shape, Volume};
use crate::network::spec::{desugar, LayerSpec};

/// Activations of the last forward pass.
///
/// `Computed(acts)` holds the network input at `acts[0]` and the output of
/// layer `i` at `acts[i + 1]`, so layer `i` reads `acts[i]` and writes
/// `acts[i + 1]`.
#[derive(Debug, Clone)]
enum Trace {
    NotComputed,
    Computed(Vec<Volume>),
}

/// An ordered stack of layers ending in a loss layer.
///
/// The topology is fixed at construction; only layer parameters change
/// afterwards.
#[derive(Debug, Clone)]
pub struct Network {
    layers: Vec<Layer>,
    trace: Trace,
}

impl Network {
    /// Builds a network from layer descriptions.
    ///
    /// The list must start with an `Input` and end with a loss layer
    /// (`Softmax`, `Svm` or `Regression`), with neither kind in between.
    /// Convenience fields are expanded first (see [`desugar`]); then every
    /// layer takes its input shape from the one before it.
    pub fn new(specs: &[LayerSpec], rng: &mut impl Rng) -> Result<Network> {
        if specs.len() < 2 {
            return Err(NetError::Topology(format!(
                "at least an input and a loss layer are required, got {} layer(s)",
                specs.len()
            )));
        }
        if !specs[0].is_input() {
            return Err(NetError::Topology("the first layer must be an input layer".into()));
        }
        if specs.last().map_or(true, |spec| !spec.is_loss()) {
            return Err(NetError::Topology(
                "the last layer must be a softmax, svm or regression layer".into(),
            ));
        }
        if let Some(pos) = specs[1..specs.len() - 1]
            .iter()
            .position(|spec| spec.is_input() || spec.is_loss())
        {
            return Err(NetError::Topology(format!(
                "layer {} is an input or loss layer in the middle of the network",
                pos + 1
            )));
        }

        let flat = desugar(specs);
        let mut layers: Vec<Layer> = Vec::with_capacity(flat.len());
        for spec in &flat {
            let previous = layers.last().map(Layer::out_shape);
            let layer = Layer::from_spec(spec, previous, rng)?;
            debug!(layer = layer.name(), out_shape = %layer.out_shape(), "built layer");
            layers.push(layer);
        }

        let network = Network {
            layers,
            trace: Trace::NotComputed,
        };
        debug!(
            layers = network.layers.len(),
            parameters = network.num_parameters(),
            "network constructed"
        );
        Ok(network)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn in_shape(&self) -> Shape {
        self.layers[0].out_shape()
    }

    pub fn out_shape(&self) -> Shape {
        self.terminal().out_shape()
    }

    pub fn num_parameters(&self) -> usize {
        self.layers.iter().map(Layer::num_parameters).sum()
    }

    fn terminal(&self) -> &Layer {
        &self.layers[self.layers.len() - 1]
    }

    /// Runs every layer on `input` and returns the output of the loss layer.
    ///
    /// A pass that fails part way leaves the network with no trace, so a
    /// following `backward` reports `NotForwarded` instead of reusing the
    /// activations of an earlier pass.
    pub fn forward(&mut self, input: &Volume, is_training: bool) -> Result<&Volume> {
        self.trace = Trace::NotComputed;
        let mut acts = Vec::with_capacity(self.layers.len() + 1);
        acts.push(input.clone_values());
        for layer in &mut self.layers {
            let next = layer.forward(&acts[acts.len() - 1], is_training)?;
            acts.push(next);
        }

        self.trace = Trace::Computed(acts);
        self.output()
    }

    /// Back-propagates from the loss layer down to the input and returns the
    /// loss. Layer parameter gradients accumulate until a solver consumes
    /// them.
    pub fn backward(&mut self, target: &Target) -> Result<f64> {
        let Trace::Computed(acts) = &mut self.trace else {
            return Err(NetError::NotForwarded { layer: "network" });
        };
        let n = self.layers.len();
        let Some((loss_layer, hidden)) = self.layers.split_last_mut() else {
            return Err(NetError::Topology("empty network".into()));
        };

        let loss = loss_layer.loss_backward(&mut acts[n - 1], target)?;
        for i in (0..hidden.len()).rev() {
            let (before, after) = acts.split_at_mut(i + 1);
            hidden[i].backward(&mut before[i], &after[0])?;
        }
        Ok(loss)
    }

    /// Forward pass in inference mode followed by the loss layer alone;
    /// hidden layers see no gradient.
    pub fn cost_loss(&mut self, input: &Volume, target: &Target) -> Result<f64> {
        self.forward(input, false)?;
        let Trace::Computed(acts) = &mut self.trace else {
            return Err(NetError::NotForwarded { layer: "network" });
        };
        let n = self.layers.len();
        self.layers[n - 1].loss_backward(&mut acts[n - 1], target)
    }

    /// Checks that `target` can train this network's loss layer.
    pub fn check_target(&self, target: &Target) -> Result<()> {
        let terminal = self.terminal();
        match (terminal, target) {
            (Layer::Softmax(_) | Layer::Svm(_), Target::Class(class)) => {
                let classes = terminal.out_shape().len();
                if *class >= classes {
                    return Err(NetError::InvalidTarget(format!(
                        "class {class} out of range for {classes} classes"
                    )));
                }
                Ok(())
            }
            (Layer::Regression(_), Target::Values(_) | Target::Scalar(_) | Target::Dimension { .. }) => Ok(()),
            _ => Err(NetError::TargetMismatch {
                layer: terminal.name(),
                target: target.kind(),
            }),
        }
    }

    /// Output of the last forward pass.
    pub fn output(&self) -> Result<&Volume> {
        match &self.trace {
            Trace::Computed(acts) => acts
                .last()
                .ok_or(NetError::NotForwarded { layer: "network" }),
            Trace::NotComputed => Err(NetError::NotForwarded { layer: "network" }),
        }
    }

    /// Gradient of the loss with respect to the network input, filled by
    /// [`Network::backward`].
    pub fn input_gradients(&self) -> Result<&[f64]> {
        match &self.trace {
            Trace::Computed(acts) => Ok(acts[0].gradients()),
            Trace::NotComputed => Err(NetError::NotForwarded { layer: "network" }),
        }
    }

    /// Most probable class of the last forward pass. Needs a softmax output.
    pub fn prediction(&self) -> Result<usize> {
        if !matches!(self.terminal(), Layer::Softmax(_)) {
            return Err(NetError::Topology(format!(
                "prediction needs a softmax output layer, found {}",
                self.terminal().name()
            )));
        }
        let output = self.output()?;
        output
            .argmax()
            .ok_or(NetError::DivisionByZero("prediction over zero classes"))
    }

    /// Every learnable volume of every layer, in layer order.
    pub fn params_and_grads(&mut self) -> Vec<ParamsAndGrads<'_>> {
        self.layers
            .iter_mut()
            .flat_map(|layer| layer.params_and_grads())
            .collect()
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<4} {:<12} {:>12} {:>10}", "#", "layer", "output", "params")?;
        for (i, layer) in self.layers.iter().enumerate() {
            writeln!(
                f,
                "{:<4} {:<12} {:>12} {:>10}",
                i,
                layer.name(),
                layer.out_shape().to_string(),
                layer.num_parameters()
            )?;
        }
        write!(f, "total parameters: {}", self.num_parameters())
    }
}
