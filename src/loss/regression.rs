use crate::error::{NetError, Result};
use crate::loss::target::Target;
use crate::math::volume::{Shape, Volume};

/// L2 regression cost, `Σ ½(x_i - y_i)²`. Forward is the identity.
#[derive(Debug, Clone)]
pub struct RegressionLayer {
    num_inputs: usize,
}

impl RegressionLayer {
    pub fn new(in_shape: Shape) -> RegressionLayer {
        RegressionLayer { num_inputs: in_shape.len() }
    }

    pub fn out_shape(&self) -> Shape {
        Shape::flat(self.num_inputs)
    }

    pub fn forward(&self, input: &Volume) -> Volume {
        input.clone_values()
    }

    pub fn backward(&self, input: &mut Volume, target: &Target) -> Result<f64> {
        input.zero_gradients();
        let (values, gradients) = input.split_mut();

        match target {
            Target::Values(y) => {
                if y.len() != self.num_inputs {
                    return Err(NetError::InvalidTarget(format!(
                        "expected {} regression values, got {}",
                        self.num_inputs,
                        y.len()
                    )));
                }
                let mut loss = 0.0;
                for i in 0..self.num_inputs {
                    let dy = values[i] - y[i];
                    gradients[i] = dy;
                    loss += 0.5 * dy * dy;
                }
                Ok(loss)
            }
            Target::Scalar(y) => Ok(regress_one(values, gradients, 0, *y)),
            Target::Dimension { dim, value } => {
                if *dim >= self.num_inputs {
                    return Err(NetError::InvalidTarget(format!(
                        "dimension {dim} out of range for {} outputs",
                        self.num_inputs
                    )));
                }
                Ok(regress_one(values, gradients, *dim, *value))
            }
            Target::Class(_) => Err(NetError::TargetMismatch {
                layer: "regression",
                target: target.kind(),
            }),
        }
    }
}

fn regress_one(values: &[f64], gradients: &mut [f64], dim: usize, y: f64) -> f64 {
    let dy = values[dim] - y;
    gradients[dim] = dy;
    0.5 * dy * dy
}
