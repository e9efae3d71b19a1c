use crate::error::{NetError, Result};
use crate::loss::target::Target;
use crate::math::volume::{Shape, Volume};

const MARGIN: f64 = 1.0;

/// Multiclass structured SVM loss: the true class must outscore every other
/// class by a margin of 1. Forward outputs the raw scores.
#[derive(Debug, Clone)]
pub struct SvmLayer {
    num_inputs: usize,
}

impl SvmLayer {
    pub fn new(in_shape: Shape) -> SvmLayer {
        SvmLayer { num_inputs: in_shape.len() }
    }

    pub fn out_shape(&self) -> Shape {
        Shape::flat(self.num_inputs)
    }

    pub fn forward(&self, input: &Volume) -> Volume {
        input.clone_values()
    }

    pub fn backward(&self, input: &mut Volume, target: &Target) -> Result<f64> {
        let y = match target {
            Target::Class(y) => *y,
            other => {
                return Err(NetError::TargetMismatch {
                    layer: "svm",
                    target: other.kind(),
                })
            }
        };
        if y >= self.num_inputs {
            return Err(NetError::InvalidTarget(format!(
                "class {y} out of range for {} classes",
                self.num_inputs
            )));
        }

        input.zero_gradients();
        let (values, gradients) = input.split_mut();
        let yscore = values[y];
        let mut loss = 0.0;
        for i in 0..self.num_inputs {
            if i == y {
                continue;
            }
            let ydiff = -yscore + values[i] + MARGIN;
            if ydiff > 0.0 {
                gradients[i] += 1.0;
                gradients[y] -= 1.0;
                loss += ydiff;
            }
        }
        Ok(loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_margin_violators_contribute() {
        let layer = SvmLayer::new(Shape::flat(3));
        let mut x = Volume::from_values(vec![2.0, 1.5, -1.0]);
        let loss = layer.backward(&mut x, &Target::Class(0)).unwrap();
        // class 1 violates by 0.5, class 2 is clear of the margin
        assert!((loss - 0.5).abs() < 1e-12);
        assert_eq!(x.gradients(), &[-1.0, 1.0, 0.0]);
    }

    #[test]
    fn regression_targets_are_rejected() {
        let layer = SvmLayer::new(Shape::flat(2));
        let mut x = Volume::from_values(vec![0.0, 0.0]);
        assert!(matches!(
            layer.backward(&mut x, &Target::Scalar(1.0)),
            Err(NetError::TargetMismatch { .. })
        ));
    }
}
