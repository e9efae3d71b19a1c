use crate::error::{NetError, Result};
use crate::loss::target::Target;
use crate::math::volume::{Shape, Volume};

/// Classifier over N discrete classes `0..N`.
///
/// Takes N incoming scores and exponentiates and normalizes them into a
/// probability distribution. Paired with the negative log likelihood of the
/// true class.
#[derive(Debug, Clone)]
pub struct SoftmaxLayer {
    num_inputs: usize,
    /// Normalized exponentials from the last forward pass.
    es: Option<Vec<f64>>,
}

impl SoftmaxLayer {
    pub fn new(in_shape: Shape) -> Result<SoftmaxLayer> {
        if in_shape.is_empty() {
            return Err(NetError::DivisionByZero("softmax over zero inputs"));
        }
        Ok(SoftmaxLayer {
            num_inputs: in_shape.len(),
            es: None,
        })
    }

    pub fn out_shape(&self) -> Shape {
        Shape::flat(self.num_inputs)
    }

    pub fn forward(&mut self, input: &Volume) -> Result<Volume> {
        let scores = input.values();
        if scores.len() != self.num_inputs {
            return Err(NetError::ShapeMismatch {
                context: "softmax input",
                expected: self.out_shape(),
                actual: input.shape(),
            });
        }

        // subtract the max so exp() cannot overflow
        let amax = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mut es: Vec<f64> = scores.iter().map(|&a| (a - amax).exp()).collect();
        let esum: f64 = es.iter().sum();
        es.iter_mut().for_each(|e| *e /= esum);

        let out = Volume::from_values(es.clone());
        self.es = Some(es);
        Ok(out)
    }

    /// Seeds `input.gradients` with `p - onehot(y)` and returns `-ln p[y]`.
    ///
    /// If `p[y]` underflowed to zero the loss would be infinite; that is a
    /// `DivisionByZero` error and the gradients are left untouched.
    pub fn backward(&mut self, input: &mut Volume, target: &Target) -> Result<f64> {
        let y = match target {
            Target::Class(y) => *y,
            other => {
                return Err(NetError::TargetMismatch {
                    layer: "softmax",
                    target: other.kind(),
                })
            }
        };
        let es = self.es.as_ref().ok_or(NetError::NotForwarded { layer: "softmax" })?;
        if y >= es.len() {
            return Err(NetError::InvalidTarget(format!(
                "class {y} out of range for {} classes",
                es.len()
            )));
        }

        if es[y] == 0.0 {
            return Err(NetError::DivisionByZero("softmax log-likelihood of an underflowed class"));
        }

        input.zero_gradients();
        for (i, (g, &e)) in input.gradients_mut().iter_mut().zip(es).enumerate() {
            let indicator = if i == y { 1.0 } else { 0.0 };
            *g = -(indicator - e);
        }
        Ok(-es[y].ln())
    }

    pub fn probabilities(&self) -> Option<&[f64]> {
        self.es.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outputs_form_a_distribution() {
        let mut layer = SoftmaxLayer::new(Shape::flat(4)).unwrap();
        let out = layer.forward(&Volume::from_values(vec![1000.0, -3.0, 0.5, 999.0])).unwrap();
        let sum: f64 = out.values().iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!(out.values().iter().all(|&p| (0.0..=1.0).contains(&p)));
        assert!(out.values()[0] > out.values()[3]);
    }

    #[test]
    fn gradient_is_probability_minus_indicator() {
        let mut layer = SoftmaxLayer::new(Shape::flat(3)).unwrap();
        let mut x = Volume::from_values(vec![0.1, 0.2, 0.3]);
        let p = layer.forward(&x).unwrap();
        let loss = layer.backward(&mut x, &Target::Class(2)).unwrap();
        assert!((loss + p.values()[2].ln()).abs() < 1e-12);
        assert!((x.gradients()[0] - p.values()[0]).abs() < 1e-12);
        assert!((x.gradients()[2] - (p.values()[2] - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn backward_before_forward_is_an_error() {
        let mut layer = SoftmaxLayer::new(Shape::flat(2)).unwrap();
        let mut x = Volume::from_values(vec![0.0, 0.0]);
        assert_eq!(
            layer.backward(&mut x, &Target::Class(0)),
            Err(NetError::NotForwarded { layer: "softmax" })
        );
    }

    #[test]
    fn zero_inputs_is_a_division_by_zero() {
        assert!(matches!(SoftmaxLayer::new(Shape::flat(0)), Err(NetError::DivisionByZero(_))));
    }

    #[test]
    fn underflowed_true_class_is_an_error() {
        let mut layer = SoftmaxLayer::new(Shape::flat(2)).unwrap();
        let mut x = Volume::from_values(vec![0.0, 1000.0]);
        let p = layer.forward(&x).unwrap();
        assert_eq!(p.values()[0], 0.0);
        assert!(matches!(
            layer.backward(&mut x, &Target::Class(0)),
            Err(NetError::DivisionByZero(_))
        ));
        assert!(layer.backward(&mut x, &Target::Class(1)).unwrap().abs() < 1e-12);
    }
}
