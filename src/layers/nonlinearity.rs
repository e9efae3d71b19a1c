use crate::activation::activation::ActivationFunction;
use crate::error::Result;
use crate::math::volume::{Shape, Volume};

/// Applies one element-wise activation. The shape is unchanged.
#[derive(Debug, Clone)]
pub struct NonlinearityLayer {
    shape: Shape,
    function: ActivationFunction,
}

impl NonlinearityLayer {
    pub fn new(shape: Shape, function: ActivationFunction) -> NonlinearityLayer {
        NonlinearityLayer { shape, function }
    }

    pub fn out_shape(&self) -> Shape {
        self.shape
    }

    pub fn function(&self) -> ActivationFunction {
        self.function
    }

    pub fn forward(&self, input: &Volume) -> Volume {
        let mut out = input.clone_values();
        for v in out.values_mut() {
            *v = self.function.function(*v);
        }
        out
    }

    /// `dx = f'(y) * dy`, with the derivative taken from the stored output.
    pub fn backward(&self, input: &mut Volume, output: &Volume) -> Result<()> {
        input.zero_gradients();
        let pairs = output.values().iter().zip(output.gradients());
        for (dx, (&y, &dy)) in input.gradients_mut().iter_mut().zip(pairs) {
            *dx = self.function.derivative(y) * dy;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relu_blocks_gradient_of_dead_units() {
        let layer = NonlinearityLayer::new(Shape::flat(3), ActivationFunction::ReLU);
        let mut x = Volume::from_values(vec![-1.0, 0.0, 2.0]);
        let mut out = layer.forward(&x);
        assert_eq!(out.values(), &[0.0, 0.0, 2.0]);

        out.gradients_mut().copy_from_slice(&[1.0, 1.0, 3.0]);
        layer.backward(&mut x, &out).unwrap();
        assert_eq!(x.gradients(), &[0.0, 0.0, 3.0]);
    }

    #[test]
    fn sigmoid_backward_uses_output() {
        let layer = NonlinearityLayer::new(Shape::flat(1), ActivationFunction::Sigmoid);
        let mut x = Volume::from_values(vec![0.0]);
        let mut out = layer.forward(&x);
        assert_eq!(out.values(), &[0.5]);
        out.gradients_mut()[0] = 2.0;
        layer.backward(&mut x, &out).unwrap();
        assert!((x.gradients()[0] - 0.5).abs() < 1e-12);
    }
}
