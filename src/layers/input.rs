use crate::error::{NetError, Result};
use crate::math::volume::{Shape, Volume};

/// Entry point of every network. Passes its input through unchanged after
/// checking it has the declared shape.
#[derive(Debug, Clone)]
pub struct InputLayer {
    shape: Shape,
}

impl InputLayer {
    pub fn new(shape: Shape) -> Result<InputLayer> {
        if shape.is_empty() {
            return Err(NetError::invalid_option("depth", format!("input shape {shape} holds no values")));
        }
        Ok(InputLayer { shape })
    }

    pub fn out_shape(&self) -> Shape {
        self.shape
    }

    pub fn forward(&self, input: &Volume) -> Result<Volume> {
        if input.shape() != self.shape {
            return Err(NetError::ShapeMismatch {
                context: "network input",
                expected: self.shape,
                actual: input.shape(),
            });
        }
        Ok(input.clone_values())
    }

    pub fn backward(&self, input: &mut Volume, output: &Volume) {
        input.gradients_mut().copy_from_slice(output.gradients());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_the_wrong_shape() {
        let layer = InputLayer::new(Shape::new(2, 2, 1)).unwrap();
        let err = layer.forward(&Volume::from_values(vec![0.0; 4])).unwrap_err();
        assert!(matches!(err, NetError::ShapeMismatch { .. }));
    }

    #[test]
    fn backward_copies_output_gradient() {
        let layer = InputLayer::new(Shape::flat(2)).unwrap();
        let mut x = Volume::from_values(vec![1.0, 2.0]);
        let mut out = layer.forward(&x).unwrap();
        assert_eq!(out.values(), x.values());
        out.gradients_mut().copy_from_slice(&[0.5, -0.5]);
        layer.backward(&mut x, &out);
        assert_eq!(x.gradients(), &[0.5, -0.5]);
    }
}
