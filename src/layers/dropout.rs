use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{NetError, Result};
use crate::math::volume::{Shape, Volume};

/// Randomly silences units while training.
///
/// Training zeroes each unit with probability `drop_prob` and leaves the
/// survivors untouched; inference keeps every unit and scales it by
/// `1 - drop_prob`, so both modes agree in expectation.
#[derive(Debug, Clone)]
pub struct DropoutLayer {
    shape: Shape,
    drop_prob: f64,
    rng: StdRng,
    /// Per-unit multiplier applied by the last forward pass.
    mask: Option<Vec<f64>>,
}

impl DropoutLayer {
    pub fn new(shape: Shape, drop_prob: f64, rng: &mut impl Rng) -> Result<DropoutLayer> {
        if !(0.0..1.0).contains(&drop_prob) {
            return Err(NetError::invalid_option(
                "drop_prob",
                format!("{drop_prob} is outside [0, 1)"),
            ));
        }
        Ok(DropoutLayer {
            shape,
            drop_prob,
            rng: StdRng::seed_from_u64(rng.gen()),
            mask: None,
        })
    }

    pub fn out_shape(&self) -> Shape {
        self.shape
    }

    pub fn drop_prob(&self) -> f64 {
        self.drop_prob
    }

    pub fn forward(&mut self, input: &Volume, is_training: bool) -> Volume {
        let mask: Vec<f64> = if is_training {
            (0..input.len())
                .map(|_| if self.rng.gen::<f64>() < self.drop_prob { 0.0 } else { 1.0 })
                .collect()
        } else {
            vec![1.0 - self.drop_prob; input.len()]
        };

        let mut out = input.clone_values();
        for (v, m) in out.values_mut().iter_mut().zip(&mask) {
            *v *= m;
        }
        self.mask = Some(mask);
        out
    }

    /// Gradient flows only through the units that survived.
    pub fn backward(&mut self, input: &mut Volume, output: &Volume) -> Result<()> {
        let mask = self
            .mask
            .as_ref()
            .ok_or(NetError::NotForwarded { layer: "dropout" })?;

        input.zero_gradients();
        for ((dx, &dy), m) in input.gradients_mut().iter_mut().zip(output.gradients()).zip(mask) {
            *dx = dy * m;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inference_scales_by_keep_probability() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut layer = DropoutLayer::new(Shape::flat(3), 0.25, &mut rng).unwrap();
        let out = layer.forward(&Volume::from_values(vec![4.0, -8.0, 0.0]), false);
        assert_eq!(out.values(), &[3.0, -6.0, 0.0]);
    }

    #[test]
    fn dropped_units_get_no_gradient() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut layer = DropoutLayer::new(Shape::flat(64), 0.5, &mut rng).unwrap();
        let mut x = Volume::filled(Shape::flat(64), 1.0);
        let mut out = layer.forward(&x, true);
        out.gradients_mut().iter_mut().for_each(|g| *g = 1.0);
        layer.backward(&mut x, &out).unwrap();

        for (v, g) in out.values().iter().zip(x.gradients()) {
            assert_eq!(v, g);
        }
        let dropped = out.values().iter().filter(|&&v| v == 0.0).count();
        assert!(dropped > 0 && dropped < 64);
    }

    #[test]
    fn drop_prob_must_be_a_probability() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(DropoutLayer::new(Shape::flat(1), 1.0, &mut rng).is_err());
        assert!(DropoutLayer::new(Shape::flat(1), -0.1, &mut rng).is_err());
    }
}
