use rand::Rng;

use crate::error::{NetError, Result};
use crate::layers::ParamsAndGrads;
use crate::math::volume::{Shape, Volume};
use crate::network::spec::FullyConnectedSpec;

/// Every output neuron is a dot product with the whole input plus a bias.
#[derive(Debug, Clone)]
pub struct FullyConnectedLayer {
    in_shape: Shape,
    /// One 1×1×num_inputs filter per output neuron.
    filters: Vec<Volume>,
    biases: Volume,
    l1_decay_mul: f64,
    l2_decay_mul: f64,
}

impl FullyConnectedLayer {
    pub fn new(in_shape: Shape, spec: &FullyConnectedSpec, rng: &mut impl Rng) -> Result<FullyConnectedLayer> {
        if spec.num_neurons == 0 {
            return Err(NetError::invalid_option("num_neurons", "must be at least 1"));
        }
        let filters = (0..spec.num_neurons)
            .map(|_| Volume::gaussian(Shape::flat(in_shape.len()), rng))
            .collect::<Result<Vec<_>>>()?;

        Ok(FullyConnectedLayer {
            in_shape,
            filters,
            biases: Volume::filled(Shape::flat(spec.num_neurons), spec.bias_pref),
            l1_decay_mul: spec.l1_decay_mul,
            l2_decay_mul: spec.l2_decay_mul,
        })
    }

    pub fn out_shape(&self) -> Shape {
        Shape::flat(self.filters.len())
    }

    pub fn filters(&self) -> &[Volume] {
        &self.filters
    }

    pub fn biases(&self) -> &Volume {
        &self.biases
    }

    pub fn forward(&self, input: &Volume) -> Result<Volume> {
        if input.len() != self.in_shape.len() {
            return Err(NetError::ShapeMismatch {
                context: "fully-connected input",
                expected: self.in_shape,
                actual: input.shape(),
            });
        }

        let x = input.values();
        let mut out = Volume::zeros(self.out_shape());
        for (i, (o, filter)) in out.values_mut().iter_mut().zip(&self.filters).enumerate() {
            let a: f64 = x.iter().zip(filter.values()).map(|(xi, wi)| xi * wi).sum();
            *o = a + self.biases.values()[i];
        }
        Ok(out)
    }

    pub fn backward(&mut self, input: &mut Volume, output: &Volume) {
        input.zero_gradients();
        let (x, dx) = input.split_mut();

        for (i, filter) in self.filters.iter_mut().enumerate() {
            let chain_grad = output.gradients()[i];
            let (w, dw) = filter.split_mut();
            for d in 0..x.len() {
                dx[d] += w[d] * chain_grad;
                dw[d] += x[d] * chain_grad;
            }
            self.biases.gradients_mut()[i] += chain_grad;
        }
    }

    pub fn params_and_grads(&mut self) -> Vec<ParamsAndGrads<'_>> {
        let (l1, l2) = (self.l1_decay_mul, self.l2_decay_mul);
        let mut list: Vec<ParamsAndGrads<'_>> = self
            .filters
            .iter_mut()
            .map(|volume| ParamsAndGrads::new(volume, l1, l2))
            .collect();
        list.push(ParamsAndGrads::new(&mut self.biases, 0.0, 0.0));
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn layer() -> FullyConnectedLayer {
        let mut rng = StdRng::seed_from_u64(1);
        let mut fc = FullyConnectedLayer::new(Shape::flat(2), &FullyConnectedSpec::new(2), &mut rng).unwrap();
        fc.filters[0].values_mut().copy_from_slice(&[1.0, 2.0]);
        fc.filters[1].values_mut().copy_from_slice(&[-1.0, 0.5]);
        fc.biases.values_mut().copy_from_slice(&[0.5, 0.0]);
        fc
    }

    #[test]
    fn forward_is_dot_plus_bias() {
        let fc = layer();
        let out = fc.forward(&Volume::from_values(vec![3.0, -1.0])).unwrap();
        assert_eq!(out.values(), &[1.5, -3.5]);
    }

    #[test]
    fn backward_accumulates_parameter_gradients() {
        let mut fc = layer();
        let mut x = Volume::from_values(vec![3.0, -1.0]);
        let mut out = fc.forward(&x).unwrap();
        out.gradients_mut().copy_from_slice(&[1.0, 2.0]);

        fc.backward(&mut x, &out);
        assert_eq!(x.gradients(), &[1.0 * 1.0 + -1.0 * 2.0, 2.0 * 1.0 + 0.5 * 2.0]);
        assert_eq!(fc.filters[0].gradients(), &[3.0, -1.0]);
        assert_eq!(fc.filters[1].gradients(), &[6.0, -2.0]);

        // input gradients reset, parameter gradients keep accumulating
        fc.backward(&mut x, &out);
        assert_eq!(x.gradients(), &[-1.0, 3.0]);
        assert_eq!(fc.filters[0].gradients(), &[6.0, -2.0]);
        assert_eq!(fc.biases.gradients(), &[2.0, 4.0]);
    }

    #[test]
    fn biases_are_not_decayed() {
        let mut fc = layer();
        let params = fc.params_and_grads();
        assert_eq!(params.len(), 3);
        assert_eq!(params[0].l2_decay_mul, 1.0);
        assert_eq!(params[2].l1_decay_mul, 0.0);
        assert_eq!(params[2].l2_decay_mul, 0.0);
    }
}
