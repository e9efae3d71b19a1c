use tracing::warn;

use crate::error::{NetError, Result};
use crate::math::volume::{Shape, Volume};
use crate::network::spec::LrnSpec;

/// Local response normalization across depth:
/// `out_i = a_i / (k + alpha/n * Σ_j a_j²)^beta`, with `j` ranging over the
/// `n` channels centred on `i` (clipped at the edges).
#[derive(Debug, Clone)]
pub struct LrnLayer {
    shape: Shape,
    k: f64,
    n: usize,
    alpha: f64,
    beta: f64,
    /// `k + alpha/n * Σ a_j²` per cell from the last forward pass.
    s_cache: Option<Vec<f64>>,
}

impl LrnLayer {
    pub fn new(shape: Shape, spec: &LrnSpec) -> Result<LrnLayer> {
        if spec.n == 0 {
            return Err(NetError::DivisionByZero("local response normalization window"));
        }
        if spec.n % 2 == 0 {
            warn!(n = spec.n, "LRN window should be odd; it will be skewed towards higher channels");
        }
        Ok(LrnLayer {
            shape,
            k: spec.k,
            n: spec.n,
            alpha: spec.alpha,
            beta: spec.beta,
            s_cache: None,
        })
    }

    pub fn out_shape(&self) -> Shape {
        self.shape
    }

    fn window(&self, i: usize) -> std::ops::RangeInclusive<usize> {
        let n2 = self.n / 2;
        i.saturating_sub(n2)..=(i + n2).min(self.shape.depth - 1)
    }

    pub fn forward(&mut self, input: &Volume) -> Result<Volume> {
        if input.shape() != self.shape {
            return Err(NetError::ShapeMismatch {
                context: "local response normalization input",
                expected: self.shape,
                actual: input.shape(),
            });
        }

        let mut out = Volume::zeros(self.shape);
        let mut s_cache = vec![0.0; self.shape.len()];
        let scale = self.alpha / self.n as f64;

        for x in 0..self.shape.width {
            for y in 0..self.shape.height {
                for i in 0..self.shape.depth {
                    let mut den = 0.0;
                    for j in self.window(i) {
                        let aj = input.get(x, y, j)?;
                        den += aj * aj;
                    }
                    den = den * scale + self.k;

                    let ix = input.index(x, y, i)?;
                    s_cache[ix] = den;
                    let norm = den.powf(self.beta);
                    if norm == 0.0 {
                        return Err(NetError::DivisionByZero("local response normalization"));
                    }
                    out.values_mut()[ix] = input.values()[ix] / norm;
                }
            }
        }

        self.s_cache = Some(s_cache);
        Ok(out)
    }

    pub fn backward(&mut self, input: &mut Volume, output: &Volume) -> Result<()> {
        let s_cache = self
            .s_cache
            .as_ref()
            .ok_or(NetError::NotForwarded { layer: "local response normalization" })?;

        input.zero_gradients();
        let scale = self.alpha / self.n as f64;
        for x in 0..self.shape.width {
            for y in 0..self.shape.height {
                for i in 0..self.shape.depth {
                    let ix = input.index(x, y, i)?;
                    let chain_grad = output.gradients()[ix];
                    let s = s_cache[ix];
                    let sb = s.powf(self.beta);
                    let sb2 = sb * sb;
                    let ai = input.values()[ix];

                    for j in self.window(i) {
                        let aj = input.get(x, y, j)?;
                        let mut g = -ai * self.beta * s.powf(self.beta - 1.0) * scale * 2.0 * aj;
                        if j == i {
                            g += sb;
                        }
                        input.add_grad(x, y, j, g / sb2 * chain_grad)?;
                    }
                }
            }
        }
        Ok(())
    }
}
