use rand::Rng;

use crate::error::{NetError, Result};
use crate::layers::ParamsAndGrads;
use crate::math::volume::{Shape, Volume};
use crate::network::spec::ConvolutionSpec;

/// Spatial convolution: each output channel slides one shared `sx × sy ×
/// in_depth` kernel over the input.
///
/// Zero padding is implicit; taps that land outside the input are skipped.
#[derive(Debug, Clone)]
pub struct ConvolutionLayer {
    in_shape: Shape,
    out_shape: Shape,
    stride: usize,
    pad: usize,
    filters: Vec<Volume>,
    biases: Volume,
    l1_decay_mul: f64,
    l2_decay_mul: f64,
}

/// `floor((in + 2·pad - kernel) / stride) + 1`, or `None` when the kernel
/// does not fit in the padded input.
pub fn output_size(input: usize, kernel: usize, stride: usize, pad: usize) -> Option<usize> {
    let padded = input + 2 * pad;
    if kernel == 0 || stride == 0 || padded < kernel {
        return None;
    }
    Some((padded - kernel) / stride + 1)
}

/// Calls `f(input_index, kernel_index)` for every tap of output cell
/// `(ax, ay)` that lands inside the input.
fn taps(
    (in_shape, stride, pad): (Shape, usize, usize),
    kernel: Shape,
    ax: usize,
    ay: usize,
    mut f: impl FnMut(usize, usize),
) {
    let Shape { width, height, depth } = in_shape;
    let x0 = (ax * stride) as isize - pad as isize;
    let y0 = (ay * stride) as isize - pad as isize;

    for fy in 0..kernel.height {
        let oy = y0 + fy as isize;
        if oy < 0 || oy >= height as isize {
            continue;
        }
        for fx in 0..kernel.width {
            let ox = x0 + fx as isize;
            if ox < 0 || ox >= width as isize {
                continue;
            }
            let base_in = (width * oy as usize + ox as usize) * depth;
            let base_k = (kernel.width * fy + fx) * kernel.depth;
            for fd in 0..kernel.depth {
                f(base_in + fd, base_k + fd);
            }
        }
    }
}

impl ConvolutionLayer {
    pub fn new(in_shape: Shape, spec: &ConvolutionSpec, rng: &mut impl Rng) -> Result<ConvolutionLayer> {
        let (sx, sy) = (spec.sx, spec.kernel_height());
        if spec.filters == 0 {
            return Err(NetError::invalid_option("filters", "must be at least 1"));
        }
        if spec.stride == 0 {
            return Err(NetError::DivisionByZero("convolution stride"));
        }
        let out_w = output_size(in_shape.width, sx, spec.stride, spec.pad);
        let out_h = output_size(in_shape.height, sy, spec.stride, spec.pad);
        let (Some(out_w), Some(out_h)) = (out_w, out_h) else {
            return Err(NetError::invalid_option(
                "sx",
                format!("a {sx}x{sy} kernel does not fit a {in_shape} input with pad {}", spec.pad),
            ));
        };

        let filters = (0..spec.filters)
            .map(|_| Volume::gaussian(Shape::new(sx, sy, in_shape.depth), rng))
            .collect::<Result<Vec<_>>>()?;

        Ok(ConvolutionLayer {
            in_shape,
            out_shape: Shape::new(out_w, out_h, spec.filters),
            stride: spec.stride,
            pad: spec.pad,
            filters,
            biases: Volume::filled(Shape::flat(spec.filters), spec.bias_pref),
            l1_decay_mul: spec.l1_decay_mul,
            l2_decay_mul: spec.l2_decay_mul,
        })
    }

    pub fn out_shape(&self) -> Shape {
        self.out_shape
    }

    pub fn filters(&self) -> &[Volume] {
        &self.filters
    }

    pub fn biases(&self) -> &Volume {
        &self.biases
    }

    pub fn forward(&self, input: &Volume) -> Result<Volume> {
        if input.shape() != self.in_shape {
            return Err(NetError::ShapeMismatch {
                context: "convolution input",
                expected: self.in_shape,
                actual: input.shape(),
            });
        }

        let x = input.values();
        let mut out = Volume::zeros(self.out_shape);
        for (d, filter) in self.filters.iter().enumerate() {
            let w = filter.values();
            for ay in 0..self.out_shape.height {
                for ax in 0..self.out_shape.width {
                    let mut a = 0.0;
                    self.for_each_tap(filter.shape(), ax, ay, |ix, fx| a += w[fx] * x[ix]);
                    a += self.biases.values()[d];
                    out.set(ax, ay, d, a)?;
                }
            }
        }
        Ok(out)
    }

    pub fn backward(&mut self, input: &mut Volume, output: &Volume) -> Result<()> {
        input.zero_gradients();
        let (x, dx) = input.split_mut();
        let geometry = (self.in_shape, self.stride, self.pad);

        for (d, filter) in self.filters.iter_mut().enumerate() {
            let kernel = filter.shape();
            let (w, dw) = filter.split_mut();
            for ay in 0..self.out_shape.height {
                for ax in 0..self.out_shape.width {
                    let chain_grad = output.get_grad(ax, ay, d)?;
                    taps(geometry, kernel, ax, ay, |ix, fx| {
                        dw[fx] += x[ix] * chain_grad;
                        dx[ix] += w[fx] * chain_grad;
                    });
                    self.biases.gradients_mut()[d] += chain_grad;
                }
            }
        }
        Ok(())
    }

    fn for_each_tap(&self, kernel: Shape, ax: usize, ay: usize, f: impl FnMut(usize, usize)) {
        taps((self.in_shape, self.stride, self.pad), kernel, ax, ay, f)
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
