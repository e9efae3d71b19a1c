use crate::error::{NetError, Result};
use crate::layers::convolution::output_size;
use crate::math::volume::{Shape, Volume};
use crate::network::spec::PoolingSpec;

/// Max pooling over `sx × sy` windows, per depth channel.
///
/// Forward remembers which input cell won each window so that backward can
/// hand the whole gradient to it.
#[derive(Debug, Clone)]
pub struct PoolingLayer {
    in_shape: Shape,
    out_shape: Shape,
    sx: usize,
    sy: usize,
    stride: usize,
    pad: usize,
    /// Winning input (x, y) per output cell, by output index.
    switches: Option<Vec<Option<(usize, usize)>>>,
}

impl PoolingLayer {
    pub fn new(in_shape: Shape, spec: &PoolingSpec) -> Result<PoolingLayer> {
        let (sx, sy) = (spec.sx, spec.window_height());
        if spec.stride == 0 {
            return Err(NetError::DivisionByZero("pooling stride"));
        }
        if spec.pad >= sx || spec.pad >= sy {
            return Err(NetError::invalid_option(
                "pad",
                format!("padding {} leaves {sx}x{sy} windows entirely outside the input", spec.pad),
            ));
        }
        let out_w = output_size(in_shape.width, sx, spec.stride, spec.pad);
        let out_h = output_size(in_shape.height, sy, spec.stride, spec.pad);
        let (Some(out_w), Some(out_h)) = (out_w, out_h) else {
            return Err(NetError::invalid_option(
                "sx",
                format!("a {sx}x{sy} window does not fit a {in_shape} input"),
            ));
        };

        Ok(PoolingLayer {
            in_shape,
            out_shape: Shape::new(out_w, out_h, in_shape.depth),
            sx,
            sy,
            stride: spec.stride,
            pad: spec.pad,
            switches: None,
        })
    }

    pub fn out_shape(&self) -> Shape {
        self.out_shape
    }

    pub fn forward(&mut self, input: &Volume) -> Result<Volume> {
        if input.shape() != self.in_shape {
            return Err(NetError::ShapeMismatch {
                context: "pooling input",
                expected: self.in_shape,
                actual: input.shape(),
            });
        }

        let mut out = Volume::zeros(self.out_shape);
        let mut switches = vec![None; self.out_shape.len()];

        for d in 0..self.out_shape.depth {
            for ax in 0..self.out_shape.width {
                let x = (ax * self.stride) as isize - self.pad as isize;
                for ay in 0..self.out_shape.height {
                    let y = (ay * self.stride) as isize - self.pad as isize;

                    let mut best = f64::NEG_INFINITY;
                    let mut winner = None;
                    for fx in 0..self.sx {
                        for fy in 0..self.sy {
                            let (ox, oy) = (x + fx as isize, y + fy as isize);
                            if ox < 0 || oy < 0 {
                                continue;
                            }
                            let (ox, oy) = (ox as usize, oy as usize);
                            if ox >= self.in_shape.width || oy >= self.in_shape.height {
                                continue;
                            }
                            let v = input.get(ox, oy, d)?;
                            if winner.is_none() || v > best {
                                best = v;
                                winner = Some((ox, oy));
                            }
                        }
                    }

                    let ix = out.index(ax, ay, d)?;
                    switches[ix] = winner;
                    out.values_mut()[ix] = if winner.is_some() { best } else { 0.0 };
                }
            }
        }

        self.switches = Some(switches);
        Ok(out)
    }

    pub fn backward(&mut self, input: &mut Volume, output: &Volume) -> Result<()> {
        let switches = self
            .switches
            .as_ref()
            .ok_or(NetError::NotForwarded { layer: "pooling" })?;

        input.zero_gradients();
        for d in 0..self.out_shape.depth {
            for ax in 0..self.out_shape.width {
                for ay in 0..self.out_shape.height {
                    let ix = output.index(ax, ay, d)?;
                    if let Some((wx, wy)) = switches[ix] {
                        input.add_grad(wx, wy, d, output.gradients()[ix])?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Winning input cell per output cell from the last forward pass.
    pub fn switches(&self) -> Option<&[Option<(usize, usize)>]> {
        self.switches.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> Volume {
        #[rustfmt::skip]
        let values = vec![
            1.0, 5.0, 2.0, 0.0,
            3.0, 4.0, 8.0, 1.0,
            0.0, 0.0, 1.0, 1.0,
            9.0, 2.0, 1.0, 7.0,
        ];
        Volume::with_values(Shape::new(4, 4, 1), values).unwrap()
    }

    #[test]
    fn forward_takes_window_maxima() {
        let mut pool = PoolingLayer::new(Shape::new(4, 4, 1), &PoolingSpec::new(2)).unwrap();
        let out = pool.forward(&input()).unwrap();
        assert_eq!(out.shape(), Shape::new(2, 2, 1));
        assert_eq!(out.values(), &[5.0, 8.0, 9.0, 7.0]);
        assert_eq!(pool.switches().unwrap()[0], Some((1, 0)));
        assert_eq!(pool.switches().unwrap()[3], Some((3, 3)));
    }

    #[test]
    fn backward_routes_everything_to_the_winner() {
        let mut pool = PoolingLayer::new(Shape::new(4, 4, 1), &PoolingSpec::new(2)).unwrap();
        let mut x = input();
        let mut out = pool.forward(&x).unwrap();
        out.gradients_mut().copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        pool.backward(&mut x, &out).unwrap();

        let mut expected = vec![0.0; 16];
        expected[1] = 1.0; // (1, 0)
        expected[6] = 2.0; // (2, 1)
        expected[12] = 3.0; // (0, 3)
        expected[15] = 4.0; // (3, 3)
        assert_eq!(x.gradients(), expected.as_slice());
    }

    #[test]
    fn backward_requires_forward() {
        let mut pool = PoolingLayer::new(Shape::new(4, 4, 1), &PoolingSpec::new(2)).unwrap();
        let mut x = input();
        let out = Volume::zeros(pool.out_shape());
        assert_eq!(
            pool.backward(&mut x, &out),
            Err(NetError::NotForwarded { layer: "pooling" })
        );
    }
}
