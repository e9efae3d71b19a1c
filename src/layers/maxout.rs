use crate::error::{NetError, Result};
use crate::math::volume::{Shape, Volume};

/// Max over consecutive groups of `group_size` depth channels.
///
/// Trailing channels that do not fill a whole group are ignored.
#[derive(Debug, Clone)]
pub struct MaxoutLayer {
    in_shape: Shape,
    group_size: usize,
    /// Winning input depth per output cell, by output index.
    switches: Option<Vec<usize>>,
}

impl MaxoutLayer {
    pub fn new(in_shape: Shape, group_size: usize) -> Result<MaxoutLayer> {
        if group_size == 0 {
            return Err(NetError::DivisionByZero("maxout group size"));
        }
        if in_shape.depth < group_size {
            return Err(NetError::invalid_option(
                "group_size",
                format!("group of {group_size} does not fit input depth {}", in_shape.depth),
            ));
        }
        Ok(MaxoutLayer {
            in_shape,
            group_size,
            switches: None,
        })
    }

    pub fn out_shape(&self) -> Shape {
        Shape::new(
            self.in_shape.width,
            self.in_shape.height,
            self.in_shape.depth / self.group_size,
        )
    }

    pub fn group_size(&self) -> usize {
        self.group_size
    }

    pub fn forward(&mut self, input: &Volume) -> Result<Volume> {
        if input.shape() != self.in_shape {
            return Err(NetError::ShapeMismatch {
                context: "maxout input",
                expected: self.in_shape,
                actual: input.shape(),
            });
        }

        let out_shape = self.out_shape();
        let mut out = Volume::zeros(out_shape);
        let mut switches = vec![0; out_shape.len()];

        for x in 0..out_shape.width {
            for y in 0..out_shape.height {
                for i in 0..out_shape.depth {
                    let first = i * self.group_size;
                    let mut winner = first;
                    let mut best = input.get(x, y, first)?;
                    for d in first + 1..first + self.group_size {
                        let v = input.get(x, y, d)?;
                        if v > best {
                            best = v;
                            winner = d;
                        }
                    }
                    let ix = out.index(x, y, i)?;
                    out.values_mut()[ix] = best;
                    switches[ix] = winner;
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
            .ok_or(NetError::NotForwarded { layer: "maxout" })?;

        input.zero_gradients();
        let out_shape = self.out_shape();
        for x in 0..out_shape.width {
            for y in 0..out_shape.height {
                for i in 0..out_shape.depth {
                    let ix = output.index(x, y, i)?;
                    input.add_grad(x, y, switches[ix], output.gradients()[ix])?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_reduce_depth() {
        let mut layer = MaxoutLayer::new(Shape::flat(5), 2).unwrap();
        assert_eq!(layer.out_shape(), Shape::flat(2));

        let mut x = Volume::from_values(vec![1.0, 3.0, -2.0, -5.0, 9.0]);
        let mut out = layer.forward(&x).unwrap();
        assert_eq!(out.values(), &[3.0, -2.0]);

        out.gradients_mut().copy_from_slice(&[1.0, 2.0]);
        layer.backward(&mut x, &out).unwrap();
        assert_eq!(x.gradients(), &[0.0, 1.0, 2.0, 0.0, 0.0]);
    }

    #[test]
    fn zero_group_size_is_rejected() {
        assert!(matches!(
            MaxoutLayer::new(Shape::flat(4), 0),
            Err(NetError::DivisionByZero(_))
        ));
    }
}
