use std::fmt;

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::error::{NetError, Result};

/// Width × height × depth of a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    pub width: usize,
    pub height: usize,
    pub depth: usize,
}

impl Shape {
    pub const fn new(width: usize, height: usize, depth: usize) -> Shape {
        Shape { width, height, depth }
    }

    /// A 1×1×depth shape, the layout of every flat vector.
    pub const fn flat(depth: usize) -> Shape {
        Shape::new(1, 1, depth)
    }

    pub fn len(&self) -> usize {
        self.width * self.height * self.depth
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.depth)
    }
}

/// A dense 3D block of numbers with a gradient buffer of the same size.
///
/// Holds activations, filters, biases and the gradients with respect to all
/// of them. Storage is row-major with depth fastest:
/// `index(x, y, d) = (width * y + x) * depth + d`.
///
/// Both buffers are only handed out as slices so their length always stays
/// equal to `shape.len()`.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    shape: Shape,
    values: Vec<f64>,
    gradients: Vec<f64>,
}

impl Volume {
    pub fn zeros(shape: Shape) -> Volume {
        Volume::filled(shape, 0.0)
    }

    pub fn filled(shape: Shape, fill: f64) -> Volume {
        let n = shape.len();
        Volume {
            shape,
            values: vec![fill; n],
            gradients: vec![0.0; n],
        }
    }

    /// Wraps a flat vector as a 1×1×N volume.
    pub fn from_values(values: Vec<f64>) -> Volume {
        let n = values.len();
        Volume {
            shape: Shape::flat(n),
            values,
            gradients: vec![0.0; n],
        }
    }

    pub fn with_values(shape: Shape, values: Vec<f64>) -> Result<Volume> {
        if values.len() != shape.len() {
            return Err(NetError::ShapeMismatch {
                context: "volume construction",
                expected: shape,
                actual: Shape::flat(values.len()),
            });
        }
        let n = values.len();
        Ok(Volume {
            shape,
            values,
            gradients: vec![0.0; n],
        })
    }

    /// Samples every value from N(0, sqrt(1 / n)) where n = w·h·d.
    ///
    /// Scaling by the fan-in keeps the output variance of a neuron roughly
    /// independent of how many inputs it has.
    pub fn gaussian(shape: Shape, rng: &mut impl Rng) -> Result<Volume> {
        let n = shape.len();
        if n == 0 {
            return Err(NetError::DivisionByZero("gaussian volume initialization"));
        }
        let std_dev = (1.0 / n as f64).sqrt();
        let normal = Normal::new(0.0, std_dev)
            .map_err(|e| NetError::invalid_option("std_dev", e.to_string()))?;
        let values = (0..n).map(|_| normal.sample(rng)).collect();
        Ok(Volume {
            shape,
            values,
            gradients: vec![0.0; n],
        })
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn width(&self) -> usize {
        self.shape.width
    }

    pub fn height(&self) -> usize {
        self.shape.height
    }

    pub fn depth(&self) -> usize {
        self.shape.depth
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    pub fn gradients(&self) -> &[f64] {
        &self.gradients
    }

    pub fn gradients_mut(&mut self) -> &mut [f64] {
        &mut self.gradients
    }

    /// Mutable access to both buffers at once.
    pub fn split_mut(&mut self) -> (&mut [f64], &mut [f64]) {
        (&mut self.values, &mut self.gradients)
    }

    /// Flat offset of `(x, y, d)`, or `OutOfRange`.
    pub fn index(&self, x: usize, y: usize, d: usize) -> Result<usize> {
        let Shape { width, height, depth } = self.shape;
        if x >= width || y >= height || d >= depth {
            return Err(NetError::OutOfRange { x, y, d, shape: self.shape });
        }
        Ok((width * y + x) * depth + d)
    }

    pub fn get(&self, x: usize, y: usize, d: usize) -> Result<f64> {
        Ok(self.values[self.index(x, y, d)?])
    }

    pub fn set(&mut self, x: usize, y: usize, d: usize, v: f64) -> Result<()> {
        let ix = self.index(x, y, d)?;
        self.values[ix] = v;
        Ok(())
    }

    pub fn add(&mut self, x: usize, y: usize, d: usize, v: f64) -> Result<()> {
        let ix = self.index(x, y, d)?;
        self.values[ix] += v;
        Ok(())
    }

    pub fn get_grad(&self, x: usize, y: usize, d: usize) -> Result<f64> {
        Ok(self.gradients[self.index(x, y, d)?])
    }

    pub fn set_grad(&mut self, x: usize, y: usize, d: usize, v: f64) -> Result<()> {
        let ix = self.index(x, y, d)?;
        self.gradients[ix] = v;
        Ok(())
    }

    pub fn add_grad(&mut self, x: usize, y: usize, d: usize, v: f64) -> Result<()> {
        let ix = self.index(x, y, d)?;
        self.gradients[ix] += v;
        Ok(())
    }

    /// Same shape and values, zeroed gradients.
    pub fn clone_values(&self) -> Volume {
        Volume {
            shape: self.shape,
            values: self.values.clone(),
            gradients: vec![0.0; self.values.len()],
        }
    }

    /// Same shape, everything zero.
    pub fn clone_and_zero(&self) -> Volume {
        Volume::zeros(self.shape)
    }

    pub fn add_from(&mut self, other: &Volume) -> Result<()> {
        self.add_from_scaled(other, 1.0)
    }

    pub fn add_from_scaled(&mut self, other: &Volume, a: f64) -> Result<()> {
        if other.shape != self.shape {
            return Err(NetError::ShapeMismatch {
                context: "volume addition",
                expected: self.shape,
                actual: other.shape,
            });
        }
        for (v, o) in self.values.iter_mut().zip(&other.values) {
            *v += a * o;
        }
        Ok(())
    }

    pub fn set_const(&mut self, fill: f64) {
        self.values.iter_mut().for_each(|v| *v = fill);
    }

    pub fn zero_gradients(&mut self) {
        self.gradients.iter_mut().for_each(|g| *g = 0.0);
    }

    /// Index of the largest value; ties resolve to the lowest index.
    pub fn argmax(&self) -> Option<usize> {
        argmax(&self.values)
    }
}

/// Index of the maximum element in a slice.
pub(crate) fn argmax(v: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &x) in v.iter().enumerate() {
        match best {
            Some((_, b)) if x <= b => {}
            _ => best = Some((i, x)),
        }
    }
    best.map(|(i, _)| i)
}
