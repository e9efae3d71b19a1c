use std::collections::VecDeque;

/// Rolling mean over the last `size` values.
#[derive(Debug, Clone)]
pub struct Window {
    values: VecDeque<f64>,
    size: usize,
    min_size: usize,
    sum: f64,
}

impl Window {
    pub fn new(size: usize, min_size: usize) -> Window {
        Window {
            values: VecDeque::with_capacity(size + 1),
            size,
            min_size,
            sum: 0.0,
        }
    }

    pub fn add(&mut self, x: f64) {
        self.values.push_back(x);
        self.sum += x;
        if self.values.len() > self.size {
            if let Some(old) = self.values.pop_front() {
                self.sum -= old;
            }
        }
    }

    /// `None` until at least `min_size` values have been added.
    pub fn average(&self) -> Option<f64> {
        if self.values.is_empty() || self.values.len() < self.min_size {
            return None;
        }
        Some(self.sum / self.values.len() as f64)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn reset(&mut self) {
        self.values.clear();
        self.sum = 0.0;
    }
}
