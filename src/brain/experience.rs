use rand::Rng;

/// One transition: in `state0` the agent took `action0`, received
/// `reward0` and ended up in `state1`. States are full value-network inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct Experience {
    pub state0: Vec<f64>,
    pub action0: usize,
    pub reward0: f64,
    pub state1: Vec<f64>,
}

/// Fixed-capacity replay memory.
///
/// Fills up in order; once full, each new experience overwrites a uniformly
/// chosen existing slot rather than the oldest one.
#[derive(Debug, Clone)]
pub struct ExperienceReplay {
    entries: Vec<Experience>,
    capacity: usize,
}

impl ExperienceReplay {
    pub fn new(capacity: usize) -> ExperienceReplay {
        ExperienceReplay {
            entries: Vec::new(),
            capacity,
        }
    }

    pub fn push(&mut self, experience: Experience, rng: &mut impl Rng) {
        if self.entries.len() < self.capacity {
            self.entries.push(experience);
        } else if self.capacity > 0 {
            let slot = rng.gen_range(0..self.capacity);
            self.entries[slot] = experience;
        }
    }

    /// A uniformly chosen stored experience, `None` when empty.
    pub fn sample(&self, rng: &mut impl Rng) -> Option<&Experience> {
        if self.entries.is_empty() {
            return None;
        }
        self.entries.get(rng.gen_range(0..self.entries.len()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Experience> {
        self.entries.iter()
    }
}
