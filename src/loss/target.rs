/// What a loss layer is asked to reproduce for one example.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// Class index, for softmax and SVM outputs.
    Class(usize),
    /// One value per regression output.
    Values(Vec<f64>),
    /// A single regressed value; only the first output receives gradient.
    Scalar(f64),
    /// Regress only output `dim` towards `value`; every other output gets
    /// zero gradient.
    Dimension { dim: usize, value: f64 },
}

impl Target {
    pub fn kind(&self) -> &'static str {
        match self {
            Target::Class(_) => "class",
            Target::Values(_) => "vector",
            Target::Scalar(_) => "scalar",
            Target::Dimension { .. } => "dimension",
        }
    }

    pub fn is_classification(&self) -> bool {
        matches!(self, Target::Class(_))
    }
}

impl From<usize> for Target {
    fn from(class: usize) -> Self {
        Target::Class(class)
    }
}

impl From<Vec<f64>> for Target {
    fn from(values: Vec<f64>) -> Self {
        Target::Values(values)
    }
}

impl From<f64> for Target {
    fn from(value: f64) -> Self {
        Target::Scalar(value)
    }
}
