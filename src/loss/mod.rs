pub mod regression;
pub mod softmax;
pub mod svm;
pub mod target;

pub use regression::RegressionLayer;
pub use softmax::SoftmaxLayer;
pub use svm::SvmLayer;
pub use target::Target;
