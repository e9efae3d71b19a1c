pub mod brain;
pub mod experience;
pub mod options;
pub mod window;

pub use brain::{Brain, Phase, Policy};
pub use experience::{Experience, ExperienceReplay};
pub use options::BrainOptions;
pub use window::Window;
