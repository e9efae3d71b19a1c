pub mod augment;
pub mod volume;

pub use augment::{augment, random_augment};
pub use volume::{Shape, Volume};
