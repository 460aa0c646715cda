pub mod layer;
pub mod levels;

pub use layer::*;
pub use levels::*;
