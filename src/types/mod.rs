pub mod direction;
pub mod position;
pub mod simulation;

pub use direction::*;
pub use position::*;
pub use simulation::*;
