//! Compute module - Numerical stepping for Grey-Scott.

mod display;
mod engine;
mod grid;
mod propagator;
mod reaction;
mod simulation;
mod stats;
mod sync;

pub mod gpu;

pub use display::*;
pub use engine::*;
pub use grid::*;
pub use propagator::*;
pub use reaction::*;
pub use simulation::*;
pub use stats::*;
pub use sync::*;
