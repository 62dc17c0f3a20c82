//! Schema module - Configuration, parameters, and seeding for simulations.

mod config;
mod params;
mod seed;

pub use config::*;
pub use params::*;
pub use seed::*;
