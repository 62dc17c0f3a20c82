//! Grey-Scott - Two-species reaction-diffusion on a periodic grid.
//!
//! This crate provides the compute core of a Grey-Scott simulator: a CPU
//! reference engine, a WebGPU engine with optional zero-copy presentation,
//! and the machinery to switch between them at runtime without losing state.
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: Configuration, parameters, presets and seeding
//! - `compute`: Integration rule, engines, state transfer and the session facade
//!
//! # Example
//!
//! ```rust,no_run
//! use grey_scott::{
//!     compute::Simulation,
//!     schema::{BackendPreference, SimulationConfig},
//! };
//!
//! let config = SimulationConfig {
//!     width: 256,
//!     height: 256,
//!     backend: BackendPreference::Cpu,
//!     ..Default::default()
//! };
//!
//! let mut sim = Simulation::new(&config).unwrap();
//! sim.load_preset(2);
//! sim.run(100);
//!
//! println!("Active cells after 100 steps: {}", sim.stats().active_cells);
//! ```

pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use compute::{BackendMode, CpuPropagator, Simulation, SimulationError, SimulationStats};
pub use schema::{Preset, SimulationConfig, SimulationParams};
