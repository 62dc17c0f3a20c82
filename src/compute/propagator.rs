//! CPU Propagator - Reference Grey-Scott stepping in host memory.

use std::time::Instant;

use super::{GridState, SyncError};
use crate::schema::SimulationParams;

/// CPU-based Grey-Scott propagator.
///
/// Single-threaded and bit-reproducible; serves as the fallback when no
/// accelerator is present and as the reference the GPU path is tested against.
#[derive(Debug, Clone)]
pub struct CpuPropagator {
    grid: GridState,
    last_compute_ms: f32,
}

impl CpuPropagator {
    /// Create a propagator with the grid at rest.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            grid: GridState::new(width, height),
            last_compute_ms: 0.0,
        }
    }

    /// Perform one simulation step with the given parameter snapshot.
    pub fn step(&mut self, params: &SimulationParams) {
        let start = Instant::now();
        self.grid.step(params);
        self.last_compute_ms = start.elapsed().as_secs_f32() * 1000.0;
    }

    /// Run simulation for specified number of steps.
    pub fn run(&mut self, params: &SimulationParams, steps: u64) {
        for _ in 0..steps {
            self.step(params);
        }
    }

    /// Current state, row-major interleaved `(U, V)`.
    #[inline]
    pub fn data(&self) -> &[f32] {
        self.grid.current()
    }

    /// Overwrite the current state with `data`.
    pub fn sync_from(&mut self, data: &[f32]) -> Result<(), SyncError> {
        if !self.grid.copy_from(data) {
            return Err(SyncError::LengthMismatch {
                expected: self.grid.len(),
                actual: data.len(),
            });
        }
        Ok(())
    }

    /// Host wall-clock time of the most recent step in milliseconds.
    #[inline]
    pub fn last_compute_time_ms(&self) -> f32 {
        self.last_compute_ms
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.grid.width()
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.grid.height()
    }
}
