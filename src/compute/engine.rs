//! Backend dispatch for the simulation loop.

use std::fmt;

use super::gpu::{GpuError, GpuPropagator, InteropState};
use super::{CpuPropagator, SyncError};
use crate::schema::SimulationParams;

/// Execution mode of the engine currently stepping the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMode {
    Cpu,
    AcceleratorBufferCopy,
    AcceleratorZeroCopy,
}

impl BackendMode {
    #[inline]
    pub fn is_accelerated(self) -> bool {
        !matches!(self, BackendMode::Cpu)
    }

    /// Whether the display surface is already current after a step.
    #[inline]
    pub fn is_zero_copy(self) -> bool {
        matches!(self, BackendMode::AcceleratorZeroCopy)
    }
}

impl From<InteropState> for BackendMode {
    fn from(state: InteropState) -> Self {
        match state {
            InteropState::ZeroCopyActive => BackendMode::AcceleratorZeroCopy,
            InteropState::Unprobed | InteropState::BufferCopyActive => {
                BackendMode::AcceleratorBufferCopy
            }
        }
    }
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendMode::Cpu => "cpu",
            BackendMode::AcceleratorBufferCopy => "gpu buffer-copy",
            BackendMode::AcceleratorZeroCopy => "gpu zero-copy",
        };
        f.write_str(name)
    }
}

/// One of the two stepping backends.
pub enum StepEngine {
    Cpu(CpuPropagator),
    Gpu(Box<GpuPropagator>),
}

impl StepEngine {
    /// Advance one step. Only the GPU engine can fail; on failure the state
    /// does not advance.
    pub fn step(&mut self, params: &SimulationParams) -> Result<(), GpuError> {
        match self {
            StepEngine::Cpu(cpu) => {
                cpu.step(params);
                Ok(())
            }
            StepEngine::Gpu(gpu) => gpu.step(params),
        }
    }

    /// Host-visible state. May lag the device in zero-copy mode; call
    /// [`Self::read_back`] first when the exact current state is needed.
    pub fn data(&self) -> &[f32] {
        match self {
            StepEngine::Cpu(cpu) => cpu.data(),
            StepEngine::Gpu(gpu) => gpu.data(),
        }
    }

    /// Bring the host-visible state up to date.
    pub fn read_back(&mut self) -> Result<(), GpuError> {
        match self {
            StepEngine::Cpu(_) => Ok(()),
            StepEngine::Gpu(gpu) => gpu.read_back(),
        }
    }

    pub fn sync_from(&mut self, data: &[f32]) -> Result<(), SyncError> {
        match self {
            StepEngine::Cpu(cpu) => cpu.sync_from(data),
            StepEngine::Gpu(gpu) => gpu.sync_from(data),
        }
    }

    pub fn mode(&self) -> BackendMode {
        match self {
            StepEngine::Cpu(_) => BackendMode::Cpu,
            StepEngine::Gpu(gpu) => gpu.mode(),
        }
    }

    pub fn last_compute_time_ms(&self) -> f32 {
        match self {
            StepEngine::Cpu(cpu) => cpu.last_compute_time_ms(),
            StepEngine::Gpu(gpu) => gpu.last_compute_time_ms(),
        }
    }

    pub fn width(&self) -> usize {
        match self {
            StepEngine::Cpu(cpu) => cpu.width(),
            StepEngine::Gpu(gpu) => gpu.width(),
        }
    }

    pub fn height(&self) -> usize {
        match self {
            StepEngine::Cpu(cpu) => cpu.height(),
            StepEngine::Gpu(gpu) => gpu.height(),
        }
    }

    pub fn as_gpu(&self) -> Option<&GpuPropagator> {
        match self {
            StepEngine::Gpu(gpu) => Some(&**gpu),
            StepEngine::Cpu(_) => None,
        }
    }
}

impl From<CpuPropagator> for StepEngine {
    fn from(cpu: CpuPropagator) -> Self {
        StepEngine::Cpu(cpu)
    }
}

impl From<GpuPropagator> for StepEngine {
    fn from(gpu: GpuPropagator) -> Self {
        StepEngine::Gpu(Box::new(gpu))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_interop_state() {
        assert_eq!(
            BackendMode::from(InteropState::ZeroCopyActive),
            BackendMode::AcceleratorZeroCopy
        );
        assert_eq!(
            BackendMode::from(InteropState::BufferCopyActive),
            BackendMode::AcceleratorBufferCopy
        );
        assert!(!BackendMode::Cpu.is_accelerated());
        assert!(BackendMode::AcceleratorZeroCopy.is_zero_copy());
        assert!(!BackendMode::AcceleratorBufferCopy.is_zero_copy());
    }

    #[test]
    fn test_cpu_engine_dispatch() {
        let mut engine = StepEngine::from(CpuPropagator::new(8, 4));
        assert_eq!(engine.mode(), BackendMode::Cpu);
        assert_eq!((engine.width(), engine.height()), (8, 4));
        assert_eq!(engine.data().len(), 64);
        assert!(engine.as_gpu().is_none());

        engine.step(&SimulationParams::default()).unwrap();
        engine.read_back().unwrap();
    }
}
