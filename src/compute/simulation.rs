//! Simulation - Owns the engines, parameters and seeding for one session.

use std::sync::Arc;

use super::gpu::{GpuError, GpuPropagator, SharedSurface};
use super::{
    BackendMode, CpuPropagator, FrameSink, SimulationStats, StepEngine, SyncError, sync_bridge,
};
use crate::schema::{
    BackendPreference, ConfigError, ParameterManager, Preset, Seeder, SimulationConfig,
    SimulationParams,
};

/// Top-level error type for a simulation session.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Gpu(#[from] GpuError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("Engine grid is {actual:?}, expected {expected:?}")]
    EngineSize {
        expected: (usize, usize),
        actual: (usize, usize),
    },
}

/// A running Grey-Scott session.
///
/// Holds the active engine plus an optional standby engine to toggle to.
/// State moves between them through [`sync_bridge`] at the moment of the
/// switch and at no other time.
pub struct Simulation {
    params: ParameterManager,
    seeder: Seeder,
    active: StepEngine,
    standby: Option<StepEngine>,
    step_count: u64,
}

impl Simulation {
    /// Build engines from `config` and seed the initial state.
    ///
    /// A GPU preference falls back to the CPU engine only when no adapter or
    /// device is available. Kernel, allocation and configuration failures are
    /// returned.
    pub fn new(config: &SimulationConfig) -> Result<Self, SimulationError> {
        config.validate()?;

        let cpu = || StepEngine::from(CpuPropagator::new(config.width, config.height));

        let (active, standby) = match config.backend {
            BackendPreference::Cpu => (cpu(), None),
            BackendPreference::Gpu => match pollster::block_on(GpuPropagator::new(config)) {
                Ok(gpu) => (StepEngine::from(gpu), config.standby_cpu.then(cpu)),
                Err(e @ (GpuError::NoAdapter | GpuError::DeviceRequest(_))) => {
                    log::warn!("No usable GPU, using CPU engine: {}", e);
                    (cpu(), None)
                }
                Err(e) => return Err(e.into()),
            },
        };

        Self::with_engines(config, active, standby)
    }

    /// Assemble a session from prebuilt engines and seed the initial state.
    pub fn with_engines(
        config: &SimulationConfig,
        active: StepEngine,
        standby: Option<StepEngine>,
    ) -> Result<Self, SimulationError> {
        config.validate()?;

        let expected = (config.width, config.height);
        for engine in std::iter::once(&active).chain(standby.as_ref()) {
            let actual = (engine.width(), engine.height());
            if actual != expected {
                return Err(SimulationError::EngineSize { expected, actual });
            }
        }

        let mut simulation = Self {
            params: ParameterManager::new(config.params),
            seeder: Seeder::new(config.seed.clone()),
            active,
            standby,
            step_count: 0,
        };
        simulation.reset()?;

        log::info!(
            "Simulation ready: {}x{}, active engine {}{}",
            config.width,
            config.height,
            simulation.mode(),
            if simulation.standby.is_some() {
                " (standby available)"
            } else {
                ""
            }
        );

        Ok(simulation)
    }

    /// Advance one step with the current parameter snapshot.
    ///
    /// Returns `false` if the engine failed; the state did not advance and
    /// the next call retries.
    pub fn step(&mut self) -> bool {
        let snapshot = self.params.snapshot();
        match self.active.step(&snapshot) {
            Ok(()) => {
                self.step_count += 1;
                log::debug!(
                    "Step {} took {:.3} ms",
                    self.step_count,
                    self.active.last_compute_time_ms()
                );
                true
            }
            Err(e) => {
                log::error!("Step abandoned: {}", e);
                false
            }
        }
    }

    /// Run `steps` steps, returning how many completed.
    pub fn run(&mut self, steps: u64) -> u64 {
        let mut completed = 0;
        for _ in 0..steps {
            if self.step() {
                completed += 1;
            }
        }
        completed
    }

    /// Reseed the active engine.
    pub fn reset(&mut self) -> Result<(), SimulationError> {
        let grid = self
            .seeder
            .seed(self.active.width(), self.active.height());
        self.active.sync_from(&grid)?;
        self.step_count = 0;
        log::debug!("Grid reset");
        Ok(())
    }

    /// Replace the random source used by [`Self::reset`], then reset.
    pub fn set_seeder(&mut self, seeder: Seeder) -> Result<(), SimulationError> {
        self.seeder = seeder;
        self.reset()
    }

    /// Switch to the standby engine, carrying the state across.
    ///
    /// Without a standby engine this is a no-op. If the transfer fails the
    /// active engine stays in place.
    pub fn toggle_backend(&mut self) -> Result<BackendMode, SimulationError> {
        let Some(mut incoming) = self.standby.take() else {
            log::info!("No standby engine, staying on {}", self.mode());
            return Ok(self.mode());
        };

        if let Err(e) = sync_bridge(&mut self.active, &mut incoming) {
            self.standby = Some(incoming);
            return Err(e.into());
        }

        let outgoing = std::mem::replace(&mut self.active, incoming);
        self.standby = Some(outgoing);
        log::info!("Switched engine to {}", self.mode());
        Ok(self.mode())
    }

    /// Hand the current frame to `sink`.
    pub fn present(&self, sink: &mut dyn FrameSink) {
        if !self.mode().is_zero_copy() {
            sink.update_texture(self.active.data());
        }
        sink.render();
    }

    #[inline]
    pub fn params(&self) -> &SimulationParams {
        self.params.params()
    }

    pub fn set_params(&mut self, params: SimulationParams) {
        self.params.set_params(params);
    }

    pub fn load_preset(&mut self, index: usize) -> Option<Preset> {
        self.params.load_preset(index)
    }

    /// Host-visible state of the active engine. In zero-copy mode call
    /// [`Self::read_back`] first for the exact current state.
    #[inline]
    pub fn data(&self) -> &[f32] {
        self.active.data()
    }

    pub fn read_back(&mut self) -> Result<(), SimulationError> {
        self.active.read_back()?;
        Ok(())
    }

    pub fn stats(&self) -> SimulationStats {
        SimulationStats::from_data(self.data())
    }

    #[inline]
    pub fn mode(&self) -> BackendMode {
        self.active.mode()
    }

    pub fn has_standby(&self) -> bool {
        self.standby.is_some()
    }

    /// Shared display surface of the active GPU engine in zero-copy mode.
    pub fn shared_surface(&self) -> Option<Arc<SharedSurface>> {
        self.active.as_gpu().and_then(GpuPropagator::shared_surface)
    }

    pub fn engine(&self) -> &StepEngine {
        &self.active
    }

    #[inline]
    pub fn last_compute_time_ms(&self) -> f32 {
        self.active.last_compute_time_ms()
    }

    #[inline]
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.active.width()
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.active.height()
    }
}
