//! Configuration types for Grey-Scott simulations.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{SeedConfig, SimulationParams};

fn default_true() -> bool {
    true
}

/// Which engine drives the simulation at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendPreference {
    /// Host-memory reference implementation.
    Cpu,
    /// WebGPU compute, with the CPU engine as fallback.
    #[default]
    Gpu,
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Grid width in cells.
    pub width: usize,
    /// Grid height in cells.
    pub height: usize,
    /// Initial reaction-diffusion coefficients.
    #[serde(default)]
    pub params: SimulationParams,
    /// Reset/seed settings.
    #[serde(default)]
    pub seed: SeedConfig,
    /// Engine to start on.
    #[serde(default)]
    pub backend: BackendPreference,
    /// Attempt zero-copy presentation on the GPU engine.
    #[serde(default = "default_true")]
    pub interop: bool,
    /// Load the compute kernel from this file instead of the embedded source.
    #[serde(default)]
    pub kernel_path: Option<PathBuf>,
    /// Keep a CPU engine on standby so the active backend can be toggled.
    #[serde(default = "default_true")]
    pub standby_cpu: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            params: SimulationParams::default(),
            seed: SeedConfig::default(),
            backend: BackendPreference::default(),
            interop: true,
            kernel_path: None,
            standby_cpu: true,
        }
    }
}

/// Largest grid accepted by [`SimulationConfig::validate`] (8192 x 8192 cells).
pub const MAX_GRID_CELLS: usize = 1 << 26;

impl SimulationConfig {
    /// Number of cells (width * height). Saturates for unvalidated configs.
    #[inline]
    pub fn cell_count(&self) -> usize {
        self.width.saturating_mul(self.height)
    }

    /// Length of the flat interleaved `(U, V)` array.
    #[inline]
    pub fn data_len(&self) -> usize {
        self.cell_count().saturating_mul(2)
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if u32::try_from(self.width).is_err() || u32::try_from(self.height).is_err() {
            return Err(ConfigError::DimensionsTooLarge);
        }
        let cells = self.width.checked_mul(self.height);
        if !cells.is_some_and(|c| c <= MAX_GRID_CELLS) {
            return Err(ConfigError::GridTooLarge {
                width: self.width,
                height: self.height,
                limit: MAX_GRID_CELLS,
            });
        }
        if self.params.dt <= 0.0 || !self.params.dt.is_finite() {
            return Err(ConfigError::InvalidTimeStep);
        }
        if !(0.0..=0.5).contains(&self.seed.radius_fraction) {
            return Err(ConfigError::InvalidSeedRadius(self.seed.radius_fraction));
        }
        if self.seed.jitter_max < self.seed.jitter_min {
            return Err(ConfigError::InvalidJitter {
                min: self.seed.jitter_min,
                max: self.seed.jitter_max,
            });
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Grid dimensions (width, height) must be non-zero")]
    InvalidDimensions,
    #[error("Grid dimensions must fit in 32 bits")]
    DimensionsTooLarge,
    #[error("Grid {width}x{height} exceeds the limit of {limit} cells")]
    GridTooLarge {
        width: usize,
        height: usize,
        limit: usize,
    },
    #[error("Time step must be positive and finite")]
    InvalidTimeStep,
    #[error("Seed radius fraction {0} is outside [0, 0.5]")]
    InvalidSeedRadius(f32),
    #[error("Jitter range [{min}, {max}) is inverted")]
    InvalidJitter { min: f32, max: f32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let config = SimulationConfig {
            width: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDimensions)
        ));
    }

    #[test]
    fn test_oversized_grid_rejected() {
        let oversized = [
            (u32::MAX as usize, u32::MAX as usize),
            (16384, 16384),
            (1, 1 << 27),
        ];
        for (width, height) in oversized {
            let config = SimulationConfig {
                width,
                height,
                ..Default::default()
            };
            assert!(
                matches!(config.validate(), Err(ConfigError::GridTooLarge { .. })),
                "{}x{} should be rejected",
                width,
                height
            );
        }
    }

    #[test]
    fn test_largest_grid_accepted() {
        let config = SimulationConfig {
            width: 8192,
            height: 8192,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.data_len(), 2 * MAX_GRID_CELLS);
    }

    #[test]
    fn test_data_len_does_not_overflow() {
        let config = SimulationConfig {
            width: usize::MAX,
            height: 3,
            ..Default::default()
        };
        assert_eq!(config.data_len(), usize::MAX);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_positive_dt_rejected() {
        let mut config = SimulationConfig::default();
        config.params.dt = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTimeStep)));
    }

    #[test]
    fn test_inverted_jitter_rejected() {
        let mut config = SimulationConfig::default();
        config.seed.jitter_min = 0.1;
        config.seed.jitter_max = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidJitter { .. })
        ));
    }

    #[test]
    fn test_minimal_json_fills_defaults() {
        let config: SimulationConfig =
            serde_json::from_str(r#"{ "width": 128, "height": 64 }"#).unwrap();

        assert_eq!(config.width, 128);
        assert_eq!(config.height, 64);
        assert_eq!(config.params, SimulationParams::default());
        assert_eq!(config.backend, BackendPreference::Gpu);
        assert!(config.interop);
        assert!(config.standby_cpu);
        assert!(config.kernel_path.is_none());
    }

    #[test]
    fn test_json_roundtrip_preserves_backend() {
        let config = SimulationConfig {
            backend: BackendPreference::Cpu,
            interop: false,
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: SimulationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.backend, BackendPreference::Cpu);
        assert!(!parsed.interop);
    }
}
