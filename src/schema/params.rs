//! Reaction-diffusion coefficients and the preset table.

use serde::{Deserialize, Serialize};

/// Upper bound applied by [`SimulationParams::nudged`] to feed and kill rates.
pub const MAX_FEED_KILL: f32 = 0.1;

/// Coefficients consumed by one integration step.
///
/// This is a plain `Copy` value: every step receives its own snapshot, so a
/// change made between steps never leaks into a step already in progress.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    /// Diffusion rate of U.
    pub du: f32,
    /// Diffusion rate of V.
    pub dv: f32,
    /// Feed rate (F).
    pub feed: f32,
    /// Kill rate (k).
    pub kill: f32,
    /// Integration time step.
    pub dt: f32,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            du: 0.16,
            dv: 0.08,
            feed: 0.055,
            kill: 0.062,
            dt: 1.0,
        }
    }
}

impl SimulationParams {
    /// Return a copy with feed and kill shifted by the given deltas and
    /// clamped to `[0, MAX_FEED_KILL]`.
    ///
    /// Intended for input handlers that adjust the coefficients incrementally.
    pub fn nudged(self, feed_delta: f32, kill_delta: f32) -> Self {
        Self {
            feed: (self.feed + feed_delta).clamp(0.0, MAX_FEED_KILL),
            kill: (self.kill + kill_delta).clamp(0.0, MAX_FEED_KILL),
            ..self
        }
    }
}

/// Named `(F, k)` pairs that produce recognizable pattern classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    Spots,
    Stripes,
    Waves,
    Chaos,
    Holes,
}

impl Preset {
    /// All presets in index order (index 1 first).
    pub const ALL: [Preset; 5] = [
        Preset::Spots,
        Preset::Stripes,
        Preset::Waves,
        Preset::Chaos,
        Preset::Holes,
    ];

    /// Look up a preset by its 1-based index.
    pub fn from_index(index: usize) -> Option<Self> {
        index
            .checked_sub(1)
            .and_then(|i| Self::ALL.get(i))
            .copied()
    }

    /// 1-based index of this preset.
    pub fn index(self) -> usize {
        self as usize + 1
    }

    /// `(feed, kill)` for this preset.
    pub fn feed_kill(self) -> (f32, f32) {
        match self {
            Preset::Spots => (0.055, 0.062),
            Preset::Stripes => (0.039, 0.058),
            Preset::Waves => (0.026, 0.051),
            Preset::Chaos => (0.018, 0.051),
            Preset::Holes => (0.014, 0.047),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Preset::Spots => "spots",
            Preset::Stripes => "stripes",
            Preset::Waves => "waves",
            Preset::Chaos => "chaos",
            Preset::Holes => "holes",
        }
    }
}

/// Holds the live parameter set shared by UI and step engines.
#[derive(Debug, Clone, Default)]
pub struct ParameterManager {
    params: SimulationParams,
}

impl ParameterManager {
    pub fn new(params: SimulationParams) -> Self {
        Self { params }
    }

    /// Current parameters.
    #[inline]
    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    /// Replace the parameters wholesale. No validation is applied.
    pub fn set_params(&mut self, params: SimulationParams) {
        self.params = params;
    }

    /// Snapshot handed to a single step.
    #[inline]
    pub fn snapshot(&self) -> SimulationParams {
        self.params
    }

    /// Apply preset `index` (1-based). Unknown indices leave parameters
    /// unchanged and return `None`.
    pub fn load_preset(&mut self, index: usize) -> Option<Preset> {
        let preset = Preset::from_index(index)?;
        let (feed, kill) = preset.feed_kill();
        self.params.feed = feed;
        self.params.kill = kill;
        log::info!(
            "Loaded preset {} ({}): F={}, k={}",
            index,
            preset.name(),
            feed,
            kill
        );
        Some(preset)
    }
}
