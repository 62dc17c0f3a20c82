//! Initial conditions for Grey-Scott simulations.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Settings for the centered-disk perturbation used on reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    /// Disk radius as a fraction of grid width (radius = floor(width * fraction)).
    pub radius_fraction: f32,
    /// U concentration inside the disk before jitter.
    pub u: f32,
    /// V concentration inside the disk before jitter.
    pub v: f32,
    /// Lower bound of the uniform jitter added to each component.
    pub jitter_min: f32,
    /// Upper bound (exclusive) of the uniform jitter.
    pub jitter_max: f32,
    /// Fixed RNG seed. `None` draws from OS entropy.
    pub rng_seed: Option<u64>,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            radius_fraction: 0.1,
            u: 0.5,
            v: 0.25,
            jitter_min: 0.0,
            jitter_max: 0.01,
            rng_seed: None,
        }
    }
}

impl SeedConfig {
    /// Disk radius in cells for a grid of the given width.
    #[inline]
    pub fn radius(&self, width: usize) -> usize {
        (width as f32 * self.radius_fraction).floor() as usize
    }

    /// Fill `grid` (interleaved `(U, V)`, row-major) using `rng` for jitter.
    ///
    /// Every cell starts at `(1, 0)`. Cells strictly inside the centered disk
    /// get `(u + j, v + j')` with independent jitter draws.
    pub fn generate_into<R: Rng>(
        &self,
        grid: &mut [f32],
        width: usize,
        height: usize,
        rng: &mut R,
    ) {
        debug_assert_eq!(grid.len(), width * height * 2);

        for cell in grid.chunks_exact_mut(2) {
            cell[0] = 1.0;
            cell[1] = 0.0;
        }

        let radius = self.radius(width) as i64;
        if radius == 0 {
            return;
        }

        let cx = (width / 2) as i64;
        let cy = (height / 2) as i64;
        let jitter_empty = self.jitter_max <= self.jitter_min;

        for y in (cy - radius)..(cy + radius) {
            if y < 0 || y >= height as i64 {
                continue;
            }
            for x in (cx - radius)..(cx + radius) {
                if x < 0 || x >= width as i64 {
                    continue;
                }
                let dx = x - cx;
                let dy = y - cy;
                if dx * dx + dy * dy < radius * radius {
                    let idx = (y as usize * width + x as usize) * 2;
                    let (ju, jv) = if jitter_empty {
                        (self.jitter_min, self.jitter_min)
                    } else {
                        (
                            rng.gen_range(self.jitter_min..self.jitter_max),
                            rng.gen_range(self.jitter_min..self.jitter_max),
                        )
                    };
                    grid[idx] = self.u + ju;
                    grid[idx + 1] = self.v + jv;
                }
            }
        }
    }

    /// Allocate and fill a fresh grid.
    pub fn generate<R: Rng>(&self, width: usize, height: usize, rng: &mut R) -> Vec<f32> {
        let mut grid = vec![0.0f32; width * height * 2];
        self.generate_into(&mut grid, width, height, rng);
        grid
    }
}

/// Produces reset grids, owning the random source.
///
/// With a fixed seed the RNG is rebuilt on every reset, so consecutive resets
/// are bit-identical. An injected RNG is never rebuilt; resets continue its
/// stream.
pub struct Seeder {
    config: SeedConfig,
    rng: StdRng,
    /// Seed to rebuild `rng` from before each reset.
    reseed: Option<u64>,
}

impl Seeder {
    pub fn new(config: SeedConfig) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            reseed: config.rng_seed,
            config,
            rng,
        }
    }

    /// Seeder drawing jitter from `rng`. `config.rng_seed` is ignored.
    pub fn with_rng(config: SeedConfig, rng: StdRng) -> Self {
        Self {
            config,
            rng,
            reseed: None,
        }
    }

    /// Write a freshly seeded grid into `grid`.
    pub fn seed_into(&mut self, grid: &mut [f32], width: usize, height: usize) {
        if let Some(seed) = self.reseed {
            self.rng = StdRng::seed_from_u64(seed);
        }
        self.config.generate_into(grid, width, height, &mut self.rng);
    }

    /// Allocate a freshly seeded grid.
    pub fn seed(&mut self, width: usize, height: usize) -> Vec<f32> {
        let mut grid = vec![0.0f32; width * height * 2];
        self.seed_into(&mut grid, width, height);
        grid
    }
}
