//! Summary statistics over a concentration field.

use serde::Serialize;

use super::COMPONENTS;

/// Threshold above which a cell counts as carrying V.
pub const ACTIVE_V_THRESHOLD: f32 = 1e-3;

/// Range summary of one species.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpeciesStats {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
}

/// Statistics about the simulation state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimulationStats {
    pub u: SpeciesStats,
    pub v: SpeciesStats,
    /// Cells with `V > ACTIVE_V_THRESHOLD`.
    pub active_cells: usize,
    pub cells: usize,
}

impl SimulationStats {
    /// Compute statistics from interleaved `(U, V)` data.
    pub fn from_data(data: &[f32]) -> Self {
        let mut u_acc = Accumulator::new();
        let mut v_acc = Accumulator::new();
        let mut active_cells = 0usize;

        for cell in data.chunks_exact(COMPONENTS) {
            u_acc.push(cell[0]);
            v_acc.push(cell[1]);
            if cell[1] > ACTIVE_V_THRESHOLD {
                active_cells += 1;
            }
        }

        Self {
            u: u_acc.finish(),
            v: v_acc.finish(),
            active_cells,
            cells: u_acc.count,
        }
    }
}

struct Accumulator {
    min: f32,
    max: f32,
    sum: f64,
    count: usize,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            min: f32::INFINITY,
            max: f32::NEG_INFINITY,
            sum: 0.0,
            count: 0,
        }
    }

    fn push(&mut self, value: f32) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += value as f64;
        self.count += 1;
    }

    fn finish(&self) -> SpeciesStats {
        if self.count == 0 {
            return SpeciesStats {
                min: 0.0,
                max: 0.0,
                mean: 0.0,
            };
        }
        SpeciesStats {
            min: self.min,
            max: self.max,
            mean: (self.sum / self.count as f64) as f32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_of_rest_state() {
        let data: Vec<f32> = std::iter::repeat([1.0, 0.0]).take(16).flatten().collect();
        let stats = SimulationStats::from_data(&data);

        assert_eq!(stats.cells, 16);
        assert_eq!(stats.active_cells, 0);
        assert_eq!(stats.u.min, 1.0);
        assert_eq!(stats.u.mean, 1.0);
        assert_eq!(stats.v.max, 0.0);
    }

    #[test]
    fn test_stats_split_species() {
        let data = [1.0, 0.0, 0.5, 0.25, 0.0, 0.5, 0.5, 0.0005];
        let stats = SimulationStats::from_data(&data);

        assert_eq!(stats.cells, 4);
        assert_eq!(stats.active_cells, 2);
        assert_eq!(stats.u.min, 0.0);
        assert_eq!(stats.u.max, 1.0);
        assert!((stats.u.mean - 0.5).abs() < 1e-6);
        assert_eq!(stats.v.max, 0.5);
    }

    #[test]
    fn test_empty_data() {
        let stats = SimulationStats::from_data(&[]);
        assert_eq!(stats.cells, 0);
        assert_eq!(stats.u.mean, 0.0);
    }

    #[test]
    fn test_stats_serialize() {
        let stats = SimulationStats::from_data(&[1.0, 0.0]);
        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(json["cells"], 1);
        assert_eq!(json["u"]["max"], 1.0);
    }
}
