//! Double-buffered concentration field.

use super::reaction::{COMPONENTS, integrate_into};
use crate::schema::SimulationParams;

/// Two interleaved `(U, V)` grids: the authoritative `current` and the
/// `next` write target of an in-progress step.
///
/// Roles swap only after a step has fully written `next`, so callers never
/// observe a half-computed field.
#[derive(Debug, Clone)]
pub struct GridState {
    current: Vec<f32>,
    next: Vec<f32>,
    width: usize,
    height: usize,
}

impl GridState {
    /// Create a grid at rest: every cell `(U=1, V=0)`.
    pub fn new(width: usize, height: usize) -> Self {
        let len = width * height * COMPONENTS;
        let mut current = vec![0.0f32; len];
        for cell in current.chunks_exact_mut(COMPONENTS) {
            cell[0] = 1.0;
        }
        Self {
            next: current.clone(),
            current,
            width,
            height,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Length of the flat array (width * height * 2).
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.current.len()
    }

    /// Authoritative state, row-major interleaved `(U, V)`.
    #[inline]
    pub fn current(&self) -> &[f32] {
        &self.current
    }

    #[cfg(test)]
    fn current_mut(&mut self) -> &mut [f32] {
        &mut self.current
    }

    #[cfg(test)]
    fn get(&self, x: usize, y: usize) -> (f32, f32) {
        let idx = (y * self.width + x) * COMPONENTS;
        (self.current[idx], self.current[idx + 1])
    }

    /// Run the integration rule into `next`, then swap.
    pub fn step(&mut self, params: &SimulationParams) {
        integrate_into(
            &self.current,
            &mut self.next,
            self.width,
            self.height,
            params,
        );
        std::mem::swap(&mut self.current, &mut self.next);
    }

    /// Overwrite the authoritative state with `data`.
    ///
    /// Returns `false` and leaves the grid untouched if the length differs.
    pub fn copy_from(&mut self, data: &[f32]) -> bool {
        if data.len() != self.current.len() {
            return false;
        }
        self.current.copy_from_slice(data);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_grid_is_at_rest() {
        let grid = GridState::new(6, 3);
        assert_eq!(grid.len(), 6 * 3 * 2);
        for y in 0..3 {
            for x in 0..6 {
                assert_eq!(grid.get(x, y), (1.0, 0.0));
            }
        }
    }

    #[test]
    fn test_step_swaps_buffers() {
        let mut grid = GridState::new(8, 8);
        let idx = (4 * 8 + 4) * 2;
        grid.current_mut()[idx] = 0.5;
        grid.current_mut()[idx + 1] = 0.25;
        let before = grid.current().to_vec();

        grid.step(&SimulationParams::default());

        assert_ne!(grid.current(), &before[..]);
        // The previous state now lives in the write target.
        assert_eq!(grid.next, before);
    }

    #[test]
    fn test_copy_from_rejects_wrong_length() {
        let mut grid = GridState::new(4, 4);
        let before = grid.current().to_vec();
        assert!(!grid.copy_from(&[0.0; 3]));
        assert_eq!(grid.current(), &before[..]);
    }

    #[test]
    fn test_copy_from_is_exact() {
        let mut grid = GridState::new(2, 2);
        let data = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8];
        assert!(grid.copy_from(&data));
        assert_eq!(grid.current(), &data);
    }
}
