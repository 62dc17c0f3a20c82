//! Grey-Scott integration rule.
//!
//! Operates on the interleaved layout `[u0, v0, u1, v1, ...]` in row-major
//! order with periodic boundaries on both axes.

use crate::schema::SimulationParams;

/// Number of scalars stored per cell (U and V).
pub const COMPONENTS: usize = 2;

/// Flat indices of the four toroidal neighbors of `(x, y)`: left, right, up, down.
#[inline]
pub fn neighbor_cells(x: usize, y: usize, width: usize, height: usize) -> [usize; 4] {
    let x_prev = (x + width - 1) % width;
    let x_next = (x + 1) % width;
    let y_prev = (y + height - 1) % height;
    let y_next = (y + 1) % height;

    [
        y * width + x_prev,
        y * width + x_next,
        y_prev * width + x,
        y_next * width + x,
    ]
}

/// 5-point Laplacian of one component at `(x, y)`.
///
/// `component` is 0 for U and 1 for V.
#[inline]
pub fn laplacian(
    field: &[f32],
    x: usize,
    y: usize,
    component: usize,
    width: usize,
    height: usize,
) -> f32 {
    let center = field[(y * width + x) * COMPONENTS + component];
    let [left, right, up, down] = neighbor_cells(x, y, width, height);

    field[left * COMPONENTS + component]
        + field[right * COMPONENTS + component]
        + field[up * COMPONENTS + component]
        + field[down * COMPONENTS + component]
        - 4.0 * center
}

/// Advance a single cell given its concentrations and Laplacians.
///
/// Returns the clamped `(u, v)` for the next step.
#[inline]
pub fn react(u: f32, v: f32, lap_u: f32, lap_v: f32, params: &SimulationParams) -> (f32, f32) {
    let uvv = u * v * v;
    let du = params.du * lap_u - uvv + params.feed * (1.0 - u);
    let dv = params.dv * lap_v + uvv - (params.feed + params.kill) * v;

    (
        (u + du * params.dt).clamp(0.0, 1.0),
        (v + dv * params.dt).clamp(0.0, 1.0),
    )
}

/// Compute one full step from `current` into `next`.
///
/// Reads only `current`; every value of `next` is overwritten.
pub fn integrate_into(
    current: &[f32],
    next: &mut [f32],
    width: usize,
    height: usize,
    params: &SimulationParams,
) {
    debug_assert_eq!(current.len(), width * height * COMPONENTS);
    debug_assert_eq!(next.len(), current.len());

    for y in 0..height {
        for x in 0..width {
            let idx = (y * width + x) * COMPONENTS;
            let u = current[idx];
            let v = current[idx + 1];

            let lap_u = laplacian(current, x, y, 0, width, height);
            let lap_v = laplacian(current, x, y, 1, width, height);

            let (u_next, v_next) = react(u, v, lap_u, lap_v, params);
            next[idx] = u_next;
            next[idx + 1] = v_next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(width: usize, height: usize) -> Vec<f32> {
        let mut grid = vec![0.0f32; width * height * COMPONENTS];
        for cell in grid.chunks_exact_mut(2) {
            cell[0] = 1.0;
        }
        grid
    }

    #[test]
    fn test_neighbors_wrap_at_origin() {
        let (w, h) = (5, 4);
        let [left, right, up, down] = neighbor_cells(0, 0, w, h);

        assert_eq!(left, w - 1); // (w-1, 0)
        assert_eq!(right, 1); // (1, 0)
        assert_eq!(up, (h - 1) * w); // (0, h-1)
        assert_eq!(down, w); // (0, 1)
    }

    #[test]
    fn test_laplacian_reads_wrapped_neighbors() {
        let (w, h) = (4, 3);
        let mut field = vec![0.0f32; w * h * COMPONENTS];
        // Mark U at the four wrapped neighbors of (0, 0) with distinct weights.
        field[(w - 1) * 2] = 1.0;
        field[2] = 10.0;
        field[((h - 1) * w) * 2] = 100.0;
        field[w * 2] = 1000.0;

        assert_eq!(laplacian(&field, 0, 0, 0, w, h), 1111.0);
        assert_eq!(laplacian(&field, 0, 0, 1, w, h), 0.0);
    }

    #[test]
    fn test_laplacian_of_uniform_is_zero() {
        let field = uniform(8, 8);
        for y in 0..8 {
            for x in 0..8 {
                assert_eq!(laplacian(&field, x, y, 0, 8, 8), 0.0);
            }
        }
    }

    #[test]
    fn test_uniform_rest_state_is_fixed_point() {
        let (w, h) = (4, 4);
        let current = uniform(w, h);
        let mut next = vec![f32::NAN; current.len()];

        integrate_into(&current, &mut next, w, h, &SimulationParams::default());

        assert_eq!(next, current);
    }

    #[test]
    fn test_single_cell_reaction_without_diffusion() {
        let (w, h) = (8, 8);
        let feed = 0.04f32;
        let kill = 0.06f32;
        let params = SimulationParams {
            du: 0.0,
            dv: 0.0,
            feed,
            kill,
            dt: 1.0,
        };

        let mut current = uniform(w, h);
        let idx = (3 * w + 5) * 2;
        current[idx] = 0.5;
        current[idx + 1] = 0.25;

        let mut next = vec![0.0f32; current.len()];
        integrate_into(&current, &mut next, w, h, &params);

        let uvv = 0.5f32 * 0.25 * 0.25;
        let expected_u = 0.5 + (-uvv + feed * 0.5);
        let expected_v = 0.25 + (uvv - (feed + kill) * 0.25);
        assert!((next[idx] - expected_u).abs() < 1e-7);
        assert!((next[idx + 1] - expected_v).abs() < 1e-7);

        // Every other cell is at rest.
        for (i, cell) in next.chunks_exact(2).enumerate() {
            if i * 2 != idx {
                assert_eq!(cell, &[1.0, 0.0]);
            }
        }
    }

    #[test]
    fn test_react_clamps_to_unit_interval() {
        let params = SimulationParams {
            dt: 100.0,
            ..Default::default()
        };
        let (u, v) = react(0.9, 0.9, 50.0, -50.0, &params);
        assert_eq!(u, 1.0);
        assert_eq!(v, 0.0);
    }
}
