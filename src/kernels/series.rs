//! Series block step: all `N` components must work. Output is the capped
//! product of per-component reliabilities at each time instant.

use crate::cap::cap_lanes;
use crate::kernels::{identical_window, row_window};

/// Generic (non-identical) series step: `N` independently-valued
/// components.
#[inline(always)]
pub fn step<const W: usize>(reliabilities: &[f64], n: usize, t_stride: usize, t0: usize) -> [f64; W] {
    let mut acc = [1.0f64; W];
    for i in 0..n {
        let row = row_window::<W>(reliabilities, i, t_stride, t0);
        for w in 0..W {
            acc[w] *= row[w];
        }
    }
    cap_lanes(acc)
}

/// Identical-components series step: a single reliability series raised to
/// the `N`-th power, computed as `N-1` multiplications rather than `powi`
/// for consistent accumulation order with the generic path.
#[inline(always)]
pub fn identical_step<const W: usize>(reliabilities: &[f64], n: usize, t0: usize) -> [f64; W] {
    let base = identical_window::<W>(reliabilities, t0);
    let mut acc = base;
    for _ in 1..n {
        for w in 0..W {
            acc[w] *= base[w];
        }
    }
    cap_lanes(acc)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// N=3, T=1, r = [0.9, 0.8, 0.5] -> 0.36.
    #[test]
    fn series_n3_t1_matches_closed_form() {
        let reliabilities = [0.9, 0.8, 0.5];
        let out = step::<1>(&reliabilities, 3, 1, 0);
        assert!((out[0] - 0.36).abs() < 1e-12);
    }

    #[test]
    fn all_ones_is_one() {
        let reliabilities = [1.0; 4];
        let out = step::<1>(&reliabilities, 4, 1, 0);
        assert_eq!(out[0], 1.0);
    }

    #[test]
    fn any_zero_is_zero() {
        let reliabilities = [1.0, 1.0, 0.0, 1.0];
        let out = step::<1>(&reliabilities, 4, 1, 0);
        assert_eq!(out[0], 0.0);
    }

    #[test]
    fn identical_matches_power() {
        let reliabilities = [0.9; 4];
        let out = identical_step::<1>(&reliabilities, 4, 0);
        assert!((out[0] - 0.9f64.powi(4)).abs() < 1e-12);
    }

    #[test]
    fn vector_matches_scalar() {
        let reliabilities: Vec<f64> = (0..3)
            .flat_map(|_| vec![0.9, 0.8, 0.7, 0.6])
            .collect();
        let t_stride = 4;
        let vector_out = step::<4>(&reliabilities, 3, t_stride, 0);
        for t in 0..4 {
            let scalar_out = step::<1>(&reliabilities, 3, t_stride, t);
            assert!((vector_out[t] - scalar_out[0]).abs() < 1e-12);
        }
    }
}
