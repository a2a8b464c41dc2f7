//! Parallel block step: at least one of `N` components must
//! work. Output = `1 - prod(1 - r_i)`, capped.

use crate::cap::cap_lanes;
use crate::kernels::{identical_window, row_window};

#[inline(always)]
pub fn step<const W: usize>(reliabilities: &[f64], n: usize, t_stride: usize, t0: usize) -> [f64; W] {
    let mut acc = [1.0f64; W];
    for i in 0..n {
        let row = row_window::<W>(reliabilities, i, t_stride, t0);
        for w in 0..W {
            acc[w] *= 1.0 - row[w];
        }
    }
    let mut out = [0.0f64; W];
    for w in 0..W {
        out[w] = 1.0 - acc[w];
    }
    cap_lanes(out)
}

/// Identical-components parallel step: `1 - (1 - r)^N`, computed as `N-1`
/// multiplications.
#[inline(always)]
pub fn identical_step<const W: usize>(reliabilities: &[f64], n: usize, t0: usize) -> [f64; W] {
    let base = identical_window::<W>(reliabilities, t0);
    let mut unreliability = [0.0f64; W];
    for w in 0..W {
        unreliability[w] = 1.0 - base[w];
    }
    let mut acc = unreliability;
    for _ in 1..n {
        for w in 0..W {
            acc[w] *= unreliability[w];
        }
    }
    let mut out = [0.0f64; W];
    for w in 0..W {
        out[w] = 1.0 - acc[w];
    }
    cap_lanes(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// N=3, T=1, r = [0.9, 0.8, 0.5] -> 0.99.
    #[test]
    fn parallel_n3_t1_matches_closed_form() {
        let reliabilities = [0.9, 0.8, 0.5];
        let out = step::<1>(&reliabilities, 3, 1, 0);
        assert!((out[0] - 0.99).abs() < 1e-12);
    }

    #[test]
    fn all_zero_is_zero() {
        let reliabilities = [0.0; 3];
        let out = step::<1>(&reliabilities, 3, 1, 0);
        assert_eq!(out[0], 0.0);
    }

    #[test]
    fn all_ones_is_one() {
        let reliabilities = [1.0; 3];
        let out = step::<1>(&reliabilities, 3, 1, 0);
        assert_eq!(out[0], 1.0);
    }

    /// Series/Parallel duality:
    /// series(r) == 1 - parallel(1-r) up to ULP.
    #[test]
    fn series_parallel_duality() {
        let r = [0.9, 0.8, 0.5, 0.3];
        let unreliability: Vec<f64> = r.iter().map(|x| 1.0 - x).collect();
        let series_out = super::super::series::step::<1>(&r, 4, 1, 0)[0];
        let parallel_out = step::<1>(&unreliability, 4, 1, 0)[0];
        assert!((series_out - (1.0 - parallel_out)).abs() < 1e-12);
    }

    #[test]
    fn identical_matches_closed_form() {
        let reliabilities = [0.8; 5];
        let out = identical_step::<1>(&reliabilities, 5, 0);
        let expected = 1.0 - (1.0f64 - 0.8).powi(5);
        assert!((out[0] - expected).abs() < 1e-12);
    }
}
