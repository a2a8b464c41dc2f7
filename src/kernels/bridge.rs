//! Bridge block step: fixed 5-component topology
//! (`R1..R5` in positional roles). Uses the reduced `VAL1`/`VAL2` form to
//! minimise operations:
//!
//! ```text
//! VAL1 = (R1 + R3 - R1*R3) * (R2 + R4 - R2*R4)
//! VAL2 = R1*R2 + R3*R4 - R1*R2*R3*R4
//! output = R5 * (VAL1 - VAL2) + VAL2
//! ```
//!
//! algebraically equivalent to
//! `R5*(1-F1*F3)*(1-F2*F4) + F5*(1-(1-R1*R2)*(1-R3*R4))` with `F_i = 1-R_i`,
//! but not required to be bit-identical to it — only ULP-level agreement
//! is required.

use crate::cap::cap_lanes;
use crate::kernels::row_window;

pub const N: usize = 5;

#[inline(always)]
pub fn step<const W: usize>(reliabilities: &[f64], t_stride: usize, t0: usize) -> [f64; W] {
    let r1 = row_window::<W>(reliabilities, 0, t_stride, t0);
    let r2 = row_window::<W>(reliabilities, 1, t_stride, t0);
    let r3 = row_window::<W>(reliabilities, 2, t_stride, t0);
    let r4 = row_window::<W>(reliabilities, 3, t_stride, t0);
    let r5 = row_window::<W>(reliabilities, 4, t_stride, t0);

    let mut out = [0.0f64; W];
    for w in 0..W {
        let val1 = (r1[w] + r3[w] - r1[w] * r3[w]) * (r2[w] + r4[w] - r2[w] * r4[w]);
        let val2 = r1[w] * r2[w] + r3[w] * r4[w] - r1[w] * r2[w] * r3[w] * r4[w];
        out[w] = r5[w] * (val1 - val2) + val2;
    }
    cap_lanes(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// N=5, T=1, all R_i = 0.9 -> 0.97848, within 1e-12.
    #[test]
    fn bridge_all_point_nine_matches_closed_form() {
        let reliabilities = [0.9; 5];
        let out = step::<1>(&reliabilities, 1, 0);
        assert!((out[0] - 0.97848).abs() < 1e-12);
    }

    #[test]
    fn all_ones_is_one() {
        let reliabilities = [1.0; 5];
        let out = step::<1>(&reliabilities, 1, 0);
        assert_eq!(out[0], 1.0);
    }

    #[test]
    fn all_zero_is_zero() {
        let reliabilities = [0.0; 5];
        let out = step::<1>(&reliabilities, 1, 0);
        assert_eq!(out[0], 0.0);
    }

    #[test]
    fn matches_textbook_formula() {
        let r = [0.95, 0.9, 0.85, 0.8, 0.7];
        let f: Vec<f64> = r.iter().map(|x| 1.0 - x).collect();
        let textbook = r[4] * (1.0 - f[0] * f[2]) * (1.0 - f[1] * f[3])
            + f[4] * (1.0 - (1.0 - r[0] * r[1]) * (1.0 - r[2] * r[3]));
        let out = step::<1>(&r, 1, 0);
        assert!((out[0] - textbook).abs() < 1e-9);
    }
}
