//! Capability selector: chooses the widest lane width a worker should use
//! for its kernels.
//!
//! The actual CPU-feature bits are treated as an external collaborator —
//! this module only defines the predicate surface and the mapping from
//! detected features to the widest supported kernel width. The kernels
//! themselves are width-generic array loops, not hand-written per-ISA
//! intrinsics, so "widest supported width" here means "widest width still
//! worth the loop overhead for this CPU", not "widest ISA extension
//! present" (see DESIGN.md for this convention).
//!
//! Selection happens once per worker at entry, not per time block.

/// Kernel family tag, ordered widest-first: scalar or one of the supported
/// vector lane widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Width {
    Scalar = 1,
    W2 = 2,
    W4 = 4,
    W8 = 8,
}

impl Width {
    pub fn lanes(self) -> usize {
        self as usize
    }

    fn narrower(self) -> Option<Width> {
        match self {
            Width::W8 => Some(Width::W4),
            Width::W4 => Some(Width::W2),
            Width::W2 => Some(Width::Scalar),
            Width::Scalar => None,
        }
    }

    /// The descent sequence used by the tail of the dispatch stride loop:
    /// `W_max/2, W_max/4, ..., 2`, excluding the scalar fallback which is
    /// handled separately.
    pub fn tail_descent(self) -> Vec<Width> {
        let mut widths = Vec::new();
        let mut cur = self.narrower();
        while let Some(w) = cur {
            if w == Width::Scalar {
                break;
            }
            widths.push(w);
            cur = w.narrower();
        }
        widths
    }
}

/// A runtime check for whether the current CPU supports running the named
/// kernel family efficiently. The default implementation consults
/// `std::is_x86_feature_detected!` on x86_64 (the one detection surface the
/// standard library itself exposes without a third-party crate) and
/// degrades to scalar-only elsewhere; a host embedding this engine on an
/// architecture with richer feature detection can substitute its own
/// `Detector`.
pub trait Detector: Send + Sync {
    fn supports(&self, width: Width) -> bool;
}

/// The engine's built-in detector. Conservative: widths above 2 require
/// AVX2 on x86_64, width 2 requires SSE2 (universal on x86_64), and
/// anything else falls back to scalar.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeDetector;

impl Detector for NativeDetector {
    fn supports(&self, width: Width) -> bool {
        match width {
            Width::Scalar => true,
            #[cfg(target_arch = "x86_64")]
            Width::W2 => true, // SSE2 is baseline on x86_64
            #[cfg(target_arch = "x86_64")]
            Width::W4 | Width::W8 => std::is_x86_feature_detected!("avx2"),
            #[cfg(not(target_arch = "x86_64"))]
            _ => false,
        }
    }
}

/// Chooses the widest width the given detector supports, at worker entry.
pub fn select_width(detector: &dyn Detector) -> Width {
    for width in [Width::W8, Width::W4, Width::W2] {
        if detector.supports(width) {
            return width;
        }
    }
    Width::Scalar
}
