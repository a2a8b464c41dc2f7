//! Per-worker scratch arena used exclusively by the KooN recursive
//! decomposition to avoid reloading pivot-block reliabilities and to hold
//! the lexicographic combination state for the per-call subset expansion.
//!
//! Lifecycle: allocated on worker entry, zeroed, owned for the duration of
//! the batch, dropped on exit. No two workers ever share one.

/// `N <= 255` in practice, so 256 slots cover every component position a
/// single recursive call's sub-problem can index.
const SLOTS: usize = 256;
/// Widest supported lane count (`W_max <= 8`).
const MAX_LANES: usize = 8;

/// A 64-byte-aligned cache of per-component reliability values, one
/// `MAX_LANES`-wide slot per component position, re-viewable as scalar or
/// width-`W` lane groups depending on the active kernel width. Total size
/// is `(UCHAR_MAX+1) * 64 bytes` exactly (256 slots * 8 lanes * 8 bytes).
#[repr(align(64))]
struct AlignedCache([f64; SLOTS * MAX_LANES]);

/// Scratch arena for one worker's KooN recursion.
pub struct ScratchArena {
    /// Current lexicographic combination's indices, positional within the
    /// recursion's current sub-problem. `usize`-typed so it plugs directly
    /// into [`crate::combinatorics::next_combination`] without per-element
    /// casts.
    combination: [usize; SLOTS],
    /// Cached reliabilities of the pivot block / current sub-problem,
    /// indexed by position, so they are not reloaded on every subset term.
    cache: AlignedCache,
}

impl ScratchArena {
    pub fn new() -> Self {
        ScratchArena {
            combination: [0usize; SLOTS],
            cache: AlignedCache([0.0f64; SLOTS * MAX_LANES]),
        }
    }

    /// Combination-index buffer, truncated to the first `k` active slots.
    pub fn combination_mut(&mut self, k: usize) -> &mut [usize] {
        &mut self.combination[..k]
    }

    /// Caches the width-`W` lane group `values` at sub-problem position
    /// `pos`.
    pub fn cache_set<const W: usize>(&mut self, pos: usize, values: [f64; W]) {
        let base = pos * MAX_LANES;
        self.cache.0[base..base + W].copy_from_slice(&values);
    }

    /// Reads back the width-`W` lane group cached at sub-problem position
    /// `pos`.
    pub fn cache_get<const W: usize>(&self, pos: usize) -> [f64; W] {
        let base = pos * MAX_LANES;
        let mut out = [0.0f64; W];
        out.copy_from_slice(&self.cache.0[base..base + W]);
        out
    }

    pub fn reset(&mut self) {
        self.combination.fill(0);
        self.cache.0.fill(0.0);
    }
}

impl Default for ScratchArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_arena_is_zeroed() {
        let arena = ScratchArena::new();
        assert_eq!(arena.cache.0, [0.0; SLOTS * MAX_LANES]);
        assert_eq!(arena.combination, [0usize; SLOTS]);
    }

    #[test]
    fn cache_round_trips_scalar() {
        let mut arena = ScratchArena::new();
        arena.cache_set::<1>(0, [0.42]);
        assert_eq!(arena.cache_get::<1>(0), [0.42]);
    }

    #[test]
    fn cache_round_trips_wide() {
        let mut arena = ScratchArena::new();
        arena.cache_set::<4>(3, [0.1, 0.2, 0.3, 0.4]);
        assert_eq!(arena.cache_get::<4>(3), [0.1, 0.2, 0.3, 0.4]);
        // Neighbouring slots are untouched.
        assert_eq!(arena.cache_get::<4>(2), [0.0; 4]);
    }

    #[test]
    fn alignment_is_64_bytes() {
        let arena = ScratchArena::new();
        let ptr = &arena.cache.0 as *const _ as usize;
        assert_eq!(ptr % 64, 0);
    }

    #[test]
    fn reset_clears_state() {
        let mut arena = ScratchArena::new();
        arena.cache_set::<2>(0, [1.0, 1.0]);
        arena.combination_mut(2).copy_from_slice(&[3usize, 4]);
        arena.reset();
        assert_eq!(arena.cache_get::<2>(0), [0.0, 0.0]);
        assert_eq!(arena.combination[0], 0);
    }
}
