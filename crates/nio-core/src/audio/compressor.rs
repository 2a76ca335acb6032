//! Output compressor: a stereo peak limiter that keeps samples inside [-1, +1]
//!
//! Applied sample by sample after the engine rendered and before the samples
//! leave the process. Each stereo output pair has its own peak follower so
//! a loud part cannot duck a quiet one.
//!
//! # Algorithm
//!
//! 1. Non-finite input samples are replaced by silence.
//! 2. The stereo magnitude `max(|l|, |r|)` is the follower's target.
//! 3. **Attack** is instant: a louder target replaces the peak immediately.
//! 4. **Release** is linear: the peak falls toward the target by
//!    `1 / (RELEASE_SECS × sample_rate)` per sample, never below it.
//! 5. While the peak exceeds unity both channels are divided by it.
//!
//! Since `|l|, |r| ≤ target ≤ peak`, the output is bounded by 1 in either
//! case. Silence in keeps the peak at zero.

use crate::types::MAX_PARTS;

// ═══════════════════════════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════════════════════════

/// Time for the follower to fall by 1.0 (full scale) in seconds
const RELEASE_SECS: f32 = 0.5;

/// Gain ceiling
const UNITY: f32 = 1.0;

// ═══════════════════════════════════════════════════════════════════════════════
// Compressor
// ═══════════════════════════════════════════════════════════════════════════════

/// Limit one stereo sample in place, updating the pair's `peak` follower.
#[inline]
pub fn stereo_compressor(sample_rate: u32, peak: &mut f32, l: &mut f32, r: &mut f32) {
    if !l.is_finite() {
        *l = 0.0;
    }
    if !r.is_finite() {
        *r = 0.0;
    }
    if !peak.is_finite() || *peak < 0.0 {
        *peak = 0.0;
    }

    let target = l.abs().max(r.abs());
    if target > *peak {
        *peak = target;
    } else {
        let step = UNITY / (RELEASE_SECS * sample_rate.max(1) as f32);
        *peak = (*peak - step).max(target);
    }

    if *peak > UNITY {
        *l /= *peak;
        *r /= *peak;
    }
}

/// Peak followers for every output pair
///
/// Fixed size so the realtime thread never allocates. Index 0 is the master
/// mix; the DSP device backend uses one entry per routed part.
#[derive(Debug, Clone)]
pub struct PeakBank {
    peaks: [f32; MAX_PARTS],
}

impl Default for PeakBank {
    fn default() -> Self {
        Self {
            peaks: [0.0; MAX_PARTS],
        }
    }
}

impl PeakBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current follower value of `pair` (0.0 for out-of-range pairs)
    pub fn peak(&self, pair: usize) -> f32 {
        self.peaks.get(pair).copied().unwrap_or(0.0)
    }

    /// Limit one sample of `pair`; out-of-range pairs use the last follower
    #[inline]
    pub fn apply(&mut self, sample_rate: u32, pair: usize, l: &mut f32, r: &mut f32) {
        let idx = pair.min(MAX_PARTS - 1);
        stereo_compressor(sample_rate, &mut self.peaks[idx], l, r);
    }

    /// Limit two channel buffers of `pair` in place
    pub fn apply_buffers(&mut self, sample_rate: u32, pair: usize, left: &mut [f32], right: &mut [f32]) {
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            self.apply(sample_rate, pair, l, r);
        }
    }

    /// Forget all peak history
    pub fn reset(&mut self) {
        self.peaks = [0.0; MAX_PARTS];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 48000;

    #[test]
    fn test_silence_keeps_peak_at_zero() {
        let mut peak = 0.0;
        for _ in 0..1024 {
            let (mut l, mut r) = (0.0f32, 0.0f32);
            stereo_compressor(SR, &mut peak, &mut l, &mut r);
            assert_eq!((l, r), (0.0, 0.0));
        }
        assert_eq!(peak, 0.0);
    }

    #[test]
    fn test_below_unity_passes_through() {
        let mut peak = 0.0;
        let (mut l, mut r) = (0.5f32, -0.25f32);
        stereo_compressor(SR, &mut peak, &mut l, &mut r);
        assert_eq!((l, r), (0.5, -0.25));
        assert_eq!(peak, 0.5);
    }

    #[test]
    fn test_output_bounded_for_any_input() {
        let inputs = [
            (0.0f32, 0.0f32),
            (1.0, -1.0),
            (4.0, 0.5),
            (-100.0, 2.0),
            (1e30, -1e30),
            (f32::INFINITY, 0.3),
            (f32::NAN, -7.0),
            (0.9, 0.9),
            (1.0001, -0.9999),
        ];
        let mut peak = 0.0;
        for _ in 0..3 {
            for &(li, ri) in &inputs {
                let (mut l, mut r) = (li, ri);
                stereo_compressor(SR, &mut peak, &mut l, &mut r);
                assert!(
                    (-1.0..=1.0).contains(&l) && (-1.0..=1.0).contains(&r),
                    "({}, {}) -> ({}, {}) escaped [-1, 1]",
                    li,
                    ri,
                    l,
                    r
                );
            }
        }
    }

    #[test]
    fn test_release_is_gradual() {
        let mut peak = 0.0;
        let (mut l, mut r) = (2.0f32, 2.0f32);
        stereo_compressor(SR, &mut peak, &mut l, &mut r);
        assert_eq!(peak, 2.0);

        let (mut l, mut r) = (1.0f32, 1.0f32);
        stereo_compressor(SR, &mut peak, &mut l, &mut r);
        assert!(peak < 2.0 && peak > 1.9, "peak should release slowly, got {}", peak);
        assert!(l < 1.0, "still attenuating while the follower is above unity");
    }

    #[test]
    fn test_pairs_have_independent_headroom() {
        let mut bank = PeakBank::new();
        let (mut l, mut r) = (3.0f32, 3.0f32);
        bank.apply(SR, 0, &mut l, &mut r);

        let (mut l, mut r) = (0.5f32, 0.5f32);
        bank.apply(SR, 1, &mut l, &mut r);
        assert_eq!((l, r), (0.5, 0.5), "pair 1 must not be ducked by pair 0");
        assert_eq!(bank.peak(0), 3.0);
        assert_eq!(bank.peak(1), 0.5);
    }
}
