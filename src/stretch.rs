//! Phase rotation generators: frequency scaling and time propagation.
//!
//! Both generators produce integer angles for the synthesis stage to add to
//! the spectrum. [`Frequency`] rotates bins to account for the stretch factor
//! within one grain; [`Time`] propagates phase from the previous grain so
//! sinusoids stay continuous across grain boundaries, whatever the hop or
//! playback direction on either side. All arithmetic wraps, which is how
//! angles compose.

use crate::phase::{self, Angle, WideAngle};

/// Per-bin rotation from the stretch factor: each bin's centre frequency is
/// shifted by `1 - 1/|speed|` relative to bin 1.
pub struct Frequency {
    multiplier: i32,
}

impl Frequency {
    const SHIFT: u32 = 8;

    pub fn new(speed: f64) -> Self {
        let speed = speed.abs() as f32 + 1e-20;
        let multiplier = ((1i32 << Self::SHIFT) as f32 / -speed)
            .round()
            .max(i16::MIN as f32) as i32;
        debug_assert!(multiplier <= 0);
        Frequency { multiplier }
    }

    /// Accumulate rotations across `n` bins. At `|speed| == 1` the multiplier
    /// exactly cancels the phase differences and every rotation is zero.
    pub fn rotate(&self, n: usize, rotation: &mut [Angle], phase: &[Angle]) {
        rotation[0] = 0;
        for m in 1..n {
            let delta = phase[m - 1].wrapping_sub(phase[m]);
            let x = ((delta as i32).wrapping_mul(self.multiplier)) >> Self::SHIFT;
            rotation[m] = rotation[m - 1].wrapping_add(x as Angle).wrapping_add(delta);
        }
    }
}

/// Phase propagation from the previous grain, monomorphised over the playback
/// direction of this grain and the previous one so the per-partial loop
/// carries no direction branches.
pub struct Time<const REVERSE: bool, const REVERSE_PREVIOUS: bool> {
    a: WideAngle,
    multiplier: i32,
}

impl<const REVERSE: bool, const REVERSE_PREVIOUS: bool> Time<REVERSE, REVERSE_PREVIOUS> {
    /// Synthesis hop as a log2 fraction of the transform period.
    const LOG2_SYNTHESIS_HOP_REVOLUTION: i32 = -3;

    pub fn new(log2_synthesis_hop: usize, hop: i32, hop_previous: i32) -> Self {
        debug_assert!(REVERSE ^ (hop >= 0));
        debug_assert!(REVERSE_PREVIOUS ^ (hop_previous >= 0));

        let log2_transform_length =
            log2_synthesis_hop as i32 - Self::LOG2_SYNTHESIS_HOP_REVOLUTION;
        let a = hop.wrapping_shl((32 - log2_transform_length) as u32);

        let dividend = (1i32 << log2_synthesis_hop) << 16;
        let divisor = hop << 1;
        let multiplier = if divisor != 0 {
            (dividend + divisor.abs() / 2) / divisor
        } else {
            0
        };

        Time { a, multiplier }
    }

    /// Measured per-grain phase increment of the sinusoid at a peak, reading
    /// each grain's spectrum in its own playback direction.
    #[inline]
    pub fn offset(phase: Angle, previous: Angle) -> Angle {
        let phase = if REVERSE { phase.wrapping_neg() } else { phase };
        let previous = if REVERSE_PREVIOUS {
            previous.wrapping_neg()
        } else {
            previous
        };
        phase.wrapping_sub(previous)
    }

    /// The measured phase advance at the analysis hop, re-expressed as the
    /// equivalent advance at the synthesis hop. The fractional-cycle part of
    /// the advance at bin `m` is carried at 32-bit precision.
    #[inline]
    pub fn delta_wide(&self, phase: WideAngle, previous: WideAngle, m: i32) -> WideAngle {
        let log_s = (32 + Self::LOG2_SYNTHESIS_HOP_REVOLUTION) as u32;
        let da = phase.wrapping_sub(previous).wrapping_sub(m.wrapping_mul(self.a));
        m.wrapping_shl(log_s)
            .wrapping_add((da >> 15).wrapping_mul(self.multiplier))
    }

    #[inline]
    pub fn delta(&self, phase: Angle, previous: Angle, m: i32) -> Angle {
        (self.delta_wide(phase::widen(phase), phase::widen(previous), m) >> 16) as Angle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_speed_rotation_is_zero() {
        let phase: Vec<Angle> = (0..64).map(|m| (m * m * 401 % 65536) as u16 as Angle).collect();
        let mut rotation = vec![0 as Angle; 64];
        Frequency::new(1.0).rotate(64, &mut rotation, &phase);
        assert!(rotation.iter().all(|&r| r == 0));
        Frequency::new(-1.0).rotate(64, &mut rotation, &phase);
        assert!(rotation.iter().all(|&r| r == 0));
    }

    #[test]
    fn half_speed_shifts_bins_halfway() {
        // A linear phase ramp: each bin's rotation step is the phase
        // difference scaled by 1 - 1/|speed| = 1/2.
        let phase: Vec<Angle> = (0..32).map(|m| (-1000 * m as i32) as Angle).collect();
        let mut rotation = vec![0 as Angle; 32];
        Frequency::new(2.0).rotate(32, &mut rotation, &phase);
        for m in 1..32 {
            assert_eq!(rotation[m].wrapping_sub(rotation[m - 1]), 500);
        }
    }

    #[test]
    fn passthrough_forward_delta_matches_offset() {
        // When the analysis hop equals the synthesis hop, the propagated
        // advance is exactly the measured one, so the driver's
        // `offset - stretched` cancellation leaves no rotation.
        let time = Time::<false, false>::new(9, 512, 512);
        for (phase, previous) in [(0, 0), (1234, -4321), (i16::MIN, i16::MAX), (-1, 1)] {
            for m in [1, 2, 100, 2047] {
                assert_eq!(
                    time.delta(phase, previous, m),
                    Time::<false, false>::offset(phase, previous)
                );
            }
        }
    }

    #[test]
    fn passthrough_reverse_delta_matches_offset() {
        let time = Time::<true, true>::new(9, -512, -512);
        for (phase, previous) in [(0, 0), (1234, -4321), (i16::MIN, i16::MAX), (-1, 1)] {
            for m in [1, 2, 100, 2047] {
                assert_eq!(
                    time.delta(phase, previous, m),
                    Time::<true, true>::offset(phase, previous)
                );
            }
        }
    }

    #[test]
    fn half_hop_doubles_the_advance() {
        // Analysis hop 256 against synthesis hop 512: a bin-exact sinusoid at
        // bin 4 advances a quarter turn per analysis hop and must advance a
        // half turn per synthesis hop.
        let time = Time::<false, false>::new(9, 256, 256);
        let quarter_turn = 16384;
        assert_eq!(time.delta(quarter_turn, 0, 4), i16::MIN);
    }

    #[test]
    fn frozen_hop_keeps_bins_spinning() {
        // Hop 0: no measured advance is usable; every bin advances by its own
        // synthesis-rate phase step.
        let time = Time::<false, false>::new(9, 0, 0);
        assert_eq!(time.delta_wide(0, 0, 1), 1 << 29);
        // Bin 1 turns an eighth of a revolution per synthesis hop.
        assert_eq!(time.delta(0, 0, 1), 8192);
    }
}
