//! Integer angles in the interval `[-pi, pi)`.
//!
//! A 16-bit signed integer spans one full turn, so adding and subtracting
//! angles wraps exactly where the circle does. All arithmetic on these values
//! must use the `wrapping_*` family; overflow is the intended behaviour, not an
//! error. A 32-bit variant carries sub-LSB precision through the time-stretch
//! propagator.

use core::f32::consts::TAU;

/// Angle with 16-bit resolution: `-0x8000` is `-pi`, `0x7fff` just under `pi`.
pub type Angle = i16;

/// Angle with 16 extra fractional bits.
pub type WideAngle = i32;

/// Extend an angle with zero fractional bits.
#[inline]
pub fn widen(angle: Angle) -> WideAngle {
    (angle as WideAngle) << 16
}

/// Drop the fractional bits of a wide angle.
#[inline]
pub fn narrow(angle: WideAngle) -> Angle {
    (angle >> 16) as Angle
}

/// Angle as a fraction of a full turn in `[-0.5, 0.5)`.
#[inline]
pub fn to_revolutions(angle: Angle) -> f32 {
    angle as f32 * (1.0 / 65536.0)
}

/// Angle from a fraction of a full turn; wraps outside `[-0.5, 0.5)`.
#[inline]
pub fn from_revolutions(revolutions: f32) -> Angle {
    (revolutions * 65536.0) as i64 as Angle
}

/// Angle in radians.
#[inline]
pub fn to_radians(angle: Angle) -> f32 {
    angle as f32 * (TAU / 65536.0)
}

/// Angle from radians, rounded to the nearest representable value; wraps
/// outside `[-pi, pi)`.
#[inline]
pub fn from_radians(radians: f32) -> Angle {
    (radians * (65536.0 / TAU)).round() as i64 as Angle
}

/// Angle reached after `time` samples of a cycle lasting `1 << log2_period`
/// samples. `log2_period` must not exceed 16.
#[inline]
pub fn from_time(time: f64, log2_period: usize) -> Angle {
    debug_assert!(log2_period <= 16);
    let shift = 16 - log2_period;
    ((1u64 << shift) as f64 * time) as i64 as Angle
}

/// As [`from_time`] but at 32-bit resolution. `log2_period` must not exceed 32.
#[inline]
pub fn wide_from_time(time: f64, log2_period: usize) -> WideAngle {
    debug_assert!(log2_period <= 32);
    let shift = 32 - log2_period;
    ((1u64 << shift) as f64 * time) as i64 as WideAngle
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revolutions_round_trip() {
        for x in i16::MIN..=i16::MAX {
            assert_eq!(from_revolutions(to_revolutions(x)), x);
        }
    }

    #[test]
    fn radians_round_trip() {
        for x in i16::MIN..=i16::MAX {
            assert_eq!(from_radians(to_radians(x)), x);
        }
    }

    #[test]
    fn wraps_at_half_turn() {
        assert_eq!(from_revolutions(0.5), i16::MIN);
        assert_eq!(from_radians(core::f32::consts::PI), i16::MIN);
        assert_eq!(from_time(0.5, 0), i16::MIN);
    }

    #[test]
    fn composes_by_wrapping() {
        let quarter = from_revolutions(0.25);
        let half = quarter.wrapping_add(quarter);
        assert_eq!(half, i16::MIN);
        assert_eq!(half.wrapping_add(half), 0);
    }

    #[test]
    fn wide_precision() {
        for x in [-0x8000, -0x1234, 0, 0x0001, 0x7fff] {
            assert_eq!(narrow(widen(x as Angle)), x as Angle);
        }
        assert_eq!(wide_from_time(0.5, 0), i32::MIN);
        assert_eq!(narrow(wide_from_time(0.25, 0)), from_time(0.25, 0));
    }
}
