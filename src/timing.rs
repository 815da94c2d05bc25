//! Hop policy, request advancement and buffer bounds.

use crate::math;
use crate::output::Output;
use crate::resample::Operations;
use crate::{Request, SampleRates};

const MAX_PITCH_OCTAVES: usize = 2;

/// Timing derived from the sample rates: the synthesis hop is a power of two
/// close to 1/64 s of input audio.
pub struct Timing {
    pub log2_synthesis_hop: usize,
    pub sample_rates: SampleRates,
}

impl Timing {
    pub fn new(sample_rates: SampleRates) -> Self {
        Timing {
            log2_synthesis_hop: math::floor_log2(sample_rates.input) - 6,
            sample_rates,
        }
    }

    /// Upper bound on the frames any input chunk can request, covering two
    /// octaves of pitch shift on top of the analysis span.
    pub fn max_input_frame_count(&self) -> usize {
        let max = ((self.sample_rates.input as u64)
            << (MAX_PITCH_OCTAVES + self.log2_synthesis_hop + 3))
            / self.sample_rates.output as u64;
        max as usize + 1
    }

    /// Upper bound on the frames any output chunk can carry.
    pub fn max_output_frame_count(&self) -> usize {
        Output::max_frame_count(self.log2_synthesis_hop, self.sample_rates)
    }

    /// Input frames covered by one grain of the request, signed.
    pub fn calculate_input_hop(&self, request: &Request) -> f64 {
        let mut operations = Operations::default();
        let unit_hop = (1u64 << self.log2_synthesis_hop) as f64
            * operations.setup(self.sample_rates, request.resample_mode, request.pitch);
        unit_hop * request.speed
    }

    /// Rewind the request so the stretcher has a run-in of grains before the
    /// requested position; without it the first milliseconds sound weak and
    /// initial transients are lost.
    pub fn preroll(&self, request: &mut Request) {
        request.position -= 4.0 * self.calculate_input_hop(request);
        request.reset = true;
    }

    /// Advance the request to the next grain for playback at constant speed.
    pub fn next(&self, request: &mut Request) {
        if !request.speed.is_nan() && !request.position.is_nan() {
            request.position += self.calculate_input_hop(request);
            request.reset = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesis_hop_tracks_the_input_rate() {
        for (rate, log2_hop) in [(8000, 6), (44100, 9), (48000, 9), (96000, 10), (192000, 11)] {
            let timing = Timing::new(SampleRates {
                input: rate,
                output: rate,
            });
            assert_eq!(timing.log2_synthesis_hop, log2_hop);
        }
    }

    #[test]
    fn frame_bounds_cover_the_pitch_range() {
        let timing = Timing::new(SampleRates {
            input: 48000,
            output: 48000,
        });
        // 8x window length times 4x pitch headroom.
        assert_eq!(timing.max_input_frame_count(), 32 * 512 + 1);
        assert_eq!(timing.max_output_frame_count(), 4 * 512 + 1);
    }

    #[test]
    fn next_advances_by_one_hop() {
        let timing = Timing::new(SampleRates {
            input: 48000,
            output: 48000,
        });
        let mut request = Request {
            position: 1000.0,
            speed: 0.5,
            reset: true,
            ..Request::default()
        };
        timing.next(&mut request);
        assert_eq!(request.position, 1000.0 + 256.0);
        assert!(!request.reset);

        // Pitch up under autoOut halves each grain's output span, so the
        // input hop shrinks to match.
        request.pitch = 2.0;
        timing.next(&mut request);
        assert_eq!(request.position, 1000.0 + 256.0 + 128.0);

        // NaN position or speed freezes the request.
        request.position = f64::NAN;
        timing.next(&mut request);
        assert!(request.position.is_nan());
    }

    #[test]
    fn preroll_rewinds_four_hops_and_resets() {
        let timing = Timing::new(SampleRates {
            input: 48000,
            output: 48000,
        });
        let mut request = Request {
            position: 10000.0,
            speed: 1.0,
            ..Request::default()
        };
        timing.preroll(&mut request);
        assert_eq!(request.position, 10000.0 - 4.0 * 512.0);
        assert!(request.reset);
    }
}
