//! Overlap-add of synthesis quadrants and output-side resampling.
//!
//! Each ring slot owns one segment of output: a padded, lapped buffer one
//! synthesis hop long. Every synthesised grain spreads its windowed inverse
//! transform across the four slots' segments; by the time a slot reaches the
//! emitting position its segment has collected all four contributions and can
//! be handed out directly or through the output resampler.

use crate::fourier;
use crate::grains::Grains;
use crate::resample::{
    resample, Block, FixedToVariable, Function, Operation, Padded, Skip, PADDING,
};
use crate::window;
use crate::SampleRates;

/// How a finished segment left the engine.
pub enum Emitted {
    /// Taken straight from the slot's lapped buffer: this many frames.
    Lapped(usize),
    /// Produced through the output resampler into the shared buffer.
    Resampled(usize),
}

/// One ring slot's output: a lapped quadrant buffer plus the flag deciding
/// whether its guard bands must be stitched before resampling.
pub struct Segment {
    pub lapped: Padded,
    pub needs_resample: bool,
}

impl Segment {
    pub fn new(log2_frame_count: usize, channels: usize) -> Self {
        Segment {
            lapped: Padded::new(1 << log2_frame_count, channels),
            needs_resample: false,
        }
    }

    /// Stitch the guard bands between the emitting segment and its successor
    /// so bilinear taps across the boundary read real audio, or silence when
    /// the neighbour never received a contribution.
    pub fn lap_padding(current: &mut Segment, next: &mut Segment) {
        let frame_count = current.lapped.frame_count;

        if current.needs_resample {
            for c in 0..current.lapped.channels() {
                let overhang = PADDING + frame_count;
                if next.lapped.all_zeros {
                    current.lapped.raw_mut(c)[overhang..overhang + PADDING].fill(0.0);
                } else {
                    current.lapped.raw_mut(c)[overhang..overhang + PADDING]
                        .copy_from_slice(&next.lapped.raw(c)[PADDING..2 * PADDING]);
                }
            }
        }

        if current.needs_resample || next.needs_resample {
            for c in 0..current.lapped.channels() {
                if current.lapped.all_zeros {
                    next.lapped.raw_mut(c)[..PADDING].fill(0.0);
                } else {
                    next.lapped.raw_mut(c)[..PADDING]
                        .copy_from_slice(&current.lapped.raw(c)[frame_count..frame_count + PADDING]);
                }
            }
        }
    }

    /// Emit the segment, resampling when either bracketing grain asks for it.
    /// The ratio blends from the earlier grain's to the later grain's across
    /// the block, aligning the final sample whenever the end ratio is unity.
    pub fn resample(
        &mut self,
        resample_offset: &mut f32,
        mut begin: Operation,
        mut end: Operation,
        buffer: &mut Block,
    ) -> Emitted {
        if begin.function.is_none() {
            begin.ratio = 1.0;
        }
        if end.function.is_none() {
            end.ratio = 1.0;
            end.function = begin.function;
        }

        match end.function {
            Some(function) => {
                let function = if self.lapped.all_zeros {
                    resample::<FixedToVariable, Skip> as Function
                } else {
                    function
                };
                let align_end = end.ratio == 1.0;
                let frames = function(
                    &mut self.lapped,
                    resample_offset,
                    buffer,
                    begin.ratio,
                    end.ratio,
                    align_end,
                );
                Emitted::Resampled(frames)
            }
            None => Emitted::Lapped(self.lapped.frame_count),
        }
    }
}

pub struct Output {
    pub synthesis_window: Vec<f32>,
    /// Inverse transform workspace, one transform length per channel.
    pub inverse_transformed: Vec<f32>,
    /// Output resampler destination, one `max_frame_count` run per channel.
    pub buffer_resampled: Vec<f32>,
    pub resample_offset: f32,
    max_frame_count: usize,
    channels: usize,
}

impl Output {
    /// Upper bound on frames emitted per grain, allowing two octaves of
    /// downward pitch shift.
    pub fn max_frame_count(log2_synthesis_hop: usize, sample_rates: SampleRates) -> usize {
        const MAX_PITCH_OCTAVES: usize = 2;
        let max = ((sample_rates.output as u64) << (MAX_PITCH_OCTAVES + log2_synthesis_hop))
            / sample_rates.input as u64;
        max as usize + 1
    }

    pub fn new(
        log2_synthesis_hop: usize,
        channels: usize,
        max_frame_count: usize,
        window_gain: f32,
        window_coefficients: &[f32],
    ) -> Self {
        let output = Output {
            synthesis_window: window::from_frequency_domain_coefficients(
                log2_synthesis_hop + 2,
                window_gain,
                window_coefficients,
            ),
            inverse_transformed: vec![0.0; (8 << log2_synthesis_hop) * channels],
            buffer_resampled: vec![0.0; max_frame_count * channels],
            resample_offset: 0.0,
            max_frame_count,
            channels,
        };
        fourier::prepare_inverse(log2_synthesis_hop + 3);
        output
    }

    #[inline]
    pub fn buffer_stride(&self) -> usize {
        self.max_frame_count
    }

    /// Spread the newest grain's inverse transform across the four slots'
    /// segments. Quadrant `i` of the synthesis window (in XOR order) weights
    /// the transform quadrant `(i + hopsPerTransform - 2) mod hopsPerTransform`
    /// into slot `3 - i`; the first touch of a segment overwrites, later
    /// touches accumulate. Invalid grains leave untouched segments zeroed.
    pub fn apply_synthesis_window(&mut self, log2_synthesis_hop: usize, grains: &mut Grains) {
        let quadrant_size = self.synthesis_window.len() / 4;
        let transform_length = 8 << log2_synthesis_hop;
        let hops_per_transform = 1 << (grains[0].log2_transform_length - log2_synthesis_hop);
        let valid = grains[0].valid();

        {
            let newest = &mut grains[0].segment.lapped;
            newest.frame_count = 0;
            newest.all_zeros = true;
        }

        for i in 0..4 {
            let window =
                &self.synthesis_window[quadrant_size * (i ^ 2)..quadrant_size * ((i ^ 2) + 1)];
            let j = (i + hops_per_transform - 2) % hops_per_transform;

            let quadrant = &mut grains[3 - i].segment.lapped;
            if valid {
                let add = quadrant.frame_count != 0;
                for c in 0..self.channels {
                    let transformed = &self.inverse_transformed
                        [c * transform_length + quadrant_size * j..][..quadrant_size];
                    window::APPLY[add as usize](
                        window,
                        transformed,
                        &mut quadrant.unpadded_mut(c)[..quadrant_size],
                    );
                }
                quadrant.all_zeros = false;
            } else if quadrant.frame_count == 0 {
                for c in 0..self.channels {
                    quadrant.unpadded_mut(c)[..quadrant_size].fill(0.0);
                }
            }
            quadrant.frame_count = quadrant_size;
        }

        let needs_resample = grains[1].resample.output.function.is_some()
            || grains[0].resample.output.function.is_some();
        grains[2].segment.needs_resample = needs_resample;
    }
}
