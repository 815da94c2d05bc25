//! The stretcher façade: one object, one grain cycle.
//!
//! Per grain the host calls [`Stretcher::specify_grain`], supplies the
//! requested input span to [`Stretcher::analyse_grain`], and collects audio
//! from [`Stretcher::synthesise_grain`]; the three calls must come in that
//! order and must not overlap for one instance. Instances are independent and
//! share only the process-wide FFT kernel cache. All buffers are allocated
//! here, in the constructor; the grain cycle itself never allocates.

use crate::fourier;
use crate::grains::Grains;
use crate::input::Input;
use crate::output::{Emitted, Output, Segment};
use crate::partials;
use crate::phase;
use crate::resample::Block;
use crate::synthesis;
use crate::timing::Timing;
use crate::{InputChunk, OutputChunk, Request, SampleRates};
use core::f32::consts::PI;
use num_complex::Complex32;

pub struct Stretcher {
    timing: Timing,
    input: Input,
    grains: Grains,
    output: Output,
    scratch: Vec<Complex32>,
    staging: Vec<f32>,
    staging_stride: usize,
    channels: usize,
}

impl Stretcher {
    /// Create a stretcher for the given rates and channel count. Both rates
    /// must lie in `[8000, 192000]` Hz.
    pub fn new(sample_rates: SampleRates, channel_count: usize) -> Self {
        assert!(channel_count >= 1);
        assert!((8000..=192000).contains(&sample_rates.input));
        assert!((8000..=192000).contains(&sample_rates.output));

        let timing = Timing::new(sample_rates);
        let log2_hop = timing.log2_synthesis_hop;
        let staging_stride = timing.max_input_frame_count();
        Stretcher {
            input: Input::new(log2_hop, channel_count),
            grains: Grains::new(log2_hop, channel_count),
            output: Output::new(
                log2_hop,
                channel_count,
                timing.max_output_frame_count(),
                0.25,
                &[1.0, 0.5],
            ),
            scratch: vec![Complex32::default(); fourier::scratch_length(log2_hop + 3)],
            staging: vec![0.0; staging_stride * channel_count],
            staging_stride,
            channels: channel_count,
            timing,
        }
    }

    pub fn sample_rates(&self) -> SampleRates {
        self.timing.sample_rates
    }

    pub fn channel_count(&self) -> usize {
        self.channels
    }

    /// Largest `InputChunk::frame_count` that [`Self::specify_grain`] can
    /// request; size input buffers to this.
    pub fn max_input_frame_count(&self) -> usize {
        self.timing.max_input_frame_count()
    }

    /// Largest `OutputChunk::frame_count` that [`Self::synthesise_grain`] can
    /// emit.
    pub fn max_output_frame_count(&self) -> usize {
        self.timing.max_output_frame_count()
    }

    /// Rewind `request.position` a few grains so the stretcher has a run-in
    /// before the requested position, and mark it discontinuous.
    pub fn preroll(&self, request: &mut Request) {
        self.timing.preroll(request);
    }

    /// Advance `request` to the next grain for constant-speed playback.
    pub fn next(&self, request: &mut Request) {
        self.timing.next(request);
    }

    /// True once every grain in the pipeline is invalid: after four flushing
    /// grains the tail of the output has fully drained.
    pub fn is_flushed(&self) -> bool {
        self.grains.flushed()
    }

    /// Rotate the ring, plan the incoming grain and report the input span to
    /// supply to [`Self::analyse_grain`].
    pub fn specify_grain(&mut self, request: &Request) -> InputChunk {
        self.grains.rotate();
        let sample_rates = self.timing.sample_rates;
        let log2_hop = self.timing.log2_synthesis_hop;
        let (grain, previous) = self.grains.newest_and_previous();
        grain.specify(request, previous, sample_rates, log2_hop)
    }

    /// Analyse the grain: window, transform, and segment the spectrum into
    /// partials. `data` is planar audio covering the chunk returned by
    /// [`Self::specify_grain`], channel `c` starting at `data[c * channel_stride]`.
    pub fn analyse_grain(&mut self, data: &[f32], channel_stride: usize) {
        let channels = self.channels;
        let staging_stride = self.staging_stride;
        let (grain, previous) = self.grains.newest_and_previous();

        grain.valid_bin_count = 0;
        if !grain.valid() {
            return;
        }

        let frames = grain.input_chunk.frame_count();
        debug_assert!(frames <= staging_stride);
        debug_assert!(data.len() >= (channels - 1) * channel_stride + frames);

        // The input resampler reads through an owned staging copy so its
        // fixed signature can treat the variable side uniformly.
        let resampled = if grain.resample.input.function.is_some() {
            for c in 0..channels {
                self.staging[c * staging_stride..c * staging_stride + frames]
                    .copy_from_slice(&data[c * channel_stride..c * channel_stride + frames]);
            }
            let mut block = Block {
                data: &mut self.staging,
                stride: staging_stride,
                frames,
            };
            grain.resample_input(&mut block)
        } else {
            false
        };

        let log2_transform_length = if resampled {
            let frame_count = grain.input_resampled.frame_count;
            self.input.apply_analysis_window(
                grain.input_resampled.emitted(frame_count),
                grain.input_resampled.stride(),
                frame_count,
            )
        } else {
            self.input.apply_analysis_window(data, channel_stride, frames)
        };
        grain.log2_transform_length = log2_transform_length;

        let transform_length = 1 << log2_transform_length;
        let bins = fourier::bin_count(log2_transform_length);
        for c in 0..channels {
            fourier::forward(
                log2_transform_length,
                &mut self.input.windowed[c * transform_length..(c + 1) * transform_length],
                &mut grain.transformed[c * bins..c * bins + bins],
                &mut self.scratch,
            );
        }

        // Bins that the output resampler would alias are dropped here.
        let top = bins - 1;
        grain.valid_bin_count =
            ((top as f64 / grain.resample.output.ratio as f64).ceil() as usize).min(top) + 1;
        for c in 0..channels {
            grain.transformed[c * bins + grain.valid_bin_count..(c + 1) * bins]
                .fill(Complex32::default());
        }

        for bin in 0..grain.valid_bin_count {
            let mut sum = Complex32::default();
            for c in 0..channels {
                sum += grain.transformed[c * bins + bin];
            }
            grain.energy[bin] = sum.re * sum.re + sum.im * sum.im;
            grain.phase[bin] = phase::from_radians(sum.arg());
        }

        partials::enumerate(&mut grain.partials, grain.valid_bin_count, &mut grain.energy);

        if grain.continuous {
            partials::suppress_transients(&mut grain.partials, &grain.energy, &previous.energy);
        }
    }

    /// Synthesise the grain and emit the oldest slot's finished audio.
    pub fn synthesise_grain(&mut self) -> OutputChunk<'_> {
        let log2_hop = self.timing.log2_synthesis_hop;
        let channels = self.channels;

        {
            let (grain, previous) = self.grains.newest_and_previous();
            if grain.valid() {
                debug_assert!(
                    grain.passthrough == 0 || grain.analysis.speed == grain.passthrough as f64
                );

                synthesis::synthesise(log2_hop, grain, previous);

                let bins = fourier::bin_count(grain.log2_transform_length);
                let reverse = grain.reverse();
                for bin in 0..grain.valid_bin_count {
                    let theta = grain.rotation[bin] as f32 * (PI / 0x8000 as f32);
                    let rotation = Complex32::new(theta.cos(), theta.sin());
                    for c in 0..channels {
                        let z = &mut grain.transformed[c * bins + bin];
                        let value = if reverse { z.conj() } else { *z };
                        *z = value * rotation;
                    }
                }

                let transform_length = 1 << grain.log2_transform_length;
                for c in 0..channels {
                    fourier::inverse(
                        grain.log2_transform_length,
                        &mut self.output.inverse_transformed
                            [c * transform_length..(c + 1) * transform_length],
                        &mut grain.transformed[c * bins..c * bins + bins],
                        &mut self.scratch,
                    );
                }
            }
        }

        self.output.apply_synthesis_window(log2_hop, &mut self.grains);

        {
            let (emitting, next) = self.grains.emitting_pair();
            Segment::lap_padding(&mut emitting.segment, &mut next.segment);
        }

        // The emitted span runs between slot 2's and slot 1's requests; their
        // output ratios bracket the block.
        let operation_begin = self.grains[2].resample.output;
        let operation_end = self.grains[1].resample.output;
        let stride = self.output.buffer_stride();
        let emitted = {
            let mut block = Block {
                data: &mut self.output.buffer_resampled,
                stride,
                frames: stride,
            };
            self.grains.get_mut(3).segment.resample(
                &mut self.output.resample_offset,
                operation_begin,
                operation_end,
                &mut block,
            )
        };

        let all_zeros = self.grains[3].segment.lapped.all_zeros;
        match emitted {
            Emitted::Resampled(frame_count) => {
                let span = (channels - 1) * stride + frame_count;
                if all_zeros {
                    self.output.buffer_resampled[..span].fill(0.0);
                }
                OutputChunk {
                    data: &self.output.buffer_resampled[..span],
                    frame_count,
                    channel_stride: stride,
                    request: [&self.grains[2].request, &self.grains[1].request],
                }
            }
            Emitted::Lapped(frame_count) => {
                if all_zeros {
                    self.grains.get_mut(3).segment.lapped.zero_emitted(frame_count);
                }
                let lapped = &self.grains[3].segment.lapped;
                OutputChunk {
                    data: lapped.emitted(frame_count),
                    frame_count,
                    channel_stride: lapped.stride(),
                    request: [&self.grains[2].request, &self.grains[1].request],
                }
            }
        }
    }
}
