//! Per-grain state and the planning step.
//!
//! A grain is specified once per cycle: the plan fixes its resample ratios,
//! analysis hop and required input span, and is immutable for the rest of the
//! cycle. Analysis fills the spectral buffers; synthesis consumes them and
//! leaves one quadrant of output in the grain's segment.

use crate::fourier;
use crate::output::Segment;
use crate::partials::Partial;
use crate::phase::Angle;
use crate::resample::{Block, Operations, Padded};
use crate::{InputChunk, Request, SampleRates};
use num_complex::Complex32;

/// Analysis timing derived while planning the grain.
#[derive(Clone, Copy, Debug, Default)]
pub struct Analysis {
    /// Sub-sample error between the rounded and ideal grain positions,
    /// carried forward so consecutive hops stay honest.
    pub position_error: f64,
    /// Unrounded analysis hop.
    pub hop_ideal: f64,
    /// `hop_ideal / synthesisHop`.
    pub speed: f64,
    /// Rounded analysis hop in input frames; negative plays in reverse.
    pub hop: i32,
}

pub struct Grain {
    pub log2_transform_length: usize,
    pub request: Request,

    pub request_hop: f64,
    pub continuous: bool,
    /// `±1` when the grain can pass through unchanged (`|speed| == 1` with a
    /// consistent direction), else 0.
    pub passthrough: i32,
    pub valid_bin_count: usize,

    pub resample: Operations,
    pub input_chunk: InputChunk,
    pub analysis: Analysis,

    /// Spectrum, one `binCount` run per channel.
    pub transformed: Vec<Complex32>,
    /// Channel-summed phase per bin.
    pub phase: Vec<Angle>,
    /// Channel-summed energy per bin, with two spare slots for the partial
    /// enumerator's sentinels.
    pub energy: Vec<f32>,
    pub rotation: Vec<Angle>,
    /// Rotation adjustment per partial.
    pub delta: Vec<Angle>,
    pub partials: Vec<Partial>,

    pub input_resampled: Padded,
    pub segment: Segment,
}

impl Grain {
    pub fn new(log2_synthesis_hop: usize, channels: usize) -> Self {
        let log2_transform_length = log2_synthesis_hop + 3;
        let transform_length = 1 << log2_transform_length;
        let bins = fourier::bin_count(log2_transform_length);
        Grain {
            log2_transform_length,
            request: Request::default(),
            request_hop: 0.0,
            continuous: false,
            passthrough: 0,
            valid_bin_count: 0,
            resample: Operations::default(),
            input_chunk: InputChunk { begin: 0, end: 0 },
            analysis: Analysis::default(),
            transformed: vec![Complex32::default(); bins * channels],
            phase: vec![0; bins],
            energy: vec![0.0; bins + 2],
            rotation: vec![0; bins],
            delta: vec![0; bins],
            partials: Vec::with_capacity(transform_length),
            input_resampled: Padded::new(transform_length, channels),
            segment: Segment::new(log2_synthesis_hop, channels),
        }
    }

    /// Plan the grain: resample ratios, analysis hop, passthrough state and
    /// the input span the host must supply.
    pub fn specify(
        &mut self,
        request: &Request,
        previous: &Grain,
        sample_rates: SampleRates,
        log2_synthesis_hop: usize,
    ) -> InputChunk {
        debug_assert!(request.pitch > 0.0);
        self.request = *request;

        let synthesis_hop = (1u64 << log2_synthesis_hop) as f64;
        let unit_hop = synthesis_hop
            * self
                .resample
                .setup(sample_rates, request.resample_mode, request.pitch);

        self.request_hop = request.position - previous.request.position;
        if self.request_hop.is_nan() || request.reset {
            self.request_hop = request.speed * unit_hop;
        }

        self.analysis.hop_ideal = self.request_hop * self.resample.input.ratio as f64;

        self.continuous = !request.reset && !previous.request.position.is_nan();
        if self.continuous {
            self.analysis.position_error = previous.analysis.position_error - self.analysis.hop_ideal;
            self.analysis.hop = (-self.analysis.position_error).round() as i32;
            self.analysis.position_error += self.analysis.hop as f64;
        } else {
            self.analysis.hop = self.analysis.hop_ideal.round() as i32;
            self.analysis.position_error = request.position.round() - request.position;
        }

        self.analysis.speed = self.analysis.hop_ideal / synthesis_hop;

        self.passthrough = if self.analysis.speed.abs() == 1.0 {
            self.analysis.speed as i32
        } else {
            0
        };
        if self.continuous && self.passthrough != previous.passthrough {
            self.passthrough = 0;
        }

        self.log2_transform_length = log2_synthesis_hop + 3;
        self.input_resampled.frame_count = 1 << self.log2_transform_length;

        let mut half = (self.input_resampled.frame_count / 2) as isize;
        if self.resample.input.ratio != 1.0 {
            half = (half as f64 / self.resample.input.ratio as f64).round() as isize + 1;
        }
        let centre = request.position.round() as isize;
        self.input_chunk = InputChunk {
            begin: centre - half,
            end: centre + half,
        };
        self.input_chunk
    }

    #[inline]
    pub fn reverse(&self) -> bool {
        self.analysis.hop < 0
    }

    #[inline]
    pub fn valid(&self) -> bool {
        !self.request.position.is_nan()
    }

    /// Resample the supplied chunk onto the fixed analysis grid. Returns false
    /// when the plan has no input-side resampling and the chunk should be
    /// windowed directly.
    pub fn resample_input(&mut self, variable: &mut Block) -> bool {
        let Some(function) = self.resample.input.function else {
            return false;
        };

        let ratio = self.resample.input.ratio;
        let mut offset = (self.input_chunk.begin as f64 - self.request.position) as f32;
        offset *= ratio;
        offset += (self.input_resampled.frame_count / 2) as f32;
        offset -= self.analysis.position_error as f32;

        function(
            &mut self.input_resampled,
            &mut offset,
            variable,
            ratio,
            ratio,
            false,
        );
        true
    }
}
