//! Fractional-rate resampling with linearly varying ratio.
//!
//! One resampler core serves both ends of the grain pipeline. On the input
//! side it accumulates variable-rate samples onto a fixed-rate buffer
//! ([`VariableToFixed`]); on the output side it reads a fixed-rate buffer at
//! variable positions ([`FixedToVariable`]). The interpolation axis
//! ([`Nearest`], [`Bilinear`], [`Skip`]) is orthogonal. Both axes are
//! monomorphised so the per-sample loop carries no flag branches; callers
//! select a specialisation once per block through an [`Operation`] record.
//!
//! Fixed-rate buffers are [`Padded`]: guard bands on both sides absorb the
//! interpolation taps at `x + 1` so the inner loop needs no bounds checks.

use crate::{ResampleMode, SampleRates};

/// Guard frames on each side of a padded buffer: at least 6, rounded up to
/// SIMD alignment.
pub const PADDING: usize = 8;

/// Fixed-rate planar buffer with `PADDING` guard frames on both sides of
/// every channel.
pub struct Padded {
    data: Vec<f32>,
    stride: usize,
    channels: usize,
    /// Valid frames, set by the producing stage.
    pub frame_count: usize,
    /// False once any non-zero sample may have been laid into the buffer.
    pub all_zeros: bool,
}

impl Padded {
    pub fn new(max_frame_count: usize, channels: usize) -> Self {
        let stride = PADDING + max_frame_count + PADDING;
        Padded {
            data: vec![0.0; stride * channels],
            stride,
            channels,
            frame_count: 0,
            all_zeros: true,
        }
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    #[inline]
    pub fn max_frame_count(&self) -> usize {
        self.stride - 2 * PADDING
    }

    /// One channel including both guard bands; index `PADDING` is frame 0.
    #[inline]
    pub fn raw(&self, channel: usize) -> &[f32] {
        &self.data[channel * self.stride..(channel + 1) * self.stride]
    }

    #[inline]
    pub fn raw_mut(&mut self, channel: usize) -> &mut [f32] {
        &mut self.data[channel * self.stride..(channel + 1) * self.stride]
    }

    /// One channel without the guard bands.
    #[inline]
    pub fn unpadded(&self, channel: usize) -> &[f32] {
        let begin = channel * self.stride + PADDING;
        &self.data[begin..begin + self.max_frame_count()]
    }

    #[inline]
    pub fn unpadded_mut(&mut self, channel: usize) -> &mut [f32] {
        let begin = channel * self.stride + PADDING;
        let end = begin + self.max_frame_count();
        &mut self.data[begin..end]
    }

    pub fn set_zero(&mut self) {
        self.data.fill(0.0);
    }

    /// Contiguous region spanning `frame_count` frames of every channel,
    /// suitable for handing out as planar audio with [`Self::stride`].
    pub fn emitted(&self, frame_count: usize) -> &[f32] {
        &self.data[PADDING..PADDING + (self.channels - 1) * self.stride + frame_count]
    }

    pub fn zero_emitted(&mut self, frame_count: usize) {
        let end = PADDING + (self.channels - 1) * self.stride + frame_count;
        self.data[PADDING..end].fill(0.0);
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }
}

/// Variable-rate planar audio block: channel `c`, frame `i` lives at
/// `data[c * stride + i]`. `frames` is the block's capacity.
pub struct Block<'a> {
    pub data: &'a mut [f32],
    pub stride: usize,
    pub frames: usize,
}

impl<'a> Block<'a> {
    #[inline]
    fn sample_mut(&mut self, channel: usize, frame: usize) -> &mut f32 {
        &mut self.data[channel * self.stride + frame]
    }
}

/// Which buffer the taps write: the transfer direction of the resampler.
pub trait Direction {
    /// True when the fixed buffer accumulates and must start from silence.
    const WRITES_FIXED: bool;

    fn apply_gain(coefficient: f32, gain: f32) -> f32;

    fn tap<const FIRST: bool>(fixed: &mut f32, variable: &mut f32, coefficient: f32);
}

/// Output side: sample a fixed-rate buffer at variable positions.
pub struct FixedToVariable;

impl Direction for FixedToVariable {
    const WRITES_FIXED: bool = false;

    #[inline]
    fn apply_gain(coefficient: f32, _gain: f32) -> f32 {
        coefficient
    }

    #[inline]
    fn tap<const FIRST: bool>(fixed: &mut f32, variable: &mut f32, coefficient: f32) {
        if FIRST {
            *variable = *fixed * coefficient;
        } else {
            *variable += *fixed * coefficient;
        }
    }
}

/// Input side: accumulate variable-rate samples onto a fixed-rate buffer.
/// Taps carry the instantaneous ratio as gain so energy is conserved.
pub struct VariableToFixed;

impl Direction for VariableToFixed {
    const WRITES_FIXED: bool = true;

    #[inline]
    fn apply_gain(coefficient: f32, gain: f32) -> f32 {
        coefficient * gain
    }

    #[inline]
    fn tap<const FIRST: bool>(fixed: &mut f32, variable: &mut f32, coefficient: f32) {
        *fixed += *variable * coefficient;
    }
}

/// Per-step interpolation kernel.
pub trait Interpolation {
    fn step<D: Direction>(x: f32, fixed: &mut Padded, variable: &mut Block, frame: usize, gain: f32);
}

/// Single tap at the nearest fixed sample.
pub struct Nearest;

impl Interpolation for Nearest {
    #[inline]
    fn step<D: Direction>(x: f32, fixed: &mut Padded, variable: &mut Block, frame: usize, gain: f32) {
        let index = (x + 0.5) as usize;
        let channels = fixed.channels;
        for c in 0..channels {
            let f = fixed.raw_mut(c);
            D::tap::<true>(&mut f[index], variable.sample_mut(c, frame), D::apply_gain(1.0, gain));
        }
    }
}

/// Two taps, linear in the fractional offset. The default.
pub struct Bilinear;

impl Interpolation for Bilinear {
    #[inline]
    fn step<D: Direction>(x: f32, fixed: &mut Padded, variable: &mut Block, frame: usize, gain: f32) {
        let index = x as usize;
        let k = x - index as f32;
        let channels = fixed.channels;
        for c in 0..channels {
            let f = fixed.raw_mut(c);
            let v = variable.sample_mut(c, frame);
            D::tap::<true>(&mut f[index + 1], &mut *v, D::apply_gain(k, gain));
            D::tap::<false>(&mut f[index], &mut *v, D::apply_gain(1.0 - k, gain));
        }
    }
}

/// No taps at all: advances timing across segments known to be silent.
pub struct Skip;

impl Interpolation for Skip {
    #[inline]
    fn step<D: Direction>(
        _x: f32,
        _fixed: &mut Padded,
        _variable: &mut Block,
        _frame: usize,
        _gain: f32,
    ) {
    }
}

fn resample_inner<D: Direction, I: Interpolation, const RATIO_CHANGE: bool>(
    variable_frame_count: usize,
    fixed: &mut Padded,
    fixed_buffer_offset: &mut f32,
    variable: &mut Block,
    ratio_begin: f32,
    ratio_end: f32,
) {
    let ratio_gradient = (ratio_end - ratio_begin) / variable_frame_count as f32;
    debug_assert!(RATIO_CHANGE || ratio_gradient == 0.0 || variable_frame_count == 0);

    if D::WRITES_FIXED {
        fixed.set_zero();
    }

    let offset = PADDING as f32 + *fixed_buffer_offset;
    let mut ratio = ratio_begin;
    for i in 0..variable_frame_count {
        if RATIO_CHANGE {
            // The step position uses the mean of the begin ratio and the
            // previous step's ratio so the offset accumulates exactly.
            let x = offset + i as f32 * (ratio_begin + ratio) * 0.5;
            ratio = ratio_begin + ratio_gradient * i as f32;
            I::step::<D>(x, fixed, variable, i, ratio);
        } else {
            let x = offset + i as f32 * ratio;
            I::step::<D>(x, fixed, variable, i, ratio);
        }
    }

    *fixed_buffer_offset += variable_frame_count as f32 * (ratio_begin + ratio) * 0.5;
    *fixed_buffer_offset -= fixed.frame_count as f32;
}

/// Resample one block. The ratio varies linearly from `ratio_begin` to
/// `ratio_end` across the block; with `align_end` the end ratio is instead
/// solved so the final sample lands exactly on the last fixed frame.
///
/// Returns the number of variable-rate frames consumed or produced. On exit
/// `fixed_buffer_offset` carries the sub-sample position into the next block
/// and must stay small; a bad landing is a bug reported by a debug assertion
/// and recovered from by zeroing the offset so drift cannot accumulate.
pub fn resample<D: Direction, I: Interpolation>(
    fixed: &mut Padded,
    fixed_buffer_offset: &mut f32,
    variable: &mut Block,
    ratio_begin: f32,
    mut ratio_end: f32,
    align_end: bool,
) -> usize {
    let ideal = 2.0 * (fixed.frame_count as f32 + ratio_end - *fixed_buffer_offset)
        / (ratio_begin + ratio_end)
        - 1.0;
    let mut variable_frame_count = ideal.round().max(0.0) as usize;

    let truncate = variable_frame_count > variable.frames;
    if truncate {
        debug_assert!(false, "resample: variable buffer too short");
        variable_frame_count = variable.frames;
    }

    if align_end {
        let dividend = 2.0 * (fixed.frame_count as f32 - *fixed_buffer_offset)
            - (variable_frame_count + 1) as f32 * ratio_begin;
        let divisor = variable_frame_count as f32 - 1.0;
        ratio_end = dividend / divisor;
    }

    if ratio_begin != ratio_end {
        resample_inner::<D, I, true>(
            variable_frame_count,
            fixed,
            fixed_buffer_offset,
            variable,
            ratio_begin,
            ratio_end,
        );
    } else {
        resample_inner::<D, I, false>(
            variable_frame_count,
            fixed,
            fixed_buffer_offset,
            variable,
            ratio_begin,
            ratio_end,
        );
    }

    let limit = if align_end {
        1e-2
    } else {
        (ratio_begin + ratio_end) * 0.3
    };
    if !(truncate || fixed_buffer_offset.abs() < limit) {
        debug_assert!(false, "resample landed badly: offset {}", fixed_buffer_offset);
        *fixed_buffer_offset = 0.0;
    }

    variable_frame_count
}

/// Block-level resampling entry point, one monomorphisation per
/// direction/interpolation pair.
pub type Function = fn(&mut Padded, &mut f32, &mut Block<'_>, f32, f32, bool) -> usize;

/// One side of a grain's resample plan. `function` is `None` when the side is
/// inactive, in which case `ratio` is unity.
#[derive(Clone, Copy)]
pub struct Operation {
    pub function: Option<Function>,
    pub ratio: f32,
}

impl Default for Operation {
    fn default() -> Self {
        Operation {
            function: None,
            ratio: 1.0,
        }
    }
}

/// A grain's resample plan: input and output sides.
#[derive(Clone, Copy, Default)]
pub struct Operations {
    pub input: Operation,
    pub output: Operation,
}

impl Operations {
    /// Assign ratios and active sides from the resample mode, then null the
    /// inactive sides. Returns the unit hop factor
    /// `(inputRate / outputRate) / outputRatio`.
    pub fn setup(
        &mut self,
        sample_rates: SampleRates,
        resample_mode: ResampleMode,
        pitch: f64,
    ) -> f64 {
        let resample_ratio = pitch * sample_rates.input as f64 / sample_rates.output as f64;
        self.input.ratio = (1.0 / resample_ratio) as f32;
        self.output.ratio = resample_ratio as f32;
        self.input.function = Some(resample::<VariableToFixed, Bilinear> as Function);
        self.output.function = Some(resample::<FixedToVariable, Bilinear> as Function);

        use ResampleMode::*;
        if resample_mode == ForceOut {
            self.input.function = None;
        } else if resample_mode == ForceIn {
            self.output.function = None;
        } else if resample_ratio == 1.0 {
            self.input.function = None;
            self.output.function = None;
        } else if resample_mode == AutoIn {
            self.output.function = None;
        } else if resample_mode == AutoOut {
            self.input.function = None;
        } else if resample_mode == AutoInOut && resample_ratio > 1.0 {
            // The input side sees ratio 1/resampleRatio < 1: downsample there.
            self.output.function = None;
        } else {
            debug_assert!(resample_mode == AutoInOut && resample_ratio < 1.0);
            self.input.function = None;
        }

        if self.input.function.is_none() {
            self.input.ratio = 1.0;
        }
        if self.output.function.is_none() {
            self.output.ratio = 1.0;
        }

        (sample_rates.input as f64 / sample_rates.output as f64) / self.output.ratio as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(i: usize) -> f32 {
        (core::f32::consts::TAU * i as f32 / 64.0).sin()
    }

    #[test]
    fn unit_ratio_is_identity() {
        let frames = 256;
        let mut fixed = Padded::new(frames, 1);
        fixed.frame_count = frames;
        for i in 0..frames {
            fixed.unpadded_mut(0)[i] = sine(i);
        }

        let mut data = vec![0.0; frames + 8];
        let capacity = data.len();
        let mut block = Block {
            data: &mut data,
            stride: capacity,
            frames: capacity,
        };
        let mut offset = 0.0;
        let produced =
            resample::<FixedToVariable, Bilinear>(&mut fixed, &mut offset, &mut block, 1.0, 1.0, false);

        assert_eq!(produced, frames);
        assert!(offset.abs() < 0.6);
        for i in 0..frames {
            assert!((data[i] - sine(i)).abs() < 1e-6);
        }
    }

    #[test]
    fn up_then_down_round_trip() {
        // Upsample at ratio 0.5, accumulate back at the reciprocal rate; a
        // band-limited sinusoid survives within 0.1 dB.
        let frames = 512;
        let mut fixed = Padded::new(frames, 1);
        fixed.frame_count = frames;
        for i in 0..frames {
            fixed.unpadded_mut(0)[i] = sine(i);
        }

        let mut up = vec![0.0; 2 * frames + 16];
        let capacity = up.len();
        let mut block = Block {
            data: &mut up,
            stride: capacity,
            frames: capacity,
        };
        let mut offset = 0.0;
        let produced =
            resample::<FixedToVariable, Bilinear>(&mut fixed, &mut offset, &mut block, 0.5, 0.5, false);
        assert!(offset.abs() < (0.5 + 0.5) * 0.3);
        assert!(produced >= 2 * frames - 2);

        let mut down = Padded::new(frames, 1);
        down.frame_count = frames;
        let mut block = Block {
            data: &mut up,
            stride: capacity,
            frames: produced,
        };
        let mut offset = 0.0;
        resample::<VariableToFixed, Bilinear>(&mut down, &mut offset, &mut block, 0.5, 0.5, false);
        assert!(offset.abs() < (0.5 + 0.5) * 0.3);

        // Compare away from the edges where taps reach the guard bands.
        let mut signal_energy = 0.0;
        let mut error_energy = 0.0;
        for i in 16..frames - 16 {
            let reference = sine(i);
            let error = down.unpadded(0)[i] - reference;
            signal_energy += reference * reference;
            error_energy += error * error;
        }
        // 0.1 dB amplitude tolerance.
        assert!(error_energy.sqrt() < 0.012 * signal_energy.sqrt());
    }

    #[test]
    fn streaming_blocks_are_continuous() {
        // Successive blocks over a global ramp stay exactly linear across
        // block boundaries when the guard bands are lapped, and the running
        // offset stays bounded.
        let frames = 32;
        let ratio = 0.7;
        let mut fixed = Padded::new(frames, 1);
        fixed.frame_count = frames;

        let ramp = |t: isize| t as f32;
        let mut produced_all = Vec::new();
        let mut offset = 0.0;
        for block_index in 0..8 {
            let base = block_index * frames as isize;
            {
                let raw = fixed.raw_mut(0);
                for i in 0..raw.len() {
                    raw[i] = ramp(base + i as isize - PADDING as isize);
                }
            }
            let mut data = vec![0.0; 2 * frames];
            let capacity = data.len();
            let mut block = Block {
                data: &mut data,
                stride: capacity,
                frames: capacity,
            };
            let produced = resample::<FixedToVariable, Bilinear>(
                &mut fixed,
                &mut offset,
                &mut block,
                ratio,
                ratio,
                false,
            );
            assert!(offset.abs() < (ratio + ratio) * 0.3);
            produced_all.extend_from_slice(&data[..produced]);
        }

        for pair in produced_all.windows(2) {
            assert!((pair[1] - pair[0] - ratio).abs() < 1e-3);
        }
    }

    #[test]
    fn align_end_lands_on_last_frame() {
        let frames = 64;
        let mut fixed = Padded::new(frames, 1);
        fixed.frame_count = frames;
        for i in 0..frames {
            fixed.unpadded_mut(0)[i] = i as f32;
        }

        let mut data = vec![0.0; 2 * frames];
        let capacity = data.len();
        let mut block = Block {
            data: &mut data,
            stride: capacity,
            frames: capacity,
        };
        let mut offset = 0.25;
        let produced =
            resample::<FixedToVariable, Bilinear>(&mut fixed, &mut offset, &mut block, 0.9, 1.0, true);
        assert!(offset.abs() < 1e-2);
        assert!((data[produced - 1] - (frames - 1) as f32).abs() < 1e-2);
    }

    #[test]
    fn nearest_copies_single_taps() {
        let frames = 16;
        let mut fixed = Padded::new(frames, 1);
        fixed.frame_count = frames;
        for i in 0..frames {
            fixed.unpadded_mut(0)[i] = i as f32;
        }
        let mut data = vec![0.0; frames + 4];
        let capacity = data.len();
        let mut block = Block {
            data: &mut data,
            stride: capacity,
            frames: capacity,
        };
        let mut offset = 0.0;
        let produced =
            resample::<FixedToVariable, Nearest>(&mut fixed, &mut offset, &mut block, 1.0, 1.0, false);
        for i in 0..produced {
            assert_eq!(data[i], i as f32);
        }
    }

    #[test]
    fn setup_selects_sides() {
        let rates = SampleRates {
            input: 48000,
            output: 48000,
        };

        let mut ops = Operations::default();
        let unit = ops.setup(rates, ResampleMode::AutoOut, 1.0);
        assert!(ops.input.function.is_none() && ops.output.function.is_none());
        assert_eq!(unit, 1.0);

        let mut ops = Operations::default();
        ops.setup(rates, ResampleMode::AutoOut, 2.0);
        assert!(ops.input.function.is_none() && ops.output.function.is_some());
        assert_eq!(ops.output.ratio, 2.0);

        let mut ops = Operations::default();
        ops.setup(rates, ResampleMode::AutoIn, 2.0);
        assert!(ops.input.function.is_some() && ops.output.function.is_none());
        assert_eq!(ops.input.ratio, 0.5);

        // autoInOut: the downsampling side takes the work.
        let mut ops = Operations::default();
        ops.setup(rates, ResampleMode::AutoInOut, 2.0);
        assert!(ops.input.function.is_some() && ops.output.function.is_none());
        let mut ops = Operations::default();
        ops.setup(rates, ResampleMode::AutoInOut, 0.5);
        assert!(ops.input.function.is_none() && ops.output.function.is_some());

        // Force modes stay active even at unit ratio.
        let mut ops = Operations::default();
        ops.setup(rates, ResampleMode::ForceOut, 1.0);
        assert!(ops.input.function.is_none() && ops.output.function.is_some());
        let mut ops = Operations::default();
        ops.setup(rates, ResampleMode::ForceIn, 1.0);
        assert!(ops.input.function.is_some() && ops.output.function.is_none());
    }
}
