//! Real-time granular time stretching and pitch shifting.
//!
//! `timegrain` is a phase vocoder with partial locking. Audio is processed as a
//! sequence of overlapped grains; for each grain the host states where in the
//! input timeline the grain centre should sit, the engine replies with the
//! input span it needs, and after analysis and synthesis it hands back a
//! non-overlapping chunk of output audio. Playback speed (including reverse),
//! pitch shift and instantaneous seeks are all controlled per grain.
//!
//! The engine is pull driven and real-time safe: all buffers are allocated at
//! construction and the steady-state grain cycle performs no allocation and no
//! I/O. Hosts with push-style pipelines can adapt with [`push::InputBuffer`].
//!
//! ```
//! use timegrain::{Request, SampleRates, Stretcher};
//!
//! let mut stretcher = Stretcher::new(SampleRates { input: 48000, output: 48000 }, 1);
//! let mut request = Request { position: 0.0, speed: 0.75, ..Request::default() };
//! stretcher.preroll(&mut request);
//!
//! let input = vec![0.0f32; stretcher.max_input_frame_count()];
//! for _ in 0..8 {
//!     let chunk = stretcher.specify_grain(&request);
//!     // The host would copy `chunk.frame_count()` frames starting at input
//!     // frame `chunk.begin` here, zero-padding outside the track.
//!     stretcher.analyse_grain(&input[..chunk.frame_count()], chunk.frame_count());
//!     let output = stretcher.synthesise_grain();
//!     let _playback = output.channel(0);
//!     stretcher.next(&mut request);
//! }
//! ```

pub mod denormal;
pub mod fourier;
pub mod grain;
pub mod grains;
pub mod input;
pub mod math;
pub mod output;
pub mod partials;
pub mod phase;
pub mod push;
pub mod resample;
pub mod stretch;
pub mod stretcher;
pub mod synthesis;
pub mod timing;
pub mod window;

pub use stretcher::Stretcher;

/// Crate version string.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Where resampling happens when pitch shift or unequal sample rates require it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResampleMode {
    /// Resample on the output side, activated only when the ratio is not unity.
    #[default]
    AutoOut,
    /// Resample on the input side, activated only when the ratio is not unity.
    AutoIn,
    /// Resample on the input side when downsampling, on the output side when upsampling.
    AutoInOut,
    /// Resample on the output side, always active.
    ForceOut,
    /// Resample on the input side, always active.
    ForceIn,
}

/// Per-grain playback control.
#[derive(Clone, Copy, Debug)]
pub struct Request {
    /// Frame offset within the input audio of the centre point of this grain.
    /// `NaN` signifies an invalid grain that produces no audio output and may
    /// be used for flushing.
    pub position: f64,

    /// Output audio speed. 1 means the output should play at the input's pace.
    /// Only consulted when the speed cannot be determined by differencing the
    /// positions of successive grains.
    pub speed: f64,

    /// Frequency multiplier, 1 meaning no pitch adjustment. Strictly positive.
    pub pitch: f64,

    /// Set to make the stretcher forget all previous grains and restart here.
    pub reset: bool,

    /// Resampling placement policy.
    pub resample_mode: ResampleMode,
}

impl Default for Request {
    fn default() -> Self {
        Request {
            position: f64::NAN,
            speed: f64::NAN,
            pitch: 1.0,
            reset: false,
            resample_mode: ResampleMode::AutoOut,
        }
    }
}

/// Input and output sample rates in Hz. Both must lie in `[8000, 192000]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleRates {
    pub input: u32,
    pub output: u32,
}

/// Half-open range of input frames required to analyse a grain.
///
/// The range is relative to the start of the audio track and may extend before
/// frame 0 or past the end of the track; the caller is expected to zero-pad.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputChunk {
    pub begin: isize,
    pub end: isize,
}

impl InputChunk {
    /// Number of frames covered by the chunk.
    pub fn frame_count(&self) -> usize {
        (self.end - self.begin).max(0) as usize
    }
}

/// One finished, non-overlapping chunk of output audio.
///
/// Chunks from successive grains are contiguous in output time and can be
/// appended for seamless playback. The borrows tie the chunk to the stretcher;
/// they remain valid until the next call into it.
#[derive(Debug)]
pub struct OutputChunk<'a> {
    /// Planar audio data; channel `c` starts at `data[c * channel_stride]`.
    pub data: &'a [f32],
    /// Number of frames per channel.
    pub frame_count: usize,
    /// Distance in samples between consecutive channels within `data`.
    pub channel_stride: usize,
    /// The requests bracketing this chunk: `request[0]` corresponds to the
    /// first output frame, `request[1]` to the frame after the last.
    pub request: [&'a Request; 2],
}

impl<'a> OutputChunk<'a> {
    /// The frames of one channel.
    pub fn channel(&self, channel: usize) -> &[f32] {
        let begin = channel * self.channel_stride;
        &self.data[begin..begin + self.frame_count]
    }
}
