//! Analysis windowing ahead of the forward transform.
//!
//! The analysis window spans the whole transform. It is applied with the two
//! halves of the windowed buffer swapped so the grain centre lands at sample
//! 0; the spectrum then carries zero-phase grains and the synthesis stage can
//! address the inverse transform in wrapped quadrants.

use crate::fourier;
use crate::math;
use crate::window;
use core::f32::consts::PI;

pub struct Input {
    analysis_window: Vec<f32>,
    /// Windowed, half-swapped input, one transform length per channel.
    pub windowed: Vec<f32>,
    channels: usize,
}

impl Input {
    pub fn new(log2_synthesis_hop: usize, channels: usize) -> Self {
        let length = 8 << log2_synthesis_hop;
        let gain = (3.0 * PI) / (3.0 * PI + 8.0) / length as f32;
        let input = Input {
            analysis_window: window::from_frequency_domain_coefficients(
                log2_synthesis_hop + 3,
                gain,
                &[1.0, 0.5],
            ),
            windowed: vec![0.0; length * channels],
            channels,
        };
        fourier::prepare_forward(log2_synthesis_hop + 3);
        input
    }

    /// Window the grain's audio into the transform buffer. `data` is planar
    /// with `frames` per channel and must cover exactly one transform length.
    /// Returns the log2 transform length to analyse at.
    pub fn apply_analysis_window(&mut self, data: &[f32], stride: usize, frames: usize) -> usize {
        let length = self.analysis_window.len();
        let half = length / 2;
        debug_assert_eq!(frames, length);

        for c in 0..self.channels {
            let input = &data[c * stride..c * stride + frames];
            let output = &mut self.windowed[c * length..(c + 1) * length];
            window::APPLY[0](
                &self.analysis_window[..half],
                &input[frames / 2..frames / 2 + half],
                &mut output[..half],
            );
            window::APPLY[0](
                &self.analysis_window[half..],
                &input[frames / 2 - half..frames / 2],
                &mut output[half..],
            );
        }

        math::exact_log2(length)
    }
}
