//! Input buffering for hosts that push audio downstream.
//!
//! The stretcher's native API is pull based: it announces the input span it
//! wants and the host fetches it. Pipelines built around pushing fixed chunks
//! can interpose an [`InputBuffer`]: per grain it slides the overlap between
//! the previous chunk and the new one to the buffer head, reports how many
//! fresh frames it still needs and where to write them, and then exposes the
//! assembled chunk for analysis. Only forward playback is possible this way;
//! speed and pitch control work as usual.

use crate::InputChunk;

pub struct InputBuffer {
    data: Vec<f32>,
    max_frame_count: usize,
    channels: usize,
    begin: isize,
    end: isize,
    end_required: isize,
}

impl InputBuffer {
    /// `max_frame_count` should be the stretcher's
    /// [`max_input_frame_count`](crate::Stretcher::max_input_frame_count).
    pub fn new(max_frame_count: usize, channels: usize) -> Self {
        InputBuffer {
            data: vec![0.0; max_frame_count * channels],
            max_frame_count,
            channels,
            begin: 0,
            end: -1,
            end_required: 0,
        }
    }

    /// Distance in samples between channels of the buffered audio.
    pub fn stride(&self) -> usize {
        self.max_frame_count
    }

    /// Accept the next grain's input span: keep the overlap with the
    /// previous span and note how much new audio is required.
    pub fn grain(&mut self, chunk: InputChunk) {
        let first_call = self.end - self.begin < 0;
        if first_call {
            self.begin = chunk.begin;
            self.end = 0;
        }

        let overlap = self.end - chunk.begin;
        if overlap <= 0 {
            self.begin = chunk.begin;
            self.end = chunk.begin;
        } else {
            let offset = (chunk.begin - self.begin) as usize;
            let overlap = overlap as usize;
            let stride = self.stride();
            for c in 0..self.channels {
                self.data[c * stride..(c + 1) * stride].copy_within(offset..offset + overlap, 0);
            }
            self.begin = chunk.begin;
        }
        self.end_required = chunk.end;

        debug_assert!(self.input_frame_count_required() <= self.input_frame_count_max());
    }

    /// Frames of new audio needed to complete the current grain.
    pub fn input_frame_count_required(&self) -> usize {
        (self.end_required - self.end).max(0) as usize
    }

    /// Most frames that can be delivered right now.
    pub fn input_frame_count_max(&self) -> usize {
        self.max_frame_count - (self.end - self.begin) as usize
    }

    /// Where the host writes new frames: a planar region with
    /// [`Self::stride`] between channels. Write up to
    /// [`Self::input_frame_count_max`] frames, then call [`Self::deliver`].
    pub fn input_data(&mut self) -> &mut [f32] {
        let offset = (self.end - self.begin) as usize;
        &mut self.data[offset..]
    }

    /// Record that `frame_count` frames were written to [`Self::input_data`].
    pub fn deliver(&mut self, frame_count: usize) {
        debug_assert!(frame_count <= self.input_frame_count_max());
        self.end += frame_count as isize;
    }

    /// The assembled chunk, planar with [`Self::stride`] between channels;
    /// hand this to [`analyse_grain`](crate::Stretcher::analyse_grain) once
    /// [`Self::input_frame_count_required`] reaches zero.
    pub fn output_data(&self) -> &[f32] {
        &self.data
    }
}
