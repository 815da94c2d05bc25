//! Cached forward and inverse real FFTs.
//!
//! Kernels come from `realfft` and are held in a process-wide table keyed by
//! log2 transform length. The first `prepare_*` call for a size plans the
//! kernel; transforms after that are lock-free reads, so every stretcher
//! instance prepares its sizes at construction and the audio thread never
//! plans. Transforms are unnormalised in both directions; window gains carry
//! the normalisation.

use num_complex::Complex32;
use once_cell::race::OnceBox;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use std::sync::Arc;

/// Largest supported log2 transform length.
pub const MAX_LOG2_LENGTH: usize = 16;

type ForwardKernel = Arc<dyn RealToComplex<f32>>;
type InverseKernel = Arc<dyn ComplexToReal<f32>>;

#[allow(clippy::declare_interior_mutable_const)]
const FORWARD_INIT: OnceBox<ForwardKernel> = OnceBox::new();
#[allow(clippy::declare_interior_mutable_const)]
const INVERSE_INIT: OnceBox<InverseKernel> = OnceBox::new();

static FORWARD: [OnceBox<ForwardKernel>; MAX_LOG2_LENGTH + 1] =
    [FORWARD_INIT; MAX_LOG2_LENGTH + 1];
static INVERSE: [OnceBox<InverseKernel>; MAX_LOG2_LENGTH + 1] =
    [INVERSE_INIT; MAX_LOG2_LENGTH + 1];

/// Number of samples in a transform of the given log2 length.
#[inline]
pub fn transform_length(log2_length: usize) -> usize {
    debug_assert!(log2_length <= MAX_LOG2_LENGTH);
    1 << log2_length
}

/// Number of complex bins produced by a real transform: `N / 2 + 1`.
#[inline]
pub fn bin_count(log2_length: usize) -> usize {
    debug_assert!(log2_length >= 1);
    transform_length(log2_length - 1) + 1
}

fn forward_kernel(log2_length: usize) -> &'static ForwardKernel {
    FORWARD[log2_length].get_or_init(|| {
        Box::new(RealFftPlanner::<f32>::new().plan_fft_forward(transform_length(log2_length)))
    })
}

fn inverse_kernel(log2_length: usize) -> &'static InverseKernel {
    INVERSE[log2_length].get_or_init(|| {
        Box::new(RealFftPlanner::<f32>::new().plan_fft_inverse(transform_length(log2_length)))
    })
}

/// Plan the forward kernel for this size if not already cached.
pub fn prepare_forward(log2_length: usize) {
    forward_kernel(log2_length);
}

/// Plan the inverse kernel for this size if not already cached.
pub fn prepare_inverse(log2_length: usize) {
    inverse_kernel(log2_length);
}

/// Scratch space, in complex samples, needed by [`forward`] and [`inverse`]
/// at this size. Plans both kernels.
pub fn scratch_length(log2_length: usize) -> usize {
    forward_kernel(log2_length)
        .get_scratch_len()
        .max(inverse_kernel(log2_length).get_scratch_len())
}

/// Real-to-complex transform of one channel. `time` is clobbered.
pub fn forward(log2_length: usize, time: &mut [f32], freq: &mut [Complex32], scratch: &mut [Complex32]) {
    let n = transform_length(log2_length);
    forward_kernel(log2_length)
        .process_with_scratch(&mut time[..n], &mut freq[..bin_count(log2_length)], scratch)
        .expect("forward FFT buffers are sized at construction");
}

/// Complex-to-real transform of one channel. `freq` is clobbered, and the
/// imaginary parts of its DC and Nyquist bins are ignored.
pub fn inverse(log2_length: usize, time: &mut [f32], freq: &mut [Complex32], scratch: &mut [Complex32]) {
    let n = transform_length(log2_length);
    let bins = bin_count(log2_length);
    freq[0].im = 0.0;
    freq[bins - 1].im = 0.0;
    inverse_kernel(log2_length)
        .process_with_scratch(&mut freq[..bins], &mut time[..n], scratch)
        .expect("inverse FFT buffers are sized at construction");
}
