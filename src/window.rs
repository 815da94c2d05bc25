//! Windows synthesised from frequency-domain cosine coefficients.
//!
//! A window is described by a handful of real coefficients placed in the
//! lowest bins of a spectrum; the inverse real FFT turns them into the
//! time-domain window. The result is in wrapped (zero-phase) form: the peak
//! sits at sample 0 and the window wraps around the end of the buffer, which
//! is the orientation the analysis and synthesis stages work in.

use crate::fourier;
use num_complex::Complex32;

/// Build a window of `1 << log2_size` samples from cosine `coefficients`
/// scaled by `gain`. Coefficient `i` lands in bin `i`; all other bins are zero.
pub fn from_frequency_domain_coefficients(
    log2_size: usize,
    gain: f32,
    coefficients: &[f32],
) -> Vec<f32> {
    let mut freq = vec![Complex32::default(); fourier::bin_count(log2_size)];
    for (bin, &coefficient) in freq.iter_mut().zip(coefficients) {
        *bin = Complex32::new(coefficient * gain, 0.0);
    }

    let mut window = vec![0.0; fourier::transform_length(log2_size)];
    fourier::prepare_inverse(log2_size);
    let mut scratch = vec![Complex32::default(); fourier::scratch_length(log2_size)];
    fourier::inverse(log2_size, &mut window, &mut freq, &mut scratch);
    window
}

fn apply<const ADD: bool>(window: &[f32], input: &[f32], output: &mut [f32]) {
    debug_assert!(window.len() == input.len() && window.len() == output.len());
    for ((out, &w), &x) in output.iter_mut().zip(window).zip(input) {
        if ADD {
            *out += w * x;
        } else {
            *out = w * x;
        }
    }
}

/// Windowed copy or accumulate, indexed by whether to accumulate. Both
/// specialisations are compiled; the hot path selects by table lookup rather
/// than branching per sample.
pub const APPLY: [fn(&[f32], &[f32], &mut [f32]); 2] = [apply::<false>, apply::<true>];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_pair_shape() {
        let log2_size = 10;
        let n = 1 << log2_size;
        let window = from_frequency_domain_coefficients(log2_size, 0.25, &[1.0, 0.5]);
        assert_eq!(window.len(), n);
        // Raised cosine in wrapped form: peak at 0, null at n / 2, symmetric.
        assert!((window[0] - 0.5).abs() < 1e-6);
        assert!(window[n / 2].abs() < 1e-6);
        for i in 1..n / 2 {
            assert!((window[i] - window[n - i]).abs() < 1e-5);
        }
    }

    #[test]
    fn synthesis_window_overlap_adds_to_unity() {
        // Four-fold overlap at a stride of one synthesis hop must reconstruct
        // a constant for any valid hop.
        for log2_synthesis_hop in 5..=11 {
            let window =
                from_frequency_domain_coefficients(log2_synthesis_hop + 2, 0.25, &[1.0, 0.5]);
            let hop = 1 << log2_synthesis_hop;
            for n in 0..hop {
                let sum: f32 = (0..4).map(|k| window[n + k * hop]).sum();
                assert!((sum - 1.0).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn apply_sets_then_accumulates() {
        let window = [0.5, 1.0, 2.0];
        let input = [1.0, 2.0, 3.0];
        let mut output = [9.0, 9.0, 9.0];
        APPLY[0](&window, &input, &mut output);
        assert_eq!(output, [0.5, 2.0, 6.0]);
        APPLY[1](&window, &input, &mut output);
        assert_eq!(output, [1.0, 4.0, 12.0]);
    }
}
