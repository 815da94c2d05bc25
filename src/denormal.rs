//! Denormal prevention.
//!
//! Spectral tails and decaying overlap-add regions drive float values toward
//! the denormal range, where many CPUs fall off their fast path. Hosts should
//! call [`prevent_denormals`] once on each audio thread that runs a
//! stretcher.

/// Attempt to set processor flags to treat denormals as zero. Affects only
/// the calling thread; a no-op on architectures without the control register.
#[inline]
pub fn prevent_denormals() {
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    {
        #[cfg(all(target_arch = "x86_64", target_feature = "sse"))]
        #[allow(deprecated)]
        use core::arch::x86_64::_mm_setcsr;

        #[cfg(all(target_arch = "x86", target_feature = "sse"))]
        use core::arch::x86::_mm_setcsr;

        // Flush-to-zero and denormals-are-zero, all interrupt masks enabled.
        #[allow(deprecated)]
        unsafe {
            _mm_setcsr(0x9fc0)
        };
    }
}
