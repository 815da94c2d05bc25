//! Synthesis driver: rotation assembly and partial locking.
//!
//! For a valid grain the driver computes the frequency-scale rotation, adds
//! the time-propagation delta of each partial's peak, and locks every bin in
//! a partial to its peak by applying the same delta across the partial's
//! span. The four direction combinations of the time propagator are
//! monomorphised and selected by table, keeping direction flags out of the
//! per-partial loop.

use crate::fourier;
use crate::grain::Grain;
use crate::stretch::{Frequency, Time};

type TemporalFn = fn(usize, &mut Grain, &Grain);

fn temporal<const REVERSE: bool, const REVERSE_PREVIOUS: bool>(
    log2_synthesis_hop: usize,
    grain: &mut Grain,
    previous: &Grain,
) {
    let time = Time::<REVERSE, REVERSE_PREVIOUS>::new(
        log2_synthesis_hop,
        grain.analysis.hop,
        previous.analysis.hop,
    );

    debug_assert_eq!(grain.partials.last().unwrap().end as usize, grain.valid_bin_count);

    for i in 0..grain.partials.len() {
        let peak = grain.partials[i].peak as usize;

        let offset =
            Time::<REVERSE, REVERSE_PREVIOUS>::offset(grain.phase[peak], previous.phase[peak]);
        let stretched = time.delta(grain.phase[peak], previous.phase[peak], peak as i32);
        let delta = previous.rotation[peak]
            .wrapping_sub(offset)
            .wrapping_add(stretched);
        debug_assert!(grain.passthrough == 0 || delta == 0);

        grain.delta[i] = delta.wrapping_sub(grain.rotation[peak]);
    }
}

const TEMPORAL: [TemporalFn; 4] = [
    temporal::<false, false>,
    temporal::<true, false>,
    temporal::<false, true>,
    temporal::<true, true>,
];

/// Fill `grain.rotation` with the complete per-bin rotation for this grain.
pub fn synthesise(log2_synthesis_hop: usize, grain: &mut Grain, previous: &Grain) {
    Frequency::new(grain.analysis.speed).rotate(
        grain.valid_bin_count,
        &mut grain.rotation,
        &grain.phase,
    );

    if grain.continuous {
        let mut index = 0;
        if grain.reverse() {
            index |= 1;
        }
        if previous.reverse() {
            index |= 2;
        }
        TEMPORAL[index](log2_synthesis_hop, grain, previous);
    } else {
        for i in 0..grain.partials.len() {
            grain.delta[i] = grain.rotation[grain.partials[i].peak as usize].wrapping_neg();
        }
    }

    // Partial locking: every bin up to a partial's end moves by its delta.
    let mut n = 0;
    for i in 0..grain.partials.len() {
        let delta = grain.delta[i];
        let end = grain.partials[i].end as usize;
        loop {
            grain.rotation[n] = grain.rotation[n].wrapping_add(delta);
            debug_assert!(grain.passthrough == 0 || grain.rotation[n] == 0);
            n += 1;
            if n >= end {
                break;
            }
        }
    }

    let nyquist = fourier::bin_count(grain.log2_transform_length) - 1;
    grain.rotation[nyquist] = grain.rotation[nyquist - 1];
}
