//! Peak and valley segmentation of the magnitude spectrum.
//!
//! A partial is the span of bins around one spectral lobe: a strict local
//! maximum of energy and the strict local minimum that ends the lobe. The
//! phase propagator locks every bin in a partial to its peak, so this
//! segmentation decides which bins move together.

/// One spectral lobe: `peak` is its strict local maximum, `end` the strict
/// local minimum that closes it. Partials tile `[1, validBinCount]`; each
/// partial's bins run from the previous partial's `end` up to its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Partial {
    pub peak: i16,
    pub end: i16,
}

/// Ratio by which a partial's energy must exceed its energy in the previous
/// grain to be treated as a transient and merged away. The value balances
/// transient reproduction against tonal stability.
pub const TRANSIENT_RATIO: f32 = 1.5;

/// Scan `energy[1..=n]` for alternating peak/valley pairs.
///
/// `energy` must extend two bins past `n`; those two slots are borrowed for
/// sentinel values that terminate the scan at `n` without per-step bounds
/// checks, and are restored on exit. `partials` is refilled without
/// reallocating. Afterwards `partials.last().unwrap().end == n`.
pub fn enumerate(partials: &mut Vec<Partial>, n: usize, energy: &mut [f32]) {
    debug_assert!(energy.len() >= n + 2);
    debug_assert!(partials.capacity() > n / 2);

    let mut undo = [-1.0, 0.0];
    core::mem::swap(&mut energy[n], &mut undo[0]);
    core::mem::swap(&mut energy[n + 1], &mut undo[1]);

    partials.clear();
    let mut m = 1;
    loop {
        while energy[m] < energy[m + 1] {
            m += 1;
        }
        let peak = m as i16;
        m += 1;

        while energy[m] >= energy[m + 1] {
            m += 1;
        }
        partials.push(Partial { peak, end: m as i16 });
        m += 1;

        if m >= n + 1 {
            break;
        }
    }

    debug_assert_eq!(partials.last().unwrap().end as usize, n);

    core::mem::swap(&mut energy[n], &mut undo[0]);
    core::mem::swap(&mut energy[n + 1], &mut undo[1]);
}

/// Merge partials whose energy jumped by more than [`TRANSIENT_RATIO`] since
/// the previous grain into their stronger-coupled neighbour.
///
/// Only interior partials other than the globally strongest are candidates.
/// A candidate merges across its taller separating valley: leftwards by
/// extending the left neighbour's `end`, rightwards by simply dissolving into
/// the right neighbour's span. Called only when the grain is continuous with
/// its predecessor.
pub fn suppress_transients(partials: &mut Vec<Partial>, energy: &[f32], previous_energy: &[f32]) {
    if partials.len() < 3 {
        return;
    }

    let mut strongest = 0;
    for i in 1..partials.len() {
        if energy[partials[i].peak as usize] > energy[partials[strongest].peak as usize] {
            strongest = i;
        }
    }

    let mut i = 1;
    while i + 1 < partials.len() {
        let peak = partials[i].peak as usize;
        if i != strongest && energy[peak] > TRANSIENT_RATIO * previous_energy[peak] {
            let left_valley = energy[partials[i - 1].end as usize];
            let right_valley = energy[partials[i].end as usize];
            if left_valley > right_valley {
                partials[i - 1].end = partials[i].end;
            }
            partials.remove(i);
            if strongest > i {
                strongest -= 1;
            }
        } else {
            i += 1;
        }
    }
}
