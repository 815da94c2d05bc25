//! Fixed four-slot rotation of in-flight grains.
//!
//! Index 0 is the incoming grain, 1 the most recent complete one, 2 the grain
//! whose output quadrants are being finalised, 3 the grain being emitted.
//! Slots are boxed so their addresses stay stable across rotation; emitted
//! output chunks borrow request state from two of them.

use crate::grain::Grain;
use core::ops::{Index, IndexMut};

pub struct Grains {
    slots: Vec<Box<Grain>>,
}

impl Grains {
    pub fn new(log2_synthesis_hop: usize, channels: usize) -> Self {
        Grains {
            slots: (0..4)
                .map(|_| Box::new(Grain::new(log2_synthesis_hop, channels)))
                .collect(),
        }
    }

    /// Cycle the ring so the oldest slot becomes the incoming grain.
    pub fn rotate(&mut self) {
        self.slots.rotate_left(1);
    }

    /// True when every slot carries an invalid (NaN position) request.
    pub fn flushed(&self) -> bool {
        self.slots.iter().all(|grain| !grain.valid())
    }

    /// The incoming grain together with its predecessor.
    pub fn newest_and_previous(&mut self) -> (&mut Grain, &Grain) {
        let (older, newest) = self.slots.split_at_mut(3);
        (&mut newest[0], &older[2])
    }

    /// The emitting grain (slot 3) together with slot 2, both mutable.
    pub fn emitting_pair(&mut self) -> (&mut Grain, &mut Grain) {
        let (oldest, rest) = self.slots.split_at_mut(1);
        (&mut oldest[0], &mut rest[0])
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> &mut Grain {
        &mut self.slots[3 - index]
    }
}

impl Index<usize> for Grains {
    type Output = Grain;

    #[inline]
    fn index(&self, index: usize) -> &Grain {
        &self.slots[3 - index]
    }
}

impl IndexMut<usize> for Grains {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut Grain {
        self.get_mut(index)
    }
}
