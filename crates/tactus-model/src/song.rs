//! Song arrangement: an ordered list of pattern slots.

use arrayvec::ArrayVec;

use crate::config::{SONG_SLOT_COUNT, TRACK_COUNT};

/// One entry of the arrangement: a pattern per track and a repeat count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SongSlot {
    patterns: [usize; TRACK_COUNT],
    repeats: u32,
}

impl SongSlot {
    /// Create a slot playing the same pattern on every track.
    pub fn new(pattern: usize, repeats: u32) -> Self {
        Self {
            patterns: [pattern; TRACK_COUNT],
            repeats: repeats.max(1),
        }
    }

    pub fn pattern(&self, track: usize) -> usize {
        self.patterns[track]
    }

    pub fn set_pattern(&mut self, track: usize, pattern: usize) {
        self.patterns[track] = pattern;
    }

    pub fn repeats(&self) -> u32 {
        self.repeats
    }

    pub fn set_repeats(&mut self, repeats: u32) {
        self.repeats = repeats.max(1);
    }
}

/// Ordered sequence of slots.
#[derive(Clone, Debug, Default)]
pub struct Song {
    slots: ArrayVec<SongSlot, SONG_SLOT_COUNT>,
}

impl Song {
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, index: usize) -> Option<&SongSlot> {
        self.slots.get(index)
    }

    pub fn slot_mut(&mut self, index: usize) -> Option<&mut SongSlot> {
        self.slots.get_mut(index)
    }

    /// Append a slot. Returns false when the song is full.
    pub fn add_slot(&mut self, slot: SongSlot) -> bool {
        self.slots.try_push(slot).is_ok()
    }

    pub fn remove_slot(&mut self, index: usize) {
        if index < self.slots.len() {
            self.slots.remove(index);
        }
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}
