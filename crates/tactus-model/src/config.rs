//! Fixed hardware dimensions of the sequencer.

/// Pulses per quarter note of the musical clock.
pub const PPQN: u32 = 192;

/// MIDI wire clock resolution (timing-clock bytes per quarter note).
pub const MIDI_CLOCK_PPQN: u32 = 24;

/// Number of sequencer tracks.
pub const TRACK_COUNT: usize = 8;

/// Number of physical gate outputs.
pub const GATE_OUTPUT_COUNT: usize = 8;

/// Number of physical CV output channels.
pub const CV_OUTPUT_COUNT: usize = 8;

/// Number of CV input channels.
pub const CV_INPUT_COUNT: usize = 4;

/// Patterns per track.
pub const PATTERN_COUNT: usize = 16;

/// Maximum slots in a song arrangement.
pub const SONG_SLOT_COUNT: usize = 16;

/// Maximum steps per sequence.
pub const STEP_COUNT: usize = 64;

/// Entries in the routing table.
pub const ROUTE_COUNT: usize = 8;
