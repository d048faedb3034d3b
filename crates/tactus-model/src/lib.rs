//! Core data model for the tactus sequencer.
//!
//! This crate defines the project state the sequencing engine consumes:
//! clock configuration, per-track setup, play state, song arrangement and
//! the routing table. The engine reads and advances this model; UI and
//! persistence layers live elsewhere and mutate it under the engine lock.

pub mod config;

mod clock_setup;
mod midi;
mod play_state;
mod project;
mod routing;
mod sequence;
mod song;
mod track;

pub use clock_setup::{ClockInputMode, ClockMode, ClockOutputMode, ClockSetup};
pub use midi::{
    is_clock_status, MidiMessage, MidiPort, STATUS_CONTINUE, STATUS_START, STATUS_STOP,
    STATUS_TIMING_CLOCK,
};
pub use play_state::{ExecuteType, PlayState, SongState, TrackState};
pub use project::Project;
pub use routing::{Route, RouteSource, RouteTarget, RoutingTable};
pub use sequence::{CurveSequence, CurveShape, CurveStep, NoteSequence, NoteStep};
pub use song::{Song, SongSlot};
pub use track::{MidiCvTrack, Track, TrackData, TrackMode};
