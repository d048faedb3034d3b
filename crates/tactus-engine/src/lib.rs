//! Real-time sequencing engine for the tactus step sequencer.
//!
//! The [`Engine`] couples the musical [`Clock`], the play-state request
//! machine and the per-track sequencer variants into one cooperative
//! update loop that refreshes CV and gate outputs once per iteration.
//! Interrupt-side producers talk to the clock through [`ClockHandle`]s
//! and to the MIDI transports through their byte intake.

mod clock;
mod curve_engine;
mod engine;
mod midi_cv_engine;
mod midi_learn;
mod note_engine;
mod nudge_tempo;
mod routing_engine;
mod tap_tempo;
mod track_engine;

pub use clock::{Clock, ClockEvent, ClockHandle, ClockListener, ClockSource, OutputState};
pub use curve_engine::CurveTrackEngine;
pub use engine::{Engine, MessageHandler, MidiReceiveHandler};
pub use midi_cv_engine::{MidiCvTrackEngine, MAX_VOICES};
pub use midi_learn::{LearnCandidate, MidiLearn};
pub use note_engine::NoteTrackEngine;
pub use nudge_tempo::NudgeTempo;
pub use routing_engine::RoutingEngine;
pub use tap_tempo::TapTempo;
pub use track_engine::TrackEngine;
