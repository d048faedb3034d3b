//! Tagged-variant dispatch over the closed set of track engines.
//!
//! The engine owns one slot per track; changing a track's mode rebuilds
//! the slot in place with the matching variant. Dispatch is a match over
//! the tag; the capability surface is identical across variants, with
//! unsupported operations answering neutrally (no gates from a curve
//! track, no idle preview from a MIDI/CV track).

use tactus_model::{MidiMessage, MidiPort, Track, TrackMode};

use crate::curve_engine::CurveTrackEngine;
use crate::midi_cv_engine::MidiCvTrackEngine;
use crate::note_engine::NoteTrackEngine;

pub enum TrackEngine {
    Note(NoteTrackEngine),
    Curve(CurveTrackEngine),
    MidiCv(MidiCvTrackEngine),
}

impl TrackEngine {
    /// Build the variant for a track mode.
    pub fn new(mode: TrackMode) -> Self {
        match mode {
            TrackMode::Note => TrackEngine::Note(NoteTrackEngine::new()),
            TrackMode::Curve => TrackEngine::Curve(CurveTrackEngine::new()),
            TrackMode::MidiCv => TrackEngine::MidiCv(MidiCvTrackEngine::new()),
        }
    }

    pub fn track_mode(&self) -> TrackMode {
        match self {
            TrackEngine::Note(_) => TrackMode::Note,
            TrackEngine::Curve(_) => TrackMode::Curve,
            TrackEngine::MidiCv(_) => TrackMode::MidiCv,
        }
    }

    pub fn reset(&mut self) {
        match self {
            TrackEngine::Note(engine) => engine.reset(),
            TrackEngine::Curve(engine) => engine.reset(),
            TrackEngine::MidiCv(engine) => engine.reset(),
        }
    }

    /// Advance one musical tick. `linked` is the already-ticked peer a
    /// linked track derives its timing from.
    pub fn tick(&mut self, _tick: u32, track: &Track, linked: Option<&TrackEngine>) {
        let linked_tick = linked.map(|peer| peer.sequence_tick());
        match self {
            TrackEngine::Note(engine) => engine.tick(track, linked_tick),
            TrackEngine::Curve(engine) => engine.tick(track, linked_tick),
            TrackEngine::MidiCv(_) => {}
        }
    }

    /// Continuous-time work between ticks (slew etc.).
    pub fn update(&mut self, dt: f32, track: &Track) {
        match self {
            TrackEngine::Note(engine) => engine.update(dt, track),
            TrackEngine::Curve(engine) => engine.update(dt, track),
            TrackEngine::MidiCv(_) => {}
        }
    }

    pub fn set_mute(&mut self, mute: bool) {
        match self {
            TrackEngine::Note(engine) => engine.set_mute(mute),
            TrackEngine::Curve(engine) => engine.set_mute(mute),
            TrackEngine::MidiCv(engine) => engine.set_mute(mute),
        }
    }

    pub fn set_fill(&mut self, fill: bool) {
        match self {
            TrackEngine::Note(engine) => engine.set_fill(fill),
            TrackEngine::Curve(_) | TrackEngine::MidiCv(_) => {}
        }
    }

    pub fn set_pattern(&mut self, pattern: usize) {
        match self {
            TrackEngine::Note(engine) => engine.set_pattern(pattern),
            TrackEngine::Curve(engine) => engine.set_pattern(pattern),
            TrackEngine::MidiCv(_) => {}
        }
    }

    pub fn set_swing(&mut self, swing: u8) {
        match self {
            TrackEngine::Note(engine) => engine.set_swing(swing),
            TrackEngine::Curve(_) | TrackEngine::MidiCv(_) => {}
        }
    }

    pub fn receive_midi(
        &mut self,
        port: MidiPort,
        channel: Option<u8>,
        message: &MidiMessage,
        track: &Track,
    ) {
        match self {
            TrackEngine::Note(engine) => engine.receive_midi(port, channel, message),
            TrackEngine::Curve(engine) => engine.receive_midi(port, channel, message),
            TrackEngine::MidiCv(engine) => engine.receive_midi(port, channel, message, track),
        }
    }

    pub fn gate_output(&self, sub: usize) -> bool {
        match self {
            TrackEngine::Note(engine) => engine.gate_output(sub),
            TrackEngine::Curve(_) => false,
            TrackEngine::MidiCv(engine) => engine.gate_output(sub),
        }
    }

    pub fn cv_output(&self, sub: usize) -> f32 {
        match self {
            TrackEngine::Note(engine) => engine.cv_output(sub),
            TrackEngine::Curve(engine) => engine.cv_output(sub),
            TrackEngine::MidiCv(engine) => engine.cv_output(sub),
        }
    }

    pub fn idle_output(&self) -> bool {
        match self {
            TrackEngine::Note(engine) => engine.idle_output(),
            TrackEngine::Curve(_) | TrackEngine::MidiCv(_) => false,
        }
    }

    pub fn idle_gate_output(&self, sub: usize) -> bool {
        match self {
            TrackEngine::Note(engine) => engine.idle_gate_output(sub),
            TrackEngine::Curve(_) | TrackEngine::MidiCv(_) => false,
        }
    }

    pub fn idle_cv_output(&self, sub: usize) -> f32 {
        match self {
            TrackEngine::Note(engine) => engine.idle_cv_output(sub),
            TrackEngine::Curve(_) | TrackEngine::MidiCv(_) => 0.0,
        }
    }

    pub fn clear_idle_output(&mut self) {
        if let TrackEngine::Note(engine) = self {
            engine.clear_idle_output();
        }
    }

    /// Sequence position for linked-track timing (ticks since reset).
    pub fn sequence_tick(&self) -> u32 {
        match self {
            TrackEngine::Note(engine) => engine.played_tick(),
            TrackEngine::Curve(engine) => engine.played_tick(),
            TrackEngine::MidiCv(_) => 0,
        }
    }

    pub fn as_note(&self) -> Option<&NoteTrackEngine> {
        match self {
            TrackEngine::Note(engine) => Some(engine),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_matches_mode() {
        for mode in [TrackMode::Note, TrackMode::Curve, TrackMode::MidiCv] {
            assert_eq!(TrackEngine::new(mode).track_mode(), mode);
        }
    }

    #[test]
    fn neutral_answers_for_unsupported_capabilities() {
        let curve = TrackEngine::new(TrackMode::Curve);
        assert!(!curve.gate_output(0));
        assert!(!curve.idle_output());
        let midi_cv = TrackEngine::new(TrackMode::MidiCv);
        assert!(!midi_cv.idle_output());
        assert_eq!(midi_cv.idle_cv_output(0), 0.0);
    }
}
