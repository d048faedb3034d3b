//! MIDI-to-CV track engine: voice-allocated gate/pitch/velocity outputs.

use tactus_model::{MidiMessage, MidiPort, Track};

/// Upper bound on voices; the configured count is clamped to this.
pub const MAX_VOICES: usize = 4;

/// Full-scale velocity output in volts.
const VELOCITY_VOLTS: f32 = 5.0;

#[derive(Clone, Copy, Debug, Default)]
struct Voice {
    note: u8,
    velocity: u8,
    gate: bool,
    age: u32,
}

/// Converts incoming MIDI notes into per-voice gate and CV outputs.
///
/// Claims one gate sub-output per voice and two CV sub-outputs per voice:
/// pitch (1 V/oct around middle C) on even sub-indices, velocity on odd.
/// Ticks are ignored; output follows MIDI arrival, so the track also
/// plays while the transport is stopped.
#[derive(Debug, Default)]
pub struct MidiCvTrackEngine {
    mute: bool,
    voices: [Voice; MAX_VOICES],
    next_age: u32,
}

impl MidiCvTrackEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        for voice in &mut self.voices {
            voice.gate = false;
        }
    }

    pub fn set_mute(&mut self, mute: bool) {
        self.mute = mute;
    }

    pub fn receive_midi(
        &mut self,
        port: MidiPort,
        channel: Option<u8>,
        message: &MidiMessage,
        track: &Track,
    ) {
        let Some(config) = track.midi_cv() else {
            return;
        };
        if config.port.is_some_and(|p| p != port) {
            return;
        }
        if let (Some(filter), Some(channel)) = (config.channel, channel) {
            if filter != channel {
                return;
            }
        }

        let count = (config.voices as usize).clamp(1, MAX_VOICES);
        match *message {
            MidiMessage::NoteOn { note, velocity, .. } if velocity > 0 => {
                let index = self.allocate(note, count);
                let voice = &mut self.voices[index];
                voice.note = note;
                voice.velocity = velocity;
                voice.gate = true;
                voice.age = self.next_age;
                self.next_age = self.next_age.wrapping_add(1);
            }
            MidiMessage::NoteOn { note, .. } | MidiMessage::NoteOff { note, .. } => {
                for voice in &mut self.voices[..count] {
                    if voice.gate && voice.note == note {
                        voice.gate = false;
                    }
                }
            }
            _ => {}
        }
    }

    /// Voice selection: retrigger the same note, else take a free voice,
    /// else steal the oldest.
    fn allocate(&self, note: u8, count: usize) -> usize {
        let voices = &self.voices[..count];
        if let Some(index) = voices.iter().position(|v| v.gate && v.note == note) {
            return index;
        }
        if let Some(index) = voices.iter().position(|v| !v.gate) {
            return index;
        }
        voices
            .iter()
            .enumerate()
            .min_by_key(|(_, v)| v.age)
            .map(|(index, _)| index)
            .unwrap_or(0)
    }

    pub fn gate_output(&self, sub: usize) -> bool {
        !self.mute && self.voices.get(sub).is_some_and(|v| v.gate)
    }

    pub fn cv_output(&self, sub: usize) -> f32 {
        let Some(voice) = self.voices.get(sub / 2) else {
            return 0.0;
        };
        if sub % 2 == 0 {
            (voice.note as f32 - 60.0) / 12.0
        } else {
            voice.velocity as f32 / 127.0 * VELOCITY_VOLTS
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tactus_model::TrackMode;

    fn midi_cv_track(voices: u8) -> Track {
        let mut track = Track::default();
        track.set_mode(TrackMode::MidiCv);
        track.midi_cv_mut().unwrap().voices = voices;
        track
    }

    fn note_on(engine: &mut MidiCvTrackEngine, track: &Track, note: u8, velocity: u8) {
        engine.receive_midi(
            MidiPort::Din,
            Some(0),
            &MidiMessage::NoteOn { channel: 0, note, velocity },
            track,
        );
    }

    fn note_off(engine: &mut MidiCvTrackEngine, track: &Track, note: u8) {
        engine.receive_midi(
            MidiPort::Din,
            Some(0),
            &MidiMessage::NoteOff { channel: 0, note, velocity: 0 },
            track,
        );
    }

    #[test]
    fn note_drives_gate_pitch_and_velocity() {
        let track = midi_cv_track(1);
        let mut engine = MidiCvTrackEngine::new();
        note_on(&mut engine, &track, 72, 127);

        assert!(engine.gate_output(0));
        assert_eq!(engine.cv_output(0), 1.0); // +1 octave
        assert_eq!(engine.cv_output(1), VELOCITY_VOLTS);

        note_off(&mut engine, &track, 72);
        assert!(!engine.gate_output(0));
    }

    #[test]
    fn polyphonic_allocation_uses_free_voices() {
        let track = midi_cv_track(2);
        let mut engine = MidiCvTrackEngine::new();
        note_on(&mut engine, &track, 60, 100);
        note_on(&mut engine, &track, 64, 100);

        assert!(engine.gate_output(0));
        assert!(engine.gate_output(1));
        assert_eq!(engine.cv_output(0), 0.0);
        assert!((engine.cv_output(2) - 4.0 / 12.0).abs() < 1e-6);
    }

    #[test]
    fn steals_oldest_voice_when_full() {
        let track = midi_cv_track(2);
        let mut engine = MidiCvTrackEngine::new();
        note_on(&mut engine, &track, 60, 100);
        note_on(&mut engine, &track, 64, 100);
        note_on(&mut engine, &track, 67, 100); // steals voice 0 (oldest)

        assert!((engine.cv_output(0) - 7.0 / 12.0).abs() < 1e-6);
        assert!((engine.cv_output(2) - 4.0 / 12.0).abs() < 1e-6);
    }

    #[test]
    fn channel_filter_rejects_other_channels() {
        let mut track = midi_cv_track(1);
        track.midi_cv_mut().unwrap().channel = Some(3);
        let mut engine = MidiCvTrackEngine::new();
        engine.receive_midi(
            MidiPort::Din,
            Some(0),
            &MidiMessage::NoteOn { channel: 0, note: 60, velocity: 100 },
            &track,
        );
        assert!(!engine.gate_output(0));
    }

    #[test]
    fn port_filter_rejects_other_port() {
        let mut track = midi_cv_track(1);
        track.midi_cv_mut().unwrap().port = Some(MidiPort::UsbMidi);
        let mut engine = MidiCvTrackEngine::new();
        note_on(&mut engine, &track, 60, 100); // arrives on Din
        assert!(!engine.gate_output(0));
    }

    #[test]
    fn mute_silences_gates_but_not_pitch() {
        let track = midi_cv_track(1);
        let mut engine = MidiCvTrackEngine::new();
        note_on(&mut engine, &track, 72, 100);
        engine.set_mute(true);
        assert!(!engine.gate_output(0));
        assert_eq!(engine.cv_output(0), 1.0);
    }

    #[test]
    fn reset_releases_all_voices() {
        let track = midi_cv_track(2);
        let mut engine = MidiCvTrackEngine::new();
        note_on(&mut engine, &track, 60, 100);
        note_on(&mut engine, &track, 64, 100);
        engine.reset();
        assert!(!engine.gate_output(0));
        assert!(!engine.gate_output(1));
    }

    #[test]
    fn same_note_retriggers_its_voice() {
        let track = midi_cv_track(2);
        let mut engine = MidiCvTrackEngine::new();
        note_on(&mut engine, &track, 60, 50);
        note_on(&mut engine, &track, 60, 90);
        // Velocity updated in place, second voice untouched
        assert!((engine.cv_output(1) - 90.0 / 127.0 * VELOCITY_VOLTS).abs() < 1e-6);
        assert!(!engine.gate_output(1));
    }
}
