//! Note track engine: gate/pitch step sequencing with swing.

use tactus_model::{MidiMessage, MidiPort, Track};

/// Plays a [`tactus_model::NoteSequence`], producing one gate and one
/// pitch CV (1 V per octave, step notes are semitone offsets).
#[derive(Debug, Default)]
pub struct NoteTrackEngine {
    mute: bool,
    fill: bool,
    pattern: usize,
    swing: u8,
    /// Ticks consumed since the last reset
    relative_tick: u32,
    /// Sequence tick actually played this iteration (after link resolution)
    played_tick: u32,
    current_step: Option<usize>,
    gate: bool,
    gate_until: Option<u32>,
    cv: f32,
    // MIDI monitoring for idle preview
    monitor_note: Option<u8>,
    idle_active: bool,
    idle_gate: bool,
    idle_cv: f32,
}

impl NoteTrackEngine {
    pub fn new() -> Self {
        Self { swing: 50, ..Self::default() }
    }

    pub fn reset(&mut self) {
        self.relative_tick = 0;
        self.played_tick = 0;
        self.current_step = None;
        self.gate = false;
        self.gate_until = None;
    }

    pub fn tick(&mut self, track: &Track, linked_tick: Option<u32>) {
        let relative = linked_tick.unwrap_or(self.relative_tick);
        self.relative_tick += 1;
        self.played_tick = relative;

        let Some(sequence) = track.note_pattern(self.pattern) else {
            return;
        };

        if let Some(until) = self.gate_until {
            if relative >= until {
                self.gate = false;
                self.gate_until = None;
            }
        }

        let divisor = sequence.divisor();
        let step_number = relative / divisor;
        let offset = if step_number % 2 == 1 {
            // Swing delays every other step toward the shuffle position.
            divisor * (self.swing.clamp(50, 75) as u32 - 50) / 50
        } else {
            0
        };
        if relative % divisor != offset {
            return;
        }

        let step_index = step_number as usize % sequence.length();
        self.current_step = Some(step_index);
        let step = sequence.step(step_index);
        let play_gate = (step.gate || self.fill) && !(self.mute && !self.fill);
        if play_gate {
            self.cv = step.note as f32 / 12.0;
            self.gate = true;
            let length = (divisor * step.gate_length.clamp(1, 100) as u32 / 100).max(1);
            self.gate_until = Some(relative + length);
        }
    }

    pub fn update(&mut self, _dt: f32, _track: &Track) {}

    pub fn set_mute(&mut self, mute: bool) {
        self.mute = mute;
    }

    pub fn set_fill(&mut self, fill: bool) {
        self.fill = fill;
    }

    pub fn set_pattern(&mut self, pattern: usize) {
        self.pattern = pattern;
    }

    pub fn set_swing(&mut self, swing: u8) {
        self.swing = swing;
    }

    pub fn current_step(&self) -> Option<usize> {
        self.current_step
    }

    pub fn played_tick(&self) -> u32 {
        self.played_tick
    }

    pub fn relative_tick(&self) -> u32 {
        self.relative_tick
    }

    /// Monitoring: a held note previews through the idle outputs while
    /// the transport is stopped.
    pub fn receive_midi(&mut self, _port: MidiPort, _channel: Option<u8>, message: &MidiMessage) {
        match *message {
            MidiMessage::NoteOn { note, velocity, .. } if velocity > 0 => {
                self.monitor_note = Some(note);
                self.idle_active = true;
                self.idle_gate = true;
                self.idle_cv = (note as f32 - 60.0) / 12.0;
            }
            MidiMessage::NoteOn { note, .. } | MidiMessage::NoteOff { note, .. } => {
                if self.monitor_note == Some(note) {
                    self.monitor_note = None;
                    self.idle_gate = false;
                }
            }
            _ => {}
        }
    }

    pub fn gate_output(&self, _sub: usize) -> bool {
        self.gate
    }

    pub fn cv_output(&self, _sub: usize) -> f32 {
        self.cv
    }

    pub fn idle_output(&self) -> bool {
        self.idle_active
    }

    pub fn idle_gate_output(&self, _sub: usize) -> bool {
        self.idle_gate
    }

    pub fn idle_cv_output(&self, _sub: usize) -> f32 {
        self.idle_cv
    }

    pub fn clear_idle_output(&mut self) {
        self.idle_active = false;
        self.idle_gate = false;
        self.monitor_note = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tactus_model::TrackMode;

    /// Track with gates on steps 0 and 2 of pattern 0, notes 0 and +12.
    fn test_track() -> Track {
        let mut track = Track::default();
        track.set_mode(TrackMode::Note);
        let seq = track.note_pattern_mut(0).unwrap();
        seq.set_divisor(4);
        seq.set_length(4);
        let step = seq.step_mut(0);
        step.gate = true;
        step.gate_length = 50;
        let step = seq.step_mut(2);
        step.gate = true;
        step.note = 12;
        track
    }

    fn run_ticks(engine: &mut NoteTrackEngine, track: &Track, count: u32) {
        for _ in 0..count {
            engine.tick(track, None);
        }
    }

    #[test]
    fn gates_fire_on_their_steps() {
        let track = test_track();
        let mut engine = NoteTrackEngine::new();

        engine.tick(&track, None); // tick 0: step 0 triggers
        assert!(engine.gate_output(0));
        assert_eq!(engine.current_step(), Some(0));
        assert_eq!(engine.cv_output(0), 0.0);

        run_ticks(&mut engine, &track, 4); // through step 1 (silent)
        assert!(!engine.gate_output(0));

        run_ticks(&mut engine, &track, 4); // step 2 triggers at tick 8
        assert!(engine.gate_output(0));
        assert_eq!(engine.cv_output(0), 1.0); // +12 semitones = 1 V
    }

    #[test]
    fn gate_length_scales_with_divisor() {
        let track = test_track();
        let mut engine = NoteTrackEngine::new();

        engine.tick(&track, None); // trigger, length = 4 * 50% = 2 ticks
        assert!(engine.gate_output(0));
        engine.tick(&track, None); // tick 1: still high
        assert!(engine.gate_output(0));
        engine.tick(&track, None); // tick 2: dropped
        assert!(!engine.gate_output(0));
    }

    #[test]
    fn mute_suppresses_gates() {
        let track = test_track();
        let mut engine = NoteTrackEngine::new();
        engine.set_mute(true);
        run_ticks(&mut engine, &track, 16);
        assert!(!engine.gate_output(0));
    }

    #[test]
    fn fill_forces_gates_through_mute() {
        let track = test_track();
        let mut engine = NoteTrackEngine::new();
        engine.set_mute(true);
        engine.set_fill(true);
        engine.tick(&track, None);
        assert!(engine.gate_output(0));
    }

    #[test]
    fn fill_plays_silent_steps() {
        let track = test_track();
        let mut engine = NoteTrackEngine::new();
        engine.set_fill(true);
        run_ticks(&mut engine, &track, 5); // step 1 has no gate of its own
        assert!(engine.gate_output(0));
    }

    #[test]
    fn swing_delays_odd_steps() {
        let mut track = test_track();
        track.note_pattern_mut(0).unwrap().step_mut(1).gate = true;
        let mut engine = NoteTrackEngine::new();
        engine.set_swing(75); // max shuffle: odd steps shift by divisor/2

        run_ticks(&mut engine, &track, 3); // step 0 trigger + gate drop, ticks 0..2
        assert!(!engine.gate_output(0));
        engine.tick(&track, None); // tick 3: nominal step-1 boundary skipped... offset 2
        run_ticks(&mut engine, &track, 2); // ticks 4,5
        // Step 1 triggers at tick 4 + offset 2 = 6
        assert!(!engine.gate_output(0));
        engine.tick(&track, None); // tick 6
        assert!(engine.gate_output(0));
    }

    #[test]
    fn reset_restarts_the_sequence() {
        let track = test_track();
        let mut engine = NoteTrackEngine::new();
        run_ticks(&mut engine, &track, 7);
        engine.reset();
        assert_eq!(engine.relative_tick(), 0);
        engine.tick(&track, None);
        assert_eq!(engine.current_step(), Some(0));
    }

    #[test]
    fn linked_tick_overrides_own_position() {
        let track = test_track();
        let mut engine = NoteTrackEngine::new();
        // Own position is 0, but the linked peer sits at tick 8 (step 2).
        engine.tick(&track, Some(8));
        assert_eq!(engine.current_step(), Some(2));
        assert_eq!(engine.played_tick(), 8);
    }

    #[test]
    fn monitoring_drives_idle_outputs() {
        let track = test_track();
        let mut engine = NoteTrackEngine::new();
        assert!(!engine.idle_output());

        engine.receive_midi(
            MidiPort::Din,
            Some(0),
            &MidiMessage::NoteOn { channel: 0, note: 72, velocity: 100 },
        );
        assert!(engine.idle_output());
        assert!(engine.idle_gate_output(0));
        assert_eq!(engine.idle_cv_output(0), 1.0);

        engine.receive_midi(
            MidiPort::Din,
            Some(0),
            &MidiMessage::NoteOff { channel: 0, note: 72, velocity: 0 },
        );
        assert!(!engine.idle_gate_output(0));
        assert!(engine.idle_output()); // still previewing until cleared

        engine.clear_idle_output();
        assert!(!engine.idle_output());
        let _ = track;
    }
}
