//! Curve track engine: shape-per-step CV with slew.

use tactus_model::{MidiMessage, MidiPort, Track};

/// Output span of a curve track in volts (normalized 1.0 maps here).
const CURVE_VOLTS: f32 = 5.0;

/// Slew rate constant; larger snaps faster to the target.
const SLEW_PER_SECOND: f32 = 50.0;

/// Plays a [`tactus_model::CurveSequence`]. The tick side computes the
/// target value from the step shape; `update` slews the output toward it
/// in continuous time. Claims no gate outputs.
#[derive(Debug, Default)]
pub struct CurveTrackEngine {
    mute: bool,
    pattern: usize,
    relative_tick: u32,
    played_tick: u32,
    target: f32,
    cv: f32,
}

impl CurveTrackEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.relative_tick = 0;
        self.played_tick = 0;
    }

    pub fn tick(&mut self, track: &Track, linked_tick: Option<u32>) {
        let relative = linked_tick.unwrap_or(self.relative_tick);
        self.relative_tick += 1;
        self.played_tick = relative;

        let Some(sequence) = track.curve_pattern(self.pattern) else {
            return;
        };
        if self.mute {
            // Muted curves freeze at their last value.
            return;
        }

        let divisor = sequence.divisor();
        let step_index = (relative / divisor) as usize % sequence.length();
        let phase = (relative % divisor) as f32 / divisor as f32;
        let step = sequence.step(step_index);
        let value = step.min + (step.max - step.min) * step.shape.eval(phase);
        self.target = value * CURVE_VOLTS;
    }

    pub fn update(&mut self, dt: f32, _track: &Track) {
        let amount = (dt * SLEW_PER_SECOND).min(1.0);
        self.cv += (self.target - self.cv) * amount;
    }

    pub fn set_mute(&mut self, mute: bool) {
        self.mute = mute;
    }

    pub fn set_pattern(&mut self, pattern: usize) {
        self.pattern = pattern;
    }

    pub fn played_tick(&self) -> u32 {
        self.played_tick
    }

    pub fn receive_midi(&mut self, _port: MidiPort, _channel: Option<u8>, _message: &MidiMessage) {}

    pub fn cv_output(&self, _sub: usize) -> f32 {
        self.cv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tactus_model::{CurveShape, TrackMode};

    fn curve_track(shape: CurveShape) -> Track {
        let mut track = Track::default();
        track.set_mode(TrackMode::Curve);
        let seq = track.curve_pattern_mut(0).unwrap();
        seq.set_divisor(4);
        seq.set_length(2);
        seq.step_mut(0).shape = shape;
        seq.step_mut(1).shape = CurveShape::Low;
        track
    }

    fn settle(engine: &mut CurveTrackEngine, track: &Track) {
        for _ in 0..200 {
            engine.update(0.05, track);
        }
    }

    #[test]
    fn high_step_reaches_full_scale() {
        let track = curve_track(CurveShape::High);
        let mut engine = CurveTrackEngine::new();
        engine.tick(&track, None);
        settle(&mut engine, &track);
        assert!((engine.cv_output(0) - CURVE_VOLTS).abs() < 1e-3);
    }

    #[test]
    fn ramp_tracks_phase() {
        let track = curve_track(CurveShape::RampUp);
        let mut engine = CurveTrackEngine::new();
        // Tick to phase 2/4 of step 0
        engine.tick(&track, None);
        engine.tick(&track, None);
        engine.tick(&track, None);
        settle(&mut engine, &track);
        assert!((engine.cv_output(0) - CURVE_VOLTS * 0.5).abs() < 1e-3);
    }

    #[test]
    fn slew_approaches_gradually() {
        let track = curve_track(CurveShape::High);
        let mut engine = CurveTrackEngine::new();
        engine.tick(&track, None);
        engine.update(0.001, &track);
        let first = engine.cv_output(0);
        assert!(first > 0.0 && first < CURVE_VOLTS);
        engine.update(0.001, &track);
        assert!(engine.cv_output(0) > first);
    }

    #[test]
    fn mute_freezes_output() {
        let track = curve_track(CurveShape::High);
        let mut engine = CurveTrackEngine::new();
        engine.tick(&track, None);
        settle(&mut engine, &track);
        let held = engine.cv_output(0);

        engine.set_mute(true);
        // Advance into the Low step; target must not follow.
        for _ in 0..8 {
            engine.tick(&track, None);
        }
        settle(&mut engine, &track);
        assert_eq!(engine.cv_output(0), held);
    }
}
