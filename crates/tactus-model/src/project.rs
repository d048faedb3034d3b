//! The project: everything the engine consumes on each update.

use crate::clock_setup::ClockSetup;
use crate::config::{CV_OUTPUT_COUNT, GATE_OUTPUT_COUNT, TRACK_COUNT};
use crate::play_state::PlayState;
use crate::routing::RoutingTable;
use crate::song::Song;
use crate::track::Track;

/// Aggregate configuration and musical state.
///
/// The UI mutates this under the engine lock; the engine reads it every
/// update and writes back through the play state and routing targets.
#[derive(Clone, Debug)]
pub struct Project {
    bpm: f32,
    /// Swing amount in percent (50 = straight, 75 = maximum shuffle)
    swing: u8,
    /// Sync-measure length in bars
    sync_measure: u32,
    clock_setup: ClockSetup,
    tracks: [Track; TRACK_COUNT],
    /// Source track per physical gate output
    gate_output_tracks: [usize; GATE_OUTPUT_COUNT],
    /// Source track per physical CV output channel
    cv_output_tracks: [usize; CV_OUTPUT_COUNT],
    play_state: PlayState,
    song: Song,
    routing: RoutingTable,
    /// Track whose idle output may preview while the clock is stopped
    selected_track_index: usize,
}

impl Default for Project {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            swing: 50,
            sync_measure: 1,
            clock_setup: ClockSetup::default(),
            tracks: core::array::from_fn(|_| Track::default()),
            gate_output_tracks: core::array::from_fn(|i| i % TRACK_COUNT),
            cv_output_tracks: core::array::from_fn(|i| i % TRACK_COUNT),
            play_state: PlayState::default(),
            song: Song::default(),
            routing: RoutingTable::default(),
            selected_track_index: 0,
        }
    }
}

impl Project {
    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    pub fn set_bpm(&mut self, bpm: f32) {
        self.bpm = bpm.clamp(20.0, 1000.0);
    }

    pub fn swing(&self) -> u8 {
        self.swing
    }

    pub fn set_swing(&mut self, swing: u8) {
        self.swing = swing.clamp(50, 75);
    }

    pub fn sync_measure(&self) -> u32 {
        self.sync_measure
    }

    pub fn set_sync_measure(&mut self, bars: u32) {
        self.sync_measure = bars.max(1);
    }

    pub fn clock_setup(&self) -> &ClockSetup {
        &self.clock_setup
    }

    pub fn clock_setup_mut(&mut self) -> &mut ClockSetup {
        &mut self.clock_setup
    }

    pub fn track(&self, index: usize) -> &Track {
        &self.tracks[index]
    }

    pub fn track_mut(&mut self, index: usize) -> &mut Track {
        &mut self.tracks[index]
    }

    pub fn gate_output_tracks(&self) -> &[usize; GATE_OUTPUT_COUNT] {
        &self.gate_output_tracks
    }

    /// Route physical gate output `output` to `track`'s engine.
    pub fn set_gate_output_track(&mut self, output: usize, track: usize) {
        if output < GATE_OUTPUT_COUNT && track < TRACK_COUNT {
            self.gate_output_tracks[output] = track;
        }
    }

    pub fn cv_output_tracks(&self) -> &[usize; CV_OUTPUT_COUNT] {
        &self.cv_output_tracks
    }

    /// Route physical CV output `output` to `track`'s engine.
    pub fn set_cv_output_track(&mut self, output: usize, track: usize) {
        if output < CV_OUTPUT_COUNT && track < TRACK_COUNT {
            self.cv_output_tracks[output] = track;
        }
    }

    pub fn play_state(&self) -> &PlayState {
        &self.play_state
    }

    pub fn play_state_mut(&mut self) -> &mut PlayState {
        &mut self.play_state
    }

    pub fn song(&self) -> &Song {
        &self.song
    }

    pub fn song_mut(&mut self) -> &mut Song {
        &mut self.song
    }

    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    pub fn routing_mut(&mut self) -> &mut RoutingTable {
        &mut self.routing
    }

    pub fn selected_track_index(&self) -> usize {
        self.selected_track_index
    }

    pub fn set_selected_track_index(&mut self, index: usize) {
        if index < TRACK_COUNT {
            self.selected_track_index = index;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bpm_is_clamped() {
        let mut project = Project::default();
        project.set_bpm(5000.0);
        assert_eq!(project.bpm(), 1000.0);
        project.set_bpm(1.0);
        assert_eq!(project.bpm(), 20.0);
    }

    #[test]
    fn swing_is_clamped() {
        let mut project = Project::default();
        project.set_swing(90);
        assert_eq!(project.swing(), 75);
        project.set_swing(10);
        assert_eq!(project.swing(), 50);
    }

    #[test]
    fn output_maps_default_to_identity() {
        let project = Project::default();
        for i in 0..GATE_OUTPUT_COUNT {
            assert_eq!(project.gate_output_tracks()[i], i % TRACK_COUNT);
        }
    }

    #[test]
    fn invalid_output_routing_is_ignored() {
        let mut project = Project::default();
        project.set_gate_output_track(0, TRACK_COUNT);
        assert_eq!(project.gate_output_tracks()[0], 0);
    }
}
