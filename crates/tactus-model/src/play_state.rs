//! Mute, pattern and song-slot state with its three-class request queues.
//!
//! UI-facing mutators only record requests; the engine commits them on its
//! update loop according to the execute discipline: immediate requests on
//! the next iteration, synced requests at sync-measure boundaries, latched
//! requests when the one-shot execute flag is raised.

use crate::config::TRACK_COUNT;

/// Scheduling discipline of a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecuteType {
    Immediate,
    Synced,
    Latched,
}

/// Per-track mute/pattern flags and pending requests.
#[derive(Clone, Copy, Debug, Default)]
pub struct TrackState {
    mute: bool,
    requested_mute: bool,
    fill: bool,
    pattern: usize,
    requested_pattern: usize,
    requests: u8,
}

impl TrackState {
    pub const IMMEDIATE_MUTE_REQUEST: u8 = 1 << 0;
    pub const SYNCED_MUTE_REQUEST: u8 = 1 << 1;
    pub const LATCHED_MUTE_REQUEST: u8 = 1 << 2;
    pub const IMMEDIATE_PATTERN_REQUEST: u8 = 1 << 3;
    pub const SYNCED_PATTERN_REQUEST: u8 = 1 << 4;
    pub const LATCHED_PATTERN_REQUEST: u8 = 1 << 5;

    pub const IMMEDIATE_REQUESTS: u8 =
        Self::IMMEDIATE_MUTE_REQUEST | Self::IMMEDIATE_PATTERN_REQUEST;
    pub const SYNCED_REQUESTS: u8 = Self::SYNCED_MUTE_REQUEST | Self::SYNCED_PATTERN_REQUEST;
    pub const LATCHED_REQUESTS: u8 = Self::LATCHED_MUTE_REQUEST | Self::LATCHED_PATTERN_REQUEST;

    pub fn mute(&self) -> bool {
        self.mute
    }

    pub fn set_mute(&mut self, mute: bool) {
        self.mute = mute;
    }

    pub fn requested_mute(&self) -> bool {
        self.requested_mute
    }

    pub fn fill(&self) -> bool {
        self.fill
    }

    pub fn set_fill(&mut self, fill: bool) {
        self.fill = fill;
    }

    pub fn pattern(&self) -> usize {
        self.pattern
    }

    pub fn set_pattern(&mut self, pattern: usize) {
        self.pattern = pattern;
    }

    pub fn requested_pattern(&self) -> usize {
        self.requested_pattern
    }

    pub fn has_requests(&self, mask: u8) -> bool {
        self.requests & mask != 0
    }

    pub fn set_requests(&mut self, mask: u8) {
        self.requests |= mask;
    }

    pub fn clear_requests(&mut self, mask: u8) {
        self.requests &= !mask;
    }
}

/// Song playback position and pending play/stop requests.
#[derive(Clone, Copy, Debug, Default)]
pub struct SongState {
    current_slot: usize,
    current_repeat: u32,
    requested_slot: Option<usize>,
    playing: bool,
    requests: u8,
}

impl SongState {
    pub const IMMEDIATE_PLAY_REQUEST: u8 = 1 << 0;
    pub const SYNCED_PLAY_REQUEST: u8 = 1 << 1;
    pub const LATCHED_PLAY_REQUEST: u8 = 1 << 2;
    pub const IMMEDIATE_STOP_REQUEST: u8 = 1 << 3;
    pub const SYNCED_STOP_REQUEST: u8 = 1 << 4;
    pub const LATCHED_STOP_REQUEST: u8 = 1 << 5;

    pub const IMMEDIATE_REQUESTS: u8 =
        Self::IMMEDIATE_PLAY_REQUEST | Self::IMMEDIATE_STOP_REQUEST;
    pub const SYNCED_REQUESTS: u8 = Self::SYNCED_PLAY_REQUEST | Self::SYNCED_STOP_REQUEST;
    pub const LATCHED_REQUESTS: u8 = Self::LATCHED_PLAY_REQUEST | Self::LATCHED_STOP_REQUEST;

    pub fn current_slot(&self) -> usize {
        self.current_slot
    }

    pub fn set_current_slot(&mut self, slot: usize) {
        self.current_slot = slot;
    }

    pub fn current_repeat(&self) -> u32 {
        self.current_repeat
    }

    pub fn set_current_repeat(&mut self, repeat: u32) {
        self.current_repeat = repeat;
    }

    pub fn requested_slot(&self) -> Option<usize> {
        self.requested_slot
    }

    pub fn playing(&self) -> bool {
        self.playing
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    pub fn has_requests(&self, mask: u8) -> bool {
        self.requests & mask != 0
    }

    pub fn set_requests(&mut self, mask: u8) {
        self.requests |= mask;
    }

    pub fn clear_requests(&mut self, mask: u8) {
        self.requests &= !mask;
    }
}

/// Aggregate play state for all tracks and the song.
#[derive(Clone, Debug, Default)]
pub struct PlayState {
    track_states: [TrackState; TRACK_COUNT],
    song_state: SongState,
    execute_latched: bool,
}

impl PlayState {
    pub fn track_state(&self, track: usize) -> &TrackState {
        &self.track_states[track]
    }

    pub fn track_state_mut(&mut self, track: usize) -> &mut TrackState {
        &mut self.track_states[track]
    }

    pub fn song_state(&self) -> &SongState {
        &self.song_state
    }

    pub fn song_state_mut(&mut self) -> &mut SongState {
        &mut self.song_state
    }

    // --- UI-facing request mutators ---

    pub fn mute_track(&mut self, track: usize, execute: ExecuteType) {
        let state = &mut self.track_states[track];
        state.requested_mute = true;
        state.set_requests(mute_request_bit(execute));
    }

    pub fn unmute_track(&mut self, track: usize, execute: ExecuteType) {
        let state = &mut self.track_states[track];
        state.requested_mute = false;
        state.set_requests(mute_request_bit(execute));
    }

    pub fn toggle_mute_track(&mut self, track: usize, execute: ExecuteType) {
        if self.track_states[track].mute {
            self.unmute_track(track, execute);
        } else {
            self.mute_track(track, execute);
        }
    }

    pub fn select_pattern(&mut self, track: usize, pattern: usize, execute: ExecuteType) {
        let state = &mut self.track_states[track];
        state.requested_pattern = pattern;
        state.set_requests(pattern_request_bit(execute));
    }

    pub fn fill_track(&mut self, track: usize, fill: bool) {
        self.track_states[track].fill = fill;
    }

    pub fn fill_all(&mut self, fill: bool) {
        for state in &mut self.track_states {
            state.fill = fill;
        }
    }

    pub fn play_song(&mut self, slot: usize, execute: ExecuteType) {
        self.song_state.requested_slot = Some(slot);
        self.song_state.set_requests(match execute {
            ExecuteType::Immediate => SongState::IMMEDIATE_PLAY_REQUEST,
            ExecuteType::Synced => SongState::SYNCED_PLAY_REQUEST,
            ExecuteType::Latched => SongState::LATCHED_PLAY_REQUEST,
        });
    }

    pub fn stop_song(&mut self, execute: ExecuteType) {
        self.song_state.set_requests(match execute {
            ExecuteType::Immediate => SongState::IMMEDIATE_STOP_REQUEST,
            ExecuteType::Synced => SongState::SYNCED_STOP_REQUEST,
            ExecuteType::Latched => SongState::LATCHED_STOP_REQUEST,
        });
    }

    /// One-shot trigger: commit all latched requests on the engine's next
    /// iteration.
    pub fn commit_latched_requests(&mut self) {
        self.execute_latched = true;
    }

    pub fn execute_latched_requests(&self) -> bool {
        self.execute_latched
    }

    // --- engine-facing queries and clears ---

    pub fn has_immediate_requests(&self) -> bool {
        self.track_states
            .iter()
            .any(|t| t.has_requests(TrackState::IMMEDIATE_REQUESTS))
            || self.song_state.has_requests(SongState::IMMEDIATE_REQUESTS)
    }

    pub fn has_synced_requests(&self) -> bool {
        self.track_states
            .iter()
            .any(|t| t.has_requests(TrackState::SYNCED_REQUESTS))
            || self.song_state.has_requests(SongState::SYNCED_REQUESTS)
    }

    pub fn has_latched_requests(&self) -> bool {
        self.track_states
            .iter()
            .any(|t| t.has_requests(TrackState::LATCHED_REQUESTS))
            || self.song_state.has_requests(SongState::LATCHED_REQUESTS)
    }

    pub fn clear_immediate_requests(&mut self) {
        for state in &mut self.track_states {
            state.clear_requests(TrackState::IMMEDIATE_REQUESTS);
        }
        self.song_state.clear_requests(SongState::IMMEDIATE_REQUESTS);
    }

    pub fn clear_synced_requests(&mut self) {
        for state in &mut self.track_states {
            state.clear_requests(TrackState::SYNCED_REQUESTS);
        }
        self.song_state.clear_requests(SongState::SYNCED_REQUESTS);
    }

    /// Clears latched requests and consumes the execute trigger.
    pub fn clear_latched_requests(&mut self) {
        for state in &mut self.track_states {
            state.clear_requests(TrackState::LATCHED_REQUESTS);
        }
        self.song_state.clear_requests(SongState::LATCHED_REQUESTS);
        self.execute_latched = false;
    }
}

fn mute_request_bit(execute: ExecuteType) -> u8 {
    match execute {
        ExecuteType::Immediate => TrackState::IMMEDIATE_MUTE_REQUEST,
        ExecuteType::Synced => TrackState::SYNCED_MUTE_REQUEST,
        ExecuteType::Latched => TrackState::LATCHED_MUTE_REQUEST,
    }
}

fn pattern_request_bit(execute: ExecuteType) -> u8 {
    match execute {
        ExecuteType::Immediate => TrackState::IMMEDIATE_PATTERN_REQUEST,
        ExecuteType::Synced => TrackState::SYNCED_PATTERN_REQUEST,
        ExecuteType::Latched => TrackState::LATCHED_PATTERN_REQUEST,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mute_request_records_target_and_bit() {
        let mut ps = PlayState::default();
        ps.mute_track(2, ExecuteType::Synced);
        let state = ps.track_state(2);
        assert!(state.requested_mute());
        assert!(state.has_requests(TrackState::SYNCED_MUTE_REQUEST));
        assert!(!state.has_requests(TrackState::IMMEDIATE_MUTE_REQUEST));
        assert!(ps.has_synced_requests());
        assert!(!ps.has_immediate_requests());
    }

    #[test]
    fn pattern_request_is_independent_of_mute_request() {
        let mut ps = PlayState::default();
        ps.select_pattern(0, 5, ExecuteType::Immediate);
        let state = ps.track_state(0);
        assert_eq!(state.requested_pattern(), 5);
        assert!(state.has_requests(TrackState::IMMEDIATE_PATTERN_REQUEST));
        assert!(!state.has_requests(TrackState::IMMEDIATE_MUTE_REQUEST));
    }

    #[test]
    fn latched_requests_need_commit_flag() {
        let mut ps = PlayState::default();
        ps.mute_track(0, ExecuteType::Latched);
        assert!(ps.has_latched_requests());
        assert!(!ps.execute_latched_requests());
        ps.commit_latched_requests();
        assert!(ps.execute_latched_requests());
        ps.clear_latched_requests();
        assert!(!ps.has_latched_requests());
        assert!(!ps.execute_latched_requests());
    }

    #[test]
    fn song_requests() {
        let mut ps = PlayState::default();
        ps.play_song(3, ExecuteType::Immediate);
        assert_eq!(ps.song_state().requested_slot(), Some(3));
        assert!(ps.song_state().has_requests(SongState::IMMEDIATE_PLAY_REQUEST));
        ps.stop_song(ExecuteType::Synced);
        assert!(ps.song_state().has_requests(SongState::SYNCED_STOP_REQUEST));
    }

    #[test]
    fn clears_are_class_scoped() {
        let mut ps = PlayState::default();
        ps.mute_track(0, ExecuteType::Immediate);
        ps.mute_track(1, ExecuteType::Synced);
        ps.clear_immediate_requests();
        assert!(!ps.has_immediate_requests());
        assert!(ps.has_synced_requests());
    }
}
