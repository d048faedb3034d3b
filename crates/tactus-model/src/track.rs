//! Per-track configuration and the closed set of track modes.

use crate::config::PATTERN_COUNT;
use crate::midi::MidiPort;
use crate::sequence::{CurveSequence, NoteSequence};

/// The closed set of sequencer kinds a track can run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TrackMode {
    #[default]
    Note,
    Curve,
    MidiCv,
}

/// Configuration of a MIDI-to-CV track.
#[derive(Clone, Debug)]
pub struct MidiCvTrack {
    /// Accept input from this port only; `None` accepts both
    pub port: Option<MidiPort>,
    /// Accept this MIDI channel only; `None` is omni
    pub channel: Option<u8>,
    /// Number of simultaneously held voices (1..=4)
    pub voices: u8,
}

impl Default for MidiCvTrack {
    fn default() -> Self {
        Self { port: None, channel: None, voices: 1 }
    }
}

/// Mode-specific track payload. The payload and the reported mode cannot
/// disagree because the mode is derived from the payload.
#[derive(Clone, Debug)]
pub enum TrackData {
    Note { patterns: Box<[NoteSequence; PATTERN_COUNT]> },
    Curve { patterns: Box<[CurveSequence; PATTERN_COUNT]> },
    MidiCv(MidiCvTrack),
}

impl TrackData {
    fn new(mode: TrackMode) -> Self {
        match mode {
            TrackMode::Note => TrackData::Note {
                patterns: Box::new(core::array::from_fn(|_| NoteSequence::default())),
            },
            TrackMode::Curve => TrackData::Curve {
                patterns: Box::new(core::array::from_fn(|_| CurveSequence::default())),
            },
            TrackMode::MidiCv => TrackData::MidiCv(MidiCvTrack::default()),
        }
    }
}

/// One track of the project.
#[derive(Clone, Debug)]
pub struct Track {
    data: TrackData,
    /// Follow the sequence position of an earlier track. Must be a lower
    /// index than this track; invalid links are ignored at resolution.
    link_track: Option<usize>,
}

impl Default for Track {
    fn default() -> Self {
        Self {
            data: TrackData::new(TrackMode::Note),
            link_track: None,
        }
    }
}

impl Track {
    pub fn mode(&self) -> TrackMode {
        match self.data {
            TrackData::Note { .. } => TrackMode::Note,
            TrackData::Curve { .. } => TrackMode::Curve,
            TrackData::MidiCv(_) => TrackMode::MidiCv,
        }
    }

    /// Switch the track mode, replacing the payload with defaults.
    pub fn set_mode(&mut self, mode: TrackMode) {
        if self.mode() != mode {
            self.data = TrackData::new(mode);
        }
    }

    pub fn data(&self) -> &TrackData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut TrackData {
        &mut self.data
    }

    pub fn note_pattern(&self, index: usize) -> Option<&NoteSequence> {
        match &self.data {
            TrackData::Note { patterns } => patterns.get(index),
            _ => None,
        }
    }

    pub fn note_pattern_mut(&mut self, index: usize) -> Option<&mut NoteSequence> {
        match &mut self.data {
            TrackData::Note { patterns } => patterns.get_mut(index),
            _ => None,
        }
    }

    pub fn curve_pattern(&self, index: usize) -> Option<&CurveSequence> {
        match &self.data {
            TrackData::Curve { patterns } => patterns.get(index),
            _ => None,
        }
    }

    pub fn curve_pattern_mut(&mut self, index: usize) -> Option<&mut CurveSequence> {
        match &mut self.data {
            TrackData::Curve { patterns } => patterns.get_mut(index),
            _ => None,
        }
    }

    pub fn midi_cv(&self) -> Option<&MidiCvTrack> {
        match &self.data {
            TrackData::MidiCv(track) => Some(track),
            _ => None,
        }
    }

    pub fn midi_cv_mut(&mut self) -> Option<&mut MidiCvTrack> {
        match &mut self.data {
            TrackData::MidiCv(track) => Some(track),
            _ => None,
        }
    }

    pub fn link_track(&self) -> Option<usize> {
        self.link_track
    }

    pub fn set_link_track(&mut self, link: Option<usize>) {
        self.link_track = link;
    }
}
