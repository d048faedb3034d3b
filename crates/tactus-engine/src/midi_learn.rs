//! MIDI-learn hand-off.
//!
//! The engine hands every inbound message here first. While armed, the
//! most recent mapping candidate is recorded; consuming it (building a
//! route from it) is the UI's business.

use tactus_model::{MidiMessage, MidiPort};

/// A recorded mapping candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LearnCandidate {
    ControlChange { port: MidiPort, channel: u8, controller: u8 },
    Note { port: MidiPort, channel: u8, note: u8 },
}

#[derive(Debug, Default)]
pub struct MidiLearn {
    armed: bool,
    candidate: Option<LearnCandidate>,
}

impl MidiLearn {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self) {
        self.armed = true;
        self.candidate = None;
    }

    pub fn disarm(&mut self) {
        self.armed = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn candidate(&self) -> Option<LearnCandidate> {
        self.candidate
    }

    pub fn receive_midi(&mut self, port: MidiPort, message: &MidiMessage) {
        if !self.armed {
            return;
        }
        match *message {
            MidiMessage::ControlChange { channel, controller, .. } => {
                self.candidate = Some(LearnCandidate::ControlChange { port, channel, controller });
            }
            MidiMessage::NoteOn { channel, note, velocity } if velocity > 0 => {
                self.candidate = Some(LearnCandidate::Note { port, channel, note });
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_only_while_armed() {
        let mut learn = MidiLearn::new();
        let cc = MidiMessage::ControlChange { channel: 0, controller: 7, value: 64 };
        learn.receive_midi(MidiPort::Din, &cc);
        assert_eq!(learn.candidate(), None);

        learn.arm();
        learn.receive_midi(MidiPort::Din, &cc);
        assert_eq!(
            learn.candidate(),
            Some(LearnCandidate::ControlChange { port: MidiPort::Din, channel: 0, controller: 7 })
        );
    }

    #[test]
    fn latest_candidate_wins() {
        let mut learn = MidiLearn::new();
        learn.arm();
        learn.receive_midi(
            MidiPort::Din,
            &MidiMessage::ControlChange { channel: 0, controller: 7, value: 0 },
        );
        learn.receive_midi(
            MidiPort::UsbMidi,
            &MidiMessage::NoteOn { channel: 1, note: 60, velocity: 100 },
        );
        assert_eq!(
            learn.candidate(),
            Some(LearnCandidate::Note { port: MidiPort::UsbMidi, channel: 1, note: 60 })
        );
    }

    #[test]
    fn arming_clears_previous_candidate() {
        let mut learn = MidiLearn::new();
        learn.arm();
        learn.receive_midi(
            MidiPort::Din,
            &MidiMessage::ControlChange { channel: 0, controller: 7, value: 0 },
        );
        learn.arm();
        assert_eq!(learn.candidate(), None);
    }
}
