//! Routing of external sources onto project parameters.
//!
//! Sources are sampled on the engine's fixed update schedule: CV inputs
//! every iteration, MIDI control changes as they arrive. A route whose
//! source has not produced a value yet leaves its target untouched.

use arrayvec::ArrayVec;

use tactus_hal::{CvInput, CV_VOLTS_MAX, CV_VOLTS_MIN};
use tactus_model::config::{CV_INPUT_COUNT, PATTERN_COUNT, ROUTE_COUNT, TRACK_COUNT};
use tactus_model::{
    ExecuteType, MidiMessage, MidiPort, Project, RouteSource, RouteTarget, RoutingTable,
};

pub struct RoutingEngine {
    /// Last normalized source value per route slot
    values: [Option<f32>; ROUTE_COUNT],
}

impl RoutingEngine {
    pub fn new() -> Self {
        Self { values: [None; ROUTE_COUNT] }
    }

    /// Capture MIDI-sourced route values.
    pub fn receive_midi(&mut self, port: MidiPort, message: &MidiMessage, routing: &RoutingTable) {
        let MidiMessage::ControlChange { channel, controller, value } = *message else {
            return;
        };
        for (slot, route) in routing.iter() {
            let RouteSource::MidiCc { port: port_filter, channel: channel_filter, controller: cc } =
                route.source
            else {
                continue;
            };
            if cc == controller
                && port_filter.is_none_or(|p| p == port)
                && channel_filter.is_none_or(|c| c == channel)
            {
                self.values[slot] = Some(value as f32 / 127.0);
            }
        }
    }

    /// Sample CV sources and write every mapped value to its target.
    pub fn update(&mut self, project: &mut Project, cv_input: &CvInput) {
        let mut pending: ArrayVec<(RouteTarget, f32), ROUTE_COUNT> = ArrayVec::new();

        for (slot, route) in project.routing().iter() {
            if let RouteSource::CvIn(channel) = route.source {
                if channel < CV_INPUT_COUNT {
                    let volts = cv_input.channel(channel);
                    let normalized =
                        ((volts - CV_VOLTS_MIN) / (CV_VOLTS_MAX - CV_VOLTS_MIN)).clamp(0.0, 1.0);
                    self.values[slot] = Some(normalized);
                }
            }
            if let Some(value) = self.values[slot] {
                let mapped = route.min + value * (route.max - route.min);
                pending.push((route.target, mapped));
            }
        }

        for (target, value) in pending {
            apply_target(project, target, value);
        }
    }
}

impl Default for RoutingEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_target(project: &mut Project, target: RouteTarget, value: f32) {
    match target {
        RouteTarget::Bpm => project.set_bpm(value),
        RouteTarget::Swing => project.set_swing(value.round().clamp(0.0, 255.0) as u8),
        RouteTarget::SyncMeasure => project.set_sync_measure(value.round().max(1.0) as u32),
        RouteTarget::TrackMute(track) => {
            if track < TRACK_COUNT {
                let mute = value >= 0.5;
                if project.play_state().track_state(track).mute() != mute {
                    if mute {
                        project.play_state_mut().mute_track(track, ExecuteType::Immediate);
                    } else {
                        project.play_state_mut().unmute_track(track, ExecuteType::Immediate);
                    }
                }
            }
        }
        RouteTarget::TrackPattern(track) => {
            if track < TRACK_COUNT {
                let pattern =
                    (value.round().max(0.0) as usize).min(PATTERN_COUNT - 1);
                if project.play_state().track_state(track).pattern() != pattern {
                    project
                        .play_state_mut()
                        .select_pattern(track, pattern, ExecuteType::Immediate);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tactus_model::Route;

    fn bpm_route(min: f32, max: f32) -> Route {
        Route {
            source: RouteSource::MidiCc { port: None, channel: None, controller: 7 },
            target: RouteTarget::Bpm,
            min,
            max,
        }
    }

    #[test]
    fn cc_maps_onto_bpm_range() {
        let mut project = Project::default();
        project.routing_mut().set_route(0, bpm_route(60.0, 180.0));
        let mut engine = RoutingEngine::new();
        let cv = CvInput::default();

        engine.receive_midi(
            MidiPort::Din,
            &MidiMessage::ControlChange { channel: 0, controller: 7, value: 127 },
            project.routing(),
        );
        engine.update(&mut project, &cv);
        assert_eq!(project.bpm(), 180.0);

        engine.receive_midi(
            MidiPort::Din,
            &MidiMessage::ControlChange { channel: 0, controller: 7, value: 0 },
            project.routing(),
        );
        engine.update(&mut project, &cv);
        assert_eq!(project.bpm(), 60.0);
    }

    #[test]
    fn unmatched_cc_leaves_target_alone() {
        let mut project = Project::default();
        project.routing_mut().set_route(0, bpm_route(60.0, 180.0));
        let mut engine = RoutingEngine::new();
        let cv = CvInput::default();

        engine.receive_midi(
            MidiPort::Din,
            &MidiMessage::ControlChange { channel: 0, controller: 8, value: 127 },
            project.routing(),
        );
        engine.update(&mut project, &cv);
        assert_eq!(project.bpm(), 120.0);
    }

    #[test]
    fn channel_filter_applies() {
        let mut project = Project::default();
        project.routing_mut().set_route(
            0,
            Route {
                source: RouteSource::MidiCc { port: None, channel: Some(5), controller: 1 },
                target: RouteTarget::Bpm,
                min: 60.0,
                max: 180.0,
            },
        );
        let mut engine = RoutingEngine::new();
        let cv = CvInput::default();

        engine.receive_midi(
            MidiPort::Din,
            &MidiMessage::ControlChange { channel: 4, controller: 1, value: 127 },
            project.routing(),
        );
        engine.update(&mut project, &cv);
        assert_eq!(project.bpm(), 120.0);
    }

    #[test]
    fn cv_input_drives_swing() {
        let mut project = Project::default();
        project.routing_mut().set_route(
            0,
            Route {
                source: RouteSource::CvIn(0),
                target: RouteTarget::Swing,
                min: 50.0,
                max: 75.0,
            },
        );
        let mut engine = RoutingEngine::new();
        let mut cv = CvInput::default();
        cv.set_raw(0, u16::MAX);
        cv.update();

        engine.update(&mut project, &cv);
        assert_eq!(project.swing(), 75);
    }

    #[test]
    fn mute_route_raises_immediate_request() {
        let mut project = Project::default();
        project.routing_mut().set_route(
            0,
            Route {
                source: RouteSource::MidiCc { port: None, channel: None, controller: 20 },
                target: RouteTarget::TrackMute(2),
                min: 0.0,
                max: 1.0,
            },
        );
        let mut engine = RoutingEngine::new();
        let cv = CvInput::default();

        engine.receive_midi(
            MidiPort::UsbMidi,
            &MidiMessage::ControlChange { channel: 0, controller: 20, value: 127 },
            project.routing(),
        );
        engine.update(&mut project, &cv);

        let state = project.play_state().track_state(2);
        assert!(state.requested_mute());
        assert!(project.play_state().has_immediate_requests());
    }
}
