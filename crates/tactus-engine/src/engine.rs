//! The engine: couples the clock, play state, track engines and hardware
//! outputs inside a single non-reentrant update loop.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use log::debug;
use tactus_hal::{Calibration, CvInput, CvOutput, Dio, GateOutput, Midi, SystemTicks, UsbMidi};
use tactus_model::config::{
    CV_OUTPUT_COUNT, GATE_OUTPUT_COUNT, MIDI_CLOCK_PPQN, PPQN, TRACK_COUNT,
};
use tactus_model::{
    is_clock_status, ClockInputMode, ClockOutputMode, ClockSetup, MidiMessage, MidiPort, Project,
    SongState, TrackState,
};

use crate::clock::{Clock, ClockEvent, ClockListener, ClockSource, OutputState};
use crate::midi_learn::MidiLearn;
use crate::nudge_tempo::NudgeTempo;
use crate::routing_engine::RoutingEngine;
use crate::tap_tempo::TapTempo;
use crate::track_engine::TrackEngine;

/// UI notification callback: text and display duration in milliseconds.
pub type MessageHandler = Box<dyn FnMut(&str, u32) + Send>;

/// Observer for every inbound MIDI message, after routing/learn hand-off.
pub type MidiReceiveHandler = Box<dyn FnMut(MidiPort, &MidiMessage) + Send>;

// Clock input mode codes shared with interrupt handlers.
const INPUT_MODE_RESET: u8 = 0;
const INPUT_MODE_RUN: u8 = 1;
const INPUT_MODE_START_STOP: u8 = 2;

fn input_mode_code(mode: ClockInputMode) -> u8 {
    match mode {
        ClockInputMode::Reset => INPUT_MODE_RESET,
        ClockInputMode::Run => INPUT_MODE_RUN,
        ClockInputMode::StartStop => INPUT_MODE_START_STOP,
    }
}

/// Applies clock output transitions to the DIO block per the configured
/// output mode.
fn apply_clock_output(dio: &mut Dio, setup: &ClockSetup, state: OutputState) {
    dio.clock_output.set(state.clock);
    match setup.clock_output_mode() {
        ClockOutputMode::Reset => dio.reset_output.set(state.reset),
        ClockOutputMode::Run => dio.reset_output.set(state.run),
        ClockOutputMode::Last => {}
    }
}

/// Short-lived listener the engine hands to the clock while advancing it.
struct ClockSink<'a> {
    dio: &'a mut Dio,
    midi: &'a mut Midi,
    usb_midi: &'a mut UsbMidi,
    clock_setup: &'a ClockSetup,
}

impl ClockListener for ClockSink<'_> {
    fn on_clock_output(&mut self, state: OutputState) {
        apply_clock_output(self.dio, self.clock_setup, state);
    }

    fn on_clock_midi(&mut self, data: u8) {
        let Some(message) = MidiMessage::from_realtime(data) else {
            return;
        };
        if self.clock_setup.midi_tx() {
            let _ = self.midi.send(message);
        }
        if self.clock_setup.usb_tx() {
            let _ = self.usb_midi.send(message);
        }
    }
}

pub struct Engine {
    project: Project,
    // hardware
    time: SystemTicks,
    dio: Dio,
    gate_output: GateOutput,
    cv_input: CvInput,
    cv_output: CvOutput,
    midi: Midi,
    usb_midi: UsbMidi,
    // subsystems
    clock: Clock,
    routing_engine: RoutingEngine,
    midi_learn: MidiLearn,
    tap_tempo: TapTempo,
    nudge_tempo: NudgeTempo,
    track_engines: [Option<TrackEngine>; TRACK_COUNT],
    // update state
    tick: u32,
    running: bool,
    last_system_us: u64,
    // lock machinery (flags are set from other subsystems, consumed here)
    request_lock: AtomicBool,
    request_unlock: AtomicBool,
    locked: bool,
    // overrides
    gate_output_override: bool,
    gate_output_override_value: u8,
    cv_output_override: bool,
    cv_output_override_values: [f32; CV_OUTPUT_COUNT],
    // callbacks
    message_handler: Option<MessageHandler>,
    midi_receive_handler: Option<MidiReceiveHandler>,
    // interrupt-visible copy of the configured clock input mode
    clock_input_mode: Arc<AtomicU8>,
}

impl Engine {
    pub fn new(project: Project) -> Self {
        Self::with_calibration(project, Calibration::default())
    }

    pub fn with_calibration(project: Project, calibration: Calibration) -> Self {
        Self {
            project,
            time: SystemTicks::new(),
            dio: Dio::default(),
            gate_output: GateOutput::default(),
            cv_input: CvInput::default(),
            cv_output: CvOutput::new(calibration),
            midi: Midi::new(),
            usb_midi: UsbMidi::new(),
            clock: Clock::new(),
            routing_engine: RoutingEngine::new(),
            midi_learn: MidiLearn::new(),
            tap_tempo: TapTempo::new(),
            nudge_tempo: NudgeTempo::new(),
            track_engines: core::array::from_fn(|_| None),
            tick: 0,
            running: false,
            last_system_us: 0,
            request_lock: AtomicBool::new(false),
            request_unlock: AtomicBool::new(false),
            locked: false,
            gate_output_override: false,
            gate_output_override_value: 0,
            cv_output_override: false,
            cv_output_override_values: [0.0; CV_OUTPUT_COUNT],
            message_handler: None,
            midi_receive_handler: None,
            clock_input_mode: Arc::new(AtomicU8::new(INPUT_MODE_RESET)),
        }
    }

    /// Wire interrupt callbacks and bring every subsystem to a defined
    /// state. Must run once before the first `update`.
    pub fn init(&mut self) {
        self.init_clock();
        self.update_clock_setup();
        self.update_track_setups();
        self.update_track_sequences();
        self.reset_track_engines();
        self.last_system_us = self.time.now_us();
    }

    /// One iteration of the cooperative foreground loop. Not reentrant.
    pub fn update(&mut self) {
        let now_us = self.time.now_us();
        let elapsed_us = now_us.saturating_sub(self.last_system_us);
        self.last_system_us = now_us;
        let dt = elapsed_us as f32 * 1e-6;

        // Integrate the clock; on device the timer interrupt drives this.
        {
            let mut sink = ClockSink {
                dio: &mut self.dio,
                midi: &mut self.midi,
                usb_midi: &mut self.usb_midi,
                clock_setup: self.project.clock_setup(),
            };
            self.clock.advance(elapsed_us, &mut sink);
        }

        // locking
        if self.request_lock.swap(false, Ordering::Relaxed) {
            self.clock.master_stop();
            self.locked = true;
        }
        if self.request_unlock.swap(false, Ordering::Relaxed) {
            self.locked = false;
        }
        if self.locked {
            // Discard sequenced work, keep the DAC refreshed.
            while self.clock.check_tick().is_some() {}
            while self.midi.recv().is_some() {}
            while self.usb_midi.recv().is_some() {}
            self.update_overrides();
            self.cv_output.update();
            return;
        }

        // clock events
        while let Some(event) = self.clock.check_event() {
            match event {
                ClockEvent::Start => {
                    debug!(target: "engine", "start");
                    self.running = true;
                    self.reset_track_engines();
                }
                ClockEvent::Stop => {
                    debug!(target: "engine", "stop");
                    self.running = false;
                }
                ClockEvent::Continue => {
                    debug!(target: "engine", "continue");
                    self.running = true;
                }
                ClockEvent::Reset => {
                    debug!(target: "engine", "reset");
                    self.running = false;
                    self.reset_track_engines();
                }
            }
        }

        self.receive_midi_all();

        // tempo
        self.nudge_tempo.update(dt);
        self.clock
            .set_master_bpm(self.project.bpm() + self.nudge_tempo.strength() * 10.0);

        self.update_clock_setup();
        self.update_track_setups();
        self.update_play_state(false);

        self.cv_input.update();
        self.routing_engine.update(&mut self.project, &self.cv_input);

        let mut wrote_outputs = false;
        while let Some(tick) = self.clock.check_tick() {
            self.tick = tick;
            self.update_play_state(true);
            self.tick_track_engines(tick);
            self.update_track_outputs();
            wrote_outputs = true;
        }
        if !wrote_outputs {
            self.update_track_outputs();
        }

        for index in 0..TRACK_COUNT {
            if let Some(engine) = self.track_engines[index].as_mut() {
                engine.update(dt, self.project.track(index));
            }
        }

        self.update_overrides();
        self.cv_output.update();
    }

    // --- locking ---

    /// Stop the transport and park the engine so another subsystem may
    /// mutate shared state. Busy-waits driving `update` (simulator
    /// semantics; on device the caller shares the engine thread).
    pub fn lock(&mut self) {
        while !self.is_locked() {
            self.request_lock.store(true, Ordering::Relaxed);
            self.update();
        }
    }

    pub fn unlock(&mut self) {
        while self.is_locked() {
            self.request_unlock.store(true, Ordering::Relaxed);
            self.update();
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    // --- transport ---

    pub fn clock_start(&mut self) {
        self.clock.master_start();
    }

    pub fn clock_stop(&mut self) {
        self.clock.master_stop();
    }

    pub fn clock_continue(&mut self) {
        self.clock.master_continue();
    }

    pub fn clock_reset(&mut self) {
        self.clock.master_reset();
    }

    // --- tempo ---

    pub fn tap_tempo_reset(&mut self) {
        self.tap_tempo.reset(self.project.bpm());
    }

    pub fn tap_tempo_tap(&mut self) {
        self.tap_tempo.tap(self.time.now_us());
        self.project.set_bpm(self.tap_tempo.bpm());
    }

    pub fn nudge_tempo_set_direction(&mut self, direction: i32) {
        self.nudge_tempo.set_direction(direction);
    }

    pub fn nudge_tempo_strength(&self) -> f32 {
        self.nudge_tempo.strength()
    }

    /// Position within the current sync measure, 0..1.
    pub fn sync_measure_fraction(&self) -> f32 {
        let divisor = self.measure_divisor();
        (self.tick % divisor) as f32 / divisor as f32
    }

    // --- MIDI ---

    /// Queue a message for transmission. False when the port buffer is
    /// full; callers may retry on their own schedule.
    pub fn send_midi(&mut self, port: MidiPort, message: MidiMessage) -> bool {
        match port {
            MidiPort::Din => self.midi.send(message),
            MidiPort::UsbMidi => self.usb_midi.send(message),
        }
    }

    pub fn set_midi_receive_handler(&mut self, handler: MidiReceiveHandler) {
        self.midi_receive_handler = Some(handler);
    }

    pub fn set_usb_midi_connect_handler(&mut self, handler: Box<dyn FnMut(u16, u16) + Send>) {
        self.usb_midi.set_connect_handler(handler);
    }

    pub fn set_usb_midi_disconnect_handler(&mut self, handler: Box<dyn FnMut() + Send>) {
        self.usb_midi.set_disconnect_handler(handler);
    }

    // --- messages ---

    pub fn show_message(&mut self, text: &str, duration_ms: u32) {
        if let Some(handler) = &mut self.message_handler {
            handler(text, duration_ms);
        }
    }

    pub fn set_message_handler(&mut self, handler: MessageHandler) {
        self.message_handler = Some(handler);
    }

    // --- overrides ---

    pub fn set_gate_output_override(&mut self, enabled: bool) {
        self.gate_output_override = enabled;
    }

    pub fn set_gate_output_override_value(&mut self, gates: u8) {
        self.gate_output_override_value = gates;
    }

    pub fn set_cv_output_override(&mut self, enabled: bool) {
        self.cv_output_override = enabled;
    }

    pub fn set_cv_output_override_value(&mut self, channel: usize, volts: f32) {
        if channel < CV_OUTPUT_COUNT {
            self.cv_output_override_values[channel] = volts;
        }
    }

    // --- accessors ---

    pub fn project(&self) -> &Project {
        &self.project
    }

    /// Mutable project access. Non-atomic mutations belong under the
    /// engine lock.
    pub fn project_mut(&mut self) -> &mut Project {
        &mut self.project
    }

    pub fn track_engine(&self, index: usize) -> Option<&TrackEngine> {
        self.track_engines.get(index).and_then(|slot| slot.as_ref())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn midi_learn(&self) -> &MidiLearn {
        &self.midi_learn
    }

    pub fn midi_learn_mut(&mut self) -> &mut MidiLearn {
        &mut self.midi_learn
    }

    pub fn time_mut(&mut self) -> &mut SystemTicks {
        &mut self.time
    }

    pub fn dio_mut(&mut self) -> &mut Dio {
        &mut self.dio
    }

    pub fn midi_mut(&mut self) -> &mut Midi {
        &mut self.midi
    }

    pub fn usb_midi_mut(&mut self) -> &mut UsbMidi {
        &mut self.usb_midi
    }

    pub fn cv_input_mut(&mut self) -> &mut CvInput {
        &mut self.cv_input
    }

    pub fn gate_output(&self) -> &GateOutput {
        &self.gate_output
    }

    pub fn cv_output(&self) -> &CvOutput {
        &self.cv_output
    }

    // --- internals ---

    fn measure_divisor(&self) -> u32 {
        self.project.sync_measure() * PPQN * 4
    }

    /// Install the interrupt-side callbacks: DIO edge handlers and the
    /// byte-level MIDI clock filters.
    fn init_clock(&mut self) {
        // External clock pulse input.
        let handle = self.clock.handle();
        let reset_level = self.dio.reset_input.level();
        let input_mode = self.clock_input_mode.clone();
        self.dio.clock_input.set_handler(Box::new(move |value| {
            // interrupt context
            // First pulse starts the clock when reset is not held.
            if input_mode.load(Ordering::Relaxed) == INPUT_MODE_RESET
                && !handle.is_running()
                && !reset_level.get()
            {
                handle.slave_start(ClockSource::External);
            }
            if value {
                handle.slave_tick(ClockSource::External);
            }
        }));

        // Reset / run input.
        let handle = self.clock.handle();
        let input_mode = self.clock_input_mode.clone();
        self.dio.reset_input.set_handler(Box::new(move |value| {
            // interrupt context
            match input_mode.load(Ordering::Relaxed) {
                INPUT_MODE_RESET => {
                    if value {
                        handle.slave_reset(ClockSource::External);
                    } else {
                        handle.slave_start(ClockSource::External);
                    }
                }
                INPUT_MODE_RUN => {
                    if value {
                        handle.slave_continue(ClockSource::External);
                    } else {
                        handle.slave_stop(ClockSource::External);
                    }
                }
                INPUT_MODE_START_STOP => {
                    if value {
                        handle.slave_start(ClockSource::External);
                    } else {
                        handle.slave_stop(ClockSource::External);
                        handle.slave_reset(ClockSource::External);
                    }
                }
                _ => {}
            }
        }));

        // Real-time clock bytes bypass framing and go to the clock.
        let handle = self.clock.handle();
        self.midi.set_recv_filter(Box::new(move |data| {
            if is_clock_status(data) {
                handle.slave_handle_midi(ClockSource::Midi, data);
                true
            } else {
                false
            }
        }));

        let handle = self.clock.handle();
        self.usb_midi.set_recv_filter(Box::new(move |data| {
            if is_clock_status(data) {
                handle.slave_handle_midi(ClockSource::UsbMidi, data);
                true
            } else {
                false
            }
        }));
    }

    /// Consume a dirty clock setup: reconfigure mode, slaves and outputs,
    /// and align the run state with the physical reset input.
    fn update_clock_setup(&mut self) {
        if !self.project.clock_setup().is_dirty() {
            return;
        }
        let setup = self.project.clock_setup().clone();

        self.clock.set_mode(setup.mode());
        self.clock
            .slave_configure(ClockSource::External, setup.clock_input_divisor(), true);
        self.clock
            .slave_configure(ClockSource::Midi, PPQN / MIDI_CLOCK_PPQN, setup.midi_rx());
        self.clock
            .slave_configure(ClockSource::UsbMidi, PPQN / MIDI_CLOCK_PPQN, setup.usb_rx());

        self.clock_input_mode
            .store(input_mode_code(setup.clock_input_mode()), Ordering::Relaxed);

        let handle = self.clock.handle();
        let reset_input = self.dio.reset_input.get();
        let running = self.clock.is_running();
        match setup.clock_input_mode() {
            ClockInputMode::Reset => {
                if reset_input && running {
                    handle.slave_reset(ClockSource::External);
                } else if !reset_input && !running {
                    handle.slave_start(ClockSource::External);
                }
            }
            ClockInputMode::Run => {
                if reset_input && !running {
                    handle.slave_continue(ClockSource::External);
                } else if !reset_input && running {
                    handle.slave_stop(ClockSource::External);
                }
            }
            ClockInputMode::StartStop => {
                if reset_input && !running {
                    handle.slave_start(ClockSource::External);
                } else if !reset_input && running {
                    handle.slave_reset(ClockSource::External);
                }
            }
        }

        self.clock
            .output_configure(setup.clock_output_divisor(), setup.clock_output_pulse());
        apply_clock_output(&mut self.dio, &setup, self.clock.output_state());

        self.project.clock_setup_mut().clear_dirty();
    }

    /// Rebuild track engines whose mode changed; re-apply swing.
    fn update_track_setups(&mut self) {
        for index in 0..TRACK_COUNT {
            let mode = self.project.track(index).mode();
            let needs_create = self.track_engines[index]
                .as_ref()
                .is_none_or(|engine| engine.track_mode() != mode);
            if needs_create {
                let mut engine = TrackEngine::new(mode);
                let state = *self.project.play_state().track_state(index);
                engine.set_mute(state.mute());
                engine.set_fill(state.fill());
                engine.set_pattern(state.pattern());
                self.track_engines[index] = Some(engine);
            }
            if let Some(engine) = self.track_engines[index].as_mut() {
                engine.set_swing(self.project.swing());
            }
        }
    }

    fn update_track_sequences(&mut self) {
        for index in 0..TRACK_COUNT {
            let pattern = self.project.play_state().track_state(index).pattern();
            if let Some(engine) = self.track_engines[index].as_mut() {
                engine.set_pattern(pattern);
            }
        }
    }

    fn reset_track_engines(&mut self) {
        for engine in self.track_engines.iter_mut().flatten() {
            engine.reset();
        }
    }

    fn tick_track_engines(&mut self, tick: u32) {
        for index in 0..TRACK_COUNT {
            let (before, rest) = self.track_engines.split_at_mut(index);
            let Some(engine) = rest[0].as_mut() else {
                continue;
            };
            let track = self.project.track(index);
            // Links resolve per-use and only downward, so a re-created
            // peer can never dangle and the link graph stays acyclic.
            let linked = track
                .link_track()
                .filter(|&peer| peer < index)
                .and_then(|peer| before[peer].as_ref());
            engine.tick(tick, track, linked);
        }
    }

    /// Commit pending mute/pattern/song requests against the current tick
    /// position. `ticked` is true only on iterations driven by a clock
    /// tick.
    fn update_play_state(&mut self, ticked: bool) {
        let measure_divisor = self.measure_divisor();
        let tick = self.tick;

        let play_state = self.project.play_state();
        let has_immediate = play_state.has_immediate_requests();
        let has_synced = play_state.has_synced_requests();
        let handle_latched = play_state.execute_latched_requests();
        let has_requests = has_immediate || has_synced || handle_latched;

        // The divisor-1 case honors requests arriving one tick early, so
        // the change lands on the downbeat.
        let handle_synced = tick % measure_divisor == 0
            || tick % measure_divisor == measure_divisor - 1;
        let mut switch_to_next_slot =
            ticked && tick % measure_divisor == measure_divisor - 1;

        let mut changed_patterns = false;

        // mute & pattern requests
        if has_requests {
            let mute_requests = TrackState::IMMEDIATE_MUTE_REQUEST
                | if handle_synced { TrackState::SYNCED_MUTE_REQUEST } else { 0 }
                | if handle_latched { TrackState::LATCHED_MUTE_REQUEST } else { 0 };
            let pattern_requests = TrackState::IMMEDIATE_PATTERN_REQUEST
                | if handle_synced { TrackState::SYNCED_PATTERN_REQUEST } else { 0 }
                | if handle_latched { TrackState::LATCHED_PATTERN_REQUEST } else { 0 };

            let play_state = self.project.play_state_mut();
            for index in 0..TRACK_COUNT {
                let state = play_state.track_state_mut(index);
                if state.has_requests(mute_requests) {
                    let mute = state.requested_mute();
                    state.set_mute(mute);
                }
                if state.has_requests(pattern_requests) {
                    let pattern = state.requested_pattern();
                    state.set_pattern(pattern);
                    changed_patterns = true;
                }
                state.clear_requests(mute_requests | pattern_requests);
            }
        }

        // song requests
        if has_requests {
            let play_requests = SongState::IMMEDIATE_PLAY_REQUEST
                | if handle_synced { SongState::SYNCED_PLAY_REQUEST } else { 0 }
                | if handle_latched { SongState::LATCHED_PLAY_REQUEST } else { 0 };
            let stop_requests = SongState::IMMEDIATE_STOP_REQUEST
                | if handle_synced { SongState::SYNCED_STOP_REQUEST } else { 0 }
                | if handle_latched { SongState::LATCHED_STOP_REQUEST } else { 0 };

            if self.project.play_state().song_state().has_requests(play_requests) {
                let requested = self.project.play_state().song_state().requested_slot();
                let slot = requested.and_then(|index| {
                    self.project.song().slot(index).copied().map(|slot| (index, slot))
                });
                // Out-of-range slots are dropped silently.
                if let Some((slot_index, slot)) = slot {
                    let play_state = self.project.play_state_mut();
                    for index in 0..TRACK_COUNT {
                        play_state.track_state_mut(index).set_pattern(slot.pattern(index));
                    }
                    let song_state = play_state.song_state_mut();
                    song_state.set_current_slot(slot_index);
                    song_state.set_current_repeat(0);
                    song_state.set_playing(true);
                    switch_to_next_slot = false;
                }
            }

            let song_state = self.project.play_state_mut().song_state_mut();
            if changed_patterns || song_state.has_requests(stop_requests) {
                song_state.set_playing(false);
            }
            song_state.clear_requests(play_requests | stop_requests);
        }

        // clear pending requests
        if has_requests {
            let play_state = self.project.play_state_mut();
            play_state.clear_immediate_requests();
            if handle_synced {
                play_state.clear_synced_requests();
            }
            if handle_latched {
                play_state.clear_latched_requests();
            }
        }

        // song slot advance
        if self.project.play_state().song_state().playing() && switch_to_next_slot {
            let song_state = *self.project.play_state().song_state();
            let slot_count = self.project.song().slot_count();
            if let Some(slot) = self.project.song().slot(song_state.current_slot()).copied() {
                let (next_slot, next_repeat) =
                    if song_state.current_repeat() + 1 < slot.repeats() {
                        (song_state.current_slot(), song_state.current_repeat() + 1)
                    } else if song_state.current_slot() + 1 < slot_count {
                        (song_state.current_slot() + 1, 0)
                    } else {
                        (0, 0)
                    };

                let next = self.project.song().slot(next_slot).copied();
                let play_state = self.project.play_state_mut();
                play_state.song_state_mut().set_current_slot(next_slot);
                play_state.song_state_mut().set_current_repeat(next_repeat);
                if let Some(next) = next {
                    for index in 0..TRACK_COUNT {
                        play_state.track_state_mut(index).set_pattern(next.pattern(index));
                    }
                }
                self.reset_track_engines();
            }
        }

        // push committed state into the track engines
        if has_requests || switch_to_next_slot {
            for index in 0..TRACK_COUNT {
                let state = *self.project.play_state().track_state(index);
                if let Some(engine) = self.track_engines[index].as_mut() {
                    engine.set_mute(state.mute());
                    engine.set_fill(state.fill());
                    engine.set_pattern(state.pattern());
                }
            }
        }
    }

    /// Dispatch engine outputs to the physical gates and CV channels.
    ///
    /// Source engines referenced by several physical outputs hand out
    /// their sub-outputs in ascending physical order through per-source
    /// cursors.
    fn update_track_outputs(&mut self) {
        let is_idle = self.clock.is_idle();
        let selected = self.project.selected_track_index();
        // Only the selected track may preview through idle outputs.
        for (index, slot) in self.track_engines.iter_mut().enumerate() {
            if index != selected {
                if let Some(engine) = slot.as_mut() {
                    engine.clear_idle_output();
                }
            }
        }

        let gate_map = *self.project.gate_output_tracks();
        let cv_map = *self.project.cv_output_tracks();
        let mut gate_cursor = [0usize; TRACK_COUNT];
        let mut cv_cursor = [0usize; TRACK_COUNT];

        if !self.gate_output_override {
            for output in 0..GATE_OUTPUT_COUNT {
                let source = gate_map[output];
                let Some(engine) = self.track_engines[source].as_ref() else {
                    continue;
                };
                let sub = gate_cursor[source];
                gate_cursor[source] += 1;
                let value = if is_idle && engine.idle_output() {
                    engine.idle_gate_output(sub)
                } else {
                    engine.gate_output(sub)
                };
                self.gate_output.set_gate(output, value);
            }
        }

        if !self.cv_output_override {
            for output in 0..CV_OUTPUT_COUNT {
                let source = cv_map[output];
                let Some(engine) = self.track_engines[source].as_ref() else {
                    continue;
                };
                let sub = cv_cursor[source];
                cv_cursor[source] += 1;
                let value = if is_idle && engine.idle_output() {
                    engine.idle_cv_output(sub)
                } else {
                    engine.cv_output(sub)
                };
                self.cv_output.set_channel(output, value);
            }
        }
    }

    fn update_overrides(&mut self) {
        if self.gate_output_override {
            self.gate_output.set_gates(self.gate_output_override_value);
        }
        if self.cv_output_override {
            for (channel, volts) in self.cv_output_override_values.iter().enumerate() {
                self.cv_output.set_channel(channel, *volts);
            }
        }
    }

    fn receive_midi_all(&mut self) {
        while let Some(message) = self.midi.recv() {
            self.receive_midi_message(MidiPort::Din, message);
        }
        while let Some(message) = self.usb_midi.recv() {
            self.receive_midi_message(MidiPort::UsbMidi, message);
        }
    }

    fn receive_midi_message(&mut self, port: MidiPort, message: MidiMessage) {
        self.midi_learn.receive_midi(port, &message);
        self.routing_engine
            .receive_midi(port, &message, self.project.routing());

        if let Some(handler) = &mut self.midi_receive_handler {
            handler(port, &message);
        }

        let channel = message.channel();
        for index in 0..TRACK_COUNT {
            if let Some(engine) = self.track_engines[index].as_mut() {
                engine.receive_midi(port, channel, &message, self.project.track(index));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tactus_model::TrackMode;

    fn engine() -> Engine {
        let mut engine = Engine::new(Project::default());
        engine.init();
        engine
    }

    #[test]
    fn init_creates_engines_for_every_track() {
        let engine = engine();
        for index in 0..TRACK_COUNT {
            assert!(engine.track_engine(index).is_some());
        }
    }

    #[test]
    fn mode_change_rebuilds_the_engine_in_place() {
        let mut engine = engine();
        assert_eq!(engine.track_engine(3).unwrap().track_mode(), TrackMode::Note);
        engine.project_mut().track_mut(3).set_mode(TrackMode::Curve);
        engine.time_mut().advance_us(1000);
        engine.update();
        assert_eq!(engine.track_engine(3).unwrap().track_mode(), TrackMode::Curve);
    }

    #[test]
    fn sync_measure_fraction_wraps_per_measure() {
        let mut engine = engine();
        assert_eq!(engine.sync_measure_fraction(), 0.0);
        engine.tick = 384; // half of a 768-tick measure
        assert_eq!(engine.sync_measure_fraction(), 0.5);
        engine.tick = 768;
        assert_eq!(engine.sync_measure_fraction(), 0.0);
    }

    #[test]
    fn show_message_reaches_handler() {
        let mut engine = engine();
        let seen = std::sync::Arc::new(std::sync::Mutex::new(None));
        let sink = seen.clone();
        engine.set_message_handler(Box::new(move |text, duration| {
            *sink.lock().unwrap() = Some((text.to_string(), duration));
        }));
        engine.show_message("saved", 1000);
        assert_eq!(*seen.lock().unwrap(), Some(("saved".to_string(), 1000)));
    }

    #[test]
    fn send_midi_routes_to_the_right_port() {
        let mut engine = engine();
        assert!(engine.send_midi(MidiPort::Din, MidiMessage::Start));
        assert_eq!(engine.midi_mut().pop_sent(), Some(MidiMessage::Start));
        assert!(engine.send_midi(MidiPort::UsbMidi, MidiMessage::Stop));
        assert_eq!(engine.usb_midi_mut().pop_sent(), Some(MidiMessage::Stop));
    }
}
