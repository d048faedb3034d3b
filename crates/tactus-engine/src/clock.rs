//! Musical master/slave clock.
//!
//! One arbiter decides who generates ticks: the internal master (an
//! integer phase accumulator fed from the BPM) or one of the slave
//! sources (external pulse input, DIN MIDI, USB MIDI). Slave intake is
//! callable from interrupt context through a [`ClockHandle`]; commands
//! travel over a bounded channel and are applied when the engine next
//! advances the clock. Ticks and transport events queue separately and
//! are drained non-blockingly per engine update.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};
use log::debug;
use tactus_model::config::{MIDI_CLOCK_PPQN, PPQN};
use tactus_model::{ClockMode, STATUS_CONTINUE, STATUS_START, STATUS_STOP, STATUS_TIMING_CLOCK};

/// Transport events, drained by the engine in arrival order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockEvent {
    Start,
    Stop,
    Continue,
    Reset,
}

/// The closed set of slave sources.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockSource {
    External,
    Midi,
    UsbMidi,
}

impl ClockSource {
    const COUNT: usize = 3;

    fn index(self) -> usize {
        match self {
            ClockSource::External => 0,
            ClockSource::Midi => 1,
            ClockSource::UsbMidi => 2,
        }
    }
}

/// State of the physical clock outputs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OutputState {
    pub clock: bool,
    pub reset: bool,
    pub run: bool,
}

/// Receives clock output transitions and outgoing MIDI clock bytes.
/// The engine implements this with a short-lived sink over its hardware.
pub trait ClockListener {
    fn on_clock_output(&mut self, state: OutputState);
    fn on_clock_midi(&mut self, data: u8);
}

#[derive(Clone, Copy, Debug)]
enum SlaveAction {
    Start,
    Stop,
    Continue,
    Reset,
    Tick,
}

#[derive(Clone, Copy, Debug)]
struct SlaveCommand {
    source: ClockSource,
    action: SlaveAction,
}

#[derive(Clone, Copy, Debug)]
struct SlaveConfig {
    /// Ticks emitted per accepted source pulse
    divisor: u32,
    enabled: bool,
}

/// Run state visible from interrupt context without locking.
#[derive(Debug, Default)]
struct Shared {
    running: AtomicBool,
    /// A start/continue command is queued but not yet applied. Keeps edge
    /// handlers from re-issuing starts between engine updates.
    start_pending: AtomicBool,
}

/// Cloneable slave-intake handle, safe to capture in interrupt handlers.
#[derive(Clone)]
pub struct ClockHandle {
    tx: Sender<SlaveCommand>,
    shared: Arc<Shared>,
}

impl ClockHandle {
    fn send(&self, source: ClockSource, action: SlaveAction) {
        // Overflow drops the command; the clock free-wheels through it.
        let _ = self.tx.try_send(SlaveCommand { source, action });
    }

    pub fn slave_start(&self, source: ClockSource) {
        self.shared.start_pending.store(true, Ordering::Relaxed);
        self.send(source, SlaveAction::Start);
    }

    pub fn slave_stop(&self, source: ClockSource) {
        self.send(source, SlaveAction::Stop);
    }

    pub fn slave_continue(&self, source: ClockSource) {
        self.shared.start_pending.store(true, Ordering::Relaxed);
        self.send(source, SlaveAction::Continue);
    }

    pub fn slave_reset(&self, source: ClockSource) {
        self.send(source, SlaveAction::Reset);
    }

    pub fn slave_tick(&self, source: ClockSource) {
        self.send(source, SlaveAction::Tick);
    }

    /// Route a raw MIDI real-time byte; anything else is ignored.
    pub fn slave_handle_midi(&self, source: ClockSource, data: u8) {
        match data {
            STATUS_TIMING_CLOCK => self.slave_tick(source),
            STATUS_START => self.slave_start(source),
            STATUS_CONTINUE => self.slave_continue(source),
            STATUS_STOP => self.slave_stop(source),
            _ => {}
        }
    }

    /// Run state as seen from interrupt context, including a queued start.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Relaxed)
            || self.shared.start_pending.load(Ordering::Relaxed)
    }
}

/// Accumulator unit for one tick: microseconds per minute, times the
/// milli-tick scale of `tpm_milli`.
const TICK_UNIT: u64 = 60_000_000 * 1000;

/// How long after the last tick the clock still counts as busy.
const IDLE_TIMEOUT_US: u64 = 500_000;

const INTAKE_CAPACITY: usize = 256;

/// The master/slave musical clock.
pub struct Clock {
    mode: ClockMode,
    running: bool,
    tick: u32,
    // master generator
    tpm_milli: u64,
    master_acc: u64,
    // slave arbitration
    slaves: [SlaveConfig; ClockSource::COUNT],
    active_source: Option<ClockSource>,
    // interrupt intake
    intake_tx: Sender<SlaveCommand>,
    intake_rx: Receiver<SlaveCommand>,
    shared: Arc<Shared>,
    // queues to the engine
    events: VecDeque<ClockEvent>,
    ticks: VecDeque<u32>,
    // physical outputs
    output_divisor: u32,
    output_pulse: u32,
    output_state: OutputState,
    output_clock_until: Option<u32>,
    output_dirty: bool,
    pending_midi: VecDeque<u8>,
    idle_remaining_us: u64,
}

impl Clock {
    pub fn new() -> Self {
        let (intake_tx, intake_rx) = bounded(INTAKE_CAPACITY);
        let mut clock = Self {
            mode: ClockMode::Auto,
            running: false,
            tick: 0,
            tpm_milli: 0,
            master_acc: 0,
            slaves: [SlaveConfig { divisor: PPQN / MIDI_CLOCK_PPQN, enabled: false };
                ClockSource::COUNT],
            active_source: None,
            intake_tx,
            intake_rx,
            shared: Arc::new(Shared::default()),
            events: VecDeque::new(),
            ticks: VecDeque::new(),
            output_divisor: PPQN / MIDI_CLOCK_PPQN,
            output_pulse: 1,
            output_state: OutputState::default(),
            output_clock_until: None,
            output_dirty: false,
            pending_midi: VecDeque::new(),
            idle_remaining_us: 0,
        };
        clock.set_master_bpm(120.0);
        clock
    }

    /// Intake handle for interrupt-context callers.
    pub fn handle(&self) -> ClockHandle {
        ClockHandle {
            tx: self.intake_tx.clone(),
            shared: self.shared.clone(),
        }
    }

    pub fn set_mode(&mut self, mode: ClockMode) {
        if self.mode != mode {
            self.mode = mode;
            if mode == ClockMode::Master {
                self.active_source = None;
            }
        }
    }

    pub fn mode(&self) -> ClockMode {
        self.mode
    }

    /// Configure a slave source. `divisor` is the number of ticks one
    /// source pulse expands to.
    pub fn slave_configure(&mut self, source: ClockSource, divisor: u32, enabled: bool) {
        self.slaves[source.index()] = SlaveConfig { divisor: divisor.max(1), enabled };
    }

    pub fn output_configure(&mut self, divisor: u32, pulse_width_ticks: u32) {
        self.output_divisor = divisor.max(1);
        self.output_pulse = pulse_width_ticks.max(1);
    }

    pub fn output_state(&self) -> OutputState {
        self.output_state
    }

    // --- master transport controls ---
    // Rejected in slave mode; in auto mode they take the arbiter back
    // from a claimed slave source.

    pub fn master_start(&mut self) {
        if self.mode == ClockMode::Slave {
            return;
        }
        self.active_source = None;
        self.transport_start();
    }

    pub fn master_stop(&mut self) {
        if self.mode == ClockMode::Slave {
            return;
        }
        self.active_source = None;
        if self.running {
            self.transport_stop();
        }
    }

    pub fn master_continue(&mut self) {
        if self.mode == ClockMode::Slave {
            return;
        }
        self.active_source = None;
        if !self.running {
            self.transport_continue();
        }
    }

    pub fn master_reset(&mut self) {
        if self.mode == ClockMode::Slave {
            return;
        }
        self.active_source = None;
        self.transport_reset();
    }

    /// Master tempo. The remainder of the phase accumulator is carried
    /// across changes, so a mid-run tempo change neither drops nor
    /// duplicates ticks.
    pub fn set_master_bpm(&mut self, bpm: f32) {
        let bpm = bpm.max(0.0) as f64;
        self.tpm_milli = (bpm * PPQN as f64 * 1000.0).round() as u64;
    }

    // --- queries ---

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Not running and no tick seen for a while.
    pub fn is_idle(&self) -> bool {
        !self.running && self.idle_remaining_us == 0
    }

    pub fn check_event(&mut self) -> Option<ClockEvent> {
        self.events.pop_front()
    }

    pub fn check_tick(&mut self) -> Option<u32> {
        self.ticks.pop_front()
    }

    /// Integrate elapsed time: apply queued slave commands, run the master
    /// generator, and emit output/MIDI transitions to the listener.
    pub fn advance(&mut self, elapsed_us: u64, listener: &mut dyn ClockListener) {
        self.process_intake(listener);

        let master_driven = self.active_source.is_none() && self.mode != ClockMode::Slave;
        if self.running && master_driven {
            self.master_acc += elapsed_us * self.tpm_milli;
            while self.master_acc >= TICK_UNIT {
                self.master_acc -= TICK_UNIT;
                self.emit_tick(listener);
            }
        }

        self.idle_remaining_us = self.idle_remaining_us.saturating_sub(elapsed_us);
        self.flush_outputs(listener);
    }

    // --- internals ---

    fn process_intake(&mut self, listener: &mut dyn ClockListener) {
        while let Ok(command) = self.intake_rx.try_recv() {
            self.apply_slave(command, listener);
        }
    }

    fn apply_slave(&mut self, command: SlaveCommand, listener: &mut dyn ClockListener) {
        let config = self.slaves[command.source.index()];
        if !config.enabled || self.mode == ClockMode::Master {
            return;
        }
        // A claimed arbiter suppresses every other source until reset.
        if let Some(active) = self.active_source {
            if active != command.source {
                return;
            }
        } else {
            // The master generator keeps the arbiter while it is running.
            if self.running {
                return;
            }
        }

        match command.action {
            SlaveAction::Start => {
                debug!(target: "clock", "slave start {:?}", command.source);
                self.active_source = Some(command.source);
                self.transport_start();
            }
            SlaveAction::Continue => {
                self.active_source = Some(command.source);
                self.transport_continue();
            }
            SlaveAction::Stop => {
                if self.active_source == Some(command.source) && self.running {
                    self.transport_stop();
                }
            }
            SlaveAction::Reset => {
                if self.active_source == Some(command.source) {
                    debug!(target: "clock", "slave reset {:?}", command.source);
                    self.transport_reset();
                    self.active_source = None;
                }
            }
            SlaveAction::Tick => {
                if self.active_source.is_none() {
                    // First pulse after reset/stop wins the arbiter.
                    self.active_source = Some(command.source);
                }
                if self.running {
                    for _ in 0..config.divisor {
                        self.emit_tick(listener);
                    }
                }
            }
        }
    }

    fn transport_start(&mut self) {
        self.tick = 0;
        self.master_acc = 0;
        self.running = true;
        self.events.push_back(ClockEvent::Start);
        self.output_state.run = true;
        self.output_state.reset = false;
        self.output_dirty = true;
        self.pending_midi.push_back(STATUS_START);
        self.sync_shared();
    }

    fn transport_continue(&mut self) {
        self.running = true;
        self.events.push_back(ClockEvent::Continue);
        self.output_state.run = true;
        self.output_state.reset = false;
        self.output_dirty = true;
        self.pending_midi.push_back(STATUS_CONTINUE);
        self.sync_shared();
    }

    fn transport_stop(&mut self) {
        self.running = false;
        self.events.push_back(ClockEvent::Stop);
        self.output_state.run = false;
        self.output_dirty = true;
        self.pending_midi.push_back(STATUS_STOP);
        self.sync_shared();
    }

    fn transport_reset(&mut self) {
        let was_running = self.running;
        self.running = false;
        self.tick = 0;
        self.master_acc = 0;
        self.events.push_back(ClockEvent::Reset);
        self.output_state.run = false;
        self.output_state.reset = true;
        self.output_dirty = true;
        if was_running {
            self.pending_midi.push_back(STATUS_STOP);
        }
        self.sync_shared();
    }

    fn sync_shared(&self) {
        self.shared.running.store(self.running, Ordering::Relaxed);
        self.shared.start_pending.store(false, Ordering::Relaxed);
    }

    fn emit_tick(&mut self, listener: &mut dyn ClockListener) {
        let tick = self.tick;
        self.ticks.push_back(tick);

        if let Some(until) = self.output_clock_until {
            if tick >= until {
                self.output_state.clock = false;
                self.output_clock_until = None;
                self.output_dirty = true;
            }
        }
        if tick % self.output_divisor == 0 {
            self.output_state.clock = true;
            self.output_clock_until = Some(tick + self.output_pulse);
            self.output_dirty = true;
        }
        if tick % (PPQN / MIDI_CLOCK_PPQN) == 0 {
            self.pending_midi.push_back(STATUS_TIMING_CLOCK);
        }

        self.tick = tick + 1;
        self.idle_remaining_us = IDLE_TIMEOUT_US;
        self.flush_outputs(listener);
    }

    fn flush_outputs(&mut self, listener: &mut dyn ClockListener) {
        if self.output_dirty {
            self.output_dirty = false;
            listener.on_clock_output(self.output_state);
        }
        while let Some(byte) = self.pending_midi.pop_front() {
            listener.on_clock_midi(byte);
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
