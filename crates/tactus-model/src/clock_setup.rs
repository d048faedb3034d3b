//! Clock configuration consumed by the engine.
//!
//! Setters mark the setup dirty; the engine reconfigures the clock on its
//! next update and clears the flag.

use crate::config::{MIDI_CLOCK_PPQN, PPQN};

/// Master/slave behavior of the musical clock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClockMode {
    /// First active slave source wins; master generator otherwise
    #[default]
    Auto,
    /// Internal generator only, slave sources observed but ignored
    Master,
    /// External sources only, master transport controls rejected
    Slave,
}

/// How the physical reset/run input is interpreted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClockInputMode {
    /// High resets, low (re)starts
    #[default]
    Reset,
    /// High continues, low stops
    Run,
    /// High starts, low stops and resets
    StartStop,
}

/// What the physical reset output carries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClockOutputMode {
    /// Reset flag of the clock
    #[default]
    Reset,
    /// Run flag of the clock
    Run,
    /// Leave the output unchanged
    Last,
}

/// Clock source and output configuration.
#[derive(Clone, Debug)]
pub struct ClockSetup {
    mode: ClockMode,
    clock_input_mode: ClockInputMode,
    clock_output_mode: ClockOutputMode,
    /// Ticks emitted per external input pulse
    clock_input_divisor: u32,
    /// Ticks between output pulses
    clock_output_divisor: u32,
    /// Output pulse width in ticks
    clock_output_pulse: u32,
    midi_rx: bool,
    midi_tx: bool,
    usb_rx: bool,
    usb_tx: bool,
    dirty: bool,
}

impl Default for ClockSetup {
    fn default() -> Self {
        Self {
            mode: ClockMode::Auto,
            clock_input_mode: ClockInputMode::Reset,
            clock_output_mode: ClockOutputMode::Reset,
            clock_input_divisor: PPQN / MIDI_CLOCK_PPQN,
            clock_output_divisor: PPQN / MIDI_CLOCK_PPQN,
            clock_output_pulse: 1,
            midi_rx: true,
            midi_tx: true,
            usb_rx: true,
            usb_tx: true,
            dirty: true,
        }
    }
}

macro_rules! setup_field {
    ($field:ident, $setter:ident, $ty:ty) => {
        pub fn $field(&self) -> $ty {
            self.$field
        }

        pub fn $setter(&mut self, value: $ty) {
            if self.$field != value {
                self.$field = value;
                self.dirty = true;
            }
        }
    };
}

impl ClockSetup {
    setup_field!(mode, set_mode, ClockMode);
    setup_field!(clock_input_mode, set_clock_input_mode, ClockInputMode);
    setup_field!(clock_output_mode, set_clock_output_mode, ClockOutputMode);
    setup_field!(clock_input_divisor, set_clock_input_divisor, u32);
    setup_field!(clock_output_divisor, set_clock_output_divisor, u32);
    setup_field!(clock_output_pulse, set_clock_output_pulse, u32);
    setup_field!(midi_rx, set_midi_rx, bool);
    setup_field!(midi_tx, set_midi_tx, bool);
    setup_field!(usb_rx, set_usb_rx, bool);
    setup_field!(usb_tx, set_usb_tx, bool);

    /// True while the engine has not yet consumed a configuration change.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}
