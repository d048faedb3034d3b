//! Digital I/O pins with interrupt-style edge handlers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Callback fired on every input edge with the new pin level.
///
/// Runs in interrupt context on device: it must only enqueue into SPSC
/// queues or touch atomics.
pub type EdgeHandler = Box<dyn FnMut(bool) + Send>;

/// Cloneable read-only view of an input pin's level, safe to capture in
/// another pin's edge handler.
#[derive(Clone, Debug)]
pub struct InputLevel(Arc<AtomicBool>);

impl InputLevel {
    pub fn get(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A digital input pin.
#[derive(Default)]
pub struct DigitalInput {
    level: Arc<AtomicBool>,
    handler: Option<EdgeHandler>,
}

impl DigitalInput {
    pub fn set_handler(&mut self, handler: EdgeHandler) {
        self.handler = Some(handler);
    }

    pub fn get(&self) -> bool {
        self.level.load(Ordering::Relaxed)
    }

    /// Level handle for cross-handler reads.
    pub fn level(&self) -> InputLevel {
        InputLevel(self.level.clone())
    }

    /// Drive the pin. A level change fires the edge handler, standing in
    /// for the pin-change interrupt.
    pub fn set(&mut self, value: bool) {
        if self.level.swap(value, Ordering::Relaxed) != value {
            if let Some(handler) = &mut self.handler {
                handler(value);
            }
        }
    }
}

/// A digital output pin latching the last written level.
#[derive(Debug, Default)]
pub struct DigitalOutput {
    level: bool,
}

impl DigitalOutput {
    pub fn set(&mut self, value: bool) {
        self.level = value;
    }

    pub fn get(&self) -> bool {
        self.level
    }
}

/// The sequencer's digital I/O block.
#[derive(Default)]
pub struct Dio {
    pub clock_input: DigitalInput,
    pub reset_input: DigitalInput,
    pub clock_output: DigitalOutput,
    pub reset_output: DigitalOutput,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn handler_fires_on_edges_only() {
        let edges = Arc::new(AtomicU32::new(0));
        let counter = edges.clone();
        let mut input = DigitalInput::default();
        input.set_handler(Box::new(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        }));

        input.set(true);
        input.set(true); // no edge
        input.set(false);
        assert_eq!(edges.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn level_handle_tracks_pin() {
        let mut input = DigitalInput::default();
        let level = input.level();
        assert!(!level.get());
        input.set(true);
        assert!(level.get());
    }

    #[test]
    fn handler_sees_new_level() {
        let seen = Arc::new(AtomicBool::new(false));
        let flag = seen.clone();
        let mut input = DigitalInput::default();
        input.set_handler(Box::new(move |value| {
            flag.store(value, Ordering::Relaxed);
        }));
        input.set(true);
        assert!(seen.load(Ordering::Relaxed));
    }
}
