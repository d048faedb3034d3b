//! DIN and USB MIDI transports.
//!
//! Incoming bytes pass a byte-level receive filter first (the engine
//! installs one that steals real-time clock bytes), then a framing parser
//! that enqueues complete messages. Queues are bounded: a full send queue
//! reports failure and the caller may retry on its own schedule.

use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use tactus_model::MidiMessage;

/// Byte-level receive filter. Returning true consumes the byte before
/// framing. Runs in interrupt context on device.
pub type RecvFilter = Box<dyn FnMut(u8) -> bool + Send>;

const QUEUE_CAPACITY: usize = 64;

/// Incremental MIDI frame parser with running status.
#[derive(Debug, Default)]
struct Parser {
    status: Option<u8>,
    data: [u8; 2],
    have: usize,
}

impl Parser {
    fn needed(status: u8) -> usize {
        match status >> 4 {
            0xC | 0xD => 1,
            _ => 2,
        }
    }

    /// Feed one byte; returns a message when a frame completes. Bytes that
    /// do not fit a frame boundary are dropped.
    fn feed(&mut self, byte: u8) -> Option<MidiMessage> {
        if byte >= 0xF8 {
            // System real-time: passes through without disturbing framing.
            return MidiMessage::from_realtime(byte);
        }
        if byte >= 0xF0 {
            // System common / sysex: unsupported, cancels running status.
            self.status = None;
            self.have = 0;
            return None;
        }
        if byte >= 0x80 {
            self.status = Some(byte);
            self.have = 0;
            return None;
        }

        let status = self.status?;
        self.data[self.have] = byte;
        self.have += 1;
        if self.have < Self::needed(status) {
            return None;
        }
        // Frame complete; running status stays armed for the next one.
        self.have = 0;
        let channel = status & 0x0F;
        let d0 = self.data[0];
        let d1 = self.data[1];
        Some(match status >> 4 {
            0x8 => MidiMessage::NoteOff { channel, note: d0, velocity: d1 },
            0x9 => MidiMessage::NoteOn { channel, note: d0, velocity: d1 },
            0xA => MidiMessage::KeyPressure { channel, note: d0, pressure: d1 },
            0xB => MidiMessage::ControlChange { channel, controller: d0, value: d1 },
            0xC => MidiMessage::ProgramChange { channel, program: d0 },
            0xD => MidiMessage::ChannelPressure { channel, pressure: d0 },
            0xE => MidiMessage::PitchBend {
                channel,
                value: ((d1 as i32) << 7 | d0 as i32) as i16 - 8192,
            },
            _ => return None,
        })
    }
}

/// Shared transport internals behind both ports.
struct Transport {
    rx_prod: HeapProd<MidiMessage>,
    rx_cons: HeapCons<MidiMessage>,
    tx_prod: HeapProd<MidiMessage>,
    tx_cons: HeapCons<MidiMessage>,
    parser: Parser,
    recv_filter: Option<RecvFilter>,
}

impl Transport {
    fn new() -> Self {
        let (rx_prod, rx_cons) = HeapRb::new(QUEUE_CAPACITY).split();
        let (tx_prod, tx_cons) = HeapRb::new(QUEUE_CAPACITY).split();
        Self {
            rx_prod,
            rx_cons,
            tx_prod,
            tx_cons,
            parser: Parser::default(),
            recv_filter: None,
        }
    }

    fn receive_byte(&mut self, byte: u8) {
        if let Some(filter) = &mut self.recv_filter {
            if filter(byte) {
                return;
            }
        }
        if let Some(message) = self.parser.feed(byte) {
            // Overflow drops the message; transient by design of the caller.
            let _ = self.rx_prod.try_push(message);
        }
    }

    fn recv(&mut self) -> Option<MidiMessage> {
        self.rx_cons.try_pop()
    }

    fn send(&mut self, message: MidiMessage) -> bool {
        self.tx_prod.try_push(message).is_ok()
    }

    fn pop_sent(&mut self) -> Option<MidiMessage> {
        self.tx_cons.try_pop()
    }
}

macro_rules! transport_methods {
    () => {
        /// Install the byte-level receive filter.
        pub fn set_recv_filter(&mut self, filter: RecvFilter) {
            self.transport.recv_filter = Some(filter);
        }

        /// Feed one wire byte (interrupt side).
        pub fn receive_byte(&mut self, byte: u8) {
            self.transport.receive_byte(byte);
        }

        /// Feed a run of wire bytes (interrupt side).
        pub fn receive_bytes(&mut self, bytes: &[u8]) {
            for &byte in bytes {
                self.transport.receive_byte(byte);
            }
        }

        /// Dequeue the next framed message.
        pub fn recv(&mut self) -> Option<MidiMessage> {
            self.transport.recv()
        }

        /// Queue a message for transmission. Returns false when the send
        /// queue is full.
        pub fn send(&mut self, message: MidiMessage) -> bool {
            self.transport.send(message)
        }

        /// Drain the transmit queue (the UART/USB engine's side).
        pub fn pop_sent(&mut self) -> Option<MidiMessage> {
            self.transport.pop_sent()
        }
    };
}

/// The 5-pin DIN MIDI port.
pub struct Midi {
    transport: Transport,
}

impl Midi {
    pub fn new() -> Self {
        Self { transport: Transport::new() }
    }

    transport_methods!();
}

impl Default for Midi {
    fn default() -> Self {
        Self::new()
    }
}

/// The USB MIDI port, with device connect/disconnect notification.
pub struct UsbMidi {
    transport: Transport,
    connected: bool,
    connect_handler: Option<Box<dyn FnMut(u16, u16) + Send>>,
    disconnect_handler: Option<Box<dyn FnMut() + Send>>,
}

impl UsbMidi {
    pub fn new() -> Self {
        Self {
            transport: Transport::new(),
            connected: false,
            connect_handler: None,
            disconnect_handler: None,
        }
    }

    transport_methods!();

    pub fn set_connect_handler(&mut self, handler: Box<dyn FnMut(u16, u16) + Send>) {
        self.connect_handler = Some(handler);
    }

    pub fn set_disconnect_handler(&mut self, handler: Box<dyn FnMut() + Send>) {
        self.disconnect_handler = Some(handler);
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Simulate device enumeration.
    pub fn connect(&mut self, vendor_id: u16, product_id: u16) {
        log::debug!(target: "hal::midi", "usb midi connect {:04x}:{:04x}", vendor_id, product_id);
        self.connected = true;
        if let Some(handler) = &mut self.connect_handler {
            handler(vendor_id, product_id);
        }
    }

    /// Simulate device removal.
    pub fn disconnect(&mut self) {
        log::debug!(target: "hal::midi", "usb midi disconnect");
        self.connected = false;
        if let Some(handler) = &mut self.disconnect_handler {
            handler();
        }
    }
}

impl Default for UsbMidi {
    fn default() -> Self {
        Self::new()
    }
}
