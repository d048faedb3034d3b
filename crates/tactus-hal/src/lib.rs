//! Hardware I/O facades for the tactus sequencer.
//!
//! Each type has the shape of the corresponding device driver but runs as
//! an in-memory simulation: input setters stand in for interrupt-driven
//! pin changes and invoke the registered handlers synchronously, outputs
//! latch the last written value for inspection.

mod cv;
mod dio;
mod gate;
mod midi;
mod time;

pub use cv::{Calibration, CvInput, CvOutput, Dac, CV_VOLTS_MAX, CV_VOLTS_MIN};
pub use dio::{DigitalInput, DigitalOutput, Dio, EdgeHandler, InputLevel};
pub use gate::GateOutput;
pub use midi::{Midi, RecvFilter, UsbMidi};
pub use time::SystemTicks;
