//! CV input sampling and calibrated CV output.

use tactus_model::config::{CV_INPUT_COUNT, CV_OUTPUT_COUNT};

/// Engine-native CV range in volts.
pub const CV_VOLTS_MIN: f32 = -5.0;
pub const CV_VOLTS_MAX: f32 = 5.0;

/// Analog inputs, normalized to engine-native volts.
#[derive(Debug, Default)]
pub struct CvInput {
    raw: [u16; CV_INPUT_COUNT],
    channels: [f32; CV_INPUT_COUNT],
}

impl CvInput {
    /// Latch the current raw samples into channel voltages. Called once
    /// per engine update so all consumers see one coherent snapshot.
    pub fn update(&mut self) {
        for (value, raw) in self.channels.iter_mut().zip(self.raw.iter()) {
            let normalized = *raw as f32 / u16::MAX as f32;
            *value = CV_VOLTS_MIN + normalized * (CV_VOLTS_MAX - CV_VOLTS_MIN);
        }
    }

    /// Latched voltage of a channel.
    pub fn channel(&self, index: usize) -> f32 {
        self.channels[index]
    }

    /// Feed a raw ADC sample (simulation side).
    pub fn set_raw(&mut self, index: usize, raw: u16) {
        self.raw[index] = raw;
    }
}

/// The DAC register file.
#[derive(Debug, Default)]
pub struct Dac {
    values: [u16; CV_OUTPUT_COUNT],
}

impl Dac {
    pub fn set(&mut self, channel: usize, value: u16) {
        self.values[channel] = value;
    }

    pub fn value(&self, channel: usize) -> u16 {
        self.values[channel]
    }
}

/// Per-channel voltage-to-code calibration.
///
/// Each channel maps the engine-native range linearly through an offset
/// and scale pair measured at factory calibration. The default table is
/// the ideal transfer curve.
#[derive(Clone, Debug)]
pub struct Calibration {
    /// Code at CV_VOLTS_MIN, per channel
    offsets: [f32; CV_OUTPUT_COUNT],
    /// Codes per volt, per channel
    scales: [f32; CV_OUTPUT_COUNT],
}

impl Default for Calibration {
    fn default() -> Self {
        let span = CV_VOLTS_MAX - CV_VOLTS_MIN;
        Self {
            offsets: [0.0; CV_OUTPUT_COUNT],
            scales: [u16::MAX as f32 / span; CV_OUTPUT_COUNT],
        }
    }
}

impl Calibration {
    pub fn set_channel(&mut self, channel: usize, offset: f32, scale: f32) {
        self.offsets[channel] = offset;
        self.scales[channel] = scale;
    }

    /// Convert a voltage into a DAC code for the channel.
    pub fn volts_to_code(&self, channel: usize, volts: f32) -> u16 {
        let code = self.offsets[channel] + (volts - CV_VOLTS_MIN) * self.scales[channel];
        code.clamp(0.0, u16::MAX as f32) as u16
    }
}

/// Calibrated CV outputs. Channel writes are staged in volts and pushed
/// through the calibration table to the DAC on `update`.
#[derive(Debug)]
pub struct CvOutput {
    dac: Dac,
    calibration: Calibration,
    volts: [f32; CV_OUTPUT_COUNT],
}

impl CvOutput {
    pub fn new(calibration: Calibration) -> Self {
        Self {
            dac: Dac::default(),
            calibration,
            volts: [0.0; CV_OUTPUT_COUNT],
        }
    }

    pub fn set_channel(&mut self, channel: usize, volts: f32) {
        self.volts[channel] = volts;
    }

    pub fn channel(&self, channel: usize) -> f32 {
        self.volts[channel]
    }

    /// Write all staged voltages to the DAC.
    pub fn update(&mut self) {
        for channel in 0..CV_OUTPUT_COUNT {
            self.dac
                .set(channel, self.calibration.volts_to_code(channel, self.volts[channel]));
        }
    }

    pub fn dac(&self) -> &Dac {
        &self.dac
    }
}

impl Default for CvOutput {
    fn default() -> Self {
        Self::new(Calibration::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_normalizes_full_scale() {
        let mut input = CvInput::default();
        input.set_raw(0, 0);
        input.set_raw(1, u16::MAX);
        input.update();
        assert_eq!(input.channel(0), CV_VOLTS_MIN);
        assert_eq!(input.channel(1), CV_VOLTS_MAX);
    }

    #[test]
    fn input_latches_on_update_only() {
        let mut input = CvInput::default();
        input.set_raw(0, u16::MAX);
        assert_eq!(input.channel(0), 0.0);
        input.update();
        assert_eq!(input.channel(0), CV_VOLTS_MAX);
    }

    #[test]
    fn default_calibration_spans_dac_range() {
        let cal = Calibration::default();
        assert_eq!(cal.volts_to_code(0, CV_VOLTS_MIN), 0);
        assert_eq!(cal.volts_to_code(0, CV_VOLTS_MAX), u16::MAX);
        let mid = cal.volts_to_code(0, 0.0);
        assert!((mid as i32 - 32767).abs() <= 1);
    }

    #[test]
    fn calibration_clamps_out_of_range() {
        let cal = Calibration::default();
        assert_eq!(cal.volts_to_code(0, -12.0), 0);
        assert_eq!(cal.volts_to_code(0, 12.0), u16::MAX);
    }

    #[test]
    fn output_writes_dac_on_update() {
        let mut out = CvOutput::default();
        out.set_channel(2, CV_VOLTS_MAX);
        assert_eq!(out.dac().value(2), 0);
        out.update();
        assert_eq!(out.dac().value(2), u16::MAX);
    }

    #[test]
    fn per_channel_calibration_applies() {
        let mut cal = Calibration::default();
        cal.set_channel(0, 100.0, 1000.0);
        let mut out = CvOutput::new(cal);
        out.set_channel(0, CV_VOLTS_MIN + 1.0);
        out.update();
        assert_eq!(out.dac().value(0), 1100);
    }
}
