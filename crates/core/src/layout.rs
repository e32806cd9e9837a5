//! Fixed report layouts and the generic decode driver.
//!
//! Each supported model delivers one report shape. A [`ModelLayout`] lists,
//! per channel, which byte(s) feed it and how they are transformed, and per
//! button, which (byte, bit) pair holds it. The tables are bit-exact to the
//! hardware and the button pairs are deliberately not contiguous.

use crate::error::{Error, Result};
use crate::state::DeviceState;
use tracing::trace;

/// How one analog channel is computed from the raw report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChannelTransform {
    /// `(byte - 128) / divisor`; a divisor of ±128 maps to [-1, 1].
    SignedCentered { byte: usize, divisor: f64 },
    /// `byte / 256`, range [0, 1).
    Unsigned { byte: usize },
    /// `(high << 8) | low`, left unnormalized.
    BigEndian16 { high: usize, low: usize },
    /// `((byte - bias) / scale) + offset`.
    OffsetScale {
        byte: usize,
        bias: f64,
        scale: f64,
        offset: f64,
    },
}

impl ChannelTransform {
    /// Apply the transform. `report` must cover every byte the transform reads.
    pub fn apply(&self, report: &[u8]) -> f64 {
        match *self {
            Self::SignedCentered { byte, divisor } => (f64::from(report[byte]) - 128.0) / divisor,
            Self::Unsigned { byte } => f64::from(report[byte]) / 256.0,
            Self::BigEndian16 { high, low } => {
                f64::from((u16::from(report[high]) << 8) | u16::from(report[low]))
            }
            Self::OffsetScale {
                byte,
                bias,
                scale,
                offset,
            } => ((f64::from(report[byte]) - bias) / scale) + offset,
        }
    }

    /// Highest byte offset this transform reads.
    pub fn max_offset(&self) -> usize {
        match *self {
            Self::SignedCentered { byte, .. }
            | Self::Unsigned { byte }
            | Self::OffsetScale { byte, .. } => byte,
            Self::BigEndian16 { high, low } => high.max(low),
        }
    }
}

/// Location of one button bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonBit {
    pub byte: usize,
    pub bit: u8,
}

impl ButtonBit {
    pub const fn new(byte: usize, bit: u8) -> Self {
        Self { byte, bit }
    }

    pub fn is_set(&self, report: &[u8]) -> bool {
        report[self.byte] & (1 << self.bit) != 0
    }
}

/// Report layout of one controller model.
#[derive(Debug)]
pub struct ModelLayout {
    /// Reports shorter than this are rejected without touching state.
    pub min_report_len: usize,
    /// One transform per channel, in channel order.
    pub channels: &'static [ChannelTransform],
    /// One bit location per button, in button order.
    pub buttons: &'static [ButtonBit],
}

impl ModelLayout {
    /// Decode `report` into `state`, writing every channel and button slot.
    ///
    /// On a short report nothing is written and
    /// [`Error::PacketTooShort`] is returned.
    pub fn decode(&self, report: &[u8], state: &mut DeviceState) -> Result<()> {
        if report.len() < self.min_report_len {
            return Err(Error::PacketTooShort {
                expected: self.min_report_len,
                actual: report.len(),
            });
        }
        state.check_shape(self.channels.len(), self.buttons.len())?;

        for (index, transform) in self.channels.iter().enumerate() {
            state.set_channel(index, transform.apply(report))?;
        }
        for (index, bit) in self.buttons.iter().enumerate() {
            state.set_button(index, bit.is_set(report))?;
        }

        trace!(
            len = report.len(),
            report_hex = format_args!("{:02X?}", report),
            "Decoded report"
        );
        Ok(())
    }

    /// Highest byte offset any channel or button reads.
    pub fn max_offset(&self) -> usize {
        let channels = self.channels.iter().map(ChannelTransform::max_offset);
        let buttons = self.buttons.iter().map(|b| b.byte);
        channels.chain(buttons).max().unwrap_or(0)
    }
}

/// Aimon PS Elite: 49-byte report, 12 channels, 9 buttons.
pub static AIMON_ELITE: ModelLayout = ModelLayout {
    min_report_len: 49,
    channels: &[
        ChannelTransform::SignedCentered {
            byte: 7,
            divisor: -128.0,
        },
        ChannelTransform::SignedCentered {
            byte: 6,
            divisor: 128.0,
        },
        ChannelTransform::Unsigned { byte: 20 },
        ChannelTransform::Unsigned { byte: 18 },
        ChannelTransform::Unsigned { byte: 14 },
        ChannelTransform::Unsigned { byte: 16 },
        ChannelTransform::Unsigned { byte: 17 },
        ChannelTransform::Unsigned { byte: 15 },
        ChannelTransform::BigEndian16 { high: 41, low: 42 },
        ChannelTransform::BigEndian16 { high: 43, low: 44 },
        ChannelTransform::BigEndian16 { high: 45, low: 46 },
        ChannelTransform::BigEndian16 { high: 47, low: 48 },
    ],
    buttons: &[
        ButtonBit::new(3, 2),
        ButtonBit::new(3, 0),
        ButtonBit::new(2, 1),
        ButtonBit::new(2, 4),
        ButtonBit::new(2, 6),
        ButtonBit::new(2, 7),
        ButtonBit::new(2, 5),
        ButtonBit::new(2, 0),
        ButtonBit::new(4, 0),
    ],
};

/// Lenovo G120: stick on bytes 13/14, buttons in bytes 17 and 18.
pub static LENOVO_G120: ModelLayout = ModelLayout {
    min_report_len: 19,
    channels: &[
        ChannelTransform::OffsetScale {
            byte: 13,
            bias: 58.0,
            scale: 70.0,
            offset: -1.0,
        },
        ChannelTransform::OffsetScale {
            byte: 14,
            bias: 58.0,
            scale: -70.0,
            offset: 1.0,
        },
    ],
    buttons: &[
        ButtonBit::new(17, 0),
        ButtonBit::new(17, 1),
        ButtonBit::new(17, 2),
        ButtonBit::new(17, 3),
        ButtonBit::new(17, 4),
        ButtonBit::new(17, 5),
        ButtonBit::new(18, 0),
        ButtonBit::new(18, 1),
        ButtonBit::new(18, 2),
        ButtonBit::new(18, 3),
    ],
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    fn aimon_state() -> DeviceState {
        DeviceState::new(12, 9, UNIX_EPOCH)
    }

    fn g120_state() -> DeviceState {
        DeviceState::new(2, 10, UNIX_EPOCH)
    }

    #[test]
    fn layouts_fit_within_minimum_length() {
        for layout in [&AIMON_ELITE, &LENOVO_G120] {
            assert!(layout.max_offset() < layout.min_report_len);
        }
    }

    #[test]
    fn aimon_stick_axes_are_centered() {
        let mut report = [0u8; 49];
        report[7] = 0;
        report[6] = 255;
        let mut state = aimon_state();
        AIMON_ELITE.decode(&report, &mut state).unwrap();
        assert_eq!(state.channels()[0], 1.0);
        assert_eq!(state.channels()[1], 127.0 / 128.0);

        report[7] = 255;
        report[6] = 0;
        AIMON_ELITE.decode(&report, &mut state).unwrap();
        assert_eq!(state.channels()[0], -0.9921875);
        assert_eq!(state.channels()[1], -1.0);

        report[7] = 128;
        AIMON_ELITE.decode(&report, &mut state).unwrap();
        assert_eq!(state.channels()[0], 0.0);
    }

    #[test]
    fn aimon_unsigned_channels_use_documented_offsets() {
        let mut report = [0u8; 49];
        report[20] = 128;
        report[18] = 64;
        report[14] = 255;
        report[16] = 1;
        report[17] = 32;
        report[15] = 192;
        let mut state = aimon_state();
        AIMON_ELITE.decode(&report, &mut state).unwrap();
        assert_eq!(
            &state.channels()[2..8],
            &[0.5, 0.25, 255.0 / 256.0, 1.0 / 256.0, 0.125, 0.75]
        );
    }

    #[test]
    fn aimon_wide_channels_are_big_endian_unnormalized() {
        let mut report = [0u8; 49];
        report[41] = 0x12;
        report[42] = 0x34;
        report[43] = 0xFF;
        report[44] = 0xFF;
        report[45] = 0x00;
        report[46] = 0x01;
        report[47] = 0x80;
        report[48] = 0x00;
        let mut state = aimon_state();
        AIMON_ELITE.decode(&report, &mut state).unwrap();
        assert_eq!(&state.channels()[8..12], &[4660.0, 65535.0, 1.0, 32768.0]);
    }

    #[test]
    fn aimon_button_bits_map_one_to_one() {
        let expected = [(3, 2), (3, 0), (2, 1), (2, 4), (2, 6), (2, 7), (2, 5), (2, 0), (4, 0)];
        for (button, (byte, bit)) in expected.iter().enumerate() {
            let mut report = [0u8; 49];
            report[*byte] = 1 << bit;
            let mut state = aimon_state();
            AIMON_ELITE.decode(&report, &mut state).unwrap();
            for (index, pressed) in state.buttons().iter().enumerate() {
                assert_eq!(*pressed, index == button, "bit {byte}:{bit} button {index}");
            }
        }
    }

    #[test]
    fn aimon_unmapped_bits_are_ignored() {
        let mut report = [0u8; 49];
        report[3] = 0b1111_1010; // bits 1, 3..7 are not buttons
        report[4] = 0b1111_1110;
        let mut state = aimon_state();
        AIMON_ELITE.decode(&report, &mut state).unwrap();
        assert!(state.buttons().iter().all(|pressed| !pressed));
    }

    #[test]
    fn short_report_leaves_state_untouched() {
        let mut report = [0u8; 49];
        report[7] = 0;
        report[2] = 0xFF;
        let mut state = aimon_state();
        AIMON_ELITE.decode(&report, &mut state).unwrap();
        let before = state.clone();

        let short = [0xAAu8; 48];
        let err = AIMON_ELITE.decode(&short, &mut state).unwrap_err();
        assert!(matches!(
            err,
            Error::PacketTooShort {
                expected: 49,
                actual: 48
            }
        ));
        assert_eq!(state, before);
    }

    #[test]
    fn every_short_length_is_rejected() {
        let layouts = [
            (&AIMON_ELITE, aimon_state as fn() -> DeviceState),
            (&LENOVO_G120, g120_state as fn() -> DeviceState),
        ];
        for (layout, fresh) in layouts {
            let report = vec![0xFFu8; layout.min_report_len];
            for len in 0..layout.min_report_len {
                let mut state = fresh();
                let err = layout.decode(&report[..len], &mut state).unwrap_err();
                assert!(
                    matches!(err, Error::PacketTooShort { expected, actual }
                        if expected == layout.min_report_len && actual == len),
                    "length {len}: {err:?}"
                );
                assert_eq!(state, fresh(), "length {len}");
            }
        }
    }

    #[test]
    fn longer_report_decodes_prefix() {
        let mut report = [0u8; 64];
        report[7] = 0;
        report[60] = 0xFF;
        let mut state = aimon_state();
        AIMON_ELITE.decode(&report, &mut state).unwrap();
        assert_eq!(state.channels()[0], 1.0);
    }

    #[test]
    fn g120_stick_offset_and_scale() {
        let mut report = [0u8; 19];
        report[13] = 128;
        report[14] = 128;
        let mut state = g120_state();
        LENOVO_G120.decode(&report, &mut state).unwrap();
        assert_eq!(state.channels()[0], 0.0);
        assert_eq!(state.channels()[1], 0.0);

        report[13] = 58;
        report[14] = 58;
        LENOVO_G120.decode(&report, &mut state).unwrap();
        assert_eq!(state.channels()[0], -1.0);
        assert_eq!(state.channels()[1], 1.0);

        report[13] = 198;
        report[14] = 198;
        LENOVO_G120.decode(&report, &mut state).unwrap();
        assert_eq!(state.channels()[0], 1.0);
        assert_eq!(state.channels()[1], -1.0);
    }

    #[test]
    fn g120_buttons_span_two_bytes() {
        let mut report = [0u8; 19];
        report[17] = 0b0010_0001;
        report[18] = 0b0000_1000;
        let mut state = g120_state();
        LENOVO_G120.decode(&report, &mut state).unwrap();
        assert_eq!(
            state.buttons(),
            &[true, false, false, false, false, true, false, false, false, true]
        );
    }

    #[test]
    fn g120_high_bits_are_not_buttons() {
        let mut report = [0u8; 19];
        report[17] = 0b1100_0000;
        report[18] = 0b1111_0000;
        let mut state = g120_state();
        LENOVO_G120.decode(&report, &mut state).unwrap();
        assert!(state.buttons().iter().all(|pressed| !pressed));
    }

    #[test]
    fn shape_mismatch_is_rejected_before_writing() {
        let mut state = DeviceState::new(2, 9, UNIX_EPOCH);
        let report = [0xFFu8; 49];
        assert!(matches!(
            AIMON_ELITE.decode(&report, &mut state),
            Err(Error::SlotOutOfRange { .. })
        ));
        assert_eq!(state, DeviceState::new(2, 9, UNIX_EPOCH));
    }
}
