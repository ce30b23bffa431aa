//! Analog-to-digital conversion.
//!
//! Boards provide an [`AnalogInput`]; the helpers here turn its counts into voltages.

/// Number of steps of the 10-bit ADC.
pub const ADC_STEPS: u32 = 1024;

/// Voltage of the internal bandgap reference, in millivolts.
pub const BANDGAP_MV: u32 = 1100;

/// Voltage reference of the ADC.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reference {
    /// The analog supply rail, whose voltage is measured against the bandgap.
    AVcc,
    /// The internal 1.1 V reference.
    Internal1V1,
    /// A reference applied to the AREF pin.
    External {
        /// Voltage of the reference, in millivolts.
        millivolts: u16,
    },
}

/// Input of the ADC multiplexer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AnalogChannel {
    /// An analog input pin, by number.
    Pin(u8),
    /// The internal bandgap reference.
    Bandgap,
}

/// A 10-bit analog-to-digital converter.
pub trait AnalogInput {
    /// Error returned by the ADC.
    type Error: core::fmt::Debug;

    /// Selects the voltage reference used by subsequent conversions.
    ///
    /// The first conversion after a change of reference may be inaccurate.
    ///
    /// # Errors
    ///
    /// Returns an error if the reference is not supported.
    fn set_reference(&mut self, reference: Reference) -> Result<(), Self::Error>;

    /// Runs a single conversion and returns its count, in `0..1024`.
    ///
    /// # Errors
    ///
    /// Returns an error if the conversion failed.
    fn convert(&mut self, channel: AnalogChannel) -> Result<u16, Self::Error>;
}

/// Scales a count to microvolts given the reference voltage in millivolts.
///
/// Counts above the full scale are clamped to it, and the result saturates at [`u32::MAX`].
#[must_use]
pub const fn counts_to_microvolts(count: u16, reference_mv: u32) -> u32 {
    let count = if count as u32 >= ADC_STEPS {
        ADC_STEPS - 1
    } else {
        count as u32
    };
    let microvolts = count as u64 * reference_mv as u64 * 1000 / ADC_STEPS as u64;
    if microvolts > u32::MAX as u64 {
        u32::MAX
    } else {
        #[expect(clippy::cast_possible_truncation)]
        let microvolts = microvolts as u32;
        microvolts
    }
}

/// Computes the voltage of `AVcc` from a conversion of the bandgap against `AVcc`, in millivolts.
///
/// Returns [`None`] for a zero count, which a working ADC never yields.
#[must_use]
pub const fn avcc_from_bandgap(count: u16) -> Option<u32> {
    if count == 0 {
        return None;
    }
    Some(BANDGAP_MV * ADC_STEPS / count as u32)
}

/// Encodes the `ADMUX` register of the `ATmega328P`, right-adjusted.
#[must_use]
pub const fn admux(reference: Reference, channel: AnalogChannel) -> u8 {
    let refs = match reference {
        Reference::External { .. } => 0b00,
        Reference::AVcc => 0b01,
        Reference::Internal1V1 => 0b11,
    };
    let mux = match channel {
        AnalogChannel::Pin(pin) => pin & 0x07,
        AnalogChannel::Bandgap => 0b1110,
    };
    (refs << 6) | mux
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_to_microvolts() {
        assert_eq!(counts_to_microvolts(0, 5000), 0);
        assert_eq!(counts_to_microvolts(1023, 1024), 1_023_000);
        assert_eq!(counts_to_microvolts(512, 5000), 2_500_000);
        assert_eq!(counts_to_microvolts(1, BANDGAP_MV), 1074);
    }

    #[test]
    fn test_counts_to_microvolts_out_of_contract() {
        assert_eq!(counts_to_microvolts(u16::MAX, 5000), 4_995_117);
        assert_eq!(counts_to_microvolts(1023, u32::MAX), u32::MAX);
        // Reference computed from a bandgap count of 1.
        let reference_mv = avcc_from_bandgap(1).unwrap();
        assert_eq!(counts_to_microvolts(u16::MAX, reference_mv), 1_125_300_000);
    }

    #[test]
    fn test_avcc_from_bandgap() {
        assert_eq!(avcc_from_bandgap(225), Some(5006));
        assert_eq!(avcc_from_bandgap(341), Some(3303));
        assert_eq!(avcc_from_bandgap(1023), Some(1101));
        assert_eq!(avcc_from_bandgap(0), None);
    }

    #[test]
    fn test_admux() {
        assert_eq!(admux(Reference::AVcc, AnalogChannel::Pin(0)), 0x40);
        assert_eq!(admux(Reference::AVcc, AnalogChannel::Bandgap), 0x4E);
        assert_eq!(admux(Reference::Internal1V1, AnalogChannel::Pin(2)), 0xC2);
        assert_eq!(
            admux(Reference::External { millivolts: 3300 }, AnalogChannel::Pin(1)),
            0x01
        );
    }
}
