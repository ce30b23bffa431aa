use crate::{Accuracy, MeasurementUnit};

/// The quantities [`Sensors`](crate::Sensors) can read.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    /// Voltage of the ADC reference, in millivolts.
    ReferenceVoltage,
    /// LM60 inside the enclosure, in tenths of a degree Celsius.
    InternalAnalogTemperature,
    /// LM60 outside the enclosure, in tenths of a degree Celsius.
    ExternalAnalogTemperature,
    /// DS18B20 inside the enclosure, in tenths of a degree Celsius.
    InternalDigitalTemperature,
    /// DS18B20 outside the enclosure, in tenths of a degree Celsius.
    ExternalDigitalTemperature,
    /// Main supply rail, in millivolts.
    SupplyVoltage,
}

impl Channel {
    /// Every channel, in the order [`Sensors::read_all()`](crate::Sensors::read_all) reads them.
    pub const ALL: [Self; 6] = [
        Self::ReferenceVoltage,
        Self::InternalAnalogTemperature,
        Self::ExternalAnalogTemperature,
        Self::InternalDigitalTemperature,
        Self::ExternalDigitalTemperature,
        Self::SupplyVoltage,
    ];

    /// Returns the unit values of this channel are expressed in, once scaled.
    #[must_use]
    pub const fn unit(self) -> MeasurementUnit {
        match self {
            Self::ReferenceVoltage | Self::SupplyVoltage => MeasurementUnit::Volt,
            Self::InternalAnalogTemperature
            | Self::ExternalAnalogTemperature
            | Self::InternalDigitalTemperature
            | Self::ExternalDigitalTemperature => MeasurementUnit::Celsius,
        }
    }

    /// Returns the power of ten values of this channel are scaled by.
    #[must_use]
    pub const fn scaling(self) -> i8 {
        match self {
            Self::ReferenceVoltage | Self::SupplyVoltage => -3,
            Self::InternalAnalogTemperature
            | Self::ExternalAnalogTemperature
            | Self::InternalDigitalTemperature
            | Self::ExternalDigitalTemperature => -1,
        }
    }

    /// Returns the datasheet accuracy of the sensor behind this channel.
    #[must_use]
    pub const fn accuracy(self) -> Accuracy {
        match self {
            // Depends on the tolerance of the bandgap or of the external reference.
            Self::ReferenceVoltage | Self::SupplyVoltage => Accuracy::Unknown,
            // LM60B at +25 °C.
            Self::InternalAnalogTemperature | Self::ExternalAnalogTemperature => {
                Accuracy::SymmetricalError {
                    deviation: 20,
                    bias: 0,
                    scaling: -1,
                }
            }
            // −10 °C to +85 °C.
            Self::InternalDigitalTemperature | Self::ExternalDigitalTemperature => {
                Accuracy::SymmetricalError {
                    deviation: 5,
                    bias: 0,
                    scaling: -1,
                }
            }
        }
    }
}

impl core::fmt::Display for Channel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ReferenceVoltage => write!(f, "Reference voltage"),
            Self::InternalAnalogTemperature => write!(f, "Internal analog temperature"),
            Self::ExternalAnalogTemperature => write!(f, "External analog temperature"),
            Self::InternalDigitalTemperature => write!(f, "Internal digital temperature"),
            Self::ExternalDigitalTemperature => write!(f, "External digital temperature"),
            Self::SupplyVoltage => write!(f, "Supply voltage"),
        }
    }
}
