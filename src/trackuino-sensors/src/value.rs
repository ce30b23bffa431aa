use crate::{Channel, MeasurementUnit};

/// Represents a value obtained from a sensor.
///
/// # Scaling
///
/// The [scaling value](Measurement::scaling()) must be taken into account using the following
/// formula:
///
/// <math xmlns="http://www.w3.org/1998/Math/MathML" display="block"><mrow><mi mathvariant="monospace">Value::get()</mi></mrow><mo>·</mo><msup><mn>10</mn><mrow><mi mathvariant="monospace">scaling</mi></mrow></msup></math>
///
/// For instance, if [`Value::get()`] returns `-125` for a temperature and the scaling value is
/// `-1`, the measured temperature is `-12.5` °C.
// NOTE(derive): no `PartialOrd`, interpreting the value requires the associated `Channel`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Value {
    value: i32,
}

impl Value {
    /// Creates a new value.
    #[must_use]
    pub const fn new(value: i32) -> Self {
        Self { value }
    }

    /// Returns the value.
    #[must_use]
    pub const fn get(&self) -> i32 {
        self.value
    }
}

/// Specifies the accuracy of a measurement.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Accuracy {
    /// Unknown accuracy.
    Unknown,
    /// Measurement error symmetrical around the [`bias`](Accuracy::SymmetricalError::bias).
    ///
    /// The unit of measurement is the one of the [`Measurement`].
    /// The accuracy error is `+(bias + deviation)·10^scaling / -(bias - deviation)·10^scaling`.
    ///
    /// # Examples
    ///
    /// The DS18B20 is accurate to ±0.5 °C between −10 °C and +85 °C:
    ///
    /// ```
    /// # use trackuino_sensors::Accuracy;
    /// Accuracy::SymmetricalError {
    ///     deviation: 5,
    ///     bias: 0,
    ///     scaling: -1,
    /// }
    /// # ;
    /// ```
    SymmetricalError {
        /// Deviation around the bias value.
        deviation: i16,
        /// Bias (mean accuracy error).
        bias: i16,
        /// Scaling of [`deviation`](Accuracy::SymmetricalError::deviation) and
        /// [`bias`](Accuracy::SymmetricalError::bias).
        scaling: i8,
    },
}

/// A [`Value`] along with what it measures.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Measurement {
    channel: Channel,
    value: Value,
}

impl Measurement {
    pub(crate) const fn new(channel: Channel, value: i32) -> Self {
        Self {
            channel,
            value: Value::new(value),
        }
    }

    /// Returns the channel the value was read from.
    #[must_use]
    pub const fn channel(&self) -> Channel {
        self.channel
    }

    /// Returns the value.
    #[must_use]
    pub const fn value(&self) -> Value {
        self.value
    }

    /// Returns the unit of the value.
    #[must_use]
    pub const fn unit(&self) -> MeasurementUnit {
        self.channel.unit()
    }

    /// Returns the power of ten the value must be multiplied by to be expressed in
    /// [`unit()`](Measurement::unit).
    #[must_use]
    pub const fn scaling(&self) -> i8 {
        self.channel.scaling()
    }

    /// Returns the accuracy of the sensor behind the channel.
    #[must_use]
    pub const fn accuracy(&self) -> Accuracy {
        self.channel.accuracy()
    }
}

impl core::fmt::Display for Measurement {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let value = self.value.get();
        let scaling = self.scaling();

        if scaling >= 0 {
            return write!(f, "{}: {value}e{scaling} {}", self.channel, self.unit());
        }

        let digits = scaling.unsigned_abs();
        let divisor = 10u32.pow(u32::from(digits));
        let magnitude = value.unsigned_abs();
        let sign = if value < 0 { "-" } else { "" };

        write!(
            f,
            "{}: {sign}{}.{:0width$} {}",
            self.channel,
            magnitude / divisor,
            magnitude % divisor,
            self.unit(),
            width = usize::from(digits),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let temperature = Measurement::new(Channel::ExternalDigitalTemperature, -125);
        assert_eq!(
            format!("{temperature}"),
            "External digital temperature: -12.5 °C"
        );

        let supply = Measurement::new(Channel::SupplyVoltage, 7405);
        assert_eq!(format!("{supply}"), "Supply voltage: 7.405 V");

        let small = Measurement::new(Channel::InternalAnalogTemperature, -5);
        assert_eq!(format!("{small}"), "Internal analog temperature: -0.5 °C");
    }

    #[test]
    fn test_accessors() {
        let measurement = Measurement::new(Channel::ReferenceVoltage, 5012);

        assert_eq!(measurement.value().get(), 5012);
        assert_eq!(measurement.unit(), MeasurementUnit::Volt);
        assert_eq!(measurement.scaling(), -3);
        assert_eq!(measurement.channel(), Channel::ReferenceVoltage);
    }
}
