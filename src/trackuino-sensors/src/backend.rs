use trackuino_onewire::{RomCode, Scratchpad};

use crate::{conversion::Instant, ReadingResult, SensorsConfig};

/// An analog sensor read through the ADC.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AnalogSensor {
    /// LM60 inside the enclosure.
    InternalLm60,
    /// LM60 outside the enclosure.
    ExternalLm60,
    /// Middle of the supply divider.
    Supply,
}

/// ROM codes of the DS18B20 probes, resolved during setup.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Probes {
    /// Probe inside the enclosure.
    pub internal: Option<RomCode>,
    /// Probe outside the enclosure.
    pub external: Option<RomCode>,
}

/// Access to the sensor hardware of a board.
///
/// Implementations only touch the hardware; [`Sensors`](crate::Sensors) keeps track of the setup
/// and of the temperature conversions.
pub trait SensorBackend {
    /// Configures the hardware and resolves the ROM codes of the DS18B20 probes.
    ///
    /// Must be idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the hardware could not be configured. Missing probes are not an error
    /// and are left unset in the returned [`Probes`], and so are probes whose resolution could
    /// not be written.
    fn setup(&mut self, config: &SensorsConfig) -> ReadingResult<Probes>;

    /// Writes the configured resolution to a DS18B20 again, after it lost it.
    ///
    /// # Errors
    ///
    /// Returns an error if the 1-Wire bus failed or the probe did not answer.
    fn configure_probe(&mut self, rom: RomCode) -> ReadingResult<()>;

    /// Returns the voltage of the ADC reference, in millivolts.
    ///
    /// # Errors
    ///
    /// Returns [`ReadingError::Adc`](crate::ReadingError::Adc) if the ADC failed.
    fn reference_voltage(&mut self) -> ReadingResult<u32>;

    /// Samples the output of an analog sensor, in microvolts.
    ///
    /// # Errors
    ///
    /// Returns [`ReadingError::Adc`](crate::ReadingError::Adc) if the ADC failed, or
    /// [`ReadingError::Pin`](crate::ReadingError::Pin) if powering the sensor failed.
    fn sample_microvolts(&mut self, sensor: AnalogSensor) -> ReadingResult<u32>;

    /// Starts a temperature conversion on every DS18B20 at once.
    ///
    /// # Errors
    ///
    /// Returns an error if the 1-Wire bus failed or no probe answered.
    fn start_conversion(&mut self) -> ReadingResult<()>;

    /// Reads the scratchpad of a DS18B20.
    ///
    /// # Errors
    ///
    /// Returns an error if the 1-Wire bus failed, the probe did not answer, or the data is
    /// corrupted.
    fn read_scratchpad(&mut self, rom: RomCode) -> ReadingResult<Scratchpad>;

    /// Returns the current time of the monotonic clock.
    fn now(&mut self) -> Instant;
}
