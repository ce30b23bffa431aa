use trackuino_onewire::RomCode;

use crate::{
    backend::{AnalogSensor, Probes, SensorBackend},
    conversion::{ConversionState, Duration},
    lm60, Channel, Measurement, ReadingError, ReadingResult, SensorsConfig,
};

#[derive(Debug, Copy, Clone)]
enum Probe {
    Internal,
    External,
}

/// The onboard sensors of the tracker.
///
/// [`Sensors::setup()`] must be called before anything is read; readings return
/// [`ReadingError::NotSetUp`] until then.
///
/// The DS18B20 probes measure on request: [`Sensors::request_conversion()`] starts a conversion
/// on both probes at once, and their temperatures can be read once the conversion time of the
/// configured resolution has elapsed. Reading earlier returns [`ReadingError::NotReady`].
///
/// ```ignore
/// let mut sensors = Sensors::new(backend, SensorsConfig::new());
/// sensors.setup()?;
/// sensors.request_conversion()?;
/// // Do something else for 750 ms.
/// let temperature = sensors.external_digital_temperature()?;
/// ```
pub struct Sensors<B> {
    backend: B,
    config: SensorsConfig,
    set_up: bool,
    probes: Probes,
    conversion: ConversionState,
}

impl<B: SensorBackend> Sensors<B> {
    /// Creates the sensors.
    #[must_use]
    pub const fn new(backend: B, config: SensorsConfig) -> Self {
        Self {
            backend,
            config,
            set_up: false,
            probes: Probes {
                internal: None,
                external: None,
            },
            conversion: ConversionState::Idle,
        }
    }

    /// Configures the ADC reference, powers the LM60s off, finds the DS18B20 probes and writes
    /// their resolution.
    ///
    /// Calling it again configures the hardware again, and leaves an ongoing conversion running.
    ///
    /// # Errors
    ///
    /// Returns an error if the hardware could not be configured. Missing DS18B20 probes are not
    /// an error, reading them returns [`ReadingError::NotPresent`].
    pub fn setup(&mut self) -> ReadingResult<()> {
        self.probes = self.backend.setup(&self.config)?;
        self.set_up = true;

        trackuino_log::info!(
            "sensors set up, reference {:?}, DS18B20 resolution {} bits",
            self.config.reference(),
            self.config.resolution().bits()
        );
        if self.probes.internal.is_none() {
            trackuino_log::warn!("no internal DS18B20");
        }
        if self.probes.external.is_none() {
            trackuino_log::warn!("no external DS18B20");
        }

        Ok(())
    }

    /// Returns the voltage of the ADC reference, in millivolts.
    ///
    /// # Errors
    ///
    /// Returns [`ReadingError::Adc`] if the ADC failed.
    pub fn reference_voltage(&mut self) -> ReadingResult<u32> {
        self.ensure_set_up()?;
        self.backend.reference_voltage()
    }

    /// Returns the temperature of the internal LM60, in tenths of a degree Celsius.
    ///
    /// # Errors
    ///
    /// Returns [`ReadingError::Adc`] if the ADC failed.
    pub fn internal_analog_temperature(&mut self) -> ReadingResult<i16> {
        self.analog_temperature(AnalogSensor::InternalLm60)
    }

    /// Returns the temperature of the external LM60, in tenths of a degree Celsius.
    ///
    /// # Errors
    ///
    /// Returns [`ReadingError::Adc`] if the ADC failed.
    pub fn external_analog_temperature(&mut self) -> ReadingResult<i16> {
        self.analog_temperature(AnalogSensor::ExternalLm60)
    }

    /// Returns the temperature measured by the internal DS18B20 during the last conversion, in
    /// tenths of a degree Celsius.
    ///
    /// # Errors
    ///
    /// - [`ReadingError::NotRequested`] if no conversion was requested.
    /// - [`ReadingError::NotReady`] if the conversion is still in progress.
    /// - [`ReadingError::NotPresent`] if the probe is missing.
    /// - [`ReadingError::Crc`] if the data read is corrupted.
    /// - [`ReadingError::PowerOnReset`] if the probe lost power during the conversion, or since
    ///   setup and lost its resolution. The resolution is written again, and the next conversion
    ///   can be read.
    pub fn internal_digital_temperature(&mut self) -> ReadingResult<i16> {
        self.digital_temperature(Probe::Internal)
    }

    /// Returns the temperature measured by the external DS18B20 during the last conversion, in
    /// tenths of a degree Celsius.
    ///
    /// # Errors
    ///
    /// Same as [`Sensors::internal_digital_temperature()`].
    pub fn external_digital_temperature(&mut self) -> ReadingResult<i16> {
        self.digital_temperature(Probe::External)
    }

    /// Starts a temperature conversion on every DS18B20 and returns immediately.
    ///
    /// Requesting a conversion while one is in progress restarts the wait.
    ///
    /// # Errors
    ///
    /// Returns [`ReadingError::NotPresent`] if no probe answered, or a bus error.
    pub fn request_conversion(&mut self) -> ReadingResult<()> {
        self.ensure_set_up()?;
        self.backend.start_conversion()?;

        let resolution = self.config.resolution();
        let duration = Duration::millis(u64::from(resolution.conversion_time_ms()));
        self.conversion = ConversionState::Converting {
            started_at: self.backend.now(),
            duration,
        };
        trackuino_log::debug!("temperature conversion requested, ready in {} ms", duration.ticks());

        Ok(())
    }

    /// Updates the state of the conversion from the clock, and returns it.
    pub fn poll_conversion(&mut self) -> ConversionState {
        self.conversion = self.conversion.poll(self.backend.now());
        self.conversion
    }

    /// Returns the state of the conversion as of the last poll.
    #[must_use]
    pub fn conversion_state(&self) -> ConversionState {
        self.conversion
    }

    /// Returns the supply voltage, in millivolts.
    ///
    /// # Errors
    ///
    /// Returns [`ReadingError::Adc`] if the ADC failed, or [`ReadingError::OutOfRange`] above
    /// 65.535 V.
    pub fn supply_voltage(&mut self) -> ReadingResult<u16> {
        self.ensure_set_up()?;
        let divided = self.backend.sample_microvolts(AnalogSensor::Supply)?;
        let millivolts = self.config.undivide(divided) / 1000;
        u16::try_from(millivolts).map_err(|_| ReadingError::OutOfRange)
    }

    /// Reads a channel.
    ///
    /// # Errors
    ///
    /// Returns the error of the corresponding method.
    pub fn try_read(&mut self, channel: Channel) -> ReadingResult<Measurement> {
        let value = match channel {
            Channel::ReferenceVoltage => self.reference_voltage().and_then(|millivolts| {
                i32::try_from(millivolts).map_err(|_| ReadingError::OutOfRange)
            })?,
            Channel::InternalAnalogTemperature => self.internal_analog_temperature()?.into(),
            Channel::ExternalAnalogTemperature => self.external_analog_temperature()?.into(),
            Channel::InternalDigitalTemperature => self.internal_digital_temperature()?.into(),
            Channel::ExternalDigitalTemperature => self.external_digital_temperature()?.into(),
            Channel::SupplyVoltage => self.supply_voltage()?.into(),
        };
        Ok(Measurement::new(channel, value))
    }

    /// Reads every channel, in [`Channel::ALL`] order.
    pub fn read_all(&mut self) -> ReadAll<'_, B> {
        ReadAll {
            sensors: self,
            channel_index: 0,
        }
    }

    /// Returns the ROM codes of the DS18B20 probes found during setup.
    #[must_use]
    pub fn probes(&self) -> Probes {
        self.probes
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &SensorsConfig {
        &self.config
    }

    /// Gives access to the backend.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Gives the backend back.
    #[must_use]
    pub fn into_backend(self) -> B {
        self.backend
    }

    fn ensure_set_up(&self) -> ReadingResult<()> {
        if self.set_up {
            Ok(())
        } else {
            Err(ReadingError::NotSetUp)
        }
    }

    fn analog_temperature(&mut self, sensor: AnalogSensor) -> ReadingResult<i16> {
        self.ensure_set_up()?;
        let microvolts = self.backend.sample_microvolts(sensor)?;
        let decicelsius = lm60::decicelsius_from_microvolts(microvolts);
        i16::try_from(decicelsius).map_err(|_| ReadingError::OutOfRange)
    }

    fn probe_rom(&self, probe: Probe) -> Option<RomCode> {
        match probe {
            Probe::Internal => self.probes.internal,
            Probe::External => self.probes.external,
        }
    }

    fn digital_temperature(&mut self, probe: Probe) -> ReadingResult<i16> {
        self.ensure_set_up()?;

        match self.poll_conversion() {
            ConversionState::Idle => return Err(ReadingError::NotRequested),
            ConversionState::Converting { .. } => return Err(ReadingError::NotReady),
            ConversionState::Ready => {}
        }

        let rom = self.probe_rom(probe).ok_or(ReadingError::NotPresent)?;
        let scratchpad = self.backend.read_scratchpad(rom)?;
        if scratchpad.is_power_on_value() {
            trackuino_log::warn!("{:?} holds its power-on value", rom);
            return Err(ReadingError::PowerOnReset);
        }
        // The resolution reverts to the EEPROM content after a brown-out, the conversion then
        // outlasts the wait and the scratchpad holds the previous one.
        if scratchpad.resolution() != self.config.resolution() {
            trackuino_log::warn!(
                "{:?} reset to {} bits, configuring it again",
                rom,
                scratchpad.resolution().bits()
            );
            self.backend.configure_probe(rom)?;
            return Err(ReadingError::PowerOnReset);
        }

        Ok(scratchpad.temperature_decicelsius())
    }
}

/// Iterator over the readings of every channel, returned by [`Sensors::read_all()`].
pub struct ReadAll<'a, B> {
    sensors: &'a mut Sensors<B>,
    channel_index: usize,
}

impl<B: SensorBackend> Iterator for ReadAll<'_, B> {
    type Item = (Channel, ReadingResult<Measurement>);

    fn next(&mut self) -> Option<Self::Item> {
        let channel = *Channel::ALL.get(self.channel_index)?;
        self.channel_index += 1;

        Some((channel, self.sensors.try_read(channel)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = Channel::ALL.len().saturating_sub(self.channel_index);
        (remaining, Some(remaining))
    }
}

impl<B: SensorBackend> ExactSizeIterator for ReadAll<'_, B> {}

#[cfg(test)]
mod tests {
    use trackuino_onewire::{ds18b20::Resolution, Scratchpad};

    use super::*;
    use crate::conversion::Instant;

    const ROM_A: RomCode = RomCode::from_u64(0x7704_1691_3A4C_FF28);

    // 25.0625 °C at 12 bits.
    const SCRATCHPAD_25C: [u8; 9] = [0x91, 0x01, 0x4B, 0x46, 0x7F, 0xFF, 0x0C, 0x10, 0x70];
    const SCRATCHPAD_85C: [u8; 9] = [0x50, 0x05, 0x4B, 0x46, 0x7F, 0xFF, 0x0C, 0x10, 0x1C];
    const SCRATCHPAD_25C_9_BITS: [u8; 9] = [0x91, 0x01, 0x4B, 0x46, 0x1F, 0xFF, 0x0C, 0x10, 0xE0];

    /// Backend returning canned values.
    struct Canned {
        now_ms: u64,
        microvolts: u32,
        scratchpad: [u8; 9],
        setups: usize,
        conversions: usize,
        reconfigured: Vec<RomCode>,
    }

    impl Canned {
        fn new() -> Self {
            Self {
                now_ms: 0,
                microvolts: 580_250,
                scratchpad: SCRATCHPAD_25C,
                setups: 0,
                conversions: 0,
                reconfigured: Vec::new(),
            }
        }
    }

    impl SensorBackend for Canned {
        fn setup(&mut self, _config: &SensorsConfig) -> ReadingResult<Probes> {
            self.setups += 1;
            Ok(Probes {
                internal: Some(ROM_A),
                external: None,
            })
        }

        fn configure_probe(&mut self, rom: RomCode) -> ReadingResult<()> {
            self.reconfigured.push(rom);
            // Same registers at 9 bits.
            self.scratchpad = SCRATCHPAD_25C_9_BITS;
            Ok(())
        }

        fn reference_voltage(&mut self) -> ReadingResult<u32> {
            Ok(5000)
        }

        fn sample_microvolts(&mut self, _sensor: AnalogSensor) -> ReadingResult<u32> {
            Ok(self.microvolts)
        }

        fn start_conversion(&mut self) -> ReadingResult<()> {
            self.conversions += 1;
            Ok(())
        }

        fn read_scratchpad(&mut self, _rom: RomCode) -> ReadingResult<Scratchpad> {
            Scratchpad::from_bytes(self.scratchpad).map_err(|_| ReadingError::Crc)
        }

        fn now(&mut self) -> Instant {
            Instant::from_ticks(self.now_ms)
        }
    }

    fn set_up() -> Sensors<Canned> {
        let mut sensors = Sensors::new(Canned::new(), SensorsConfig::new());
        sensors.setup().unwrap();
        sensors
    }

    #[test]
    fn test_reads_before_setup() {
        let mut sensors = Sensors::new(Canned::new(), SensorsConfig::new());

        assert_eq!(sensors.reference_voltage(), Err(ReadingError::NotSetUp));
        assert_eq!(
            sensors.internal_analog_temperature(),
            Err(ReadingError::NotSetUp)
        );
        assert_eq!(
            sensors.internal_digital_temperature(),
            Err(ReadingError::NotSetUp)
        );
        assert_eq!(sensors.request_conversion(), Err(ReadingError::NotSetUp));
        assert_eq!(sensors.supply_voltage(), Err(ReadingError::NotSetUp));
        assert_eq!(sensors.backend_mut().conversions, 0);
    }

    #[test]
    fn test_analog_temperature() {
        let mut sensors = set_up();
        assert_eq!(sensors.internal_analog_temperature(), Ok(250));

        sensors.backend_mut().microvolts = 174_000;
        assert_eq!(sensors.external_analog_temperature(), Ok(-400));
    }

    #[test]
    fn test_analog_temperature_out_of_range() {
        let mut sensors = set_up();
        sensors.backend_mut().microvolts = u32::MAX;
        assert_eq!(
            sensors.internal_analog_temperature(),
            Err(ReadingError::OutOfRange)
        );
    }

    #[test]
    fn test_supply_voltage() {
        let mut sensors = set_up();
        sensors.backend_mut().microvolts = 1_836_090;
        assert_eq!(sensors.supply_voltage(), Ok(7399));
    }

    #[test]
    fn test_conversion_lifecycle() {
        let mut sensors = set_up();

        assert_eq!(
            sensors.internal_digital_temperature(),
            Err(ReadingError::NotRequested)
        );

        sensors.backend_mut().now_ms = 1000;
        sensors.request_conversion().unwrap();
        assert_eq!(
            sensors.conversion_state(),
            ConversionState::Converting {
                started_at: Instant::from_ticks(1000),
                duration: Duration::millis(750),
            }
        );

        sensors.backend_mut().now_ms = 1749;
        assert_eq!(
            sensors.internal_digital_temperature(),
            Err(ReadingError::NotReady)
        );

        sensors.backend_mut().now_ms = 1750;
        assert_eq!(sensors.internal_digital_temperature(), Ok(250));
        assert_eq!(sensors.conversion_state(), ConversionState::Ready);

        // Stays ready until the next request.
        sensors.backend_mut().now_ms = 60_000;
        assert_eq!(sensors.internal_digital_temperature(), Ok(250));
    }

    #[test]
    fn test_conversion_time_follows_resolution() {
        let config = SensorsConfig::new().with_resolution(Resolution::Bits9);
        let mut sensors = Sensors::new(Canned::new(), config);
        sensors.setup().unwrap();

        sensors.request_conversion().unwrap();
        sensors.backend_mut().now_ms = 93;
        assert!(matches!(
            sensors.poll_conversion(),
            ConversionState::Converting { .. }
        ));

        sensors.backend_mut().now_ms = 94;
        assert_eq!(sensors.poll_conversion(), ConversionState::Ready);
    }

    #[test]
    fn test_missing_probe() {
        let mut sensors = set_up();
        sensors.request_conversion().unwrap();
        sensors.backend_mut().now_ms = 750;

        assert_eq!(
            sensors.external_digital_temperature(),
            Err(ReadingError::NotPresent)
        );
    }

    #[test]
    fn test_power_on_value() {
        let mut sensors = set_up();
        sensors.backend_mut().scratchpad = SCRATCHPAD_85C;
        sensors.request_conversion().unwrap();
        sensors.backend_mut().now_ms = 750;

        assert_eq!(
            sensors.internal_digital_temperature(),
            Err(ReadingError::PowerOnReset)
        );
    }

    #[test]
    fn test_corrupted_scratchpad() {
        let mut sensors = set_up();
        sensors.backend_mut().scratchpad[8] ^= 0x01;
        sensors.request_conversion().unwrap();
        sensors.backend_mut().now_ms = 750;

        assert_eq!(
            sensors.internal_digital_temperature(),
            Err(ReadingError::Crc)
        );
        assert_eq!(
            sensors.try_read(Channel::InternalDigitalTemperature),
            Err(ReadingError::Crc)
        );
    }

    #[test]
    fn test_lost_resolution_is_written_again() {
        let config = SensorsConfig::new().with_resolution(Resolution::Bits9);
        let mut sensors = Sensors::new(Canned::new(), config);
        sensors.setup().unwrap();

        // The probe still reports 12 bits: its last conversion outlasted the 9-bit wait.
        sensors.request_conversion().unwrap();
        sensors.backend_mut().now_ms = 94;
        assert_eq!(
            sensors.internal_digital_temperature(),
            Err(ReadingError::PowerOnReset)
        );
        assert_eq!(sensors.backend_mut().reconfigured, [ROM_A]);

        sensors.request_conversion().unwrap();
        sensors.backend_mut().now_ms = 188;
        assert_eq!(sensors.internal_digital_temperature(), Ok(250));
        assert_eq!(sensors.backend_mut().reconfigured.len(), 1);
    }

    #[test]
    fn test_setup_again_keeps_conversion() {
        let mut sensors = set_up();
        sensors.request_conversion().unwrap();
        let state = sensors.conversion_state();

        sensors.setup().unwrap();
        assert_eq!(sensors.conversion_state(), state);
        assert_eq!(sensors.backend_mut().setups, 2);
    }

    #[test]
    fn test_read_all() {
        let mut sensors = set_up();

        let readings = sensors.read_all();
        assert_eq!(readings.len(), Channel::ALL.len());

        let channels: Vec<_> = sensors.read_all().map(|(channel, _)| channel).collect();
        assert_eq!(channels, Channel::ALL);

        let mut readings = sensors.read_all();
        let (_, reference) = readings.next().unwrap();
        assert_eq!(reference.unwrap().value().get(), 5000);
        let (_, internal) = readings.next().unwrap();
        assert_eq!(internal.unwrap().value().get(), 250);
    }
}
