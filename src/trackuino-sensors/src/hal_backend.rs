use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
};
use trackuino_onewire::{Ds18b20, OneWire, RomCode, Scratchpad};

use crate::{
    adc::{self, AnalogChannel, AnalogInput, Reference},
    backend::{AnalogSensor, Probes, SensorBackend},
    conversion::{Clock, Instant},
    ReadingError, ReadingResult, SensorsConfig,
};

/// Maximum number of 1-Wire devices enumerated during setup.
const MAX_DEVICES: usize = 4;

// Alarm thresholds written along with the resolution, the DS18B20 power-on defaults.
const ALARM_HIGH: i8 = 75;
const ALARM_LOW: i8 = 70;

/// [`SensorBackend`] over `embedded-hal` peripherals.
///
/// - `A` is the ADC.
/// - `P` is the open-drain pin of the 1-Wire bus.
/// - `O` are the pins powering the LM60s, active high.
/// - `D` provides the delays of the 1-Wire bit timings and of the LM60 settling.
/// - `C` is the clock the conversion deadlines are measured with.
pub struct HalBackend<A, P, O, D, C> {
    adc: A,
    bus: OneWire<P>,
    internal_power: O,
    external_power: O,
    delay: D,
    clock: C,
    config: Option<SensorsConfig>,
}

impl<A, P, O, D, C> HalBackend<A, P, O, D, C>
where
    A: AnalogInput,
    P: InputPin + OutputPin,
    O: OutputPin,
    D: DelayNs,
    C: Clock,
{
    /// Creates a backend from its peripherals.
    ///
    /// Nothing is configured until [`SensorBackend::setup()`] is called.
    #[must_use]
    pub const fn new(
        adc: A,
        one_wire_pin: P,
        internal_power: O,
        external_power: O,
        delay: D,
        clock: C,
    ) -> Self {
        Self {
            adc,
            bus: OneWire::new(one_wire_pin),
            internal_power,
            external_power,
            delay,
            clock,
            config: None,
        }
    }

    fn config(&self) -> ReadingResult<SensorsConfig> {
        self.config.ok_or(ReadingError::NotSetUp)
    }

    fn resolve_probes(&mut self, config: &SensorsConfig) -> Probes {
        let configured = Probes {
            internal: config
                .internal_probe()
                .filter(|rom| Self::check_family(*rom)),
            external: config
                .external_probe()
                .filter(|rom| Self::check_family(*rom)),
        };
        if configured.internal.is_some() && configured.external.is_some() {
            return configured;
        }

        let found = match self.bus.discover::<MAX_DEVICES>(&mut self.delay) {
            Ok(found) => found,
            Err(err) => {
                let err = ReadingError::from(err);
                trackuino_log::warn!("1-Wire search failed: {:?}", err);
                return configured;
            }
        };

        let mut candidates = found.into_iter().filter(|rom| {
            Ds18b20::is_ds18b20(*rom)
                && configured.internal != Some(*rom)
                && configured.external != Some(*rom)
        });

        let mut probes = configured;
        if probes.internal.is_none() {
            probes.internal = candidates.next();
        }
        if probes.external.is_none() {
            probes.external = candidates.next();
        }
        probes
    }

    fn check_family(rom: RomCode) -> bool {
        let is_ds18b20 = Ds18b20::is_ds18b20(rom);
        if !is_ds18b20 {
            trackuino_log::warn!("ignoring configured probe {:?}: not a DS18B20", rom);
        }
        is_ds18b20
    }

    /// Discards a first conversion, lets the input settle, and converts again.
    fn settled_conversion(&mut self, channel: AnalogChannel, settle_ms: u32) -> ReadingResult<u16> {
        self.convert(channel)?;
        self.delay.delay_ms(settle_ms);
        self.convert(channel)
    }

    fn convert(&mut self, channel: AnalogChannel) -> ReadingResult<u16> {
        self.adc.convert(channel).map_err(|_| {
            trackuino_log::warn!("ADC conversion of {:?} failed", channel);
            ReadingError::Adc
        })
    }

    fn power_pin(&mut self, sensor: AnalogSensor) -> Option<&mut O> {
        match sensor {
            AnalogSensor::InternalLm60 => Some(&mut self.internal_power),
            AnalogSensor::ExternalLm60 => Some(&mut self.external_power),
            AnalogSensor::Supply => None,
        }
    }

    fn set_power(&mut self, sensor: AnalogSensor, on: bool) -> ReadingResult<()> {
        let Some(pin) = self.power_pin(sensor) else {
            return Ok(());
        };
        let result = if on { pin.set_high() } else { pin.set_low() };
        result.map_err(|_| ReadingError::Pin)
    }
}

impl<A, P, O, D, C> SensorBackend for HalBackend<A, P, O, D, C>
where
    A: AnalogInput,
    P: InputPin + OutputPin,
    O: OutputPin,
    D: DelayNs,
    C: Clock,
{
    fn setup(&mut self, config: &SensorsConfig) -> ReadingResult<Probes> {
        self.internal_power
            .set_low()
            .map_err(|_| ReadingError::Pin)?;
        self.external_power
            .set_low()
            .map_err(|_| ReadingError::Pin)?;

        let reference = config.reference();
        self.adc.set_reference(reference).map_err(|_| {
            trackuino_log::error!("could not select ADC reference {:?}", reference);
            ReadingError::Adc
        })?;
        self.config = Some(*config);

        let mut probes = self.resolve_probes(config);
        // A probe left at another resolution would be read before its conversion completes.
        for probe in [&mut probes.internal, &mut probes.external] {
            if let Some(rom) = *probe {
                if self.configure_probe(rom).is_err() {
                    *probe = None;
                }
            }
        }

        Ok(probes)
    }

    fn configure_probe(&mut self, rom: RomCode) -> ReadingResult<()> {
        let config = self.config()?;
        Ds18b20::new(rom)
            .configure(
                &mut self.bus,
                &mut self.delay,
                config.resolution(),
                ALARM_HIGH,
                ALARM_LOW,
            )
            .map_err(|err| {
                let err = ReadingError::from(err);
                trackuino_log::warn!("could not configure {:?}: {:?}", rom, err);
                err
            })
    }

    fn reference_voltage(&mut self) -> ReadingResult<u32> {
        let config = self.config()?;

        match config.reference() {
            Reference::AVcc => {
                let count = self.settled_conversion(AnalogChannel::Bandgap, config.settle_ms())?;
                adc::avcc_from_bandgap(count).ok_or_else(|| {
                    trackuino_log::warn!("bandgap conversion returned 0");
                    ReadingError::Adc
                })
            }
            Reference::Internal1V1 => Ok(adc::BANDGAP_MV),
            Reference::External { millivolts } => Ok(u32::from(millivolts)),
        }
    }

    fn sample_microvolts(&mut self, sensor: AnalogSensor) -> ReadingResult<u32> {
        let config = self.config()?;
        let reference_mv = self.reference_voltage()?;

        let pins = config.pins();
        let pin = match sensor {
            AnalogSensor::InternalLm60 => pins.internal_lm60,
            AnalogSensor::ExternalLm60 => pins.external_lm60,
            AnalogSensor::Supply => pins.supply,
        };

        self.set_power(sensor, true)?;
        let sample = self.settled_conversion(AnalogChannel::Pin(pin), config.settle_ms());
        // Powered off even when the conversion failed.
        let powered_off = self.set_power(sensor, false);
        let count = sample?;
        powered_off?;

        trackuino_log::trace!("{:?}: {} counts", sensor, count);
        Ok(adc::counts_to_microvolts(count, reference_mv))
    }

    fn start_conversion(&mut self) -> ReadingResult<()> {
        Ds18b20::start_conversion_all(&mut self.bus, &mut self.delay).map_err(|err| {
            let err = ReadingError::from(err);
            trackuino_log::warn!("could not start temperature conversion: {:?}", err);
            err
        })
    }

    fn read_scratchpad(&mut self, rom: RomCode) -> ReadingResult<Scratchpad> {
        Ds18b20::new(rom)
            .read_scratchpad(&mut self.bus, &mut self.delay)
            .map_err(ReadingError::from)
    }

    fn now(&mut self) -> Instant {
        self.clock.now()
    }
}

#[cfg(test)]
mod tests {
    use trackuino_onewire::sim::SimDs18b20;

    use super::*;
    use crate::{arch::SimHardware, Resolution};

    const ROM_A: RomCode = RomCode::from_u64(0x7704_1691_3A4C_FF28);
    const ROM_B: RomCode = RomCode::from_u64(0x272F_7C3C_1264_6128);

    fn configured() -> SensorsConfig {
        SensorsConfig::new()
            .with_resolution(Resolution::Bits9)
            .with_internal_probe(ROM_B)
            .with_external_probe(ROM_A)
    }

    #[test]
    fn test_setup_configures_probes() {
        let config = configured();
        let hardware = SimHardware::new(
            &config,
            [Some(SimDs18b20::new(ROM_A)), Some(SimDs18b20::new(ROM_B))],
        );
        let mut backend = hardware.backend();

        let probes = backend.setup(&config).unwrap();
        assert_eq!(probes.internal, Some(ROM_B));
        assert_eq!(probes.external, Some(ROM_A));
        for index in 0..2 {
            assert_eq!(
                hardware.bus().with_device(index, |device| device.resolution()),
                Some(Resolution::Bits9)
            );
        }
    }

    #[test]
    fn test_unconfigured_probes_are_dropped() {
        let config = configured();
        let hardware = SimHardware::new(
            &config,
            [Some(SimDs18b20::new(ROM_A)), Some(SimDs18b20::new(ROM_B))],
        );
        let mut backend = hardware.backend();

        hardware.bus().short_to_ground(true);
        assert_eq!(backend.setup(&config), Ok(Probes::default()));
        assert_eq!(
            hardware.bus().with_device(0, |device| device.resolution()),
            Some(Resolution::Bits12)
        );
    }

    #[test]
    fn test_configure_probe_before_setup() {
        let config = configured();
        let hardware = SimHardware::new(&config, [Some(SimDs18b20::new(ROM_A)), None]);
        let mut backend = hardware.backend();

        assert_eq!(backend.configure_probe(ROM_A), Err(ReadingError::NotSetUp));
    }
}
