//! Simulated sensor hardware.
//!
//! [`SimHardware`] models a board with the two LM60s, the supply divider and a 1-Wire bus with
//! up to two DS18B20s, wired as described by a [`SensorsConfig`]. Time only advances through the
//! delays of the backend and [`SimHardware::advance_ms()`].

use core::{cell::RefCell, convert::Infallible};

use embedded_hal::digital::{ErrorType, OutputPin};
use trackuino_onewire::sim::{SimBus, SimDelay, SimDs18b20, SimPin};

use crate::{
    adc::{self, AnalogChannel, AnalogInput, Reference},
    backend::AnalogSensor,
    conversion::{Clock, Instant},
    lm60, HalBackend, SensorsConfig,
};

/// Name of the platform.
pub const PLATFORM: &str = "dummy";

/// Count returned by the first conversion after the reference or the input changed.
const UNSETTLED_COUNT: u16 = 1023;

/// [`HalBackend`] wired to [`SimHardware`].
pub type SimulatedBackend<'a> =
    HalBackend<Adc<'a>, SimPin<'a, 2>, SimPowerPin<'a>, SimDelay<'a, 2>, SimClock<'a>>;

/// Error injected into the simulated ADC.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SimAdcError;

struct AnalogState {
    pins: crate::AnalogPins,
    divider: (u32, u32),
    avcc_mv: u32,
    internal_lm60: i16,
    external_lm60: i16,
    supply_mv: u32,
    internal_powered: bool,
    external_powered: bool,
    reference: Reference,
    last_channel: Option<AnalogChannel>,
    raw_counts: [Option<u16>; 8],
    failing: bool,
}

impl AnalogState {
    fn reference_mv(&self) -> u32 {
        match self.reference {
            Reference::AVcc => self.avcc_mv,
            Reference::Internal1V1 => adc::BANDGAP_MV,
            Reference::External { millivolts } => u32::from(millivolts),
        }
    }

    fn input_microvolts(&self, pin: u8) -> u32 {
        let lm60_output = |powered: bool, decicelsius: i16| {
            if powered {
                lm60::microvolts_from_decicelsius(decicelsius)
            } else {
                0
            }
        };

        if pin == self.pins.internal_lm60 {
            lm60_output(self.internal_powered, self.internal_lm60)
        } else if pin == self.pins.external_lm60 {
            lm60_output(self.external_powered, self.external_lm60)
        } else if pin == self.pins.supply {
            let (top, bottom) = self.divider;
            let microvolts = u64::from(self.supply_mv) * 1000 * u64::from(bottom)
                / (u64::from(top) + u64::from(bottom));
            u32::try_from(microvolts).unwrap_or(u32::MAX)
        } else {
            0
        }
    }

    fn convert(&mut self, channel: AnalogChannel) -> u16 {
        let settled = self.last_channel == Some(channel);
        self.last_channel = Some(channel);
        if !settled {
            return UNSETTLED_COUNT;
        }

        let microvolts = match channel {
            AnalogChannel::Pin(pin) => {
                if let Some(count) = self.raw_counts.get(usize::from(pin)).copied().flatten() {
                    return count;
                }
                self.input_microvolts(pin)
            }
            AnalogChannel::Bandgap => adc::BANDGAP_MV * 1000,
        };

        let reference_uv = u64::from(self.reference_mv()) * 1000;
        if reference_uv == 0 {
            return UNSETTLED_COUNT;
        }
        let count = u64::from(microvolts) * u64::from(adc::ADC_STEPS) / reference_uv;
        u16::try_from(count.min(1023)).unwrap_or(UNSETTLED_COUNT)
    }
}

/// Simulated board.
pub struct SimHardware {
    bus: SimBus<2>,
    analog: RefCell<AnalogState>,
}

impl SimHardware {
    /// Creates a board wired as described by `config`, at 20 °C, powered at 5 V from a 7.4 V
    /// battery.
    #[must_use]
    pub fn new(config: &SensorsConfig, probes: [Option<SimDs18b20>; 2]) -> Self {
        Self {
            bus: SimBus::new(probes),
            analog: RefCell::new(AnalogState {
                pins: config.pins(),
                divider: config.divider(),
                avcc_mv: 5000,
                internal_lm60: 200,
                external_lm60: 200,
                supply_mv: 7400,
                internal_powered: false,
                external_powered: false,
                reference: Reference::AVcc,
                last_channel: None,
                raw_counts: [None; 8],
                failing: false,
            }),
        }
    }

    /// Returns a backend driving this board.
    #[must_use]
    pub fn backend(&self) -> SimulatedBackend<'_> {
        HalBackend::new(
            Adc { hardware: self },
            self.bus.pin(),
            SimPowerPin {
                hardware: self,
                sensor: AnalogSensor::InternalLm60,
            },
            SimPowerPin {
                hardware: self,
                sensor: AnalogSensor::ExternalLm60,
            },
            self.bus.delay(),
            SimClock { hardware: self },
        )
    }

    /// Returns the 1-Wire line.
    #[must_use]
    pub fn bus(&self) -> &SimBus<2> {
        &self.bus
    }

    /// Advances the simulated clock.
    pub fn advance_ms(&self, ms: u64) {
        self.bus.advance_ns(ms * 1_000_000);
    }

    /// Sets the voltage of `AVcc`.
    pub fn set_avcc_mv(&self, millivolts: u32) {
        self.analog.borrow_mut().avcc_mv = millivolts;
    }

    /// Sets the temperature of an LM60, in tenths of a degree Celsius.
    ///
    /// [`AnalogSensor::Supply`] is ignored.
    pub fn set_lm60_decicelsius(&self, sensor: AnalogSensor, decicelsius: i16) {
        let mut analog = self.analog.borrow_mut();
        match sensor {
            AnalogSensor::InternalLm60 => analog.internal_lm60 = decicelsius,
            AnalogSensor::ExternalLm60 => analog.external_lm60 = decicelsius,
            AnalogSensor::Supply => {}
        }
    }

    /// Sets the supply voltage, before the divider.
    pub fn set_supply_mv(&self, millivolts: u32) {
        self.analog.borrow_mut().supply_mv = millivolts;
    }

    /// Forces the settled count of an analog input pin, or restores the simulated input.
    pub fn set_raw_count(&self, pin: u8, count: Option<u16>) {
        if let Some(slot) = self.analog.borrow_mut().raw_counts.get_mut(usize::from(pin)) {
            *slot = count;
        }
    }

    /// Makes every subsequent ADC operation fail, or work again.
    pub fn set_adc_failing(&self, failing: bool) {
        self.analog.borrow_mut().failing = failing;
    }

    /// Returns whether an LM60 is powered.
    #[must_use]
    pub fn is_powered(&self, sensor: AnalogSensor) -> bool {
        let analog = self.analog.borrow();
        match sensor {
            AnalogSensor::InternalLm60 => analog.internal_powered,
            AnalogSensor::ExternalLm60 => analog.external_powered,
            AnalogSensor::Supply => true,
        }
    }
}

/// Simulated ADC.
pub struct Adc<'a> {
    hardware: &'a SimHardware,
}

impl AnalogInput for Adc<'_> {
    type Error = SimAdcError;

    fn set_reference(&mut self, reference: Reference) -> Result<(), Self::Error> {
        let mut analog = self.hardware.analog.borrow_mut();
        if analog.failing {
            return Err(SimAdcError);
        }
        if analog.reference != reference {
            analog.reference = reference;
            analog.last_channel = None;
        }
        Ok(())
    }

    fn convert(&mut self, channel: AnalogChannel) -> Result<u16, Self::Error> {
        let mut analog = self.hardware.analog.borrow_mut();
        if analog.failing {
            return Err(SimAdcError);
        }
        Ok(analog.convert(channel))
    }
}

/// Simulated pin powering an LM60.
pub struct SimPowerPin<'a> {
    hardware: &'a SimHardware,
    sensor: AnalogSensor,
}

impl SimPowerPin<'_> {
    fn set(&mut self, powered: bool) {
        let mut analog = self.hardware.analog.borrow_mut();
        match self.sensor {
            AnalogSensor::InternalLm60 => analog.internal_powered = powered,
            AnalogSensor::ExternalLm60 => analog.external_powered = powered,
            AnalogSensor::Supply => {}
        }
    }
}

impl ErrorType for SimPowerPin<'_> {
    type Error = Infallible;
}

impl OutputPin for SimPowerPin<'_> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set(true);
        Ok(())
    }
}

/// Millisecond clock of the simulation.
pub struct SimClock<'a> {
    hardware: &'a SimHardware,
}

impl Clock for SimClock<'_> {
    fn now(&mut self) -> Instant {
        Instant::from_ticks(self.hardware.bus.now_us() / 1000)
    }
}
