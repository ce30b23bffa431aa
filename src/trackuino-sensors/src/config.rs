//! Configuration of the sensors.
//!
//! Defaults are read from the following environment variables at build time:
//!
//! | Variable | Default | |
//! |---|---|---|
//! | `CONFIG_SENSORS_VIN_DIVIDER_TOP_OHMS` | 10000 | Resistor between the supply and the ADC input |
//! | `CONFIG_SENSORS_VIN_DIVIDER_BOTTOM_OHMS` | 3300 | Resistor between the ADC input and ground |
//! | `CONFIG_SENSORS_DS18B20_RESOLUTION` | 12 | DS18B20 resolution, in bits |
//! | `CONFIG_SENSORS_EXTERNAL_AREF_MV` | 0 | Voltage applied to AREF, 0 to use `AVcc` |
//! | `CONFIG_SENSORS_LM60_SETTLE_MS` | 10 | Settling time after powering an LM60 |

use trackuino_onewire::{Resolution, RomCode};

use crate::adc::Reference;

const VIN_DIVIDER_TOP_OHMS: u32 =
    trackuino_utils::u32_from_env_or!("CONFIG_SENSORS_VIN_DIVIDER_TOP_OHMS", 10_000);
const VIN_DIVIDER_BOTTOM_OHMS: u32 =
    trackuino_utils::u32_from_env_or!("CONFIG_SENSORS_VIN_DIVIDER_BOTTOM_OHMS", 3300);
const DS18B20_RESOLUTION_BITS: u8 =
    trackuino_utils::u8_from_env_or!("CONFIG_SENSORS_DS18B20_RESOLUTION", 12);
const EXTERNAL_AREF_MV: u16 =
    trackuino_utils::u16_from_env_or!("CONFIG_SENSORS_EXTERNAL_AREF_MV", 0);
const LM60_SETTLE_MS: u32 = trackuino_utils::u32_from_env_or!("CONFIG_SENSORS_LM60_SETTLE_MS", 10);

const DS18B20_RESOLUTION: Resolution = match Resolution::from_bits(DS18B20_RESOLUTION_BITS) {
    Some(resolution) => resolution,
    None => trackuino_utils::env::const_panic::concat_panic!(
        "CONFIG_SENSORS_DS18B20_RESOLUTION must be between 9 and 12, got ",
        DS18B20_RESOLUTION_BITS,
    ),
};

const _: () = assert!(
    VIN_DIVIDER_BOTTOM_OHMS > 0,
    "CONFIG_SENSORS_VIN_DIVIDER_BOTTOM_OHMS must not be zero"
);

/// ADC input pins the analog sensors are wired to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AnalogPins {
    /// Output of the internal LM60.
    pub internal_lm60: u8,
    /// Output of the external LM60.
    pub external_lm60: u8,
    /// Middle of the supply divider.
    pub supply: u8,
}

/// Configuration of [`Sensors`](crate::Sensors).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorsConfig {
    reference: Reference,
    pins: AnalogPins,
    divider_top_ohms: u32,
    divider_bottom_ohms: u32,
    resolution: Resolution,
    settle_ms: u32,
    internal_probe: Option<RomCode>,
    external_probe: Option<RomCode>,
}

impl SensorsConfig {
    /// Returns the configuration given by the build environment.
    #[must_use]
    pub const fn new() -> Self {
        let reference = if EXTERNAL_AREF_MV == 0 {
            Reference::AVcc
        } else {
            Reference::External {
                millivolts: EXTERNAL_AREF_MV,
            }
        };

        Self {
            reference,
            pins: AnalogPins {
                internal_lm60: 0,
                external_lm60: 1,
                supply: 2,
            },
            divider_top_ohms: VIN_DIVIDER_TOP_OHMS,
            divider_bottom_ohms: VIN_DIVIDER_BOTTOM_OHMS,
            resolution: DS18B20_RESOLUTION,
            settle_ms: LM60_SETTLE_MS,
            internal_probe: None,
            external_probe: None,
        }
    }

    /// Sets the ADC reference.
    #[must_use]
    pub const fn with_reference(mut self, reference: Reference) -> Self {
        self.reference = reference;
        self
    }

    /// Sets the ADC inputs of the analog sensors.
    #[must_use]
    pub const fn with_pins(mut self, pins: AnalogPins) -> Self {
        self.pins = pins;
        self
    }

    /// Sets the resistors of the supply divider.
    ///
    /// # Panics
    ///
    /// Panics if `bottom_ohms` is zero.
    #[must_use]
    pub const fn with_divider(mut self, top_ohms: u32, bottom_ohms: u32) -> Self {
        assert!(bottom_ohms > 0, "the bottom resistor cannot be zero");
        self.divider_top_ohms = top_ohms;
        self.divider_bottom_ohms = bottom_ohms;
        self
    }

    /// Sets the DS18B20 resolution.
    #[must_use]
    pub const fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    /// Sets the settling time of the LM60s.
    #[must_use]
    pub const fn with_settle_ms(mut self, settle_ms: u32) -> Self {
        self.settle_ms = settle_ms;
        self
    }

    /// Sets the ROM code of the internal DS18B20 instead of discovering it.
    #[must_use]
    pub const fn with_internal_probe(mut self, rom: RomCode) -> Self {
        self.internal_probe = Some(rom);
        self
    }

    /// Sets the ROM code of the external DS18B20 instead of discovering it.
    #[must_use]
    pub const fn with_external_probe(mut self, rom: RomCode) -> Self {
        self.external_probe = Some(rom);
        self
    }

    /// Returns the ADC reference.
    #[must_use]
    pub const fn reference(&self) -> Reference {
        self.reference
    }

    /// Returns the ADC inputs of the analog sensors.
    #[must_use]
    pub const fn pins(&self) -> AnalogPins {
        self.pins
    }

    /// Returns the top and bottom resistors of the supply divider, in ohms.
    #[must_use]
    pub const fn divider(&self) -> (u32, u32) {
        (self.divider_top_ohms, self.divider_bottom_ohms)
    }

    /// Returns the DS18B20 resolution.
    #[must_use]
    pub const fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Returns the settling time of the LM60s, in milliseconds.
    #[must_use]
    pub const fn settle_ms(&self) -> u32 {
        self.settle_ms
    }

    /// Returns the configured ROM code of the internal DS18B20.
    #[must_use]
    pub const fn internal_probe(&self) -> Option<RomCode> {
        self.internal_probe
    }

    /// Returns the configured ROM code of the external DS18B20.
    #[must_use]
    pub const fn external_probe(&self) -> Option<RomCode> {
        self.external_probe
    }

    /// Scales the voltage at the middle of the divider back to the supply voltage, in
    /// microvolts.
    #[must_use]
    pub const fn undivide(&self, microvolts: u32) -> u64 {
        microvolts as u64 * (self.divider_top_ohms as u64 + self.divider_bottom_ohms as u64)
            / self.divider_bottom_ohms as u64
    }
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self::new()
    }
}
