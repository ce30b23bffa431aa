//! DS18B20 digital thermometer.
//!
//! A temperature measurement is a two-phase operation: [`Ds18b20::start_conversion_all()`] (or
//! [`Ds18b20::start_conversion()`]) starts the conversion, and the result can be read with
//! [`Ds18b20::read_scratchpad()`] once [`Resolution::conversion_time_us()`] has elapsed.
//! Reading earlier returns the previous measurement.

use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
};

use crate::{crc, Error, OneWire, RomCode};

/// Family code of the DS18B20.
pub const FAMILY_CODE: u8 = 0x28;

/// Function command: starts a temperature conversion.
pub const CONVERT_T: u8 = 0x44;
/// Function command: writes the TH, TL and configuration registers.
pub const WRITE_SCRATCHPAD: u8 = 0x4E;
/// Function command: reads the 9-byte scratchpad.
pub const READ_SCRATCHPAD: u8 = 0xBE;

/// Raw temperature held by the scratchpad after power-on, 85 °C.
pub const POWER_ON_RAW_TEMPERATURE: i16 = 0x0550;

/// Length of the scratchpad, CRC included.
pub const SCRATCHPAD_LEN: usize = 9;

/// Measurement resolution.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Resolution {
    /// 0.5 °C, 93.75 ms.
    Bits9,
    /// 0.25 °C, 187.5 ms.
    Bits10,
    /// 0.125 °C, 375 ms.
    Bits11,
    /// 0.0625 °C, 750 ms. Power-on default.
    Bits12,
}

impl Resolution {
    /// Returns the resolution with the given number of bits, if supported.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            9 => Some(Self::Bits9),
            10 => Some(Self::Bits10),
            11 => Some(Self::Bits11),
            12 => Some(Self::Bits12),
            _ => None,
        }
    }

    /// Returns the number of bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        match self {
            Self::Bits9 => 9,
            Self::Bits10 => 10,
            Self::Bits11 => 11,
            Self::Bits12 => 12,
        }
    }

    /// Decodes the configuration register.
    #[must_use]
    pub const fn from_config_register(config: u8) -> Self {
        match (config >> 5) & 0b11 {
            0b00 => Self::Bits9,
            0b01 => Self::Bits10,
            0b10 => Self::Bits11,
            _ => Self::Bits12,
        }
    }

    /// Encodes the configuration register.
    #[must_use]
    pub const fn config_register(self) -> u8 {
        ((self.bits() - 9) << 5) | 0x1F
    }

    /// Maximum conversion time, in microseconds.
    #[must_use]
    pub const fn conversion_time_us(self) -> u32 {
        750_000 >> (12 - self.bits())
    }

    /// Maximum conversion time, in milliseconds, rounded up.
    #[must_use]
    pub const fn conversion_time_ms(self) -> u32 {
        self.conversion_time_us().div_ceil(1000)
    }

    /// Mask of the defined bits of the raw temperature.
    const fn mask(self) -> i16 {
        !((1 << (12 - self.bits())) - 1)
    }
}

/// Content of the DS18B20 scratchpad.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Scratchpad {
    bytes: [u8; SCRATCHPAD_LEN],
}

impl Scratchpad {
    /// Parses the scratchpad as read from the bus, checking its CRC.
    ///
    /// # Errors
    ///
    /// Returns the received and computed CRCs if they differ.
    pub fn from_bytes(bytes: [u8; SCRATCHPAD_LEN]) -> Result<Self, (u8, u8)> {
        crc::check(&bytes)?;
        Ok(Self { bytes })
    }

    /// Returns the raw bytes, CRC included.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; SCRATCHPAD_LEN] {
        &self.bytes
    }

    /// Returns the raw temperature in sixteenths of a degree Celsius, with the bits left
    /// undefined by the resolution cleared.
    #[must_use]
    pub const fn raw_temperature(&self) -> i16 {
        let [lsb, msb, ..] = self.bytes;
        i16::from_le_bytes([lsb, msb]) & self.resolution().mask()
    }

    /// Returns the temperature in tenths of a degree Celsius, rounded toward negative infinity.
    #[must_use]
    pub const fn temperature_decicelsius(&self) -> i16 {
        raw_to_decicelsius(self.raw_temperature())
    }

    /// Returns the high alarm threshold register (TH), in degrees Celsius.
    #[must_use]
    pub const fn alarm_high(&self) -> i8 {
        i8::from_ne_bytes([self.bytes[2]])
    }

    /// Returns the low alarm threshold register (TL), in degrees Celsius.
    #[must_use]
    pub const fn alarm_low(&self) -> i8 {
        i8::from_ne_bytes([self.bytes[3]])
    }

    /// Returns the configured resolution.
    #[must_use]
    pub const fn resolution(&self) -> Resolution {
        Resolution::from_config_register(self.bytes[4])
    }

    /// Returns whether the temperature register still holds its power-on value.
    ///
    /// This happens when no conversion completed since the device was powered, for instance
    /// because it reset during the conversion.
    #[must_use]
    pub const fn is_power_on_value(&self) -> bool {
        self.raw_temperature() == POWER_ON_RAW_TEMPERATURE
    }
}

/// Converts a raw temperature in sixteenths of a degree to tenths of a degree Celsius.
#[must_use]
pub const fn raw_to_decicelsius(raw: i16) -> i16 {
    // |raw| * 10 / 16 < |raw|, the result always fits.
    #[expect(clippy::cast_possible_truncation)]
    let decicelsius = ((raw as i32 * 10) >> 4) as i16;
    decicelsius
}

/// A DS18B20 on a 1-Wire bus, addressed by its ROM code.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ds18b20 {
    rom: RomCode,
}

impl Ds18b20 {
    /// Wraps the device with the given ROM code.
    #[must_use]
    pub const fn new(rom: RomCode) -> Self {
        Self { rom }
    }

    /// Returns whether the ROM code belongs to a DS18B20.
    #[must_use]
    pub const fn is_ds18b20(rom: RomCode) -> bool {
        rom.family() == FAMILY_CODE
    }

    /// Returns the ROM code of the device.
    #[must_use]
    pub const fn rom(&self) -> RomCode {
        self.rom
    }

    /// Starts a conversion on every device on the bus at once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoPresence`] if no device answered the reset.
    pub fn start_conversion_all<P, E>(
        bus: &mut OneWire<P>,
        delay: &mut impl DelayNs,
    ) -> Result<(), Error<E>>
    where
        P: InputPin<Error = E> + OutputPin<Error = E>,
    {
        bus.skip_rom(delay)?;
        bus.write_byte(delay, CONVERT_T)
    }

    /// Starts a conversion on this device only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoPresence`] if no device answered the reset.
    pub fn start_conversion<P, E>(
        &self,
        bus: &mut OneWire<P>,
        delay: &mut impl DelayNs,
    ) -> Result<(), Error<E>>
    where
        P: InputPin<Error = E> + OutputPin<Error = E>,
    {
        bus.match_rom(delay, self.rom)?;
        bus.write_byte(delay, CONVERT_T)
    }

    /// Reads the scratchpad, holding the result of the last completed conversion.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoPresence`] if no device answered the reset or the data slots, or
    /// [`Error::Crc`] if the scratchpad is corrupted.
    pub fn read_scratchpad<P, E>(
        &self,
        bus: &mut OneWire<P>,
        delay: &mut impl DelayNs,
    ) -> Result<Scratchpad, Error<E>>
    where
        P: InputPin<Error = E> + OutputPin<Error = E>,
    {
        bus.match_rom(delay, self.rom)?;
        bus.write_byte(delay, READ_SCRATCHPAD)?;

        let mut bytes = [0; SCRATCHPAD_LEN];
        bus.read_bytes(delay, &mut bytes)?;
        // Released line: another device answered the reset, this one is gone.
        if bytes == [0xFF; SCRATCHPAD_LEN] {
            trackuino_log::warn!("{:?} did not answer", self.rom);
            return Err(Error::NoPresence);
        }

        Scratchpad::from_bytes(bytes).map_err(|(received, computed)| {
            trackuino_log::warn!("scratchpad CRC mismatch for {:?}", self.rom);
            Error::Crc { received, computed }
        })
    }

    /// Writes the alarm thresholds and the resolution.
    ///
    /// The registers are volatile: they revert to the EEPROM content on power-on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoPresence`] if no device answered the reset.
    pub fn configure<P, E>(
        &self,
        bus: &mut OneWire<P>,
        delay: &mut impl DelayNs,
        resolution: Resolution,
        alarm_high: i8,
        alarm_low: i8,
    ) -> Result<(), Error<E>>
    where
        P: InputPin<Error = E> + OutputPin<Error = E>,
    {
        bus.match_rom(delay, self.rom)?;
        bus.write_byte(delay, WRITE_SCRATCHPAD)?;
        let [high] = alarm_high.to_ne_bytes();
        let [low] = alarm_low.to_ne_bytes();
        bus.write_bytes(delay, &[high, low, resolution.config_register()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimBus, SimDs18b20};

    const ROM_A: RomCode = RomCode::from_u64(0x7704_1691_3A4C_FF28);
    const ROM_B: RomCode = RomCode::from_u64(0x272F_7C3C_1264_6128);

    #[test]
    fn test_resolution_registers() {
        assert_eq!(Resolution::Bits9.config_register(), 0x1F);
        assert_eq!(Resolution::Bits10.config_register(), 0x3F);
        assert_eq!(Resolution::Bits11.config_register(), 0x5F);
        assert_eq!(Resolution::Bits12.config_register(), 0x7F);

        for bits in 9..=12 {
            let resolution = Resolution::from_bits(bits).unwrap();
            assert_eq!(
                Resolution::from_config_register(resolution.config_register()),
                resolution
            );
        }
        assert_eq!(Resolution::from_bits(8), None);
    }

    #[test]
    fn test_conversion_times() {
        assert_eq!(Resolution::Bits9.conversion_time_us(), 93_750);
        assert_eq!(Resolution::Bits9.conversion_time_ms(), 94);
        assert_eq!(Resolution::Bits10.conversion_time_ms(), 188);
        assert_eq!(Resolution::Bits11.conversion_time_ms(), 375);
        assert_eq!(Resolution::Bits12.conversion_time_ms(), 750);
    }

    #[test]
    fn test_raw_to_decicelsius_datasheet_values() {
        // Table 1 of the datasheet.
        assert_eq!(raw_to_decicelsius(0x07D0), 1250);
        assert_eq!(raw_to_decicelsius(0x0550), 850);
        assert_eq!(raw_to_decicelsius(0x0191), 250);
        assert_eq!(raw_to_decicelsius(0x00A2), 101);
        assert_eq!(raw_to_decicelsius(0x0008), 5);
        assert_eq!(raw_to_decicelsius(0x0000), 0);
        assert_eq!(raw_to_decicelsius(0xFFF8_u16 as i16), -5);
        assert_eq!(raw_to_decicelsius(0xFF5E_u16 as i16), -102);
        assert_eq!(raw_to_decicelsius(0xFE6F_u16 as i16), -251);
        assert_eq!(raw_to_decicelsius(0xFC90_u16 as i16), -550);
    }

    #[test]
    fn test_scratchpad_decoding() {
        let scratchpad =
            Scratchpad::from_bytes([0x91, 0x01, 0x4B, 0x46, 0x7F, 0xFF, 0x0C, 0x10, 0x70])
                .unwrap();

        assert_eq!(scratchpad.raw_temperature(), 0x0191);
        assert_eq!(scratchpad.temperature_decicelsius(), 250);
        assert_eq!(scratchpad.alarm_high(), 75);
        assert_eq!(scratchpad.alarm_low(), 70);
        assert_eq!(scratchpad.resolution(), Resolution::Bits12);
        assert!(!scratchpad.is_power_on_value());
    }

    #[test]
    fn test_scratchpad_power_on_value() {
        let scratchpad =
            Scratchpad::from_bytes([0x50, 0x05, 0x4B, 0x46, 0x7F, 0xFF, 0x0C, 0x10, 0x1C])
                .unwrap();
        assert!(scratchpad.is_power_on_value());
    }

    #[test]
    fn test_scratchpad_bad_crc() {
        assert!(
            Scratchpad::from_bytes([0x91, 0x01, 0x4B, 0x46, 0x7F, 0xFF, 0x0C, 0x10, 0x71]).is_err()
        );
    }

    #[test]
    fn test_convert_and_read() {
        let sim = SimBus::new([Some(SimDs18b20::new(ROM_A)), None]);
        sim.with_device(0, |device| device.set_raw_temperature(0xFF5E_u16 as i16));
        let mut bus = OneWire::new(sim.pin());
        let mut delay = sim.delay();
        let device = Ds18b20::new(ROM_A);

        // Nothing converted yet.
        let scratchpad = device.read_scratchpad(&mut bus, &mut delay).unwrap();
        assert!(scratchpad.is_power_on_value());

        Ds18b20::start_conversion_all(&mut bus, &mut delay).unwrap();
        delay.delay_ms(Resolution::Bits12.conversion_time_ms());

        let scratchpad = device.read_scratchpad(&mut bus, &mut delay).unwrap();
        assert_eq!(scratchpad.temperature_decicelsius(), -102);
    }

    #[test]
    fn test_read_before_conversion_completes_returns_previous_value() {
        let sim = SimBus::new([Some(SimDs18b20::new(ROM_A)), None]);
        sim.with_device(0, |device| device.set_raw_temperature(0x0191));
        let mut bus = OneWire::new(sim.pin());
        let mut delay = sim.delay();
        let device = Ds18b20::new(ROM_A);

        device.start_conversion(&mut bus, &mut delay).unwrap();
        delay.delay_ms(100);

        let scratchpad = device.read_scratchpad(&mut bus, &mut delay).unwrap();
        assert!(scratchpad.is_power_on_value());
    }

    #[test]
    fn test_configure_resolution_masks_undefined_bits() {
        let sim = SimBus::new([Some(SimDs18b20::new(ROM_A)), Some(SimDs18b20::new(ROM_B))]);
        // 25.0625 °C, the last bit is not defined at 11 bits.
        sim.with_device(1, |device| device.set_raw_temperature(0x0191));
        let mut bus = OneWire::new(sim.pin());
        let mut delay = sim.delay();
        let device = Ds18b20::new(ROM_B);

        device
            .configure(&mut bus, &mut delay, Resolution::Bits11, 60, -10)
            .unwrap();
        device.start_conversion(&mut bus, &mut delay).unwrap();
        delay.delay_ms(Resolution::Bits11.conversion_time_ms());

        let scratchpad = device.read_scratchpad(&mut bus, &mut delay).unwrap();
        assert_eq!(scratchpad.resolution(), Resolution::Bits11);
        assert_eq!(scratchpad.alarm_high(), 60);
        assert_eq!(scratchpad.alarm_low(), -10);
        assert_eq!(scratchpad.raw_temperature(), 0x0190);
        assert_eq!(scratchpad.temperature_decicelsius(), 250);
    }

    #[test]
    fn test_read_absent_device() {
        let sim = SimBus::new([Some(SimDs18b20::new(ROM_A)), None]);
        let mut bus = OneWire::new(sim.pin());

        // ROM_A answers the presence pulse, but nobody drives the data slots.
        let result = Ds18b20::new(ROM_B).read_scratchpad(&mut bus, &mut sim.delay());
        assert_eq!(result, Err(Error::NoPresence));
    }
}
