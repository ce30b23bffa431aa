use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
};
use heapless::Vec;

use crate::{Error, RomCode, RomSearch, MATCH_ROM, READ_ROM, SEARCH_ROM, SKIP_ROM};

// Standard-speed timings, in microseconds.
const RESET_LOW_US: u32 = 480;
const PRESENCE_SAMPLE_US: u32 = 70;
const PRESENCE_END_US: u32 = 410;
const WRITE_1_LOW_US: u32 = 6;
const WRITE_1_RELEASE_US: u32 = 64;
const WRITE_0_LOW_US: u32 = 60;
const WRITE_0_RELEASE_US: u32 = 10;
const READ_LOW_US: u32 = 6;
const READ_SAMPLE_US: u32 = 9;
const READ_END_US: u32 = 55;

/// 1-Wire bus master over an open-drain pin.
pub struct OneWire<P> {
    pin: P,
}

impl<P, E> OneWire<P>
where
    P: InputPin<Error = E> + OutputPin<Error = E>,
{
    /// Creates a bus master.
    ///
    /// The line is released at the beginning of the first reset.
    #[must_use]
    pub const fn new(pin: P) -> Self {
        Self { pin }
    }

    /// Gives the pin back.
    #[must_use]
    pub fn into_inner(self) -> P {
        self.pin
    }

    fn drive_low(&mut self) -> Result<(), Error<E>> {
        self.pin.set_low().map_err(Error::Pin)
    }

    fn release(&mut self) -> Result<(), Error<E>> {
        self.pin.set_high().map_err(Error::Pin)
    }

    fn is_low(&mut self) -> Result<bool, Error<E>> {
        self.pin.is_low().map_err(Error::Pin)
    }

    /// Sends a reset pulse and returns whether at least one device answered with a presence
    /// pulse.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BusHeldLow`] if the line is low before the reset pulse.
    pub fn reset(&mut self, delay: &mut impl DelayNs) -> Result<bool, Error<E>> {
        self.release()?;
        if self.is_low()? {
            trackuino_log::warn!("1-Wire line held low before reset");
            return Err(Error::BusHeldLow);
        }

        self.drive_low()?;
        delay.delay_us(RESET_LOW_US);
        self.release()?;
        delay.delay_us(PRESENCE_SAMPLE_US);
        let presence = self.is_low()?;
        delay.delay_us(PRESENCE_END_US);

        Ok(presence)
    }

    /// Sends a reset pulse, requiring a presence pulse.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoPresence`] if no device answered.
    pub fn reset_expect_presence(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        if self.reset(delay)? {
            Ok(())
        } else {
            trackuino_log::debug!("no presence pulse on the 1-Wire bus");
            Err(Error::NoPresence)
        }
    }

    /// Writes a single time slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the pin fails.
    pub fn write_bit(&mut self, delay: &mut impl DelayNs, bit: bool) -> Result<(), Error<E>> {
        let (low_us, release_us) = if bit {
            (WRITE_1_LOW_US, WRITE_1_RELEASE_US)
        } else {
            (WRITE_0_LOW_US, WRITE_0_RELEASE_US)
        };

        self.drive_low()?;
        delay.delay_us(low_us);
        self.release()?;
        delay.delay_us(release_us);

        Ok(())
    }

    /// Reads a single time slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the pin fails.
    pub fn read_bit(&mut self, delay: &mut impl DelayNs) -> Result<bool, Error<E>> {
        self.drive_low()?;
        delay.delay_us(READ_LOW_US);
        self.release()?;
        delay.delay_us(READ_SAMPLE_US);
        let bit = !self.is_low()?;
        delay.delay_us(READ_END_US);

        Ok(bit)
    }

    /// Writes a byte, least significant bit first.
    ///
    /// # Errors
    ///
    /// Returns an error if the pin fails.
    pub fn write_byte(&mut self, delay: &mut impl DelayNs, byte: u8) -> Result<(), Error<E>> {
        for i in 0..8 {
            self.write_bit(delay, (byte >> i) & 1 == 1)?;
        }
        Ok(())
    }

    /// Reads a byte, least significant bit first.
    ///
    /// # Errors
    ///
    /// Returns an error if the pin fails.
    pub fn read_byte(&mut self, delay: &mut impl DelayNs) -> Result<u8, Error<E>> {
        let mut byte = 0;
        for i in 0..8 {
            if self.read_bit(delay)? {
                byte |= 1 << i;
            }
        }
        Ok(byte)
    }

    /// Writes all the bytes of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pin fails.
    pub fn write_bytes(&mut self, delay: &mut impl DelayNs, bytes: &[u8]) -> Result<(), Error<E>> {
        bytes
            .iter()
            .try_for_each(|&byte| self.write_byte(delay, byte))
    }

    /// Fills `buf` with bytes read from the bus.
    ///
    /// # Errors
    ///
    /// Returns an error if the pin fails.
    pub fn read_bytes(&mut self, delay: &mut impl DelayNs, buf: &mut [u8]) -> Result<(), Error<E>> {
        for byte in buf.iter_mut() {
            *byte = self.read_byte(delay)?;
        }
        Ok(())
    }

    /// Resets the bus and addresses every device at once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoPresence`] if no device answered the reset.
    pub fn skip_rom(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        self.reset_expect_presence(delay)?;
        self.write_byte(delay, SKIP_ROM)
    }

    /// Resets the bus and addresses the device with the given ROM code.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoPresence`] if no device answered the reset.
    pub fn match_rom(&mut self, delay: &mut impl DelayNs, rom: RomCode) -> Result<(), Error<E>> {
        self.reset_expect_presence(delay)?;
        self.write_byte(delay, MATCH_ROM)?;
        self.write_bytes(delay, &rom.to_bytes())
    }

    /// Reads the ROM code of the only device on the bus.
    ///
    /// The result is garbage if several devices are connected, which the CRC check catches in
    /// most cases.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoPresence`] if no device answered the reset, or [`Error::Crc`] if the
    /// ROM code is corrupted.
    pub fn read_rom(&mut self, delay: &mut impl DelayNs) -> Result<RomCode, Error<E>> {
        self.reset_expect_presence(delay)?;
        self.write_byte(delay, READ_ROM)?;

        let mut bytes = [0; 8];
        self.read_bytes(delay, &mut bytes)?;

        RomCode::from_bytes(bytes).map_err(|(received, computed)| Error::Crc { received, computed })
    }

    /// Runs one pass of the ROM search algorithm (Maxim application note 187).
    ///
    /// Returns the next device found, or `None` once every device has been enumerated or if no
    /// device is present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SearchFailed`] if the devices stop answering during the pass, and
    /// [`Error::Crc`] if the ROM code found is corrupted.
    pub fn search_next(
        &mut self,
        delay: &mut impl DelayNs,
        search: &mut RomSearch,
    ) -> Result<Option<RomCode>, Error<E>> {
        if search.done {
            return Ok(None);
        }

        if !self.reset(delay)? {
            *search = RomSearch {
                done: true,
                ..RomSearch::new()
            };
            return Ok(None);
        }
        self.write_byte(delay, SEARCH_ROM)?;

        let previous = RomCode::from_u64(search.last_rom);
        let mut rom = 0u64;
        let mut last_zero = 0;

        for bit_number in 1..=64u8 {
            let id_bit = self.read_bit(delay)?;
            let complement_bit = self.read_bit(delay)?;

            let direction = match (id_bit, complement_bit) {
                (true, true) => {
                    *search = RomSearch::new();
                    return Err(Error::SearchFailed);
                }
                // All the remaining devices agree on this bit.
                (bit, complement) if bit != complement => bit,
                // Discrepancy: some devices have a 0, others a 1.
                _ => {
                    let take_one = if bit_number < search.last_discrepancy {
                        previous.bit(bit_number - 1)
                    } else {
                        bit_number == search.last_discrepancy
                    };
                    if !take_one {
                        last_zero = bit_number;
                    }
                    take_one
                }
            };

            if direction {
                rom |= 1 << (bit_number - 1);
            }
            self.write_bit(delay, direction)?;
        }

        search.last_rom = rom;
        search.last_discrepancy = last_zero;
        search.done = last_zero == 0;

        RomCode::from_bytes(rom.to_le_bytes())
            .map(Some)
            .map_err(|(received, computed)| Error::Crc { received, computed })
    }

    /// Enumerates up to `N` devices on the bus, in search order.
    ///
    /// Devices beyond the first `N` are ignored.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered during the search.
    pub fn discover<const N: usize>(
        &mut self,
        delay: &mut impl DelayNs,
    ) -> Result<Vec<RomCode, N>, Error<E>> {
        let mut devices = Vec::new();
        let mut search = RomSearch::new();

        while let Some(rom) = self.search_next(delay, &mut search)? {
            trackuino_log::debug!("found 1-Wire device {:?}", rom);
            if devices.push(rom).is_err() {
                break;
            }
        }

        Ok(devices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimBus, SimDs18b20};

    const ROM_A: RomCode = RomCode::from_u64(0x7704_1691_3A4C_FF28);
    const ROM_B: RomCode = RomCode::from_u64(0x272F_7C3C_1264_6128);

    #[test]
    fn test_reset_presence() {
        let sim = SimBus::new([Some(SimDs18b20::new(ROM_A)), None]);
        let mut bus = OneWire::new(sim.pin());
        assert_eq!(bus.reset(&mut sim.delay()), Ok(true));
    }

    #[test]
    fn test_reset_no_device() {
        let sim = SimBus::new([None, None]);
        let mut bus = OneWire::new(sim.pin());

        assert_eq!(bus.reset(&mut sim.delay()), Ok(false));
        assert_eq!(bus.skip_rom(&mut sim.delay()), Err(Error::NoPresence));
    }

    #[test]
    fn test_reset_shorted_line() {
        let sim = SimBus::new([Some(SimDs18b20::new(ROM_A)), None]);
        sim.short_to_ground(true);
        let mut bus = OneWire::new(sim.pin());

        assert_eq!(bus.reset(&mut sim.delay()), Err(Error::BusHeldLow));
    }

    #[test]
    fn test_reset_timing() {
        let sim = SimBus::new([None, None]);
        let mut bus = OneWire::new(sim.pin());
        let before = sim.now_us();

        bus.reset(&mut sim.delay()).unwrap();

        assert_eq!(
            sim.now_us() - before,
            u64::from(RESET_LOW_US + PRESENCE_SAMPLE_US + PRESENCE_END_US)
        );
    }

    #[test]
    fn test_read_rom_single_device() {
        let sim = SimBus::new([Some(SimDs18b20::new(ROM_B)), None]);
        let mut bus = OneWire::new(sim.pin());

        assert_eq!(bus.read_rom(&mut sim.delay()), Ok(ROM_B));
    }

    #[test]
    fn test_search_two_devices() {
        let sim = SimBus::new([
            Some(SimDs18b20::new(ROM_A)),
            Some(SimDs18b20::new(ROM_B)),
        ]);
        let mut bus = OneWire::new(sim.pin());
        let mut delay = sim.delay();

        let devices = bus.discover::<4>(&mut delay).unwrap();

        assert_eq!(devices.len(), 2);
        assert!(devices.contains(&ROM_A));
        assert!(devices.contains(&ROM_B));
        // The first pass takes the 0 branch at the first discrepancy, bit 1 of the second byte
        // (0xFF vs 0x61), where ROM_B has a 0.
        assert_eq!(devices.first(), Some(&ROM_B));
    }

    #[test]
    fn test_search_stops_when_done() {
        let sim = SimBus::new([Some(SimDs18b20::new(ROM_A)), None]);
        let mut bus = OneWire::new(sim.pin());
        let mut delay = sim.delay();
        let mut search = RomSearch::new();

        assert_eq!(bus.search_next(&mut delay, &mut search), Ok(Some(ROM_A)));
        assert!(search.is_done());
        assert_eq!(bus.search_next(&mut delay, &mut search), Ok(None));
    }

    #[test]
    fn test_discover_is_capped() {
        let sim = SimBus::new([
            Some(SimDs18b20::new(ROM_A)),
            Some(SimDs18b20::new(ROM_B)),
        ]);
        let mut bus = OneWire::new(sim.pin());

        let devices = bus.discover::<1>(&mut sim.delay()).unwrap();
        assert_eq!(devices.len(), 1);
    }
}
