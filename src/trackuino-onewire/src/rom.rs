use crate::crc;

/// 64-bit unique identifier of a 1-Wire device.
///
/// Stored little-endian: the family code is the least significant byte and the CRC-8 the most
/// significant one, which is also the order in which the bits travel on the bus.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RomCode(u64);

impl RomCode {
    /// Creates a ROM code from its bus representation, checking its CRC.
    ///
    /// # Errors
    ///
    /// Returns the received and computed CRCs if they differ.
    pub fn from_bytes(bytes: [u8; 8]) -> Result<Self, (u8, u8)> {
        crc::check(&bytes)?;
        Ok(Self(u64::from_le_bytes(bytes)))
    }

    /// Creates a ROM code from its integer representation, without checking its CRC.
    #[must_use]
    pub const fn from_u64(code: u64) -> Self {
        Self(code)
    }

    /// Returns the integer representation.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the bytes in bus order.
    #[must_use]
    pub const fn to_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    /// Returns the family code.
    #[must_use]
    pub const fn family(self) -> u8 {
        self.0.to_le_bytes()[0]
    }

    /// Returns the 48-bit serial number.
    #[must_use]
    pub const fn serial(self) -> u64 {
        (self.0 >> 8) & 0xFFFF_FFFF_FFFF
    }

    /// Returns whether the embedded CRC matches the family code and serial number.
    #[must_use]
    pub fn is_valid(self) -> bool {
        crc::check(&self.to_bytes()).is_ok()
    }

    pub(crate) const fn bit(self, index: u8) -> bool {
        (self.0 >> index) & 1 == 1
    }
}

impl core::fmt::Debug for RomCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "RomCode({:016x})", self.0)
    }
}

/// State of an enumeration of the devices on a bus, see [`OneWire::search_next()`].
///
/// [`OneWire::search_next()`]: crate::OneWire::search_next
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct RomSearch {
    /// ROM code found by the previous pass.
    pub(crate) last_rom: u64,
    /// 1-based index of the bit where the previous pass took the 0 branch last, 0 if none.
    pub(crate) last_discrepancy: u8,
    pub(crate) done: bool,
}

impl RomSearch {
    /// Starts a new enumeration.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_rom: 0,
            last_discrepancy: 0,
            done: false,
        }
    }

    /// Returns whether all the devices have been enumerated.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bytes() {
        let rom = RomCode::from_bytes([0x28, 0xFF, 0x4C, 0x3A, 0x91, 0x16, 0x04, 0x77]).unwrap();

        assert_eq!(rom.as_u64(), 0x7704_1691_3A4C_FF28);
        assert_eq!(rom.family(), 0x28);
        assert_eq!(rom.serial(), 0x0416_913A_4CFF);
        assert!(rom.is_valid());
        assert!(rom.bit(3));
        assert!(!rom.bit(0));
    }

    #[test]
    fn test_from_bytes_bad_crc() {
        assert_eq!(
            RomCode::from_bytes([0x28, 0xFF, 0x4C, 0x3A, 0x91, 0x16, 0x04, 0x78]),
            Err((0x78, 0x77))
        );
        assert!(!RomCode::from_u64(0x7804_1691_3A4C_FF28).is_valid());
    }
}
