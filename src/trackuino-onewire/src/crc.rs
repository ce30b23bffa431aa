//! Dallas/Maxim CRC-8 (polynomial x⁸ + x⁵ + x⁴ + 1).

/// Reflected form of the polynomial, as the bits are shifted out LSB first.
const POLYNOMIAL: u8 = 0x8C;

/// Computes the CRC-8 of `data`, as used in ROM codes and DS18B20 scratchpads.
///
/// Appending the CRC to the data and computing the CRC again yields zero.
///
/// # Examples
///
/// ```
/// # use trackuino_onewire::crc::crc8;
/// // Example ROM code from Maxim application note 27.
/// assert_eq!(crc8(&[0x02, 0x1C, 0xB8, 0x01, 0x00, 0x00, 0x00]), 0xA2);
/// ```
#[must_use]
pub fn crc8(data: &[u8]) -> u8 {
    data.iter().fold(0, |crc, &byte| update(crc, byte))
}

/// Feeds a single byte into a running CRC-8.
#[must_use]
pub const fn update(mut crc: u8, mut byte: u8) -> u8 {
    let mut i = 0;
    while i < 8 {
        let mix = (crc ^ byte) & 0x01;
        crc >>= 1;
        if mix != 0 {
            crc ^= POLYNOMIAL;
        }
        byte >>= 1;
        i += 1;
    }
    crc
}

/// Checks that the last byte of `data` is the CRC-8 of the preceding ones.
///
/// # Errors
///
/// Returns the received and computed CRCs if they differ.
pub fn check(data: &[u8]) -> Result<(), (u8, u8)> {
    let Some((&received, payload)) = data.split_last() else {
        return Ok(());
    };

    let computed = crc8(payload);
    if computed == received {
        Ok(())
    } else {
        Err((received, computed))
    }
}
