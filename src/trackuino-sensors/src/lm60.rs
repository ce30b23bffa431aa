//! LM60 linear temperature sensor.
//!
//! The output voltage is `424 mV + 6.25 mV/°C · T`, over −40 °C to +125 °C.

/// Output voltage at 0 °C, in microvolts.
pub const OFFSET_UV: i32 = 424_000;

/// Output slope, in microvolts per tenth of a degree Celsius.
pub const UV_PER_DECICELSIUS: i32 = 625;

/// Converts the output voltage to tenths of a degree Celsius, truncating toward zero.
#[must_use]
pub const fn decicelsius_from_microvolts(microvolts: u32) -> i32 {
    let decicelsius = (microvolts as i64 - OFFSET_UV as i64) / UV_PER_DECICELSIUS as i64;
    // At most `u32::MAX / 625`.
    #[expect(clippy::cast_possible_truncation)]
    let decicelsius = decicelsius as i32;
    decicelsius
}

/// Returns the output voltage at the given temperature, in microvolts.
///
/// Temperatures below −67.8 °C, which would require a negative output, yield 0.
#[must_use]
pub const fn microvolts_from_decicelsius(decicelsius: i16) -> u32 {
    let microvolts = OFFSET_UV + decicelsius as i32 * UV_PER_DECICELSIUS;
    if microvolts < 0 {
        0
    } else {
        microvolts.unsigned_abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datasheet_points() {
        // Typical output voltages from the datasheet.
        assert_eq!(decicelsius_from_microvolts(174_000), -400);
        assert_eq!(decicelsius_from_microvolts(424_000), 0);
        assert_eq!(decicelsius_from_microvolts(580_250), 250);
        assert_eq!(decicelsius_from_microvolts(1_205_250), 1250);
    }

    #[test]
    fn test_truncates_toward_zero() {
        assert_eq!(decicelsius_from_microvolts(424_624), 0);
        assert_eq!(decicelsius_from_microvolts(423_376), 0);
        assert_eq!(decicelsius_from_microvolts(425_250), 2);
    }

    #[test]
    fn test_full_input_range() {
        assert_eq!(decicelsius_from_microvolts(0), -678);
        assert_eq!(decicelsius_from_microvolts(u32::MAX), 6_871_269);
    }

    #[test]
    fn test_inverse() {
        for decicelsius in [-400, -1, 0, 1, 250, 1250] {
            assert_eq!(
                decicelsius_from_microvolts(microvolts_from_decicelsius(decicelsius)),
                i32::from(decicelsius)
            );
        }
        assert_eq!(microvolts_from_decicelsius(-700), 0);
    }
}
