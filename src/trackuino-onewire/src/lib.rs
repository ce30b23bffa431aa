//! Bit-banged 1-Wire bus master and DS18B20 driver.
//!
//! The bus is driven through a single open-drain pin implementing both
//! [`embedded_hal::digital::OutputPin`] and [`embedded_hal::digital::InputPin`]: setting the pin
//! low drives the line, setting it high releases it to the external pull-up.
//! Delays are passed to each operation as an [`embedded_hal::delay::DelayNs`], so the caller can
//! share one delay provider between the bus and other peripherals.
//!
//! All timings are the standard-speed values from Maxim application note 126.
//!
//! ```ignore
//! let mut bus = OneWire::new(pin);
//! Ds18b20::start_conversion_all(&mut bus, &mut delay)?;
//! delay.delay_ms(Resolution::Bits12.conversion_time_ms());
//! let scratchpad = Ds18b20::new(rom).read_scratchpad(&mut bus, &mut delay)?;
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]
#![deny(clippy::pedantic)]

mod bus;
pub mod crc;
pub mod ds18b20;
mod error;
mod rom;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use bus::OneWire;
pub use ds18b20::{Ds18b20, Resolution, Scratchpad};
pub use error::Error;
pub use rom::{RomCode, RomSearch};

/// ROM command: enumerates the ROM codes of the devices on the bus.
pub const SEARCH_ROM: u8 = 0xF0;
/// ROM command: reads the ROM code of the only device on the bus.
pub const READ_ROM: u8 = 0x33;
/// ROM command: addresses the device with the ROM code that follows.
pub const MATCH_ROM: u8 = 0x55;
/// ROM command: addresses all the devices on the bus at once.
pub const SKIP_ROM: u8 = 0xCC;
