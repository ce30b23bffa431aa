//! Onboard sensors of the Trackuino balloon tracker.
//!
//! [`Sensors`] reads the ADC reference voltage, the inside and outside temperatures through two
//! LM60 analog sensors and two DS18B20 1-Wire digital sensors, and the supply voltage through a
//! resistor divider. The hardware is accessed through a [`SensorBackend`]: [`HalBackend`] drives
//! any board providing `embedded-hal` pins and delays along with an [`AnalogInput`], and
//! [`arch`] provides the platform-specific pieces.
//!
//! All values are integers: temperatures in tenths of a degree Celsius, voltages in millivolts.
//! [`Sensors::try_read()`] and [`Sensors::read_all()`] return them as [`Measurement`]s, which
//! carry their unit and scaling.
//!
//! # Logging
//!
//! Enable the `defmt` or the `log` feature to log setup results and hardware failures.

#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]
#![deny(clippy::pedantic)]

pub mod adc;
pub mod arch;
mod backend;
mod channel;
mod config;
pub mod conversion;
mod error;
mod hal_backend;
pub mod lm60;
mod measurement_unit;
mod sensors;
mod value;

pub use adc::{AnalogChannel, AnalogInput, Reference};
pub use backend::{AnalogSensor, Probes, SensorBackend};
pub use channel::Channel;
pub use config::{AnalogPins, SensorsConfig};
pub use conversion::ConversionState;
pub use error::{ReadingError, ReadingResult};
pub use hal_backend::HalBackend;
pub use measurement_unit::MeasurementUnit;
pub use sensors::{ReadAll, Sensors};
pub use value::{Accuracy, Measurement, Value};

pub use trackuino_onewire::{Resolution, RomCode};
