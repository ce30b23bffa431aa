//! Platform-specific items.
//!
//! This module dispatches between the following implementations, depending on the target:
//!
//! | Target           | Items                                                    |
//! | ---------------- | -------------------------------------------------------- |
//! | AVR (`ATmega328P`) | Register-level [`Adc`]                                 |
//! | Anything else    | Simulated hardware, for host tests                       |
//!
//! Both expose [`PLATFORM`] and an [`Adc`] implementing [`AnalogInput`](crate::AnalogInput).

cfg_if::cfg_if! {
    if #[cfg(target_arch = "avr")] {
        mod avr;
        pub use avr::*;
    } else {
        mod dummy;
        pub use dummy::*;
    }
}
