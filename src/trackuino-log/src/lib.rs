//! Provides logging facilities.
//!
//! The macros forward to [`defmt`](https://docs.rs/defmt) when the `defmt` feature is enabled,
//! to the [`log`](https://docs.rs/log) facade when the `log` feature is enabled, and compile to
//! nothing otherwise.
//!
//! Format strings must stick to the `{}` and `{:?}` placeholders, which both backends accept.

#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]
#![deny(clippy::pedantic)]

#[cfg(all(feature = "defmt", feature = "log"))]
compile_error!("feature \"defmt\" and feature \"log\" cannot be enabled at the same time");

#[cfg(feature = "defmt")]
pub mod defmt {
    //! Selected [`defmt`] items.

    // Hidden in the docs, but still imported by a wildcard import of this crate's items.
    #[doc(hidden)]
    pub mod hidden {
        // Required so the macros can access it.
        #[doc(hidden)]
        pub use defmt;
    }

    pub use defmt::{Debug2Format, Display2Format, Format};
}

#[cfg(feature = "log")]
#[doc(hidden)]
pub mod log {
    #[doc(hidden)]
    pub mod hidden {
        #[doc(hidden)]
        pub use log;
    }
}

macro_rules! define_level {
    ($dollar:tt, $level:ident, $doc:literal) => {
        #[doc = $doc]
        #[cfg(feature = "defmt")]
        #[macro_export]
        macro_rules! $level {
            ($dollar($dollar arg:tt)*) => {{
                use $dollar crate::defmt::hidden::defmt;
                defmt::$level!($dollar($dollar arg)*);
            }};
        }

        #[doc = $doc]
        #[cfg(all(feature = "log", not(feature = "defmt")))]
        #[macro_export]
        macro_rules! $level {
            ($dollar($dollar arg:tt)*) => {{
                use $dollar crate::log::hidden::log;
                log::$level!($dollar($dollar arg)*);
            }};
        }

        #[doc = $doc]
        #[cfg(not(any(feature = "defmt", feature = "log")))]
        #[macro_export]
        macro_rules! $level {
            ($dollar($dollar arg:tt)*) => {{
                // Type-checks the arguments without evaluating or moving them.
                if false {
                    let _ = ::core::format_args!($dollar($dollar arg)*);
                }
            }};
        }
    };
}

define_level!($, trace, "Logs a message at the trace level.");
define_level!($, debug, "Logs a message at the debug level.");
define_level!($, info, "Logs a message at the info level.");
define_level!($, warn, "Logs a message at the warn level.");
define_level!($, error, "Logs a message at the error level.");

#[cfg(test)]
mod tests {
    #[derive(Debug)]
    struct NotCopy(u32);

    #[test]
    fn test_macros_do_not_consume_arguments() {
        let value = NotCopy(42);

        trace!("trace {:?}", value);
        debug!("debug {:?}", value);
        info!("info {}", value.0);
        warn!("warn {:?}", value);
        error!("error {}", value.0);

        assert_eq!(value.0, 42);
    }
}
