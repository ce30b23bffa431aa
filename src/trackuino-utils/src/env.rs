//! Reads configuration values from environment variables at build time.
//!
//! Each macro takes the name of an environment variable and a default value, and evaluates to
//! the parsed value if the variable was set when compiling, or to the default otherwise.
//! Malformed values are rejected at compile time when the macro is used in a `const` context.
//!
//! ```
//! const DIVIDER_TOP: u32 = trackuino_utils::u32_from_env_or!("CONFIG_UNSET_EXAMPLE", 10_000);
//! assert_eq!(DIVIDER_TOP, 10_000);
//! ```

pub use {const_panic, konst};

macro_rules! define_env_with_default_macro {
    ($macro_name:ident, $parse_fn_name:ident, $output_type_name:literal) => {
        #[doc = concat!(
            "Returns the value of an environment variable parsed as ",
            $output_type_name,
            ", or the provided default.",
        )]
        #[macro_export]
        macro_rules! $macro_name {
            ($env_var:literal, $default:expr) => {
                if let Some(str_value) = option_env!($env_var) {
                    if let Ok(value) = $crate::env::konst::primitive::$parse_fn_name(str_value) {
                        value
                    } else {
                        $crate::env::const_panic::concat_panic!(
                            "Could not parse environment variable `",
                            $env_var,
                            "=",
                            str_value,
                            "` as ",
                            $output_type_name,
                        );
                    }
                } else {
                    $default
                }
            };
        }
    };
}

define_env_with_default_macro!(u8_from_env_or, parse_u8, "a u8");
define_env_with_default_macro!(u16_from_env_or, parse_u16, "a u16");
define_env_with_default_macro!(u32_from_env_or, parse_u32, "a u32");
define_env_with_default_macro!(u64_from_env_or, parse_u64, "a u64");
define_env_with_default_macro!(usize_from_env_or, parse_usize, "a usize");
define_env_with_default_macro!(bool_from_env_or, parse_bool, "a bool");
