//! Build-time configuration helpers shared by the trackuino crates.

#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]

pub mod env;
