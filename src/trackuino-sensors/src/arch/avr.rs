use core::{
    convert::Infallible,
    ptr::{read_volatile, write_volatile},
};

use crate::adc::{self, AnalogChannel, AnalogInput, Reference};

/// Name of the platform.
pub const PLATFORM: &str = "avr";

const ADCL: *mut u8 = 0x78 as *mut u8;
const ADCH: *mut u8 = 0x79 as *mut u8;
const ADCSRA: *mut u8 = 0x7A as *mut u8;
const ADMUX: *mut u8 = 0x7C as *mut u8;

/// ADC enabled, clock prescaler 128.
const ADCSRA_ENABLE: u8 = 0x87;
/// Start conversion, cleared by the hardware when the conversion completes.
const ADSC: u8 = 1 << 6;

/// ADC of the `ATmega328P`.
pub struct Adc {
    reference: Reference,
}

impl Adc {
    /// Enables the ADC.
    ///
    /// # Safety
    ///
    /// Nothing else may access the ADC registers while the returned value exists.
    #[must_use]
    pub unsafe fn new() -> Self {
        // SAFETY: the register exists on every ATmega328P, exclusive access is up to the caller.
        unsafe { write_volatile(ADCSRA, ADCSRA_ENABLE) };
        Self {
            reference: Reference::AVcc,
        }
    }
}

impl AnalogInput for Adc {
    type Error = Infallible;

    fn set_reference(&mut self, reference: Reference) -> Result<(), Self::Error> {
        // Applied with the multiplexer, at the next conversion.
        self.reference = reference;
        Ok(())
    }

    fn convert(&mut self, channel: AnalogChannel) -> Result<u16, Self::Error> {
        // SAFETY: the caller of `Adc::new()` guaranteed exclusive access to these registers.
        unsafe {
            write_volatile(ADMUX, adc::admux(self.reference, channel));
            write_volatile(ADCSRA, read_volatile(ADCSRA) | ADSC);
            while read_volatile(ADCSRA) & ADSC != 0 {
                core::hint::spin_loop();
            }
            // ADCL must be read first, it locks ADCH until read.
            let low = read_volatile(ADCL);
            let high = read_volatile(ADCH);
            Ok(u16::from_le_bytes([low, high]))
        }
    }
}
