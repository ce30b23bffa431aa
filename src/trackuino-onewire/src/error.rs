/// Errors returned by 1-Wire bus operations.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// The underlying pin returned an error.
    Pin(E),
    /// The line was low before a reset pulse, it is probably shorted to ground.
    BusHeldLow,
    /// No device answered the reset pulse with a presence pulse, or the addressed device did not
    /// answer.
    NoPresence,
    /// The received data does not match its CRC-8.
    Crc {
        /// CRC received from the device.
        received: u8,
        /// CRC computed over the received data.
        computed: u8,
    },
    /// The devices stopped answering in the middle of a ROM search.
    SearchFailed,
}

impl<E: core::fmt::Debug> core::fmt::Display for Error<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Pin(err) => write!(f, "1-Wire pin error: {err:?}"),
            Self::BusHeldLow => write!(f, "1-Wire line held low"),
            Self::NoPresence => write!(f, "no 1-Wire device present"),
            Self::Crc { received, computed } => write!(
                f,
                "1-Wire CRC mismatch: received {received:#04x}, computed {computed:#04x}"
            ),
            Self::SearchFailed => write!(f, "1-Wire ROM search failed"),
        }
    }
}

impl<E: core::fmt::Debug> core::error::Error for Error<E> {}
