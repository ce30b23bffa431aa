/// Reasons a sensor reading is not available.
///
/// Sensors absent from the board or miswired show up as [`ReadingError::NotPresent`] or
/// [`ReadingError::Crc`] on the digital path, but as implausible values on the analog path, which
/// cannot tell a disconnected input from a real voltage.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReadingError {
    /// [`Sensors::setup()`](crate::Sensors::setup) has not been called.
    NotSetUp,
    /// No temperature conversion was ever requested.
    NotRequested,
    /// The requested temperature conversion is not finished yet.
    NotReady,
    /// The digital sensor did not answer, or no such sensor was found during setup.
    NotPresent,
    /// The 1-Wire line is held low, probably shorted.
    BusHeldLow,
    /// Data received from the digital sensor is corrupted.
    Crc,
    /// The digital sensor lost power since the conversion was requested and holds its power-on
    /// value.
    PowerOnReset,
    /// The ADC failed or returned an unusable sample.
    Adc,
    /// A GPIO failed.
    Pin,
    /// The value does not fit the returned type.
    OutOfRange,
}

impl core::fmt::Display for ReadingError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotSetUp => write!(f, "sensors not set up"),
            Self::NotRequested => write!(f, "no temperature conversion requested"),
            Self::NotReady => write!(f, "temperature conversion in progress"),
            Self::NotPresent => write!(f, "digital sensor not present"),
            Self::BusHeldLow => write!(f, "1-Wire line held low"),
            Self::Crc => write!(f, "corrupted data from digital sensor"),
            Self::PowerOnReset => write!(f, "digital sensor reset during conversion"),
            Self::Adc => write!(f, "ADC error"),
            Self::Pin => write!(f, "GPIO error"),
            Self::OutOfRange => write!(f, "value out of range"),
        }
    }
}

impl core::error::Error for ReadingError {}

impl<E> From<trackuino_onewire::Error<E>> for ReadingError {
    fn from(err: trackuino_onewire::Error<E>) -> Self {
        use trackuino_onewire::Error;

        match err {
            Error::Pin(_) => Self::Pin,
            Error::BusHeldLow => Self::BusHeldLow,
            Error::Crc { .. } => Self::Crc,
            Error::NoPresence | Error::SearchFailed => Self::NotPresent,
        }
    }
}

/// Result of a sensor reading.
pub type ReadingResult<R> = Result<R, ReadingError>;
