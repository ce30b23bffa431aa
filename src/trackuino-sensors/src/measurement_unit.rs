/// Represents a unit of measurement.
// Built upon https://www.iana.org/assignments/senml/senml.xhtml
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum MeasurementUnit {
    /// Degrees Celsius (°C).
    Celsius,
    /// Volt (V).
    Volt,
}

impl core::fmt::Display for MeasurementUnit {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Celsius => write!(f, "°C"), // The Unicode Standard v15 recommends using U+00B0 + U+0043.
            Self::Volt => write!(f, "V"),
        }
    }
}
