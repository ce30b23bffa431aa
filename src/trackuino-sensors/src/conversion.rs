//! Tracking of DS18B20 temperature conversions.

/// A point in time of the millisecond monotonic clock.
pub type Instant = fugit::TimerInstantU64<1000>;

/// A duration of the millisecond monotonic clock.
pub type Duration = fugit::MillisDurationU64;

/// A monotonic millisecond clock.
pub trait Clock {
    /// Returns the current time.
    fn now(&mut self) -> Instant;
}

/// State of the temperature conversion shared by all DS18B20 probes on the bus.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConversionState {
    /// No conversion was ever requested.
    Idle,
    /// A conversion is in progress.
    Converting {
        /// When the conversion was requested.
        started_at: Instant,
        /// Maximum conversion time at the configured resolution.
        duration: Duration,
    },
    /// The last requested conversion is complete.
    Ready,
}

impl ConversionState {
    /// Returns the state at `now`.
    ///
    /// A clock going backwards keeps the conversion in progress.
    #[must_use]
    pub fn poll(self, now: Instant) -> Self {
        match self {
            Self::Converting {
                started_at,
                duration,
            } => match now.checked_duration_since(started_at) {
                Some(elapsed) if elapsed >= duration => Self::Ready,
                _ => self,
            },
            Self::Idle | Self::Ready => self,
        }
    }

    /// Returns the time left until the conversion completes, zero unless converting.
    #[must_use]
    pub fn remaining(self, now: Instant) -> Duration {
        match self {
            Self::Converting {
                started_at,
                duration,
            } => {
                let deadline = started_at + duration;
                deadline
                    .checked_duration_since(now)
                    .unwrap_or(Duration::millis(0))
            }
            Self::Idle | Self::Ready => Duration::millis(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn converting_at(ms: u64) -> ConversionState {
        ConversionState::Converting {
            started_at: Instant::from_ticks(ms),
            duration: Duration::millis(750),
        }
    }

    #[test]
    fn test_idle_and_ready_are_stable() {
        let now = Instant::from_ticks(10_000);
        assert_eq!(ConversionState::Idle.poll(now), ConversionState::Idle);
        assert_eq!(ConversionState::Ready.poll(now), ConversionState::Ready);
    }

    #[test]
    fn test_converting_becomes_ready() {
        let state = converting_at(1000);

        assert_eq!(state.poll(Instant::from_ticks(1000)), state);
        assert_eq!(state.poll(Instant::from_ticks(1749)), state);
        assert_eq!(
            state.poll(Instant::from_ticks(1750)),
            ConversionState::Ready
        );
        assert_eq!(
            state.poll(Instant::from_ticks(5000)),
            ConversionState::Ready
        );
    }

    #[test]
    fn test_clock_going_backwards() {
        let state = converting_at(1000);
        assert_eq!(state.poll(Instant::from_ticks(10)), state);
    }

    #[test]
    fn test_remaining() {
        let state = converting_at(1000);

        assert_eq!(state.remaining(Instant::from_ticks(1000)), Duration::millis(750));
        assert_eq!(state.remaining(Instant::from_ticks(1700)), Duration::millis(50));
        assert_eq!(state.remaining(Instant::from_ticks(2000)), Duration::millis(0));
        assert_eq!(
            ConversionState::Idle.remaining(Instant::from_ticks(0)),
            Duration::millis(0)
        );
    }
}
