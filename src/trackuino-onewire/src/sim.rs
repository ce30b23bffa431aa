//! Simulated 1-Wire line with DS18B20 devices attached.
//!
//! The simulation decodes the time slots from the duration of the low pulses driven by the bus
//! master, measured with the simulated clock advanced by [`SimDelay`]. It answers resets with a
//! presence pulse, implements the Search/Read/Match/Skip ROM commands and the Convert T,
//! Read Scratchpad and Write Scratchpad function commands, and completes conversions after the
//! resolution-dependent conversion time.

use core::{cell::RefCell, convert::Infallible};

use embedded_hal::{
    delay::DelayNs,
    digital::{ErrorType, InputPin, OutputPin},
};

use crate::{
    crc,
    ds18b20::{
        Resolution, CONVERT_T, POWER_ON_RAW_TEMPERATURE, READ_SCRATCHPAD, SCRATCHPAD_LEN,
        WRITE_SCRATCHPAD,
    },
    RomCode, MATCH_ROM, READ_ROM, SEARCH_ROM, SKIP_ROM,
};

/// Shortest low pulse recognized as a reset, in nanoseconds.
const RESET_MIN_NS: u64 = 480_000;
/// Longest low pulse recognized as a write-1 or read slot, in nanoseconds.
const SHORT_SLOT_MAX_NS: u64 = 15_000;
/// Time after the end of the reset pulse until the presence pulse ends, in nanoseconds.
const PRESENCE_END_NS: u64 = 240_000;
/// Time after the end of the slot's low pulse until a transmitting device releases the line.
const SLOT_HOLD_NS: u64 = 45_000;

/// A simulated 1-Wire line shared by up to `N` devices.
pub struct SimBus<const N: usize> {
    state: RefCell<State<N>>,
}

struct State<const N: usize> {
    now_ns: u64,
    driven_since: Option<u64>,
    released_at: u64,
    shorted: bool,
    presence: bool,
    devices_pull_low: bool,
    devices: [Option<SimDs18b20>; N],
}

impl<const N: usize> SimBus<N> {
    /// Creates a line with the given devices attached.
    #[must_use]
    pub fn new(devices: [Option<SimDs18b20>; N]) -> Self {
        Self {
            state: RefCell::new(State {
                now_ns: 0,
                driven_since: None,
                released_at: 0,
                shorted: false,
                presence: false,
                devices_pull_low: false,
                devices,
            }),
        }
    }

    /// Returns the open-drain pin of the bus master.
    #[must_use]
    pub fn pin(&self) -> SimPin<'_, N> {
        SimPin { bus: self }
    }

    /// Returns a delay provider advancing the simulated clock.
    #[must_use]
    pub fn delay(&self) -> SimDelay<'_, N> {
        SimDelay { bus: self }
    }

    /// Returns the simulated time, in microseconds.
    #[must_use]
    pub fn now_us(&self) -> u64 {
        self.state.borrow().now_ns / 1000
    }

    /// Advances the simulated clock.
    pub fn advance_ns(&self, ns: u64) {
        self.state.borrow_mut().now_ns += ns;
    }

    /// Shorts the line to ground, or removes the short.
    pub fn short_to_ground(&self, shorted: bool) {
        self.state.borrow_mut().shorted = shorted;
    }

    /// Gives access to the device in the given slot, if any.
    pub fn with_device<R>(&self, index: usize, f: impl FnOnce(&mut SimDs18b20) -> R) -> Option<R> {
        let mut state = self.state.borrow_mut();
        let device = state.devices.get_mut(index)?.as_mut()?;
        Some(f(device))
    }

    fn drive_low(&self) {
        let mut state = self.state.borrow_mut();
        if state.driven_since.is_none() {
            state.driven_since = Some(state.now_ns);
        }
        state.presence = false;
        state.devices_pull_low = false;
    }

    fn release(&self) {
        let mut state = self.state.borrow_mut();
        let Some(since) = state.driven_since.take() else {
            return;
        };
        let State {
            now_ns,
            released_at,
            devices,
            presence,
            devices_pull_low,
            ..
        } = &mut *state;
        let duration = *now_ns - since;
        *released_at = *now_ns;

        if duration >= RESET_MIN_NS {
            *presence = false;
            for device in devices.iter_mut().flatten() {
                *presence |= device.reset(*now_ns);
            }
        } else {
            let written = duration <= SHORT_SLOT_MAX_NS;
            for device in devices.iter_mut().flatten() {
                if device.slot(written, *now_ns) == Some(false) {
                    *devices_pull_low = true;
                }
            }
        }
    }

    fn is_low(&self) -> bool {
        let state = self.state.borrow();
        let since_release = state.now_ns - state.released_at;

        state.shorted
            || state.driven_since.is_some()
            || (state.presence && since_release < PRESENCE_END_NS)
            || (state.devices_pull_low && since_release < SLOT_HOLD_NS)
    }
}

/// Open-drain pin of the bus master on a [`SimBus`].
pub struct SimPin<'a, const N: usize> {
    bus: &'a SimBus<N>,
}

impl<const N: usize> ErrorType for SimPin<'_, N> {
    type Error = Infallible;
}

impl<const N: usize> OutputPin for SimPin<'_, N> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.bus.drive_low();
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.bus.release();
        Ok(())
    }
}

impl<const N: usize> InputPin for SimPin<'_, N> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.bus.is_low())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.bus.is_low())
    }
}

/// Delay provider advancing the clock of a [`SimBus`] instead of waiting.
pub struct SimDelay<'a, const N: usize> {
    bus: &'a SimBus<N>,
}

impl<const N: usize> DelayNs for SimDelay<'_, N> {
    fn delay_ns(&mut self, ns: u32) {
        self.bus.advance_ns(u64::from(ns));
    }

    fn delay_us(&mut self, us: u32) {
        self.bus.advance_ns(u64::from(us) * 1000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.bus.advance_ns(u64::from(ms) * 1_000_000);
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Receiving {
    RomCommand,
    MatchRom,
    FunctionCommand,
    WriteScratchpad,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum SearchPhase {
    Bit,
    Complement,
    Direction,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Phase {
    /// Waiting for a reset pulse.
    Inactive,
    Receive {
        what: Receiving,
        bits: u64,
        count: u8,
    },
    Transmit {
        data: [u8; SCRATCHPAD_LEN],
        len: u8,
        pos: u8,
    },
    Search {
        index: u8,
        phase: SearchPhase,
    },
    /// Answers read slots with 0 while converting, 1 once done.
    Converting,
}

/// A simulated DS18B20, externally powered.
#[derive(Debug, Clone)]
pub struct SimDs18b20 {
    rom: RomCode,
    raw_temperature: i16,
    scratchpad: [u8; SCRATCHPAD_LEN],
    conversion_done_at: Option<u64>,
    phase: Phase,
}

impl SimDs18b20 {
    /// Creates a device in its power-on state.
    #[must_use]
    pub fn new(rom: RomCode) -> Self {
        let mut device = Self {
            rom,
            raw_temperature: 0,
            scratchpad: [0; SCRATCHPAD_LEN],
            conversion_done_at: None,
            phase: Phase::Inactive,
        };
        device.power_cycle();
        device
    }

    /// Returns the ROM code of the device.
    #[must_use]
    pub fn rom(&self) -> RomCode {
        self.rom
    }

    /// Sets the temperature the next conversion will measure, in sixteenths of a degree.
    pub fn set_raw_temperature(&mut self, raw: i16) {
        self.raw_temperature = raw;
    }

    /// Simulates a power loss: the scratchpad reverts to its power-on content and any ongoing
    /// conversion is lost.
    pub fn power_cycle(&mut self) {
        let [lsb, msb] = POWER_ON_RAW_TEMPERATURE.to_le_bytes();
        self.scratchpad = [
            lsb,
            msb,
            0x4B,
            0x46,
            Resolution::Bits12.config_register(),
            0xFF,
            0x0C,
            0x10,
            0,
        ];
        self.update_crc();
        self.conversion_done_at = None;
        self.phase = Phase::Inactive;
    }

    /// Returns the current resolution.
    #[must_use]
    pub fn resolution(&self) -> Resolution {
        let config = self.scratchpad.get(4).copied().unwrap_or_default();
        Resolution::from_config_register(config)
    }

    fn update_crc(&mut self) {
        if let Some((crc, payload)) = self.scratchpad.split_last_mut() {
            *crc = crc::crc8(payload);
        }
    }

    fn complete_conversion(&mut self, now_ns: u64) {
        if self.conversion_done_at.is_some_and(|done_at| now_ns >= done_at) {
            self.conversion_done_at = None;
            // Bits below the resolution are left as measured.
            let [lsb, msb] = self.raw_temperature.to_le_bytes();
            if let [first, second, ..] = &mut self.scratchpad {
                *first = lsb;
                *second = msb;
            }
            self.update_crc();
        }
    }

    /// Handles a reset pulse, returns whether a presence pulse is sent.
    fn reset(&mut self, now_ns: u64) -> bool {
        self.complete_conversion(now_ns);
        self.phase = Phase::Receive {
            what: Receiving::RomCommand,
            bits: 0,
            count: 0,
        };
        true
    }

    /// Handles a time slot, returns the bit transmitted by the device, if any.
    fn slot(&mut self, written: bool, now_ns: u64) -> Option<bool> {
        self.complete_conversion(now_ns);

        match self.phase {
            Phase::Inactive => None,
            Phase::Receive {
                what,
                mut bits,
                mut count,
            } => {
                if written {
                    bits |= 1 << count;
                }
                count += 1;
                self.phase = Phase::Receive { what, bits, count };
                self.received(what, bits, count, now_ns);
                None
            }
            Phase::Transmit { data, len, pos } => {
                let byte = data.get(usize::from(pos / 8)).copied().unwrap_or(0xFF);
                let bit = (byte >> (pos % 8)) & 1 == 1;
                self.phase = if pos + 1 < len {
                    Phase::Transmit {
                        data,
                        len,
                        pos: pos + 1,
                    }
                } else {
                    Phase::Inactive
                };
                Some(bit)
            }
            Phase::Search { index, phase } => {
                let bit = self.rom.bit(index);
                match phase {
                    SearchPhase::Bit => {
                        self.phase = Phase::Search {
                            index,
                            phase: SearchPhase::Complement,
                        };
                        Some(bit)
                    }
                    SearchPhase::Complement => {
                        self.phase = Phase::Search {
                            index,
                            phase: SearchPhase::Direction,
                        };
                        Some(!bit)
                    }
                    SearchPhase::Direction => {
                        self.phase = if written != bit || index == 63 {
                            Phase::Inactive
                        } else {
                            Phase::Search {
                                index: index + 1,
                                phase: SearchPhase::Bit,
                            }
                        };
                        None
                    }
                }
            }
            Phase::Converting => Some(self.conversion_done_at.is_none()),
        }
    }

    fn received(&mut self, what: Receiving, bits: u64, count: u8, now_ns: u64) {
        match (what, count) {
            (Receiving::RomCommand, 8) => {
                self.phase = match bits.to_le_bytes() {
                    [SEARCH_ROM, ..] => Phase::Search {
                        index: 0,
                        phase: SearchPhase::Bit,
                    },
                    [READ_ROM, ..] => {
                        let mut data = [0; SCRATCHPAD_LEN];
                        if let Some(head) = data.get_mut(..8) {
                            head.copy_from_slice(&self.rom.to_bytes());
                        }
                        Phase::Transmit {
                            data,
                            len: 64,
                            pos: 0,
                        }
                    }
                    [MATCH_ROM, ..] => Self::receive(Receiving::MatchRom),
                    [SKIP_ROM, ..] => Self::receive(Receiving::FunctionCommand),
                    _ => Phase::Inactive,
                };
            }
            (Receiving::MatchRom, 64) => {
                self.phase = if bits == self.rom.as_u64() {
                    Self::receive(Receiving::FunctionCommand)
                } else {
                    Phase::Inactive
                };
            }
            (Receiving::FunctionCommand, 8) => {
                self.phase = match bits.to_le_bytes() {
                    [CONVERT_T, ..] => {
                        let duration = u64::from(self.resolution().conversion_time_us()) * 1000;
                        self.conversion_done_at = Some(now_ns + duration);
                        Phase::Converting
                    }
                    [READ_SCRATCHPAD, ..] => Phase::Transmit {
                        data: self.scratchpad,
                        len: 72,
                        pos: 0,
                    },
                    [WRITE_SCRATCHPAD, ..] => Self::receive(Receiving::WriteScratchpad),
                    _ => Phase::Inactive,
                };
            }
            (Receiving::WriteScratchpad, 24) => {
                let [high, low, config, ..] = bits.to_le_bytes();
                if let [_, _, th, tl, cfg, ..] = &mut self.scratchpad {
                    *th = high;
                    *tl = low;
                    // Only the resolution bits are writable.
                    *cfg = (config & 0x60) | 0x1F;
                }
                self.update_crc();
                self.phase = Phase::Inactive;
            }
            _ => {}
        }
    }

    const fn receive(what: Receiving) -> Phase {
        Phase::Receive {
            what,
            bits: 0,
            count: 0,
        }
    }
}
