// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Peripherals the engine depends on.
//!
//! The serial line, the RS-485 direction pin and the clock belong to the
//! application. Implement these traits on top of the board support crate.

/// Line oriented serial transport.
///
/// Lines are terminated by ASCII LF (`0x0A`). The CR that precedes the LF in
/// a Modbus ASCII frame is data and must be kept inside the line.
pub trait Transport {
    /// Transmit a complete line, including CR LF.
    fn send(&mut self, line: &[u8]);

    /// Returns `true` if a complete line has been buffered.
    fn has_complete_line(&mut self) -> bool;

    /// Move the next buffered line into `buf` and return its length.
    ///
    /// The LF terminator may be omitted. A line that does not fit is
    /// truncated to `buf.len()`.
    fn read_line(&mut self, buf: &mut [u8]) -> usize;
}

/// Direction of a half-duplex RS-485 transceiver.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Transmit,
    Receive,
}

/// Control of the transceiver's driver enable line.
pub trait BusDirection {
    fn set_direction(&mut self, direction: Direction);
}

/// Monotonic millisecond clock with a blocking delay.
pub trait Timer {
    /// Milliseconds since an arbitrary epoch. May wrap around.
    fn now_ms(&self) -> u32;

    /// Block for at least `us` microseconds.
    fn delay_us(&mut self, us: u32);
}

/// Transceiver turnaround timing.
///
/// These compensate for the transceiver and the devices on the bus,
/// not for the protocol.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Turnaround {
    /// Hold time after enabling the driver and before the first character.
    pub pre_transmit_us: u32,
    /// Hold time after the last character and before releasing the bus.
    ///
    /// Moves the release glitch of the transceiver outside the window
    /// in which the addressed device listens.
    pub post_transmit_us: u32,
}

impl Turnaround {
    #[must_use]
    pub const fn new(pre_transmit_us: u32, post_transmit_us: u32) -> Self {
        Self {
            pre_transmit_us,
            post_transmit_us,
        }
    }
}

impl Default for Turnaround {
    fn default() -> Self {
        Self::new(1_000, 1_500)
    }
}

/// Send a line framed by the bus turnaround sequence.
pub(crate) fn transmit<T, D, C>(
    transport: &mut T,
    bus: &mut D,
    timer: &mut C,
    turnaround: Turnaround,
    line: &[u8],
) where
    T: Transport,
    D: BusDirection,
    C: Timer,
{
    bus.set_direction(Direction::Transmit);
    timer.delay_us(turnaround.pre_transmit_us);
    transport.send(line);
    timer.delay_us(turnaround.post_transmit_us);
    bus.set_direction(Direction::Receive);
}

/// A [`Timer`] backed by [`std::time::Instant`] and [`std::thread::sleep`].
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy)]
pub struct StdTimer {
    epoch: std::time::Instant,
}

#[cfg(feature = "std")]
impl StdTimer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for StdTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl Timer for StdTimer {
    fn now_ms(&self) -> u32 {
        // wrapping is intended, deadlines use wrapping arithmetic
        self.epoch.elapsed().as_millis() as u32
    }

    fn delay_us(&mut self, us: u32) {
        std::thread::sleep(core::time::Duration::from_micros(u64::from(us)));
    }
}
