// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus ASCII master session.
//!
//! Every call is one blocking transaction:
//! assert the bus, transmit, release the bus, wait for a complete reply
//! line (polling once per interval until the timeout expires) and
//! validate it against the request. Retries are left to the caller.

use crate::{
    ascii::{
        self, Header, MAX_ADU_LEN, MAX_FRAME_LEN, MAX_READ_QUANTITY, RequestAdu, ResponseAdu,
        SlaveId, client,
    },
    error::{Error, Mismatch},
    frame::{FunctionCode, Request, RequestPdu, Response, ResponsePdu},
    hal::{self, BusDirection, Direction, Timer, Transport, Turnaround},
};

type Result<T> = core::result::Result<T, Error>;

/// Characters of a write request that a device echoes back:
/// `:`, address, function code, register, value and LRC.
const ECHO_LEN: usize = 15;

/// Characters of the reply header: `:`, address and function code.
const HEADER_LEN: usize = 5;

/// Master configuration.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// How long to wait for a complete reply line.
    pub timeout_ms: u32,
    /// Delay between two checks for a reply line.
    pub poll_interval_us: u32,
    pub turnaround: Turnaround,
}

impl Config {
    #[must_use]
    pub const fn new(timeout_ms: u32) -> Self {
        Self {
            timeout_ms,
            poll_interval_us: 1_000,
            turnaround: Turnaround::new(1_000, 1_500),
        }
    }

    #[must_use]
    pub const fn with_turnaround(mut self, turnaround: Turnaround) -> Self {
        self.turnaround = turnaround;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(1_000)
    }
}

/// Bus master talking to field devices.
#[derive(Debug)]
pub struct Master<T, D, C> {
    transport: T,
    bus: D,
    timer: C,
    config: Config,
}

impl<T, D, C> Master<T, D, C>
where
    T: Transport,
    D: BusDirection,
    C: Timer,
{
    /// Create a master and release the bus.
    pub fn new(transport: T, mut bus: D, timer: C, config: Config) -> Self {
        bus.set_direction(Direction::Receive);
        Self {
            transport,
            bus,
            timer,
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    pub fn set_timeout(&mut self, timeout_ms: u32) {
        self.config.timeout_ms = timeout_ms;
    }

    /// Give back the peripherals.
    pub fn release(self) -> (T, D, C) {
        (self.transport, self.bus, self.timer)
    }

    /// Preset a single register (`0x06`) of a device.
    ///
    /// Devices echo a successful write verbatim. The write is confirmed only
    /// if the first 15 characters of the reply equal those transmitted.
    pub fn put_word(&mut self, slave: SlaveId, address: u16, value: u16) -> Result<()> {
        let request = Request::WriteSingleRegister(address, value);
        let cmd = &mut [0; MAX_FRAME_LEN];
        let reply = &mut [0; MAX_FRAME_LEN];
        let (cmd_len, reply_len) = self.transaction(slave, request, cmd, reply)?;
        let (cmd, reply) = (&cmd[..cmd_len], &reply[..reply_len]);

        if reply.len() >= ECHO_LEN && reply[..ECHO_LEN] == cmd[..ECHO_LEN] {
            return Ok(());
        }
        Err(reply_error(
            reply,
            slave,
            FunctionCode::WriteSingleRegister,
            Mismatch::Echo,
        ))
    }

    /// Read `count` holding registers (`0x03`) starting at `start` into `dest`.
    ///
    /// The reply is validated completely before `dest` is written, a failed
    /// read leaves `dest` untouched.
    pub fn read_registers(
        &mut self,
        dest: &mut [u16],
        slave: SlaveId,
        start: u16,
        count: u16,
    ) -> Result<()> {
        let quantity = usize::from(count);
        if quantity > MAX_READ_QUANTITY || quantity > dest.len() {
            return Err(Error::BufferOverflow);
        }
        let request = Request::ReadHoldingRegisters(start, count);
        let cmd = &mut [0; MAX_FRAME_LEN];
        let reply = &mut [0; MAX_FRAME_LEN];
        let (cmd_len, reply_len) = self.transaction(slave, request, cmd, reply)?;
        let (cmd, reply) = (&cmd[..cmd_len], &reply[..reply_len]);

        if reply.get(..HEADER_LEN) != Some(&cmd[..HEADER_LEN]) {
            return Err(reply_error(
                reply,
                slave,
                FunctionCode::ReadHoldingRegisters,
                Mismatch::Header,
            ));
        }

        let bin = &mut [0; MAX_ADU_LEN + 1];
        let frame = ascii::decode(reply, bin)?;
        let pdu = frame.pdu;

        // quantity is limited to 125, twice of it fits into the byte count
        let expected = (quantity * 2) as u8;
        let actual = pdu.get(1).copied().ok_or(Error::FrameMismatch(Mismatch::Length))?;
        if actual != expected {
            return Err(Error::FrameMismatch(Mismatch::ByteCount { expected, actual }));
        }
        if pdu.len() != 2 + usize::from(actual) {
            return Err(Error::FrameMismatch(Mismatch::Length));
        }
        let Ok(Response::ReadHoldingRegisters(data)) = Response::try_from(pdu) else {
            return Err(Error::FrameMismatch(Mismatch::Header));
        };

        for (dst, word) in dest.iter_mut().zip(data) {
            *dst = word;
        }
        Ok(())
    }

    /// Preset multiple registers (`0x10`).
    ///
    /// Not supported by this master, nothing is transmitted.
    pub fn preset_multiple_registers(
        &mut self,
        _slave: SlaveId,
        _start: u16,
        _values: &[u16],
    ) -> Result<()> {
        Err(Error::UnsupportedFunction(
            FunctionCode::WriteMultipleRegisters.value(),
        ))
    }

    /// Send a request and wait for the reply line.
    ///
    /// Returns the length of the encoded request in `cmd`
    /// and the length of the reply in `reply`.
    fn transaction(
        &mut self,
        slave: SlaveId,
        request: Request<'_>,
        cmd: &mut [u8],
        reply: &mut [u8],
    ) -> Result<(usize, usize)> {
        let adu = RequestAdu {
            hdr: Header { slave },
            pdu: RequestPdu(request),
        };
        let cmd_len = client::encode_request(adu, cmd)?;

        // A late reply to an earlier, timed out request must not be taken
        // as the reply to this one.
        while self.transport.has_complete_line() {
            let stale = self.transport.read_line(reply);
            if stale == 0 {
                break;
            }
            #[cfg(feature = "log")]
            log::debug!("Discarding stale line: {:X?}", &reply[..stale.min(reply.len())]);
        }

        #[cfg(feature = "log")]
        log::debug!("Request to slave {slave}: {request:?}");
        hal::transmit(
            &mut self.transport,
            &mut self.bus,
            &mut self.timer,
            self.config.turnaround,
            &cmd[..cmd_len],
        );

        let reply_len = self.await_reply(reply)?;
        Ok((cmd_len, reply_len))
    }

    fn await_reply(&mut self, buf: &mut [u8]) -> Result<usize> {
        let start = self.timer.now_ms();
        while !self.transport.has_complete_line() {
            if self.timer.now_ms().wrapping_sub(start) > self.config.timeout_ms {
                #[cfg(feature = "log")]
                log::warn!("No reply within {} ms", self.config.timeout_ms);
                return Err(Error::TransportTimeout);
            }
            self.timer.delay_us(self.config.poll_interval_us);
        }
        let len = self.transport.read_line(buf);
        Ok(len.min(buf.len()))
    }
}

/// Classify a reply that failed validation.
///
/// A device may answer with an exception instead of the expected reply.
fn reply_error(reply: &[u8], slave: SlaveId, function: FunctionCode, mismatch: Mismatch) -> Error {
    let bin = &mut [0; MAX_ADU_LEN + 1];
    match client::decode_response(reply, bin) {
        Ok(ResponseAdu {
            hdr,
            pdu: ResponsePdu(Err(ex)),
        }) if hdr.slave == slave && ex.function == function => Error::Exception(ex),
        _ => Error::FrameMismatch(mismatch),
    }
}
