// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus ASCII slave dispatcher.
//!
//! Inbound lines are decoded and checked against their LRC, frames for other
//! nodes are dropped and the remaining requests are answered from a
//! [`RegisterBank`].

use crate::{
    ascii::{
        self, DecodedFrame, Header, LF, MAX_ADU_LEN, MAX_FRAME_LEN, MAX_READ_QUANTITY,
        ResponseAdu, SlaveId, server,
    },
    error::Error,
    frame::{Data, Exception, ExceptionResponse, FunctionCode, Request, Response, ResponsePdu},
    hal::{self, BusDirection, Direction, Timer, Transport, Turnaround},
};

type Result<T> = core::result::Result<T, Error>;

/// Registers a slave exposes to the bus.
///
/// The bank belongs to the application and is shared with its own logic.
pub trait RegisterBank {
    /// Read the register at `address`.
    fn read(&self, address: u16) -> core::result::Result<u16, Exception>;

    /// Write `value` to the register at `address`.
    fn write(&mut self, address: u16, value: u16) -> core::result::Result<(), Exception>;
}

impl RegisterBank for [u16] {
    fn read(&self, address: u16) -> core::result::Result<u16, Exception> {
        self.get(usize::from(address))
            .copied()
            .ok_or(Exception::IllegalDataAddress)
    }

    fn write(&mut self, address: u16, value: u16) -> core::result::Result<(), Exception> {
        let reg = self
            .get_mut(usize::from(address))
            .ok_or(Exception::IllegalDataAddress)?;
        *reg = value;
        Ok(())
    }
}

impl<const N: usize> RegisterBank for [u16; N] {
    fn read(&self, address: u16) -> core::result::Result<u16, Exception> {
        <[u16] as RegisterBank>::read(self, address)
    }

    fn write(&mut self, address: u16, value: u16) -> core::result::Result<(), Exception> {
        <[u16] as RegisterBank>::write(self, address, value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fields {
    Read { address: u16, quantity: u16 },
    WriteSingle { address: u16, value: u16 },
    WriteMultiple { address: u16, quantity: u16 },
    Other,
}

impl From<Request<'_>> for Fields {
    fn from(request: Request<'_>) -> Self {
        match request {
            Request::ReadHoldingRegisters(address, quantity) => Self::Read { address, quantity },
            Request::WriteSingleRegister(address, value) => Self::WriteSingle { address, value },
            Request::WriteMultipleRegisters(address, data) => Self::WriteMultiple {
                address,
                quantity: data.len() as u16,
            },
            Request::Custom(_, _) => Self::Other,
        }
    }
}

/// A received request that passed the LRC check.
///
/// Keeps the raw line for echo replies next to the decoded fields.
#[derive(Debug, Clone)]
pub struct RequestFrame {
    line: [u8; MAX_FRAME_LEN],
    line_len: usize,
    slave: SlaveId,
    function: FunctionCode,
    fields: Fields,
}

impl RequestFrame {
    /// Decode and verify a received line.
    pub fn decode(line: &[u8]) -> Result<Self> {
        if line.len() > MAX_FRAME_LEN {
            return Err(Error::BufferOverflow);
        }
        let bin = &mut [0; MAX_ADU_LEN + 1];
        let DecodedFrame { slave, pdu } = ascii::decode(line, bin)?;
        let (function, fields) = match Request::try_from(pdu) {
            Ok(request) => (FunctionCode::from(request), Fields::from(request)),
            // A sound frame with an unknown function code is still a request
            // the dispatcher has to turn down.
            Err(Error::UnsupportedFunction(code)) => (FunctionCode::Custom(code), Fields::Other),
            Err(err) => return Err(err),
        };
        let mut frame = Self {
            line: [0; MAX_FRAME_LEN],
            line_len: line.len(),
            slave,
            function,
            fields,
        };
        frame.line[..line.len()].copy_from_slice(line);
        Ok(frame)
    }

    /// The line as received.
    #[must_use]
    pub fn line(&self) -> &[u8] {
        &self.line[..self.line_len]
    }

    #[must_use]
    pub const fn slave(&self) -> SlaveId {
        self.slave
    }

    /// Returns `true` if the frame is addressed to `address`.
    #[must_use]
    pub const fn address_matches(&self, address: SlaveId) -> bool {
        self.slave == address
    }

    #[must_use]
    pub const fn function_code(&self) -> FunctionCode {
        self.function
    }

    /// First register addressed by the request.
    #[must_use]
    pub const fn register_address(&self) -> Option<u16> {
        match self.fields {
            Fields::Read { address, .. }
            | Fields::WriteSingle { address, .. }
            | Fields::WriteMultiple { address, .. } => Some(address),
            Fields::Other => None,
        }
    }

    /// Number of registers to read or write.
    #[must_use]
    pub const fn register_count(&self) -> Option<u16> {
        match self.fields {
            Fields::Read { quantity, .. } | Fields::WriteMultiple { quantity, .. } => {
                Some(quantity)
            }
            Fields::WriteSingle { .. } | Fields::Other => None,
        }
    }

    /// Value of a single register write.
    #[must_use]
    pub const fn single_value(&self) -> Option<u16> {
        match self.fields {
            Fields::WriteSingle { value, .. } => Some(value),
            _ => None,
        }
    }
}

/// What the dispatcher did with a request.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Registers were read and sent to the master.
    Read { address: u16, quantity: u16 },
    /// A register was written and the request echoed.
    Written { address: u16, value: u16 },
    /// The bank refused the request, an exception was sent.
    Rejected(ExceptionResponse),
}

/// Bus slave answering register requests.
#[derive(Debug)]
pub struct Slave<T, D, C> {
    transport: T,
    bus: D,
    timer: C,
    address: SlaveId,
    turnaround: Turnaround,
}

impl<T, D, C> Slave<T, D, C>
where
    T: Transport,
    D: BusDirection,
    C: Timer,
{
    /// Create a slave listening on node `address` and release the bus.
    pub fn new(transport: T, mut bus: D, timer: C, address: SlaveId) -> Self {
        bus.set_direction(Direction::Receive);
        Self {
            transport,
            bus,
            timer,
            address,
            turnaround: Turnaround::default(),
        }
    }

    #[must_use]
    pub const fn with_turnaround(mut self, turnaround: Turnaround) -> Self {
        self.turnaround = turnaround;
        self
    }

    #[must_use]
    pub const fn address(&self) -> SlaveId {
        self.address
    }

    /// Give back the peripherals.
    pub fn release(self) -> (T, D, C) {
        (self.transport, self.bus, self.timer)
    }

    /// Take the next inbound frame, if a complete line is buffered.
    ///
    /// Lines that fail to decode or fail the LRC check are dropped.
    pub fn poll(&mut self) -> Option<RequestFrame> {
        if !self.transport.has_complete_line() {
            return None;
        }
        let line = &mut [0; MAX_FRAME_LEN];
        let len = self.transport.read_line(line).min(MAX_FRAME_LEN);
        match RequestFrame::decode(&line[..len]) {
            Ok(frame) => Some(frame),
            Err(_err) => {
                #[cfg(feature = "log")]
                log::warn!("Dropping frame: {_err}");
                None
            }
        }
    }

    /// Handle at most one inbound request.
    ///
    /// Returns `Ok(None)` if there was nothing to do for this node and
    /// [`Error::UnsupportedFunction`] for a request that was not answered.
    pub fn process<B>(&mut self, bank: &mut B) -> Result<Option<Outcome>>
    where
        B: RegisterBank + ?Sized,
    {
        let Some(frame) = self.poll() else {
            return Ok(None);
        };
        if !frame.address_matches(self.address) {
            #[cfg(feature = "log")]
            log::debug!("Ignoring frame for slave {}", frame.slave());
            return Ok(None);
        }
        self.dispatch(&frame, bank).map(Some)
    }

    /// Execute a request against `bank` and reply to the master.
    pub fn dispatch<B>(&mut self, frame: &RequestFrame, bank: &mut B) -> Result<Outcome>
    where
        B: RegisterBank + ?Sized,
    {
        let function = frame.function_code();
        match frame.fields {
            Fields::Read { address, quantity } => {
                let cnt = usize::from(quantity);
                if cnt == 0 || cnt > MAX_READ_QUANTITY {
                    return self.reject(function, Exception::IllegalDataValue);
                }
                let values = &mut [0; MAX_READ_QUANTITY];
                for (offset, value) in (0..quantity).zip(values[..cnt].iter_mut()) {
                    let Some(reg) = address.checked_add(offset) else {
                        return self.reject(function, Exception::IllegalDataAddress);
                    };
                    match bank.read(reg) {
                        Ok(v) => *value = v,
                        Err(ex) => return self.reject(function, ex),
                    }
                }
                self.respond_registers(&values[..cnt])?;
                Ok(Outcome::Read { address, quantity })
            }
            Fields::WriteSingle { address, value } => {
                if let Err(ex) = bank.write(address, value) {
                    return self.reject(function, ex);
                }
                self.respond_echo(frame);
                Ok(Outcome::Written { address, value })
            }
            Fields::WriteMultiple { .. } | Fields::Other => {
                #[cfg(feature = "log")]
                log::warn!("Unsupported function code {function}");
                Err(Error::UnsupportedFunction(function.value()))
            }
        }
    }

    /// Echo a received frame verbatim, as required for a single register write.
    pub fn respond_echo(&mut self, frame: &RequestFrame) {
        let line = frame.line();
        let buf = &mut [0; MAX_FRAME_LEN + 1];
        let mut len = line.len();
        buf[..len].copy_from_slice(line);
        // the CR is part of the line, only the terminator is missing
        if line.last() != Some(&LF) {
            buf[len] = LF;
            len += 1;
        }
        self.transmit(&buf[..len]);
    }

    /// Reply to a read holding registers request with `values`.
    pub fn respond_registers(&mut self, values: &[u16]) -> Result<()> {
        if values.len() > MAX_READ_QUANTITY {
            return Err(Error::BufferOverflow);
        }
        let words = &mut [0; MAX_READ_QUANTITY * 2];
        let data = Data::from_words(values, words)?;
        self.respond(ResponsePdu(Ok(Response::ReadHoldingRegisters(data))))
    }

    /// Reply with a Modbus exception.
    pub fn respond_exception(&mut self, function: FunctionCode, exception: Exception) -> Result<()> {
        self.respond(ResponsePdu(Err(ExceptionResponse {
            function,
            exception,
        })))
    }

    fn reject(&mut self, function: FunctionCode, exception: Exception) -> Result<Outcome> {
        #[cfg(feature = "log")]
        log::debug!("Rejecting function {function}: {exception}");
        self.respond_exception(function, exception)?;
        Ok(Outcome::Rejected(ExceptionResponse {
            function,
            exception,
        }))
    }

    fn respond(&mut self, pdu: ResponsePdu<'_>) -> Result<()> {
        let adu = ResponseAdu {
            hdr: Header {
                slave: self.address,
            },
            pdu,
        };
        let line = &mut [0; MAX_FRAME_LEN];
        let len = server::encode_response(adu, line)?;
        self.transmit(&line[..len]);
        Ok(())
    }

    fn transmit(&mut self, line: &[u8]) {
        hal::transmit(
            &mut self.transport,
            &mut self.bus,
            &mut self.timer,
            self.turnaround,
            line,
        );
    }
}
