// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use core::fmt;

pub(crate) mod ascii;
mod data;

pub use self::data::*;
use byteorder::{BigEndian, ByteOrder};

/// A Modbus function code.
///
/// It is represented by an unsigned 8 bit integer.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionCode {
    /// Modbus Function Code: `03` (`0x03`).
    ReadHoldingRegisters,

    /// Modbus Function Code: `06` (`0x06`).
    WriteSingleRegister,

    /// Modbus Function Code: `16` (`0x10`).
    WriteMultipleRegisters,

    /// Custom Modbus Function Code.
    Custom(u8),
}

impl FunctionCode {
    /// Create a new [`FunctionCode`] with `value`.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        match value {
            0x03 => Self::ReadHoldingRegisters,
            0x06 => Self::WriteSingleRegister,
            0x10 => Self::WriteMultipleRegisters,
            code => FunctionCode::Custom(code),
        }
    }

    /// Get the [`u8`] value of the current [`FunctionCode`].
    #[must_use]
    pub const fn value(self) -> u8 {
        match self {
            Self::ReadHoldingRegisters => 0x03,
            Self::WriteSingleRegister => 0x06,
            Self::WriteMultipleRegisters => 0x10,
            Self::Custom(code) => code,
        }
    }
}

impl From<u8> for FunctionCode {
    fn from(value: u8) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value().fmt(f)
    }
}

/// A Modbus address is represented by 16 bit (from `0` to `65535`).
pub(crate) type Address = u16;

/// Modbus uses 16 bit for its data items (big-endian representation).
pub(crate) type Word = u16;

/// Number of items to process (`0` - `65535`).
pub(crate) type Quantity = u16;

/// Raw PDU data
type RawData<'r> = &'r [u8];

/// A request represents a message from the client (master) to the server (slave).
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request<'r> {
    ReadHoldingRegisters(Address, Quantity),
    WriteSingleRegister(Address, Word),
    WriteMultipleRegisters(Address, Data<'r>),
    Custom(FunctionCode, &'r [u8]),
}

/// A server (slave) exception response.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionResponse {
    pub function: FunctionCode,
    pub exception: Exception,
}

/// Represents a message from the client (master) to the server (slave).
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestPdu<'r>(pub Request<'r>);

/// Represents a message from the server (slave) to the client (master).
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponsePdu<'r>(pub Result<Response<'r>, ExceptionResponse>);

/// The response data of a successful request.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response<'r> {
    ReadHoldingRegisters(Data<'r>),
    WriteSingleRegister(Address, Word),
    WriteMultipleRegisters(Address, Quantity),
    Custom(FunctionCode, &'r [u8]),
}

impl<'r> From<Request<'r>> for FunctionCode {
    fn from(r: Request<'r>) -> Self {
        use Request as R;

        match r {
            R::ReadHoldingRegisters(_, _) => Self::ReadHoldingRegisters,
            R::WriteSingleRegister(_, _) => Self::WriteSingleRegister,
            R::WriteMultipleRegisters(_, _) => Self::WriteMultipleRegisters,
            R::Custom(code, _) => code,
        }
    }
}

impl<'r> From<Response<'r>> for FunctionCode {
    fn from(r: Response<'r>) -> Self {
        use Response as R;

        match r {
            R::ReadHoldingRegisters(_) => Self::ReadHoldingRegisters,
            R::WriteSingleRegister(_, _) => Self::WriteSingleRegister,
            R::WriteMultipleRegisters(_, _) => Self::WriteMultipleRegisters,
            R::Custom(code, _) => code,
        }
    }
}

/// A server (slave) exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exception {
    IllegalFunction = 0x01,
    IllegalDataAddress = 0x02,
    IllegalDataValue = 0x03,
    ServerDeviceFailure = 0x04,
    Acknowledge = 0x05,
    ServerDeviceBusy = 0x06,
    MemoryParityError = 0x08,
    GatewayPathUnavailable = 0x0A,
    GatewayTargetDevice = 0x0B,
}

impl Exception {
    const fn get_name(self) -> &'static str {
        match self {
            Self::IllegalFunction => "Illegal function",
            Self::IllegalDataAddress => "Illegal data address",
            Self::IllegalDataValue => "Illegal data value",
            Self::ServerDeviceFailure => "Server device failure",
            Self::Acknowledge => "Acknowledge",
            Self::ServerDeviceBusy => "Server device busy",
            Self::MemoryParityError => "Memory parity error",
            Self::GatewayPathUnavailable => "Gateway path unavailable",
            Self::GatewayTargetDevice => "Gateway target device failed to respond",
        }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.get_name())
    }
}

#[cfg(all(feature = "defmt", target_os = "none"))]
impl defmt::Format for Exception {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{}", self.get_name())
    }
}

impl Request<'_> {
    /// Number of bytes required for a serialized PDU frame.
    #[must_use]
    pub const fn pdu_len(&self) -> usize {
        match *self {
            Self::ReadHoldingRegisters(_, _) | Self::WriteSingleRegister(_, _) => 5,
            Self::WriteMultipleRegisters(_, words) => 6 + words.data.len(),
            Self::Custom(_, data) => 1 + data.len(),
        }
    }
}

impl Response<'_> {
    /// Number of bytes required for a serialized PDU frame.
    #[must_use]
    pub const fn pdu_len(&self) -> usize {
        match *self {
            Self::ReadHoldingRegisters(words) => 2 + words.len() * 2,
            Self::WriteSingleRegister(_, _) | Self::WriteMultipleRegisters(_, _) => 5,
            Self::Custom(_, data) => 1 + data.len(),
        }
    }
}
