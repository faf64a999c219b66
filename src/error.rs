// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use core::fmt;

use crate::frame::ExceptionResponse;

/// modbus-ascii Error
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// No complete line arrived within the response timeout
    TransportTimeout,
    /// The reply does not correlate with the request
    FrameMismatch(Mismatch),
    /// Invalid LRC
    ChecksumInvalid(u8, u8),
    /// Valid frame, but the function code is not implemented
    UnsupportedFunction(u8),
    /// Payload exceeds the frame or destination capacity
    BufferOverflow,
    /// Invalid ASCII hex digit
    HexDigit(u8),
    /// Missing start delimiter, missing CR or odd number of hex digits
    Framing,
    /// The PDU is shorter than its function code requires
    Truncated,
    /// Invalid byte count
    ByteCount(u8),
    /// Invalid exception code
    ExceptionCode(u8),
    /// Invalid exception function code
    ExceptionFnCode(u8),
    /// The device answered with an exception
    Exception(ExceptionResponse),
}

/// The correlation check a reply failed.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mismatch {
    /// A write was not echoed verbatim.
    Echo,
    /// Address or function code differ from the request.
    Header,
    /// The declared byte count differs from twice the requested word count.
    ByteCount { expected: u8, actual: u8 },
    /// The register payload is shorter or longer than declared.
    Length,
}

impl Mismatch {
    /// Diagnostic message for this mismatch.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Echo => "improper echo from device",
            Self::Header => "address or function code don't match",
            Self::ByteCount { .. } => "improper number of words returned",
            Self::Length => "register payload length doesn't match byte count",
        }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ByteCount { expected, actual } => write!(
                f,
                "{}: expected = {expected}, actual = {actual}",
                self.description()
            ),
            _ => f.write_str(self.description()),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Error::*;

        match self {
            TransportTimeout => write!(f, "Transport timeout"),
            FrameMismatch(mismatch) => write!(f, "Frame mismatch: {mismatch}"),
            ChecksumInvalid(expected, actual) => write!(
                f,
                "Invalid LRC: expected = 0x{expected:0>2X}, actual = 0x{actual:0>2X}"
            ),
            UnsupportedFunction(fn_code) => {
                write!(f, "Unsupported function code: 0x{fn_code:0>2X}")
            }
            BufferOverflow => write!(f, "Buffer overflow"),
            HexDigit(c) => write!(f, "Invalid ASCII hex digit: 0x{c:0>2X}"),
            Framing => write!(f, "Invalid ASCII framing"),
            Truncated => write!(f, "Truncated PDU"),
            ByteCount(cnt) => write!(f, "Invalid byte count: {cnt}"),
            ExceptionCode(code) => write!(f, "Invalid exception code: 0x{code:0>2X}"),
            ExceptionFnCode(code) => write!(f, "Invalid exception function code: 0x{code:0>2X}"),
            Exception(rsp) => write!(
                f,
                "Exception for function 0x{:0>2X}: {}",
                rsp.function.value(),
                rsp.exception
            ),
        }
    }
}

impl core::error::Error for Error {}
