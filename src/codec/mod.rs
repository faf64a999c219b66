// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{error::*, frame::*};
use byteorder::{BigEndian, ByteOrder};

pub mod ascii;

type Result<T> = core::result::Result<T, Error>;

impl TryFrom<u8> for Exception {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        use crate::frame::Exception::*;
        let ex = match code {
            0x01 => IllegalFunction,
            0x02 => IllegalDataAddress,
            0x03 => IllegalDataValue,
            0x04 => ServerDeviceFailure,
            0x05 => Acknowledge,
            0x06 => ServerDeviceBusy,
            0x08 => MemoryParityError,
            0x0A => GatewayPathUnavailable,
            0x0B => GatewayTargetDevice,
            _ => {
                return Err(Error::ExceptionCode(code));
            }
        };
        Ok(ex)
    }
}

impl TryFrom<ExceptionResponse> for [u8; 2] {
    type Error = Error;

    fn try_from(ex: ExceptionResponse) -> Result<[u8; 2]> {
        let fn_code = ex.function.value();
        // the high bit marks the exception
        if fn_code >= 0x80 {
            return Err(Error::ExceptionFnCode(fn_code));
        }
        Ok([fn_code | 0x80, ex.exception as u8])
    }
}

impl TryFrom<&[u8]> for ExceptionResponse {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 2 {
            return Err(Error::Truncated);
        }
        let fn_err_code = bytes[0];
        if fn_err_code < 0x80 {
            return Err(Error::ExceptionFnCode(fn_err_code));
        }
        let function = (fn_err_code - 0x80).into();
        let exception = Exception::try_from(bytes[1])?;
        Ok(ExceptionResponse {
            function,
            exception,
        })
    }
}

impl<'r> TryFrom<&'r [u8]> for Request<'r> {
    type Error = Error;

    fn try_from(bytes: &'r [u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::Truncated);
        }

        let fn_code = bytes[0];

        if bytes.len() < min_request_pdu_len(fn_code.into()) {
            return Err(Error::Truncated);
        }

        use crate::frame::Request::*;
        use FunctionCode as f;

        let req = match FunctionCode::from(fn_code) {
            f::ReadHoldingRegisters => ReadHoldingRegisters(
                BigEndian::read_u16(&bytes[1..3]),
                BigEndian::read_u16(&bytes[3..5]),
            ),
            f::WriteSingleRegister => WriteSingleRegister(
                BigEndian::read_u16(&bytes[1..3]),
                BigEndian::read_u16(&bytes[3..5]),
            ),
            f::WriteMultipleRegisters => {
                let address = BigEndian::read_u16(&bytes[1..3]);
                let quantity = BigEndian::read_u16(&bytes[3..5]) as usize;
                let byte_count = bytes[5];
                if bytes.len() < (6 + byte_count as usize) || byte_count as usize != quantity * 2
                {
                    return Err(Error::ByteCount(byte_count));
                }
                let data = Data {
                    quantity,
                    data: &bytes[6..6 + byte_count as usize],
                };
                WriteMultipleRegisters(address, data)
            }
            f::Custom(code) if code < 0x80 => Custom(f::Custom(code), &bytes[1..]),
            f::Custom(code) => return Err(Error::UnsupportedFunction(code)),
        };
        Ok(req)
    }
}

impl<'r> TryFrom<&'r [u8]> for Response<'r> {
    type Error = Error;

    fn try_from(bytes: &'r [u8]) -> Result<Self> {
        use crate::frame::Response::*;
        if bytes.is_empty() {
            return Err(Error::Truncated);
        }
        let fn_code = bytes[0];
        if bytes.len() < min_response_pdu_len(fn_code.into()) {
            return Err(Error::Truncated);
        }
        use FunctionCode as f;
        let rsp = match FunctionCode::from(fn_code) {
            f::ReadHoldingRegisters => {
                let byte_count = bytes[1] as usize;
                if byte_count + 2 > bytes.len() {
                    return Err(Error::Truncated);
                }
                let data = &bytes[2..2 + byte_count];
                let quantity = byte_count / 2;
                ReadHoldingRegisters(Data { quantity, data })
            }
            f::WriteSingleRegister => WriteSingleRegister(
                BigEndian::read_u16(&bytes[1..]),
                BigEndian::read_u16(&bytes[3..]),
            ),
            f::WriteMultipleRegisters => WriteMultipleRegisters(
                BigEndian::read_u16(&bytes[1..]),
                BigEndian::read_u16(&bytes[3..]),
            ),
            f::Custom(code) => Custom(f::Custom(code), &bytes[1..]),
        };
        Ok(rsp)
    }
}

impl RequestPdu<'_> {
    /// Serialize the PDU into `buf` and return the number of bytes written.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let RequestPdu(req) = *self;
        let len = req.pdu_len();
        if buf.len() < len {
            return Err(Error::BufferOverflow);
        }
        buf[0] = FunctionCode::from(req).value();
        match req {
            Request::ReadHoldingRegisters(address, payload)
            | Request::WriteSingleRegister(address, payload) => {
                BigEndian::write_u16(&mut buf[1..], address);
                BigEndian::write_u16(&mut buf[3..], payload);
            }
            Request::WriteMultipleRegisters(address, words) => {
                BigEndian::write_u16(&mut buf[1..], address);
                let quantity = u16::try_from(words.len()).map_err(|_| Error::BufferOverflow)?;
                BigEndian::write_u16(&mut buf[3..], quantity);
                buf[5] = u8::try_from(words.len() * 2).map_err(|_| Error::BufferOverflow)?;
                words.copy_to(&mut buf[6..]);
            }
            Request::Custom(_, data) => {
                buf[1..len].copy_from_slice(data);
            }
        }
        Ok(len)
    }
}

impl ResponsePdu<'_> {
    /// Serialize the PDU into `buf` and return the number of bytes written.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let rsp = match self.0 {
            Ok(rsp) => rsp,
            Err(ex) => {
                if buf.len() < 2 {
                    return Err(Error::BufferOverflow);
                }
                let bytes: [u8; 2] = ex.try_into()?;
                buf[..2].copy_from_slice(&bytes);
                return Ok(2);
            }
        };
        let len = rsp.pdu_len();
        if buf.len() < len {
            return Err(Error::BufferOverflow);
        }
        buf[0] = FunctionCode::from(rsp).value();
        match rsp {
            Response::ReadHoldingRegisters(words) => {
                buf[1] = u8::try_from(words.len() * 2).map_err(|_| Error::BufferOverflow)?;
                words.copy_to(&mut buf[2..]);
            }
            Response::WriteSingleRegister(address, payload)
            | Response::WriteMultipleRegisters(address, payload) => {
                BigEndian::write_u16(&mut buf[1..], address);
                BigEndian::write_u16(&mut buf[3..], payload);
            }
            Response::Custom(_, data) => {
                buf[1..len].copy_from_slice(data);
            }
        }
        Ok(len)
    }
}

const fn min_request_pdu_len(fn_code: FunctionCode) -> usize {
    use FunctionCode::*;
    match fn_code {
        ReadHoldingRegisters | WriteSingleRegister => 5,
        WriteMultipleRegisters => 6,
        Custom(_) => 1,
    }
}

const fn min_response_pdu_len(fn_code: FunctionCode) -> usize {
    use FunctionCode::*;
    match fn_code {
        ReadHoldingRegisters => 2,
        WriteSingleRegister | WriteMultipleRegisters => 5,
        Custom(_) => 1,
    }
}
