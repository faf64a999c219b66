// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus ASCII server (slave) specific functions.
use super::*;

/// Decode an ASCII request line.
///
/// The decoded bytes are kept in `buf`.
pub fn decode_request<'b>(line: &[u8], buf: &'b mut [u8]) -> Result<RequestAdu<'b>> {
    let DecodedFrame { slave, pdu } = decode(line, buf)?;
    let hdr = Header { slave };
    // The frame's bytes have already been verified with the LRC,
    // so a failure here is a malformed request.
    Request::try_from(pdu)
        .map(RequestPdu)
        .map(|pdu| RequestAdu { hdr, pdu })
}

/// Encode an ASCII response line.
pub fn encode_response(adu: ResponseAdu<'_>, buf: &mut [u8]) -> Result<usize> {
    let ResponseAdu { hdr, pdu } = adu;
    let bin = &mut [0; MAX_ADU_LEN];
    bin[0] = hdr.slave;
    let len = pdu.encode(&mut bin[1..])?;
    encode(&bin[..=len], buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_write_single_register_request() {
        let buf = &mut [0; MAX_ADU_LEN];
        let adu = decode_request(b":01060100177071\r", buf).unwrap();
        let RequestAdu { hdr, pdu } = adu;
        let RequestPdu(pdu) = pdu;
        assert_eq!(hdr.slave, 0x01);
        assert_eq!(FunctionCode::from(pdu), FunctionCode::WriteSingleRegister);
        assert_eq!(pdu, Request::WriteSingleRegister(0x0100, 0x1770));
    }

    #[test]
    fn decode_truncated_request() {
        let buf = &mut [0; MAX_ADU_LEN];
        // read holding registers without quantity
        assert_eq!(
            decode_request(b":0103001000EC\r\n", buf).err().unwrap(),
            Error::Truncated
        );
    }

    #[test]
    fn encode_read_holding_registers_response() {
        let words = &mut [0; 4];
        let adu = ResponseAdu {
            hdr: Header { slave: 0x01 },
            pdu: ResponsePdu(Ok(Response::ReadHoldingRegisters(
                Data::from_words(&[0xAA00, 0x1111], words).unwrap(),
            ))),
        };
        let buf = &mut [0; 40];
        let len = encode_response(adu, buf).unwrap();
        assert_eq!(&buf[..len], b":010304AA0011112C\r\n");
    }

    #[test]
    fn encode_exception_response() {
        let adu = ResponseAdu {
            hdr: Header { slave: 0x01 },
            pdu: ResponsePdu(Err(ExceptionResponse {
                function: FunctionCode::ReadHoldingRegisters,
                exception: Exception::IllegalDataAddress,
            })),
        };
        let buf = &mut [0; 40];
        let len = encode_response(adu, buf).unwrap();
        assert_eq!(&buf[..len], b":0183027A\r\n");
    }
}
