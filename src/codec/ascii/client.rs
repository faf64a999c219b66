// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus ASCII client (master) specific functions.
use super::*;

/// Encode an ASCII request line.
pub fn encode_request(adu: RequestAdu, buf: &mut [u8]) -> Result<usize> {
    let RequestAdu { hdr, pdu } = adu;
    let bin = &mut [0; MAX_ADU_LEN];
    bin[0] = hdr.slave;
    let len = pdu.encode(&mut bin[1..])?;
    encode(&bin[..=len], buf)
}

/// Decode an ASCII response line.
///
/// The decoded bytes are kept in `buf`.
pub fn decode_response<'b>(line: &[u8], buf: &'b mut [u8]) -> Result<ResponseAdu<'b>> {
    let DecodedFrame { slave, pdu } = decode(line, buf)?;
    let hdr = Header { slave };
    let response = ExceptionResponse::try_from(pdu)
        .map(|er| ResponsePdu(Err(er)))
        .or_else(|_| Response::try_from(pdu).map(|r| ResponsePdu(Ok(r))))
        .map(|pdu| ResponseAdu { hdr, pdu });
    #[cfg(feature = "log")]
    if let Err(err) = response {
        log::error!("Failed to decode response PDU: {err}");
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_write_single_register_request() {
        let buf = &mut [0; 40];
        let len = encode_request(
            RequestAdu {
                hdr: Header { slave: 0x01 },
                pdu: RequestPdu(Request::WriteSingleRegister(0x0100, 0x1770)),
            },
            buf,
        )
        .expect("Error encoding request");
        assert_eq!(&buf[..len], b":01060100177071\r\n");
    }

    #[test]
    fn encode_read_holding_registers_request() {
        let buf = &mut [0; 40];
        let len = encode_request(
            RequestAdu {
                hdr: Header { slave: 0x01 },
                pdu: RequestPdu(Request::ReadHoldingRegisters(0x0010, 1)),
            },
            buf,
        )
        .unwrap();
        assert_eq!(&buf[..len], b":010300100001EB\r\n");
    }

    #[test]
    fn encode_request_into_small_buffer() {
        let buf = &mut [0; 10];
        let res = encode_request(
            RequestAdu {
                hdr: Header { slave: 0x01 },
                pdu: RequestPdu(Request::ReadHoldingRegisters(0x0010, 1)),
            },
            buf,
        );
        assert_eq!(res.err().unwrap(), Error::BufferOverflow);
    }

    #[test]
    fn decode_read_holding_registers_response() {
        let buf = &mut [0; MAX_ADU_LEN];
        let adu = decode_response(b":010304AA0011112C\r\n", buf).unwrap();
        let ResponseAdu { hdr, pdu } = adu;
        assert_eq!(hdr.slave, 0x01);
        let ResponsePdu(Ok(Response::ReadHoldingRegisters(data))) = pdu else {
            panic!("unexpected response {pdu:?}");
        };
        assert_eq!(data.get(0), Some(0xAA00));
        assert_eq!(data.get(1), Some(0x1111));
    }

    #[test]
    fn decode_exception_response() {
        let buf = &mut [0; MAX_ADU_LEN];
        let adu = decode_response(b":0183017B\r\n", buf).unwrap();
        assert_eq!(
            adu.pdu,
            ResponsePdu(Err(ExceptionResponse {
                function: FunctionCode::ReadHoldingRegisters,
                exception: Exception::IllegalFunction,
            }))
        );
    }

    #[test]
    fn decode_bad_lrc_response() {
        let buf = &mut [0; MAX_ADU_LEN];
        assert!(matches!(
            decode_response(b":01060100177070\r\n", buf),
            Err(Error::ChecksumInvalid(0x70, 0x71))
        ));
    }
}
