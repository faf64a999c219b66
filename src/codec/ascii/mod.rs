// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus ASCII
//!
//! | Field    | Characters | Content                              |
//! |----------|------------|--------------------------------------|
//! | Start    | 1          | `:` (`0x3A`)                         |
//! | Address  | 2          | slave address                        |
//! | Function | 2          | function code                        |
//! | Data     | 2 * n      | PDU data                             |
//! | LRC      | 2          | two's complement of the byte sum     |
//! | End      | 2          | CR LF (`0x0D 0x0A`)                  |

use super::*;

pub mod client;
pub mod server;
pub use crate::frame::ascii::*;

/// Start delimiter.
pub const START: u8 = b':';
/// Carriage return, kept inside a received line.
pub const CR: u8 = 0x0D;
/// Line feed, the line terminator.
pub const LF: u8 = 0x0A;

// [MODBUS over Serial Line Specification and Implementation Guide V1.02](http://modbus.org/docs/Modbus_over_serial_line_V1_02.pdf), page 17
// "The maximum size of a MODBUS ASCII frame is 513 characters."
pub const MAX_FRAME_LEN: usize = 513;

/// Maximum number of binary bytes (address + PDU) in one frame, LRC excluded.
pub const MAX_ADU_LEN: usize = 254;

/// Maximum quantity of holding registers in one read request.
pub const MAX_READ_QUANTITY: usize = 125;

const DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// An extracted ASCII PDU frame.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedFrame<'a> {
    pub slave: SlaveId,
    pub pdu: &'a [u8],
}

/// Calculate the LRC (Longitudinal Redundancy Check).
///
/// This is the 8-bit two's complement of the sum of all bytes modulo 2^8.
#[must_use]
pub fn lrc(data: &[u8]) -> u8 {
    data.iter()
        .fold(0u8, |sum, byte| sum.wrapping_add(*byte))
        .wrapping_neg()
}

/// Convert a byte into two uppercase ASCII hex digits.
#[must_use]
pub const fn encode_hex_pair(byte: u8) -> [u8; 2] {
    [DIGITS[(byte >> 4) as usize], DIGITS[(byte & 0x0F) as usize]]
}

const fn hex_digit(c: u8) -> Result<u8> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        _ => Err(Error::HexDigit(c)),
    }
}

/// Convert two ASCII hex digits into a byte.
pub const fn decode_hex_pair(pair: [u8; 2]) -> Result<u8> {
    let hi = match hex_digit(pair[0]) {
        Ok(d) => d,
        Err(err) => return Err(err),
    };
    let lo = match hex_digit(pair[1]) {
        Ok(d) => d,
        Err(err) => return Err(err),
    };
    Ok(hi << 4 | lo)
}

/// Encode the binary bytes of a frame (address, function code and data)
/// into a complete ASCII line including LRC and CR LF.
///
/// Returns the number of characters written. A frame carries at least
/// the address and the function code.
pub fn encode(adu: &[u8], buf: &mut [u8]) -> Result<usize> {
    if adu.len() < 2 {
        return Err(Error::Truncated);
    }
    if adu.len() > MAX_ADU_LEN {
        return Err(Error::BufferOverflow);
    }
    let len = adu.len() * 2 + 5;
    if buf.len() < len {
        return Err(Error::BufferOverflow);
    }
    buf[0] = START;
    for (i, byte) in adu.iter().enumerate() {
        buf[1 + i * 2..3 + i * 2].copy_from_slice(&encode_hex_pair(*byte));
    }
    buf[len - 4..len - 2].copy_from_slice(&encode_hex_pair(lrc(adu)));
    buf[len - 2] = CR;
    buf[len - 1] = LF;
    Ok(len)
}

/// Strip delimiters and return the hex payload (address .. LRC) of a line.
///
/// The trailing LF is optional since it usually terminates the line read.
fn hex_payload(line: &[u8]) -> Result<&[u8]> {
    let line = line.strip_suffix(&[LF]).unwrap_or(line);
    let Some(line) = line.strip_suffix(&[CR]) else {
        return Err(Error::Framing);
    };
    let Some(hex) = line.strip_prefix(&[START]) else {
        return Err(Error::Framing);
    };
    if hex.len() % 2 != 0 {
        return Err(Error::Framing);
    }
    // address, function code and LRC
    if hex.len() < 6 {
        return Err(Error::Truncated);
    }
    Ok(hex)
}

/// Decode an ASCII line into `buf` and verify its LRC.
///
/// On success the returned frame borrows the decoded bytes from `buf`.
pub fn decode<'b>(line: &[u8], buf: &'b mut [u8]) -> Result<DecodedFrame<'b>> {
    let hex = hex_payload(line)?;
    let len = hex.len() / 2;
    if buf.len() < len {
        return Err(Error::BufferOverflow);
    }
    for (i, pair) in hex.chunks_exact(2).enumerate() {
        buf[i] = decode_hex_pair([pair[0], pair[1]])?;
    }
    let buf: &'b [u8] = buf;
    let (adu, lrc_buf) = buf[..len].split_at(len - 1);
    let expected = lrc_buf[0];
    let actual = lrc(adu);
    if expected != actual {
        return Err(Error::ChecksumInvalid(expected, actual));
    }
    let (slave, pdu) = adu.split_at(1);
    Ok(DecodedFrame {
        slave: slave[0],
        pdu,
    })
}

/// Check the trailing LRC field of a line against its payload.
#[must_use]
pub fn verify(line: &[u8]) -> bool {
    let buf = &mut [0; MAX_ADU_LEN + 1];
    decode(line, buf).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calc_lrc() {
        assert_eq!(lrc(&[]), 0x00);
        assert_eq!(lrc(&[0x01, 0x06, 0x01, 0x00, 0x17, 0x70]), 0x71);
        assert_eq!(lrc(&[0x01, 0x03, 0x00, 0x10, 0x00, 0x01]), 0xEB);
        // sum is 0x100 and wraps to zero
        assert_eq!(lrc(&[0xFF, 0x01]), 0x00);
    }

    #[test]
    fn hex_pairs() {
        assert_eq!(encode_hex_pair(0x1B), *b"1B");
        assert_eq!(encode_hex_pair(0x00), *b"00");
        assert_eq!(encode_hex_pair(0xFF), *b"FF");
        assert_eq!(decode_hex_pair(*b"1B").unwrap(), 0x1B);
        assert_eq!(decode_hex_pair(*b"fe").unwrap(), 0xFE);
        assert_eq!(decode_hex_pair(*b"aF").unwrap(), 0xAF);
        assert_eq!(decode_hex_pair(*b"G0").err().unwrap(), Error::HexDigit(b'G'));
        assert_eq!(decode_hex_pair(*b"0:").err().unwrap(), Error::HexDigit(b':'));
        assert_eq!(decode_hex_pair(*b" 1").err().unwrap(), Error::HexDigit(b' '));
    }

    #[test]
    fn encode_write_single_register_frame() {
        let buf = &mut [0; 32];
        let len = encode(&[0x01, 0x06, 0x01, 0x00, 0x17, 0x70], buf).unwrap();
        assert_eq!(len, 17);
        assert_eq!(&buf[..len], b":01060100177071\r\n");
    }

    #[test]
    fn encode_rejects_small_buffer() {
        let buf = &mut [0; 16];
        assert_eq!(
            encode(&[0x01, 0x06, 0x01, 0x00, 0x17, 0x70], buf)
                .err()
                .unwrap(),
            Error::BufferOverflow
        );
        // untouched
        assert_eq!(buf, &[0; 16]);
    }

    #[test]
    fn encode_then_decode() {
        let adu: &[u8] = &[0x11, 0x03, 0x06, 0xAE, 0x41, 0x56, 0x52, 0x43, 0x40];
        let line = &mut [0; MAX_FRAME_LEN];
        let len = encode(adu, line).unwrap();
        assert!(verify(&line[..len]));

        let buf = &mut [0; MAX_ADU_LEN + 1];
        let frame = decode(&line[..len], buf).unwrap();
        assert_eq!(frame.slave, 0x11);
        assert_eq!(frame.pdu, &adu[1..]);
    }

    #[test]
    fn encode_then_decode_all_byte_values() {
        let adu = &mut [0; MAX_ADU_LEN];
        let line = &mut [0; MAX_FRAME_LEN];
        let buf = &mut [0; MAX_ADU_LEN + 1];
        for adu_len in [2, 3, 4, 5, 6, 7, 8, 9, 16, 31, 64, 100, 127, 128, 200, 253, 254] {
            // every position takes every byte value once over all offsets
            for offset in 0..=u8::MAX {
                for (i, byte) in adu[..adu_len].iter_mut().enumerate() {
                    *byte = offset.wrapping_add((i as u8).wrapping_mul(97));
                }
                let adu = &adu[..adu_len];
                let len = encode(adu, line).unwrap();
                assert_eq!(len, adu_len * 2 + 5);
                assert!(verify(&line[..len]), "{adu:02X?}");
                let frame = decode(&line[..len], buf).unwrap();
                assert_eq!(frame.slave, adu[0]);
                assert_eq!(frame.pdu, &adu[1..]);
            }
        }
    }

    #[test]
    fn encode_rejects_frame_without_function_code() {
        let buf = &mut [0; 16];
        assert_eq!(encode(&[], buf).err().unwrap(), Error::Truncated);
        assert_eq!(encode(&[0x01], buf).err().unwrap(), Error::Truncated);
        assert_eq!(buf, &[0; 16]);
    }

    #[test]
    fn encode_rejects_oversized_frame() {
        let adu = &[0x00; MAX_ADU_LEN + 1];
        let buf = &mut [0; MAX_FRAME_LEN + 2];
        assert_eq!(encode(adu, buf).err().unwrap(), Error::BufferOverflow);
    }

    #[test]
    fn verify_shortest_frame() {
        let line = &mut [0; 16];
        let len = encode(&[0x01, 0x06], line).unwrap();
        assert_eq!(&line[..len], b":0106F9\r\n");
        assert!(verify(&line[..len]));
    }

    #[test]
    fn decode_without_line_feed() {
        let buf = &mut [0; 8];
        let frame = decode(b":01060100177071\r", buf).unwrap();
        assert_eq!(frame.slave, 0x01);
        assert_eq!(frame.pdu, &[0x06, 0x01, 0x00, 0x17, 0x70]);
    }

    #[test]
    fn decode_lowercase_digits() {
        let buf = &mut [0; 8];
        let frame = decode(b":010300100001eb\r\n", buf).unwrap();
        assert_eq!(frame.pdu, &[0x03, 0x00, 0x10, 0x00, 0x01]);
    }

    #[test]
    fn decode_bad_lrc() {
        let buf = &mut [0; 8];
        assert_eq!(
            decode(b":01060100177072\r\n", buf).err().unwrap(),
            Error::ChecksumInvalid(0x72, 0x71)
        );
        assert!(!verify(b":01060100177072\r\n"));
    }

    #[test]
    fn decode_malformed_lines() {
        let buf = &mut [0; 8];
        // missing start delimiter
        assert_eq!(
            decode(b"01060100177071\r\n", buf).err().unwrap(),
            Error::Framing
        );
        // missing CR
        assert_eq!(
            decode(b":01060100177071\n", buf).err().unwrap(),
            Error::Framing
        );
        // odd number of digits
        assert_eq!(
            decode(b":0106010017707\r\n", buf).err().unwrap(),
            Error::Framing
        );
        // no room for address, function and LRC
        assert_eq!(decode(b":01FF\r\n", buf).err().unwrap(), Error::Truncated);
        // invalid digit
        assert_eq!(
            decode(b":01060100177X71\r\n", buf).err().unwrap(),
            Error::HexDigit(b'X')
        );
        assert!(!verify(b""));
    }

    #[test]
    fn decode_rejects_small_buffer() {
        let buf = &mut [0; 6];
        assert_eq!(
            decode(b":01060100177071\r\n", buf).err().unwrap(),
            Error::BufferOverflow
        );
    }

    #[test]
    fn encode_largest_frame() {
        let adu = &[0xA5; MAX_ADU_LEN];
        let line = &mut [0; MAX_FRAME_LEN];
        assert_eq!(encode(adu, line).unwrap(), MAX_FRAME_LEN);
        assert!(verify(line));
    }
}
