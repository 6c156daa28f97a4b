//! Wire primitives shared by the NAR format and the daemon protocol.
//!
//! Integers are 8 bytes little-endian. Byte strings are prefixed by their
//! length as such an integer and followed by zero bytes up to the next
//! multiple of 8, so the empty string is eight zero bytes.

use std::io::{self, Read, Write};

use bytes::Bytes;
use thiserror::Error;

/// Zero bytes for padding.
pub const ZEROS: [u8; 8] = [0u8; 8];

pub const fn calc_aligned(len: u64) -> u64 {
    len.wrapping_add(7) & !7
}

pub const fn calc_padding(len: u64) -> usize {
    let aligned = calc_aligned(len);
    aligned.wrapping_sub(len) as usize
}

#[derive(Error, Debug)]
pub enum WireError {
    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("string too long: {length} exceeds maximum {max}")]
    TooLong { length: u64, max: u64 },

    #[error("non-zero padding")]
    NonZeroPadding,

    #[error("IO error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for WireError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            WireError::UnexpectedEof
        } else {
            WireError::Io(err)
        }
    }
}

pub fn write_u64<W: Write + ?Sized>(writer: &mut W, value: u64) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

pub fn read_u64<R: Read + ?Sized>(reader: &mut R) -> Result<u64, WireError> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Write the zero padding that follows `len` bytes of payload.
pub fn write_padding<W: Write + ?Sized>(writer: &mut W, len: u64) -> io::Result<()> {
    let padding = calc_padding(len);
    if padding > 0 {
        writer.write_all(&ZEROS[..padding])?;
    }
    Ok(())
}

/// Read and check the padding that follows `len` bytes of payload.
pub fn read_padding<R: Read + ?Sized>(reader: &mut R, len: u64) -> Result<(), WireError> {
    let padding = calc_padding(len);
    if padding > 0 {
        let mut buf = [0u8; 8];
        reader.read_exact(&mut buf[..padding])?;
        if buf[..padding] != ZEROS[..padding] {
            return Err(WireError::NonZeroPadding);
        }
    }
    Ok(())
}

pub fn write_bytes<W: Write + ?Sized>(writer: &mut W, data: &[u8]) -> io::Result<()> {
    let len = data.len() as u64;
    write_u64(writer, len)?;
    writer.write_all(data)?;
    write_padding(writer, len)
}

/// Read a byte string of at most `max` bytes.
///
/// The length is checked before anything is allocated, so an oversized
/// prefix never causes a large read.
pub fn read_bytes<R: Read + ?Sized>(reader: &mut R, max: u64) -> Result<Bytes, WireError> {
    let length = read_u64(reader)?;
    if length > max {
        return Err(WireError::TooLong { length, max });
    }
    let mut buf = vec![0u8; length as usize];
    reader.read_exact(&mut buf)?;
    read_padding(reader, length)?;
    Ok(Bytes::from(buf))
}

#[cfg(test)]
mod unittests {
    use std::io::Cursor;

    use hex_literal::hex;
    use proptest::prelude::*;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::empty(b"", &hex!("0000 0000 0000 0000"))]
    #[case::one(b")", &hex!("0100 0000 0000 0000 2900 0000 0000 0000"))]
    #[case::seven(b"regular", &hex!("0700 0000 0000 0000 7265 6775 6c61 7200"))]
    #[case::eight(b"contents", &hex!("0800 0000 0000 0000 636f 6e74 656e 7473"))]
    #[case::nine(b"directory", &hex!("0900 0000 0000 0000 6469 7265 6374 6f72 7900 0000 0000 0000"))]
    fn test_write_bytes(#[case] data: &[u8], #[case] expected: &[u8]) {
        let mut out = Vec::new();
        write_bytes(&mut out, data).unwrap();
        assert_eq!(out, expected);
    }

    #[rstest]
    #[case(0, 0)]
    #[case(1, 7)]
    #[case(3, 5)]
    #[case(7, 1)]
    #[case(8, 0)]
    #[case(9, 7)]
    fn test_calc_padding(#[case] len: u64, #[case] padding: usize) {
        assert_eq!(calc_padding(len), padding);
        assert_eq!(calc_aligned(len), len + padding as u64);
    }

    #[test]
    fn test_read_u64() {
        let mut cursor = Cursor::new(hex!("2a00 0000 0000 0001"));
        assert_eq!(read_u64(&mut cursor).unwrap(), 0x0100_0000_0000_002a);
    }

    #[test]
    fn test_read_u64_short() {
        let mut cursor = Cursor::new(hex!("2a00 0000"));
        assert!(matches!(read_u64(&mut cursor), Err(WireError::UnexpectedEof)));
    }

    #[test]
    fn test_read_bytes_too_long() {
        let mut cursor = Cursor::new(hex!("2100 0000 0000 0000"));
        match read_bytes(&mut cursor, 32) {
            Err(WireError::TooLong { length, max }) => {
                assert_eq!(length, 33);
                assert_eq!(max, 32);
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_read_bytes_at_limit() {
        let mut out = Vec::new();
        write_bytes(&mut out, &[b'x'; 32]).unwrap();
        let s = read_bytes(&mut Cursor::new(out), 32).unwrap();
        assert_eq!(&s[..], &[b'x'; 32]);
    }

    #[test]
    fn test_read_bytes_missing_padding() {
        let mut cursor = Cursor::new(hex!("0100 0000 0000 0000 2900 00"));
        assert!(matches!(
            read_bytes(&mut cursor, 32),
            Err(WireError::UnexpectedEof)
        ));
    }

    #[test]
    fn test_read_bytes_non_zero_padding() {
        let mut cursor = Cursor::new(hex!("0100 0000 0000 0000 2900 0000 0000 0001"));
        assert!(matches!(
            read_bytes(&mut cursor, 32),
            Err(WireError::NonZeroPadding)
        ));
    }

    proptest! {
        #[test]
        fn proptest_bytes_are_aligned(data in proptest::collection::vec(any::<u8>(), 0..100)) {
            let mut out = Vec::new();
            write_bytes(&mut out, &data).unwrap();
            prop_assert_eq!(out.len() % 8, 0);
            prop_assert_eq!(out.len() as u64, 8 + calc_aligned(data.len() as u64));

            let mut cursor = Cursor::new(&out);
            let read = read_bytes(&mut cursor, 100).unwrap();
            prop_assert_eq!(&read[..], &data[..]);
            prop_assert_eq!(cursor.position(), out.len() as u64);
        }
    }
}
