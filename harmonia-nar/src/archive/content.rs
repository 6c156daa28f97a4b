use std::io::{self, Read};

/// A file payload of known length.
///
/// [`NarSink::file`](super::NarSink::file) receives one of these. The
/// declared length is available up front through [`remaining`] so that a
/// writer can emit it before streaming the bytes.
///
/// [`remaining`]: ContentRead::remaining
pub trait ContentRead: Read {
    /// Number of payload bytes not yet read.
    fn remaining(&self) -> u64;
}

/// Exposes exactly `n` bytes of an underlying reader.
///
/// Reads never go past the declared length, and an inner reader running dry
/// before it is reached yields [`io::ErrorKind::UnexpectedEof`] instead of a
/// short, successful stream.
#[derive(Debug)]
pub struct ContentReader<R> {
    inner: R,
    remaining: u64,
}

impl<R> ContentReader<R> {
    pub fn new(inner: R, len: u64) -> Self {
        Self {
            inner,
            remaining: len,
        }
    }
}

impl<R: Read> ContentReader<R> {
    /// Discard whatever the consumer did not read, returning how much that was.
    pub fn drain(&mut self) -> io::Result<u64> {
        io::copy(self, &mut io::sink())
    }
}

impl<R: Read> Read for ContentReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let max = usize::try_from(self.remaining)
            .unwrap_or(usize::MAX)
            .min(buf.len());
        let n = self.inner.read(&mut buf[..max])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("content ended with {} bytes missing", self.remaining),
            ));
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}

impl<R: Read> ContentRead for ContentReader<R> {
    fn remaining(&self) -> u64 {
        self.remaining
    }
}

#[cfg(test)]
mod unittests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_stops_at_declared_length() {
        let mut inner = Cursor::new(b"hello world".to_vec());
        let mut reader = ContentReader::new(&mut inner, 5);
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"hello");
        assert_eq!(reader.remaining(), 0);
        assert_eq!(inner.position(), 5);
    }

    #[test]
    fn test_counts_down() {
        let mut reader = ContentReader::new(&b"abcdef"[..], 6);
        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf).unwrap(), 4);
        assert_eq!(reader.remaining(), 2);
        assert_eq!(reader.read(&mut buf).unwrap(), 2);
        assert_eq!(reader.remaining(), 0);
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_source_runs_dry() {
        let mut reader = ContentReader::new(&b"abc"[..], 10);
        let mut buf = Vec::new();
        let err = reader.read_to_end(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert_eq!(buf, b"abc");
        assert_eq!(reader.remaining(), 7);
    }

    #[test]
    fn test_empty() {
        let mut reader = ContentReader::new(&b""[..], 0);
        let mut buf = [0u8; 8];
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_drain() {
        let mut inner = Cursor::new(b"0123456789".to_vec());
        let mut reader = ContentReader::new(&mut inner, 8);
        let mut buf = [0u8; 3];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(reader.drain().unwrap(), 5);
        assert_eq!(reader.remaining(), 0);
        assert_eq!(inner.position(), 8);
    }
}
