use std::io::{self, Read};

use crate::error::{Error, Result};
use crate::time::Time;

/// Size in bytes of a chunk header: a 64-bit big-endian PTS followed by a
/// 32-bit big-endian payload length.
pub const HEADER_SIZE: usize = 12;

/// A decoded chunk header, prior to reading its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub pts: Time,
    pub len: u32,
}

impl ChunkHeader {
    /// Decode a 12-byte wire header.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is not exactly [`HEADER_SIZE`] long; callers always
    /// pass a fixed-size buffer read by [`recv_header`].
    pub fn decode(bytes: &[u8; HEADER_SIZE]) -> Result<Self> {
        let pts = u64::from_be_bytes(bytes[0..8].try_into().unwrap());
        let len = u32::from_be_bytes(bytes[8..12].try_into().unwrap());
        if len == 0 {
            return Err(Error::EmptyPayload);
        }
        Ok(Self {
            pts: Time::from_wire(pts),
            len,
        })
    }
}

/// Read exactly `buf.len()` bytes from `reader`, retrying short reads until
/// the buffer is full or the connection is lost.
///
/// Returns `Ok(false)` if the peer closed the connection before any byte of
/// this call was read (a clean EOF at a chunk boundary); returns `Err` for
/// any other I/O failure, including an EOF in the middle of a chunk (§4.1:
/// "EOF or short read -> terminate cleanly" applies only at chunk
/// boundaries, a mid-chunk EOF is a protocol violation).
pub fn recv_all(reader: &mut impl Read, buf: &mut [u8]) -> Result<bool> {
    let mut read = 0;
    while read < buf.len() {
        match reader.read(&mut buf[read..]) {
            Ok(0) => {
                if read == 0 {
                    return Ok(false);
                }
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed mid-chunk",
                )));
            }
            Ok(n) => read += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Io(e)),
        }
    }
    Ok(true)
}

/// Read one chunk header from `reader`. Returns `Ok(None)` on a clean EOF at
/// the chunk boundary (the normal way the stream worker learns to stop).
pub fn recv_header(reader: &mut impl Read) -> Result<Option<ChunkHeader>> {
    let mut bytes = [0u8; HEADER_SIZE];
    if !recv_all(reader, &mut bytes)? {
        return Ok(None);
    }
    Ok(Some(ChunkHeader::decode(&bytes)?))
}

/// Read `len` bytes of chunk payload from `reader`. Unlike the header read,
/// an EOF here is always a protocol violation, since the header promised
/// `len` bytes would follow.
pub fn recv_payload(reader: &mut impl Read, len: u32) -> Result<Vec<u8>> {
    let mut payload = vec![0u8; len as usize];
    if !recv_all(reader, &mut payload)? {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed before payload was fully read",
        )));
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn decodes_data_chunk_header() {
        let bytes: [u8; HEADER_SIZE] = [
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0xE8, 0x00, 0x00, 0x00, 0x02,
        ];
        let header = ChunkHeader::decode(&bytes).unwrap();
        assert_eq!(header.pts.value(), Some(1000));
        assert_eq!(header.len, 2);
    }

    #[test]
    fn decodes_config_chunk_header_with_unset_sentinel() {
        let mut bytes = [0xFFu8; HEADER_SIZE];
        bytes[8..12].copy_from_slice(&1u32.to_be_bytes());
        let header = ChunkHeader::decode(&bytes).unwrap();
        assert!(!header.pts.has_value());
    }

    #[test]
    fn rejects_zero_length_payload() {
        let bytes: [u8; HEADER_SIZE] = [0; HEADER_SIZE];
        assert!(matches!(ChunkHeader::decode(&bytes), Err(Error::EmptyPayload)));
    }

    #[test]
    fn recv_all_retries_short_reads() {
        struct Chunky(Vec<u8>, usize);
        impl Read for Chunky {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if self.1 >= self.0.len() {
                    return Ok(0);
                }
                let n = buf.len().min(1).min(self.0.len() - self.1);
                buf[..n].copy_from_slice(&self.0[self.1..self.1 + n]);
                self.1 += n;
                Ok(n)
            }
        }
        let mut reader = Chunky(vec![1, 2, 3, 4], 0);
        let mut buf = [0u8; 4];
        assert!(recv_all(&mut reader, &mut buf).unwrap());
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn clean_eof_at_chunk_boundary_returns_none() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        assert!(recv_header(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn framing_s3_data_chunk() {
        let mut cursor = Cursor::new(vec![
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0xE8, 0x00, 0x00, 0x00, 0x02, 0xDE, 0xAD,
        ]);
        let header = recv_header(&mut cursor).unwrap().unwrap();
        assert_eq!(header.pts.value(), Some(1000));
        let payload = recv_payload(&mut cursor, header.len).unwrap();
        assert_eq!(payload, vec![0xDE, 0xAD]);
    }

    #[test]
    fn framing_s3_config_chunk() {
        let mut cursor = Cursor::new(vec![
            0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x01, 0x67,
        ]);
        let header = recv_header(&mut cursor).unwrap().unwrap();
        assert!(!header.pts.has_value());
        let payload = recv_payload(&mut cursor, header.len).unwrap();
        assert_eq!(payload, vec![0x67]);
    }
}
