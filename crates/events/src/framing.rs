//! Message framing for the wire protocol.
//!
//! Two framings are supported. `lines` is newline-delimited JSON, which is
//! what the instrumented Raft node writes. `length-prefixed` wraps each
//! JSON record in a 9-byte header (4 bytes length, 1 byte frame type,
//! 4 bytes CRC32 checksum) for deployments that need integrity checks.

use std::io;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

use crate::error::Error;

/// Default maximum frame (or line) size: 1MB.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Frame header size (4 bytes length + 1 byte type + 4 bytes checksum).
pub const FRAME_HEADER_SIZE: usize = 9;

/// Framing used on the connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Framing {
    /// One JSON record per line.
    #[default]
    Lines,
    /// Length-prefixed, checksummed frames.
    LengthPrefixed,
}

/// Type of a length-prefixed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    /// Event record sent by the monitored node.
    Record = 0x01,
    /// Acknowledgement sent by the agent.
    Ack = 0x02,
}

impl TryFrom<u8> for FrameType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Error> {
        match value {
            0x01 => Ok(Self::Record),
            0x02 => Ok(Self::Ack),
            _ => Err(Error::UnknownFrameType(value)),
        }
    }
}

fn invalid_data(err: Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}

/// Codec for checksummed length-prefixed frames.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_size: usize,
    outbound: FrameType,
}

impl FrameCodec {
    /// Create a codec that writes acknowledgement frames.
    #[must_use]
    pub const fn new(max_frame_size: usize) -> Self {
        Self {
            max_frame_size,
            outbound: FrameType::Ack,
        }
    }

    /// Set the frame type used for outgoing frames.
    #[must_use]
    pub const fn sending(mut self, frame_type: FrameType) -> Self {
        self.outbound = frame_type;
        self
    }
}

impl Decoder for FrameCodec {
    type Item = (FrameType, Bytes);
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        // Parse header without consuming
        let mut header = &buf[..FRAME_HEADER_SIZE];
        let payload_len = header.get_u32() as usize;
        let frame_type_byte = header.get_u8();
        let checksum = header.get_u32();

        if payload_len > self.max_frame_size {
            return Err(invalid_data(Error::FrameTooLarge {
                size: payload_len,
                max: self.max_frame_size,
            }));
        }

        let frame_len = FRAME_HEADER_SIZE + payload_len;
        if buf.len() < frame_len {
            buf.reserve(frame_len - buf.len());
            return Ok(None);
        }

        let frame_type = FrameType::try_from(frame_type_byte).map_err(invalid_data)?;

        buf.advance(FRAME_HEADER_SIZE);
        let payload = buf.split_to(payload_len).freeze();

        // A zero checksum means the sender did not compute one
        if checksum != 0 {
            let actual = crc32fast::hash(&payload);
            if actual != checksum {
                return Err(invalid_data(Error::ChecksumMismatch {
                    expected: checksum,
                    actual,
                }));
            }
        }

        Ok(Some((frame_type, payload)))
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, payload: Bytes, buf: &mut BytesMut) -> Result<(), Self::Error> {
        let payload_len = payload.len();
        if payload_len > self.max_frame_size {
            return Err(invalid_data(Error::FrameTooLarge {
                size: payload_len,
                max: self.max_frame_size,
            }));
        }

        buf.reserve(FRAME_HEADER_SIZE + payload_len);

        #[allow(clippy::cast_possible_truncation)]
        buf.put_u32(payload_len as u32);
        buf.put_u8(self.outbound as u8);
        buf.put_u32(crc32fast::hash(&payload));
        buf.put(payload);

        Ok(())
    }
}

#[derive(Debug)]
enum Inner {
    Lines(LinesCodec),
    LengthPrefixed(FrameCodec),
}

/// Codec yielding raw record payloads for either [`Framing`].
///
/// Payloads are left undecoded so a malformed record can be skipped without
/// tearing down the stream.
#[derive(Debug)]
pub struct WireCodec {
    inner: Inner,
    max_frame_size: usize,
}

impl WireCodec {
    /// Create a codec for `framing` with the default maximum frame size.
    #[must_use]
    pub fn new(framing: Framing) -> Self {
        Self::with_max_frame_size(framing, MAX_FRAME_SIZE)
    }

    /// Create a codec with a custom maximum frame size.
    #[must_use]
    pub fn with_max_frame_size(framing: Framing, max_frame_size: usize) -> Self {
        let inner = match framing {
            Framing::Lines => Inner::Lines(LinesCodec::new_with_max_length(max_frame_size)),
            Framing::LengthPrefixed => Inner::LengthPrefixed(FrameCodec::new(max_frame_size)),
        };
        Self {
            inner,
            max_frame_size,
        }
    }

    /// Set the frame type written by a length-prefixed codec.
    ///
    /// The agent writes [`FrameType::Ack`]; a peer playing the monitored
    /// node writes [`FrameType::Record`]. Has no effect on line framing.
    #[must_use]
    pub fn sending(mut self, frame_type: FrameType) -> Self {
        if let Inner::LengthPrefixed(codec) = &mut self.inner {
            *codec = codec.sending(frame_type);
        }
        self
    }

    fn lines_error(max_frame_size: usize, err: LinesCodecError) -> io::Error {
        match err {
            LinesCodecError::Io(e) => e,
            LinesCodecError::MaxLineLengthExceeded => invalid_data(Error::FrameTooLarge {
                size: max_frame_size + 1,
                max: max_frame_size,
            }),
        }
    }

    fn next_line(
        &mut self,
        buf: &mut BytesMut,
        eof: bool,
    ) -> Result<Option<Bytes>, io::Error> {
        let max_frame_size = self.max_frame_size;
        let Inner::Lines(codec) = &mut self.inner else {
            return Ok(None);
        };

        loop {
            let line = if eof {
                codec.decode_eof(buf)
            } else {
                codec.decode(buf)
            };
            match line {
                // Blank lines carry no record
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => return Ok(Some(Bytes::from(line.into_bytes()))),
                Ok(None) => return Ok(None),
                Err(e) => return Err(Self::lines_error(max_frame_size, e)),
            }
        }
    }
}

impl Decoder for WireCodec {
    type Item = Bytes;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Inner::LengthPrefixed(codec) = &mut self.inner {
            return Ok(codec.decode(buf)?.map(|(_, payload)| payload));
        }
        self.next_line(buf, false)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Inner::LengthPrefixed(codec) = &mut self.inner {
            return Ok(codec.decode_eof(buf)?.map(|(_, payload)| payload));
        }
        self.next_line(buf, true)
    }
}

impl Encoder<Bytes> for WireCodec {
    type Error = io::Error;

    fn encode(&mut self, payload: Bytes, buf: &mut BytesMut) -> Result<(), Self::Error> {
        match &mut self.inner {
            Inner::Lines(_) => {
                if payload.len() > self.max_frame_size {
                    return Err(invalid_data(Error::FrameTooLarge {
                        size: payload.len(),
                        max: self.max_frame_size,
                    }));
                }
                buf.reserve(payload.len() + 1);
                buf.put(payload);
                buf.put_u8(b'\n');
                Ok(())
            }
            Inner::LengthPrefixed(codec) => codec.encode(payload, buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_split_records() {
        let mut codec = WireCodec::new(Framing::Lines);
        let mut buf = BytesMut::from(&b"{\"a\":1}\n\n{\"b\":2}\n{\"c\""[..]);

        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), Bytes::from("{\"a\":1}"));
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), Bytes::from("{\"b\":2}"));
        // Incomplete trailing record waits for more data
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_lines_encode_appends_newline() {
        let mut codec = WireCodec::new(Framing::Lines);
        let mut buf = BytesMut::new();
        codec.encode(Bytes::from("{}"), &mut buf).unwrap();

        assert_eq!(&buf[..], b"{}\n");
    }

    #[test]
    fn test_lines_too_long() {
        let mut codec = WireCodec::with_max_frame_size(Framing::Lines, 4);
        let mut buf = BytesMut::from(&b"0123456789\n"[..]);

        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn test_length_prefixed_frame() {
        let mut node = WireCodec::new(Framing::LengthPrefixed).sending(FrameType::Record);
        let mut agent = WireCodec::new(Framing::LengthPrefixed);
        let mut buf = BytesMut::new();

        node.encode(Bytes::from("{\"messageType\":\"HEARTBEAT\"}"), &mut buf)
            .unwrap();
        assert_eq!(buf[4], FrameType::Record as u8);

        let payload = agent.decode(&mut buf).unwrap().unwrap();
        assert_eq!(payload, Bytes::from("{\"messageType\":\"HEARTBEAT\"}"));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_partial_frame() {
        let mut codec = WireCodec::new(Framing::LengthPrefixed);
        let mut buf = BytesMut::new();

        buf.put_u32(100);
        buf.put_u8(FrameType::Record as u8);

        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_checksum_verification() {
        let mut codec = WireCodec::new(Framing::LengthPrefixed);
        let mut buf = BytesMut::new();

        let payload = b"{}";
        #[allow(clippy::cast_possible_truncation)]
        buf.put_u32(payload.len() as u32);
        buf.put_u8(FrameType::Record as u8);
        buf.put_u32(12345);
        buf.put_slice(payload);

        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut codec = WireCodec::with_max_frame_size(Framing::LengthPrefixed, 8);
        let mut buf = BytesMut::new();
        buf.put_u32(64);
        buf.put_u8(FrameType::Record as u8);
        buf.put_u32(0);

        let err = codec.decode(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
