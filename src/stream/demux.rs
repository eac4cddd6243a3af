//! Frame codec for the container runtime's combined log stream.
//!
//! Non-TTY containers interleave stdout and stderr on one connection using a
//! simple frame format: an 8-byte header — stream selector (1 byte), three
//! reserved bytes, payload length as a big-endian u32 — followed by that
//! many payload bytes. [`FrameCodec`] decodes that format and routes each
//! payload to the correct logical stream; the matching encoder writes it,
//! which is how engine adapters and tests produce wire-format feeds.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::{AppError, Result};

/// Length of the frame header in bytes.
pub const HEADER_LEN: usize = 8;

/// Maximum accepted payload length: 1 MiB.
///
/// A header announcing a longer payload is treated as malformed rather than
/// allocating, protecting the session from absurd lengths on a corrupted
/// stream.
pub const MAX_FRAME_BYTES: usize = 1_048_576;

/// Logical stream a frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSource {
    /// Input echoed back by the runtime.
    Stdin,
    /// The process's standard output.
    Stdout,
    /// The process's standard error.
    Stderr,
}

impl StreamSource {
    /// Map a header selector byte to its logical stream.
    #[must_use]
    pub fn from_selector(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Stdin),
            1 => Some(Self::Stdout),
            2 => Some(Self::Stderr),
            _ => None,
        }
    }

    /// The selector byte written into a frame header.
    #[must_use]
    pub fn selector(self) -> u8 {
        match self {
            Self::Stdin => 0,
            Self::Stdout => 1,
            Self::Stderr => 2,
        }
    }
}

/// One demultiplexed frame: its logical stream and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFrame {
    /// Which logical stream the payload belongs to.
    pub source: StreamSource,
    /// The frame payload.
    pub payload: Bytes,
}

impl StreamFrame {
    /// Build a stdout frame.
    #[must_use]
    pub fn stdout(payload: impl Into<Bytes>) -> Self {
        Self {
            source: StreamSource::Stdout,
            payload: payload.into(),
        }
    }

    /// Build a stderr frame.
    #[must_use]
    pub fn stderr(payload: impl Into<Bytes>) -> Self {
        Self {
            source: StreamSource::Stderr,
            payload: payload.into(),
        }
    }
}

/// Decoder/encoder for the interleaved frame format.
///
/// # Decoder
///
/// Partial reads at the transport level are not errors: the codec buffers
/// until a complete header and payload are available. A malformed header
/// (unknown selector, or a length above [`MAX_FRAME_BYTES`]) returns
/// [`AppError::Decode`]. A source that ends mid-frame stops gracefully —
/// `decode_eof` discards the partial frame and yields end-of-stream.
///
/// # Encoder
///
/// Writes `frame` as header + payload. Used by engine adapters to produce
/// the wire format and by tests to build feeds.
#[derive(Debug, Default)]
pub struct FrameCodec;

impl FrameCodec {
    /// Create a new codec.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for FrameCodec {
    type Item = StreamFrame;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<StreamFrame>> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        let selector = src[0];
        let source = StreamSource::from_selector(selector).ok_or_else(|| {
            AppError::Decode(format!("unknown stream selector {selector:#04x}"))
        })?;

        let announced = u32::from_be_bytes([src[4], src[5], src[6], src[7]]) as usize;
        if announced > MAX_FRAME_BYTES {
            return Err(AppError::Decode(format!(
                "frame length {announced} exceeds {MAX_FRAME_BYTES} bytes"
            )));
        }

        if src.len() < HEADER_LEN + announced {
            src.reserve(HEADER_LEN + announced - src.len());
            return Ok(None);
        }

        src.advance(HEADER_LEN);
        let payload = src.split_to(announced).freeze();

        Ok(Some(StreamFrame { source, payload }))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<StreamFrame>> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None => {
                // Trailing partial frame at EOF: stop gracefully.
                src.clear();
                Ok(None)
            }
        }
    }
}

impl Encoder<StreamFrame> for FrameCodec {
    type Error = AppError;

    fn encode(&mut self, frame: StreamFrame, dst: &mut BytesMut) -> Result<()> {
        let announced = u32::try_from(frame.payload.len())
            .map_err(|_| AppError::Decode("frame payload exceeds u32 length".into()))?;

        dst.reserve(HEADER_LEN + frame.payload.len());
        dst.put_u8(frame.source.selector());
        dst.put_bytes(0, 3);
        dst.put_u32(announced);
        dst.extend_from_slice(&frame.payload);
        Ok(())
    }
}

/// Encode a single frame into a standalone byte chunk.
#[must_use]
pub fn wire_encode(frame: &StreamFrame) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + frame.payload.len());
    buf.put_u8(frame.source.selector());
    buf.put_bytes(0, 3);
    // Payloads above u32::MAX cannot come out of the runtime; saturate
    // rather than panic if an adapter ever constructs one.
    buf.put_u32(u32::try_from(frame.payload.len()).unwrap_or(u32::MAX));
    buf.extend_from_slice(&frame.payload);
    buf.freeze()
}
