//! Byte-stream plumbing between the container runtime, launched processes,
//! and streaming sessions.
//!
//! The runtime's combined log stream arrives either as raw bytes (TTY
//! containers) or in the interleaved frame format decoded by
//! [`demux::FrameCodec`]. Either way, [`display_chunks`] collapses a
//! [`LogFeed`] into one ordered sequence of byte chunks suitable for pushing
//! to an observer.

pub mod demux;
pub mod lines;

use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use tokio_util::codec::FramedRead;
use tokio_util::io::StreamReader;

use crate::Result;
use self::demux::FrameCodec;

/// A boxed stream of raw byte chunks.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// A container's combined log stream plus the TTY flag from inspect.
pub struct LogFeed {
    /// Whether the container has a pseudo-terminal attached. TTY streams are
    /// already merged; stdout and stderr cannot be distinguished.
    pub tty: bool,
    /// The raw byte stream. Non-TTY streams carry the interleaved frame
    /// format understood by [`demux::FrameCodec`].
    pub bytes: ByteStream,
}

/// Collapse a log feed into ordered display chunks.
///
/// TTY feeds pass through unchanged. Non-TTY feeds are demultiplexed frame
/// by frame; payloads are emitted in arrival order regardless of which
/// logical stream they belong to. Partial transport reads are buffered by
/// the codec; a feed that ends mid-frame simply ends the stream.
#[must_use]
pub fn display_chunks(feed: LogFeed) -> ByteStream {
    if feed.tty {
        return feed.bytes;
    }

    let reader = StreamReader::new(
        feed.bytes
            .map(|res| res.map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err))),
    );
    FramedRead::new(reader, FrameCodec::new())
        .map_ok(|frame| frame.payload)
        .boxed()
}
