//! Live session bridge: pump byte chunks from a producer to an observer.
//!
//! The pipeline is synchronous and naturally bounded — each chunk is written
//! to the observer before the next read is attempted, so no internal queue
//! can grow. Three independent triggers end a session:
//!
//! - the producer is exhausted → close the connection normally;
//! - an observer write fails → stop reading and terminate any owned
//!   subprocess so no orphaned child remains;
//! - the cancellation token fires → same teardown as an observer failure,
//!   then close the connection.
//!
//! There are no retries and no buffering of missed output across reconnects:
//! streaming is at-most-once, and a caller wanting more starts a new session.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::launcher::ProcessHandle;
use crate::session::{Observer, SessionEnd};
use crate::Result;

/// Couple one byte producer to one observer until either side ends.
///
/// `owned` names a subprocess whose lifetime is tied to this session (a
/// log-follow child, for example); it is terminated on every exit path, which
/// is a no-op when the producer ended because the process already exited.
///
/// Observer disconnects are detected on the next write attempt, not
/// proactively — the bridge never reads from the connection.
pub async fn bridge<S>(
    mut source: S,
    observer: &mut dyn Observer,
    cancel: CancellationToken,
    owned: Option<ProcessHandle>,
) -> SessionEnd
where
    S: Stream<Item = Result<Bytes>> + Unpin + Send,
{
    let end = loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("bridge: cancellation received");
                break SessionEnd::Cancelled;
            }

            chunk = source.next() => match chunk {
                None => break SessionEnd::SourceClosed,

                Some(Ok(bytes)) => {
                    let text = String::from_utf8_lossy(&bytes).into_owned();
                    if observer.push_text(text).await.is_err() {
                        debug!("bridge: observer write failed, stopping");
                        break SessionEnd::ObserverGone;
                    }
                }

                Some(Err(err)) => {
                    // Terminal for this session only. Best-effort diagnostic
                    // frame before the connection is closed.
                    warn!(%err, "bridge: producer failed mid-session");
                    let _ = observer.push_text(format!("stream error: {err}")).await;
                    break SessionEnd::SourceClosed;
                }
            }
        }
    };

    if let Some(handle) = owned {
        handle.terminate().await;
    }

    match end {
        SessionEnd::SourceClosed | SessionEnd::Cancelled => observer.close().await,
        SessionEnd::ObserverGone => {}
    }

    end
}
