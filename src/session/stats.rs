//! Container metrics sampler.
//!
//! Consumes the runtime's streaming stats feed — one JSON snapshot per line
//! — derives a CPU percentage from the cumulative counters in each snapshot,
//! and pushes one JSON message per sample to the observer until the feed
//! ends, a write fails, or the session is cancelled. Ending the loop ends
//! the session; there is no automatic reconnection.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::codec::FramedRead;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::session::{Observer, SessionEnd};
use crate::stream::lines::LineCodec;
use crate::Result;

/// Cumulative usage counters for one CPU reading.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CpuUsage {
    /// Total CPU time consumed, in nanoseconds.
    #[serde(default)]
    pub total_usage: u64,
}

/// One CPU reading: container usage plus host-wide totals.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CpuReading {
    /// Container CPU counters.
    #[serde(default)]
    pub cpu_usage: CpuUsage,
    /// Host-wide cumulative CPU time. Absent on the feed's first snapshot.
    #[serde(default)]
    pub system_cpu_usage: Option<u64>,
    /// Number of CPUs available to the container.
    #[serde(default)]
    pub online_cpus: Option<u32>,
}

/// Memory usage and limit.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryReading {
    /// Current memory usage in bytes.
    #[serde(default)]
    pub usage: Option<u64>,
    /// Memory limit in bytes.
    #[serde(default)]
    pub limit: Option<u64>,
}

/// One point-in-time snapshot from the stats feed.
///
/// Each snapshot carries the current reading and the previous one; only that
/// consecutive pair matters for rate computation, so no history is retained.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsSnapshot {
    /// Current CPU reading.
    #[serde(default)]
    pub cpu_stats: CpuReading,
    /// Previous CPU reading. Zeroed on the feed's first snapshot.
    #[serde(default)]
    pub precpu_stats: CpuReading,
    /// Current memory reading.
    #[serde(default)]
    pub memory_stats: MemoryReading,
}

/// One derived sample pushed to the observer.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MetricsSample {
    /// CPU usage percentage (may exceed 100 on multi-core containers).
    pub cpu_percent: f64,
    /// Memory usage in bytes.
    pub memory_usage: u64,
    /// Memory limit in bytes.
    pub memory_limit: u64,
}

/// Derive the CPU percentage from a snapshot's counter pair.
///
/// `(cpuΔ / systemΔ) × cores × 100`. Returns `None` — meaning "do not emit a
/// sample" — when there is no previous value to diff against or when either
/// delta is non-positive, which guards against counter resets and the feed's
/// baseline-establishing first snapshot.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn cpu_percent(snapshot: &StatsSnapshot) -> Option<f64> {
    let cpu_delta = snapshot
        .cpu_stats
        .cpu_usage
        .total_usage
        .checked_sub(snapshot.precpu_stats.cpu_usage.total_usage)?;
    let system_delta = snapshot
        .cpu_stats
        .system_cpu_usage?
        .checked_sub(snapshot.precpu_stats.system_cpu_usage.unwrap_or(0))?;

    if cpu_delta == 0 || system_delta == 0 {
        return None;
    }

    let cores = f64::from(snapshot.cpu_stats.online_cpus.unwrap_or(1));
    Some(cpu_delta as f64 / system_delta as f64 * cores * 100.0)
}

/// Build the outgoing sample for a snapshot, if one should be emitted.
#[must_use]
pub fn sample_from(snapshot: &StatsSnapshot) -> Option<MetricsSample> {
    let cpu = cpu_percent(snapshot)?;
    Some(MetricsSample {
        cpu_percent: cpu,
        memory_usage: snapshot.memory_stats.usage.unwrap_or(0),
        memory_limit: snapshot.memory_stats.limit.unwrap_or(0),
    })
}

/// Run a container-stats session over an NDJSON byte feed.
///
/// State machine: sampling loops until the feed ends, a snapshot fails to
/// decode, the observer write fails, or `cancel` fires; all four stop the
/// session for good.
pub async fn run_stats_session<S>(
    feed: S,
    observer: &mut dyn Observer,
    cancel: CancellationToken,
) -> SessionEnd
where
    S: Stream<Item = Result<Bytes>> + Unpin + Send,
{
    let reader = StreamReader::new(
        feed.map(|res| res.map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err))),
    );
    let mut lines = FramedRead::new(reader, LineCodec::new());

    let end = loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("stats session: cancellation received");
                break SessionEnd::Cancelled;
            }

            line = lines.next() => match line {
                None => break SessionEnd::SourceClosed,

                Some(Err(err)) => {
                    warn!(%err, "stats session: feed failed");
                    let _ = observer.push_text(format!("stats error: {err}")).await;
                    break SessionEnd::SourceClosed;
                }

                Some(Ok(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<StatsSnapshot>(&line) {
                        Err(err) => {
                            warn!(%err, "stats session: snapshot did not parse");
                            let _ = observer
                                .push_text(format!("stats decode error: {err}"))
                                .await;
                            break SessionEnd::SourceClosed;
                        }
                        Ok(snapshot) => {
                            let Some(sample) = sample_from(&snapshot) else {
                                // No baseline yet; wait for the next snapshot.
                                continue;
                            };
                            let Ok(text) = serde_json::to_string(&sample) else {
                                continue;
                            };
                            if observer.push_text(text).await.is_err() {
                                break SessionEnd::ObserverGone;
                            }
                        }
                    }
                }
            }
        }
    };

    match end {
        SessionEnd::SourceClosed | SessionEnd::Cancelled => observer.close().await,
        SessionEnd::ObserverGone => {}
    }

    end
}
