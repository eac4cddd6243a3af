//! Host system monitor.
//!
//! Samples host OS counters on a fixed interval and pushes one JSON message
//! per tick to the observer — uptime, CPU percentage, memory and disk usage.
//! Stops on observer write failure or cancellation.

use std::time::Duration;

use serde::Serialize;
use sysinfo::{Disks, System};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::session::{Observer, SessionEnd};

const MIB: u64 = 1024 * 1024;

/// One host-level sample.
#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    /// Seconds since boot.
    pub uptime_seconds: u64,
    /// Host-wide CPU usage percentage.
    pub cpu_usage: f32,
    /// Memory in use, in MiB.
    pub memory_used: u64,
    /// Total memory, in MiB.
    pub memory_total: u64,
    /// Disk space in use across all mounts, in MiB.
    pub disk_used: u64,
    /// Total disk space across all mounts, in MiB.
    pub disk_total: u64,
}

/// Collect one sample from the host.
///
/// `system` must be reused across calls: CPU usage is derived from the delta
/// since the previous refresh, so the first sample reads as zero.
#[must_use]
pub fn collect(system: &mut System) -> SystemInfo {
    system.refresh_cpu();
    system.refresh_memory();

    let disks = Disks::new_with_refreshed_list();
    let mut disk_total = 0;
    let mut disk_used = 0;
    for disk in disks.list() {
        disk_total += disk.total_space() / MIB;
        disk_used += disk.total_space().saturating_sub(disk.available_space()) / MIB;
    }

    SystemInfo {
        uptime_seconds: System::uptime(),
        cpu_usage: system.global_cpu_info().cpu_usage(),
        memory_used: system.used_memory() / MIB,
        memory_total: system.total_memory() / MIB,
        disk_used,
        disk_total,
    }
}

/// Push host samples to the observer every `interval` until the session ends.
pub async fn run_system_session(
    interval: Duration,
    observer: &mut dyn Observer,
    cancel: CancellationToken,
) -> SessionEnd {
    let mut system = System::new();
    let mut ticker = tokio::time::interval(interval);

    let end = loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("system session: cancellation received");
                break SessionEnd::Cancelled;
            }

            _ = ticker.tick() => {
                let info = collect(&mut system);
                let Ok(text) = serde_json::to_string(&info) else {
                    continue;
                };
                if observer.push_text(text).await.is_err() {
                    break SessionEnd::ObserverGone;
                }
            }
        }
    };

    if end == SessionEnd::Cancelled {
        observer.close().await;
    }

    end
}
