//! Resource specifications and request normalization.
//!
//! Incoming create requests carry human-entered strings — comma-separated
//! port/volume/env lists, free-form cpu and memory numbers. Normalization
//! turns them into an explicit [`NormalizedSpec`] for the engine, skipping
//! malformed list entries rather than failing the whole request; every skip
//! is collected as a warning and returned to the caller.

use serde::Deserialize;

use crate::{AppError, Result};

/// Typed create-container request body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceSpec {
    /// Optional container name.
    #[serde(default)]
    pub name: Option<String>,
    /// Image reference. Required; a default tag is appended when missing.
    #[serde(default)]
    pub image: Option<String>,
    /// Comma-separated `hostPort:containerPort` pairs.
    #[serde(default)]
    pub ports: Option<String>,
    /// Comma-separated bind specifications (`/host:/container`).
    #[serde(default)]
    pub volumes: Option<String>,
    /// Comma-separated `KEY=value` environment entries.
    #[serde(default)]
    pub envs: Option<String>,
    /// CPU limit in cores, e.g. `"1.5"`.
    #[serde(default)]
    pub cpu: Option<String>,
    /// Memory limit in MiB, e.g. `"512"`.
    #[serde(default)]
    pub memory: Option<String>,
    /// Restart policy name (`always`, `unless-stopped`, `on-failure`, `no`).
    #[serde(default)]
    pub restart: Option<String>,
    /// Network mode (`bridge`, `host`, or a network name).
    #[serde(default)]
    pub network: Option<String>,
}

/// One translated port mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    /// Port bound on the host.
    pub host: String,
    /// Port exposed by the container.
    pub container: String,
}

/// Fully normalized parameters handed to the engine's create call.
///
/// Absent optional limits mean "use runtime default", never zero.
#[derive(Debug, Clone, Default)]
pub struct NormalizedSpec {
    /// Optional container name.
    pub name: Option<String>,
    /// Image reference including a tag.
    pub image: String,
    /// Host-to-container port mappings.
    pub ports: Vec<PortMapping>,
    /// Volume bind strings.
    pub binds: Vec<String>,
    /// Environment entries.
    pub env: Vec<String>,
    /// CPU quota in billionths of a core.
    pub nano_cpus: Option<i64>,
    /// Memory ceiling in bytes.
    pub memory_bytes: Option<i64>,
    /// Restart policy name.
    pub restart_policy: Option<String>,
    /// Network mode.
    pub network_mode: Option<String>,
}

/// Normalize a create request, collecting lenient-parsing warnings.
///
/// # Errors
///
/// Returns `AppError::Validation` when the image reference is missing or
/// empty. Malformed list entries never fail the request; they are skipped
/// and reported in the returned warnings.
pub fn normalize(request: &ResourceSpec) -> Result<(NormalizedSpec, Vec<String>)> {
    let image = request.image.as_deref().map(str::trim).unwrap_or_default();
    if image.is_empty() {
        return Err(AppError::Validation("image must not be empty".into()));
    }

    let mut warnings = Vec::new();
    let network_mode = request
        .network
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_owned);

    // Host networking has no port mappings; published ports are meaningless.
    let ports = if network_mode.as_deref() == Some("host") {
        Vec::new()
    } else {
        parse_port_mappings(request.ports.as_deref().unwrap_or(""), &mut warnings)
    };

    let nano_cpus = parse_scaled(request.cpu.as_deref(), 1e9, "cpu", &mut warnings);
    let memory_bytes = parse_scaled(
        request.memory.as_deref(),
        1024.0 * 1024.0,
        "memory",
        &mut warnings,
    );

    let spec = NormalizedSpec {
        name: request
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_owned),
        image: normalize_image(image),
        ports,
        binds: parse_csv(request.volumes.as_deref().unwrap_or("")),
        env: parse_csv(request.envs.as_deref().unwrap_or("")),
        nano_cpus,
        memory_bytes,
        restart_policy: request
            .restart
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_owned),
        network_mode,
    };

    Ok((spec, warnings))
}

/// Append the default tag when the reference carries none.
///
/// The heuristic is a plain `':'` scan, so a registry host with a port
/// (`registry:5000/img`) already counts as tagged — matching the source
/// system's behavior.
#[must_use]
pub fn normalize_image(image: &str) -> String {
    if image.contains(':') {
        image.to_owned()
    } else {
        format!("{image}:latest")
    }
}

/// Translate a comma-separated `host:container` list into explicit mappings.
///
/// Entries without exactly one `:` separator are skipped and recorded as
/// warnings; they never abort the remainder of the list.
pub fn parse_port_mappings(raw: &str, warnings: &mut Vec<String>) -> Vec<PortMapping> {
    let mut mappings = Vec::new();
    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let mut parts = entry.split(':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(host), Some(container), None) if !host.is_empty() && !container.is_empty() => {
                mappings.push(PortMapping {
                    host: host.to_owned(),
                    container: container.to_owned(),
                });
            }
            _ => warnings.push(format!("skipped malformed port mapping: {entry}")),
        }
    }
    mappings
}

/// Split a comma-separated list, dropping empty entries.
#[must_use]
pub fn parse_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Parse a decimal number and scale it to an integer limit value.
///
/// Unparsable values are skipped with a warning; the limit then stays at the
/// runtime default.
fn parse_scaled(
    raw: Option<&str>,
    scale: f64,
    field: &str,
    warnings: &mut Vec<String>,
) -> Option<i64> {
    let raw = raw.map(str::trim).filter(|v| !v.is_empty())?;
    match raw.parse::<f64>() {
        #[allow(clippy::cast_possible_truncation)]
        Ok(value) if value > 0.0 => Some((value * scale) as i64),
        _ => {
            warnings.push(format!("skipped invalid {field} limit: {raw}"));
            None
        }
    }
}
