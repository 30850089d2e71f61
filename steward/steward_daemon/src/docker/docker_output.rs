use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::managers::runtime::{ContainerInfo, NetworkStats, RuntimeError};

const NO_SUCH_CONTAINER: &str = "No such container";
/// `StartedAt` of a container that never ran.
const ZERO_TIME_PREFIX: &str = "0001-01-01";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PsEntry {
    #[serde(rename = "ID")]
    id: String,
    names: String,
    image: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    ports: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StatsEntry {
    name: String,
    #[serde(rename = "NetIO")]
    net_io: String,
}

/// Maps a failed invocation onto the error taxonomy.
pub fn command_failure(target: Option<&str>, stderr: &str) -> RuntimeError {
    let message = stderr.trim();
    match target {
        Some(name) if message.contains(NO_SUCH_CONTAINER) => RuntimeError::NotFound(name.to_string()),
        _ => RuntimeError::CommandFail(message.to_string()),
    }
}

/// One `docker ps --format {{json .}}` object per line.
pub fn parse_container_list(output: &str) -> Result<Vec<ContainerInfo>, RuntimeError> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let entry: PsEntry = serde_json::from_str(line)
                .map_err(|err| RuntimeError::InvalidOutput(err.to_string()))?;
            Ok(ContainerInfo {
                id: entry.id,
                name: entry.names,
                image: entry.image,
                status: entry.status,
                state: entry.state,
                published_ports: parse_published_ports(&entry.ports),
            })
        })
        .collect()
}

/// Host ports of a `Ports` column like `0.0.0.0:5902->5900/tcp, :::5902->5900/tcp`.
pub fn parse_published_ports(ports: &str) -> Vec<u16> {
    let mut published = vec![];
    for binding in ports.split(',') {
        let Some((host, _)) = binding.trim().split_once("->") else {
            continue;
        };
        let Some(port) = host
            .rsplit(':')
            .next()
            .and_then(|port| port.parse::<u16>().ok())
        else {
            continue;
        };
        if !published.contains(&port) {
            published.push(port);
        }
    }
    published
}

/// Sizes as printed by `docker stats`: decimal units (`kB`, `MB`) and binary
/// ones (`KiB`, `MiB`).
pub fn parse_byte_size(size: &str) -> Option<u64> {
    let size = size.trim();
    let split = size
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(size.len());
    let (number, unit) = size.split_at(split);
    let number: f64 = number.parse().ok()?;
    let multiplier: f64 = match unit.trim() {
        "" | "B" => 1.0,
        "kB" | "KB" => 1e3,
        "MB" => 1e6,
        "GB" => 1e9,
        "TB" => 1e12,
        "KiB" => 1024.0,
        "MiB" => 1024.0 * 1024.0,
        "GiB" => 1024.0 * 1024.0 * 1024.0,
        "TiB" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => return None,
    };
    Some((number * multiplier).round() as u64)
}

/// `NetIO` column: `received / transmitted`.
pub fn parse_net_io(net_io: &str) -> Option<NetworkStats> {
    let (rx, tx) = net_io.split_once('/')?;
    Some(NetworkStats {
        rx_bytes: parse_byte_size(rx)?,
        tx_bytes: parse_byte_size(tx)?,
    })
}

/// Lines with an unreadable `NetIO` value are skipped.
pub fn parse_stats(output: &str) -> Result<BTreeMap<String, NetworkStats>, RuntimeError> {
    let mut stats = BTreeMap::new();
    for line in output.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let entry: StatsEntry = serde_json::from_str(line)
            .map_err(|err| RuntimeError::InvalidOutput(err.to_string()))?;
        if let Some(net_io) = parse_net_io(&entry.net_io) {
            stats.insert(entry.name, net_io);
        }
    }
    Ok(stats)
}

/// `{{json .Config.Env}}` output, a JSON array of `KEY=VALUE` strings.
pub fn parse_environment(output: &str) -> Result<BTreeMap<String, String>, RuntimeError> {
    let output = output.trim();
    if output.is_empty() || output == "null" {
        return Ok(BTreeMap::new());
    }
    let variables: Vec<String> = serde_json::from_str(output)
        .map_err(|err| RuntimeError::InvalidOutput(err.to_string()))?;
    Ok(variables
        .into_iter()
        .map(|variable| match variable.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (variable, String::new()),
        })
        .collect())
}

pub fn parse_start_time(output: &str) -> Result<Option<DateTime<Utc>>, RuntimeError> {
    let output = output.trim();
    if output.is_empty() || output.starts_with(ZERO_TIME_PREFIX) {
        return Ok(None);
    }
    DateTime::parse_from_rfc3339(output)
        .map(|time| Some(time.with_timezone(&Utc)))
        .map_err(|err| RuntimeError::InvalidOutput(format!("{output}: {err}")))
}
