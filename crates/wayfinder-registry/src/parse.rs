//! Registry payload validation.
//!
//! Accepted shapes:
//! - a JSON array of entries,
//! - `{"items": [entry, ...]}` (one page of a paginated listing),
//! - `{"gateways": {"<operator>": entry, ...}}` (address-keyed map) or
//!   `{"gateways": [entry, ...]}`.
//!
//! Each entry is converted independently; a bad entry is dropped with a
//! `warn!` and never coerced into a default.

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use wayfinder_core::{Capabilities, GatewayId, GatewayRecord, GatewayStatus, Protocol};

use crate::error::{RegistryError, RegistryResult};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntry {
    fqdn: Option<String>,
    host: Option<String>,
    port: Option<i64>,
    protocol: Option<String>,
    settings: Option<RawSettings>,
    operator_stake: Option<serde_json::Number>,
    status: Option<String>,
    capabilities: Option<RawCapabilities>,
    gateway_address: Option<String>,
    operator: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSettings {
    fqdn: Option<String>,
    port: Option<i64>,
    protocol: Option<String>,
    capabilities: Option<RawCapabilities>,
    properties: Option<RawCapabilities>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCapabilities {
    name_resolution: Option<bool>,
}

/// Parse a raw registry response into validated records.
///
/// Fails only when the payload as a whole is unreadable.
pub fn parse_entries(raw: &[u8]) -> RegistryResult<Vec<GatewayRecord>> {
    let payload: Value =
        serde_json::from_slice(raw).map_err(|e| RegistryError::Parse(e.to_string()))?;

    let entries: Vec<(Option<String>, Value)> = match payload {
        Value::Array(items) => items.into_iter().map(|v| (None, v)).collect(),
        Value::Object(mut obj) => {
            if let Some(Value::Array(items)) = obj.remove("items") {
                items.into_iter().map(|v| (None, v)).collect()
            } else {
                match obj.remove("gateways") {
                    Some(Value::Array(items)) => items.into_iter().map(|v| (None, v)).collect(),
                    Some(Value::Object(map)) => {
                        map.into_iter().map(|(addr, v)| (Some(addr), v)).collect()
                    }
                    _ => {
                        return Err(RegistryError::Parse(
                            "expected an entry array, `items`, or `gateways`".to_string(),
                        ));
                    }
                }
            }
        }
        other => {
            return Err(RegistryError::Parse(format!(
                "expected an array or object, got {}",
                json_kind(&other)
            )));
        }
    };

    let total = entries.len();
    let mut seen = HashSet::with_capacity(total);
    let mut records = Vec::with_capacity(total);

    for (index, (key, value)) in entries.into_iter().enumerate() {
        match convert_entry(value, key) {
            Ok(record) => {
                if seen.insert(record.id.clone()) {
                    records.push(record);
                } else {
                    warn!(index, gateway = %record.id, "dropping duplicate registry entry");
                }
            }
            Err(reason) => warn!(index, %reason, "dropping malformed registry entry"),
        }
    }

    if records.len() < total {
        warn!(
            accepted = records.len(),
            dropped = total - records.len(),
            "registry entries dropped during validation"
        );
    }
    Ok(records)
}

fn convert_entry(value: Value, key: Option<String>) -> Result<GatewayRecord, String> {
    let raw: RawEntry =
        serde_json::from_value(value).map_err(|e| format!("unexpected entry shape: {e}"))?;
    let settings = raw.settings.unwrap_or_default();

    let host = settings
        .fqdn
        .or(raw.fqdn)
        .or(raw.host)
        .ok_or("missing host")?;
    let host = host.trim().to_ascii_lowercase();
    if host.is_empty() {
        return Err("empty host".to_string());
    }
    if host.contains(|c: char| c == '/' || c == ':' || c == '@' || c.is_whitespace()) {
        return Err(format!("invalid host {host:?}"));
    }

    let port = settings.port.or(raw.port).unwrap_or(443);
    let port = u16::try_from(port)
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| format!("invalid port {port}"))?;

    let protocol = match settings.protocol.or(raw.protocol) {
        Some(p) => p.parse::<Protocol>()?,
        None => Protocol::Https,
    };

    let stake = match raw.operator_stake {
        Some(n) => n.as_u64().ok_or_else(|| format!("invalid stake {n}"))?,
        None => return Err("missing operatorStake".to_string()),
    };

    let status = match raw.status.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("joined") => GatewayStatus::Joined,
        Some("leaving") => GatewayStatus::Leaving,
        Some(other) => return Err(format!("unknown status {other:?}")),
    };

    let name_resolution = settings
        .capabilities
        .or(settings.properties)
        .or(raw.capabilities)
        .and_then(|c| c.name_resolution)
        .unwrap_or(false);

    Ok(GatewayRecord {
        id: GatewayId::new(host, port, protocol),
        operator: raw.gateway_address.or(raw.operator).or(key),
        stake,
        capabilities: Capabilities { name_resolution },
        status,
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
