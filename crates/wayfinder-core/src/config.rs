//! wayfinder.toml configuration parser.
//!
//! Every section and field is optional. Durations are written as strings
//! (`"500ms"`, `"30s"`, `"15m"`, `"1h"`) and read through accessors that fall
//! back to the built-in default; [`WayfinderConfig::validate`] reports values
//! that would silently fall back.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::RankPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WayfinderConfig {
    pub registry: RegistryConfig,
    pub probe: ProbeConfig,
    pub rank: RankPolicy,
    pub refresh: RefreshConfig,
    pub resolver: ResolverConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Endpoint returning the registry's gateway entry set as JSON.
    pub url: String,
    pub timeout: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:4000/v1/gateways".to_string(),
            timeout: "10s".to_string(),
        }
    }
}

impl RegistryConfig {
    pub fn timeout(&self) -> Duration {
        parse_duration(&self.timeout).unwrap_or(Duration::from_secs(10))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Health endpoint requested on every candidate.
    pub path: String,
    pub timeout: String,
    pub batch_timeout: String,
    pub max_parallelism: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            path: "/ar-io/healthcheck".to_string(),
            timeout: "5s".to_string(),
            batch_timeout: "30s".to_string(),
            max_parallelism: 16,
        }
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        parse_duration(&self.timeout).unwrap_or(Duration::from_secs(5))
    }

    pub fn batch_timeout(&self) -> Duration {
        parse_duration(&self.batch_timeout).unwrap_or(Duration::from_secs(30))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Periodic refresh cadence.
    pub interval: String,
    /// First retry delay after a failed cycle; doubles per attempt.
    pub base_delay: String,
    pub max_delay: String,
    /// Failed attempts tolerated before falling back to `degraded_interval`.
    pub max_attempts: u32,
    pub degraded_interval: String,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: "1h".to_string(),
            base_delay: "30s".to_string(),
            max_delay: "15m".to_string(),
            max_attempts: 6,
            degraded_interval: "1h".to_string(),
        }
    }
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        parse_duration(&self.interval).unwrap_or(Duration::from_secs(3600))
    }

    pub fn base_delay(&self) -> Duration {
        parse_duration(&self.base_delay).unwrap_or(Duration::from_secs(30))
    }

    pub fn max_delay(&self) -> Duration {
        parse_duration(&self.max_delay).unwrap_or(Duration::from_secs(15 * 60))
    }

    pub fn degraded_interval(&self) -> Duration {
        parse_duration(&self.degraded_interval).unwrap_or(Duration::from_secs(3600))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Custom scheme handled by the resolver, without `://`.
    pub scheme: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            scheme: "ar".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:7480".to_string(),
        }
    }
}

impl WayfinderConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: WayfinderConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let durations: [(&'static str, &str); 7] = [
            ("registry.timeout", &self.registry.timeout),
            ("probe.timeout", &self.probe.timeout),
            ("probe.batch_timeout", &self.probe.batch_timeout),
            ("refresh.interval", &self.refresh.interval),
            ("refresh.base_delay", &self.refresh.base_delay),
            ("refresh.max_delay", &self.refresh.max_delay),
            ("refresh.degraded_interval", &self.refresh.degraded_interval),
        ];
        for (field, value) in durations {
            match parse_duration(value) {
                Some(d) if !d.is_zero() => {}
                _ => {
                    return Err(ConfigError::Invalid {
                        field,
                        reason: format!("{value:?} is not a positive duration"),
                    });
                }
            }
        }

        if self.probe.max_parallelism == 0 {
            return Err(ConfigError::Invalid {
                field: "probe.max_parallelism",
                reason: "must be at least 1".to_string(),
            });
        }
        if !self.probe.path.starts_with('/') {
            return Err(ConfigError::Invalid {
                field: "probe.path",
                reason: "must start with '/'".to_string(),
            });
        }
        for (field, weight) in [
            ("rank.stake_weight", self.rank.stake_weight),
            ("rank.latency_weight", self.rank.latency_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("{weight} is not a non-negative number"),
                });
            }
        }
        let scheme = &self.resolver.scheme;
        if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(ConfigError::Invalid {
                field: "resolver.scheme",
                reason: format!("{scheme:?} is not a valid scheme"),
            });
        }
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Parse a duration string like "500ms", "5s", "2m", "1h". A bare number is
/// read as seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok()?.checked_mul(60).map(Duration::from_secs)
    } else if let Some(hours) = s.strip_suffix('h') {
        hours.parse::<u64>().ok()?.checked_mul(3600).map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = WayfinderConfig::from_toml_str("").unwrap();
        assert_eq!(config.probe.max_parallelism, 16);
        assert_eq!(config.probe.timeout(), Duration::from_secs(5));
        assert_eq!(config.refresh.max_attempts, 6);
        assert_eq!(config.resolver.scheme, "ar");
        assert!(!config.rank.ensure_stake);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = WayfinderConfig::from_toml_str(
            r#"
[probe]
max_parallelism = 4

[rank]
ensure_stake = true
min_stake = 10000

[refresh]
base_delay = "10s"
"#,
        )
        .unwrap();
        assert_eq!(config.probe.max_parallelism, 4);
        assert_eq!(config.probe.path, "/ar-io/healthcheck");
        assert!(config.rank.ensure_stake);
        assert_eq!(config.rank.min_stake, 10000);
        assert_eq!(config.rank.stake_weight, 0.7);
        assert_eq!(config.refresh.base_delay(), Duration::from_secs(10));
        assert_eq!(config.refresh.max_delay(), Duration::from_secs(900));
    }

    #[test]
    fn rejects_bad_duration() {
        let err = WayfinderConfig::from_toml_str("[probe]\ntimeout = \"soon\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "probe.timeout", .. }));
    }

    #[test]
    fn rejects_overflowing_duration() {
        let err = WayfinderConfig::from_toml_str("[refresh]\ninterval = \"9999999999999999999m\"\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "refresh.interval", .. }));

        let err = WayfinderConfig::from_toml_str("[probe]\nbatch_timeout = \"9999999999999999h\"\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "probe.batch_timeout", .. }));

        assert_eq!(parse_duration("18446744073709551615m"), None);
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
    }

    #[test]
    fn rejects_zero_parallelism() {
        let err =
            WayfinderConfig::from_toml_str("[probe]\nmax_parallelism = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "probe.max_parallelism", .. }));
    }

    #[test]
    fn rejects_negative_weight() {
        let err = WayfinderConfig::from_toml_str("[rank]\nlatency_weight = -1.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "rank.latency_weight", .. }));
    }

    #[test]
    fn from_file_reads_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wayfinder.toml");
        std::fs::write(&path, "[resolver]\nscheme = \"custom\"\n").unwrap();

        let config = WayfinderConfig::from_file(&path).unwrap();
        assert_eq!(config.resolver.scheme, "custom");
    }

    #[test]
    fn default_config_serializes() {
        let text = WayfinderConfig::default().to_toml_string().unwrap();
        assert!(text.contains("[refresh]"));
        let back = WayfinderConfig::from_toml_str(&text).unwrap();
        assert_eq!(back.refresh.interval(), Duration::from_secs(3600));
    }

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("10"), Some(Duration::from_secs(10)));
        assert_eq!(parse_duration("abc"), None);
    }
}
