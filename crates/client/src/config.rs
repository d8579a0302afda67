//! Client configuration.
//!
//! A [`ClientConfig`] is built once, either from a server list plus a
//! string options map (the shape most callers have at hand) or directly
//! through serde. Everything is validated before any connection is made.
//!
//! # Options
//!
//! | key                     | values                                    | default        |
//! |-------------------------|-------------------------------------------|----------------|
//! | `distribution`          | `array_mod`, `ketama`, `consistent_ketama`| `ketama`       |
//! | `hash`                  | `native`, `crc`, `fnv1_64`, `fnv1a_64`, `fnv1_32`, `fnv1a_32`, `ketama` | `fnv1_32` |
//! | `failure_mode`          | `redistribute`, `strict`                  | `redistribute` |
//! | `binary_protocol`       | boolean                                   | `false`        |
//! | `should_optimize`       | boolean                                   | `false`        |
//! | `timeout`               | milliseconds, `-1` for none               | `-1`           |
//! | `pool_size`             | `>= 1`                                    | `1`            |
//! | `default_ttl`           | seconds                                   | `604800`       |
//! | `exception_retry_limit` | retries after the first attempt           | `5`            |
//! | `namespace`/`prefix_key`| key prefix, `prefix_key` wins             | none           |

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use corelib::hash::HashAlgorithm;
use corelib::node::{Node, NodeId, DEFAULT_HOST, DEFAULT_PORT};
use corelib::ring::{Distribution, FailureMode};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::executor::RetryPolicy;

pub const DEFAULT_TTL: u32 = 604_800;
pub const DEFAULT_RETRY_LIMIT: u32 = 5;
pub const DEFAULT_POOL_SIZE: usize = 1;

/// Configured server entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerList {
    /// One string, possibly holding several entries separated by whitespace
    /// or commas.
    Single(String),
    Many(Vec<String>),
}

impl Default for ServerList {
    fn default() -> Self {
        ServerList::Single(String::new())
    }
}

impl ServerList {
    /// Individual entries. An empty list yields the local default server.
    pub fn entries(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            ServerList::Single(s) => vec![s.as_str()],
            ServerList::Many(list) => list.iter().map(String::as_str).collect(),
        };
        let entries: Vec<String> = raw
            .iter()
            .flat_map(|s| s.split(|c: char| c.is_whitespace() || c == ','))
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        if entries.is_empty() {
            vec![format!("{}:{}", DEFAULT_HOST, DEFAULT_PORT)]
        } else {
            entries
        }
    }

    /// Parse every entry into a node; ids follow list order.
    pub fn parse(&self) -> Result<Vec<Node>> {
        self.entries()
            .iter()
            .enumerate()
            .map(|(i, entry)| Node::parse(NodeId(i), entry).map_err(Error::from))
            .collect()
    }
}

impl From<&str> for ServerList {
    fn from(s: &str) -> Self {
        ServerList::Single(s.to_string())
    }
}

impl From<String> for ServerList {
    fn from(s: String) -> Self {
        ServerList::Single(s)
    }
}

impl From<Vec<String>> for ServerList {
    fn from(list: Vec<String>) -> Self {
        ServerList::Many(list)
    }
}

impl From<Vec<&str>> for ServerList {
    fn from(list: Vec<&str>) -> Self {
        ServerList::Many(list.into_iter().map(str::to_string).collect())
    }
}

/// Wire protocol requested from the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    #[default]
    Text,
    Binary,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Text => f.write_str("text"),
            Protocol::Binary => f.write_str("binary"),
        }
    }
}

/// Settings handed to the connector for every node link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransportOptions {
    pub protocol: Protocol,
    /// Let the transport batch/merge requests.
    pub should_optimize: bool,
    /// Per-operation timeout; `None` means the transport's own default.
    pub timeout: Option<Duration>,
}

/// Validated client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub servers: ServerList,
    pub distribution: Distribution,
    pub hash: HashAlgorithm,
    pub failure_mode: FailureMode,
    pub binary_protocol: bool,
    pub should_optimize: bool,
    /// Operation timeout in milliseconds, `-1` for none.
    #[serde(rename = "timeout")]
    pub timeout_ms: i64,
    pub pool_size: usize,
    pub default_ttl: u32,
    pub exception_retry_limit: u32,
    pub prefix_key: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            servers: ServerList::default(),
            distribution: Distribution::default(),
            hash: HashAlgorithm::default(),
            failure_mode: FailureMode::default(),
            binary_protocol: false,
            should_optimize: false,
            timeout_ms: -1,
            pool_size: DEFAULT_POOL_SIZE,
            default_ttl: DEFAULT_TTL,
            exception_retry_limit: DEFAULT_RETRY_LIMIT,
            prefix_key: None,
        }
    }
}

impl ClientConfig {
    /// Defaults for the given servers.
    pub fn new(servers: impl Into<ServerList>) -> Self {
        Self {
            servers: servers.into(),
            ..Self::default()
        }
    }

    /// Build from a string options map. Unknown keys are ignored.
    pub fn from_options(
        servers: impl Into<ServerList>,
        options: &HashMap<String, String>,
    ) -> Result<Self> {
        let mut config = Self::new(servers);
        let mut namespace = None;

        for (key, value) in options {
            let value = value.trim();
            match key.as_str() {
                "distribution" => config.distribution = Distribution::from_str(value)?,
                "hash" => config.hash = HashAlgorithm::from_str(value)?,
                "failure_mode" => config.failure_mode = FailureMode::from_str(value)?,
                "binary_protocol" => config.binary_protocol = parse_bool(key, value)?,
                "should_optimize" => config.should_optimize = parse_bool(key, value)?,
                "timeout" => config.timeout_ms = parse_number(key, value)?,
                "pool_size" => config.pool_size = parse_number(key, value)?,
                "default_ttl" => config.default_ttl = parse_number(key, value)?,
                "exception_retry_limit" => config.exception_retry_limit = parse_number(key, value)?,
                "namespace" => namespace = Some(value.to_string()),
                "prefix_key" => config.prefix_key = Some(value.to_string()),
                other => tracing::debug!(option = other, "ignoring unknown client option"),
            }
        }
        if config.prefix_key.is_none() {
            config.prefix_key = namespace;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check ranges and parse the server list.
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(Error::InvalidConfiguration(
                "pool_size must be at least 1".to_string(),
            ));
        }
        if self.timeout_ms < -1 {
            return Err(Error::InvalidConfiguration(format!(
                "timeout must be -1 or a non-negative number of milliseconds, got {}",
                self.timeout_ms
            )));
        }
        self.servers.parse()?;
        Ok(())
    }

    /// Parsed nodes with addresses resolved where possible.
    pub fn nodes(&self) -> Result<Vec<Node>> {
        Ok(self.servers.parse()?.into_iter().map(Node::resolved).collect())
    }

    pub fn timeout(&self) -> Option<Duration> {
        u64::try_from(self.timeout_ms).ok().map(Duration::from_millis)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout: self.timeout(),
            max_retries: self.exception_retry_limit,
        }
    }

    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            protocol: if self.binary_protocol {
                Protocol::Binary
            } else {
                Protocol::Text
            },
            should_optimize: self.should_optimize,
            timeout: self.timeout(),
        }
    }

    /// Prefix a caller key.
    pub fn prefixed(&self, key: &str) -> String {
        match &self.prefix_key {
            Some(prefix) => format!("{}{}", prefix, key),
            None => key.to_string(),
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(Error::InvalidConfiguration(format!(
            "{} expects a boolean, got {:?}",
            key, value
        ))),
    }
}

fn parse_number<N: FromStr>(key: &str, value: &str) -> Result<N> {
    value.parse().map_err(|_| {
        Error::InvalidConfiguration(format!("{} expects a number, got {:?}", key, value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use proptest::prelude::*;

    fn options(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_server_list_splitting() {
        let list = ServerList::from("10.0.0.1:11211, 10.0.0.2  10.0.0.3:11300:2");
        assert_eq!(
            list.entries(),
            vec!["10.0.0.1:11211", "10.0.0.2", "10.0.0.3:11300:2"]
        );

        let nodes = list.parse().unwrap();
        assert_eq!(nodes[2].port, 11300);
        assert_eq!(nodes[2].weight, 2);
        assert_eq!(nodes[1].id, NodeId(1));
    }

    #[test]
    fn test_empty_server_list_defaults_to_localhost() {
        assert_eq!(ServerList::default().entries(), vec!["127.0.0.1:11211"]);
        assert_eq!(ServerList::Many(vec![]).entries(), vec!["127.0.0.1:11211"]);
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_options("10.0.0.1", &HashMap::new()).unwrap();
        assert_eq!(config.distribution, Distribution::Ketama);
        assert_eq!(config.hash, HashAlgorithm::Fnv1_32);
        assert_eq!(config.pool_size, 1);
        assert_eq!(config.default_ttl, 604_800);
        assert_eq!(config.exception_retry_limit, 5);
        assert_eq!(config.timeout(), None);
        assert_eq!(config.transport_options().protocol, Protocol::Text);
    }

    #[test]
    fn test_options_are_applied() {
        let config = ClientConfig::from_options(
            "10.0.0.1",
            &options(&[
                ("distribution", "array_mod"),
                ("hash", "crc"),
                ("binary_protocol", "true"),
                ("timeout", "250"),
                ("pool_size", "4"),
                ("exception_retry_limit", "2"),
                ("namespace", "app:"),
                ("some_unknown_option", "x"),
            ]),
        )
        .unwrap();
        assert_eq!(config.distribution, Distribution::ArrayMod);
        assert_eq!(config.hash, HashAlgorithm::Crc);
        assert_eq!(config.pool_size, 4);
        assert_eq!(config.timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.transport_options().protocol, Protocol::Binary);
        assert_eq!(config.retry_policy().max_retries, 2);
        assert_eq!(config.prefixed("user:1"), "app:user:1");
    }

    #[test]
    fn test_prefix_key_wins_over_namespace() {
        let config = ClientConfig::from_options(
            "10.0.0.1",
            &options(&[("namespace", "ns:"), ("prefix_key", "pk:")]),
        )
        .unwrap();
        assert_eq!(config.prefix_key.as_deref(), Some("pk:"));
    }

    #[test]
    fn test_unsupported_values() {
        for (key, value) in [("hash", "md4"), ("distribution", "rendezvous"), ("failure_mode", "panic")] {
            let err = ClientConfig::from_options("10.0.0.1", &options(&[(key, value)])).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ConfigurationUnsupported, "{}={}", key, value);
        }
    }

    #[test]
    fn test_invalid_values() {
        for (key, value) in [
            ("pool_size", "0"),
            ("pool_size", "many"),
            ("binary_protocol", "maybe"),
            ("timeout", "-5"),
        ] {
            let err = ClientConfig::from_options("10.0.0.1", &options(&[(key, value)])).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidConfiguration, "{}={}", key, value);
        }

        let err = ClientConfig::from_options("10.0.0.1:11211:0", &HashMap::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
    }

    #[test]
    fn test_oversized_weight_is_rejected() {
        let err = ClientConfig::from_options("10.0.0.1:11211:26843546", &HashMap::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);

        let config = ClientConfig::new("10.0.0.1:11211:26843546");
        assert_eq!(config.validate().unwrap_err().kind(), ErrorKind::InvalidConfiguration);
    }

    #[test]
    fn test_json_accepts_distribution_alias() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"distribution": "consistent_ketama"}"#).unwrap();
        assert_eq!(config.distribution, Distribution::Ketama);

        let config: ClientConfig = serde_json::from_str(r#"{"distribution": "array_mod"}"#).unwrap();
        assert_eq!(config.distribution, Distribution::ArrayMod);
    }

    proptest! {
        #[test]
        fn prop_joined_entries_parse_back(
            entries in prop::collection::vec((1u8..255, 1024u16..65535, 1u32..5), 1..8),
            separator in prop::sample::select(vec![",", " ", ", ", "\n"]),
        ) {
            let joined = entries
                .iter()
                .map(|(octet, port, weight)| format!("10.1.0.{}:{}:{}", octet, port, weight))
                .collect::<Vec<_>>()
                .join(separator);
            let nodes = ServerList::from(joined).parse().unwrap();
            prop_assert_eq!(nodes.len(), entries.len());
            for (node, (_, port, weight)) in nodes.iter().zip(&entries) {
                prop_assert_eq!(node.port, *port);
                prop_assert_eq!(node.weight, *weight);
            }
        }
    }

    #[test]
    fn test_json_round_trip_uses_option_names() {
        let json = r#"{"servers": ["10.0.0.1", "10.0.0.2:11212"], "hash": "ketama", "timeout": 100}"#;
        let config: ClientConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.hash, HashAlgorithm::Ketama);
        assert_eq!(config.timeout_ms, 100);
        assert_eq!(config.pool_size, 1);
        assert_eq!(config.servers.entries().len(), 2);
    }
}
