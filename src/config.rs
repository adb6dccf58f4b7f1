//! Cluster and Queue Configuration
//!
//! Read once when a node, router or proxy is constructed. Loaded from an optional
//! JSON file; every field has a default so an empty object is a valid config.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_PARTITION_COUNT: u32 = 271;

/// Upper bound on replicas (sync + async) a partition can have.
pub const MAX_BACKUP_COUNT: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClusterConfig {
    /// Fixed number of partitions; every member must agree on it.
    pub partition_count: u32,
    /// Retry and backup-ack timing for invocations.
    pub invocation: InvocationConfig,
    /// Used for queues no override matches.
    pub default_queue: QueueConfig,
    /// Per-name overrides. Keys are exact names or patterns with a single `*`.
    pub queues: HashMap<String, QueueConfig>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            partition_count: DEFAULT_PARTITION_COUNT,
            invocation: InvocationConfig::default(),
            default_queue: QueueConfig::default(),
            queues: HashMap::new(),
        }
    }
}

impl ClusterConfig {
    /// Reads and validates a JSON config; missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: ClusterConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configs no member could run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.partition_count == 0 {
            return Err(anyhow::anyhow!("partition_count must be positive"));
        }
        if self.invocation.max_attempts == 0 {
            return Err(anyhow::anyhow!("invocation.max_attempts must be positive"));
        }
        let queues = std::iter::once(("default", &self.default_queue))
            .chain(self.queues.iter().map(|(name, queue)| (name.as_str(), queue)));
        for (name, queue) in queues {
            if queue.total_backup_count() > MAX_BACKUP_COUNT {
                return Err(anyhow::anyhow!(
                    "queue config {}: backup_count + async_backup_count exceeds {}",
                    name,
                    MAX_BACKUP_COUNT
                ));
            }
        }
        Ok(())
    }

    /// Adds an override for an exact name or a single-`*` pattern.
    pub fn with_queue(mut self, pattern: &str, config: QueueConfig) -> Self {
        self.queues.insert(pattern.to_string(), config);
        self
    }

    /// Exact name first, then the most specific matching wildcard, then the default.
    ///
    /// Equally long wildcards are broken by the lexicographically smallest pattern,
    /// so owner and replicas always resolve the same config.
    pub fn find_queue_config(&self, name: &str) -> &QueueConfig {
        if let Some(config) = self.queues.get(name) {
            return config;
        }
        self.queues
            .iter()
            .filter(|(pattern, _)| wildcard_matches(pattern, name))
            .max_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| b.cmp(a)))
            .map(|(_, config)| config)
            .unwrap_or(&self.default_queue)
    }
}

fn wildcard_matches(pattern: &str, name: &str) -> bool {
    match pattern.split_once('*') {
        Some((prefix, suffix)) => {
            name.len() >= prefix.len() + suffix.len()
                && name.starts_with(prefix)
                && name.ends_with(suffix)
        }
        None => false,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of items; `0` means unbounded.
    pub max_size: usize,
    /// Replicas the owner waits on before replying.
    pub backup_count: usize,
    /// Replicas updated fire-and-forget.
    pub async_backup_count: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_size: 0,
            backup_count: 1,
            async_backup_count: 0,
        }
    }
}

impl QueueConfig {
    /// `max_size` with `0` read as unbounded.
    pub fn capacity(&self) -> usize {
        if self.max_size == 0 {
            usize::MAX
        } else {
            self.max_size
        }
    }

    /// Sync plus async replicas.
    pub fn total_backup_count(&self) -> usize {
        self.backup_count + self.async_backup_count
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InvocationConfig {
    /// Attempts before a routing failure is surfaced.
    pub max_attempts: u32,
    /// Pause before re-resolving the owner.
    pub retry_pause_ms: u64,
    /// Delivery attempts per backup packet.
    pub backup_attempts: u32,
    /// How long an owner waits for synchronous backup acks before replying anyway.
    pub backup_ack_timeout_ms: u64,
}

impl Default for InvocationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            retry_pause_ms: 100,
            backup_attempts: 3,
            backup_ack_timeout_ms: 5_000,
        }
    }
}

impl InvocationConfig {
    pub fn retry_pause(&self) -> Duration {
        Duration::from_millis(self.retry_pause_ms)
    }

    pub fn backup_ack_timeout(&self) -> Duration {
        Duration::from_millis(self.backup_ack_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ClusterConfig::default();

        assert_eq!(config.partition_count, 271);
        assert_eq!(config.default_queue.backup_count, 1);
        assert_eq!(config.default_queue.capacity(), usize::MAX);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_find_queue_config_prefers_exact_then_longest_wildcard() {
        let bounded = QueueConfig {
            max_size: 10,
            ..QueueConfig::default()
        };
        let no_backup = QueueConfig {
            backup_count: 0,
            ..QueueConfig::default()
        };
        let exact = QueueConfig {
            max_size: 1,
            ..QueueConfig::default()
        };
        let config = ClusterConfig::default()
            .with_queue("orders*", bounded.clone())
            .with_queue("orders-eu*", no_backup.clone())
            .with_queue("orders-eu-1", exact.clone());

        assert_eq!(config.find_queue_config("orders-eu-1"), &exact);
        assert_eq!(config.find_queue_config("orders-eu-2"), &no_backup);
        assert_eq!(config.find_queue_config("orders-us"), &bounded);
        assert_eq!(config.find_queue_config("payments"), &QueueConfig::default());
    }

    #[test]
    fn test_equally_specific_wildcards_resolve_deterministically() {
        let prefixed = QueueConfig {
            max_size: 5,
            ..QueueConfig::default()
        };
        let suffixed = QueueConfig {
            max_size: 7,
            ..QueueConfig::default()
        };

        // Fresh maps iterate in different orders
        for _ in 0..32 {
            let config = ClusterConfig::default()
                .with_queue("a*", prefixed.clone())
                .with_queue("*b", suffixed.clone());

            assert_eq!(config.find_queue_config("ab"), &suffixed);
        }
    }

    #[test]
    fn test_load_partial_json_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"partition_count": 16, "queues": {{"jobs": {{"max_size": 3}}}}}}"#
        )
        .unwrap();

        let config = ClusterConfig::load(file.path()).unwrap();

        assert_eq!(config.partition_count, 16);
        assert_eq!(config.invocation, InvocationConfig::default());
        assert_eq!(config.find_queue_config("jobs").max_size, 3);
        assert_eq!(config.find_queue_config("jobs").backup_count, 1);
    }

    #[test]
    fn test_validate_rejects_too_many_backups() {
        let config = ClusterConfig::default().with_queue(
            "wide",
            QueueConfig {
                backup_count: 4,
                async_backup_count: 3,
                ..QueueConfig::default()
            },
        );

        assert!(config.validate().is_err());
    }
}
