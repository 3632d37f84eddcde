//! Repository cache and flush configuration.

use serde::Deserialize;
use std::time::Duration;

/// Cache capacities and batched-flush timing.
///
/// Capacities bound each repository's LRU cache. The flush delay is measured
/// from the first write of a batch, so a steady trickle of writes is still
/// flushed once per delay.
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryConfig {
    /// Milliseconds between the first buffered write and its flush (default: 2000).
    #[serde(default = "default_flush_delay_ms")]
    pub flush_delay_ms: u64,
    /// Users kept in memory (default: 1000).
    #[serde(default = "default_user_cache_capacity")]
    pub user_cache_capacity: usize,
    /// Channels kept in memory (default: 500).
    #[serde(default = "default_channel_cache_capacity")]
    pub channel_cache_capacity: usize,
    /// Messages kept in memory (default: 5000).
    #[serde(default = "default_message_cache_capacity")]
    pub message_cache_capacity: usize,
}

impl RepositoryConfig {
    pub fn flush_delay(&self) -> Duration {
        Duration::from_millis(self.flush_delay_ms)
    }
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            flush_delay_ms: default_flush_delay_ms(),
            user_cache_capacity: default_user_cache_capacity(),
            channel_cache_capacity: default_channel_cache_capacity(),
            message_cache_capacity: default_message_cache_capacity(),
        }
    }
}

fn default_flush_delay_ms() -> u64 {
    2000
}

fn default_user_cache_capacity() -> usize {
    1000
}

fn default_channel_cache_capacity() -> usize {
    500
}

fn default_message_cache_capacity() -> usize {
    5000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values_are_correct() {
        let config = RepositoryConfig::default();
        assert_eq!(config.flush_delay(), Duration::from_secs(2));
        assert_eq!(config.user_cache_capacity, 1000);
        assert_eq!(config.channel_cache_capacity, 500);
        assert_eq!(config.message_cache_capacity, 5000);
    }
}
