//! Store connection configuration.

use std::time::Duration;

/// Configuration shared by the reference store connections.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Timeout applied to calls whose context carries no deadline.
    pub default_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
        }
    }
}

impl StoreConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default timeout.
    #[must_use]
    pub const fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        assert_eq!(StoreConfig::default().default_timeout, Duration::from_secs(30));
    }

    #[test]
    fn builder_pattern() {
        let config = StoreConfig::new().default_timeout(Duration::from_millis(250));
        assert_eq!(config.default_timeout, Duration::from_millis(250));
    }
}
