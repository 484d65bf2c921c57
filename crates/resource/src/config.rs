//! Resource configuration

use std::time::Duration;

/// Tunables for a [`crate::CacheXaResource`].
#[derive(Debug, Clone)]
pub struct ResourceConfig {
    /// Transaction timeout reported until a caller overrides it; also what a
    /// `set_transaction_timeout(0)` call restores.
    pub default_timeout: Duration,
}

impl ResourceConfig {
    /// Config with an explicit default timeout.
    pub fn new(default_timeout: Duration) -> Self {
        ResourceConfig { default_timeout }
    }
}

impl Default for ResourceConfig {
    fn default() -> Self {
        ResourceConfig {
            default_timeout: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timeout_is_one_minute() {
        assert_eq!(ResourceConfig::default().default_timeout, Duration::from_secs(60));
    }

    #[test]
    fn explicit_timeout_is_kept() {
        let config = ResourceConfig::new(Duration::from_secs(5));
        assert_eq!(config.default_timeout, Duration::from_secs(5));
    }
}
