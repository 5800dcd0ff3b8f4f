// # Pool configuration
//
// A plain data struct plus a consuming builder that validates on `build()`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pool::error::PoolError;

/// Configuration for a [`crate::pool::Pool`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Minimum number of sessions to maintain. `0` means the pool may sit fully empty.
    pub min_size: usize,

    /// Maximum number of sessions allowed. Must be at least `1` and at least `min_size`.
    pub max_size: usize,

    /// Age at which an idle session is closed and, if needed, replaced. `None` disables
    /// age-based expiration entirely.
    pub expire_after: Option<Duration>,

    /// Cumulative lease count at which a session is retired on release instead of returned
    /// to the idle queue. `None` disables use-count-based retirement entirely.
    pub retire_after: Option<u64>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_size: 0,
            max_size: 10,
            expire_after: None,
            retire_after: None,
        }
    }
}

impl PoolConfig {
    /// Validate the configuration, returning the offending field and reason on failure.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.max_size < 1 {
            return Err(PoolError::IllegalArgument {
                field: "max_size",
                reason: format!("must be >= 1, got {}", self.max_size),
            });
        }
        if self.min_size > self.max_size {
            return Err(PoolError::IllegalArgument {
                field: "min_size",
                reason: format!("min_size ({}) > max_size ({})", self.min_size, self.max_size),
            });
        }
        if let Some(expire_after) = self.expire_after {
            if expire_after.is_zero() {
                return Err(PoolError::IllegalArgument {
                    field: "expire_after",
                    reason: "must be positive when set; use None to disable".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::default()
    }
}

/// Builder for [`PoolConfig`].
#[derive(Default)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    pub fn min_size(mut self, size: usize) -> Self {
        self.config.min_size = size;
        self
    }

    pub fn max_size(mut self, size: usize) -> Self {
        self.config.max_size = size;
        self
    }

    pub fn expire_after(mut self, duration: Duration) -> Self {
        self.config.expire_after = Some(duration);
        self
    }

    pub fn retire_after(mut self, lease_count: u64) -> Self {
        self.config.retire_after = Some(lease_count);
        self
    }

    pub fn build(self) -> Result<PoolConfig, PoolError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_min_greater_than_max() {
        let config = PoolConfig {
            min_size: 10,
            max_size: 5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_max() {
        let config = PoolConfig {
            max_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn builder_produces_valid_config() {
        let config = PoolConfig::builder()
            .min_size(2)
            .max_size(8)
            .retire_after(100)
            .build()
            .unwrap();
        assert_eq!(config.min_size, 2);
        assert_eq!(config.max_size, 8);
        assert_eq!(config.retire_after, Some(100));
        assert!(config.expire_after.is_none());
    }
}
