//! 日志初始化
//!
//! `RUST_LOG` 优先，未设置时使用配置中的级别。

use crate::error::{CatalogError, Result};
use crate::infrastructure::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// 安装全局 tracing subscriber
///
/// 已经安装过 subscriber 时直接返回 `Ok(false)`。
pub fn init_logging(config: &LoggingConfig) -> Result<bool> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            CatalogError::config_error(format!("Invalid log level '{}': {}", config.level, e))
        })?,
    };

    let installed = if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
            .is_ok()
    };

    if installed {
        tracing::info!(level = %config.level, json = config.json, "Logging initialized");
    }
    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_not_an_error() {
        let config = LoggingConfig::default();
        let _ = init_logging(&config).unwrap();
        assert!(!init_logging(&config).unwrap());
    }
}
