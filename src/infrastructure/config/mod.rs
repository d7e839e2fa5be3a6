//! 配置管理基础设施层
//!
//! 配置按层叠加：
//! - 内置默认值
//! - 可选的 TOML 配置文件
//! - `DOR_CATALOG__*` 环境变量（如 `DOR_CATALOG__DATABASE__URL`）
//!
//! 加载完成后统一经过 validator 校验。

use crate::error::{CatalogError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use validator::Validate;

/// 环境变量前缀
pub const ENV_PREFIX: &str = "DOR_CATALOG";

/// 存储后端种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// 内存参考实现（oracle）
    Memory,
    /// SQLite 持久化实现
    #[default]
    Sqlite,
}

/// 修订号单调性由谁保证
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RevisionPolicy {
    /// 调用方负责，目录不做校验
    #[default]
    CallerEnforced,
    /// 目录拒绝不大于当前修订号的 add
    StoreEnforced,
}

/// 全局配置根结构
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default, PartialEq)]
pub struct CatalogConfig {
    #[serde(default)]
    pub backend: BackendKind,

    #[serde(default)]
    #[validate(nested)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub revisions: RevisionConfig,

    #[serde(default)]
    #[validate(nested)]
    pub logging: LoggingConfig,
}

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct DatabaseConfig {
    /// `sqlite://` URL 或文件路径
    #[validate(length(min = 1, max = 1024))]
    pub url: String,

    #[validate(range(min = 1, max = 64))]
    pub max_connections: u32,

    #[validate(range(min = 1, max = 600))]
    pub acquire_timeout_secs: u64,

    pub create_if_missing: bool,
}

/// 修订策略配置
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct RevisionConfig {
    #[serde(default)]
    pub policy: RevisionPolicy,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct LoggingConfig {
    #[validate(length(min = 1, max = 100))]
    pub level: String,

    /// 输出 JSON 格式日志
    pub json: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://catalog.db".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 30,
            create_if_missing: true,
        }
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl CatalogConfig {
    /// 加载配置：默认值 → 配置文件（可选）→ 环境变量
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = ::config::Config::try_from(&CatalogConfig::default())
            .map_err(|e| CatalogError::config_error(format!("Invalid defaults: {}", e)))?;

        let mut builder = ::config::Config::builder().add_source(defaults);

        if let Some(path) = path {
            if !path.exists() {
                return Err(CatalogError::config_error(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(
                ::config::File::from(path)
                    .format(::config::FileFormat::Toml)
                    .required(true),
            );
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let loaded: CatalogConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| CatalogError::config_error(format!("Failed to load config: {}", e)))?;

        loaded.validated()
    }

    /// 从 TOML 字符串解析（不读取环境变量）
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let parsed: CatalogConfig = toml::from_str(content)
            .map_err(|e| CatalogError::config_error(format!("Invalid TOML: {}", e)))?;
        parsed.validated()
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| CatalogError::config_error(format!("Failed to render config: {}", e)))
    }

    fn validated(self) -> Result<Self> {
        self.validate()
            .map_err(|e| CatalogError::config_error(format!("配置验证失败: {}", e)))?;
        Ok(self)
    }
}
