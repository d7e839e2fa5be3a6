//! 基础设施层：配置与日志

pub mod config;
pub mod logging;

pub use config::{BackendKind, CatalogConfig, DatabaseConfig, LoggingConfig, RevisionPolicy};
pub use logging::init_logging;
