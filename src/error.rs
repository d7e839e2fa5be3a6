use miette::Diagnostic;
use thiserror::Error;
use uuid::Uuid;

/**
 * 目录错误类型 - 使用 miette 提供诊断信息
 *
 * NotFound 与 IntegrityViolation 必须可区分，调用方据此映射 4xx / 5xx 响应
 */
#[derive(Error, Debug, Diagnostic)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    #[diagnostic(code(catalog::io_error))]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    #[diagnostic(code(catalog::not_found))]
    NotFound(String),

    #[error("Integrity violation: {0}")]
    #[diagnostic(
        code(catalog::integrity_violation),
        help("An identifier/revision pair, event identifier or collection identifier is already stored")
    )]
    IntegrityViolation(String),

    #[error("Stale revision for {identifier}: current is {current}, supplied {supplied}")]
    #[diagnostic(
        code(catalog::stale_revision),
        help("Supply a revision_number greater than the current one")
    )]
    StaleRevision {
        identifier: Uuid,
        current: i64,
        supplied: i64,
    },

    #[error("Validation error: {0}")]
    #[diagnostic(
        code(catalog::validation_error),
        help("Check that your input meets the required format and constraints")
    )]
    Validation(String),

    #[error("Database error: {0}")]
    #[diagnostic(
        code(catalog::database_error),
        help("Check database connection and schema integrity")
    )]
    Database(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(catalog::config_error))]
    Config(String),
}

impl CatalogError {
    /**
     * 创建未找到错误
     */
    pub fn not_found(message: impl Into<String>) -> Self {
        CatalogError::NotFound(message.into())
    }

    /**
     * 创建完整性错误
     */
    pub fn integrity_violation(message: impl Into<String>) -> Self {
        CatalogError::IntegrityViolation(message.into())
    }

    /**
     * 创建验证错误
     */
    pub fn validation_error(message: impl Into<String>) -> Self {
        CatalogError::Validation(message.into())
    }

    /**
     * 创建数据库错误
     */
    pub fn database_error(message: impl Into<String>) -> Self {
        CatalogError::Database(message.into())
    }

    /**
     * 创建配置错误
     */
    pub fn config_error(message: impl Into<String>) -> Self {
        CatalogError::Config(message.into())
    }

    /**
     * 按约束类型对 sqlx 错误分类
     *
     * 唯一键、外键、CHECK 约束冲突归为 IntegrityViolation，其余归为 Database
     */
    pub fn storage(context: &str, error: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_error) = &error {
            if db_error.is_unique_violation()
                || db_error.is_foreign_key_violation()
                || db_error.is_check_violation()
            {
                return CatalogError::IntegrityViolation(format!(
                    "{}: {}",
                    context,
                    db_error.message()
                ));
            }
        }
        CatalogError::Database(format!("{}: {}", context, error))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::NotFound(_))
    }

    pub fn is_integrity_violation(&self) -> bool {
        matches!(self, CatalogError::IntegrityViolation(_))
    }
}

/**
 * 统一结果类型
 */
pub type Result<T> = std::result::Result<T, CatalogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = CatalogError::not_found("object 42");
        assert!(error.is_not_found());
        assert!(!error.is_integrity_violation());

        let error = CatalogError::integrity_violation("duplicate revision");
        assert!(error.is_integrity_violation());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let error: CatalogError = io_error.into();

        assert!(matches!(error, CatalogError::Io(_)));
    }

    #[test]
    fn test_non_constraint_sqlx_error_is_database_error() {
        let error = CatalogError::storage("Failed to fetch object", sqlx::Error::PoolTimedOut);
        assert!(matches!(error, CatalogError::Database(_)));
        let display = format!("{}", error);
        assert!(display.contains("Failed to fetch object"));
    }

    #[test]
    fn test_stale_revision_display() {
        let error = CatalogError::StaleRevision {
            identifier: Uuid::nil(),
            current: 3,
            supplied: 2,
        };
        let display = format!("{}", error);
        assert!(display.contains("current is 3"));
        assert!(display.contains("supplied 2"));
    }
}
