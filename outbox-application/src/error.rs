use crate::config::ConfigError;
use outbox_domain::error::DomainError;

#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("domain: {0}")]
    Domain(#[from] DomainError),

    #[error("validation: {0}")]
    Validation(String),

    #[error("config: {0}")]
    Config(#[from] ConfigError),

    /// 存储层故障的通用包装（不可达、写入失败等）
    #[error("infra: {0}")]
    Infra(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// 事务开启/提交失败（含提交超时）
    #[error("transaction {stage} failed: {reason}")]
    Transaction { stage: &'static str, reason: String },

    #[error("panicked: {message}")]
    Panicked { message: String },

    #[error("event handler error: handler={handler}, reason={reason}")]
    Handler { handler: String, reason: String },
}

impl AppError {
    pub fn infra(reason: impl std::fmt::Display) -> Self {
        Self::Infra(reason.to_string())
    }

    pub fn transaction(stage: &'static str, reason: impl std::fmt::Display) -> Self {
        Self::Transaction {
            stage,
            reason: reason.to_string(),
        }
    }

    pub fn handler(handler: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Handler {
            handler: handler.into(),
            reason: reason.into(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// 从 `catch_unwind` 捕获的负载中提取可读的 panic 信息
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(feature = "infra-sqlx")]
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("row not found".to_string()),
            other => AppError::Infra(other.to_string()),
        }
    }
}
