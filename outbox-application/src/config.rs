//! 配置（Configuration）
//!
//! - `OutboxConfig`：投递循环的轮询间隔、批大小与最大重试次数；
//! - `UnitOfWorkConfig`：工作单元事务的最大提交时长。
//!
//! 两者都可以：
//! - 通过 builder 构造（`build()` 即校验）；
//! - 作为更大配置文档的一部分反序列化（缺省字段取默认值），之后调用 `validate()`；
//! - 通过 `from_env()` 从环境变量读取（未设置取默认值）。
//!
use bon::bon;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value}")]
    Invalid { var: String, value: String },

    #[error("{field} out of range: {value} (expected {min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },
}

fn check_range(field: &'static str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// 读取可选环境变量：未设置返回默认值，无法解析返回 `ConfigError::Invalid`
fn parse_optional_var<T: FromStr>(var: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            var: var.to_string(),
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}

/// 投递循环配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OutboxConfig {
    /// 两次轮询之间的间隔（毫秒），100..=60000
    pub polling_interval_ms: u64,
    /// 每次轮询最多取出的记录数，1..=100
    pub batch_size: usize,
    /// 失败多少次后隔离为 `FAILED`，0..=10
    pub max_retries: u32,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            polling_interval_ms: Self::DEFAULT_POLLING_INTERVAL_MS,
            batch_size: Self::DEFAULT_BATCH_SIZE,
            max_retries: Self::DEFAULT_MAX_RETRIES,
        }
    }
}

#[bon]
impl OutboxConfig {
    pub const DEFAULT_POLLING_INTERVAL_MS: u64 = 1000;
    pub const DEFAULT_BATCH_SIZE: usize = 10;
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    #[builder]
    pub fn new(
        #[builder(default = OutboxConfig::DEFAULT_POLLING_INTERVAL_MS)] polling_interval_ms: u64,
        #[builder(default = OutboxConfig::DEFAULT_BATCH_SIZE)] batch_size: usize,
        #[builder(default = OutboxConfig::DEFAULT_MAX_RETRIES)] max_retries: u32,
    ) -> Result<Self, ConfigError> {
        Self {
            polling_interval_ms,
            batch_size,
            max_retries,
        }
        .validate()
    }

    /// 从环境变量读取
    ///
    /// - `OUTBOX_POLLING_INTERVAL_MS`：默认 1000
    /// - `OUTBOX_BATCH_SIZE`：默认 10
    /// - `OUTBOX_MAX_RETRIES`：默认 3
    pub fn from_env() -> Result<Self, ConfigError> {
        Self {
            polling_interval_ms: parse_optional_var(
                "OUTBOX_POLLING_INTERVAL_MS",
                Self::DEFAULT_POLLING_INTERVAL_MS,
            )?,
            batch_size: parse_optional_var("OUTBOX_BATCH_SIZE", Self::DEFAULT_BATCH_SIZE)?,
            max_retries: parse_optional_var("OUTBOX_MAX_RETRIES", Self::DEFAULT_MAX_RETRIES)?,
        }
        .validate()
    }

    pub fn validate(self) -> Result<Self, ConfigError> {
        check_range("pollingIntervalMs", self.polling_interval_ms, 100, 60_000)?;
        check_range("batchSize", self.batch_size as u64, 1, 100)?;
        check_range("maxRetries", u64::from(self.max_retries), 0, 10)?;
        Ok(self)
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }
}

/// 工作单元配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UnitOfWorkConfig {
    /// 事务最大提交时长（毫秒），1000..=60000
    pub transaction_timeout_ms: u64,
}

impl Default for UnitOfWorkConfig {
    fn default() -> Self {
        Self {
            transaction_timeout_ms: Self::DEFAULT_TRANSACTION_TIMEOUT_MS,
        }
    }
}

#[bon]
impl UnitOfWorkConfig {
    pub const DEFAULT_TRANSACTION_TIMEOUT_MS: u64 = 30_000;

    #[builder]
    pub fn new(
        #[builder(default = UnitOfWorkConfig::DEFAULT_TRANSACTION_TIMEOUT_MS)] transaction_timeout_ms: u64,
    ) -> Result<Self, ConfigError> {
        Self {
            transaction_timeout_ms,
        }
        .validate()
    }

    /// 从环境变量 `UNIT_OF_WORK_TRANSACTION_TIMEOUT_MS` 读取，默认 30000
    pub fn from_env() -> Result<Self, ConfigError> {
        Self {
            transaction_timeout_ms: parse_optional_var(
                "UNIT_OF_WORK_TRANSACTION_TIMEOUT_MS",
                Self::DEFAULT_TRANSACTION_TIMEOUT_MS,
            )?,
        }
        .validate()
    }

    pub fn validate(self) -> Result<Self, ConfigError> {
        check_range("transactionTimeoutMs", self.transaction_timeout_ms, 1_000, 60_000)?;
        Ok(self)
    }

    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_millis(self.transaction_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = OutboxConfig::default().validate().unwrap();
        assert_eq!(cfg.polling_interval(), Duration::from_millis(1000));
        assert_eq!(cfg.batch_size, 10);
        assert_eq!(cfg.max_retries, 3);

        let uow = UnitOfWorkConfig::default().validate().unwrap();
        assert_eq!(uow.transaction_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn builder_validates_bounds() {
        let cfg = OutboxConfig::builder()
            .polling_interval_ms(100)
            .batch_size(100)
            .max_retries(0)
            .build()
            .unwrap();
        assert_eq!(cfg.batch_size, 100);

        let err = OutboxConfig::builder().polling_interval_ms(99).build().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::OutOfRange {
                field: "pollingIntervalMs",
                ..
            }
        ));
        assert!(OutboxConfig::builder().polling_interval_ms(60_001).build().is_err());
        assert!(OutboxConfig::builder().batch_size(0).build().is_err());
        assert!(OutboxConfig::builder().batch_size(101).build().is_err());
        assert!(OutboxConfig::builder().max_retries(11).build().is_err());

        assert!(UnitOfWorkConfig::builder().transaction_timeout_ms(999).build().is_err());
        assert!(UnitOfWorkConfig::builder().transaction_timeout_ms(60_001).build().is_err());
        assert!(UnitOfWorkConfig::builder().transaction_timeout_ms(1_000).build().is_ok());
    }

    #[test]
    fn deserializes_partial_documents_with_defaults() {
        let cfg: OutboxConfig = serde_json::from_value(serde_json::json!({ "batchSize": 5 })).unwrap();
        assert_eq!(cfg.batch_size, 5);
        assert_eq!(cfg.polling_interval_ms, 1000);
        assert_eq!(cfg.max_retries, 3);

        let uow: UnitOfWorkConfig =
            serde_json::from_value(serde_json::json!({ "transactionTimeoutMs": 5000 })).unwrap();
        assert_eq!(uow.transaction_timeout_ms, 5000);
    }

    #[test]
    fn parse_optional_var_falls_back_and_rejects_garbage() {
        // 使用本测试独占的变量名，避免与其他测试并发修改同一环境变量
        let missing: u64 = parse_optional_var("OUTBOX_TEST_UNSET_VAR_7F3A", 42).unwrap();
        assert_eq!(missing, 42);

        unsafe { std::env::set_var("OUTBOX_TEST_GARBAGE_VAR_7F3A", "abc") };
        let err = parse_optional_var::<u64>("OUTBOX_TEST_GARBAGE_VAR_7F3A", 1).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                var: "OUTBOX_TEST_GARBAGE_VAR_7F3A".into(),
                value: "abc".into(),
            }
        );
        unsafe { std::env::remove_var("OUTBOX_TEST_GARBAGE_VAR_7F3A") };
    }
}
