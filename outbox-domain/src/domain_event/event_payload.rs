use serde::Serialize;
use serde::de::DeserializeOwned;

/// 具体领域事件的强类型载荷
///
/// `NAME` 即事件类型名，投递时据此查找处理器，因此在整个系统内应保持唯一。
/// 通常由 `#[domain_event]` 宏生成实现。
pub trait EventPayload: Serialize + DeserializeOwned + Send + Sync {
    const NAME: &'static str;
}
