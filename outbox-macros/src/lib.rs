use proc_macro::TokenStream;

mod aggregate;
mod domain_event;
mod utils;

/// 聚合宏
/// - 追加字段：`id: IdType`（若缺失，置于最前）与事件缓冲 `pending_events`（不参与序列化）
/// - 自动实现 `::outbox_domain::entity::Entity` 与 `::outbox_domain::aggregate::Aggregate`
/// - 支持参数：`#[aggregate(id = IdType, name = "prompt")]`，`id` 默认 `String`
///
/// 使用方需依赖 `serde`（宏会合并派生 `Default`、`Serialize`、`Deserialize`）。
#[proc_macro_attribute]
pub fn aggregate(attr: TokenStream, item: TokenStream) -> TokenStream {
    aggregate::expand(attr, item)
}

/// 领域事件载荷宏
/// - 为结构体派生 `Serialize`/`Deserialize` 并实现 `::outbox_domain::domain_event::EventPayload`
/// - 事件类型名默认取类型名，可用 `#[domain_event(name = "...")]` 覆写
#[proc_macro_attribute]
pub fn domain_event(attr: TokenStream, item: TokenStream) -> TokenStream {
    domain_event::expand(attr, item)
}
