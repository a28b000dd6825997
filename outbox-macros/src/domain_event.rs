use crate::utils::apply_derives;
use proc_macro::TokenStream;
use quote::quote;
use syn::spanned::Spanned;
use syn::{Item, LitStr, Result, Token, parse::Parse, parse::ParseStream, parse_macro_input};

/// #[domain_event] 宏实现
/// - 仅支持结构体（强类型事件载荷）
/// - 派生 Serialize、Deserialize（与已有 derive 合并去重）
/// - 生成 `::outbox_domain::domain_event::EventPayload` 实现
/// - 支持：`#[domain_event(name = "...")]`，默认使用类型名作为事件类型名
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    let cfg = parse_macro_input!(attr as EventAttrConfig);
    let input = parse_macro_input!(item as Item);

    let mut st = match input {
        Item::Struct(s) => s,
        other => {
            return syn::Error::new(
                other.span(),
                "#[domain_event] can only be used on struct types",
            )
            .to_compile_error()
            .into();
        }
    };

    apply_derives(
        &mut st.attrs,
        vec![
            syn::parse_quote!(serde::Serialize),
            syn::parse_quote!(serde::Deserialize),
        ],
    );

    let ident = &st.ident;
    let name = cfg
        .name
        .unwrap_or_else(|| LitStr::new(&ident.to_string(), ident.span()));
    let generics = st.generics.clone();
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let out = quote! {
        #st

        impl #impl_generics ::outbox_domain::domain_event::EventPayload for #ident #ty_generics #where_clause {
            const NAME: &'static str = #name;
        }
    };

    TokenStream::from(out)
}

// 解析键值参数：name = "..."
struct EventAttrConfig {
    name: Option<LitStr>,
}

impl Parse for EventAttrConfig {
    fn parse(input: ParseStream) -> Result<Self> {
        if input.is_empty() {
            return Ok(Self { name: None });
        }

        let key: syn::Ident = input.parse()?;
        if key != "name" {
            return Err(syn::Error::new(
                key.span(),
                "unknown key; expected 'name'",
            ));
        }
        let _eq: Token![=] = input.parse()?;
        let lit: LitStr = input.parse()?;
        if !input.is_empty() {
            let _comma: Token![,] = input.parse()?;
            if !input.is_empty() {
                return Err(input.error("unexpected tokens after 'name'"));
            }
        }

        if lit.value().trim().is_empty() {
            return Err(syn::Error::new(lit.span(), "event name must not be empty"));
        }

        Ok(Self { name: Some(lit) })
    }
}
