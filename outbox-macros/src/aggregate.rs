use crate::utils::{apply_derives, arrange_fields, has_field_named};
use proc_macro::TokenStream;
use quote::quote;
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::{
    Field, Item, LitStr, Result, Token, Type, parse::Parse, parse::ParseStream, parse_macro_input,
};

const BUFFER_FIELD: &str = "pending_events";

/// #[aggregate] 宏实现
/// - 若缺失则追加字段 `id: IdType` 并置于字段最前
/// - 追加事件缓冲字段 `pending_events`（`#[serde(skip)]`，不随聚合持久化）
/// - 派生 Default、Serialize、Deserialize（与已有 derive 合并去重）
/// - 实现 `::outbox_domain::entity::Entity` 与 `::outbox_domain::aggregate::Aggregate`
/// - 支持参数：`#[aggregate(id = IdType, name = "...")]`；`id` 默认 `String`，`name` 默认为小写类型名
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    let cfg = parse_macro_input!(attr as AggregateAttrConfig);
    let input = parse_macro_input!(item as Item);

    let mut st = match input {
        Item::Struct(s) => s,
        other => {
            return syn::Error::new(other.span(), "#[aggregate] only on struct")
                .to_compile_error()
                .into();
        }
    };

    let fields_named = match &mut st.fields {
        syn::Fields::Named(f) => f,
        _ => {
            return syn::Error::new(st.span(), "only supports named-field struct")
                .to_compile_error()
                .into();
        }
    };

    if has_field_named(fields_named, BUFFER_FIELD) {
        return syn::Error::new(
            fields_named.span(),
            "`pending_events` is reserved for the aggregate event buffer",
        )
        .to_compile_error()
        .into();
    }

    let id_type = cfg.id_ty.unwrap_or_else(|| syn::parse_quote! { String });
    let id_field: Field = syn::parse_quote! { id: #id_type };
    let buffer_field: Field = syn::parse_quote! {
        #[serde(skip)]
        pending_events: ::std::vec::Vec<::outbox_domain::domain_event::DomainEvent>
    };
    arrange_fields(fields_named, vec![id_field], vec![buffer_field]);

    apply_derives(
        &mut st.attrs,
        vec![
            syn::parse_quote!(Default),
            syn::parse_quote!(serde::Serialize),
            syn::parse_quote!(serde::Deserialize),
        ],
    );

    let ident = &st.ident;
    let type_name = cfg
        .name
        .unwrap_or_else(|| LitStr::new(&ident.to_string().to_lowercase(), ident.span()));
    let generics = st.generics.clone();
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let expanded = quote! {
        #st

        impl #impl_generics ::outbox_domain::entity::Entity for #ident #ty_generics #where_clause {
            type Id = #id_type;

            fn new(id: Self::Id) -> Self {
                Self { id, ..::core::default::Default::default() }
            }

            fn id(&self) -> &Self::Id { &self.id }
        }

        impl #impl_generics ::outbox_domain::aggregate::Aggregate for #ident #ty_generics #where_clause {
            const TYPE: &'static str = #type_name;

            fn pending_events(&self) -> &[::outbox_domain::domain_event::DomainEvent] {
                &self.pending_events
            }

            fn pending_events_mut(
                &mut self,
            ) -> &mut ::std::vec::Vec<::outbox_domain::domain_event::DomainEvent> {
                &mut self.pending_events
            }
        }
    };

    TokenStream::from(expanded)
}

// -------- parsing --------

struct AggregateAttrConfig {
    id_ty: Option<Type>,
    name: Option<LitStr>,
}

impl Parse for AggregateAttrConfig {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut id_ty: Option<Type> = None;
        let mut name: Option<LitStr> = None;

        if input.is_empty() {
            return Ok(Self { id_ty, name });
        }

        let elems: Punctuated<AggregateAttrElem, Token![,]> =
            Punctuated::<AggregateAttrElem, Token![,]>::parse_terminated(input)?;

        for elem in elems.into_iter() {
            match elem {
                AggregateAttrElem::Id(ty) => {
                    if id_ty.is_some() {
                        return Err(syn::Error::new(
                            ty.span(),
                            "duplicate key 'id' in attribute",
                        ));
                    }
                    id_ty = Some(*ty);
                }
                AggregateAttrElem::Name(lit) => {
                    if name.is_some() {
                        return Err(syn::Error::new(
                            lit.span(),
                            "duplicate key 'name' in attribute",
                        ));
                    }
                    name = Some(lit);
                }
            }
        }

        Ok(Self { id_ty, name })
    }
}

enum AggregateAttrElem {
    Id(Box<Type>),
    Name(LitStr),
}

impl Parse for AggregateAttrElem {
    fn parse(input: ParseStream) -> Result<Self> {
        let key: syn::Ident = input.parse()?;
        let _eq: Token![=] = input.parse()?;
        if key == "id" {
            let ty: Type = input.parse()?;
            Ok(AggregateAttrElem::Id(Box::new(ty)))
        } else if key == "name" {
            let lit: LitStr = input.parse()?;
            Ok(AggregateAttrElem::Name(lit))
        } else {
            Err(syn::Error::new(
                key.span(),
                "unknown key in attribute; expected 'id' or 'name'",
            ))
        }
    }
}
