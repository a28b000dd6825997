use quote::ToTokens;
use syn::{Attribute, Field, FieldsNamed, Token, punctuated::Punctuated};

// 提取非 derive 属性与已有 derive 列表
pub(crate) fn split_derives(attrs: &[Attribute]) -> (Vec<Attribute>, Vec<syn::Path>) {
    let mut retained = Vec::new();
    let mut existing = Vec::new();
    for attr in attrs.iter() {
        if attr.path().is_ident("derive") {
            if let Ok(list) = attr.parse_args_with(
                syn::punctuated::Punctuated::<syn::Path, Token![,]>::parse_terminated,
            ) {
                existing.extend(list);
            }
        } else {
            retained.push(attr.clone());
        }
    }
    (retained, existing)
}

// 合并默认与已有 derive（去重，优先保留 required）
pub(crate) fn merge_derives(existing: Vec<syn::Path>, required: Vec<syn::Path>) -> Attribute {
    let mut seen = std::collections::HashSet::<String>::new();
    let mut final_list: Vec<syn::Path> = Vec::new();
    for p in required.into_iter().chain(existing) {
        if seen.insert(derive_key(&p)) {
            final_list.push(p);
        }
    }
    syn::parse_quote!(#[derive(#(#final_list),*)])
}

// 归一化 derive 的 key，避免 Serialize/serde::Serialize 重复
pub(crate) fn derive_key(p: &syn::Path) -> String {
    if let Some(last) = p.segments.last() {
        let last_ident = last.ident.to_string();
        match last_ident.as_str() {
            "Serialize" | "Deserialize" => format!("serde::{}", last_ident),
            _ => last_ident,
        }
    } else {
        p.to_token_stream().to_string()
    }
}

// 直接在 attrs 上应用默认派生合并
pub(crate) fn apply_derives(attrs: &mut Vec<Attribute>, required: Vec<syn::Path>) {
    let (retained, existing) = split_derives(attrs);
    let merged = merge_derives(existing, required);
    *attrs = std::iter::once(merged).chain(retained).collect();
}

pub(crate) fn has_field_named(fields: &FieldsNamed, name: &str) -> bool {
    fields
        .named
        .iter()
        .any(|f| f.ident.as_ref().map(|i| i == name).unwrap_or(false))
}

/// 重排具名字段：`leading` 中的字段置于最前（已存在则复用原定义），
/// 其余字段保持原有相对顺序，`trailing` 中缺失的字段追加在最后。
pub(crate) fn arrange_fields(fields: &mut FieldsNamed, leading: Vec<Field>, trailing: Vec<Field>) {
    let old_named = fields.named.clone();
    let mut new_named: Punctuated<Field, Token![,]> = Punctuated::new();

    let name_of = |f: &Field| f.ident.as_ref().map(|i| i.to_string());
    let leading_names: Vec<Option<String>> = leading.iter().map(name_of).collect();

    for required in leading {
        let existing = old_named
            .iter()
            .find(|f| name_of(f).is_some() && name_of(f) == name_of(&required));
        new_named.push(existing.cloned().unwrap_or(required));
    }

    for f in old_named.into_iter() {
        if !leading_names.contains(&name_of(&f)) {
            new_named.push(f);
        }
    }

    for f in trailing {
        let present = new_named
            .iter()
            .any(|existing| name_of(existing).is_some() && name_of(existing) == name_of(&f));
        if !present {
            new_named.push(f);
        }
    }

    fields.named = new_named;
}
