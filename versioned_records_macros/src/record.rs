use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::{format_ident, quote};
use syn::meta::ParseNestedMeta;
use syn::{
    token, Attribute, Data, DeriveInput, Expr, Fields, GenericArgument, Ident, LitStr,
    PathArguments, Token, Type,
};

pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let vis = &input.vis;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Record derive does not support generic structs",
        ));
    }

    let attrs = RecordAttrs::parse(input)?;
    let collection = attrs.collection.unwrap_or_else(|| default_collection(name));
    let patch_name = attrs
        .patch
        .unwrap_or_else(|| format_ident!("{}Patch", name));

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Record derive requires a struct with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "Record derive can only be used on structs",
            ))
        }
    };

    let container = SerdeNames::parse(&input.attrs, NameScope::Container)?;
    let rename_all = container.rename_all.map(|rule| quote! { #[serde(rename_all = #rule)] });

    let mut patch_fields = Vec::with_capacity(fields.len());
    for field in fields {
        let ident = &field.ident;
        let ty = &field.ty;
        let patch_ty = if is_option(ty) {
            quote! { #ty }
        } else {
            quote! { ::std::option::Option<#ty> }
        };
        let names = SerdeNames::parse(&field.attrs, NameScope::Field)?;
        let rename = names.rename.map(|name| quote! { #[serde(rename = #name)] });
        let aliases = names.aliases.iter().map(|alias| quote! { #[serde(alias = #alias)] });
        patch_fields.push(quote! {
            #[serde(default, skip_serializing_if = "::std::option::Option::is_none")]
            #rename
            #(#aliases)*
            pub #ident: #patch_ty,
        });
    }

    let patch_doc = format!(
        "Partial update for [`{}`]. Only the `Some` fields are written.",
        name
    );

    Ok(quote! {
        #[doc = #patch_doc]
        #[derive(Debug, Clone, Default, ::serde::Serialize, ::serde::Deserialize)]
        #[serde(deny_unknown_fields)]
        #rename_all
        #vis struct #patch_name {
            #(#patch_fields)*
        }

        impl versioned_records::Record for #name {
            const COLLECTION: &'static str = #collection;
            type Patch = #patch_name;
        }
    })
}

#[derive(Default)]
struct RecordAttrs {
    collection: Option<String>,
    patch: Option<Ident>,
}

impl RecordAttrs {
    fn parse(input: &DeriveInput) -> syn::Result<Self> {
        let mut attrs = RecordAttrs::default();
        for attr in &input.attrs {
            if !attr.path().is_ident("record") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("collection") {
                    let value: LitStr = meta.value()?.parse()?;
                    attrs.collection = Some(value.value());
                    Ok(())
                } else if meta.path.is_ident("patch") {
                    let value: LitStr = meta.value()?.parse()?;
                    attrs.patch = Some(Ident::new(&value.value(), Span::call_site()));
                    Ok(())
                } else {
                    Err(meta.error("unsupported record attribute, expected `collection` or `patch`"))
                }
            })?;
        }
        Ok(attrs)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum NameScope {
    Container,
    Field,
}

/// The serde attributes that decide a field's key in the stored payload.
///
/// The patch must serialize to the same keys as the record, or a merged
/// change lands under a key the record never reads back.
#[derive(Default)]
struct SerdeNames {
    rename: Option<LitStr>,
    rename_all: Option<LitStr>,
    aliases: Vec<LitStr>,
}

impl SerdeNames {
    fn parse(attrs: &[Attribute], scope: NameScope) -> syn::Result<Self> {
        let mut names = SerdeNames::default();
        for attr in attrs {
            if !attr.path().is_ident("serde") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                let key = meta
                    .path
                    .get_ident()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                match (scope, key.as_str()) {
                    (NameScope::Field, "rename") => {
                        names.rename = Some(plain_name(&meta, "rename")?);
                    }
                    (NameScope::Field, "alias") => {
                        names.aliases.push(meta.value()?.parse()?);
                    }
                    (NameScope::Container, "rename_all") => {
                        names.rename_all = Some(plain_name(&meta, "rename_all")?);
                    }
                    (
                        NameScope::Field,
                        "flatten" | "skip" | "skip_serializing" | "skip_deserializing" | "with"
                        | "serialize_with" | "deserialize_with",
                    )
                    | (NameScope::Container, "transparent") => {
                        return Err(meta.error(format!(
                            "Record derive does not support `#[serde({key})]`"
                        )));
                    }
                    _ => skip_value(&meta)?,
                }
                Ok(())
            })?;
        }
        Ok(names)
    }
}

/// `rename = "..."`; the split `rename(serialize = .., deserialize = ..)` form is rejected.
fn plain_name(meta: &ParseNestedMeta, key: &str) -> syn::Result<LitStr> {
    if meta.input.peek(Token![=]) {
        meta.value()?.parse()
    } else {
        Err(meta.error(format!(
            "Record derive only supports `{key} = \"...\"` with a single name"
        )))
    }
}

/// Consume whatever follows an attribute key we do not need.
fn skip_value(meta: &ParseNestedMeta) -> syn::Result<()> {
    if meta.input.peek(Token![=]) {
        let _: Expr = meta.value()?.parse()?;
    } else if meta.input.peek(token::Paren) {
        meta.parse_nested_meta(|nested| skip_value(&nested))?;
    }
    Ok(())
}

/// `Option<T>` fields are kept as-is in the patch; a `None` there means "leave unchanged".
fn is_option(ty: &Type) -> bool {
    let Type::Path(path) = ty else {
        return false;
    };
    path.qself.is_none()
        && path.path.segments.last().is_some_and(|segment| {
            segment.ident == "Option"
                && matches!(
                    &segment.arguments,
                    PathArguments::AngleBracketed(args)
                        if matches!(args.args.first(), Some(GenericArgument::Type(_)))
                )
        })
}

fn default_collection(name: &Ident) -> String {
    format!("{}s", to_snake_case(&name.to_string()))
}

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, ch) in s.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.extend(ch.to_lowercase());
        } else {
            result.push(ch);
        }
    }
    result
}
