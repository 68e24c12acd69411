//! # Scribe Derive Macros
//!
//! This crate provides the procedural macros for `scribe`. It generates the
//! `Exposable` implementation of a struct, one `look_*` call per field, plus
//! the deep `Lookable` implementation that lets the struct sit in lists and
//! mappings.
//!
//! Compatible with `syn 2.0`.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::spanned::Spanned;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Expr, Fields, Ident, LitStr};

/// Derives `scribe::Exposable` and a deep `scribe::Lookable`.
///
/// Field attributes (`#[scribe(...)]`):
///
/// * *(none)* or `value`: scalar, `look_value`.
/// * `default = <expr>`: scalar omitted when equal to `<expr>`, `look_value_or`.
/// * `deep`: owned object, `look_deep`.
/// * `shared`: owned referenceable object (`Option<Shared<T>>`), `look_shared`.
/// * `reference`: `Ref<T>`, `look_reference`.
/// * `list = "value" | "deep" | "reference"`: `Option<Vec<T>>`, `look_list`.
/// * `map(key = "...", value = "...")`: `Option<M>`, `look_map`.
/// * `label = "name"`: node label, defaults to the field name.
/// * `skip`: not persisted.
///
/// Container attributes:
///
/// * `post_load = "method"`: calls `self.method()` during `PostLoadInit`, after
///   every field has been exposed.
/// * `no_lookable`: only `Exposable` is generated.
///
/// The generated `Lookable` builds entries with `Default::default()`, so the
/// struct must implement `Default` unless `no_lookable` is set. A struct
/// without `Default` can still be saved, loaded through `Scribe::look_*` calls
/// on an existing value, or given a hand-written `Lookable`.
#[proc_macro_derive(Exposable, attributes(scribe))]
pub fn derive_exposable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new(
            input.generics.span(),
            "Exposable cannot be derived for generic types; implement it by hand",
        ));
    }

    let fields = match &input.data {
        Data::Struct(ds) => match &ds.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new(
                    name.span(),
                    "Exposable only supports structs with named fields",
                ))
            }
        },
        _ => return Err(syn::Error::new(name.span(), "Exposable only supports structs")),
    };

    let container = parse_container_attributes(&input.attrs)?;

    let mut statements = Vec::new();
    for field in fields {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let attrs = parse_field_attributes(&field.attrs)?;
        if let Some(statement) = generate_look(ident, attrs) {
            statements.push(statement);
        }
    }

    let post_load_call = container.post_load.map(|method| {
        quote! {
            if scribe.phase() == ::std::option::Option::Some(::scribe::Phase::PostLoadInit) {
                self.#method();
            }
        }
    });

    let lookable = (!container.no_lookable).then(|| {
        quote! {
            ::scribe::impl_deep_lookable!(#name);
        }
    });

    Ok(quote! {
        impl ::scribe::Exposable for #name {
            fn expose(&mut self, scribe: &mut ::scribe::Scribe<'_>) -> ::scribe::Result<()> {
                #(#statements)*
                #post_load_call
                ::std::result::Result::Ok(())
            }
        }

        #lookable
    })
}

// --- Internal Data Structures ---

enum Kind {
    Value,
    ValueOr(Expr),
    Deep,
    Shared,
    Reference,
    List(Mode),
    Map { key: Mode, value: Mode },
    Skip,
}

#[derive(Clone, Copy)]
enum Mode {
    Value,
    Deep,
    Reference,
}

impl Mode {
    fn parse(lit: &LitStr) -> syn::Result<Self> {
        match lit.value().to_lowercase().as_str() {
            "value" => Ok(Mode::Value),
            "deep" => Ok(Mode::Deep),
            "reference" => Ok(Mode::Reference),
            _ => Err(syn::Error::new(
                lit.span(),
                "Unknown look mode. Supported: value, deep, reference",
            )),
        }
    }

    fn tokens(self) -> TokenStream2 {
        match self {
            Mode::Value => quote! { ::scribe::LookMode::Value },
            Mode::Deep => quote! { ::scribe::LookMode::Deep },
            Mode::Reference => quote! { ::scribe::LookMode::Reference },
        }
    }
}

struct FieldAttributes {
    kind: Kind,
    label: Option<String>,
}

#[derive(Default)]
struct ContainerAttributes {
    post_load: Option<Ident>,
    no_lookable: bool,
}

/// Parses `#[scribe(post_load = "method", no_lookable)]`.
fn parse_container_attributes(attrs: &[Attribute]) -> syn::Result<ContainerAttributes> {
    let mut container = ContainerAttributes::default();
    for attr in attrs {
        if attr.path().is_ident("scribe") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("post_load") {
                    let s: LitStr = meta.value()?.parse()?;
                    container.post_load = Some(Ident::new(&s.value(), s.span()));
                    return Ok(());
                }
                if meta.path.is_ident("no_lookable") {
                    container.no_lookable = true;
                    return Ok(());
                }
                Err(meta.error(
                    "Unknown scribe container attribute. Supported: post_load, no_lookable",
                ))
            })?;
        }
    }
    Ok(container)
}

fn parse_field_attributes(attrs: &[Attribute]) -> syn::Result<FieldAttributes> {
    let mut kind = None;
    let mut label = None;

    for attr in attrs {
        if !attr.path().is_ident("scribe") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            let mut set = |k: Kind| {
                if kind.is_some() {
                    return Err(meta.error("A field can only have one look kind"));
                }
                kind = Some(k);
                Ok(())
            };

            if meta.path.is_ident("value") {
                return set(Kind::Value);
            }
            if meta.path.is_ident("deep") {
                return set(Kind::Deep);
            }
            if meta.path.is_ident("shared") {
                return set(Kind::Shared);
            }
            if meta.path.is_ident("reference") {
                return set(Kind::Reference);
            }
            if meta.path.is_ident("skip") {
                return set(Kind::Skip);
            }
            if meta.path.is_ident("default") {
                let expr: Expr = meta.value()?.parse()?;
                return set(Kind::ValueOr(expr));
            }
            if meta.path.is_ident("list") {
                let s: LitStr = meta.value()?.parse()?;
                return set(Kind::List(Mode::parse(&s)?));
            }
            if meta.path.is_ident("map") {
                let mut key = Mode::Value;
                let mut value = Mode::Value;
                meta.parse_nested_meta(|inner| {
                    let s: LitStr = inner.value()?.parse()?;
                    if inner.path.is_ident("key") {
                        key = Mode::parse(&s)?;
                        Ok(())
                    } else if inner.path.is_ident("value") {
                        value = Mode::parse(&s)?;
                        Ok(())
                    } else {
                        Err(inner.error("Unknown map attribute key. Supported: key, value"))
                    }
                })?;
                return set(Kind::Map { key, value });
            }
            if meta.path.is_ident("label") {
                let s: LitStr = meta.value()?.parse()?;
                label = Some(s.value());
                return Ok(());
            }
            Err(meta.error(
                "Unknown scribe attribute key. Supported: value, default, deep, shared, reference, list, map, label, skip",
            ))
        })?;
    }

    Ok(FieldAttributes {
        kind: kind.unwrap_or(Kind::Value),
        label,
    })
}

// --- Generator: one look per field ---

fn generate_look(ident: &Ident, attrs: FieldAttributes) -> Option<TokenStream2> {
    let label = attrs
        .label
        .unwrap_or_else(|| ident.to_string().trim_start_matches("r#").to_owned());

    let call = match attrs.kind {
        Kind::Skip => return None,
        Kind::Value => quote! { scribe.look_value(&mut self.#ident, #label) },
        Kind::ValueOr(default) => quote! { scribe.look_value_or(&mut self.#ident, #label, #default) },
        Kind::Deep => quote! { scribe.look_deep(&mut self.#ident, #label) },
        Kind::Shared => quote! { scribe.look_shared(&mut self.#ident, #label) },
        Kind::Reference => quote! { scribe.look_reference(&mut self.#ident, #label) },
        Kind::List(mode) => {
            let mode = mode.tokens();
            quote! { scribe.look_list(&mut self.#ident, #label, #mode) }
        }
        Kind::Map { key, value } => {
            let (key, value) = (key.tokens(), value.tokens());
            quote! { scribe.look_map(&mut self.#ident, #label, #key, #value) }
        }
    };
    Some(quote! { #call?; })
}
