//! Derive macro for rowgraph entities.
//!
//! `#[derive(Entity)]` implements `rowgraph_core::Entity` for a struct with
//! named fields. The generated code refers to `::rowgraph_core`, so the
//! deriving crate must depend on it.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, Ident, LitStr, Meta, Type, parse_macro_input};

/// Derives `rowgraph_core::Entity` for a struct.
///
/// # Struct Attributes
///
/// - `#[table(name = "table_name")]` - The SQL table. `#[table]` alone uses
///   the snake_case struct name. Without it, the table is inherited from the
///   first unprefixed `#[embed]`.
///
/// # Field Attributes
///
/// - `#[column(primary_key)]` - Part of the primary key
/// - `#[column(name = "column_name")]` - SQL column (defaults to the field name)
/// - `#[column(select = "expr")]` - Read-only column computed by a raw SQL
///   expression; `{this}` stands for the table alias
/// - `#[column(skip)]` - Not mapped; filled with `Default::default()`
/// - `#[embed]`, `#[embed(prefix = "p_")]` - The fields of another entity,
///   stored in this entity's table
/// - `#[relation]` - A related entity, on a `Vec<T>` or `Option<T>` field
/// - `#[relation(linktable = "t", foreign_key = "a", link_key = "b")]` - Joined
///   through a link table, with optional key column overrides
/// - `#[relation(linktable = "t", fetch_column = "c")]` - A `Vec<V>` of scalar
///   values read from one column of a link table
///
/// # Example
///
/// ```ignore
/// #[derive(Entity)]
/// #[table(name = "event")]
/// struct Event {
///     #[column(primary_key)]
///     id: Option<i64>,
///     title: String,
///     #[relation(linktable = "event_person")]
///     persons: Vec<Person>,
///     #[relation(linktable = "event_tag", fetch_column = "tag")]
///     tags: Vec<String>,
/// }
/// ```
#[proc_macro_derive(Entity, attributes(table, column, embed, relation))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_entity_impl(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

fn derive_entity_impl(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let entity_name = struct_name.to_string();
    let table = get_table_name(&input.attrs, struct_name)?;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Entity derive only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Entity derive only supports structs",
            ));
        }
    };

    let mut infos: Vec<FieldInfo> = Vec::new();
    for field in fields {
        let Some(ident) = field.ident.clone() else {
            return Err(syn::Error::new_spanned(field, "expected a named field"));
        };
        let mapping = parse_field_mapping(&ident, &field.attrs)?;
        infos.push(FieldInfo {
            ident,
            ty: field.ty.clone(),
            mapping,
        });
    }

    let table_tokens = match &table {
        Some(t) => quote! { ::core::option::Option::Some(::std::string::String::from(#t)) },
        None => quote! { ::core::option::Option::None },
    };

    let field_defs: Vec<TokenStream2> = infos.iter().filter_map(FieldInfo::field_def).collect();
    let nested_describe: Vec<TokenStream2> =
        infos.iter().filter_map(FieldInfo::describe_target).collect();
    let field_inits: Vec<TokenStream2> = infos.iter().map(FieldInfo::from_record).collect();
    let value_pushes: Vec<TokenStream2> =
        infos.iter().filter_map(FieldInfo::push_values).collect();
    let set_generated_id = set_generated_id_impl(&infos);

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let expanded = quote! {
        impl #impl_generics ::rowgraph_core::Entity for #struct_name #ty_generics #where_clause {
            const NAME: &'static str = #entity_name;

            fn describe(catalog: &mut ::rowgraph_core::Catalog) {
                if catalog.contains(Self::NAME) {
                    return;
                }
                catalog.insert(::rowgraph_core::EntityDef {
                    name: ::std::string::String::from(Self::NAME),
                    table: #table_tokens,
                    fields: ::std::vec![#(#field_defs),*],
                });
                #(#nested_describe)*
            }

            #[allow(unused_variables)]
            fn from_record(
                record: &::rowgraph_core::Record,
                prefix: &str,
            ) -> ::rowgraph_core::Result<Self> {
                ::core::result::Result::Ok(Self {
                    #(#field_inits),*
                })
            }

            #[allow(unused_variables)]
            fn values(
                &self,
                prefix: &str,
                out: &mut ::std::vec::Vec<(::std::string::String, ::rowgraph_core::SqlValue)>,
            ) {
                #(#value_pushes)*
            }

            #set_generated_id
        }
    };

    Ok(expanded)
}

enum FieldMapping {
    Column {
        column: String,
        primary_key: bool,
        select: Option<String>,
    },
    Embed {
        prefix: String,
    },
    Link {
        linktable: Option<String>,
        foreign_key: Option<String>,
        link_key: Option<String>,
    },
    Values {
        linktable: String,
        column: String,
        foreign_key: Option<String>,
    },
    Skip,
}

struct FieldInfo {
    ident: Ident,
    ty: Type,
    mapping: FieldMapping,
}

fn opt_string(value: Option<&String>) -> TokenStream2 {
    match value {
        Some(v) => quote! { ::core::option::Option::Some(::std::string::String::from(#v)) },
        None => quote! { ::core::option::Option::None },
    }
}

impl FieldInfo {
    fn name(&self) -> String {
        self.ident.to_string()
    }

    fn field_def(&self) -> Option<TokenStream2> {
        let name = self.name();
        let ty = &self.ty;
        let kind = match &self.mapping {
            FieldMapping::Column {
                column,
                primary_key,
                select,
            } => {
                let select = opt_string(select.as_ref());
                quote! {
                    ::rowgraph_core::FieldKind::Column {
                        column: ::std::string::String::from(#column),
                        primary_key: #primary_key,
                        select: #select,
                    }
                }
            }
            FieldMapping::Embed { prefix } => quote! {
                ::rowgraph_core::FieldKind::Embed {
                    entity: ::std::string::String::from(<#ty as ::rowgraph_core::Entity>::NAME),
                    prefix: ::std::string::String::from(#prefix),
                }
            },
            FieldMapping::Link {
                linktable,
                foreign_key,
                link_key,
            } => {
                let linktable = opt_string(linktable.as_ref());
                let foreign_key = opt_string(foreign_key.as_ref());
                let link_key = opt_string(link_key.as_ref());
                let target = quote! { <#ty as ::rowgraph_core::Related>::Target };
                quote! {
                    ::rowgraph_core::FieldKind::Link {
                        entity: ::std::string::String::from(
                            <#target as ::rowgraph_core::Entity>::NAME,
                        ),
                        many: <#ty as ::rowgraph_core::Related>::MANY,
                        linktable: #linktable,
                        foreign_key: #foreign_key,
                        link_key: #link_key,
                    }
                }
            }
            FieldMapping::Values {
                linktable,
                column,
                foreign_key,
            } => {
                let foreign_key = opt_string(foreign_key.as_ref());
                quote! {
                    ::rowgraph_core::FieldKind::Values {
                        linktable: ::std::string::String::from(#linktable),
                        column: ::std::string::String::from(#column),
                        foreign_key: #foreign_key,
                    }
                }
            }
            FieldMapping::Skip => return None,
        };
        Some(quote! {
            ::rowgraph_core::FieldDef {
                name: ::std::string::String::from(#name),
                kind: #kind,
            }
        })
    }

    /// Descriptions this field pulls into the catalog.
    fn describe_target(&self) -> Option<TokenStream2> {
        let ty = &self.ty;
        match &self.mapping {
            FieldMapping::Embed { .. } => Some(quote! {
                <#ty as ::rowgraph_core::Entity>::describe(catalog);
            }),
            FieldMapping::Link { .. } => Some(quote! {
                <<#ty as ::rowgraph_core::Related>::Target as ::rowgraph_core::Entity>::describe(
                    catalog,
                );
            }),
            _ => None,
        }
    }

    fn from_record(&self) -> TokenStream2 {
        let ident = &self.ident;
        let ty = &self.ty;
        let name = self.name();
        let value = match &self.mapping {
            FieldMapping::Column { column, .. } => quote! {
                record.get(&::std::format!("{}{}", prefix, #column))?
            },
            FieldMapping::Embed { prefix: inner } => quote! {
                <#ty as ::rowgraph_core::Entity>::from_record(
                    record,
                    &::std::format!("{}{}", prefix, #inner),
                )?
            },
            FieldMapping::Link { .. } => quote! {
                <#ty as ::rowgraph_core::Related>::from_records(
                    record.links(&::std::format!("{}{}", prefix, #name)),
                )?
            },
            FieldMapping::Values { .. } => quote! {
                {
                    let key = ::std::format!("{}{}", prefix, #name);
                    <#ty as ::rowgraph_core::ValueList>::from_values(&key, record.list(&key))?
                }
            },
            FieldMapping::Skip => quote! { ::core::default::Default::default() },
        };
        quote! { #ident: #value }
    }

    fn push_values(&self) -> Option<TokenStream2> {
        let ident = &self.ident;
        let ty = &self.ty;
        match &self.mapping {
            FieldMapping::Column {
                column,
                select: None,
                ..
            } => Some(quote! {
                out.push((
                    ::std::format!("{}{}", prefix, #column),
                    ::rowgraph_core::ToSqlValue::to_sql_value(
                        ::core::clone::Clone::clone(&self.#ident),
                    ),
                ));
            }),
            FieldMapping::Embed { prefix: inner } => Some(quote! {
                <#ty as ::rowgraph_core::Entity>::values(
                    &self.#ident,
                    &::std::format!("{}{}", prefix, #inner),
                    out,
                );
            }),
            _ => None,
        }
    }
}

/// A single own key column receives the id; without own keys the embeds
/// are tried in order.
fn set_generated_id_impl(infos: &[FieldInfo]) -> TokenStream2 {
    let keys: Vec<(&Ident, &String)> = infos
        .iter()
        .filter_map(|info| match &info.mapping {
            FieldMapping::Column {
                column,
                primary_key: true,
                select: None,
            } => Some((&info.ident, column)),
            _ => None,
        })
        .collect();

    match keys.as_slice() {
        [(ident, column)] => quote! {
            fn set_generated_id(&mut self, id: i64) -> ::rowgraph_core::Result<bool> {
                self.#ident = ::rowgraph_core::FromSqlValue::from_sql_value(
                    ::rowgraph_core::SqlValue::Int(id),
                )
                .map_err(|source| ::rowgraph_core::Error::Value {
                    column: ::std::string::String::from(#column),
                    source,
                })?;
                ::core::result::Result::Ok(true)
            }
        },
        [] => {
            let embeds: Vec<TokenStream2> = infos
                .iter()
                .filter(|info| matches!(info.mapping, FieldMapping::Embed { .. }))
                .map(|info| {
                    let ident = &info.ident;
                    let ty = &info.ty;
                    quote! {
                        if <#ty as ::rowgraph_core::Entity>::set_generated_id(
                            &mut self.#ident,
                            id,
                        )? {
                            return ::core::result::Result::Ok(true);
                        }
                    }
                })
                .collect();
            if embeds.is_empty() {
                return TokenStream2::new();
            }
            quote! {
                fn set_generated_id(&mut self, id: i64) -> ::rowgraph_core::Result<bool> {
                    #(#embeds)*
                    ::core::result::Result::Ok(false)
                }
            }
        }
        _ => TokenStream2::new(),
    }
}

fn get_table_name(attrs: &[Attribute], struct_name: &Ident) -> syn::Result<Option<String>> {
    for attr in attrs {
        if !attr.path().is_ident("table") {
            continue;
        }
        if matches!(attr.meta, Meta::Path(_)) {
            return Ok(Some(to_snake_case(&struct_name.to_string())));
        }
        let mut table_name = None;
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                table_name = Some(meta.value()?.parse::<LitStr>()?.value());
                Ok(())
            } else {
                Err(meta.error("unsupported table attribute"))
            }
        })?;
        return Ok(Some(
            table_name.unwrap_or_else(|| to_snake_case(&struct_name.to_string())),
        ));
    }
    Ok(None)
}

fn parse_field_mapping(ident: &Ident, attrs: &[Attribute]) -> syn::Result<FieldMapping> {
    let mut column = ident.to_string();
    let mut primary_key = false;
    let mut select = None;
    let mut skip = false;
    let mut mapping: Option<FieldMapping> = None;

    for attr in attrs {
        if attr.path().is_ident("column") {
            if matches!(attr.meta, Meta::Path(_)) {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("primary_key") {
                    primary_key = true;
                } else if meta.path.is_ident("skip") {
                    skip = true;
                } else if meta.path.is_ident("name") {
                    column = meta.value()?.parse::<LitStr>()?.value();
                } else if meta.path.is_ident("select") {
                    select = Some(meta.value()?.parse::<LitStr>()?.value());
                } else {
                    return Err(meta.error("unsupported column attribute"));
                }
                Ok(())
            })?;
        } else if attr.path().is_ident("embed") {
            if mapping.is_some() {
                return Err(syn::Error::new_spanned(attr, "field is already an embed or relation"));
            }
            let mut prefix = String::new();
            if !matches!(attr.meta, Meta::Path(_)) {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("prefix") {
                        prefix = meta.value()?.parse::<LitStr>()?.value();
                        Ok(())
                    } else {
                        Err(meta.error("unsupported embed attribute"))
                    }
                })?;
            }
            mapping = Some(FieldMapping::Embed { prefix });
        } else if attr.path().is_ident("relation") {
            if mapping.is_some() {
                return Err(syn::Error::new_spanned(attr, "field is already an embed or relation"));
            }
            mapping = Some(parse_relation(attr)?);
        }
    }

    match mapping {
        Some(_) if skip || primary_key || select.is_some() => Err(syn::Error::new_spanned(
            ident,
            "#[column] options cannot be combined with #[embed] or #[relation]",
        )),
        Some(mapping) => Ok(mapping),
        None if skip => Ok(FieldMapping::Skip),
        None => Ok(FieldMapping::Column {
            column,
            primary_key,
            select,
        }),
    }
}

fn parse_relation(attr: &Attribute) -> syn::Result<FieldMapping> {
    let mut linktable = None;
    let mut foreign_key = None;
    let mut link_key = None;
    let mut fetch_column = None;

    if !matches!(attr.meta, Meta::Path(_)) {
        attr.parse_nested_meta(|meta| {
            let target = if meta.path.is_ident("linktable") {
                &mut linktable
            } else if meta.path.is_ident("foreign_key") {
                &mut foreign_key
            } else if meta.path.is_ident("link_key") {
                &mut link_key
            } else if meta.path.is_ident("fetch_column") {
                &mut fetch_column
            } else {
                return Err(meta.error("unsupported relation attribute"));
            };
            *target = Some(meta.value()?.parse::<LitStr>()?.value());
            Ok(())
        })?;
    }

    match (fetch_column, linktable) {
        (Some(column), Some(linktable)) => {
            if link_key.is_some() {
                return Err(syn::Error::new_spanned(
                    attr,
                    "link_key has no meaning with fetch_column",
                ));
            }
            Ok(FieldMapping::Values {
                linktable,
                column,
                foreign_key,
            })
        }
        (Some(_), None) => Err(syn::Error::new_spanned(
            attr,
            "fetch_column requires a linktable",
        )),
        (None, linktable) => Ok(FieldMapping::Link {
            linktable,
            foreign_key,
            link_key,
        }),
    }
}

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}
