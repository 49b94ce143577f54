use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::{Data, DeriveInput, Fields, Lit, parse_macro_input};

/// Convert snake_case to camelCase
fn to_camel_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut capitalize_next = false;

    for c in s.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            result.push(c.to_ascii_uppercase());
            capitalize_next = false;
        } else {
            result.push(c);
        }
    }

    result
}

/// Apply a serde `rename_all` rule to a snake_case field name
fn apply_rename_all(field: &str, rule: Option<&str>) -> String {
    match rule {
        Some("camelCase") => to_camel_case(field),
        Some("PascalCase") => {
            let camel = to_camel_case(field);
            let mut chars = camel.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => camel,
            }
        }
        Some("lowercase") => field.to_lowercase(),
        Some("UPPERCASE") => field.to_uppercase(),
        Some("SCREAMING_SNAKE_CASE") => field.to_uppercase(),
        Some("kebab-case") => field.replace('_', "-"),
        Some("SCREAMING-KEBAB-CASE") => field.replace('_', "-").to_uppercase(),
        _ => field.to_string(),
    }
}

/// Read a `key = "..."` string out of `#[serde(...)]` attributes
fn serde_str(attrs: &[syn::Attribute], key: &str) -> Option<String> {
    for attr in attrs {
        if attr.path().is_ident("serde") {
            let mut found = None;
            let _ = attr.parse_nested_meta(|meta| {
                if meta.path.is_ident(key) {
                    let lit: Lit = meta.value()?.parse()?;
                    if let Lit::Str(s) = lit {
                        found = Some(s.value());
                    }
                } else if meta.input.peek(syn::Token![=]) {
                    // skip other `key = value` entries
                    let _: Lit = meta.value()?.parse()?;
                } else if meta.input.peek(syn::token::Paren) {
                    meta.parse_nested_meta(|_| Ok(()))?;
                }
                Ok(())
            });
            if found.is_some() {
                return found;
            }
        }
    }
    None
}

/// Check if a field has #[column(<flag>)]
fn has_column_flag(field: &syn::Field, flag: &str) -> bool {
    for attr in &field.attrs {
        if attr.path().is_ident("column") {
            let mut set = false;
            let _ = attr.parse_nested_meta(|meta| {
                if meta.path.is_ident(flag) {
                    set = true;
                } else if meta.input.peek(syn::Token![=]) {
                    let _: Lit = meta.value()?.parse()?;
                }
                Ok(())
            });
            if set {
                return true;
            }
        }
    }
    false
}

/// Get custom column name from #[column(name = "...")] or None
fn get_column_name(field: &syn::Field) -> Option<String> {
    for attr in &field.attrs {
        if attr.path().is_ident("column") {
            let mut name = None;
            let _ = attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    let lit: Lit = meta.value()?.parse()?;
                    if let Lit::Str(s) = lit {
                        name = Some(s.value());
                    }
                }
                Ok(())
            });
            if name.is_some() {
                return name;
            }
        }
    }
    None
}

/// Map Rust type to generic SQL type name
fn rust_type_to_sql_type(ty: &syn::Type) -> &'static str {
    let type_str = quote::quote!(#ty).to_string();
    // Remove spaces for easier matching
    let type_str = type_str.replace(' ', "");

    // Check for Option<T> - extract inner type
    let inner_type = if type_str.starts_with("Option<") && type_str.ends_with('>') {
        &type_str[7..type_str.len() - 1]
    } else {
        type_str.as_str()
    };

    match inner_type {
        // Integer types
        "i8" | "i16" | "i32" | "i64" | "u8" | "u16" | "u32" | "u64" | "isize" | "usize" => {
            "integer"
        }
        "f32" | "f64" => "real",
        // Boolean
        "bool" => "boolean",
        // Collections and raw JSON are stored as JSON text
        s if s.starts_with("Vec<")
            || s.starts_with("HashMap<")
            || s.starts_with("BTreeMap<")
            || s.starts_with("HashSet<")
            || s.starts_with("BTreeSet<")
            || s == "serde_json::Value" =>
        {
            "json"
        }
        // Default to text for String, datetimes and other scalar-serializing types
        _ => "text",
    }
}

/// Parse #[record(table = "...")] attribute and return table name
fn parse_record_attr(input: &DeriveInput) -> syn::Result<Option<String>> {
    for attr in &input.attrs {
        if attr.path().is_ident("record") {
            let mut table_name = None;
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("table") {
                    let lit: Lit = meta.value()?.parse()?;
                    if let Lit::Str(s) = lit {
                        table_name = Some(s.value());
                    }
                    Ok(())
                } else {
                    Err(meta.error("unsupported record attribute, expected `table`"))
                }
            })?;
            return Ok(table_name);
        }
    }
    Ok(None)
}

/// Derive macro for the Record trait
///
/// Generates a `tablemap::Record` implementation plus a `<Name>Prototype`
/// struct for filtering reads.
///
/// Requires a `rowid: Option<i64>` field; every other field becomes a column
/// in declaration order.
///
/// ## Attributes
///
/// - `#[record(table = "...")]` - table name (default: lower-cased type name)
/// - `#[column(name = "...")]` - column name (default: field name)
/// - `#[column(skip)]` - not persisted; the field must deserialize from a
///   missing key (e.g. `#[serde(default)]`)
/// - `#[column(json)]` - store the field as JSON text. Required for struct
///   and enum fields that do not serialize to a plain scalar; such a field in
///   a non-JSON column fails to serialize on write.
///
/// JSON keys follow `#[serde(rename_all = "...")]` and `#[serde(rename = "...")]`.
///
/// ## Generated prototype
///
/// - one `Match<T>` per persisted field plus `rowid: Match<i64>`
/// - `Default` - every field `Match::Any`
/// - `by_rowid(rowid)` - only `rowid` constrained
/// - `From<&Name>` - every persisted field `Match::Exactly`, `rowid` `Any`
///
/// ## Example
///
/// ```text
/// #[derive(Record, Serialize, Deserialize, Clone, Debug)]
/// struct Widget {
///     rowid: Option<i64>,
///     name: String,
///     color: String,
/// }
/// // Use: WidgetPrototype { color: "red".to_string().into(), ..Default::default() }
/// ```
#[proc_macro_derive(Record, attributes(record, column))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_record(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_record(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let vis = &input.vis;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Record only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(name, "Record only supports structs"));
        }
    };

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Record does not support generic types",
        ));
    }

    let rowid_field = fields
        .iter()
        .find(|f| f.ident.as_ref().is_some_and(|i| i == "rowid"))
        .ok_or_else(|| {
            syn::Error::new_spanned(name, "Record requires a `rowid: Option<i64>` field")
        })?;
    let rowid_ty = &rowid_field.ty;
    if quote!(#rowid_ty).to_string().replace(' ', "") != "Option<i64>" {
        return Err(syn::Error::new_spanned(
            rowid_ty,
            "the `rowid` field must be `Option<i64>`",
        ));
    }
    let rowid_vis = &rowid_field.vis;

    let table_name = parse_record_attr(input)?.unwrap_or_else(|| name.to_string().to_lowercase());
    let rename_all = serde_str(&input.attrs, "rename_all");

    // Collect column names, types, JSON keys and prototype fields for all persisted fields
    let mut column_names: Vec<String> = Vec::new();
    let mut column_types: Vec<&'static str> = Vec::new();
    let mut json_keys: Vec<String> = Vec::new();
    let mut field_idents = Vec::new();
    let mut field_tys = Vec::new();
    let mut field_vis = Vec::new();

    for field in fields.iter() {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        if ident == "rowid" || has_column_flag(field, "skip") {
            continue;
        }

        let field_name = ident.unraw().to_string();
        let col_name = get_column_name(field).unwrap_or_else(|| field_name.clone());
        let col_type = if has_column_flag(field, "json") {
            "json"
        } else {
            rust_type_to_sql_type(&field.ty)
        };
        let json_key = serde_str(&field.attrs, "rename")
            .unwrap_or_else(|| apply_rename_all(&field_name, rename_all.as_deref()));

        column_names.push(col_name);
        column_types.push(col_type);
        json_keys.push(json_key);
        field_idents.push(ident);
        field_tys.push(&field.ty);
        field_vis.push(&field.vis);
    }

    let type_name = name.to_string();
    let column_count = column_names.len();
    let column_literals: Vec<_> = column_names.iter().map(|s| s.as_str()).collect();
    let json_key_literals: Vec<_> = json_keys.iter().map(|s| s.as_str()).collect();

    let prototype_name = format_ident!("{}Prototype", name);
    let prototype_doc = format!("Query prototype for [`{}`].", name);

    let expanded = quote! {
        impl tablemap::Record for #name {
            type Prototype = #prototype_name;

            fn type_name() -> &'static str {
                #type_name
            }

            fn table_name() -> &'static str {
                #table_name
            }

            fn columns() -> &'static [&'static str] {
                &[#(#column_literals),*]
            }

            fn column_types() -> &'static [&'static str] {
                &[#(#column_types),*]
            }

            fn json_keys() -> &'static [&'static str] {
                &[#(#json_key_literals),*]
            }

            fn column_count() -> usize {
                #column_count
            }

            fn rowid(&self) -> Option<i64> {
                self.rowid
            }

            fn set_rowid(&mut self, rowid: Option<i64>) {
                self.rowid = rowid;
            }
        }

        #[doc = #prototype_doc]
        #[derive(Clone, Default)]
        #vis struct #prototype_name {
            #rowid_vis rowid: tablemap::Match<i64>,
            #(#field_vis #field_idents: tablemap::Match<#field_tys>,)*
        }

        impl #prototype_name {
            /// Match only the row with the given rowid.
            pub fn by_rowid(rowid: i64) -> Self {
                Self {
                    rowid: tablemap::Match::Exactly(rowid),
                    ..Default::default()
                }
            }
        }

        impl From<&#name> for #prototype_name {
            #[allow(unused_variables)]
            fn from(record: &#name) -> Self {
                Self {
                    rowid: tablemap::Match::Any,
                    #(#field_idents: tablemap::Match::Exactly(record.#field_idents.clone()),)*
                }
            }
        }

        impl tablemap::Prototype for #prototype_name {
            type Record = #name;

            fn predicates(
                &self,
            ) -> Result<Vec<(&'static str, tablemap::Value)>, tablemap::MapperError> {
                let mut predicates = Vec::new();
                if let Some(value) = self.rowid.to_value("rowid", "integer")? {
                    predicates.push(("rowid", value));
                }
                #(
                    if let Some(value) = self.#field_idents.to_value(#column_literals, #column_types)? {
                        predicates.push((#column_literals, value));
                    }
                )*
                Ok(predicates)
            }
        }
    };

    Ok(expanded)
}
