use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DeriveInput, Field, Fields, Ident, LitStr};

const RESERVED_PROPERTIES: [&str; 4] = ["PartitionKey", "RowKey", "Timestamp", "ETag"];

#[derive(Default)]
struct FieldOptions {
    id: bool,
    etag: bool,
    timestamp: bool,
    skip: bool,
    json: bool,
    rename: Option<LitStr>,
}

struct MappedField {
    ident: Ident,
    options: FieldOptions,
}

impl MappedField {
    fn property_name(&self) -> String {
        self.options
            .rename
            .as_ref()
            .map(LitStr::value)
            .unwrap_or_else(|| self.ident.to_string())
    }

    fn is_system(&self) -> bool {
        self.options.etag || self.options.timestamp
    }
}

pub fn derive_table_entity(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let fields = named_fields(input)?
        .iter()
        .map(|field| {
            Ok(MappedField {
                ident: field.ident.clone().ok_or_else(|| {
                    syn::Error::new_spanned(field, "TableEntity fields must be named")
                })?,
                options: field_options(field)?,
            })
        })
        .collect::<syn::Result<Vec<_>>>()?;

    let id_field = find_id_field(input, &fields)?;
    let etag_field = find_unique(&fields, |f| f.options.etag, "etag")?;
    let timestamp_field = find_unique(&fields, |f| f.options.timestamp, "timestamp")?;

    for field in fields.iter().filter(|f| !f.options.skip && !f.is_system()) {
        let property = field.property_name();
        if RESERVED_PROPERTIES.contains(&property.as_str()) {
            return Err(syn::Error::new_spanned(
                &field.ident,
                format!("`{}` is a reserved table property name", property),
            ));
        }
    }

    let writes = fields
        .iter()
        .filter(|f| !f.options.skip && !f.is_system())
        .map(|field| {
            let ident = &field.ident;
            let property = field.property_name();
            if field.options.json {
                quote! {
                    tabled_rust::row::write_json_field(&mut properties, #property, &self.#ident)?;
                }
            } else {
                quote! {
                    tabled_rust::row::write_field(&mut properties, #property, &self.#ident);
                }
            }
        });

    let reads = fields.iter().map(|field| {
        let ident = &field.ident;
        let property = field.property_name();
        if field.is_system() {
            quote! { #ident: ::core::option::Option::None, }
        } else if field.options.skip {
            quote! { #ident: ::core::default::Default::default(), }
        } else if field.options.json {
            quote! { #ident: tabled_rust::row::read_json_field(properties, #property)?, }
        } else {
            quote! { #ident: tabled_rust::row::read_field(properties, #property)?, }
        }
    });

    let etag_methods = etag_field.map(|ident| {
        quote! {
            fn etag(&self) -> ::core::option::Option<&tabled_rust::ETag> {
                self.#ident.as_ref()
            }

            fn set_etag(&mut self, etag: tabled_rust::ETag) {
                self.#ident = ::core::option::Option::Some(etag);
            }
        }
    });

    let timestamp_method = timestamp_field.map(|ident| {
        quote! {
            fn set_timestamp(
                &mut self,
                timestamp: tabled_rust::__private::DateTime<tabled_rust::__private::Utc>,
            ) {
                self.#ident = ::core::option::Option::Some(timestamp);
            }
        }
    });

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics tabled_rust::TableEntity for #name #ty_generics #where_clause {
            fn id(&self) -> &str {
                &self.#id_field
            }

            fn set_id(&mut self, id: ::std::string::String) {
                self.#id_field = id;
            }

            #etag_methods

            #timestamp_method

            fn write_properties(
                &self,
            ) -> tabled_rust::RepositoryResult<tabled_rust::RowProperties> {
                let mut properties = tabled_rust::RowProperties::new();
                #(#writes)*
                ::core::result::Result::Ok(properties)
            }

            fn read_properties(
                properties: &tabled_rust::RowProperties,
            ) -> tabled_rust::RepositoryResult<Self> {
                ::core::result::Result::Ok(Self {
                    #(#reads)*
                })
            }
        }
    })
}

fn named_fields(input: &DeriveInput) -> syn::Result<Vec<Field>> {
    if let Data::Struct(data_struct) = &input.data {
        if let Fields::Named(fields) = &data_struct.fields {
            return Ok(fields.named.iter().cloned().collect());
        }
    }
    Err(syn::Error::new_spanned(
        &input.ident,
        "TableEntity can only be derived for structs with named fields",
    ))
}

fn field_options(field: &Field) -> syn::Result<FieldOptions> {
    let mut options = FieldOptions::default();
    for attr in &field.attrs {
        if !attr.path().is_ident("table") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("id") {
                options.id = true;
            } else if meta.path.is_ident("etag") {
                options.etag = true;
            } else if meta.path.is_ident("timestamp") {
                options.timestamp = true;
            } else if meta.path.is_ident("skip") {
                options.skip = true;
            } else if meta.path.is_ident("json") {
                options.json = true;
            } else if meta.path.is_ident("rename") {
                options.rename = Some(meta.value()?.parse()?);
            } else {
                return Err(meta.error("unsupported table attribute"));
            }
            Ok(())
        })?;
    }

    let roles = [options.id, options.etag, options.timestamp, options.skip]
        .iter()
        .filter(|set| **set)
        .count();
    if roles > 1 {
        return Err(syn::Error::new_spanned(
            field,
            "id, etag, timestamp and skip are mutually exclusive",
        ));
    }
    Ok(options)
}

fn find_id_field(input: &DeriveInput, fields: &[MappedField]) -> syn::Result<Ident> {
    if let Some(ident) = find_unique(fields, |f| f.options.id, "id")? {
        return Ok(ident);
    }

    // Default: look for a field named "id"
    fields
        .iter()
        .find(|f| f.ident == "id" && !f.options.skip && !f.is_system())
        .map(|f| f.ident.clone())
        .ok_or_else(|| {
            syn::Error::new_spanned(
                &input.ident,
                "TableEntity derive: no field marked with #[table(id)] and no field named `id`",
            )
        })
}

fn find_unique(
    fields: &[MappedField],
    predicate: impl Fn(&MappedField) -> bool,
    role: &str,
) -> syn::Result<Option<Ident>> {
    let mut matching = fields.iter().filter(|f| predicate(f));
    let first = matching.next().map(|f| f.ident.clone());
    if let Some(duplicate) = matching.next() {
        return Err(syn::Error::new_spanned(
            &duplicate.ident,
            format!("more than one field marked #[table({})]", role),
        ));
    }
    Ok(first)
}
