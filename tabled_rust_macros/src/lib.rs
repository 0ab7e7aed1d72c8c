mod table_entity;

use proc_macro::TokenStream;

// ============================================================================
// #[derive(TableEntity)] derive macro
// ============================================================================

/// Derive macro for the `TableEntity` trait.
///
/// # Usage
///
/// ```ignore
/// #[derive(Clone, Debug, TableEntity)]
/// struct Customer {
///     #[table(id)]
///     pub customer_id: String,
///     #[table(rename = "DisplayName")]
///     pub name: String,
///     pub loyalty_points: Option<i64>,
///     #[table(json)]
///     pub address: Address,
///     #[table(etag)]
///     pub etag: Option<ETag>,
///     #[table(timestamp)]
///     pub updated_at: Option<DateTime<Utc>>,
///     #[table(skip)]
///     pub cached_score: u32,
/// }
/// ```
///
/// - `#[table(id)]` marks the identifier field (a `String`). If omitted,
///   defaults to a field named `id`. The id is stored as a property as well.
/// - `#[table(etag)]` / `#[table(timestamp)]` receive the server-assigned
///   version tag and last-modified time; they are never written as properties.
/// - `#[table(rename = "...")]` sets the property name (default: field name).
/// - `#[table(json)]` stores the field as a JSON string property.
/// - `#[table(skip)]` leaves the field out; it is rebuilt with `Default`.
///
/// Property names `PartitionKey`, `RowKey`, `Timestamp` and `ETag` belong to
/// the store and are rejected at compile time.
#[proc_macro_derive(TableEntity, attributes(table))]
pub fn derive_table_entity(input: TokenStream) -> TokenStream {
    table_entity::derive_table_entity(input)
}
