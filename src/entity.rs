use chrono::{DateTime, Utc};

use crate::error::RepositoryResult;
use crate::row::{ETag, RowProperties};

/// An entity that can be stored as a table row.
///
/// The mapping is explicit per type: usually generated by
/// `#[derive(TableEntity)]`, but it can be written by hand.
///
/// ```ignore
/// #[derive(Clone, Debug, TableEntity)]
/// struct Customer {
///     #[table(id)]
///     pub id: String,
///     #[table(rename = "DisplayName")]
///     pub name: String,
///     #[table(etag)]
///     pub etag: Option<ETag>,
/// }
/// ```
pub trait TableEntity: Clone + Send + Sync + 'static {
    /// Caller-assigned identifier, unique within the table's key space.
    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    /// Version tag observed the last time this entity came back from the store.
    fn etag(&self) -> Option<&ETag> {
        None
    }

    fn set_etag(&mut self, _etag: ETag) {}

    fn set_timestamp(&mut self, _timestamp: DateTime<Utc>) {}

    /// Writes the mapped fields into a flat property map.
    fn write_properties(&self) -> RepositoryResult<RowProperties>;

    /// Hydrates a fresh entity from a flat property map.
    fn read_properties(properties: &RowProperties) -> RepositoryResult<Self>;
}
