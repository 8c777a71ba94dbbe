use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use snafu::OptionExt as _;
use tracing::instrument;

use crate::model::{CountRecord, ItemId};
use crate::validation::{self, NotPositiveSnafu, ValidationError};

pub use error::*;

mod error;

/// In-process sharded and replicated tables.
pub mod memory;

/// Tables backed by SurrealDB.
pub mod surreal;

/// Name, column family and replication factor of a count table. Fixed once the table exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    name: String,
    family: String,
    replication_factor: NonZeroU32,
}

impl TableSchema {
    pub fn new(
        name: impl Into<String>, family: impl Into<String>, replication_factor: u32,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        let family = family.into();

        validation::identifier(&name)?;
        validation::identifier(&family)?;
        let replication_factor = NonZeroU32::new(replication_factor).context(NotPositiveSnafu {
            field: "replicationFactor",
        })?;

        Ok(Self {
            name,
            family,
            replication_factor,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn replication_factor(&self) -> u32 {
        self.replication_factor.get()
    }
}

/// Outcome of [CountStore::ensure_schema].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bootstrap {
    Created,
    Existing,
}

/// A storage engine holding `itemId → viewsCount` tables.
///
/// Every write is atomic per row and nothing more. Batches are overwrites of whole
/// records, so a batch that failed half way can be resent without double counting.
pub trait CountStore: Send + Sync {
    /// Create the table and its column family if absent. Repeating the call with the
    /// same schema is a no-op that reports [Bootstrap::Existing].
    fn ensure_schema(
        &self, schema: &TableSchema,
    ) -> impl Future<Output = Result<Bootstrap, SchemaError>> + Send;

    /// Overwrite every row in `rows`, returning how many were written.
    fn put_batch(
        &self, table: &str, rows: &[CountRecord],
    ) -> impl Future<Output = Result<usize, WriteError>> + Send;

    /// Add one view to the row of `item_id`, creating the row on first use.
    fn increment(
        &self, table: &str, item_id: ItemId,
    ) -> impl Future<Output = Result<CountRecord, WriteError>> + Send;

    /// `None` when no row exists for `item_id`.
    fn get_count(
        &self, table: &str, item_id: ItemId,
    ) -> impl Future<Output = Result<Option<u64>, ReadError>> + Send;
}

/// A [CountStore] bound to one table. Cheap to clone and share between tasks.
#[derive(Debug)]
pub struct CountTable<S> {
    store: Arc<S>,
    schema: Arc<TableSchema>,
}

impl<S> Clone for CountTable<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            schema: self.schema.clone(),
        }
    }
}

impl<S: CountStore> CountTable<S> {
    pub fn new(store: Arc<S>, schema: TableSchema) -> Self {
        Self {
            store,
            schema: Arc::new(schema),
        }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    #[instrument(skip(self), fields(table = self.schema.name()))]
    pub async fn ensure_schema(&self) -> Result<Bootstrap, SchemaError> {
        let bootstrap = self.store.ensure_schema(&self.schema).await?;
        tracing::info!(?bootstrap, replication_factor = self.schema.replication_factor(), "schema ensured");
        Ok(bootstrap)
    }

    pub async fn put_batch(&self, rows: &[CountRecord]) -> Result<usize, WriteError> {
        self.store.put_batch(self.schema.name(), rows).await
    }

    pub async fn increment(&self, item_id: ItemId) -> Result<CountRecord, WriteError> {
        self.store.increment(self.schema.name(), item_id).await
    }

    pub async fn get_count(&self, item_id: ItemId) -> Result<Option<u64>, ReadError> {
        self.store.get_count(self.schema.name(), item_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_rejects_bad_definitions() {
        assert!(TableSchema::new("views_total_count", "item", 3).is_ok());

        assert!(matches!(
            TableSchema::new("views_total_count", "item", 0),
            Err(ValidationError::NotPositive { field: "replicationFactor", .. })
        ));
        assert!(matches!(
            TableSchema::new("views total", "item", 1),
            Err(ValidationError::InvalidName { .. })
        ));
        assert!(matches!(
            TableSchema::new("views_total_count", "item:family", 1),
            Err(ValidationError::InvalidName { .. })
        ));
    }
}
