use std::fmt::Write as _;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use snafu::{ensure, OptionExt as _, ResultExt as _};

use super::*;
use crate::database::Database;

/// Table holding one record per count table: its column family and replication factor.
pub const META_TABLE: &str = "count_tables";

/// Count tables stored in SurrealDB.
///
/// A row is the record `<table>:⟨itemId⟩` whose column family is an object field holding
/// `item_id` and `views_count`. SurrealDB has no replication knob of its own, so the
/// factor is recorded in [META_TABLE] and enforced when the table is ensured again.
#[derive(Debug)]
pub struct SurrealStore {
    db: Database,
    families: DashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct TableMeta {
    family: String,
    replication_factor: u32,
}

#[derive(Debug, Serialize)]
struct RowParam {
    key: String,
    item_id: u64,
    views_count: u64,
}

impl SurrealStore {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            families: DashMap::new(),
        }
    }

    async fn meta(&self, table: &str) -> surrealdb::Result<Option<TableMeta>> {
        self.db.select((META_TABLE, table)).await
    }

    /// Column family of `table`, or `None` when the table was never ensured.
    async fn family(&self, table: &str) -> surrealdb::Result<Option<String>> {
        if let Some(family) = self.families.get(table).map(|f| f.value().clone()) {
            return Ok(Some(family));
        }

        let family = self.meta(table).await?.map(|meta| meta.family);
        if let Some(family) = &family {
            self.families.insert(table.to_owned(), family.clone());
        }

        Ok(family)
    }

    fn compare(schema: &TableSchema, existing: TableMeta) -> Result<Bootstrap, SchemaError> {
        ensure!(
            existing.family == schema.family()
                && existing.replication_factor == schema.replication_factor(),
            SchemaMismatchSnafu {
                table: schema.name(),
                family: schema.family(),
                replication: schema.replication_factor(),
                existing_family: existing.family,
                existing_replication: existing.replication_factor,
            }
        );

        Ok(Bootstrap::Existing)
    }
}

fn definition(schema: &TableSchema) -> String {
    let table = schema.name();
    let family = schema.family();

    format!(
        "DEFINE TABLE {table} SCHEMAFULL;\
         DEFINE FIELD {family} ON TABLE {table} TYPE object;\
         DEFINE FIELD {family}.item_id ON TABLE {table} TYPE int;\
         DEFINE FIELD {family}.views_count ON TABLE {table} TYPE int ASSERT $value >= 0;"
    )
}

fn batch_statements(family: &str, rows: usize) -> String {
    let mut sql = String::new();

    for i in 0..rows {
        let _ = write!(
            sql,
            "UPDATE type::thing($tb, $rows[{i}].key) CONTENT {{ {family}: {{ item_id: $rows[{i}].item_id, views_count: $rows[{i}].views_count }} }};"
        );
    }

    sql
}

impl CountStore for SurrealStore {
    async fn ensure_schema(&self, schema: &TableSchema) -> Result<Bootstrap, SchemaError> {
        let table = schema.name();

        if let Some(existing) = self.meta(table).await.context(SchemaUnreachableSnafu { table })? {
            return Self::compare(schema, existing);
        }

        let mut response = self
            .db
            .query(definition(schema))
            .await
            .context(SchemaUnreachableSnafu { table })?;

        if let Some(error) = response.take_errors().into_values().next() {
            return SchemaRejectedSnafu {
                table,
                reason: error.to_string(),
            }
            .fail();
        }

        let meta = TableMeta {
            family: schema.family().to_owned(),
            replication_factor: schema.replication_factor(),
        };

        let created: surrealdb::Result<Option<TableMeta>> =
            self.db.create((META_TABLE, table)).content(meta).await;

        match created {
            Ok(_) => {
                self.families
                    .insert(table.to_owned(), schema.family().to_owned());
                Ok(Bootstrap::Created)
            }
            // lost a race with another bootstrap of the same table
            Err(error) => {
                let existing = self
                    .meta(table)
                    .await
                    .context(SchemaUnreachableSnafu { table })?
                    .context(SchemaRejectedSnafu {
                        table,
                        reason: error.to_string(),
                    })?;

                Self::compare(schema, existing)
            }
        }
    }

    async fn put_batch(&self, table: &str, rows: &[CountRecord]) -> Result<usize, WriteError> {
        let family = self
            .family(table)
            .await
            .context(WriteUnreachableSnafu { table })?
            .context(WriteMissingTableSnafu { table })?;

        if rows.is_empty() {
            return Ok(0);
        }

        let params: Vec<RowParam> = rows
            .iter()
            .map(|row| RowParam {
                key: row.item_id.row_key(),
                item_id: row.item_id.0,
                views_count: row.views_count,
            })
            .collect();

        let mut response = self
            .db
            .query(batch_statements(&family, rows.len()))
            .bind(("tb", table.to_owned()))
            .bind(("rows", params))
            .await
            .context(WriteUnreachableSnafu { table })?;

        let errors = response.take_errors();
        if let Some(error) = errors.values().next() {
            return WriteRejectedSnafu {
                table,
                attempted: rows.len(),
                failed: errors.len(),
                reason: error.to_string(),
            }
            .fail();
        }

        Ok(rows.len())
    }

    async fn increment(&self, table: &str, item_id: ItemId) -> Result<CountRecord, WriteError> {
        let family = self
            .family(table)
            .await
            .context(WriteUnreachableSnafu { table })?
            .context(WriteMissingTableSnafu { table })?;

        let sql = format!(
            "LET $row = (UPDATE type::thing($tb, $key) SET {family}.item_id = $item_id, \
             {family}.views_count = ({family}.views_count ?? 0) + 1 RETURN AFTER);\
             RETURN $row[0].{family}.views_count;"
        );

        let mut response = self
            .db
            .query(sql)
            .bind(("tb", table.to_owned()))
            .bind(("key", item_id.row_key()))
            .bind(("item_id", item_id.0))
            .await
            .context(WriteUnreachableSnafu { table })?;

        let rejected = |reason: String| {
            WriteRejectedSnafu {
                table,
                attempted: 1_usize,
                failed: 1_usize,
                reason,
            }
            .build()
        };

        let views_count: Option<u64> = response
            .take(1)
            .map_err(|error| rejected(error.to_string()))?;
        let views_count =
            views_count.ok_or_else(|| rejected("increment returned no row".to_owned()))?;

        Ok(CountRecord::new(item_id, views_count))
    }

    async fn get_count(&self, table: &str, item_id: ItemId) -> Result<Option<u64>, ReadError> {
        let family = self
            .family(table)
            .await
            .context(ReadUnreachableSnafu { table, item_id })?
            .context(ReadMissingTableSnafu { table })?;

        let sql = format!("SELECT VALUE {family}.views_count FROM type::thing($tb, $key);");

        let mut response = self
            .db
            .query(sql)
            .bind(("tb", table.to_owned()))
            .bind(("key", item_id.row_key()))
            .await
            .context(ReadUnreachableSnafu { table, item_id })?;

        response.take(0).map_err(|error| {
            ReadRejectedSnafu {
                table,
                item_id,
                reason: error.to_string(),
            }
            .build()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SurrealStore {
        let db = surrealdb::engine::any::connect("mem://").await.unwrap();
        db.use_ns("test").use_db("test").await.unwrap();
        SurrealStore::new(db)
    }

    fn schema() -> TableSchema {
        TableSchema::new("views_total_count", "item", 1).unwrap()
    }

    #[test]
    fn batch_statements_address_each_row() {
        let sql = batch_statements("item", 2);

        assert_eq!(sql.matches("UPDATE").count(), 2);
        assert!(sql.contains("$rows[0].key"));
        assert!(sql.contains("$rows[1].views_count"));
        assert!(sql.contains("{ item: { item_id: $rows[1].item_id"));
    }

    #[tokio::test]
    async fn ensure_schema_is_idempotent() {
        let store = store().await;

        assert_eq!(store.ensure_schema(&schema()).await.unwrap(), Bootstrap::Created);
        assert_eq!(store.ensure_schema(&schema()).await.unwrap(), Bootstrap::Existing);

        let other = TableSchema::new("views_total_count", "item", 3).unwrap();
        assert!(matches!(
            store.ensure_schema(&other).await,
            Err(SchemaError::SchemaMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn batches_overwrite_rows() {
        let store = store().await;
        store.ensure_schema(&schema()).await.unwrap();

        let rows: Vec<CountRecord> = (0..5).map(|id| CountRecord::new(ItemId(id), id * 10)).collect();
        assert_eq!(store.put_batch("views_total_count", &rows).await.unwrap(), 5);
        assert_eq!(store.put_batch("views_total_count", &rows).await.unwrap(), 5);

        for row in &rows {
            let count = store.get_count("views_total_count", row.item_id).await.unwrap();
            assert_eq!(count, Some(row.views_count));
        }
    }

    #[tokio::test]
    async fn increments_and_lookups() {
        let store = store().await;
        store.ensure_schema(&schema()).await.unwrap();

        assert_eq!(store.get_count("views_total_count", ItemId(42)).await.unwrap(), None);

        store.increment("views_total_count", ItemId(42)).await.unwrap();
        let record = store.increment("views_total_count", ItemId(42)).await.unwrap();

        assert_eq!(record, CountRecord::new(ItemId(42), 2));
        assert_eq!(store.get_count("views_total_count", ItemId(42)).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn rejected_rows_fail_the_batch_but_not_their_neighbours() {
        let store = store().await;
        store.ensure_schema(&schema()).await.unwrap();

        // does not fit the int column and lands as a negative count
        let rows = [
            CountRecord::new(ItemId(1), 5),
            CountRecord::new(ItemId(2), u64::MAX),
            CountRecord::new(ItemId(3), 7),
        ];

        let err = store.put_batch("views_total_count", &rows).await.unwrap_err();
        assert!(matches!(
            err,
            WriteError::WriteRejected { attempted: 3, failed: 1, .. }
        ));
        assert!(err.maybe_written());

        assert_eq!(store.get_count("views_total_count", ItemId(1)).await.unwrap(), Some(5));
        assert_eq!(store.get_count("views_total_count", ItemId(2)).await.unwrap(), None);
        assert_eq!(store.get_count("views_total_count", ItemId(3)).await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn tables_must_be_ensured_first() {
        let store = store().await;

        assert!(matches!(
            store.put_batch("views_total_count", &[CountRecord::new(ItemId(1), 1)]).await,
            Err(WriteError::WriteMissingTable { .. })
        ));
        assert!(matches!(
            store.get_count("views_total_count", ItemId(1)).await,
            Err(ReadError::ReadMissingTable { .. })
        ));
    }
}
