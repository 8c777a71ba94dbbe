use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use snafu::{ensure, OptionExt as _};

use super::*;

pub const DEFAULT_NODES: usize = 3;
pub const DEFAULT_SHARDS: usize = 16;

/// A storage cluster kept in process memory.
///
/// Every table is split into a fixed number of shards. A row lands in the shard picked by
/// hashing its canonical key and is held as `replication_factor` copies, all updated
/// under the shard's entry lock, so a row write is atomic and replicas never diverge.
#[derive(Debug)]
pub struct MemoryStore {
    nodes: usize,
    shard_count: usize,
    tables: DashMap<String, Arc<MemoryTable>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_NODES, DEFAULT_SHARDS)
    }
}

impl MemoryStore {
    /// `nodes` bounds the replication factor a table can ask for.
    pub fn new(nodes: usize, shard_count: usize) -> Self {
        Self {
            nodes: nodes.max(1),
            shard_count: shard_count.max(1),
            tables: DashMap::new(),
        }
    }

    /// Every row of `table` in ascending item order.
    pub fn rows(&self, table: &str) -> Option<Vec<CountRecord>> {
        let table = self.table(table)?;

        let mut rows: Vec<CountRecord> = table
            .shards
            .iter()
            .flat_map(|shard| {
                shard
                    .iter()
                    .map(|row| CountRecord::new(*row.key(), row.value().primary()))
                    .collect::<Vec<_>>()
            })
            .collect();

        rows.sort_by_key(|row| row.item_id);
        Some(rows)
    }

    fn table(&self, name: &str) -> Option<Arc<MemoryTable>> {
        self.tables.get(name).map(|table| table.value().clone())
    }
}

#[derive(Debug)]
struct MemoryTable {
    family: String,
    replication: u32,
    shards: Box<[DashMap<ItemId, Replicas>]>,
}

impl MemoryTable {
    fn new(schema: &TableSchema, shard_count: usize) -> Self {
        Self {
            family: schema.family().to_owned(),
            replication: schema.replication_factor(),
            shards: (0..shard_count).map(|_| DashMap::new()).collect(),
        }
    }

    fn shard(&self, item_id: ItemId) -> &DashMap<ItemId, Replicas> {
        let mut hasher = DefaultHasher::new();
        item_id.row_key().hash(&mut hasher);
        let index = hasher.finish() % self.shards.len() as u64;

        &self.shards[index as usize]
    }

    fn replicas(&self, views_count: u64) -> Replicas {
        Replicas(vec![views_count; self.replication as usize].into_boxed_slice())
    }
}

/// The copies of one row's `viewsCount`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Replicas(Box<[u64]>);

impl Replicas {
    fn primary(&self) -> u64 {
        self.0.first().copied().unwrap_or_default()
    }

    fn add(&mut self, views: u64) -> u64 {
        let value = self.primary().saturating_add(views);
        self.0.fill(value);
        value
    }
}

impl CountStore for MemoryStore {
    async fn ensure_schema(&self, schema: &TableSchema) -> Result<Bootstrap, SchemaError> {
        let replication = schema.replication_factor();

        ensure!(
            replication as usize <= self.nodes,
            SchemaRejectedSnafu {
                table: schema.name(),
                reason: format!(
                    "replication factor {replication} exceeds the {} available nodes",
                    self.nodes
                ),
            }
        );

        match self.tables.entry(schema.name().to_owned()) {
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::new(MemoryTable::new(schema, self.shard_count)));
                Ok(Bootstrap::Created)
            }
            Entry::Occupied(occupied) => {
                let existing = occupied.get();

                ensure!(
                    existing.family == schema.family() && existing.replication == replication,
                    SchemaMismatchSnafu {
                        table: schema.name(),
                        family: schema.family(),
                        replication,
                        existing_family: existing.family.clone(),
                        existing_replication: existing.replication,
                    }
                );

                Ok(Bootstrap::Existing)
            }
        }
    }

    async fn put_batch(&self, table: &str, rows: &[CountRecord]) -> Result<usize, WriteError> {
        let target = self.table(table).context(WriteMissingTableSnafu { table })?;

        for row in rows {
            let replicas = target.replicas(row.views_count);
            target.shard(row.item_id).insert(row.item_id, replicas);
        }

        Ok(rows.len())
    }

    async fn increment(&self, table: &str, item_id: ItemId) -> Result<CountRecord, WriteError> {
        let target = self.table(table).context(WriteMissingTableSnafu { table })?;

        let views_count = target
            .shard(item_id)
            .entry(item_id)
            .or_insert_with(|| target.replicas(0))
            .add(1);

        Ok(CountRecord::new(item_id, views_count))
    }

    async fn get_count(&self, table: &str, item_id: ItemId) -> Result<Option<u64>, ReadError> {
        let target = self.table(table).context(ReadMissingTableSnafu { table })?;

        let views_count = target
            .shard(item_id)
            .get(&item_id)
            .map(|row| row.value().primary());

        Ok(views_count)
    }
}
