use std::num::{NonZeroU64, NonZeroUsize};

use rand::{Rng, SeedableRng as _};
use rand_chacha::ChaCha8Rng;
use snafu::OptionExt as _;
use tracing::instrument;

use crate::model::{CountRecord, ItemId};
use crate::store::{Bootstrap, CountStore, CountTable, SchemaError};
use crate::validation::{storable, NotPositiveSnafu, ValidationError};

/// How much synthetic data to seed and how to cut it into batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSettings {
    item_count: NonZeroU64,
    max_views_count: NonZeroU64,
    batch_size: NonZeroUsize,
    seed: u64,
    overwrite_existing: bool,
}

impl LoadSettings {
    pub fn new(
        item_count: u64, max_views_count: u64, batch_size: usize,
    ) -> Result<Self, ValidationError> {
        let item_count = storable("itemCount", item_count)?;
        let max_views_count = storable("maxViewsCount", max_views_count)?;

        Ok(Self {
            item_count: NonZeroU64::new(item_count).context(NotPositiveSnafu {
                field: "itemCount",
            })?,
            max_views_count: NonZeroU64::new(max_views_count).context(NotPositiveSnafu {
                field: "maxViewsCount",
            })?,
            batch_size: NonZeroUsize::new(batch_size).context(NotPositiveSnafu {
                field: "batchSize",
            })?,
            seed: 0,
            overwrite_existing: false,
        })
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Re-seed a table that already existed instead of leaving it untouched.
    pub fn with_overwrite_existing(mut self, overwrite_existing: bool) -> Self {
        self.overwrite_existing = overwrite_existing;
        self
    }

    pub fn item_count(&self) -> u64 {
        self.item_count.get()
    }

    pub fn max_views_count(&self) -> u64 {
        self.max_views_count.get()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size.get()
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn overwrite_existing(&self) -> bool {
        self.overwrite_existing
    }

    /// Number of batches a full run issues, the last one possibly partial.
    pub fn batch_count(&self) -> u64 {
        self.item_count().div_ceil(self.batch_size() as u64)
    }
}

/// One row per item in `[0, item_count)`, ascending, with views drawn from `[0, max_views_count)`.
pub fn generate<R: Rng>(
    item_count: u64, max_views_count: u64, mut rng: R,
) -> impl Iterator<Item = CountRecord> {
    (0..item_count).map(move |id| CountRecord::new(ItemId(id), rng.random_range(0..max_views_count)))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub index: u64,
    pub first_item: ItemId,
    pub rows: usize,
    pub maybe_written: bool,
    pub error: String,
}

/// What a run did. Failed batches are listed, never dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub bootstrap: Bootstrap,
    pub skipped: bool,
    pub batches_written: u64,
    pub rows_written: u64,
    pub failures: Vec<BatchFailure>,
}

impl LoadReport {
    fn new(bootstrap: Bootstrap) -> Self {
        Self {
            bootstrap,
            skipped: false,
            batches_written: 0,
            rows_written: 0,
            failures: Vec::new(),
        }
    }

    pub fn batches_failed(&self) -> u64 {
        self.failures.len() as u64
    }

    pub fn batches(&self) -> u64 {
        self.batches_written + self.batches_failed()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Seeds a count table with synthetic data, one sequential pass of fixed-size batches.
///
/// A failed batch is recorded in the report and the run carries on with the next one.
#[derive(Debug)]
pub struct BulkLoader<S> {
    table: CountTable<S>,
    settings: LoadSettings,
}

impl<S: CountStore> BulkLoader<S> {
    pub fn new(table: CountTable<S>, settings: LoadSettings) -> Self {
        Self { table, settings }
    }

    /// Run with the generator seeded from [LoadSettings::seed].
    pub async fn run(&self) -> Result<LoadReport, SchemaError> {
        self.run_with(ChaCha8Rng::seed_from_u64(self.settings.seed))
            .await
    }

    /// Ensure the schema, then load rows drawn from `rng` unless the run policy says to skip.
    #[instrument(skip(self, rng), fields(table = self.table.schema().name(), settings = ?self.settings))]
    pub async fn run_with<R: Rng + Send>(&self, rng: R) -> Result<LoadReport, SchemaError> {
        let bootstrap = self.table.ensure_schema().await?;
        let mut report = LoadReport::new(bootstrap);

        if bootstrap == Bootstrap::Existing && !self.settings.overwrite_existing {
            tracing::info!("table already exists, leaving its data untouched");
            report.skipped = true;
            return Ok(report);
        }

        let batch_size = self.settings.batch_size();
        let mut batch = Vec::with_capacity(batch_size);

        let rows = generate(
            self.settings.item_count(),
            self.settings.max_views_count(),
            rng,
        );

        for row in rows {
            batch.push(row);

            if batch.len() == batch_size {
                self.flush(&batch, &mut report).await;
                batch.clear();
            }
        }

        if !batch.is_empty() {
            self.flush(&batch, &mut report).await;
        }

        tracing::info!(
            batches_written = report.batches_written,
            batches_failed = report.batches_failed(),
            rows_written = report.rows_written,
            "bulk load finished"
        );

        Ok(report)
    }

    async fn flush(&self, batch: &[CountRecord], report: &mut LoadReport) {
        let index = report.batches();
        let first_item = batch.first().map_or(ItemId(0), |row| row.item_id);

        match self.table.put_batch(batch).await {
            Ok(written) => {
                tracing::debug!(index, %first_item, written, "batch written");
                report.batches_written += 1;
                report.rows_written += written as u64;
            }
            Err(error) => {
                tracing::warn!(index, %first_item, rows = batch.len(), %error, "batch failed, continuing");
                report.failures.push(BatchFailure {
                    index,
                    first_item,
                    rows: batch.len(),
                    maybe_written: error.maybe_written(),
                    error: error.to_string(),
                });
            }
        }
    }
}
