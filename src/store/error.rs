use snafu::{Location, Snafu};

use crate::model::ItemId;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SchemaError {
    #[snafu(display("storage is unreachable while defining table `{table}`: {source}"))]
    SchemaUnreachable {
        table: String,
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("storage rejected the definition of table `{table}`: {reason}"))]
    SchemaRejected {
        table: String,
        reason: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display(
        "table `{table}` already exists with family `{existing_family}` and replication factor {existing_replication}, \
         requested family `{family}` and replication factor {replication}"
    ))]
    SchemaMismatch {
        table: String,
        family: String,
        replication: u32,
        existing_family: String,
        existing_replication: u32,
        #[snafu(implicit)]
        location: Location,
    },
}

/// A failed batch or increment. Writes are overwrites, so resending the same rows is always safe.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum WriteError {
    #[snafu(display("table `{table}` does not exist"))]
    WriteMissingTable {
        table: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("{failed} of {attempted} rows were rejected by table `{table}`: {reason}"))]
    WriteRejected {
        table: String,
        attempted: usize,
        failed: usize,
        reason: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("storage is unreachable while writing to table `{table}`: {source}"))]
    WriteUnreachable {
        table: String,
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },
}

impl WriteError {
    /// Whether some of the rows may have reached storage before the failure.
    pub fn maybe_written(&self) -> bool {
        match self {
            WriteError::WriteMissingTable { .. } => false,
            WriteError::WriteRejected {
                attempted, failed, ..
            } => failed < attempted,
            WriteError::WriteUnreachable { .. } => true,
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ReadError {
    #[snafu(display("table `{table}` does not exist"))]
    ReadMissingTable {
        table: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("could not read item `{item_id}` from table `{table}`: {reason}"))]
    ReadRejected {
        table: String,
        item_id: ItemId,
        reason: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("storage is unreachable while reading item `{item_id}` from table `{table}`: {source}"))]
    ReadUnreachable {
        table: String,
        item_id: ItemId,
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },
}
