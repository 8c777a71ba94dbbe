use std::net::SocketAddr;

use snafu::{Location, Snafu};

use crate::database::DatabaseError;
use crate::store::SchemaError;
use crate::validation::ValidationError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ApplicationError {
    /// could not parse the configuration from the environment
    ConfigLoad {
        source: envy::Error,
        #[snafu(implicit)]
        location: Location,
    },

    /// Could not initialize the logger
    InitializeLogger {
        source: tracing::subscriber::SetGlobalDefaultError,
        #[snafu(implicit)]
        location: Location,
    },

    ConnectDatabase {
        source: DatabaseError,
        #[snafu(implicit)]
        location: Location,
    },

    /// Table or loader settings are out of range
    InvalidSettings {
        source: ValidationError,
        #[snafu(implicit)]
        location: Location,
    },

    /// Could not create or verify the count table
    Bootstrap {
        source: SchemaError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("{failed} of {batches} batches failed to load"))]
    IncompleteLoad {
        failed: u64,
        batches: u64,
        #[snafu(implicit)]
        location: Location,
    },

    /// The dispatcher role needs at least one entry in `BACKENDS`
    NoBackends {
        #[snafu(implicit)]
        location: Location,
    },

    /// Could not build a backend url out of the listen address
    LocalAddress {
        address: SocketAddr,
        source: url::ParseError,
        #[snafu(implicit)]
        location: Location,
    },

    /// Could not bind to the given address, check if it's already in use
    BindAddress {
        address: SocketAddr,
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },

    /// Could not serve the application
    WebServer {
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },
}
