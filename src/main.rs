use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use dotenvy::dotenv;
use snafu::{ensure, ResultExt as _};
use tokio::net::TcpListener;
use url::Url;

use viewcount::api;
use viewcount::config::{Config, Role, Storage};
use viewcount::database;
use viewcount::dispatch::{Dispatcher, Forward, HttpForwarder, LocalForwarder, Resolver, RoundRobin};
use viewcount::error::*;
use viewcount::loader::{BulkLoader, LoadReport};
use viewcount::logger;
use viewcount::meter::{self, Meter, VIEW_REQUESTS};
use viewcount::store::memory::MemoryStore;
use viewcount::store::surreal::SurrealStore;
use viewcount::store::{CountStore, CountTable};

#[tokio::main]
async fn main() -> Result<(), ApplicationError> {
    dotenv().ok();

    let config = Config::from_env()?;

    let _guard = logger::init(&config)?;
    tracing::info!(role = ?config.role, storage = ?config.storage, address = %config.host, "starting");

    match (config.role, config.storage) {
        (Role::Dispatcher, _) => {
            ensure!(!config.backends.is_empty(), NoBackendsSnafu);
            let resolver = RoundRobin::new(config.backends.clone());
            front(&config, resolver, HttpForwarder::default()).await
        }
        (_, Storage::Memory) => run(&config, MemoryStore::default()).await,
        (_, Storage::Surreal) => {
            let db = database::connect(&config.database())
                .await
                .context(ConnectDatabaseSnafu)?;
            run(&config, SurrealStore::new(db)).await
        }
    }
}

async fn run<S: CountStore + 'static>(config: &Config, store: S) -> Result<(), ApplicationError> {
    let schema = config.schema().context(InvalidSettingsSnafu)?;
    let table = CountTable::new(Arc::new(store), schema);

    if config.role == Role::Seed {
        let report = seed(config, table).await?;
        ensure!(
            report.is_complete(),
            IncompleteLoadSnafu {
                failed: report.batches_failed(),
                batches: report.batches(),
            }
        );
        return Ok(());
    }

    if config.seed_on_start {
        let report = seed(config, table.clone()).await?;
        if !report.is_complete() {
            tracing::warn!(
                failed = report.batches_failed(),
                batches = report.batches(),
                "serving a partially seeded table"
            );
        }
    } else {
        table.ensure_schema().await.context(BootstrapSnafu)?;
    }

    match config.role {
        Role::Standalone => {
            let local = Url::parse(&format!("http://{}/", config.host))
                .context(LocalAddressSnafu { address: config.host })?;
            let resolver = move || Some(local.clone());
            front(config, resolver, LocalForwarder::new(table)).await
        }
        _ => serve(config.host, api::backend_router(table)).await,
    }
}

async fn seed<S: CountStore>(
    config: &Config, table: CountTable<S>,
) -> Result<LoadReport, ApplicationError> {
    let settings = config.load_settings().context(InvalidSettingsSnafu)?;
    BulkLoader::new(table, settings)
        .run()
        .await
        .context(BootstrapSnafu)
}

async fn front<R, F>(config: &Config, resolver: R, forwarder: F) -> Result<(), ApplicationError>
where
    R: Resolver + 'static,
    F: Forward + 'static,
{
    let meter = Arc::new(Meter::new(VIEW_REQUESTS));
    let reporter = meter::report(meter.clone(), config.metrics_interval);

    let dispatcher = Arc::new(Dispatcher::new(resolver, forwarder, meter));
    let served = serve(config.host, api::dispatcher_router(dispatcher)).await;

    reporter.abort();
    served
}

async fn serve(address: SocketAddr, router: Router) -> Result<(), ApplicationError> {
    let listener = TcpListener::bind(address)
        .await
        .context(BindAddressSnafu { address })?;

    tracing::info!(%address, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown())
        .await
        .context(WebServerSnafu)
}

async fn shutdown() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutting down"),
        Err(error) => {
            tracing::error!(%error, "cannot listen for ctrl-c, running until killed");
            std::future::pending::<()>().await;
        }
    }
}
