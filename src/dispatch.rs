use std::sync::Arc;

use snafu::{OptionExt as _, ResultExt as _};
use tracing::instrument;

use crate::meter::Meter;
use crate::model::{ItemId, ViewRecord};

pub use error::*;
pub use forward::*;
pub use resolver::*;

mod error;
mod forward;
mod resolver;

/// Front-end request router. Stateless between calls apart from the shared meter.
///
/// Every call marks the meter once, before resolving, so failed calls are counted too.
/// Failures are handed back to the caller and never retried here.
#[derive(Debug)]
pub struct Dispatcher<R, F> {
    resolver: R,
    forwarder: F,
    meter: Arc<Meter>,
}

impl<R: Resolver, F: Forward> Dispatcher<R, F> {
    pub fn new(resolver: R, forwarder: F, meter: Arc<Meter>) -> Self {
        Self {
            resolver,
            forwarder,
            meter,
        }
    }

    pub fn meter(&self) -> &Meter {
        &self.meter
    }

    #[instrument(skip(self, view), fields(video_id = %view.video_id(), user_id = %view.user_id()))]
    pub async fn record_view(&self, view: &ViewRecord) -> Result<String, DispatchError> {
        self.meter.mark();

        let target = self.resolver.resolve().await.context(NoBackendSnafu)?;
        tracing::debug!(%target, "forwarding view");

        self.forwarder
            .record_view(&target, view)
            .await
            .context(ForwardSnafu { target })
    }

    #[instrument(skip(self))]
    pub async fn get_count(&self, item_id: ItemId) -> Result<Option<u64>, DispatchError> {
        self.meter.mark();

        let target = self.resolver.resolve().await.context(NoBackendSnafu)?;
        tracing::debug!(%target, "forwarding count lookup");

        self.forwarder
            .get_count(&target, item_id)
            .await
            .context(ForwardSnafu { target })
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::meter::VIEW_REQUESTS;
    use crate::model::UserId;
    use crate::store::memory::MemoryStore;
    use crate::store::{CountTable, TableSchema};

    fn backend() -> Url {
        Url::parse("http://backend:8081").unwrap()
    }

    async fn local_table() -> CountTable<MemoryStore> {
        let schema = TableSchema::new("views_total_count", "item", 1).unwrap();
        let table = CountTable::new(Arc::new(MemoryStore::default()), schema);
        table.ensure_schema().await.unwrap();
        table
    }

    fn view(video: u64) -> ViewRecord {
        ViewRecord::new(ItemId(video), UserId(1), "Lund", "web")
    }

    #[tokio::test]
    async fn forwards_views_and_lookups() {
        let meter = Arc::new(Meter::new(VIEW_REQUESTS));
        let dispatcher = Dispatcher::new(
            || Some(backend()),
            LocalForwarder::new(local_table().await),
            meter.clone(),
        );

        let body = dispatcher.record_view(&view(42)).await.unwrap();
        assert_eq!(body, r#"{"itemId":42,"viewsCount":1}"#);

        assert_eq!(dispatcher.get_count(ItemId(42)).await.unwrap(), Some(1));
        assert_eq!(meter.count(), 2);
    }

    #[tokio::test]
    async fn unknown_item_is_not_found_rather_than_zero() {
        let dispatcher = Dispatcher::new(
            || Some(backend()),
            LocalForwarder::new(local_table().await),
            Arc::new(Meter::new(VIEW_REQUESTS)),
        );

        assert_eq!(dispatcher.get_count(ItemId(42)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn failed_calls_are_counted_and_surfaced() {
        let meter = Arc::new(Meter::new(VIEW_REQUESTS));
        let dispatcher = Dispatcher::new(
            RoundRobin::default(),
            LocalForwarder::new(local_table().await),
            meter.clone(),
        );

        let err = dispatcher.record_view(&view(1)).await.unwrap_err();
        assert!(matches!(err, DispatchError::NoBackend { .. }));
        assert_eq!(meter.count(), 1);

        let err = dispatcher.get_count(ItemId(1)).await.unwrap_err();
        assert!(matches!(err, DispatchError::NoBackend { .. }));
        assert_eq!(meter.count(), 2);
    }

    #[tokio::test]
    async fn storage_failures_surface_as_dispatch_errors() {
        let schema = TableSchema::new("never_ensured", "item", 1).unwrap();
        let table = CountTable::new(Arc::new(MemoryStore::default()), schema);
        let dispatcher = Dispatcher::new(
            || Some(backend()),
            LocalForwarder::new(table),
            Arc::new(Meter::new(VIEW_REQUESTS)),
        );

        let err = dispatcher.get_count(ItemId(3)).await.unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Forward {
                source: ForwardError::LocalRead { .. },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn concurrent_views_stay_on_their_own_rows() {
        let table = local_table().await;
        let dispatcher = Arc::new(Dispatcher::new(
            || Some(backend()),
            LocalForwarder::new(table.clone()),
            Arc::new(Meter::new(VIEW_REQUESTS)),
        ));

        let mut tasks = Vec::new();
        for video in 0..8_u64 {
            for _ in 0..=video {
                let dispatcher = dispatcher.clone();
                tasks.push(tokio::spawn(async move {
                    dispatcher.record_view(&view(video)).await.unwrap();
                }));
            }
        }
        futures::future::join_all(tasks).await;

        for video in 0..8_u64 {
            assert_eq!(table.get_count(ItemId(video)).await.unwrap(), Some(video + 1));
        }
        assert_eq!(dispatcher.meter().count(), 36);
    }
}
