use std::future::Future;

use reqwest::StatusCode;
use snafu::{ensure, ResultExt as _};
use url::Url;

use crate::model::{CountQuery, CountRecord, ItemId, ViewRecord};
use crate::store::{CountStore, CountTable};

use super::error::*;

/// Carries a request to the backend at `target`.
pub trait Forward: Send + Sync {
    /// Hand the view over for counting and return the backend's answer as is.
    fn record_view(
        &self, target: &Url, view: &ViewRecord,
    ) -> impl Future<Output = Result<String, ForwardError>> + Send;

    /// `None` when the backend has no row for `item_id`.
    fn get_count(
        &self, target: &Url, item_id: ItemId,
    ) -> impl Future<Output = Result<Option<u64>, ForwardError>> + Send;
}

/// Forwards over HTTP: `POST <target>/view` and `GET <target>/count?itemId=`.
#[derive(Debug, Clone, Default)]
pub struct HttpForwarder {
    client: reqwest::Client,
}

/// `path` under `target`, which is treated as a directory whether or not it ends in `/`.
fn endpoint(target: &Url, path: &'static str) -> Result<Url, ForwardError> {
    let mut base = target.clone();
    if !base.path().ends_with('/') {
        let directory = format!("{}/", base.path());
        base.set_path(&directory);
    }

    base.join(path).context(EndpointSnafu {
        target: target.clone(),
        path,
    })
}

impl Forward for HttpForwarder {
    async fn record_view(&self, target: &Url, view: &ViewRecord) -> Result<String, ForwardError> {
        let response = self
            .client
            .post(endpoint(target, "view")?)
            .json(view)
            .send()
            .await
            .context(RequestSnafu)?;

        let status = response.status();
        let body = response.text().await.context(RequestSnafu)?;

        ensure!(
            status.is_success(),
            StatusSnafu {
                status: status.as_u16(),
                body
            }
        );

        Ok(body)
    }

    async fn get_count(&self, target: &Url, item_id: ItemId) -> Result<Option<u64>, ForwardError> {
        let response = self
            .client
            .get(endpoint(target, "count")?)
            .query(&CountQuery::new(item_id))
            .send()
            .await
            .context(RequestSnafu)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !status.is_success() {
            let body = response.text().await.context(RequestSnafu)?;
            return StatusSnafu {
                status: status.as_u16(),
                body,
            }
            .fail();
        }

        let record: CountRecord = response.json().await.context(DecodeSnafu)?;
        Ok(Some(record.views_count))
    }
}

/// Serves requests from a table in this process instead of a remote backend.
#[derive(Debug)]
pub struct LocalForwarder<S> {
    table: CountTable<S>,
}

impl<S: CountStore> LocalForwarder<S> {
    pub fn new(table: CountTable<S>) -> Self {
        Self { table }
    }
}

impl<S: CountStore> Forward for LocalForwarder<S> {
    async fn record_view(&self, target: &Url, view: &ViewRecord) -> Result<String, ForwardError> {
        let record = self.table.increment(view.video_id()).await?;
        tracing::debug!(%target, ?record, "counted view locally");

        serde_json::to_string(&record).context(EncodeSnafu)
    }

    async fn get_count(&self, _target: &Url, item_id: ItemId) -> Result<Option<u64>, ForwardError> {
        Ok(self.table.get_count(item_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(text: &str) -> Url {
        Url::parse(text).unwrap()
    }

    #[test]
    fn endpoints_keep_the_backend_path() {
        assert_eq!(endpoint(&url("http://h:8081"), "view").unwrap(), url("http://h:8081/view"));
        assert_eq!(endpoint(&url("http://h/api/"), "count").unwrap(), url("http://h/api/count"));
        assert_eq!(endpoint(&url("http://h/api"), "count").unwrap(), url("http://h/api/count"));
    }
}
