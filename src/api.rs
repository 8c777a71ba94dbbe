use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use snafu::{OptionExt as _, ResultExt as _};
use tower_http::trace::TraceLayer;
use tracing::instrument;

use crate::dispatch::{Dispatcher, Forward, Resolver};
use crate::model::{CountQuery, CountRecord, ViewPayload, ViewRecord};
use crate::store::{CountStore, CountTable};

pub use error::*;

mod error;

pub type Result<T, E = ApiError> = std::result::Result<T, E>;

/// Front routes: `POST /view` and `GET /count`, both forwarded to a backend.
pub fn dispatcher_router<R, F>(dispatcher: Arc<Dispatcher<R, F>>) -> Router
where
    R: Resolver + 'static,
    F: Forward + 'static,
{
    Router::new()
        .route("/view", post(front::record_view::<R, F>))
        .route("/count", get(front::get_count::<R, F>))
        .layer(TraceLayer::new_for_http())
        .with_state(dispatcher)
}

/// Backend routes: `POST /view` counts the view, `GET /count` reads the row.
pub fn backend_router<S>(table: CountTable<S>) -> Router
where
    S: CountStore + 'static,
{
    Router::new()
        .route("/view", post(backend::record_view::<S>))
        .route("/count", get(backend::get_count::<S>))
        .layer(TraceLayer::new_for_http())
        .with_state(table)
}

fn validate(payload: ViewPayload) -> Result<ViewRecord> {
    ViewRecord::try_from(payload).context(InvalidViewSnafu)
}

mod front {
    use super::*;

    #[instrument(skip(dispatcher))]
    pub async fn record_view<R: Resolver, F: Forward>(
        State(dispatcher): State<Arc<Dispatcher<R, F>>>, Json(payload): Json<ViewPayload>,
    ) -> Result<impl IntoResponse> {
        let view = validate(payload)?;
        let body = dispatcher.record_view(&view).await?;

        Ok(([(CONTENT_TYPE, "application/json")], body))
    }

    #[instrument(skip(dispatcher))]
    pub async fn get_count<R: Resolver, F: Forward>(
        State(dispatcher): State<Arc<Dispatcher<R, F>>>, Query(query): Query<CountQuery>,
    ) -> Result<Json<CountRecord>> {
        let views_count = dispatcher
            .get_count(query.item_id)
            .await?
            .context(NotFoundSnafu {
                item_id: query.item_id,
            })?;

        Ok(Json(CountRecord::new(query.item_id, views_count)))
    }
}

mod backend {
    use super::*;

    #[instrument(skip(table))]
    pub async fn record_view<S: CountStore>(
        State(table): State<CountTable<S>>, Json(payload): Json<ViewPayload>,
    ) -> Result<Json<CountRecord>> {
        let view = validate(payload)?;
        let record = table.increment(view.video_id()).await?;

        tracing::debug!(?record, user_id = %view.user_id(), "view counted");
        Ok(Json(record))
    }

    #[instrument(skip(table))]
    pub async fn get_count<S: CountStore>(
        State(table): State<CountTable<S>>, Query(query): Query<CountQuery>,
    ) -> Result<Json<CountRecord>> {
        let views_count = table
            .get_count(query.item_id)
            .await?
            .context(NotFoundSnafu {
                item_id: query.item_id,
            })?;

        Ok(Json(CountRecord::new(query.item_id, views_count)))
    }
}
