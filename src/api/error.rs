use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use snafu::Snafu;

use crate::dispatch::DispatchError;
use crate::model::ItemId;
use crate::store::{ReadError, WriteError};
use crate::validation::ValidationError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ApiError {
    #[snafu(display("invalid view: {source}"))]
    InvalidView { source: ValidationError },

    #[snafu(display("item `{item_id}` has no count"))]
    NotFound { item_id: ItemId },

    #[snafu(transparent)]
    Dispatch { source: DispatchError },

    #[snafu(transparent)]
    Write { source: WriteError },

    #[snafu(transparent)]
    Read { source: ReadError },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidView { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Dispatch {
                source: DispatchError::NoBackend { .. },
            } => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Dispatch { .. } => StatusCode::BAD_GATEWAY,
            ApiError::Write { .. } | ApiError::Read { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, %status, "request failed");
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
        }

        (status, self.to_string()).into_response()
    }
}
