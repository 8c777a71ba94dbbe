use snafu::{Location, Snafu};
use url::Url;

use crate::store::{ReadError, WriteError};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DispatchError {
    #[snafu(display("no backend is available to take the request"))]
    NoBackend {
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("backend `{target}` failed: {source}"))]
    Forward {
        target: Url,
        source: ForwardError,
        #[snafu(implicit)]
        location: Location,
    },
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ForwardError {
    #[snafu(display("cannot build the `{path}` endpoint of `{target}`: {source}"))]
    Endpoint {
        target: Url,
        path: &'static str,
        source: url::ParseError,
    },

    #[snafu(display("request did not complete: {source}"))]
    Request {
        source: reqwest::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("backend answered {status}: {body}"))]
    Status {
        status: u16,
        body: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("malformed count response: {source}"))]
    Decode {
        source: reqwest::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("could not encode the count record: {source}"))]
    Encode { source: serde_json::Error },

    #[snafu(transparent)]
    LocalWrite { source: WriteError },

    #[snafu(transparent)]
    LocalRead { source: ReadError },
}
