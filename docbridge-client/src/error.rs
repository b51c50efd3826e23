//! Error types for docbridge-client.

use thiserror::Error;

use docbridge_core::DatasetKey;

/// Transport-level failure: the request never produced an HTTP response.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("http transport error: {0}")]
    Transport(String),

    #[error("no mock response registered for {method} {url}")]
    NoMockResponse { method: String, url: String },
}

/// All errors that can arise from talking to the BI platform.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Username or password was not supplied.
    #[error(
        "missing credentials: add `USERNAME` and `PASSWORD` to your environment \
         or pass `--username` and `--password`"
    )]
    MissingCredentials,

    /// Login was rejected or returned no tokens.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// A non-success HTTP status, after the single refresh-and-retry if any.
    #[error("{method} {endpoint} failed with status {status}: {body}")]
    Request {
        method: &'static str,
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error(transparent)]
    Transport(#[from] HttpError),

    /// The response body was not the JSON shape expected.
    #[error("unexpected response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    /// Two remote datasets share the same `<schema>.<name>` key.
    #[error(
        "dataset {key} is a duplicate name (schema + table) across databases; \
         this would result in incorrect matching between the BI platform and dbt. \
         To fix this, remove duplicates or pass `--superset-db-id`"
    )]
    DuplicateKey { key: DatasetKey },

    /// No physical dataset survived filtering.
    #[error("there are no datasets in the BI platform: {reason}")]
    NoData { reason: String },
}

impl ClientError {
    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Request { status, .. } => Some(*status),
            _ => None,
        }
    }
}
