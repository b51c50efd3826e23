//! # docbridge-client
//!
//! Blocking client for the BI platform's REST API.
//!
//! - [`http`] — transport boundary (`ureq` in production, in-memory mock in tests)
//! - [`session`] — credential session with transparent token refresh
//! - [`datasets`] — paginated dataset listing and per-dataset endpoints

pub mod datasets;
pub mod error;
pub mod http;
pub mod session;

pub use datasets::{fetch_entities, DatasetFilter, DatasetUpdate, PAGE_SIZE};
pub use error::{ClientError, HttpError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, UreqTransport};
pub use session::{Credentials, Session};
