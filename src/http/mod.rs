//! HTTP client module with throttling retries and typed Graph errors.

mod client;
pub mod error;
pub mod retry;

pub use client::{HttpClient, RequestOptions};
pub use error::{GraphError, GraphErrorKind, GraphErrorResponse, parse_graph_error};
pub use retry::{RetryOptions, calculate_backoff, sleep};
