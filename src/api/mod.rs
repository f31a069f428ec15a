//! HTTP surface over the task core.
//!
//! Admission (file presence, extension, size) happens here; everything past
//! that is handed to the `JobSubmitter` and read back from the `TaskRegistry`.

pub mod routes;
pub mod upload;

pub use routes::{ApiConfig, AppState, api_routes};
