//! Analysis: the remote oracle seam, the HTTP client for it, the
//! cache-through dispatcher, and verdict classification.

pub mod classify;
pub mod dispatcher;
pub mod http;

pub use classify::classify;
pub use dispatcher::{
    AnalysisDispatcher, AnalysisOutcome, DEGRADED_PLACEHOLDER, ERROR_PLACEHOLDER, Origin,
};
pub use http::HttpAnalyzer;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::ItemIdentity;

/// The external analysis service, as a black-box request/response oracle.
///
/// Implementations report [`crate::error::Error::RemoteUnreachable`] when the
/// service cannot be reached (network failure, timeout, non-success status)
/// and any other error when the round trip failed otherwise.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, content: &str, identity: &ItemIdentity) -> Result<String>;
}
