//! Cache-through dispatch to the analysis service.

use opentelemetry::KeyValue;
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, error, info, warn};

use super::{Analyzer, classify};
use crate::cache::CacheStore;
use crate::error::Error;
use crate::identity::content_key;
use crate::model::{CacheEntry, Category, ContentKey, ItemIdentity};
use crate::telemetry::{metrics, spans};

/// Shown when the analysis service cannot be reached. Never cached.
pub const DEGRADED_PLACEHOLDER: &str = "analysis unavailable (service unreachable)";

/// Shown when the round trip failed for any other reason. Never cached.
pub const ERROR_PLACEHOLDER: &str = "analysis error";

/// Where a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    Cache,
    Remote,
    Degraded,
    Failed,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Cache => "cache",
            Origin::Remote => "remote",
            Origin::Degraded => "degraded",
            Origin::Failed => "failed",
        }
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The result of [`AnalysisDispatcher::analyze`]. Always carries a string to
/// show; `origin` says whether it is a real verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisOutcome {
    pub result: String,
    pub origin: Origin,
}

impl AnalysisOutcome {
    pub fn category(&self) -> Category {
        classify(&self.result)
    }
}

/// Resolves content to a verdict, from the cache when fresh, otherwise from
/// the analysis service, writing successful results through to the cache.
pub struct AnalysisDispatcher {
    analyzer: Arc<dyn Analyzer>,
    cache: CacheStore,
}

impl AnalysisDispatcher {
    pub fn new(analyzer: Arc<dyn Analyzer>, cache: CacheStore) -> Self {
        Self { analyzer, cache }
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut CacheStore {
        &mut self.cache
    }

    /// Fresh cache entry for `key`, counted as a hit or a miss.
    pub fn lookup(&self, key: &ContentKey) -> Option<&CacheEntry> {
        let entry = self.cache.get(key);
        let result = if entry.is_some() { "hit" } else { "miss" };
        metrics::cache_lookups().add(1, &[KeyValue::new("result", result)]);
        entry
    }

    /// Resolve `content` to a verdict. Never fails: unreachable or broken
    /// round trips resolve to [`DEGRADED_PLACEHOLDER`] or [`ERROR_PLACEHOLDER`].
    pub async fn analyze(&mut self, content: &str, identity: &ItemIdentity) -> AnalysisOutcome {
        let key = content_key(content);

        if let Some(entry) = self.cache.get(&key) {
            let outcome = AnalysisOutcome {
                result: entry.result.clone(),
                origin: Origin::Cache,
            };
            record(&outcome);
            return outcome;
        }

        let span = spans::start_dispatch_span(identity.as_str(), key.as_str());
        let started = Instant::now();
        let response = self
            .analyzer
            .analyze(content, identity)
            .instrument(span.clone())
            .await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        metrics::analysis_duration_ms().record(elapsed_ms, &[]);

        let outcome = match response {
            Ok(result) => {
                self.cache
                    .put(key, CacheEntry::new(result.clone(), identity.clone()))
                    .await;
                info!(identity = %identity, elapsed_ms, "remote analysis completed");
                AnalysisOutcome {
                    result,
                    origin: Origin::Remote,
                }
            }
            Err(Error::RemoteUnreachable(reason)) => {
                warn!(identity = %identity, %reason, "analysis service unreachable, using degraded result");
                AnalysisOutcome {
                    result: DEGRADED_PLACEHOLDER.to_string(),
                    origin: Origin::Degraded,
                }
            }
            Err(e) => {
                error!(identity = %identity, error = %e, "analysis failed");
                AnalysisOutcome {
                    result: ERROR_PLACEHOLDER.to_string(),
                    origin: Origin::Failed,
                }
            }
        };

        spans::record_origin(&span, outcome.origin.as_str());
        record(&outcome);
        outcome
    }
}

fn record(outcome: &AnalysisOutcome) {
    metrics::analyses().add(1, &[KeyValue::new("origin", outcome.origin.as_str())]);
}
