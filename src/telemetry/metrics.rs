//! Metric instrument factories.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without an OTLP endpoint the global provider is a no-op, so recording
//! is always safe.

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("verdict-rs")
}

/// Counter: cache lookups made by the discovery loop and the dispatcher.
/// Labels: `result` ("hit" | "miss").
pub fn cache_lookups() -> Counter<u64> {
    meter()
        .u64_counter("verdict.cache.lookups")
        .with_description("Number of cache lookups")
        .build()
}

/// Counter: entries removed by the expiry sweep.
pub fn cache_evicted() -> Counter<u64> {
    meter()
        .u64_counter("verdict.cache.evicted")
        .with_description("Number of expired cache entries evicted")
        .build()
}

/// Counter: analyses resolved by the dispatcher.
/// Labels: `origin` ("cache" | "remote" | "degraded" | "failed").
pub fn analyses() -> Counter<u64> {
    meter()
        .u64_counter("verdict.analyses")
        .with_description("Number of analyses resolved, by origin")
        .build()
}

/// Histogram: remote analysis round-trip time in milliseconds.
pub fn analysis_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("verdict.analysis.duration_ms")
        .with_description("Remote analysis round-trip duration")
        .with_unit("ms")
        .build()
}

/// Counter: discovery cycles run.
/// Labels: `trigger` ("startup" | "mutation" | "tick" | "reprocess" | "manual").
pub fn cycles() -> Counter<u64> {
    meter()
        .u64_counter("verdict.cycles")
        .with_description("Number of discovery cycles run")
        .build()
}

/// Counter: what a cycle decided for each candidate.
/// Labels: `decision` ("skipped" | "annotated" | "cache_hit" | "dispatched" | "refused").
pub fn item_decisions() -> Counter<u64> {
    meter()
        .u64_counter("verdict.items")
        .with_description("Per-candidate decisions taken by discovery cycles")
        .build()
}

/// Label values each counter is pre-registered with.
pub const LOOKUP_RESULTS: &[&str] = &["hit", "miss"];
pub const ANALYSIS_ORIGINS: &[&str] = &["cache", "remote", "degraded", "failed"];
pub const CYCLE_TRIGGERS: &[&str] = &["startup", "mutation", "tick", "reprocess", "manual"];
pub const ITEM_DECISIONS: &[&str] = &["skipped", "annotated", "cache_hit", "dispatched", "refused"];

/// Add zero to every counter series so an exporter reports each one before
/// its first real event. Returns the number of series touched.
pub fn register_all() -> usize {
    let labeled = [
        (cache_lookups(), "result", LOOKUP_RESULTS),
        (analyses(), "origin", ANALYSIS_ORIGINS),
        (cycles(), "trigger", CYCLE_TRIGGERS),
        (item_decisions(), "decision", ITEM_DECISIONS),
    ];
    let mut series = 0;
    for (counter, key, values) in labeled {
        for value in values {
            counter.add(0, &[KeyValue::new(key, *value)]);
            series += 1;
        }
    }
    cache_evicted().add(0, &[]);
    series + 1
}
