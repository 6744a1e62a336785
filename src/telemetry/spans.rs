//! Span helpers for discovery cycles and item dispatch.

use tracing::Span;

/// Start a span covering one discovery cycle.
///
/// `cycle.candidates` is declared empty and filled once enumeration is done.
pub fn start_cycle_span(trigger: &str, cycle: u64) -> Span {
    tracing::info_span!(
        "verdict.cycle",
        "cycle.trigger" = trigger,
        "cycle.number" = cycle,
        "cycle.candidates" = tracing::field::Empty,
    )
}

pub fn record_candidates(span: &Span, candidates: usize) {
    span.record("cycle.candidates", candidates);
}

/// Start a span for one item's trip through the dispatcher.
///
/// `item.origin` is declared empty and set with [`record_origin`].
pub fn start_dispatch_span(identity: &str, content_key: &str) -> Span {
    tracing::info_span!(
        "verdict.dispatch",
        "item.identity" = identity,
        "item.content_key" = content_key,
        "item.origin" = tracing::field::Empty,
    )
}

pub fn record_origin(span: &Span, origin: &str) {
    span.record("item.origin", origin);
}
