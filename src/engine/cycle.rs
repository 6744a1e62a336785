//! The engine: one document session's identity, tracking, cache, and
//! discovery cycle.
//!
//! All mutable state lives here and is only reachable through `&mut Engine`,
//! so two cycles can never interleave on the same session. Drivers (see
//! [`super::control`]) feed triggers in and decide when to run.

use opentelemetry::KeyValue;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{Instrument, Span, debug, info, warn};
use uuid::Uuid;

use super::debounce::Debouncer;
use crate::analyzer::{AnalysisDispatcher, AnalysisOutcome, Analyzer, Origin, classify};
use crate::cache::{CacheBackend, CacheStore};
use crate::config::EngineConfig;
use crate::document::AnnotationSink;
use crate::event::{Event, EventBus, EventKind};
use crate::identity::{IdentityResolver, content_key};
use crate::model::{CacheStats, Category, ItemIdentity, Status};
use crate::telemetry::{metrics, spans};
use crate::tracker::WorkTracker;

const EVENT_CAPACITY: usize = 256;

/// Why a cycle ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Startup,
    Mutation,
    Tick,
    Reprocess,
    Manual,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Startup => "startup",
            Trigger::Mutation => "mutation",
            Trigger::Tick => "tick",
            Trigger::Reprocess => "reprocess",
            Trigger::Manual => "manual",
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What one cycle did, by candidate count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub candidates: usize,
    /// Non-primary or too short.
    pub skipped: usize,
    pub extraction_failures: usize,
    pub already_annotated: usize,
    pub cache_hits: usize,
    /// Sent to the dispatcher (includes degraded and failed results).
    pub dispatched: usize,
    pub degraded: usize,
    pub failed: usize,
    pub refused: usize,
    pub annotation_failures: usize,
}

pub struct Engine {
    session: Uuid,
    config: EngineConfig,
    resolver: IdentityResolver,
    tracker: WorkTracker,
    dispatcher: AnalysisDispatcher,
    events: EventBus,
    debounce: Debouncer,
    tick_due: bool,
    cycles_run: u64,
}

impl Engine {
    /// Load the persisted cache and build a session around it.
    pub async fn init(
        config: EngineConfig,
        backend: Box<dyn CacheBackend>,
        analyzer: Arc<dyn Analyzer>,
    ) -> Self {
        let cache = CacheStore::load(backend, config.cache_ttl()).await;
        Self::with_cache(config, cache, analyzer)
    }

    pub fn with_cache(config: EngineConfig, cache: CacheStore, analyzer: Arc<dyn Analyzer>) -> Self {
        let session = Uuid::new_v4();
        info!(%session, cached = cache.len(), "engine session started");
        Self {
            session,
            resolver: IdentityResolver::new(config.identity_prefix_chars),
            tracker: WorkTracker::new(),
            dispatcher: AnalysisDispatcher::new(analyzer, cache),
            events: EventBus::new(EVENT_CAPACITY),
            debounce: Debouncer::new(config.debounce()),
            tick_due: false,
            cycles_run: 0,
            config,
        }
    }

    /// Write back any cache changes the backend has not accepted yet.
    pub async fn teardown(&mut self) {
        self.dispatcher.cache_mut().flush().await;
        info!(session = %self.session, cycles = self.cycles_run, "engine session ended");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tracker(&self) -> &WorkTracker {
        &self.tracker
    }

    pub fn cache(&self) -> &CacheStore {
        self.dispatcher.cache()
    }

    // -----------------------------------------------------------------------
    // Triggers
    // -----------------------------------------------------------------------

    /// The watched source changed. Starts (or extends) the debounce window.
    pub fn on_source_mutated(&mut self) {
        self.debounce.signal(Instant::now());
    }

    /// The periodic timer fired.
    pub fn tick(&mut self) {
        self.tick_due = true;
    }

    /// When a pending mutation burst becomes due.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.debounce.deadline()
    }

    /// The trigger that is due at `now`, if any. Ticks win over mutations.
    pub fn due_trigger(&self, now: Instant) -> Option<Trigger> {
        if self.tick_due {
            Some(Trigger::Tick)
        } else if self.debounce.is_due(now) {
            Some(Trigger::Mutation)
        } else {
            None
        }
    }

    /// Run a cycle if a trigger is due.
    pub async fn run_pending<D: AnnotationSink>(&mut self, doc: &mut D) -> Option<CycleReport> {
        let trigger = self.due_trigger(Instant::now())?;
        Some(self.run_cycle(doc, trigger).await)
    }

    // -----------------------------------------------------------------------
    // Cycle
    // -----------------------------------------------------------------------

    /// Run one discovery cycle to completion.
    ///
    /// Triggers pending at the start are absorbed by this cycle; triggers
    /// arriving while it runs are left for the next one.
    pub async fn run_cycle<D: AnnotationSink>(&mut self, doc: &mut D, trigger: Trigger) -> CycleReport {
        self.cycles_run += 1;
        let cycle = self.cycles_run;
        self.debounce.clear();
        self.tick_due = false;

        metrics::cycles().add(1, &[KeyValue::new("trigger", trigger.as_str())]);
        self.events.emit(EventKind::CycleStarted { cycle, trigger });

        let span = spans::start_cycle_span(trigger.as_str(), cycle);
        let report = self.discover(doc, &span).instrument(span.clone()).await;

        info!(
            cycle,
            %trigger,
            candidates = report.candidates,
            cache_hits = report.cache_hits,
            dispatched = report.dispatched,
            refused = report.refused,
            "cycle completed"
        );
        self.events.emit(EventKind::CycleCompleted {
            cycle,
            report: report.clone(),
        });
        report
    }

    async fn discover<D: AnnotationSink>(&mut self, doc: &mut D, span: &Span) -> CycleReport {
        let mut report = CycleReport::default();

        let candidates = match doc.list_candidates() {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(error = %e, "candidate enumeration failed");
                report.extraction_failures += 1;
                self.events.emit(EventKind::ExtractionFailed {
                    error: e.to_string(),
                });
                return report;
            }
        };
        spans::record_candidates(span, candidates.len());
        report.candidates = candidates.len();

        for node in &candidates {
            if doc.is_non_primary(node) {
                report.skipped += 1;
                decision("skipped");
                continue;
            }

            let content = match doc.extract_content(node) {
                Ok(content) => content,
                Err(e) => {
                    warn!(?node, error = %e, "content extraction failed, skipping");
                    report.extraction_failures += 1;
                    self.events.emit(EventKind::ExtractionFailed {
                        error: e.to_string(),
                    });
                    continue;
                }
            };
            if content.chars().count() <= self.config.min_content_chars {
                report.skipped += 1;
                decision("skipped");
                continue;
            }

            self.process(doc, node, &content, &mut report).await;
        }

        report
    }

    async fn process<D: AnnotationSink>(
        &mut self,
        doc: &mut D,
        node: &D::Node,
        content: &str,
        report: &mut CycleReport,
    ) {
        let identity = self.resolver.resolve(doc, node, content);

        if doc.has_annotation(node) {
            self.tracker.finalize(&identity);
            report.already_annotated += 1;
            decision("annotated");
            self.events.emit(EventKind::AlreadyAnnotated { identity });
            return;
        }

        let key = content_key(content);
        if let Some(result) = self.dispatcher.lookup(&key).map(|entry| entry.result.clone()) {
            report.cache_hits += 1;
            decision("cache_hit");
            debug!(%identity, %key, "annotating from cache");
            self.events.emit(EventKind::CacheHit {
                identity: identity.clone(),
                content_key: key,
            });
            let category = classify(&result);
            if annotate(doc, node, &identity, category, &result, Origin::Cache, &mut self.events, report) {
                self.tracker.finalize(&identity);
            }
            return;
        }

        let Some(mut admission) = self.tracker.admit(&identity) else {
            report.refused += 1;
            decision("refused");
            debug!(%identity, "admission refused");
            self.events.emit(EventKind::AdmissionRefused { identity });
            return;
        };

        report.dispatched += 1;
        decision("dispatched");
        self.events.emit(EventKind::Dispatched {
            identity: identity.clone(),
            content_key: key,
        });

        let outcome = self.dispatcher.analyze(content, &identity).await;
        match outcome.origin {
            Origin::Degraded => report.degraded += 1,
            Origin::Failed => report.failed += 1,
            Origin::Cache | Origin::Remote => {}
        }

        let category = outcome.category();
        if annotate(doc, node, &identity, category, &outcome.result, outcome.origin, &mut self.events, report) {
            admission.finalize();
        }
        // Dropping the admission releases the identity on every path.
    }

    // -----------------------------------------------------------------------
    // Control surface
    // -----------------------------------------------------------------------

    /// Forget finalized items, strip existing annotations, and run a cycle.
    /// The cache is kept, so unchanged content is re-annotated from it.
    pub async fn reprocess_all<D: AnnotationSink>(&mut self, doc: &mut D) -> CycleReport {
        self.tracker.reset();

        let mut cleared = 0;
        match doc.list_candidates() {
            Ok(nodes) => {
                for node in &nodes {
                    if !doc.has_annotation(node) {
                        continue;
                    }
                    match doc.clear_annotation(node) {
                        Ok(()) => cleared += 1,
                        Err(e) => warn!(?node, error = %e, "clearing annotation failed"),
                    }
                }
            }
            Err(e) => warn!(error = %e, "candidate enumeration failed during reprocess"),
        }

        info!(cleared, "reprocessing all items");
        self.events.emit(EventKind::ReprocessRequested {
            cleared_annotations: cleared,
        });
        self.run_cycle(doc, Trigger::Reprocess).await
    }

    pub async fn clear_cache(&mut self) {
        self.dispatcher.cache_mut().clear().await;
        self.events.emit(EventKind::CacheCleared);
    }

    /// Sweep expired cache entries. Returns how many were removed.
    pub async fn evict_expired(&mut self) -> usize {
        let removed = self.dispatcher.cache_mut().evict_expired().await;
        metrics::cache_evicted().add(removed as u64, &[]);
        if removed > 0 {
            self.events.emit(EventKind::CacheEvicted { removed });
        }
        removed
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.dispatcher.cache().stats()
    }

    pub fn status(&self) -> Status {
        Status {
            session: self.session,
            active: true,
            cycles_run: self.cycles_run,
            pending: self.tracker.pending_count(),
            finalized: self.tracker.finalized_count(),
            cache_entries: self.dispatcher.cache().len(),
            timestamp: chrono::Utc::now(),
        }
    }

    /// Analyze free-standing content outside any document, through the cache.
    pub async fn analyze_content(&mut self, content: &str) -> (ItemIdentity, AnalysisOutcome) {
        let identity = self.resolver.mint(content);
        let outcome = self.dispatcher.analyze(content, &identity).await;
        (identity, outcome)
    }
}

fn decision(decision: &'static str) {
    metrics::item_decisions().add(1, &[KeyValue::new("decision", decision)]);
}

/// Attach a verdict. Returns whether the node now carries it.
#[allow(clippy::too_many_arguments)]
fn annotate<D: AnnotationSink>(
    doc: &mut D,
    node: &D::Node,
    identity: &ItemIdentity,
    category: Category,
    result: &str,
    origin: Origin,
    events: &mut EventBus,
    report: &mut CycleReport,
) -> bool {
    match doc.annotate(node, identity, category, result) {
        Ok(()) => {
            debug!(%identity, %category, %origin, "annotated");
            events.emit(EventKind::Annotated {
                identity: identity.clone(),
                category,
                origin: origin.to_string(),
            });
            true
        }
        Err(e) => {
            warn!(%identity, error = %e, "annotation failed");
            report.annotation_failures += 1;
            events.emit(EventKind::AnnotationFailed {
                identity: identity.clone(),
                error: e.to_string(),
            });
            false
        }
    }
}
