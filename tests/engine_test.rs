//! Integration tests for the discovery engine.

mod common;

use common::{
    FakeAnalyzer, FakeDocument, FlakyBackend, Reply, SAMPLE_POST, engine_on, engine_with,
};
use std::time::Duration;
use verdict_rs::analyzer::{DEGRADED_PLACEHOLDER, ERROR_PLACEHOLDER, Origin};
use verdict_rs::cache::{CacheStore, MemoryBackend};
use verdict_rs::config::EngineConfig;
use verdict_rs::engine::{CycleReport, Engine, Trigger};
use verdict_rs::event::EventKind;
use verdict_rs::identity::content_key;
use verdict_rs::model::Category;
use verdict_rs::tracker::ItemState;

// ---------------------------------------------------------------------------
// Basic flow: discover → dispatch → annotate → finalize
// ---------------------------------------------------------------------------

#[tokio::test]
async fn new_item_is_analyzed_cached_and_annotated() {
    let analyzer = FakeAnalyzer::replying("true");
    let mut engine = engine_with(analyzer.clone()).await;
    let mut doc = FakeDocument::with_items(&[SAMPLE_POST]);

    let report = engine.run_cycle(&mut doc, Trigger::Startup).await;

    assert_eq!(report.candidates, 1);
    assert_eq!(report.dispatched, 1);
    assert_eq!(analyzer.calls(), 1);
    assert_eq!(doc.annotation(0), Some((Category::True, "true".to_string())));

    let entry = engine.cache().get(&content_key(SAMPLE_POST)).unwrap();
    assert_eq!(entry.result, "true");

    let identity = doc.marker(0).expect("identity should be attached");
    assert_eq!(entry.source_item_identity, identity);
    assert_eq!(engine.tracker().state(&identity), ItemState::Finalized);
    assert_eq!(engine.tracker().pending_count(), 0);
}

#[tokio::test]
async fn finalized_item_is_not_dispatched_again() {
    let analyzer = FakeAnalyzer::replying("true");
    let mut engine = engine_with(analyzer.clone()).await;
    let mut doc = FakeDocument::with_items(&[SAMPLE_POST]);

    engine.run_cycle(&mut doc, Trigger::Startup).await;
    let report = engine.run_cycle(&mut doc, Trigger::Tick).await;

    assert_eq!(report.already_annotated, 1);
    assert_eq!(report.dispatched, 0);
    assert_eq!(analyzer.calls(), 1);
    assert_eq!(doc.annotate_calls(), 1);
}

#[tokio::test]
async fn duplicate_content_is_analyzed_once() {
    let analyzer = FakeAnalyzer::replying("Expressive True");
    let mut engine = engine_with(analyzer.clone()).await;
    let mut doc = FakeDocument::with_items(&[SAMPLE_POST, SAMPLE_POST, "  THIS is a sample post\nwith enough length "]);

    let report = engine.run_cycle(&mut doc, Trigger::Startup).await;

    assert_eq!(report.dispatched, 1);
    assert_eq!(report.cache_hits, 2);
    assert_eq!(analyzer.calls(), 1);
    for node in 0..3 {
        assert_eq!(doc.annotation(node).unwrap().0, Category::ExpressiveTrue);
    }
    let identities: std::collections::HashSet<_> = (0..3).filter_map(|n| doc.marker(n)).collect();
    assert_eq!(identities.len(), 3);
}

#[tokio::test]
async fn short_and_non_primary_nodes_are_skipped() {
    let analyzer = FakeAnalyzer::replying("false");
    let mut engine = engine_with(analyzer.clone()).await;
    let mut doc = FakeDocument::new();
    let short = doc.push("too short");
    let exactly_ten = doc.push("0123456789");
    let eleven = doc.push("0123456789a");
    let comment = doc.push_comment("a comment long enough to count otherwise");

    let report = engine.run_cycle(&mut doc, Trigger::Startup).await;

    assert_eq!(report.skipped, 3);
    assert_eq!(report.dispatched, 1);
    assert!(doc.annotation(short).is_none());
    assert!(doc.annotation(exactly_ten).is_none());
    assert!(doc.annotation(comment).is_none());
    assert_eq!(doc.annotation(eleven).unwrap().0, Category::False);
    assert!(doc.marker(short).is_none());
    assert!(doc.marker(exactly_ten).is_none());
    assert_eq!(analyzer.requests()[0].0, "0123456789a");
}

#[tokio::test]
async fn extraction_failure_skips_only_that_node() {
    let analyzer = FakeAnalyzer::replying("true");
    let mut engine = engine_with(analyzer.clone()).await;
    let mut doc = FakeDocument::new();
    doc.push_broken();
    let good = doc.push(SAMPLE_POST);

    let report = engine.run_cycle(&mut doc, Trigger::Startup).await;

    assert_eq!(report.extraction_failures, 1);
    assert_eq!(report.dispatched, 1);
    assert!(doc.annotation(good).is_some());
}

#[tokio::test]
async fn enumeration_failure_ends_the_cycle_quietly() {
    let analyzer = FakeAnalyzer::replying("true");
    let mut engine = engine_with(analyzer.clone()).await;
    let mut doc = FakeDocument::with_items(&[SAMPLE_POST]);
    doc.set_fail_list(true);

    let report = engine.run_cycle(&mut doc, Trigger::Startup).await;
    assert_eq!(report.extraction_failures, 1);
    assert_eq!(report.candidates, 0);
    assert_eq!(analyzer.calls(), 0);

    doc.set_fail_list(false);
    let report = engine.run_cycle(&mut doc, Trigger::Tick).await;
    assert_eq!(report.dispatched, 1);
}

// ---------------------------------------------------------------------------
// Failure paths
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unreachable_service_annotates_degraded_and_caches_nothing() {
    let analyzer = FakeAnalyzer::unreachable();
    let mut engine = engine_with(analyzer.clone()).await;
    let mut doc = FakeDocument::with_items(&[SAMPLE_POST]);

    let report = engine.run_cycle(&mut doc, Trigger::Startup).await;

    assert_eq!(report.degraded, 1);
    assert_eq!(
        doc.annotation(0),
        Some((Category::Unclassified, DEGRADED_PLACEHOLDER.to_string()))
    );
    assert!(engine.cache().is_empty());
    assert!(engine.tracker().is_finalized(&doc.marker(0).unwrap()));
}

#[tokio::test]
async fn service_error_annotates_error_placeholder() {
    let analyzer = FakeAnalyzer::broken();
    let mut engine = engine_with(analyzer.clone()).await;
    let mut doc = FakeDocument::with_items(&[SAMPLE_POST]);

    let report = engine.run_cycle(&mut doc, Trigger::Startup).await;

    assert_eq!(report.failed, 1);
    assert_eq!(doc.annotation(0).unwrap().1, ERROR_PLACEHOLDER);
    assert!(engine.cache().is_empty());
}

#[tokio::test]
async fn failed_annotation_releases_without_finalizing() {
    let analyzer = FakeAnalyzer::replying("true");
    let mut engine = engine_with(analyzer.clone()).await;
    let mut doc = FakeDocument::with_items(&[SAMPLE_POST]);
    doc.set_fail_annotate(true);

    let report = engine.run_cycle(&mut doc, Trigger::Startup).await;
    let identity = doc.marker(0).unwrap();

    assert_eq!(report.annotation_failures, 1);
    assert_eq!(engine.tracker().state(&identity), ItemState::Untracked);
    // The verdict itself was still cached.
    assert!(engine.cache().get(&content_key(SAMPLE_POST)).is_some());

    doc.set_fail_annotate(false);
    let report = engine.run_cycle(&mut doc, Trigger::Tick).await;
    assert_eq!(report.cache_hits, 1);
    assert_eq!(analyzer.calls(), 1);
    assert_eq!(engine.tracker().state(&identity), ItemState::Finalized);
}

// ---------------------------------------------------------------------------
// Reprocess and restart
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reprocess_reannotates_from_cache() {
    let analyzer = FakeAnalyzer::replying("true");
    let mut engine = engine_with(analyzer.clone()).await;
    let mut doc = FakeDocument::with_items(&[SAMPLE_POST, "another post that is long enough"]);

    engine.run_cycle(&mut doc, Trigger::Startup).await;
    assert_eq!(analyzer.calls(), 2);

    analyzer.set_reply(Reply::Verdict("false".to_string()));
    let report = engine.reprocess_all(&mut doc).await;

    assert_eq!(report.cache_hits, 2);
    assert_eq!(report.dispatched, 0);
    assert_eq!(analyzer.calls(), 2);
    assert_eq!(doc.annotate_calls(), 4);
    assert_eq!(doc.annotation(0).unwrap().0, Category::True);
}

#[tokio::test]
async fn reprocess_after_clear_asks_the_service_again() {
    let analyzer = FakeAnalyzer::replying("true");
    let mut engine = engine_with(analyzer.clone()).await;
    let mut doc = FakeDocument::with_items(&[SAMPLE_POST]);

    engine.run_cycle(&mut doc, Trigger::Startup).await;
    engine.clear_cache().await;
    assert_eq!(engine.cache_stats().count, 0);

    analyzer.set_reply(Reply::Verdict("false".to_string()));
    let report = engine.reprocess_all(&mut doc).await;

    assert_eq!(report.dispatched, 1);
    assert_eq!(analyzer.calls(), 2);
    assert_eq!(doc.annotation(0).unwrap().0, Category::False);
}

#[tokio::test]
async fn cache_outlives_the_session() {
    let backend = MemoryBackend::new();

    let first = FakeAnalyzer::replying("true");
    let mut engine = engine_on(backend.clone(), first.clone()).await;
    engine
        .run_cycle(&mut FakeDocument::with_items(&[SAMPLE_POST]), Trigger::Startup)
        .await;
    engine.teardown().await;

    let second = FakeAnalyzer::replying("false");
    let mut engine = engine_on(backend, second.clone()).await;
    let mut doc = FakeDocument::with_items(&[SAMPLE_POST]);
    let report = engine.run_cycle(&mut doc, Trigger::Startup).await;

    assert_eq!(report.cache_hits, 1);
    assert_eq!(second.calls(), 0);
    assert_eq!(doc.annotation(0).unwrap().0, Category::True);
}

#[tokio::test]
async fn teardown_after_failed_load_keeps_the_durable_cache() {
    let backend = MemoryBackend::new();
    let first = FakeAnalyzer::replying("true");
    let mut engine = engine_on(backend.clone(), first).await;
    engine
        .run_cycle(&mut FakeDocument::with_items(&[SAMPLE_POST]), Trigger::Startup)
        .await;
    engine.teardown().await;

    // The next session cannot read the cache and ends without new results.
    let flaky = FlakyBackend::over(backend.clone()).fail_next_gets(1);
    let mut engine = Engine::init(
        EngineConfig::default(),
        Box::new(flaky),
        FakeAnalyzer::unreachable(),
    )
    .await;
    assert!(engine.cache().is_empty());
    engine.teardown().await;

    let reloaded = CacheStore::load(Box::new(backend), EngineConfig::default().cache_ttl()).await;
    assert_eq!(reloaded.get(&content_key(SAMPLE_POST)).unwrap().result, "true");
}

// ---------------------------------------------------------------------------
// Triggers
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn mutation_becomes_due_after_the_quiet_period() {
    let analyzer = FakeAnalyzer::replying("true");
    let mut engine = engine_with(analyzer.clone()).await;
    let mut doc = FakeDocument::with_items(&[SAMPLE_POST]);

    assert!(engine.run_pending(&mut doc).await.is_none());

    engine.on_source_mutated();
    tokio::time::advance(Duration::from_millis(300)).await;
    engine.on_source_mutated();
    tokio::time::advance(Duration::from_millis(300)).await;
    assert!(engine.run_pending(&mut doc).await.is_none());

    tokio::time::advance(Duration::from_millis(200)).await;
    let report = engine.run_pending(&mut doc).await.expect("mutation due");
    assert_eq!(report.dispatched, 1);
    assert!(engine.next_deadline().is_none());
}

#[tokio::test(start_paused = true)]
async fn tick_takes_priority_and_absorbs_pending_mutation() {
    let analyzer = FakeAnalyzer::replying("true");
    let mut engine = engine_with(analyzer).await;
    let mut doc = FakeDocument::with_items(&[SAMPLE_POST]);

    engine.on_source_mutated();
    tokio::time::advance(Duration::from_secs(1)).await;
    engine.tick();
    assert_eq!(
        engine.due_trigger(tokio::time::Instant::now()),
        Some(Trigger::Tick)
    );

    engine.run_pending(&mut doc).await.expect("tick due");
    assert!(engine.due_trigger(tokio::time::Instant::now()).is_none());
}

// ---------------------------------------------------------------------------
// Events, status, one-off analysis
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cycle_emits_ordered_events() {
    let analyzer = FakeAnalyzer::replying("true");
    let mut engine = engine_with(analyzer).await;
    let mut rx = engine.subscribe();
    let mut doc = FakeDocument::with_items(&[SAMPLE_POST, SAMPLE_POST]);

    let report = engine.run_cycle(&mut doc, Trigger::Manual).await;

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert!(events.windows(2).all(|w| w[1].seq == w[0].seq + 1));

    let kinds: Vec<_> = events.into_iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds.first(),
        Some(&EventKind::CycleStarted {
            cycle: 1,
            trigger: Trigger::Manual
        })
    );
    assert!(matches!(kinds[1], EventKind::Dispatched { .. }));
    assert!(matches!(
        kinds[2],
        EventKind::Annotated {
            category: Category::True,
            ..
        }
    ));
    assert!(matches!(kinds[3], EventKind::CacheHit { .. }));
    assert!(matches!(kinds[4], EventKind::Annotated { .. }));
    assert_eq!(
        kinds.last(),
        Some(&EventKind::CycleCompleted { cycle: 1, report })
    );
}

#[tokio::test]
async fn cycle_report_serializes_for_supervisors() {
    let report = CycleReport {
        candidates: 3,
        dispatched: 1,
        ..Default::default()
    };
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["candidates"], 3);
    assert_eq!(json["dispatched"], 1);
    assert_eq!(json["cache_hits"], 0);
}

#[tokio::test]
async fn status_reflects_the_session() {
    let analyzer = FakeAnalyzer::replying("true");
    let mut engine = engine_with(analyzer).await;
    let mut doc = FakeDocument::with_items(&[SAMPLE_POST]);

    let before = engine.status();
    assert!(before.active);
    assert_eq!(before.cycles_run, 0);

    engine.run_cycle(&mut doc, Trigger::Startup).await;
    let after = engine.status();
    assert_eq!(after.session, before.session);
    assert_eq!(after.cycles_run, 1);
    assert_eq!(after.finalized, 1);
    assert_eq!(after.cache_entries, 1);
}

#[tokio::test]
async fn analyze_content_goes_through_the_cache() {
    let analyzer = FakeAnalyzer::replying("Expressive False");
    let mut engine = engine_with(analyzer.clone()).await;

    let (first_id, first) = engine.analyze_content(SAMPLE_POST).await;
    let (second_id, second) = engine.analyze_content(SAMPLE_POST).await;

    assert_ne!(first_id, second_id);
    assert_eq!(first.origin, Origin::Remote);
    assert_eq!(second.origin, Origin::Cache);
    assert_eq!(second.category(), Category::ExpressiveFalse);
    assert_eq!(analyzer.calls(), 1);
}

#[tokio::test]
async fn cache_maintenance_emits_events_only_on_change() {
    let analyzer = FakeAnalyzer::replying("true");
    let mut engine = engine_with(analyzer).await;
    let mut rx = engine.subscribe();

    assert_eq!(engine.evict_expired().await, 0);
    assert!(rx.try_recv().is_err());

    engine.clear_cache().await;
    assert_eq!(rx.try_recv().unwrap().kind, EventKind::CacheCleared);
}
