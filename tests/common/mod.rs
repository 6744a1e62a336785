//! Shared fakes for integration tests: an in-memory document, a scripted
//! analyzer, and a backend that always fails.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use verdict_rs::analyzer::Analyzer;
use verdict_rs::cache::{CacheBackend, MemoryBackend};
use verdict_rs::config::EngineConfig;
use verdict_rs::document::{AnnotationSink, Document};
use verdict_rs::engine::Engine;
use verdict_rs::error::{Error, Result};
use verdict_rs::model::{Category, ItemIdentity};

pub const SAMPLE_POST: &str = "This is a sample post with enough length";

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct FakeItem {
    /// `None` makes extraction fail.
    content: Option<String>,
    non_primary: bool,
}

#[derive(Debug, Default)]
struct DocState {
    items: Vec<FakeItem>,
    markers: HashMap<usize, ItemIdentity>,
    annotations: HashMap<usize, (Category, String)>,
    fail_annotate: bool,
    fail_list: bool,
    annotate_calls: usize,
}

/// In-memory document whose nodes are indices. Clones share state, so a
/// test can keep a handle while the engine or control loop owns another.
#[derive(Debug, Clone, Default)]
pub struct FakeDocument {
    state: Arc<Mutex<DocState>>,
}

impl FakeDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(contents: &[&str]) -> Self {
        let doc = Self::new();
        for content in contents {
            doc.push(content);
        }
        doc
    }

    fn add(&self, content: Option<&str>, non_primary: bool) -> usize {
        let mut state = self.state.lock().unwrap();
        state.items.push(FakeItem {
            content: content.map(str::to_string),
            non_primary,
        });
        state.items.len() - 1
    }

    pub fn push(&self, content: &str) -> usize {
        self.add(Some(content), false)
    }

    pub fn push_comment(&self, content: &str) -> usize {
        self.add(Some(content), true)
    }

    /// A node whose content cannot be extracted.
    pub fn push_broken(&self) -> usize {
        self.add(None, false)
    }

    pub fn set_fail_annotate(&self, fail: bool) {
        self.state.lock().unwrap().fail_annotate = fail;
    }

    pub fn set_fail_list(&self, fail: bool) {
        self.state.lock().unwrap().fail_list = fail;
    }

    pub fn annotation(&self, node: usize) -> Option<(Category, String)> {
        self.state.lock().unwrap().annotations.get(&node).cloned()
    }

    pub fn annotated_count(&self) -> usize {
        self.state.lock().unwrap().annotations.len()
    }

    pub fn annotate_calls(&self) -> usize {
        self.state.lock().unwrap().annotate_calls
    }

    pub fn marker(&self, node: usize) -> Option<ItemIdentity> {
        self.state.lock().unwrap().markers.get(&node).cloned()
    }
}

impl Document for FakeDocument {
    type Node = usize;

    fn list_candidates(&self) -> Result<Vec<usize>> {
        let state = self.state.lock().unwrap();
        if state.fail_list {
            return Err(Error::Extraction("document unavailable".to_string()));
        }
        Ok((0..state.items.len()).collect())
    }

    fn extract_content(&self, node: &usize) -> Result<String> {
        self.state.lock().unwrap().items[*node]
            .content
            .clone()
            .ok_or_else(|| Error::Extraction(format!("node {node} has no text")))
    }

    fn is_non_primary(&self, node: &usize) -> bool {
        self.state.lock().unwrap().items[*node].non_primary
    }

    fn identity_marker(&self, node: &usize) -> Option<ItemIdentity> {
        self.marker(*node)
    }

    fn set_identity_marker(&mut self, node: &usize, identity: &ItemIdentity) {
        self.state
            .lock()
            .unwrap()
            .markers
            .insert(*node, identity.clone());
    }
}

impl AnnotationSink for FakeDocument {
    fn annotate(
        &mut self,
        node: &usize,
        _identity: &ItemIdentity,
        category: Category,
        raw_result: &str,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.annotate_calls += 1;
        if state.fail_annotate {
            return Err(Error::Other("node detached".to_string()));
        }
        state
            .annotations
            .insert(*node, (category, raw_result.to_string()));
        Ok(())
    }

    fn has_annotation(&self, node: &usize) -> bool {
        self.state.lock().unwrap().annotations.contains_key(node)
    }

    fn clear_annotation(&mut self, node: &usize) -> Result<()> {
        self.state.lock().unwrap().annotations.remove(node);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Reply {
    Verdict(String),
    Unreachable,
    Broken,
}

/// Scripted analysis service that records what it was asked.
#[derive(Debug)]
pub struct FakeAnalyzer {
    reply: Mutex<Reply>,
    calls: AtomicUsize,
    requests: Mutex<Vec<(String, ItemIdentity)>>,
}

impl FakeAnalyzer {
    pub fn replying(verdict: &str) -> Arc<Self> {
        Self::with_reply(Reply::Verdict(verdict.to_string()))
    }

    pub fn unreachable() -> Arc<Self> {
        Self::with_reply(Reply::Unreachable)
    }

    pub fn broken() -> Arc<Self> {
        Self::with_reply(Reply::Broken)
    }

    fn with_reply(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply: Mutex::new(reply),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn set_reply(&self, reply: Reply) {
        *self.reply.lock().unwrap() = reply;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<(String, ItemIdentity)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Analyzer for FakeAnalyzer {
    async fn analyze(&self, content: &str, identity: &ItemIdentity) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap()
            .push((content.to_string(), identity.clone()));
        match self.reply.lock().unwrap().clone() {
            Reply::Verdict(verdict) => Ok(verdict),
            Reply::Unreachable => Err(Error::RemoteUnreachable("connection refused".to_string())),
            Reply::Broken => Err(Error::Analysis("unexpected payload".to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Backends and engines
// ---------------------------------------------------------------------------

/// Backend whose every operation fails.
#[derive(Debug, Default)]
pub struct FailingBackend;

#[async_trait]
impl CacheBackend for FailingBackend {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(Error::Persistence("storage offline".to_string()))
    }

    async fn put(&self, _key: &str, _value: &str) -> Result<()> {
        Err(Error::Persistence("storage offline".to_string()))
    }

    async fn remove(&self, _key: &str) -> Result<()> {
        Err(Error::Persistence("storage offline".to_string()))
    }
}

/// Memory backend whose next `get`s and `put`s fail a set number of times.
#[derive(Debug, Default)]
pub struct FlakyBackend {
    inner: MemoryBackend,
    failing_gets: AtomicUsize,
    failing_puts: AtomicUsize,
}

impl FlakyBackend {
    pub fn over(inner: MemoryBackend) -> Self {
        Self {
            inner,
            ..Default::default()
        }
    }

    pub fn fail_next_gets(self, n: usize) -> Self {
        self.failing_gets.store(n, Ordering::SeqCst);
        self
    }

    pub fn fail_next_puts(self, n: usize) -> Self {
        self.failing_puts.store(n, Ordering::SeqCst);
        self
    }
}

fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl CacheBackend for FlakyBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        if take_failure(&self.failing_gets) {
            return Err(Error::Persistence("connection reset".to_string()));
        }
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        if take_failure(&self.failing_puts) {
            return Err(Error::Persistence("connection reset".to_string()));
        }
        self.inner.put(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.inner.remove(key).await
    }
}

pub async fn engine_with(analyzer: Arc<FakeAnalyzer>) -> Engine {
    engine_on(MemoryBackend::new(), analyzer).await
}

pub async fn engine_on(backend: MemoryBackend, analyzer: Arc<FakeAnalyzer>) -> Engine {
    Engine::init(EngineConfig::default(), Box::new(backend), analyzer).await
}
