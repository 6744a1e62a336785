//! Control loop: owns the engine and its document, turns timers, mutation
//! signals, and supervisor commands into cycles.
//!
//! Everything runs on one task. A cycle is awaited inline, so signals that
//! arrive meanwhile wait their turn: mutation notifications collapse into a
//! single stored permit, ticks are delayed, commands queue in the channel.

use std::sync::Arc;
use tokio::sync::{Notify, mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep, sleep_until};
use tracing::{debug, info};

use super::cycle::{CycleReport, Engine, Trigger};
use crate::document::AnnotationSink;
use crate::error::{Error, Result};
use crate::model::{CacheStats, Status};

const COMMAND_CAPACITY: usize = 16;

/// Requests a supervisor can make of a running loop.
#[derive(Debug)]
pub enum Command {
    CacheStats(oneshot::Sender<CacheStats>),
    ClearCache(oneshot::Sender<()>),
    ReprocessAll(oneshot::Sender<CycleReport>),
    Status(oneshot::Sender<Status>),
}

/// Cloneable handle to a running [`ControlLoop`].
#[derive(Clone)]
pub struct ControlHandle {
    commands: mpsc::Sender<Command>,
    mutations: Arc<Notify>,
    shutdown: Arc<Notify>,
}

impl ControlHandle {
    /// Tell the loop the watched source changed. Cheap; call freely.
    pub fn source_mutated(&self) {
        self.mutations.notify_one();
    }

    /// Stop after the current cycle. The cache is persisted on the way out.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    pub async fn cache_stats(&self) -> Result<CacheStats> {
        self.request(Command::CacheStats).await
    }

    pub async fn clear_cache(&self) -> Result<()> {
        self.request(Command::ClearCache).await
    }

    pub async fn reprocess_all(&self) -> Result<CycleReport> {
        self.request(Command::ReprocessAll).await
    }

    pub async fn status(&self) -> Result<Status> {
        self.request(Command::Status).await
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| Error::Other("control loop is not running".to_string()))?;
        rx.await
            .map_err(|_| Error::Other("control loop dropped the request".to_string()))
    }
}

pub struct ControlLoop<D> {
    engine: Engine,
    document: D,
    commands: mpsc::Receiver<Command>,
    handle: ControlHandle,
}

impl<D> ControlLoop<D>
where
    D: AnnotationSink + Send,
    D::Node: Send + Sync,
{
    pub fn new(engine: Engine, document: D) -> (Self, ControlHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
        let handle = ControlHandle {
            commands: tx,
            mutations: Arc::new(Notify::new()),
            shutdown: Arc::new(Notify::new()),
        };
        let control = Self {
            engine,
            document,
            commands: rx,
            handle: handle.clone(),
        };
        (control, handle)
    }

    /// Run until [`ControlHandle::shutdown`]. Hands the engine and document
    /// back afterwards.
    pub async fn run(self) -> (Engine, D) {
        let ControlLoop {
            mut engine,
            mut document,
            mut commands,
            handle,
        } = self;

        let config = engine.config().clone();
        let now = Instant::now();

        let startup = sleep(config.warmup());
        tokio::pin!(startup);
        let mut started = false;

        let mut ticker = interval_at(now + config.tick_interval(), config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut eviction =
            interval_at(now + config.eviction_interval(), config.eviction_interval());
        eviction.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("control loop started");

        loop {
            let debounce_deadline = engine.next_deadline();

            tokio::select! {
                biased;

                _ = handle.shutdown.notified() => {
                    info!("control loop shutting down");
                    break;
                }
                Some(command) = commands.recv() => {
                    handle_command(&mut engine, &mut document, command).await;
                }
                _ = &mut startup, if !started => {
                    started = true;
                    engine.run_cycle(&mut document, Trigger::Startup).await;
                }
                _ = handle.mutations.notified() => {
                    debug!("source mutated");
                    engine.on_source_mutated();
                }
                _ = sleep_until(debounce_deadline.unwrap_or(now)), if debounce_deadline.is_some() => {
                    engine.run_pending(&mut document).await;
                }
                _ = ticker.tick() => {
                    engine.tick();
                    engine.run_pending(&mut document).await;
                }
                _ = eviction.tick() => {
                    engine.evict_expired().await;
                }
            }
        }

        engine.teardown().await;
        (engine, document)
    }
}

async fn handle_command<D: AnnotationSink>(engine: &mut Engine, document: &mut D, command: Command) {
    // A dropped receiver means the requester gave up; nothing to do.
    match command {
        Command::CacheStats(reply) => {
            let _ = reply.send(engine.cache_stats());
        }
        Command::ClearCache(reply) => {
            engine.clear_cache().await;
            let _ = reply.send(());
        }
        Command::ReprocessAll(reply) => {
            let report = engine.reprocess_all(document).await;
            let _ = reply.send(report);
        }
        Command::Status(reply) => {
            let _ = reply.send(engine.status());
        }
    }
}
