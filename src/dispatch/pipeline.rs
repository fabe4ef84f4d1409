//! Asynchronous dispatch with unbounded retry.
//!
//! ```text
//! submit -> dispatch queue -> sender loop -> worker -> sink
//!                ^                 |            |
//!                |            (denied)      (failed)
//!                |                 v            v
//!                +---- forwarder <---- retry queue
//! ```
//!
//! Every pending entry carries an occupancy permit, so the number of entries
//! across both queues and the workers never exceeds `queue_capacity`. Both
//! queues are sized to that capacity, which keeps every internal hop from
//! blocking on a full queue.

use super::limiter::{AdmissionLimiter, AdmissionToken};
use crate::blockchain::{Transaction, TxHash};
use crate::error::{GatewayError, Result};
use crate::metrics::GatewayStats;
use crate::network::TransactionSink;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore, TryAcquireError, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};

/// A warning is logged each time an entry's attempt count hits a multiple of this.
pub const RETRY_WARN_INTERVAL: u64 = 100;

/// Upper bound on worker tasks.
pub const MAX_WORKERS: usize = 65_536;

/// Upper bound on entries held by one pipeline.
pub const MAX_QUEUE_CAPACITY: usize = Semaphore::MAX_PERMITS;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub queue_capacity: usize,
    pub workers: usize,
    /// Pause after a denied admission.
    pub backoff: Duration,
}

impl PipelineOptions {
    pub fn for_limiter(capacity: usize) -> Self {
        Self {
            queue_capacity: capacity.saturating_mul(10_000).min(MAX_QUEUE_CAPACITY),
            workers: capacity.min(MAX_WORKERS),
            backoff: Duration::from_millis(100),
        }
    }
}

struct PendingEntry {
    tx: Transaction,
    hash: TxHash,
    attempts: u64,
    _slot: OwnedSemaphorePermit,
}

struct Job {
    entry: PendingEntry,
    token: AdmissionToken,
}

/// Owns the dispatch and retry queues and the tasks that drain them.
pub struct Dispatcher {
    dispatch_tx: mpsc::Sender<PendingEntry>,
    occupancy: Arc<Semaphore>,
    queue_capacity: usize,
    limiter: Arc<AdmissionLimiter>,
    stats: Arc<GatewayStats>,
    shutdown: watch::Sender<bool>,
    closed: AtomicBool,
    tasks: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Spawns the sender loop, the retry forwarder and the worker pool.
    pub fn start(
        sink: Arc<dyn TransactionSink>,
        limiter: Arc<AdmissionLimiter>,
        stats: Arc<GatewayStats>,
        options: PipelineOptions,
    ) -> Self {
        let queue_capacity = options.queue_capacity.clamp(1, MAX_QUEUE_CAPACITY);
        let workers = options.workers.clamp(1, MAX_WORKERS);

        let (dispatch_tx, dispatch_rx) = mpsc::channel(queue_capacity);
        let (retry_tx, retry_rx) = mpsc::channel(queue_capacity);
        let (jobs_tx, jobs_rx) = mpsc::channel(workers);
        let (shutdown, _) = watch::channel(false);

        let mut tasks = Vec::with_capacity(workers + 2);
        tasks.push(tokio::spawn(sender_loop(
            dispatch_rx,
            retry_tx.clone(),
            jobs_tx,
            limiter.clone(),
            stats.clone(),
            options.backoff,
            shutdown.subscribe(),
        )));
        tasks.push(tokio::spawn(retry_forwarder(
            retry_rx,
            dispatch_tx.clone(),
            shutdown.subscribe(),
        )));

        let jobs_rx = Arc::new(Mutex::new(jobs_rx));
        for id in 0..workers {
            tasks.push(tokio::spawn(worker_loop(
                id,
                jobs_rx.clone(),
                sink.clone(),
                retry_tx.clone(),
                stats.clone(),
                shutdown.subscribe(),
            )));
        }

        info!(
            "dispatch pipeline started: {} workers, queue capacity {}, limiter {}",
            workers,
            queue_capacity,
            limiter.capacity()
        );

        Self {
            dispatch_tx,
            occupancy: Arc::new(Semaphore::new(queue_capacity)),
            queue_capacity,
            limiter,
            stats,
            shutdown,
            closed: AtomicBool::new(false),
            tasks: parking_lot::Mutex::new(tasks),
        }
    }

    /// Enqueues `tx` and returns its locally computed hash. Never waits.
    pub fn submit(&self, tx: Transaction) -> Result<TxHash> {
        if self.is_closed() {
            return Err(GatewayError::PipelineClosed);
        }
        let hash = tx.hash()?;
        let slot = self
            .occupancy
            .clone()
            .try_acquire_owned()
            .map_err(|e| match e {
                TryAcquireError::NoPermits => GatewayError::QueueFull,
                TryAcquireError::Closed => GatewayError::PipelineClosed,
            })?;

        let entry = PendingEntry {
            tx,
            hash,
            attempts: 0,
            _slot: slot,
        };
        self.dispatch_tx.try_send(entry).map_err(|e| match e {
            TrySendError::Full(_) => GatewayError::QueueFull,
            TrySendError::Closed(_) => GatewayError::PipelineClosed,
        })?;

        self.stats.record_accepted();
        debug!("queued {}", hash);
        Ok(hash)
    }

    /// Stops the loops and the limiter. Entries still queued are dropped;
    /// sends already in progress run to completion. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.limiter.close();
        self.occupancy.close();
        self.shutdown.send_replace(true);
        info!(
            "dispatch pipeline closed with {} entries pending",
            self.pending()
        );
    }

    /// Closes and waits for every pipeline task to exit.
    pub async fn shutdown(&self) {
        self.close();
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                error!("dispatch task ended abnormally: {}", e);
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Entries currently queued or in flight.
    pub fn pending(&self) -> usize {
        self.queue_capacity - self.occupancy.available_permits()
    }

    pub fn limiter(&self) -> &Arc<AdmissionLimiter> {
        &self.limiter
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.close();
    }
}

async fn sender_loop(
    mut dispatch_rx: mpsc::Receiver<PendingEntry>,
    retry_tx: mpsc::Sender<PendingEntry>,
    jobs_tx: mpsc::Sender<Job>,
    limiter: Arc<AdmissionLimiter>,
    stats: Arc<GatewayStats>,
    backoff: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let entry = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            entry = dispatch_rx.recv() => match entry {
                Some(entry) => entry,
                None => break,
            },
        };

        match limiter.try_admit() {
            Some(token) => {
                let job = Job { entry, token };
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    sent = jobs_tx.send(job) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
            None => {
                stats.record_admission_denied();
                if retry_tx.send(entry).await.is_err() {
                    break;
                }
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    _ = sleep(backoff) => {}
                }
            }
        }
    }
    debug!("sender loop stopped");
}

async fn retry_forwarder(
    mut retry_rx: mpsc::Receiver<PendingEntry>,
    dispatch_tx: mpsc::Sender<PendingEntry>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let entry = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            entry = retry_rx.recv() => match entry {
                Some(entry) => entry,
                None => break,
            },
        };
        if dispatch_tx.send(entry).await.is_err() {
            break;
        }
    }
    debug!("retry forwarder stopped");
}

async fn worker_loop(
    id: usize,
    jobs: Arc<Mutex<mpsc::Receiver<Job>>>,
    sink: Arc<dyn TransactionSink>,
    retry_tx: mpsc::Sender<PendingEntry>,
    stats: Arc<GatewayStats>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let job = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            job = async { jobs.lock().await.recv().await } => match job {
                Some(job) => job,
                None => break,
            },
        };

        let Job { mut entry, token } = job;
        entry.attempts += 1;
        let outcome = sink.deliver(&entry.tx).await;
        drop(token);

        match outcome {
            Ok(reply) if reply.is_ok => {
                stats.record_delivered();
                debug!("worker {} delivered {} after {} attempts", id, entry.hash, entry.attempts);
                continue;
            }
            Ok(reply) => {
                stats.record_rejected();
                debug!("worker {}: {} rejected: {}", id, entry.hash, reply.message());
            }
            Err(GatewayError::PoolClosed(endpoint)) => {
                stats.record_dropped();
                debug!("worker {}: dropping {}, pool {} closed", id, entry.hash, endpoint);
                continue;
            }
            Err(e) if e.is_retryable() => {
                stats.record_transport_error();
                debug!("worker {}: {} not sent: {}", id, entry.hash, e);
            }
            Err(e) => {
                stats.record_transport_error();
                warn!("worker {}: {} failed unexpectedly: {}", id, entry.hash, e);
            }
        }

        if entry.attempts % RETRY_WARN_INTERVAL == 0 {
            warn!(
                "{} still undelivered after {} attempts",
                entry.hash, entry.attempts
            );
        }
        stats.record_requeued(entry.attempts);
        if retry_tx.send(entry).await.is_err() {
            stats.record_dropped();
        }
    }
    debug!("worker {} stopped", id);
}
