//! Notification Dispatcher
//!
//! Decouples the decision loop from message delivery:
//! - `enqueue` is synchronous and never waits on the transport
//! - a bounded buffer evicts the oldest message when full
//! - one background worker drains the buffer in FIFO order
//! - each message gets a fixed number of tries, then is dropped with a log

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::message::{NotificationLevel, NotificationMessage};
use crate::adapters::NotificationTransport;
use crate::config::NotificationConfig;

/// What happened to a message handed to [`NotificationDispatcher::enqueue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Buffered for delivery
    Queued,
    /// Buffered; the oldest buffered message was evicted to make room
    QueuedWithEviction,
    /// Below the configured level; discarded without using a slot
    Filtered,
    /// No transport configured
    Disabled,
    /// Dispatcher is shutting down
    Closed,
}

impl EnqueueOutcome {
    pub fn is_queued(&self) -> bool {
        matches!(self, EnqueueOutcome::Queued | EnqueueOutcome::QueuedWithEviction)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatcherStats {
    pub enqueued: u64,
    pub filtered: u64,
    pub evicted: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub pending: usize,
}

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    filtered: AtomicU64,
    evicted: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

struct Shared {
    queue: Mutex<VecDeque<NotificationMessage>>,
    wake: Notify,
    closing: AtomicBool,
    counters: Counters,
}

impl Shared {
    fn lock_queue(&self) -> std::sync::MutexGuard<'_, VecDeque<NotificationMessage>> {
        // The queue holds plain data; a panic mid-push leaves it consistent
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn pop(&self) -> Option<NotificationMessage> {
        self.lock_queue().pop_front()
    }
}

/// Bounded, non-blocking notification dispatcher with one delivery worker
pub struct NotificationDispatcher {
    config: NotificationConfig,
    level: NotificationLevel,
    transport: Option<Arc<dyn NotificationTransport>>,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl NotificationDispatcher {
    /// Create a dispatcher. The worker is not running until [`start`](Self::start).
    pub fn new(config: NotificationConfig, transport: Option<Arc<dyn NotificationTransport>>) -> Self {
        let capacity = config.capacity.max(1);
        Self {
            level: config.level,
            config,
            transport,
            shared: Arc::new(Shared {
                queue: Mutex::new(VecDeque::with_capacity(capacity)),
                wake: Notify::new(),
                closing: AtomicBool::new(false),
                counters: Counters::default(),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Dispatcher that discards everything (no transport)
    pub fn disabled() -> Self {
        Self::new(NotificationConfig::default(), None)
    }

    pub fn level(&self) -> NotificationLevel {
        self.level
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity.max(1)
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    /// Spawn the delivery worker on the current tokio runtime. Idempotent.
    pub fn start(&self) {
        let Some(transport) = self.transport.clone() else {
            debug!("Notification dispatcher has no transport; worker not started");
            return;
        };

        let mut worker = self.worker.lock().unwrap_or_else(|p| p.into_inner());
        if worker.is_some() {
            return;
        }

        let shared = self.shared.clone();
        let max_retries = self.config.max_retries.max(1);
        let retry_delay = self.config.retry_delay();
        info!(
            "Notification worker started (transport={}, level={}, capacity={})",
            transport.name(),
            self.level,
            self.capacity()
        );
        *worker = Some(tokio::spawn(run_worker(shared, transport, max_retries, retry_delay)));
    }

    /// Buffer a message for delivery. Never blocks on delivery.
    pub fn enqueue(&self, message: NotificationMessage) -> EnqueueOutcome {
        if self.transport.is_none() {
            debug!("Notification {:?} discarded: no transport", message.kind);
            return EnqueueOutcome::Disabled;
        }

        if !self.level.admits(message.level) {
            self.shared.counters.filtered.fetch_add(1, Ordering::Relaxed);
            debug!(
                "Notification {:?} filtered (level {} < {})",
                message.kind, message.level, self.level
            );
            return EnqueueOutcome::Filtered;
        }

        if self.shared.closing.load(Ordering::SeqCst) {
            debug!("Notification {:?} discarded: dispatcher closing", message.kind);
            return EnqueueOutcome::Closed;
        }

        let evicted = {
            let mut queue = self.shared.lock_queue();
            let evicted = if queue.len() >= self.capacity() {
                queue.pop_front()
            } else {
                None
            };
            queue.push_back(message);
            evicted
        };

        self.shared.counters.enqueued.fetch_add(1, Ordering::Relaxed);
        self.shared.wake.notify_one();

        match evicted {
            Some(old) => {
                self.shared.counters.evicted.fetch_add(1, Ordering::Relaxed);
                warn!("Notification queue full - evicted oldest {:?} message", old.kind);
                EnqueueOutcome::QueuedWithEviction
            }
            None => EnqueueOutcome::Queued,
        }
    }

    /// Messages currently buffered, oldest first
    pub fn pending(&self) -> Vec<NotificationMessage> {
        self.shared.lock_queue().iter().cloned().collect()
    }

    pub fn stats(&self) -> DispatcherStats {
        let c = &self.shared.counters;
        DispatcherStats {
            enqueued: c.enqueued.load(Ordering::Relaxed),
            filtered: c.filtered.load(Ordering::Relaxed),
            evicted: c.evicted.load(Ordering::Relaxed),
            delivered: c.delivered.load(Ordering::Relaxed),
            dropped: c.dropped.load(Ordering::Relaxed),
            pending: self.shared.lock_queue().len(),
        }
    }

    /// Stop accepting messages and give the worker the configured grace
    /// period to flush what is buffered (one try each, no retry).
    pub async fn shutdown(&self) {
        self.shutdown_with_grace(self.config.shutdown_grace()).await
    }

    pub async fn shutdown_with_grace(&self, grace: Duration) {
        if self.shared.closing.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.wake.notify_one();

        let handle = self
            .worker
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        let Some(mut handle) = handle else {
            return;
        };

        match tokio::time::timeout(grace, &mut handle).await {
            Ok(Ok(())) => info!("Notification worker flushed and stopped"),
            Ok(Err(e)) => error!("Notification worker ended abnormally: {}", e),
            Err(_) => {
                handle.abort();
                let left = self.shared.lock_queue().len();
                warn!(
                    "Notification flush exceeded {:?} grace; {} message(s) discarded",
                    grace, left
                );
            }
        }
    }
}

async fn run_worker(
    shared: Arc<Shared>,
    transport: Arc<dyn NotificationTransport>,
    max_retries: u32,
    retry_delay: Duration,
) {
    loop {
        match shared.pop() {
            Some(message) => {
                let tries = if shared.closing.load(Ordering::SeqCst) {
                    1
                } else {
                    max_retries
                };
                deliver(&shared, transport.as_ref(), &message, tries, retry_delay).await;
            }
            None => {
                if shared.closing.load(Ordering::SeqCst) {
                    break;
                }
                shared.wake.notified().await;
            }
        }
    }
    debug!("Notification worker exiting");
}

async fn deliver(
    shared: &Shared,
    transport: &dyn NotificationTransport,
    message: &NotificationMessage,
    tries: u32,
    retry_delay: Duration,
) {
    let text = message.render();

    for attempt in 1..=tries {
        match transport.send(&text).await {
            Ok(()) => {
                shared.counters.delivered.fetch_add(1, Ordering::Relaxed);
                debug!("{:?} notification delivered via {}", message.kind, transport.name());
                return;
            }
            Err(e) => {
                warn!(
                    "{} send error (attempt {}/{}): {}",
                    transport.name(),
                    attempt,
                    tries,
                    e
                );
            }
        }
        if attempt < tries {
            tokio::time::sleep(retry_delay).await;
        }
    }

    shared.counters.dropped.fetch_add(1, Ordering::Relaxed);
    error!(
        "{}: failed to send {:?} notification after {} attempts",
        transport.name(),
        message.kind,
        tries
    );
}
