//! Fair queue pool — dual-queue scheduling of fresh and retried work.
//!
//! Two FIFO queues (fresh work and retry work) are multiplexed by a
//! weighted [`FairScheduler`](crate::fairness::FairScheduler) so retries
//! cannot starve fresh work and vice versa. The pool tracks popped but
//! unacknowledged items per queue, which is what makes
//! [`drain_and_wait`](FairQueuePool::drain_and_wait) a true barrier.

use crate::config::QueueConfig;
use crate::fairness::FairScheduler;
use crate::unit::TransferUnit;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Index of the fresh-work queue
const FRESH: usize = 0;
/// Index of the retry queue
const RETRY: usize = 1;

/// Which of the pool's two queues an operation targets
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueKind {
    /// Work discovered by the tree walker, attempted for the first time
    Fresh,
    /// Work re-enqueued after a failed attempt
    Retry,
}

impl QueueKind {
    fn index(self) -> usize {
        match self {
            QueueKind::Fresh => FRESH,
            QueueKind::Retry => RETRY,
        }
    }

    fn from_index(index: usize) -> Self {
        if index == FRESH {
            QueueKind::Fresh
        } else {
            QueueKind::Retry
        }
    }
}

/// One FIFO work queue plus its in-flight bookkeeping
struct WorkQueue {
    items: Mutex<VecDeque<TransferUnit>>,
    /// Popped but not yet acknowledged items
    in_flight: AtomicUsize,
    /// Set once the queue will never receive another item from its
    /// producer side
    closed: AtomicBool,
}

impl WorkQueue {
    fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            in_flight: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    fn push(&self, unit: TransferUnit) {
        self.items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(unit);
    }

    /// Pop one unit, transferring ownership to the caller. The in-flight
    /// count is raised before the queue lock is released so the item is
    /// never invisible to the drain barrier.
    fn try_pop(&self) -> Option<TransferUnit> {
        let mut items = self
            .items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let unit = items.pop_front();
        if unit.is_some() {
            self.in_flight.fetch_add(1, Ordering::SeqCst);
        }
        unit
    }

    fn pending(&self) -> usize {
        self.items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    fn is_idle(&self) -> bool {
        self.pending() == 0 && self.in_flight.load(Ordering::SeqCst) == 0
    }
}

/// Dual-queue pool with weighted-fair service and a drain barrier.
///
/// Constructed once at startup with fixed weights; torn down when both
/// queues report zero pending and zero in-flight items.
pub struct FairQueuePool {
    queues: [WorkQueue; 2],
    /// Fairness token ring plus the monotonic retirement marker; a single
    /// mutex guards both so two workers cannot retire queues concurrently.
    scheduler: Mutex<FairScheduler>,
    /// Woken on acknowledgments and closures so the drain barrier can
    /// re-check its condition.
    progress: tokio::sync::Notify,
    pop_timeout: Duration,
    poll_interval: Duration,
}

impl FairQueuePool {
    /// Build a pool from queue configuration (weights and pop cadence).
    pub fn new(config: &QueueConfig) -> Self {
        Self {
            queues: [WorkQueue::new(), WorkQueue::new()],
            scheduler: Mutex::new(FairScheduler::new(&[
                config.fresh_weight,
                config.retry_weight,
            ])),
            progress: tokio::sync::Notify::new(),
            pop_timeout: config.pop_timeout,
            poll_interval: config.poll_interval,
        }
    }

    /// Push a newly discovered unit onto the fresh queue. Never blocks.
    pub fn enqueue_fresh(&self, unit: TransferUnit) {
        self.queues[FRESH].push(unit);
    }

    /// Push a failed unit onto the retry queue. Never blocks.
    pub fn enqueue_retry(&self, unit: TransferUnit) {
        self.queues[RETRY].push(unit);
    }

    /// Record that discovery has finished: the fresh queue will never
    /// receive another item.
    pub fn close_fresh(&self) {
        self.queues[FRESH].closed.store(true, Ordering::SeqCst);
        self.progress.notify_waiters();
    }

    /// Decide which queue the given worker should poll next.
    ///
    /// Draws one token from the weighted ring. A queue that is both
    /// closed upstream and currently empty is retired (monotonically,
    /// under the pool's single scheduler mutex) and a replacement token
    /// drawn, so drained queues stop consuming service decisions.
    pub fn next_queue_for(&self, worker_id: usize) -> QueueKind {
        let mut scheduler = self
            .scheduler
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        for _ in 0..self.queues.len() {
            let index = scheduler.next();
            let queue = &self.queues[index];
            if queue.closed.load(Ordering::SeqCst) && queue.pending() == 0 {
                if scheduler.mark_exhausted(index) {
                    tracing::debug!(worker_id, queue = index, "queue retired from fair rotation");
                }
                continue;
            }
            return QueueKind::from_index(index);
        }

        // Every queue is retired; hand back the retry index so the worker
        // keeps polling (pops will time out while the pool drains).
        QueueKind::from_index(RETRY)
    }

    /// Pop one unit from the given queue, waiting at most the configured
    /// pop timeout. A transiently empty queue is re-polled on a short
    /// interval rather than blocking the pool.
    pub async fn pop(&self, kind: QueueKind) -> Option<TransferUnit> {
        let deadline = tokio::time::Instant::now() + self.pop_timeout;
        loop {
            if let Some(unit) = self.queues[kind.index()].try_pop() {
                return Some(unit);
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Acknowledge completion of a previously popped unit, releasing it
    /// from the queue's in-flight count. Any retry re-enqueue must happen
    /// before the ack so the barrier never observes a gap.
    pub fn ack(&self, kind: QueueKind) {
        self.queues[kind.index()]
            .in_flight
            .fetch_sub(1, Ordering::SeqCst);
        self.progress.notify_waiters();
    }

    /// Number of queued items in a queue (excluding in-flight ones).
    pub fn pending(&self, kind: QueueKind) -> usize {
        self.queues[kind.index()].pending()
    }

    /// Number of popped but unacknowledged items in a queue.
    pub fn in_flight(&self, kind: QueueKind) -> usize {
        self.queues[kind.index()].in_flight.load(Ordering::SeqCst)
    }

    fn is_drained(&self) -> bool {
        self.queues[FRESH].closed.load(Ordering::SeqCst)
            && self.queues.iter().all(WorkQueue::is_idle)
    }

    /// Block until every queue has zero pending and zero unacknowledged
    /// items (and discovery has finished feeding the fresh queue).
    ///
    /// This is the pool's join/barrier: a worker re-enqueueing a retry
    /// does so while still holding its in-flight slot, so the condition
    /// cannot flicker true mid-handoff.
    pub async fn drain_and_wait(&self) {
        loop {
            let notified = self.progress.notified();
            tokio::pin!(notified);
            // Register interest before checking, so the final ack cannot
            // slip between the check and the await.
            notified.as_mut().enable();
            if self.is_drained() {
                return;
            }
            notified.await;
        }
    }
}
