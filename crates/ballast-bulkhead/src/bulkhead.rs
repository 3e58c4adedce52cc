use crate::config::{BulkheadConfig, BulkheadConfigBuilder};
use crate::error::BulkheadError;
use crate::events::BulkheadEvent;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::sync::oneshot;

/// A queued caller. Like the pool's wait queue, fulfillment and timeout are
/// mutually exclusive: a timed-out caller drops its receiver, the handoff
/// send fails, and the slot goes to the next waiter instead.
struct Waiter {
    id: u64,
    tx: oneshot::Sender<()>,
}

struct BulkheadInner {
    available: usize,
    waiters: VecDeque<Waiter>,
    next_waiter_id: u64,
}

struct BulkheadShared {
    config: BulkheadConfig,
    inner: Mutex<BulkheadInner>,
}

impl BulkheadShared {
    fn lock(&self) -> MutexGuard<'_, BulkheadInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn emit(&self, event: BulkheadEvent) {
        self.config.event_listeners.emit(&event);
    }

    /// Returns a slot: hands it to the oldest live waiter, or makes it
    /// available again.
    fn release_slot(&self) {
        let mut inner = self.lock();
        while let Some(waiter) = inner.waiters.pop_front() {
            if waiter.tx.send(()).is_ok() {
                return;
            }
        }
        inner.available = (inner.available + 1).min(self.config.max_concurrent);
    }
}

/// What `acquire` decided under one lock acquisition.
enum Plan {
    Admitted { in_flight: usize },
    Wait(u64, oneshot::Receiver<()>),
    Reject { in_flight: usize },
}

/// A counting semaphore with a bounded FIFO wait queue.
///
/// Cloning is cheap and yields another handle to the same bulkhead.
#[derive(Clone)]
pub struct Bulkhead {
    shared: Arc<BulkheadShared>,
}

impl Bulkhead {
    /// Creates a bulkhead from a finished configuration.
    pub fn new(config: BulkheadConfig) -> Self {
        let available = config.max_concurrent;
        Self {
            shared: Arc::new(BulkheadShared {
                config,
                inner: Mutex::new(BulkheadInner {
                    available,
                    waiters: VecDeque::new(),
                    next_waiter_id: 1,
                }),
            }),
        }
    }

    /// Creates a configuration builder.
    pub fn builder() -> BulkheadConfigBuilder {
        BulkheadConfigBuilder::new()
    }

    /// The bulkhead's configured name.
    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    /// Calls currently holding a slot.
    pub fn in_flight(&self) -> usize {
        let inner = self.shared.lock();
        self.shared.config.max_concurrent - inner.available
    }

    /// Callers currently queued.
    pub fn queued(&self) -> usize {
        self.shared.lock().waiters.len()
    }

    /// Acquires a slot, queuing FIFO when all are taken.
    ///
    /// Fails fast with [`BulkheadError::Full`] when the queue is at
    /// `max_queue_size`; fails with [`BulkheadError::Timeout`] when
    /// `max_wait` elapses first. The returned permit releases its slot on
    /// drop.
    pub async fn acquire(&self) -> Result<BulkheadPermit, BulkheadError> {
        let shared = &self.shared;
        let plan = {
            let mut inner = shared.lock();
            if inner.available > 0 {
                inner.available -= 1;
                Plan::Admitted {
                    in_flight: shared.config.max_concurrent - inner.available,
                }
            } else if inner.waiters.len() >= shared.config.max_queue_size {
                Plan::Reject {
                    in_flight: shared.config.max_concurrent,
                }
            } else {
                let id = inner.next_waiter_id;
                inner.next_waiter_id += 1;
                let (tx, rx) = oneshot::channel();
                inner.waiters.push_back(Waiter { id, tx });
                Plan::Wait(id, rx)
            }
        };

        match plan {
            Plan::Admitted { in_flight } => {
                shared.emit(BulkheadEvent::CallPermitted {
                    pattern_name: shared.config.name.clone(),
                    timestamp: Instant::now(),
                    in_flight,
                });

                #[cfg(feature = "metrics")]
                {
                    counter!("bulkhead_calls_permitted_total", "bulkhead" => shared.config.name.clone())
                        .increment(1);
                    gauge!("bulkhead_in_flight", "bulkhead" => shared.config.name.clone())
                        .set(in_flight as f64);
                }

                Ok(BulkheadPermit::new(Arc::clone(shared)))
            }
            Plan::Reject { in_flight } => {
                shared.emit(BulkheadEvent::CallRejected {
                    pattern_name: shared.config.name.clone(),
                    timestamp: Instant::now(),
                });

                #[cfg(feature = "tracing")]
                tracing::debug!(
                    bulkhead = %shared.config.name,
                    in_flight,
                    "call rejected, wait queue full"
                );

                #[cfg(feature = "metrics")]
                counter!("bulkhead_calls_rejected_total", "bulkhead" => shared.config.name.clone())
                    .increment(1);

                Err(BulkheadError::Full {
                    name: shared.config.name.clone(),
                    in_flight,
                    max_concurrent: shared.config.max_concurrent,
                })
            }
            Plan::Wait(waiter_id, rx) => {
                let admitted = match shared.config.max_wait {
                    Some(limit) => match tokio::time::timeout(limit, rx).await {
                        Ok(result) => result.is_ok(),
                        Err(_) => {
                            {
                                let mut inner = shared.lock();
                                if let Some(pos) =
                                    inner.waiters.iter().position(|w| w.id == waiter_id)
                                {
                                    inner.waiters.remove(pos);
                                }
                            }
                            shared.emit(BulkheadEvent::WaitTimedOut {
                                pattern_name: shared.config.name.clone(),
                                timestamp: Instant::now(),
                                waited: limit,
                            });

                            #[cfg(feature = "metrics")]
                            counter!("bulkhead_wait_timeouts_total", "bulkhead" => shared.config.name.clone())
                                .increment(1);

                            return Err(BulkheadError::Timeout { waited: limit });
                        }
                    },
                    None => rx.await.is_ok(),
                };

                if !admitted {
                    // Sender dropped without a handoff; treat as rejection.
                    return Err(BulkheadError::Full {
                        name: shared.config.name.clone(),
                        in_flight: shared.config.max_concurrent,
                        max_concurrent: shared.config.max_concurrent,
                    });
                }

                shared.emit(BulkheadEvent::CallPermitted {
                    pattern_name: shared.config.name.clone(),
                    timestamp: Instant::now(),
                    in_flight: shared.config.max_concurrent,
                });

                Ok(BulkheadPermit::new(Arc::clone(shared)))
            }
        }
    }

    /// Acquires a slot, runs `op`, and releases the slot afterward.
    pub async fn with_permit<T, F, Fut>(&self, op: F) -> Result<T, BulkheadError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let permit = self.acquire().await?;
        let out = op().await;
        drop(permit);
        Ok(out)
    }
}

impl std::fmt::Debug for Bulkhead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bulkhead")
            .field("name", &self.shared.config.name)
            .field("in_flight", &self.in_flight())
            .field("queued", &self.queued())
            .finish()
    }
}

/// An admitted call's slot. Dropping the permit releases the slot, handing
/// it to the oldest queued caller if any.
pub struct BulkheadPermit {
    shared: Arc<BulkheadShared>,
    acquired_at: Instant,
}

impl BulkheadPermit {
    fn new(shared: Arc<BulkheadShared>) -> Self {
        Self {
            shared,
            acquired_at: Instant::now(),
        }
    }
}

impl Drop for BulkheadPermit {
    fn drop(&mut self) {
        self.shared.release_slot();
        self.shared.emit(BulkheadEvent::CallFinished {
            pattern_name: self.shared.config.name.clone(),
            timestamp: Instant::now(),
            held_for: self.acquired_at.elapsed(),
        });

        #[cfg(feature = "metrics")]
        counter!("bulkhead_calls_finished_total", "bulkhead" => self.shared.config.name.clone())
            .increment(1);
    }
}

impl std::fmt::Debug for BulkheadPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkheadPermit")
            .field("held_for", &self.acquired_at.elapsed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn bulkhead(concurrent: usize, queue: usize) -> Bulkhead {
        Bulkhead::builder()
            .max_concurrent(concurrent)
            .max_queue_size(queue)
            .name("test")
            .build()
    }

    #[tokio::test]
    async fn admits_up_to_limit() {
        let b = bulkhead(2, 1);
        let p1 = b.acquire().await.unwrap();
        let p2 = b.acquire().await.unwrap();
        assert_eq!(b.in_flight(), 2);
        drop(p1);
        assert_eq!(b.in_flight(), 1);
        drop(p2);
        assert_eq!(b.in_flight(), 0);
    }

    #[tokio::test]
    async fn fourth_caller_fails_fast() {
        // 2 running + 1 queued; the next caller is turned away.
        let b = bulkhead(2, 1);
        let _p1 = b.acquire().await.unwrap();
        let _p2 = b.acquire().await.unwrap();

        let b2 = b.clone();
        let queued = tokio::spawn(async move { b2.acquire().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(b.queued(), 1);

        let err = b.acquire().await.unwrap_err();
        assert!(matches!(err, BulkheadError::Full { .. }));

        drop(_p1);
        assert!(queued.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn released_slot_goes_to_oldest_waiter() {
        let b = bulkhead(1, 2);
        let held = b.acquire().await.unwrap();

        let order = Arc::new(Mutex::new(Vec::new()));
        let b1 = b.clone();
        let o1 = Arc::clone(&order);
        let first = tokio::spawn(async move {
            let _p = b1.acquire().await.unwrap();
            o1.lock().unwrap().push(1);
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        let b2 = b.clone();
        let o2 = Arc::clone(&order);
        let second = tokio::spawn(async move {
            let _p = b2.acquire().await.unwrap();
            o2.lock().unwrap().push(2);
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(held);
        first.await.unwrap();
        second.await.unwrap();
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn wait_timeout_removes_waiter() {
        let b = Bulkhead::builder()
            .max_concurrent(1)
            .max_queue_size(4)
            .max_wait(Duration::from_millis(30))
            .name("waity")
            .build();
        let held = b.acquire().await.unwrap();

        let err = b.acquire().await.unwrap_err();
        assert!(matches!(err, BulkheadError::Timeout { .. }));
        assert_eq!(b.queued(), 0, "timed-out waiter removed");

        drop(held);
        assert!(b.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn with_permit_releases_after_op() {
        let b = bulkhead(1, 0);
        let out = b.with_permit(|| async { "done" }).await.unwrap();
        assert_eq!(out, "done");
        assert_eq!(b.in_flight(), 0);
    }

    #[tokio::test]
    async fn zero_queue_rejects_immediately() {
        let b = bulkhead(1, 0);
        let _held = b.acquire().await.unwrap();
        assert!(matches!(
            b.acquire().await,
            Err(BulkheadError::Full { .. })
        ));
    }
}
