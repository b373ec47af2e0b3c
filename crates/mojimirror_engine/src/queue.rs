use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;

use crate::QueueStats;

/// Receives a snapshot on every admission, completion, and limit change.
pub trait QueueObserver: Send + Sync {
    fn on_stats(&self, stats: QueueStats);
}

/// Concurrency-limited scheduler for spawned async work. Admission among
/// waiting tasks is strictly FIFO; completion order is unconstrained, and a
/// failing task never affects its siblings.
pub struct TaskQueue {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<State>,
    idle: Notify,
}

struct State {
    limit: usize,
    active: usize,
    waiters: VecDeque<oneshot::Sender<()>>,
    observer: Option<Arc<dyn QueueObserver>>,
}

impl State {
    fn snapshot(&self) -> QueueStats {
        QueueStats {
            active: self.active,
            pending: self.waiters.len(),
        }
    }

    /// Hand slots to waiters, oldest first, until the limit is reached.
    fn admit_waiters(&mut self) {
        while self.active < self.limit {
            match self.waiters.pop_front() {
                Some(ticket) => {
                    self.active += 1;
                    if ticket.send(()).is_err() {
                        // Receiver vanished; the slot goes to the next waiter.
                        self.active -= 1;
                    }
                }
                None => break,
            }
        }
    }
}

/// Releases one slot when the task finishes, even if it panics.
struct SlotGuard {
    inner: Arc<Inner>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.inner.release();
    }
}

impl TaskQueue {
    pub fn new(limit: usize) -> Self {
        Self::with_observer(limit, None)
    }

    pub fn with_observer(limit: usize, observer: Option<Arc<dyn QueueObserver>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    limit: limit.max(1),
                    active: 0,
                    waiters: VecDeque::new(),
                    observer,
                }),
                idle: Notify::new(),
            }),
        }
    }

    /// Enqueue one unit of work. The handle resolves with that task's own
    /// output once it has been admitted and has run to completion.
    pub fn push<F, T>(&self, task: F) -> JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let ticket = inner.enqueue();
        tokio::spawn(async move {
            if let Some(ticket) = ticket {
                let _ = ticket.await;
            }
            let _slot = SlotGuard {
                inner: Arc::clone(&inner),
            };
            task.await
        })
    }

    /// Change the in-flight cap (clamped to >= 1). Raising the cap admits
    /// queued work immediately.
    pub fn set_concurrency(&self, limit: usize) {
        let (stats, observer) = {
            let mut state = self.inner.state.lock().expect("queue state poisoned");
            state.limit = limit.max(1);
            state.admit_waiters();
            (state.snapshot(), state.observer.clone())
        };
        notify(observer, stats);
    }

    pub fn concurrency(&self) -> usize {
        self.inner.state.lock().expect("queue state poisoned").limit
    }

    pub fn stats(&self) -> QueueStats {
        self.inner
            .state
            .lock()
            .expect("queue state poisoned")
            .snapshot()
    }

    /// Resolves once nothing is running or waiting.
    pub async fn drain(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.inner.is_idle() {
                return;
            }
            notified.await;
        }
    }
}

impl Inner {
    /// Take a slot immediately, or join the FIFO wait line.
    fn enqueue(&self) -> Option<oneshot::Receiver<()>> {
        let (ticket, stats, observer) = {
            let mut state = self.state.lock().expect("queue state poisoned");
            let ticket = if state.active < state.limit && state.waiters.is_empty() {
                state.active += 1;
                None
            } else {
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(tx);
                Some(rx)
            };
            (ticket, state.snapshot(), state.observer.clone())
        };
        notify(observer, stats);
        ticket
    }

    fn release(&self) {
        let (went_idle, stats, observer) = {
            let mut state = self.state.lock().expect("queue state poisoned");
            state.active -= 1;
            state.admit_waiters();
            let went_idle = state.active == 0 && state.waiters.is_empty();
            (went_idle, state.snapshot(), state.observer.clone())
        };
        notify(observer, stats);
        if went_idle {
            self.idle.notify_waiters();
        }
    }

    fn is_idle(&self) -> bool {
        let state = self.state.lock().expect("queue state poisoned");
        state.active == 0 && state.waiters.is_empty()
    }
}

// Observers run outside the state lock so they may call back into the queue.
fn notify(observer: Option<Arc<dyn QueueObserver>>, stats: QueueStats) {
    if let Some(observer) = observer {
        observer.on_stats(stats);
    }
}
