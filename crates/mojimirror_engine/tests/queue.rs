use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mojimirror_engine::{QueueObserver, QueueStats, TaskQueue};

#[derive(Default)]
struct StatsLog {
    snapshots: Mutex<Vec<QueueStats>>,
}

impl QueueObserver for StatsLog {
    fn on_stats(&self, stats: QueueStats) {
        self.snapshots.lock().unwrap().push(stats);
    }
}

#[tokio::test]
async fn admits_waiting_tasks_in_submission_order() {
    let queue = TaskQueue::new(1);
    let order = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = (0..5)
        .map(|id| {
            let order = Arc::clone(&order);
            queue.push(async move {
                order.lock().unwrap().push(id);
                tokio::time::sleep(Duration::from_millis(1)).await;
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn caps_in_flight_work() {
    let queue = TaskQueue::new(3);
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            queue.push(async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= 3);
}

#[tokio::test]
async fn a_panicking_task_does_not_block_siblings() {
    let queue = TaskQueue::new(1);

    let boom = queue.push(async {
        panic!("boom");
    });
    let ok = queue.push(async { 7 });

    assert!(boom.await.is_err());
    assert_eq!(ok.await.unwrap(), 7);
    queue.drain().await;
    assert_eq!(
        queue.stats(),
        QueueStats {
            active: 0,
            pending: 0
        }
    );
}

#[tokio::test]
async fn raising_the_limit_admits_queued_work() {
    let queue = TaskQueue::new(1);
    let (hold_tx, hold_rx) = tokio::sync::oneshot::channel::<()>();

    let first = queue.push(async move {
        let _ = hold_rx.await;
    });
    while queue.stats().active == 0 {
        tokio::task::yield_now().await;
    }

    let started = Arc::new(AtomicUsize::new(0));
    let later: Vec<_> = (0..2)
        .map(|_| {
            let started = Arc::clone(&started);
            queue.push(async move {
                started.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();
    assert_eq!(queue.stats().pending, 2);

    queue.set_concurrency(3);
    for handle in later {
        handle.await.unwrap();
    }
    assert_eq!(started.load(Ordering::SeqCst), 2);

    hold_tx.send(()).unwrap();
    first.await.unwrap();
    queue.drain().await;
}

#[tokio::test]
async fn the_limit_clamps_to_at_least_one() {
    let queue = TaskQueue::new(4);
    queue.set_concurrency(0);
    assert_eq!(queue.concurrency(), 1);
    assert_eq!(TaskQueue::new(0).concurrency(), 1);
}

#[tokio::test]
async fn notifies_the_observer_on_every_transition() {
    let log = Arc::new(StatsLog::default());
    let queue = TaskQueue::with_observer(2, Some(Arc::clone(&log) as Arc<dyn QueueObserver>));

    queue.push(async {}).await.unwrap();
    queue.drain().await;

    let snapshots = log.snapshots.lock().unwrap().clone();
    assert_eq!(
        snapshots.first(),
        Some(&QueueStats {
            active: 1,
            pending: 0
        })
    );
    assert_eq!(
        snapshots.last(),
        Some(&QueueStats {
            active: 0,
            pending: 0
        })
    );
}

#[tokio::test]
async fn drain_resolves_immediately_when_idle() {
    TaskQueue::new(2).drain().await;
}
