use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::queue::TaskQueue;
use crate::QueueStats;

/// Bounds and heuristics for one adaptively throttled queue.
#[derive(Debug, Clone)]
pub struct ThrottleSettings {
    pub min: usize,
    pub max: usize,
    pub increase_step: usize,
    pub decrease_step: usize,
    pub decrease_ratio: f64,
    pub low_latency: Duration,
    pub high_latency: Duration,
    pub max_error_rate_for_increase: f64,
    pub high_error_rate_for_decrease: f64,
    pub pending_pressure: usize,
    pub sample_window: usize,
    pub min_samples: usize,
    pub cooldown: Duration,
}

impl ThrottleSettings {
    /// Download tuning: high ceilings, tolerant latency thresholds.
    pub fn downloads() -> Self {
        Self {
            min: 50,
            max: 400,
            increase_step: 25,
            decrease_step: 40,
            decrease_ratio: 0.85,
            low_latency: Duration::from_millis(400),
            high_latency: Duration::from_millis(1500),
            max_error_rate_for_increase: 0.05,
            high_error_rate_for_decrease: 0.15,
            pending_pressure: 5,
            sample_window: 30,
            min_samples: 6,
            cooldown: Duration::from_millis(1500),
        }
    }

    /// Page-fetch tuning: reacts quickly, since pages gate new work.
    pub fn pages() -> Self {
        Self {
            min: 6,
            max: 40,
            increase_step: 2,
            decrease_step: 2,
            decrease_ratio: 0.8,
            low_latency: Duration::from_millis(250),
            high_latency: Duration::from_millis(900),
            max_error_rate_for_increase: 0.1,
            high_error_rate_for_decrease: 0.2,
            pending_pressure: 1,
            sample_window: 20,
            min_samples: 5,
            cooldown: Duration::from_millis(1200),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    latency: Duration,
    success: bool,
}

pub type LimitObserver = Box<dyn Fn(usize) + Send + Sync>;

/// Keeps a queue's concurrency near the point of maximum safe throughput:
/// additive increase while the queue is saturated and healthy, step/ratio
/// decrease on elevated latency or errors. A cooldown after any change damps
/// oscillation, but a failure may shrink the limit at any time.
pub struct AdaptiveLimiter {
    queue: Arc<TaskQueue>,
    settings: ThrottleSettings,
    state: Mutex<LimiterState>,
    on_limit_change: Option<LimitObserver>,
}

struct LimiterState {
    limit: usize,
    last_stats: QueueStats,
    last_adjustment: Option<Instant>,
    samples: VecDeque<Sample>,
}

enum Verdict {
    Decrease,
    Increase,
}

impl AdaptiveLimiter {
    pub fn new(
        queue: Arc<TaskQueue>,
        initial: usize,
        settings: ThrottleSettings,
        on_limit_change: Option<LimitObserver>,
    ) -> Arc<Self> {
        let limit = initial.clamp(settings.min, settings.max);
        let limiter = Arc::new(Self {
            queue,
            settings,
            state: Mutex::new(LimiterState {
                limit,
                last_stats: QueueStats::default(),
                last_adjustment: None,
                samples: VecDeque::new(),
            }),
            on_limit_change,
        });
        limiter.queue.set_concurrency(limit);
        if let Some(observer) = &limiter.on_limit_change {
            observer(limit);
        }
        limiter
    }

    pub fn current(&self) -> usize {
        self.state.lock().expect("limiter state poisoned").limit
    }

    pub fn observe_stats(&self, stats: QueueStats) {
        {
            let mut state = self.state.lock().expect("limiter state poisoned");
            state.last_stats = stats;
        }
        self.evaluate();
    }

    pub fn record_success(&self, latency: Duration) {
        self.record_sample(latency, true);
        self.evaluate();
    }

    /// Failures skip the minimum-sample and cooldown gates: one bad outcome
    /// is enough to back off.
    pub fn record_failure(&self, latency: Duration) {
        self.record_sample(latency, false);
        self.request_decrease();
    }

    fn record_sample(&self, latency: Duration, success: bool) {
        // An unmeasured outcome is pinned to the matching threshold so it
        // cannot skew the window mean toward zero.
        let latency = if latency.is_zero() {
            if success {
                self.settings.low_latency
            } else {
                self.settings.high_latency
            }
        } else {
            latency
        };
        let mut state = self.state.lock().expect("limiter state poisoned");
        state.samples.push_back(Sample { latency, success });
        while state.samples.len() > self.settings.sample_window {
            state.samples.pop_front();
        }
    }

    fn evaluate(&self) {
        let verdict = {
            let state = self.state.lock().expect("limiter state poisoned");
            if state.samples.len() < self.settings.min_samples {
                return;
            }
            if let Some(at) = state.last_adjustment {
                if at.elapsed() < self.settings.cooldown {
                    return;
                }
            }
            let (mean_latency, error_rate) = window_averages(&state.samples);
            let saturated = state.limit > 0
                && (state.last_stats.active >= state.limit
                    || state.last_stats.pending >= self.settings.pending_pressure);
            if error_rate >= self.settings.high_error_rate_for_decrease
                || mean_latency >= self.settings.high_latency
            {
                Verdict::Decrease
            } else if saturated
                && error_rate <= self.settings.max_error_rate_for_increase
                && mean_latency <= self.settings.low_latency
            {
                Verdict::Increase
            } else {
                return;
            }
        };
        match verdict {
            Verdict::Decrease => self.request_decrease(),
            Verdict::Increase => self.request_increase(),
        }
    }

    fn request_decrease(&self) {
        let current = self.current();
        let by_step = current.saturating_sub(self.settings.decrease_step);
        let by_ratio = (current as f64 * self.settings.decrease_ratio).floor() as usize;
        let next = by_step
            .max(by_ratio)
            .clamp(self.settings.min, self.settings.max);
        if next < current {
            self.apply_limit(next);
        }
    }

    fn request_increase(&self) {
        let current = self.current();
        let next = (current + self.settings.increase_step).clamp(self.settings.min, self.settings.max);
        if next > current {
            self.apply_limit(next);
        }
    }

    fn apply_limit(&self, next: usize) {
        {
            let mut state = self.state.lock().expect("limiter state poisoned");
            if next == state.limit {
                return;
            }
            state.limit = next;
            state.last_adjustment = Some(Instant::now());
        }
        // Outside the state lock: the queue's stats callback re-enters here.
        self.queue.set_concurrency(next);
        if let Some(observer) = &self.on_limit_change {
            observer(next);
        }
    }
}

fn window_averages(samples: &VecDeque<Sample>) -> (Duration, f64) {
    let total: Duration = samples.iter().map(|sample| sample.latency).sum();
    let errors = samples.iter().filter(|sample| !sample.success).count();
    let mean = total / samples.len() as u32;
    (mean, errors as f64 / samples.len() as f64)
}
