//! Environment overrides for the transfer and throttle defaults. Malformed
//! or out-of-range values fall back silently, so a stray variable can never
//! take the mirror down.

use std::time::Duration;

use crate::throttle::ThrottleSettings;
use crate::transfer::TransferSettings;

pub const DEFAULT_DOWNLOAD_CONCURRENCY: usize = 200;
pub const DEFAULT_PAGE_CONCURRENCY: usize = 12;

/// Transfer retry/backoff knobs, env-adjustable under `MOJIMIRROR_DOWNLOAD_*`.
pub fn transfer_settings() -> TransferSettings {
    let defaults = TransferSettings::default();
    let base_delay = env_duration_ms(
        "MOJIMIRROR_DOWNLOAD_RETRY_DELAY_MS",
        defaults.base_delay,
        Duration::from_millis(1),
    );
    TransferSettings {
        max_retries: env_u32("MOJIMIRROR_DOWNLOAD_MAX_RETRIES", defaults.max_retries, 0),
        backoff_multiplier: env_f64(
            "MOJIMIRROR_DOWNLOAD_BACKOFF_MULTIPLIER",
            defaults.backoff_multiplier,
            1.0,
            f64::MAX,
        ),
        jitter_ratio: env_f64(
            "MOJIMIRROR_DOWNLOAD_JITTER_RATIO",
            defaults.jitter_ratio,
            0.0,
            f64::MAX,
        ),
        max_delay: env_duration_ms("MOJIMIRROR_DOWNLOAD_MAX_DELAY_MS", defaults.max_delay, base_delay),
        base_delay,
    }
}

/// Default concurrency plus adaptive tuning for the download queue.
pub fn download_throttle() -> (usize, ThrottleSettings) {
    resolve_throttle(
        "MOJIMIRROR_DOWNLOAD",
        DEFAULT_DOWNLOAD_CONCURRENCY,
        ThrottleSettings::downloads(),
    )
}

/// Default concurrency plus adaptive tuning for the page-fetch queue.
pub fn page_throttle() -> (usize, ThrottleSettings) {
    resolve_throttle(
        "MOJIMIRROR_PAGE",
        DEFAULT_PAGE_CONCURRENCY,
        ThrottleSettings::pages(),
    )
}

fn resolve_throttle(
    namespace: &str,
    default_concurrency: usize,
    defaults: ThrottleSettings,
) -> (usize, ThrottleSettings) {
    let prefix = format!("{namespace}_ADAPTIVE_");
    let min = env_usize(&format!("{prefix}MIN"), defaults.min, 1);
    let max = env_usize(&format!("{prefix}MAX"), defaults.max, min).max(min);
    let low_latency = env_duration_ms(
        &format!("{prefix}LOW_LATENCY_MS"),
        defaults.low_latency,
        Duration::from_millis(1),
    );
    let sample_window = env_usize(&format!("{prefix}SAMPLE_WINDOW"), defaults.sample_window, 1);
    let settings = ThrottleSettings {
        min,
        max,
        increase_step: env_usize(&format!("{prefix}INCREASE_STEP"), defaults.increase_step, 1),
        decrease_step: env_usize(&format!("{prefix}DECREASE_STEP"), defaults.decrease_step, 1),
        decrease_ratio: env_f64(
            &format!("{prefix}DECREASE_RATIO"),
            defaults.decrease_ratio,
            0.01,
            0.99,
        ),
        high_latency: env_duration_ms(
            &format!("{prefix}HIGH_LATENCY_MS"),
            defaults.high_latency,
            low_latency,
        ),
        low_latency,
        max_error_rate_for_increase: env_f64(
            &format!("{prefix}MAX_ERROR_RATE_FOR_INCREASE"),
            defaults.max_error_rate_for_increase,
            0.0,
            1.0,
        ),
        high_error_rate_for_decrease: env_f64(
            &format!("{prefix}HIGH_ERROR_RATE_FOR_DECREASE"),
            defaults.high_error_rate_for_decrease,
            0.0,
            1.0,
        ),
        pending_pressure: env_usize(&format!("{prefix}PENDING_PRESSURE"), defaults.pending_pressure, 0),
        min_samples: env_usize(&format!("{prefix}MIN_SAMPLES"), defaults.min_samples, 1)
            .min(sample_window),
        sample_window,
        cooldown: env_duration_ms(
            &format!("{prefix}COOLDOWN_MS"),
            defaults.cooldown,
            Duration::ZERO,
        ),
    };
    let concurrency = env_usize(&format!("{namespace}_CONCURRENCY"), default_concurrency, 1)
        .clamp(settings.min, settings.max);
    (concurrency, settings)
}

fn env_usize(key: &str, fallback: usize, min: usize) -> usize {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse::<usize>() {
            Ok(value) if value >= min => value,
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

fn env_u32(key: &str, fallback: u32, min: u32) -> u32 {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse::<u32>() {
            Ok(value) if value >= min => value,
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

fn env_f64(key: &str, fallback: f64, min: f64, max: f64) -> f64 {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse::<f64>() {
            Ok(value) if value.is_finite() && value >= min && value <= max => value,
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

fn env_duration_ms(key: &str, fallback: Duration, min: Duration) -> Duration {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(value) if Duration::from_millis(value) >= min => Duration::from_millis(value),
            _ => fallback,
        },
        Err(_) => fallback,
    }
}
