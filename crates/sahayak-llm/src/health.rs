//! Per-provider health tracking and circuit breaking
//!
//! Every invocation updates counters atomically; classified transient
//! failures open a circuit for a cooldown window. The circuit closes
//! when the cooldown elapses or on the next success, whichever comes
//! first.

use crate::error::{Error, ErrorKind};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Cooldown windows applied when the circuit opens.
///
/// Policy constants, tunable per provider family. Quota exhaustion is
/// assumed to persist for minutes; rate limits clear quickly.
#[derive(Debug, Clone)]
pub struct CooldownPolicy {
    /// Cooldown after a quota-exceeded failure
    pub quota: Duration,
    /// Cooldown after a rate-limit failure
    pub rate_limit: Duration,
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self {
            quota: Duration::from_secs(300),
            rate_limit: Duration::from_secs(60),
        }
    }
}

/// Serializable health snapshot for one provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    /// Provider name
    pub name: String,
    /// Model identifier
    pub model: String,
    /// Priority rank (lower = tried first)
    pub priority: u8,
    /// Whether the provider is currently usable
    pub healthy: bool,
    /// Whether the circuit breaker is open
    pub circuit_open: bool,
    /// Lifetime request count
    pub request_count: u64,
    /// Lifetime success count
    pub success_count: u64,
    /// Lifetime error count
    pub error_count: u64,
    /// Lifetime success rate in percent
    pub success_rate: f64,
    /// Last successful call, if any
    pub last_success: Option<DateTime<Utc>>,
    /// Last failed call, if any
    pub last_error: Option<DateTime<Utc>>,
    /// Message from the last failure
    pub last_error_message: Option<String>,
}

/// Thread-safe counters and circuit state for one provider.
pub struct ProviderStats {
    name: String,
    cooldowns: CooldownPolicy,

    requests: AtomicU64,
    successes: AtomicU64,
    errors: AtomicU64,

    // Windowed counters feeding the error-rate health check; reset
    // when a success closes an open circuit so a recovered provider
    // is not condemned by its history.
    window_requests: AtomicU64,
    window_errors: AtomicU64,

    circuit_open_until: Mutex<Option<Instant>>,
    last_success: Mutex<Option<DateTime<Utc>>>,
    last_error: Mutex<Option<(DateTime<Utc>, String)>>,
}

impl ProviderStats {
    /// Create stats for a named provider.
    #[must_use]
    pub fn new(name: impl Into<String>, cooldowns: CooldownPolicy) -> Self {
        Self {
            name: name.into(),
            cooldowns,
            requests: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            window_requests: AtomicU64::new(0),
            window_errors: AtomicU64::new(0),
            circuit_open_until: Mutex::new(None),
            last_success: Mutex::new(None),
            last_error: Mutex::new(None),
        }
    }

    /// Record that a request is about to be dispatched.
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.window_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful request. Closes the circuit if open and
    /// resets the windowed error accounting.
    pub fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut slot) = self.last_success.lock() {
            *slot = Some(Utc::now());
        }

        let was_open = {
            let mut circuit = self
                .circuit_open_until
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            circuit.take().is_some()
        };
        if was_open {
            info!(provider = %self.name, "circuit breaker closed - provider recovered");
            self.window_requests.store(1, Ordering::Relaxed);
            self.window_errors.store(0, Ordering::Relaxed);
        }
    }

    /// Record a failed request, classifying the error to decide
    /// whether the circuit should open.
    pub fn record_error(&self, error: &Error) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        self.window_errors.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut slot) = self.last_error.lock() {
            *slot = Some((Utc::now(), error.to_string()));
        }

        match error.kind() {
            ErrorKind::Quota => self.open_circuit(self.cooldowns.quota),
            ErrorKind::RateLimit => self.open_circuit(self.cooldowns.rate_limit),
            // Possibly a one-off; surface without tripping the breaker.
            ErrorKind::Unavailable | ErrorKind::Other => {
                warn!(provider = %self.name, error = %error, "provider error recorded");
            }
        }
    }

    /// Open the circuit for the given cooldown window.
    pub fn open_circuit(&self, cooldown: Duration) {
        let mut circuit = self
            .circuit_open_until
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *circuit = Some(Instant::now() + cooldown);
        warn!(
            provider = %self.name,
            cooldown_secs = cooldown.as_secs(),
            "circuit breaker opened"
        );
    }

    /// Whether the circuit breaker is currently open.
    #[must_use]
    pub fn circuit_open(&self) -> bool {
        let circuit = self
            .circuit_open_until
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        matches!(*circuit, Some(until) if Instant::now() < until)
    }

    /// Check whether the provider is usable.
    ///
    /// False while the circuit is open and the cooldown has not
    /// elapsed; auto-recovers once it has. Also false when the
    /// windowed error rate exceeds 50%, which guards against a
    /// provider that fails softly without tripping the breaker.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        {
            let mut circuit = self
                .circuit_open_until
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if let Some(until) = *circuit {
                if Instant::now() < until {
                    debug!(provider = %self.name, "circuit breaker still open");
                    return false;
                }
                info!(provider = %self.name, "circuit cooldown expired, attempting recovery");
                *circuit = None;
                // The window that tripped the breaker must not keep
                // the provider unhealthy past its cooldown.
                self.window_requests.store(0, Ordering::Relaxed);
                self.window_errors.store(0, Ordering::Relaxed);
            }
        }

        let requests = self.window_requests.load(Ordering::Relaxed);
        if requests == 0 {
            return true;
        }
        let errors = self.window_errors.load(Ordering::Relaxed);
        if errors * 2 > requests {
            warn!(
                provider = %self.name,
                errors, requests,
                "high error rate, treating provider as unhealthy"
            );
            return false;
        }
        true
    }

    /// Build a serializable snapshot tagged with model and priority.
    #[must_use]
    pub fn snapshot(&self, model: &str, priority: u8) -> ProviderHealth {
        let requests = self.requests.load(Ordering::Relaxed);
        let successes = self.successes.load(Ordering::Relaxed);
        let success_rate = if requests > 0 {
            (successes as f64 / requests as f64) * 100.0
        } else {
            0.0
        };
        let (last_error, last_error_message) = self
            .last_error
            .lock()
            .map(|g| {
                g.clone()
                    .map_or((None, None), |(at, msg)| (Some(at), Some(msg)))
            })
            .unwrap_or((None, None));

        ProviderHealth {
            name: self.name.clone(),
            model: model.to_string(),
            priority,
            healthy: self.is_healthy(),
            circuit_open: self.circuit_open(),
            request_count: requests,
            success_count: successes,
            error_count: self.errors.load(Ordering::Relaxed),
            success_rate: (success_rate * 100.0).round() / 100.0,
            last_success: self.last_success.lock().map(|g| *g).unwrap_or(None),
            last_error,
            last_error_message,
        }
    }
}
