//! Reliability facilities: retry policies,
//! per-peer circuit breakers and a connection pool.
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, warn};

use medicom_ul::association::client::ClientAssociation;

use crate::error::{Error, ErrorClass, Result};
use crate::peer::Peer;

/// A policy deciding whether and when a failed operation is retried.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetryPolicy {
    /// never retry
    None,
    /// retry after a fixed delay
    Fixed {
        /// the delay between attempts
        delay: Duration,
        /// the maximum number of retries
        max_retries: u32,
    },
    /// retry with linearly growing delays
    Linear {
        /// the delay increment per attempt
        step: Duration,
        /// the maximum number of retries
        max_retries: u32,
    },
    /// retry with exponentially growing delays
    Exponential {
        /// the delay of the first retry
        base: Duration,
        /// the largest admissible delay
        cap: Duration,
        /// the maximum number of retries
        max_retries: u32,
    },
    /// exponential backoff with uniform jitter
    ExponentialWithJitter {
        /// the delay of the first retry
        base: Duration,
        /// the largest admissible delay
        cap: Duration,
        /// the maximum number of retries
        max_retries: u32,
    },
}

impl RetryPolicy {
    /// The delay before the given retry attempt (1-based),
    /// or `None` when no further attempt is admitted.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        match *self {
            RetryPolicy::None => None,
            RetryPolicy::Fixed { delay, max_retries } => {
                (attempt <= max_retries).then_some(delay)
            }
            RetryPolicy::Linear { step, max_retries } => {
                (attempt <= max_retries).then(|| step * attempt)
            }
            RetryPolicy::Exponential {
                base,
                cap,
                max_retries,
            } => (attempt <= max_retries)
                .then(|| base.saturating_mul(1u32 << (attempt - 1).min(16)).min(cap)),
            RetryPolicy::ExponentialWithJitter {
                base,
                cap,
                max_retries,
            } => (attempt <= max_retries).then(|| {
                let full = base.saturating_mul(1u32 << (attempt - 1).min(16)).min(cap);
                // uniform jitter over the full backoff window
                let nanos = full.as_nanos().max(1) as u64;
                Duration::from_nanos(rand::thread_rng().gen_range(0..=nanos))
            }),
        }
    }
}

/// Run an operation under a retry policy.
///
/// Only errors classified as retryable are retried;
/// fatal errors and service statuses surface immediately.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.class() == ErrorClass::Retryable => {
                attempt += 1;
                match policy.delay_for(attempt) {
                    Some(delay) => {
                        debug!("attempt {} failed ({}); retrying in {:?}", attempt, e, delay);
                        tokio::time::sleep(delay).await;
                    }
                    None => return Err(e),
                }
            }
            Err(e) => return Err(e),
        }
    }
}

/// The observable state of a circuit breaker.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BreakerState {
    /// traffic flows normally
    Closed,
    /// traffic is refused until the cool-down elapses
    Open,
    /// one probe request is allowed through
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// A circuit breaker for one destination.
///
/// After `failure_threshold` consecutive failures the circuit opens
/// for `open_for`; the next request after the cool-down is admitted
/// as a half-open probe, whose outcome closes or re-opens the circuit.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    open_for: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a breaker with the given threshold and cool-down.
    pub fn new(failure_threshold: u32, open_for: Duration) -> Self {
        CircuitBreaker {
            failure_threshold,
            open_for,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
        }
    }

    /// The current state of the breaker.
    pub fn state(&self) -> BreakerState {
        self.inner.lock().expect("breaker lock poisoned").state
    }

    /// Ask for admission of one request.
    /// An open breaker refuses until the cool-down elapses.
    pub fn try_acquire(&self) -> bool {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::HalfOpen => false,
            BreakerState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|at| at.elapsed() >= self.open_for)
                    .unwrap_or(true);
                if elapsed {
                    inner.state = BreakerState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful request.
    pub fn on_success(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        inner.state = BreakerState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
    }

    /// Record a failed request.
    pub fn on_failure(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        inner.consecutive_failures += 1;
        if inner.state == BreakerState::HalfOpen
            || inner.consecutive_failures >= self.failure_threshold
        {
            if inner.state != BreakerState::Open {
                warn!("circuit breaker opened");
            }
            inner.state = BreakerState::Open;
            inner.opened_at = Some(Instant::now());
        }
    }
}

/// A registry of circuit breakers, one per destination key.
#[derive(Default)]
pub struct BreakerRegistry {
    failure_threshold: u32,
    open_for: Duration,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    /// Create a registry producing breakers with the given parameters.
    pub fn new(failure_threshold: u32, open_for: Duration) -> Self {
        BreakerRegistry {
            failure_threshold,
            open_for,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    /// The breaker for the given peer.
    pub fn breaker_for(&self, peer: &Peer) -> Arc<CircuitBreaker> {
        self.breakers
            .lock()
            .expect("breaker registry lock poisoned")
            .entry(peer.key())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(self.failure_threshold, self.open_for))
            })
            .clone()
    }

    /// Admit a request for the peer,
    /// failing with a resource error when the circuit is open.
    pub fn admit(&self, peer: &Peer) -> Result<Arc<CircuitBreaker>> {
        let breaker = self.breaker_for(peer);
        if breaker.try_acquire() {
            Ok(breaker)
        } else {
            Err(Error::CircuitOpen { peer: peer.key() })
        }
    }
}

struct PooledEntry {
    association: ClientAssociation,
    checked_in: Instant,
}

/// A pool of established associations,
/// keyed by the peer configuration
/// (host, port, called AE, calling AE and TLS options).
///
/// Idle associations past the expiry age are discarded on checkout;
/// the caller refreshes liveness with C-ECHO health checks
/// before reusing a stale association.
pub struct ConnectionPool {
    idle_expiry: Duration,
    max_idle_per_peer: usize,
    entries: Mutex<HashMap<String, Vec<PooledEntry>>>,
}

impl ConnectionPool {
    /// Create a pool with the given idle expiry and per-peer capacity.
    pub fn new(idle_expiry: Duration, max_idle_per_peer: usize) -> Self {
        ConnectionPool {
            idle_expiry,
            max_idle_per_peer,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Take an association for the peer out of the pool, if one
    /// is present and not expired.
    pub fn checkout(&self, peer: &Peer) -> Option<ClientAssociation> {
        let mut entries = self.entries.lock().expect("pool lock poisoned");
        let bucket = entries.get_mut(&peer.key())?;
        while let Some(entry) = bucket.pop() {
            if entry.checked_in.elapsed() < self.idle_expiry {
                return Some(entry.association);
            }
            // expired: drop the association (socket closes)
            debug!("discarding expired pooled association for {}", peer.key());
        }
        None
    }

    /// Return an association to the pool for later reuse.
    ///
    /// The association is dropped instead when the per-peer
    /// capacity is reached.
    pub fn checkin(&self, peer: &Peer, association: ClientAssociation) {
        let mut entries = self.entries.lock().expect("pool lock poisoned");
        let bucket = entries.entry(peer.key()).or_default();
        if bucket.len() >= self.max_idle_per_peer {
            debug!("pool full for {}; dropping association", peer.key());
            return;
        }
        bucket.push(PooledEntry {
            association,
            checked_in: Instant::now(),
        });
    }

    /// Drop every idle association which outlived the expiry.
    pub fn sweep(&self) {
        let mut entries = self.entries.lock().expect("pool lock poisoned");
        for bucket in entries.values_mut() {
            bucket.retain(|entry| entry.checked_in.elapsed() < self.idle_expiry);
        }
        entries.retain(|_, bucket| !bucket.is_empty());
    }

    /// The number of idle associations currently pooled.
    pub fn idle_count(&self) -> usize {
        self.entries
            .lock()
            .expect("pool lock poisoned")
            .values()
            .map(|bucket| bucket.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_policy_delays() {
        assert_eq!(RetryPolicy::None.delay_for(1), None);

        let fixed = RetryPolicy::Fixed {
            delay: Duration::from_millis(100),
            max_retries: 2,
        };
        assert_eq!(fixed.delay_for(1), Some(Duration::from_millis(100)));
        assert_eq!(fixed.delay_for(2), Some(Duration::from_millis(100)));
        assert_eq!(fixed.delay_for(3), None);

        let linear = RetryPolicy::Linear {
            step: Duration::from_millis(50),
            max_retries: 3,
        };
        assert_eq!(linear.delay_for(2), Some(Duration::from_millis(100)));

        let exponential = RetryPolicy::Exponential {
            base: Duration::from_millis(100),
            cap: Duration::from_secs(1),
            max_retries: 8,
        };
        assert_eq!(exponential.delay_for(1), Some(Duration::from_millis(100)));
        assert_eq!(exponential.delay_for(2), Some(Duration::from_millis(200)));
        assert_eq!(exponential.delay_for(8), Some(Duration::from_secs(1)));

        let jittered = RetryPolicy::ExponentialWithJitter {
            base: Duration::from_millis(100),
            cap: Duration::from_secs(1),
            max_retries: 4,
        };
        let delay = jittered.delay_for(3).unwrap();
        assert!(delay <= Duration::from_millis(400));
    }

    #[tokio::test]
    async fn with_retry_stops_on_fatal_errors() {
        let mut calls = 0;
        let result: Result<()> = with_retry(
            RetryPolicy::Fixed {
                delay: Duration::from_millis(1),
                max_retries: 5,
            },
            || {
                calls += 1;
                async move {
                    Err(Error::MalformedCommand {
                        tag: medicom_core::Tag(0, 0),
                    })
                }
            },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn with_retry_retries_retryable_errors() {
        let calls = std::sync::atomic::AtomicU32::new(0);
        let result: Result<u32> = with_retry(
            RetryPolicy::Fixed {
                delay: Duration::from_millis(1),
                max_retries: 5,
            },
            || {
                let n = calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(Error::OperationTimeout { operation: "test" })
                    } else {
                        Ok(n)
                    }
                }
            },
        )
        .await;
        assert_eq!(result.unwrap(), 2);
    }

    #[test]
    fn breaker_opens_after_threshold_and_probes() {
        let breaker = CircuitBreaker::new(3, Duration::from_millis(0));
        assert!(breaker.try_acquire());
        breaker.on_failure();
        breaker.on_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);
        breaker.on_failure();
        assert_eq!(breaker.state(), BreakerState::Open);

        // cool-down of zero: next acquire half-opens
        assert!(breaker.try_acquire());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        // a second caller is not admitted while probing
        assert!(!breaker.try_acquire());

        breaker.on_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn breaker_reopens_on_failed_probe() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(0));
        breaker.on_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(breaker.try_acquire());
        breaker.on_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
    }
}
