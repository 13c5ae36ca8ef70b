//! Upstream health state machine.
//!
//! # States
//! - Healthy: the most recent attempt succeeded (or none has failed yet)
//! - Failing: `max_fails` consecutive attempts failed
//!
//! # State Transitions
//! ```text
//! Healthy → Failing: consecutive failures >= max_fails
//! Failing → Healthy: any successful attempt
//! ```
//!
//! With a single upstream the state is informational only: it never stops a
//! request from attempting the upstream.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::config::UpstreamConfig;

/// Health of the upstream target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Failing,
}

/// When failures flip the upstream to `Failing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailurePolicy {
    /// Consecutive failures required; 0 behaves like 1.
    pub max_fails: u32,
    /// Failures older than this stop counting. Zero means no window.
    pub fail_timeout: Duration,
}

impl FailurePolicy {
    pub fn from_config(config: &UpstreamConfig) -> Self {
        Self {
            max_fails: config.max_fails,
            fail_timeout: Duration::from_secs(config.fail_timeout_secs),
        }
    }

    fn threshold(&self) -> u32 {
        self.max_fails.max(1)
    }
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            max_fails: 1,
            fail_timeout: Duration::ZERO,
        }
    }
}

/// Point-in-time copy of the health record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthSnapshot {
    pub state: HealthState,
    pub consecutive_failures: u32,
    pub last_failure: Option<Instant>,
}

/// Shared, synchronized health record for one upstream.
#[derive(Debug)]
pub struct UpstreamHealth {
    policy: FailurePolicy,
    record: Mutex<HealthSnapshot>,
}

impl UpstreamHealth {
    pub fn new(policy: FailurePolicy) -> Self {
        Self {
            policy,
            record: Mutex::new(HealthSnapshot {
                state: HealthState::Healthy,
                consecutive_failures: 0,
                last_failure: None,
            }),
        }
    }

    pub fn state(&self) -> HealthState {
        self.lock().state
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        *self.lock()
    }

    /// Record a successful attempt.
    /// Returns the new state if this caused a transition.
    pub fn record_success(&self) -> Option<HealthState> {
        let mut record = self.lock();
        record.consecutive_failures = 0;
        if record.state == HealthState::Failing {
            record.state = HealthState::Healthy;
            return Some(HealthState::Healthy);
        }
        None
    }

    /// Record a failed attempt (connection error or timeout).
    /// Returns the new state if this caused a transition.
    pub fn record_failure(&self) -> Option<HealthState> {
        self.record_failure_at(Instant::now())
    }

    pub(crate) fn record_failure_at(&self, now: Instant) -> Option<HealthState> {
        let mut record = self.lock();

        if !self.policy.fail_timeout.is_zero() {
            if let Some(last) = record.last_failure {
                if now.saturating_duration_since(last) > self.policy.fail_timeout {
                    record.consecutive_failures = 0;
                }
            }
        }

        record.consecutive_failures = record.consecutive_failures.saturating_add(1);
        record.last_failure = Some(now);

        if record.state == HealthState::Healthy
            && record.consecutive_failures >= self.policy.threshold()
        {
            record.state = HealthState::Failing;
            return Some(HealthState::Failing);
        }
        None
    }

    fn lock(&self) -> MutexGuard<'_, HealthSnapshot> {
        // The record is plain data; a panic mid-update cannot leave it inconsistent.
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for UpstreamHealth {
    fn default() -> Self {
        Self::new(FailurePolicy::default())
    }
}
