//! Per-subject sliding-window rate limiting for write actions.
//!
//! Each `(subject, action kind)` pair owns a [`RateWindow`]: the timestamps of
//! its recently allowed actions. A check purges timestamps that have left the
//! window, then either records `now` and allows, or denies without recording.
//! Denied attempts therefore never push the window forward.
//!
//! Windows live in a `DashMap`, so the purge-count-record sequence for one key
//! runs under that key's shard lock and stays atomic on a multi-threaded
//! runtime.

use crate::domain::subject::{ActionKind, SubjectId};
use crate::{Config, RateLimits};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// The action was recorded. `remaining` more fit in the current window.
    Allowed {
        remaining: u32,
    },
    /// The window is full. The oldest entry expires after `retry_after`.
    Denied {
        retry_after: Duration,
    },
}

impl RateDecision {
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct WindowKey {
    subject: SubjectId,
    action: ActionKind,
}

/// Timestamps of recently allowed actions, oldest first.
#[derive(Debug, Default)]
pub struct RateWindow {
    timestamps: VecDeque<Instant>,
}

impl RateWindow {
    fn purge(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.timestamps.front() {
            if now.saturating_duration_since(oldest) < window {
                break;
            }
            self.timestamps.pop_front();
        }
    }

    fn last_activity(&self) -> Option<Instant> {
        self.timestamps.back().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Sliding-window gate keyed by subject and action kind.
///
/// Injected into the mutation engine rather than held as global state; one
/// instance is typically shared per signed-in session via `Arc`.
#[derive(Debug)]
pub struct RateLimiter {
    limits: RateLimits,
    windows: DashMap<WindowKey, RateWindow>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(limits: RateLimits) -> Self {
        Self {
            limits,
            windows: DashMap::new(),
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.rate_limits.clone())
    }

    /// Checks and, if allowed, records an action at the current instant.
    pub fn is_allowed(&self, subject: &SubjectId, action: ActionKind) -> bool {
        self.check_at(subject, action, Instant::now()).is_allowed()
    }

    /// Checks and, if allowed, records an action at `now`.
    ///
    /// Never blocks on I/O and never fails. Cost is linear in the number of
    /// expired timestamps purged.
    pub fn check_at(&self, subject: &SubjectId, action: ActionKind, now: Instant) -> RateDecision {
        let rule = self.limits.rule(action);
        let window = rule.window();
        let max = rule.max_actions as usize;

        let decision = {
            let mut entry = self
                .windows
                .entry(WindowKey { subject: subject.clone(), action })
                .or_default();

            entry.purge(now, window);

            let used = entry.len();
            if used < max {
                entry.timestamps.push_back(now);
                RateDecision::Allowed {
                    remaining: u32::try_from(max - used - 1).unwrap_or(u32::MAX),
                }
            } else {
                let oldest = entry.timestamps.front().copied().unwrap_or(now);
                RateDecision::Denied {
                    retry_after: window.saturating_sub(now.saturating_duration_since(oldest)),
                }
            }
        };

        self.evict_over_capacity();

        tracing::debug!(
            subject = %subject,
            action = %action,
            allowed = decision.is_allowed(),
            "rate limit evaluated"
        );

        decision
    }

    /// Number of `(subject, action)` windows currently tracked.
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }

    /// Drops windows with no timestamps left inside their window at `now`.
    pub fn purge_idle(&self, now: Instant) {
        let before = self.windows.len();
        self.windows.retain(|key, window| {
            window.purge(now, self.limits.rule(key.action).window());
            !window.is_empty()
        });
        tracing::debug!(removed = before.saturating_sub(self.windows.len()), "idle rate windows purged");
    }

    fn evict_over_capacity(&self) {
        while self.windows.len() > self.limits.max_tracked_subjects {
            let victim = self
                .windows
                .iter()
                .min_by_key(|entry| entry.value().last_activity())
                .map(|entry| entry.key().clone());

            let Some(key) = victim else { break };
            tracing::debug!(subject = %key.subject, action = %key.action, "evicting least recently active rate window");
            self.windows.remove(&key);
        }
    }
}
