// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Referral Compensation Engine - Idempotency Guard

//! Idempotency guard for externally-triggerable operations.
//!
//! Wraps an operation behind a logical key so repeated invocation produces
//! exactly one effect: a completed result is cached and returned to every
//! caller until its TTL expires, and only one caller may run the operation
//! at a time. A caller that finds the key locked waits briefly for the
//! winner's result, then fails with a retryable [`IdempotencyError::InProgress`]
//! -- never a silent drop. This is the only component that blocks, and the
//! wait is bounded.

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from guarded execution.
#[derive(Debug, thiserror::Error)]
pub enum IdempotencyError {
    #[error("malformed idempotency key: {0}")]
    MalformedKey(String),

    #[error("operation for key {0} is in progress; retry later")]
    InProgress(String),

    #[error("operation failed: {0}")]
    OperationFailed(String),

    #[error("result serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Guard
// ---------------------------------------------------------------------------

const MAX_KEY_LEN: usize = 255;

#[derive(Debug, Clone)]
enum KeyState {
    /// A caller holds the lock and is executing.
    Locked { acquired: Instant },
    /// A completed result, cached until `stored + ttl`.
    Done { value: Value, stored: Instant, ttl: Duration },
}

/// Keyed single-flight executor with result caching.
#[derive(Debug)]
pub struct IdempotencyGuard {
    entries: DashMap<String, KeyState>,
    /// Poll interval while waiting on another caller's lock.
    wait_interval: Duration,
    /// Total bounded wait before reporting `InProgress`.
    max_wait: Duration,
}

impl Default for IdempotencyGuard {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            wait_interval: Duration::from_millis(10),
            max_wait: Duration::from_millis(200),
        }
    }
}

impl IdempotencyGuard {
    pub fn new(wait_interval: Duration, max_wait: Duration) -> Self {
        Self { entries: DashMap::new(), wait_interval, max_wait }
    }

    /// Execute `op` at most once per `key` while a cached result lives.
    ///
    /// The lock acquisition and the cached-result check happen under one
    /// map-entry guard, closing the race between check and lock. The lock
    /// is released on every path, including operation failure. A lock
    /// older than `lock_ttl` is considered abandoned and taken over.
    pub fn execute<T, F>(
        &self,
        key: &str,
        lock_ttl: Duration,
        result_ttl: Duration,
        op: F,
    ) -> Result<T, IdempotencyError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T, String>,
    {
        if key.is_empty() || key.len() > MAX_KEY_LEN {
            return Err(IdempotencyError::MalformedKey(key.to_string()));
        }

        let deadline = Instant::now() + self.max_wait;
        loop {
            match self.try_claim(key, lock_ttl)? {
                Claim::Cached(value) => return Ok(serde_json::from_value(value)?),
                Claim::Acquired => break,
                Claim::Contended => {
                    if Instant::now() >= deadline {
                        return Err(IdempotencyError::InProgress(key.to_string()));
                    }
                    std::thread::sleep(self.wait_interval);
                }
            }
        }

        match op() {
            Ok(result) => {
                let value = serde_json::to_value(&result)?;
                self.entries.insert(
                    key.to_string(),
                    KeyState::Done { value, stored: Instant::now(), ttl: result_ttl },
                );
                Ok(result)
            }
            Err(message) => {
                // Failed operations are not cached; the next caller retries.
                self.entries.remove(key);
                Err(IdempotencyError::OperationFailed(message))
            }
        }
    }

    /// Atomically inspect the key: return the cached result, acquire the
    /// lock, or report contention.
    fn try_claim(&self, key: &str, lock_ttl: Duration) -> Result<Claim, IdempotencyError> {
        use dashmap::mapref::entry::Entry;
        match self.entries.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(KeyState::Locked { acquired: Instant::now() });
                Ok(Claim::Acquired)
            }
            Entry::Occupied(mut slot) => match slot.get().clone() {
                KeyState::Done { value, stored, ttl } => {
                    if stored.elapsed() < ttl {
                        Ok(Claim::Cached(value))
                    } else {
                        slot.insert(KeyState::Locked { acquired: Instant::now() });
                        Ok(Claim::Acquired)
                    }
                }
                KeyState::Locked { acquired } => {
                    if acquired.elapsed() >= lock_ttl {
                        // Abandoned lock (holder died); take over.
                        slot.insert(KeyState::Locked { acquired: Instant::now() });
                        Ok(Claim::Acquired)
                    } else {
                        Ok(Claim::Contended)
                    }
                }
            },
        }
    }

    /// Drop any cached result or lock for `key`.
    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }
}

enum Claim {
    Cached(Value),
    Acquired,
    Contended,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
