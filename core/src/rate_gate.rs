//! Bounded-concurrency admission control.
//!
//! # Design
//! The gate is a bounded channel pre-filled with `limit` tokens. Acquiring
//! receives a token (optionally with a deadline), and the returned
//! `RatePermit` sends it back when dropped, so every exit path of the caller
//! releases the slot, including unwinding.

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use tracing::trace;

use crate::error::Error;

/// Limits the number of requests in flight at once.
#[derive(Debug)]
pub struct RateGate {
    release: Sender<()>,
    pool: Receiver<()>,
    limit: usize,
    timeout: Option<Duration>,
}

impl RateGate {
    /// Create a gate with `limit` slots. A zero `timeout` waits forever.
    pub fn new(limit: usize, timeout: Duration) -> Result<Self, Error> {
        if limit == 0 {
            return Err(Error::Config("rate limit must allow at least one request".to_string()));
        }

        let (release, pool) = bounded(limit);
        for _ in 0..limit {
            release
                .try_send(())
                .map_err(|_| Error::Config("rate gate pool overflow".to_string()))?;
        }

        Ok(Self {
            release,
            pool,
            limit,
            timeout: (!timeout.is_zero()).then_some(timeout),
        })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Number of free slots right now.
    pub fn available(&self) -> usize {
        self.pool.len()
    }

    /// Wait for a free slot.
    ///
    /// Fails with `Error::RateLimitTimeout` if a timeout is configured and
    /// no slot frees up in time.
    pub fn acquire(&self) -> Result<RatePermit<'_>, Error> {
        match self.timeout {
            // The gate owns a sender, so the pool never disconnects.
            None => self.pool.recv().map_err(|_| Error::RateLimitTimeout)?,
            Some(timeout) => match self.pool.recv_timeout(timeout) {
                Ok(()) => {}
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {
                    return Err(Error::RateLimitTimeout);
                }
            },
        }
        trace!(available = self.available(), "rate gate slot acquired");
        Ok(RatePermit { gate: self })
    }
}

/// A held rate gate slot, returned to the pool on drop.
#[derive(Debug)]
pub struct RatePermit<'a> {
    gate: &'a RateGate,
}

impl Drop for RatePermit<'_> {
    fn drop(&mut self) {
        // One token is out, so the pool has room for it.
        let _ = self.gate.release.try_send(());
        trace!(available = self.gate.available(), "rate gate slot released");
    }
}
