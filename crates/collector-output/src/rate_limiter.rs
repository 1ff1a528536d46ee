// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Token bucket over request body bytes.
//!
//! A reservation never fails for payloads that fit in the bucket: the bucket goes into
//! debt and the caller waits for the returned delay before sending. A payload larger
//! than the burst overflows instead, and the burst doubles so that a later attempt with
//! the same payload eventually fits.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::warn;

use crate::error::RateLimitOverflow;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    burst: usize,
    last: Instant,
}

impl Bucket {
    /// Tokens available at `now`, refilled at `rate` and capped at the burst.
    fn advance(&self, now: Instant, rate: f64) -> f64 {
        let elapsed = now.saturating_duration_since(self.last).as_secs_f64();
        (self.tokens + elapsed * rate).min(self.burst as f64)
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    bytes_per_second: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// A zero `bytes_per_second` disables limiting.
    #[must_use]
    pub fn new(bytes_per_second: u64, burst: usize) -> Self {
        Self::starting_at(bytes_per_second, burst, Instant::now())
    }

    fn starting_at(bytes_per_second: u64, burst: usize, now: Instant) -> Self {
        RateLimiter {
            bytes_per_second: bytes_per_second as f64,
            bucket: Mutex::new(Bucket {
                tokens: burst as f64,
                burst,
                last: now,
            }),
        }
    }

    /// Reserves `size` bytes and returns how long the caller must wait before sending.
    pub fn reserve(&self, size: usize) -> Result<Duration, RateLimitOverflow> {
        self.reserve_at(size, Instant::now())
    }

    fn reserve_at(&self, size: usize, now: Instant) -> Result<Duration, RateLimitOverflow> {
        if self.bytes_per_second <= 0.0 {
            return Ok(Duration::ZERO);
        }

        let mut bucket = self.bucket.lock().unwrap_or_else(PoisonError::into_inner);
        let tokens = bucket.advance(now, self.bytes_per_second);

        if size > bucket.burst {
            let new_burst = bucket.burst.saturating_mul(2).max(1);
            warn!(
                "Payload of {size} bytes exceeds rate limiter burst {}, doubling burst to {new_burst}",
                bucket.burst
            );
            bucket.tokens = tokens;
            bucket.last = now;
            bucket.burst = new_burst;
            return Err(RateLimitOverflow { size, new_burst });
        }

        let remaining = tokens - size as f64;
        bucket.tokens = remaining;
        bucket.last = now;

        if remaining >= 0.0 {
            Ok(Duration::ZERO)
        } else {
            Ok(Duration::from_secs_f64(-remaining / self.bytes_per_second))
        }
    }

    #[must_use]
    pub fn burst(&self) -> usize {
        self.bucket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .burst
    }

    /// Tokens as of the last reservation. Negative while the bucket is in debt.
    #[must_use]
    pub fn tokens(&self) -> f64 {
        self.bucket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .tokens
    }
}
