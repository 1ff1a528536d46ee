// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicUsize, Ordering};

/// Receives output counters. Implemented by the host's metrics registry.
pub trait Observer: Send + Sync {
    /// A batch of `events` events was published.
    fn new_batch(&self, events: usize);
    /// `events` events were handed back for retry.
    fn failed(&self, events: usize);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn new_batch(&self, _events: usize) {}
    fn failed(&self, _events: usize) {}
}

/// Observer keeping running totals in memory.
#[derive(Debug, Default)]
pub struct CountingObserver {
    batches: AtomicUsize,
    events: AtomicUsize,
    failed: AtomicUsize,
}

impl CountingObserver {
    #[must_use]
    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn events(&self) -> usize {
        self.events.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn failed_events(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }
}

impl Observer for CountingObserver {
    fn new_batch(&self, events: usize) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.events.fetch_add(events, Ordering::Relaxed);
    }

    fn failed(&self, events: usize) {
        self.failed.fetch_add(events, Ordering::Relaxed);
    }
}
