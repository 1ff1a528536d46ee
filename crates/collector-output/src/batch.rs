// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::event::Event;

/// A unit of events handed to the output by the host pipeline.
///
/// Both completion methods consume the batch, so a publish attempt settles it exactly
/// once: either every event is acknowledged, or the returned subset is queued again.
pub trait Batch: Send {
    fn events(&self) -> &[Event];

    /// Marks every event of the batch as delivered.
    fn ack(self);

    /// Hands `events` back to the host for another attempt. Events of the batch that are
    /// not in `events` count as delivered.
    fn retry_events(self, events: Vec<Event>);
}
