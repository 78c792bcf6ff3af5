/*
 *  Copyright 2025-2026 Mercantile Systems
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Per-command event buffer.
//!
//! A `UnitOfWork` is created by the executor for each command invocation and
//! passed to the handler explicitly. Events recorded here are not durable;
//! they become outbox records only when the surrounding transaction commits.
//! If the handler fails, the buffer is dropped with the rolled-back
//! transaction.

use serde::Serialize;

use crate::models::DomainEvent;

/// Buffers domain events recorded during a single command.
///
/// Events keep their recording order; the executor persists them in that
/// order so outbox record ids reflect it. `drain` consumes the buffer, so
/// events cannot be persisted twice.
#[derive(Debug, Default)]
pub struct UnitOfWork {
    events: Vec<DomainEvent>,
}

impl UnitOfWork {
    /// Creates an empty unit of work.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an already-built event.
    pub fn record(&mut self, event: DomainEvent) {
        self.events.push(event);
    }

    /// Serializes `body` and records it under `event_type`.
    ///
    /// # Errors
    /// Returns the serialization error if `body` cannot be represented as
    /// JSON; nothing is recorded in that case.
    pub fn record_event<T: Serialize>(
        &mut self,
        event_type: impl Into<String>,
        body: &T,
    ) -> serde_json::Result<()> {
        let event = DomainEvent::new(event_type, body)?;
        self.events.push(event);
        Ok(())
    }

    /// Number of events recorded so far.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True if no events have been recorded.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Consumes the buffer, yielding events in recording order.
    pub fn drain(self) -> Vec<DomainEvent> {
        self.events
    }
}
