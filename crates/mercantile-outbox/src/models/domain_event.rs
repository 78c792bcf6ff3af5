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

//! In-memory domain events.
//!
//! A domain event is what a command handler records while it runs; it only
//! becomes durable when the unit of work commits and the event is written to
//! the outbox table.

use serde::Serialize;
use serde_json::Value;

/// A domain event buffered inside a unit of work.
///
/// `event_type` is the routing key consumers subscribe to; `payload` is the
/// already-serialized event body. Events are recorded in handler order and
/// persisted in that order at commit time.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainEvent {
    /// Routing key, e.g. `"branch_created"`.
    pub event_type: String,
    /// Event body as JSON.
    pub payload: Value,
}

impl DomainEvent {
    /// Creates an event by serializing `body` to JSON.
    ///
    /// # Errors
    /// Returns the serialization error if `body` cannot be represented
    /// as JSON.
    pub fn new<T: Serialize>(event_type: impl Into<String>, body: &T) -> serde_json::Result<Self> {
        Ok(Self {
            event_type: event_type.into(),
            payload: serde_json::to_value(body)?,
        })
    }

    /// Creates an event from an already-built JSON value.
    pub fn from_value(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }

    /// Renders the payload as the string stored in the outbox table.
    pub fn payload_string(&self) -> String {
        self.payload.to_string()
    }
}
