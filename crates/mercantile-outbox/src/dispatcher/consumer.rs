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

//! Consumer trait and routing registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::database::universal_types::UniversalTimestamp;
use crate::error::DispatchError;

/// A decoded outbox record as handed to consumers.
///
/// `record_id` is stable across redeliveries of the same record; idempotent
/// consumers use it as their dedup key.
#[derive(Debug, Clone)]
pub struct EventDelivery {
    /// Outbox record id (stable across redeliveries).
    pub record_id: i64,
    /// Routing key the record was matched on.
    pub event_type: String,
    /// Decoded JSON payload.
    pub payload: Value,
    /// When the event was originally recorded.
    pub occurred_at: UniversalTimestamp,
    /// 1-based delivery attempt number.
    pub attempt: i32,
}

/// Handles delivered events.
///
/// Implementations must be idempotent: the dispatcher guarantees
/// at-least-once delivery, so the same record can arrive more than once.
#[async_trait]
pub trait EventConsumer: Send + Sync {
    /// Name used in logs and error records.
    fn name(&self) -> &str;

    /// Processes one delivery. Returning an error schedules a retry (or
    /// parks the record once its attempt budget is spent).
    async fn consume(&self, delivery: &EventDelivery) -> Result<(), DispatchError>;
}

/// Routes event types to their registered consumers.
///
/// Built once before the dispatcher starts; routing is immutable afterwards.
#[derive(Default)]
pub struct ConsumerRegistry {
    by_type: HashMap<String, Vec<Arc<dyn EventConsumer>>>,
    catch_all: Vec<Arc<dyn EventConsumer>>,
}

impl ConsumerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a consumer for one event type. A type can have several
    /// consumers; a record counts as delivered only when all of them accept
    /// it.
    pub fn register(&mut self, event_type: impl Into<String>, consumer: Arc<dyn EventConsumer>) {
        self.by_type
            .entry(event_type.into())
            .or_default()
            .push(consumer);
    }

    /// Registers a consumer that receives every event type.
    pub fn register_catch_all(&mut self, consumer: Arc<dyn EventConsumer>) {
        self.catch_all.push(consumer);
    }

    /// Returns the consumers for `event_type`, typed subscribers first, then
    /// catch-alls. Empty when nothing matches.
    pub fn matching(&self, event_type: &str) -> Vec<Arc<dyn EventConsumer>> {
        let mut consumers: Vec<Arc<dyn EventConsumer>> = self
            .by_type
            .get(event_type)
            .map(|v| v.to_vec())
            .unwrap_or_default();
        consumers.extend(self.catch_all.iter().cloned());
        consumers
    }

    /// True if no consumers are registered at all.
    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty() && self.catch_all.is_empty()
    }
}

impl std::fmt::Debug for ConsumerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerRegistry")
            .field("event_types", &self.by_type.keys().collect::<Vec<_>>())
            .field("catch_all", &self.catch_all.len())
            .finish()
    }
}
