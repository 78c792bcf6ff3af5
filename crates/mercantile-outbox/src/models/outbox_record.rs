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

//! Outbox record model.
//!
//! An outbox record is the durable form of a domain event. It is inserted in
//! the same transaction as the business mutation that produced the event, and
//! later claimed and delivered by the background dispatcher.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::database::universal_types::UniversalTimestamp;

/// Lifecycle status of an outbox record.
///
/// Records start as `Pending`, move to `Delivered` when a consumer accepts
/// them, and are parked as `Dead` when delivery keeps failing or the payload
/// cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutboxStatus {
    /// Waiting for delivery (or between retry attempts).
    Pending,
    /// Successfully handed to a consumer.
    Delivered,
    /// Parked after exhausting retries or failing permanently.
    Dead,
}

impl OutboxStatus {
    /// Returns the status as stored in the `status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "pending",
            OutboxStatus::Delivered => "delivered",
            OutboxStatus::Dead => "dead",
        }
    }

    /// Parses a status from its column representation.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OutboxStatus::Pending),
            "delivered" => Some(OutboxStatus::Delivered),
            "dead" => Some(OutboxStatus::Dead),
            _ => None,
        }
    }
}

impl fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted outbox record.
///
/// `payload` holds the serialized event as a JSON string; `event_type` is the
/// routing key the dispatcher matches consumers against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxRecord {
    /// Monotonically increasing identifier, also the delivery order within
    /// a unit of work.
    pub id: i64,
    /// Routing key for consumer lookup.
    pub event_type: String,
    /// JSON-serialized event payload.
    pub payload: String,
    /// When the event was recorded (UTC).
    pub occurred_at_utc: UniversalTimestamp,
    /// When the record was delivered, if it has been.
    pub processed_at_utc: Option<UniversalTimestamp>,
    /// Message from the most recent failed delivery attempt.
    pub last_error: Option<String>,
    /// Lifecycle status (`pending`, `delivered`, `dead`).
    pub status: String,
    /// Number of delivery attempts made so far.
    pub attempts: i32,
    /// Earliest time the record is eligible for (re)delivery.
    pub next_attempt_at: UniversalTimestamp,
    /// Identifier of the dispatcher currently holding the claim, if any.
    pub claimed_by: Option<String>,
    /// When the current claim was taken.
    pub claimed_at: Option<UniversalTimestamp>,
}

impl OutboxRecord {
    /// Returns the parsed status, or `None` if the column holds an
    /// unrecognized value.
    pub fn parsed_status(&self) -> Option<OutboxStatus> {
        OutboxStatus::from_str(&self.status)
    }
}

/// Input for creating a new outbox record.
///
/// The DAL fills in status, attempt counters, and scheduling columns.
#[derive(Debug, Clone)]
pub struct NewOutboxRecord {
    /// Routing key for consumer lookup.
    pub event_type: String,
    /// JSON-serialized event payload.
    pub payload: String,
    /// When the event was recorded (UTC).
    pub occurred_at_utc: UniversalTimestamp,
}
