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

//! Diesel-facing row types shared by both backends.
//!
//! These structs hold `NaiveDateTime` so they map onto TIMESTAMP columns
//! identically on PostgreSQL and SQLite. Conversion to the domain types in
//! [`crate::models`] happens at the DAL boundary.

use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::database::schema::outbox_records;
use crate::database::universal_types::UniversalTimestamp;
use crate::models::outbox_record::OutboxRecord;

/// Row type for `outbox_records`, usable with both query DSL loads and
/// raw-SQL `RETURNING` clauses.
#[derive(Debug, Clone, Queryable, QueryableByName, Identifiable)]
#[diesel(table_name = outbox_records)]
pub struct UnifiedOutboxRecord {
    pub id: i64,
    pub event_type: String,
    pub payload: String,
    pub occurred_at_utc: NaiveDateTime,
    pub processed_at_utc: Option<NaiveDateTime>,
    pub last_error: Option<String>,
    pub status: String,
    pub attempts: i32,
    pub next_attempt_at: NaiveDateTime,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<NaiveDateTime>,
}

/// Insertable row for `outbox_records`.
///
/// The remaining columns (`processed_at_utc`, `last_error`, claim columns)
/// start as NULL.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = outbox_records)]
pub struct NewUnifiedOutboxRecord {
    pub event_type: String,
    pub payload: String,
    pub occurred_at_utc: NaiveDateTime,
    pub status: String,
    pub attempts: i32,
    pub next_attempt_at: NaiveDateTime,
}

impl From<UnifiedOutboxRecord> for OutboxRecord {
    fn from(row: UnifiedOutboxRecord) -> Self {
        OutboxRecord {
            id: row.id,
            event_type: row.event_type,
            payload: row.payload,
            occurred_at_utc: UniversalTimestamp::from_naive(row.occurred_at_utc),
            processed_at_utc: row.processed_at_utc.map(UniversalTimestamp::from_naive),
            last_error: row.last_error,
            status: row.status,
            attempts: row.attempts,
            next_attempt_at: UniversalTimestamp::from_naive(row.next_attempt_at),
            claimed_by: row.claimed_by,
            claimed_at: row.claimed_at.map(UniversalTimestamp::from_naive),
        }
    }
}
