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

//! Diesel schema for the outbox table.
//!
//! Timestamps are stored as naive UTC in both backends; the DAL converts
//! to and from [`UniversalTimestamp`](crate::database::universal_types::UniversalTimestamp)
//! at the boundary.

diesel::table! {
    outbox_records (id) {
        id -> BigInt,
        event_type -> Text,
        payload -> Text,
        occurred_at_utc -> Timestamp,
        processed_at_utc -> Nullable<Timestamp>,
        last_error -> Nullable<Text>,
        status -> Text,
        attempts -> Integer,
        next_attempt_at -> Timestamp,
        claimed_by -> Nullable<Text>,
        claimed_at -> Nullable<Timestamp>,
    }
}
