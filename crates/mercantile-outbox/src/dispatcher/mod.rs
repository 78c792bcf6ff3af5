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

//! Background outbox dispatcher.
//!
//! The dispatcher polls the outbox for due pending records, claims them with
//! a lease, routes each to the consumers registered for its event type, and
//! records the outcome. Delivery is at-least-once: a crash after a consumer
//! ran but before the record was marked delivered leads to redelivery once
//! the lease expires, so consumers must be idempotent (the record id is a
//! stable dedup key).

pub mod config;
pub mod consumer;
pub mod relay;
pub mod signal;

pub use config::DispatcherConfig;
pub use consumer::{ConsumerRegistry, EventConsumer, EventDelivery};
pub use relay::{DispatchStats, DispatcherHandle, OutboxDispatcher};
pub use signal::WorkSignal;
