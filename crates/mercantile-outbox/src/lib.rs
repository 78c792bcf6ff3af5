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

//! # Mercantile Outbox
//!
//! A transactional outbox pipeline for ERP backends, supporting PostgreSQL
//! and SQLite through a single runtime-selected connection layer.
//!
//! Writing a business mutation and publishing the event it implies are two
//! writes; if they are not atomic, a crash between them either loses the
//! event or publishes a lie. This crate closes that gap by persisting events
//! into an `outbox_records` table inside the command's own transaction and
//! delivering them afterwards with a background dispatcher.
//!
//! ## Components
//!
//! - [`pipeline::CommandExecutor`] runs a command handler and its recorded
//!   events in one transaction.
//! - [`pipeline::UnitOfWork`] is the per-command event buffer handlers
//!   record into.
//! - [`dispatcher::OutboxDispatcher`] claims due records and routes them to
//!   registered [`dispatcher::EventConsumer`]s, with exponential-backoff
//!   retries and a dead-letter state.
//! - [`dal::DAL`] exposes the outbox storage operations directly for
//!   tooling and tests.
//!
//! ## Delivery semantics
//!
//! Delivery is at-least-once. The dispatcher marks a record delivered only
//! after every consumer accepted it, so a crash in between causes a
//! redelivery once the claim lease expires. Consumers must treat the
//! delivery's `record_id` as a dedup key.
//!
//! ## Example
//!
//! ```rust,ignore
//! use mercantile_outbox::{Database, DAL};
//! use mercantile_outbox::pipeline::CommandExecutor;
//! use mercantile_outbox::dispatcher::{ConsumerRegistry, DispatcherConfig, OutboxDispatcher};
//!
//! let database = Database::new("postgres://localhost:5432", "erp", 10);
//! database.run_migrations().await?;
//! let dal = DAL::new(database);
//!
//! let mut registry = ConsumerRegistry::new();
//! registry.register("branch_created", branch_consumer);
//!
//! let dispatcher = OutboxDispatcher::new(dal.clone(), registry, DispatcherConfig::default());
//! let executor = CommandExecutor::with_signal(dal, dispatcher.work_signal());
//! let handle = dispatcher.start();
//!
//! let branch = executor.execute(AddBranch { name: "Main Street".into() }).await?;
//!
//! handle.shutdown().await;
//! ```

pub mod dal;
pub mod database;
pub mod dispatcher;
pub mod error;
pub mod models;
pub mod pipeline;

pub use dal::DAL;
pub use database::universal_types::UniversalTimestamp;
pub use database::{BackendType, Database};
pub use dispatcher::{
    ConsumerRegistry, DispatcherConfig, EventConsumer, EventDelivery, OutboxDispatcher, WorkSignal,
};
pub use error::{CommandError, DispatchError, PipelineError, ValidationError};
pub use models::{DomainEvent, NewOutboxRecord, OutboxRecord, OutboxStatus};
pub use pipeline::{Command, CommandExecutor, TransactionalCommand, UnitOfWork};

use tracing_subscriber::EnvFilter;

/// Initializes tracing for binaries and tests.
///
/// `filter` overrides the `RUST_LOG` environment variable; with `None`, the
/// environment is consulted and `info` is the fallback. Safe to call more
/// than once; later calls are no-ops.
pub fn init_logging(filter: Option<&str>) {
    let env_filter = match filter {
        Some(filter) => EnvFilter::new(filter),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init();
}
