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

//! Error types for the outbox pipeline.
//!
//! The taxonomy separates the two halves of the subsystem:
//! - Command-path errors ([`CommandError`], [`PipelineError`]) propagate
//!   synchronously to the caller and always imply a full rollback.
//! - Dispatch-path errors ([`DispatchError`]) never reach the original
//!   caller; they are recorded on the outbox record for the retry loop.
//! - Storage-layer errors ([`ValidationError`]) are shared by the DAL.

use thiserror::Error;

/// Errors raised by data access layer operations.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Failed to obtain a connection from the pool, or the pool interaction
    /// itself failed.
    #[error("Connection pool error: {0}")]
    ConnectionPool(String),

    /// A query or statement failed.
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// Running embedded migrations failed.
    #[error("Migration error: {0}")]
    Migration(String),

    /// The referenced outbox record does not exist.
    #[error("Outbox record {0} not found")]
    RecordNotFound(i64),
}

/// Errors raised by a business command handler while it runs inside the
/// wrapper's transaction. Either variant rolls back the whole unit of work.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command was rejected by business rules.
    #[error("Command rejected: {0}")]
    Rejected(String),

    /// A statement issued by the handler failed.
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),
}

/// Errors surfaced to the caller of the transactional command pipeline.
///
/// By the time one of these is returned, the transaction has been rolled
/// back: neither the mutation nor any buffered event survives.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The handler itself failed (business rejection or handler-issued query).
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Failed to obtain a connection for the unit of work.
    #[error("Connection pool error: {0}")]
    ConnectionPool(String),

    /// The commit, or an outbox insert inside it, failed.
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),
}

/// Errors local to the dispatcher. These are recorded in the record's
/// `last_error` column and retried; they are never returned to the command
/// caller.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No consumer is registered for the record's event type.
    #[error("No consumer registered for event type '{0}'")]
    NoConsumer(String),

    /// The payload could not be decoded back into an event.
    #[error("Malformed payload for record {record_id}: {reason}")]
    MalformedPayload { record_id: i64, reason: String },

    /// A consumer returned a failure.
    #[error("Consumer '{consumer}' failed: {reason}")]
    ConsumerFailure { consumer: String, reason: String },
}
