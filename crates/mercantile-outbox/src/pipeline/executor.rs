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

//! Command execution with transactional outbox persistence.
//!
//! [`CommandExecutor::execute`] opens one database transaction per command:
//! the handler's own statements, and an outbox insert per recorded event,
//! all commit or roll back together. Whether a command can emit events is
//! part of its type: only [`TransactionalCommand`] handlers receive a
//! [`UnitOfWork`]; [`Command`] handlers have no way to emit at all.

use std::sync::Arc;

use tracing::debug;

use crate::dal::models::NewUnifiedOutboxRecord;
use crate::dal::DAL;
use crate::database::schema::outbox_records;
use crate::database::universal_types::UniversalTimestamp;
use crate::dispatcher::WorkSignal;
use crate::error::{CommandError, PipelineError};
use crate::models::outbox_record::OutboxStatus;
use crate::pipeline::UnitOfWork;

#[cfg(feature = "postgres")]
use diesel::PgConnection;
#[cfg(feature = "sqlite")]
use diesel::SqliteConnection;

/// A business command that may emit domain events.
///
/// The handler runs inside the executor's transaction and records events on
/// the unit of work it is handed. Both backend methods must implement the
/// same business logic; which one runs is decided by the executor at runtime.
pub trait TransactionalCommand: Send + 'static {
    /// Value returned to the caller on commit.
    type Output: Send + 'static;

    /// Name used in logs.
    fn name(&self) -> &str;

    #[cfg(feature = "postgres")]
    fn apply_postgres(
        &self,
        conn: &mut PgConnection,
        uow: &mut UnitOfWork,
    ) -> Result<Self::Output, CommandError>;

    #[cfg(feature = "sqlite")]
    fn apply_sqlite(
        &self,
        conn: &mut SqliteConnection,
        uow: &mut UnitOfWork,
    ) -> Result<Self::Output, CommandError>;
}

/// A business command that cannot emit events.
///
/// Handlers get a transaction but no unit of work, so skipping the outbox is
/// an explicit choice visible in the command's type.
pub trait Command: Send + 'static {
    /// Value returned to the caller on commit.
    type Output: Send + 'static;

    /// Name used in logs.
    fn name(&self) -> &str;

    #[cfg(feature = "postgres")]
    fn apply_postgres(&self, conn: &mut PgConnection) -> Result<Self::Output, CommandError>;

    #[cfg(feature = "sqlite")]
    fn apply_sqlite(&self, conn: &mut SqliteConnection) -> Result<Self::Output, CommandError>;
}

/// Runs commands against the database with outbox persistence.
///
/// Cloneable; clones share the same pool and work signal.
#[derive(Clone)]
pub struct CommandExecutor {
    dal: DAL,
    signal: Option<Arc<WorkSignal>>,
}

impl CommandExecutor {
    /// Creates an executor without a dispatcher nudge.
    pub fn new(dal: DAL) -> Self {
        Self { dal, signal: None }
    }

    /// Creates an executor that nudges `signal` after commits that wrote
    /// outbox records, so the dispatcher picks them up before its next poll
    /// tick.
    pub fn with_signal(dal: DAL, signal: Arc<WorkSignal>) -> Self {
        Self {
            dal,
            signal: Some(signal),
        }
    }

    /// Returns the DAL this executor runs against.
    pub fn dal(&self) -> &DAL {
        &self.dal
    }

    /// Executes a transactional command.
    ///
    /// On success the business mutation and one outbox record per recorded
    /// event are durable. On any error the transaction has been rolled back
    /// and no event survives.
    pub async fn execute<C: TransactionalCommand>(
        &self,
        command: C,
    ) -> Result<C::Output, PipelineError> {
        let name = command.name().to_string();

        let (output, event_count) = crate::dispatch_backend!(
            self.dal.backend(),
            self.execute_postgres(command).await?,
            self.execute_sqlite(command).await?
        );

        debug!(command = %name, events = event_count, "Command committed");

        if event_count > 0 {
            if let Some(signal) = &self.signal {
                signal.notify();
            }
        }

        Ok(output)
    }

    #[cfg(feature = "postgres")]
    async fn execute_postgres<C: TransactionalCommand>(
        &self,
        command: C,
    ) -> Result<(C::Output, usize), PipelineError> {
        let conn = self
            .dal
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| PipelineError::ConnectionPool(e.to_string()))?;

        conn.interact(move |conn| {
            use diesel::prelude::*;

            conn.transaction::<(C::Output, usize), PipelineError, _>(|conn| {
                let mut uow = UnitOfWork::new();
                let output = command.apply_postgres(conn, &mut uow)?;

                let events = uow.drain();
                let count = events.len();
                let now = UniversalTimestamp::now().to_naive();

                for event in events {
                    let row = NewUnifiedOutboxRecord {
                        event_type: event.event_type,
                        payload: event.payload.to_string(),
                        occurred_at_utc: now,
                        status: OutboxStatus::Pending.as_str().to_string(),
                        attempts: 0,
                        next_attempt_at: now,
                    };
                    diesel::insert_into(outbox_records::table)
                        .values(&row)
                        .execute(conn)
                        .map_err(PipelineError::Database)?;
                }

                Ok((output, count))
            })
        })
        .await
        .map_err(|e| PipelineError::ConnectionPool(e.to_string()))?
    }

    #[cfg(feature = "sqlite")]
    async fn execute_sqlite<C: TransactionalCommand>(
        &self,
        command: C,
    ) -> Result<(C::Output, usize), PipelineError> {
        let conn = self
            .dal
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| PipelineError::ConnectionPool(e.to_string()))?;

        conn.interact(move |conn| {
            use diesel::prelude::*;

            conn.transaction::<(C::Output, usize), PipelineError, _>(|conn| {
                let mut uow = UnitOfWork::new();
                let output = command.apply_sqlite(conn, &mut uow)?;

                let events = uow.drain();
                let count = events.len();
                let now = UniversalTimestamp::now().to_naive();

                for event in events {
                    let row = NewUnifiedOutboxRecord {
                        event_type: event.event_type,
                        payload: event.payload.to_string(),
                        occurred_at_utc: now,
                        status: OutboxStatus::Pending.as_str().to_string(),
                        attempts: 0,
                        next_attempt_at: now,
                    };
                    diesel::insert_into(outbox_records::table)
                        .values(&row)
                        .execute(conn)
                        .map_err(PipelineError::Database)?;
                }

                Ok((output, count))
            })
        })
        .await
        .map_err(|e| PipelineError::ConnectionPool(e.to_string()))?
    }

    /// Executes a plain command (no event emission).
    ///
    /// Still transactional: the handler's statements commit or roll back as
    /// one.
    pub async fn execute_plain<C: Command>(&self, command: C) -> Result<C::Output, PipelineError> {
        let name = command.name().to_string();

        let output = crate::dispatch_backend!(
            self.dal.backend(),
            self.execute_plain_postgres(command).await?,
            self.execute_plain_sqlite(command).await?
        );

        debug!(command = %name, "Plain command committed");

        Ok(output)
    }

    #[cfg(feature = "postgres")]
    async fn execute_plain_postgres<C: Command>(
        &self,
        command: C,
    ) -> Result<C::Output, PipelineError> {
        let conn = self
            .dal
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| PipelineError::ConnectionPool(e.to_string()))?;

        conn.interact(move |conn| {
            use diesel::prelude::*;

            conn.transaction::<C::Output, PipelineError, _>(|conn| {
                Ok(command.apply_postgres(conn)?)
            })
        })
        .await
        .map_err(|e| PipelineError::ConnectionPool(e.to_string()))?
    }

    #[cfg(feature = "sqlite")]
    async fn execute_plain_sqlite<C: Command>(
        &self,
        command: C,
    ) -> Result<C::Output, PipelineError> {
        let conn = self
            .dal
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| PipelineError::ConnectionPool(e.to_string()))?;

        conn.interact(move |conn| {
            use diesel::prelude::*;

            conn.transaction::<C::Output, PipelineError, _>(|conn| {
                Ok(command.apply_sqlite(conn)?)
            })
        })
        .await
        .map_err(|e| PipelineError::ConnectionPool(e.to_string()))?
    }
}
