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

//! Database layer: connection pooling, runtime backend selection, embedded
//! migrations, and the diesel schema for the outbox table.

pub mod connection;
pub mod schema;
pub mod universal_types;

pub use connection::{AnyPool, BackendType, Database};

use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::error::ValidationError;

/// Embedded PostgreSQL migrations, applied at startup or by test fixtures.
pub const POSTGRES_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/postgres");

/// Embedded SQLite migrations, applied at startup or by test fixtures.
pub const SQLITE_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/sqlite");

/// Runs pending migrations on a PostgreSQL connection.
pub fn run_migrations_postgres(
    conn: &mut diesel::PgConnection,
) -> Result<(), ValidationError> {
    conn.run_pending_migrations(POSTGRES_MIGRATIONS)
        .map_err(|e| ValidationError::Migration(e.to_string()))?;
    Ok(())
}

/// Runs pending migrations on a SQLite connection.
pub fn run_migrations_sqlite(
    conn: &mut diesel::SqliteConnection,
) -> Result<(), ValidationError> {
    conn.run_pending_migrations(SQLITE_MIGRATIONS)
        .map_err(|e| ValidationError::Migration(e.to_string()))?;
    Ok(())
}
