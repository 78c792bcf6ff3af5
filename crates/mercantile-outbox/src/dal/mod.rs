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

//! Data Access Layer with runtime backend selection.
//!
//! Each DAL operation dispatches to a backend-specific implementation based
//! on the connection type detected at startup.
//!
//! # Example
//!
//! ```rust,ignore
//! use mercantile_outbox::dal::DAL;
//! use mercantile_outbox::database::Database;
//!
//! let db = Database::new("postgres://localhost/erp", "erp", 10);
//! let dal = DAL::new(db);
//!
//! let pending = dal.outbox_record().count_pending().await?;
//! ```

use crate::database::{BackendType, Database};

pub mod models;
pub mod outbox_record;

pub use outbox_record::OutboxRecordDAL;

/// Helper macro for dispatching operations based on backend type.
///
/// # Example
///
/// ```rust,ignore
/// crate::dispatch_backend!(
///     self.dal.backend(),
///     self.create_postgres(record).await,
///     self.create_sqlite(record).await
/// )
/// ```
#[macro_export]
macro_rules! dispatch_backend {
    ($backend:expr, $pg:expr, $sqlite:expr) => {
        match $backend {
            #[cfg(feature = "postgres")]
            $crate::database::BackendType::Postgres => $pg,
            #[cfg(feature = "sqlite")]
            $crate::database::BackendType::Sqlite => $sqlite,
            #[allow(unreachable_patterns)]
            _ => panic!("Database backend not enabled in this build"),
        }
    };
}

/// The Data Access Layer struct.
///
/// Provides access to all outbox storage operations through a single
/// interface that works with both PostgreSQL and SQLite backends.
///
/// # Thread Safety
///
/// The `DAL` struct is `Clone` and can be safely shared between threads.
/// Each clone references the same underlying connection pool.
#[derive(Clone, Debug)]
pub struct DAL {
    /// The database instance with connection pool
    pub database: Database,
}

impl DAL {
    /// Creates a new DAL instance.
    pub fn new(database: Database) -> Self {
        DAL { database }
    }

    /// Returns the backend type for this DAL instance.
    pub fn backend(&self) -> BackendType {
        self.database.backend()
    }

    /// Returns a reference to the underlying database.
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Returns an outbox record DAL for outbox operations.
    pub fn outbox_record(&self) -> OutboxRecordDAL {
        OutboxRecordDAL::new(self)
    }
}
