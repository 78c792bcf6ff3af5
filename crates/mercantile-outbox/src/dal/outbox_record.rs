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

//! Outbox record DAL with runtime backend selection.
//!
//! Claiming uses `FOR UPDATE SKIP LOCKED` on PostgreSQL so concurrent
//! dispatchers never block each other. SQLite serializes claim attempts
//! through a write transaction on its single-connection pool instead.
//!
//! A claim is a lease, not ownership: a record whose `claimed_at` is older
//! than the lease window is considered abandoned and may be re-claimed by
//! another dispatcher. That re-claim is where at-least-once delivery comes
//! from.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use std::time::Duration;

use super::models::{NewUnifiedOutboxRecord, UnifiedOutboxRecord};
use super::DAL;
use crate::database::schema::outbox_records;
use crate::database::universal_types::UniversalTimestamp;
use crate::error::ValidationError;
use crate::models::outbox_record::{NewOutboxRecord, OutboxRecord, OutboxStatus};

/// Data access layer for outbox record operations.
#[derive(Clone)]
pub struct OutboxRecordDAL<'a> {
    dal: &'a DAL,
}

impl<'a> OutboxRecordDAL<'a> {
    /// Creates a new OutboxRecordDAL instance.
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Creates a new pending outbox record.
    ///
    /// Note: the command pipeline inserts records inside the command's own
    /// transaction instead of calling this; this entry point exists for
    /// tooling and tests.
    pub async fn create(&self, record: NewOutboxRecord) -> Result<OutboxRecord, ValidationError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.create_postgres(record).await,
            self.create_sqlite(record).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn create_postgres(
        &self,
        record: NewOutboxRecord,
    ) -> Result<OutboxRecord, ValidationError> {
        let conn = self
            .dal
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let new_unified = pending_row(record);

        let result: UnifiedOutboxRecord = conn
            .interact(move |conn| {
                diesel::insert_into(outbox_records::table)
                    .values(&new_unified)
                    .get_result(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(result.into())
    }

    #[cfg(feature = "sqlite")]
    async fn create_sqlite(
        &self,
        record: NewOutboxRecord,
    ) -> Result<OutboxRecord, ValidationError> {
        let conn = self
            .dal
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let new_unified = pending_row(record);

        let result: UnifiedOutboxRecord = conn
            .interact(move |conn| {
                diesel::insert_into(outbox_records::table)
                    .values(&new_unified)
                    .get_result(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(result.into())
    }

    /// Retrieves an outbox record by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<OutboxRecord, ValidationError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.get_by_id_postgres(id).await,
            self.get_by_id_sqlite(id).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn get_by_id_postgres(&self, id: i64) -> Result<OutboxRecord, ValidationError> {
        let conn = self
            .dal
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let result: Option<UnifiedOutboxRecord> = conn
            .interact(move |conn| {
                outbox_records::table
                    .find(id)
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        result
            .map(Into::into)
            .ok_or(ValidationError::RecordNotFound(id))
    }

    #[cfg(feature = "sqlite")]
    async fn get_by_id_sqlite(&self, id: i64) -> Result<OutboxRecord, ValidationError> {
        let conn = self
            .dal
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let result: Option<UnifiedOutboxRecord> = conn
            .interact(move |conn| {
                outbox_records::table
                    .find(id)
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        result
            .map(Into::into)
            .ok_or(ValidationError::RecordNotFound(id))
    }

    /// Lists pending records ordered by id (oldest first), for monitoring
    /// and tests. Does not take claims.
    pub async fn list_pending(&self, limit: i64) -> Result<Vec<OutboxRecord>, ValidationError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.list_pending_postgres(limit).await,
            self.list_pending_sqlite(limit).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn list_pending_postgres(
        &self,
        limit: i64,
    ) -> Result<Vec<OutboxRecord>, ValidationError> {
        let conn = self
            .dal
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let results: Vec<UnifiedOutboxRecord> = conn
            .interact(move |conn| {
                outbox_records::table
                    .filter(outbox_records::status.eq(OutboxStatus::Pending.as_str()))
                    .order(outbox_records::id.asc())
                    .limit(limit)
                    .load(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(results.into_iter().map(Into::into).collect())
    }

    #[cfg(feature = "sqlite")]
    async fn list_pending_sqlite(&self, limit: i64) -> Result<Vec<OutboxRecord>, ValidationError> {
        let conn = self
            .dal
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let results: Vec<UnifiedOutboxRecord> = conn
            .interact(move |conn| {
                outbox_records::table
                    .filter(outbox_records::status.eq(OutboxStatus::Pending.as_str()))
                    .order(outbox_records::id.asc())
                    .limit(limit)
                    .load(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(results.into_iter().map(Into::into).collect())
    }

    /// Counts pending records (for monitoring).
    pub async fn count_pending(&self) -> Result<i64, ValidationError> {
        self.count_by_status(OutboxStatus::Pending).await
    }

    /// Counts records with the given status.
    pub async fn count_by_status(&self, status: OutboxStatus) -> Result<i64, ValidationError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.count_by_status_postgres(status).await,
            self.count_by_status_sqlite(status).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn count_by_status_postgres(
        &self,
        status: OutboxStatus,
    ) -> Result<i64, ValidationError> {
        let conn = self
            .dal
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let count: i64 = conn
            .interact(move |conn| {
                outbox_records::table
                    .filter(outbox_records::status.eq(status.as_str()))
                    .count()
                    .get_result(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(count)
    }

    #[cfg(feature = "sqlite")]
    async fn count_by_status_sqlite(&self, status: OutboxStatus) -> Result<i64, ValidationError> {
        let conn = self
            .dal
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let count: i64 = conn
            .interact(move |conn| {
                outbox_records::table
                    .filter(outbox_records::status.eq(status.as_str()))
                    .count()
                    .get_result(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(count)
    }

    /// Atomically claims up to `limit` due pending records for `claimant`.
    ///
    /// A record is due when `next_attempt_at` has passed and it is either
    /// unclaimed or its claim is older than `lease` (the previous holder is
    /// presumed dead). Claimed records are returned oldest first.
    pub async fn claim_batch(
        &self,
        claimant: &str,
        limit: usize,
        lease: Duration,
    ) -> Result<Vec<OutboxRecord>, ValidationError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.claim_batch_postgres(claimant, limit, lease).await,
            self.claim_batch_sqlite(claimant, limit, lease).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn claim_batch_postgres(
        &self,
        claimant: &str,
        limit: usize,
        lease: Duration,
    ) -> Result<Vec<OutboxRecord>, ValidationError> {
        let conn = self
            .dal
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let claimant = claimant.to_string();
        let limit = limit as i64;
        let now = UniversalTimestamp::now().to_naive();
        let stale_cutoff = stale_claim_cutoff(now, lease);

        // Claim with FOR UPDATE SKIP LOCKED so concurrent dispatchers skip
        // rows another transaction is claiming instead of blocking on them.
        // Rows with an expired lease ($3) are eligible for re-claim.
        let results: Vec<UnifiedOutboxRecord> = conn
            .interact(move |conn| {
                diesel::sql_query(format!(
                    r#"
                    UPDATE outbox_records
                    SET claimed_by = $1, claimed_at = $2
                    WHERE id IN (
                        SELECT id FROM outbox_records
                        WHERE status = 'pending'
                          AND next_attempt_at <= $2
                          AND (claimed_by IS NULL OR claimed_at <= $3)
                        ORDER BY next_attempt_at ASC, id ASC
                        LIMIT {}
                        FOR UPDATE SKIP LOCKED
                    )
                    RETURNING id, event_type, payload, occurred_at_utc,
                              processed_at_utc, last_error, status, attempts,
                              next_attempt_at, claimed_by, claimed_at
                    "#,
                    limit
                ))
                .bind::<diesel::sql_types::Text, _>(claimant)
                .bind::<diesel::sql_types::Timestamp, _>(now)
                .bind::<diesel::sql_types::Timestamp, _>(stale_cutoff)
                .load(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        let mut records: Vec<OutboxRecord> = results.into_iter().map(Into::into).collect();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    #[cfg(feature = "sqlite")]
    async fn claim_batch_sqlite(
        &self,
        claimant: &str,
        limit: usize,
        lease: Duration,
    ) -> Result<Vec<OutboxRecord>, ValidationError> {
        let conn = self
            .dal
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let claimant = claimant.to_string();
        let limit = limit as i64;

        // SQLite has no FOR UPDATE SKIP LOCKED; the write transaction on the
        // single-connection pool serializes concurrent claim attempts, so the
        // SELECT and UPDATE below cannot interleave with another claimant.
        let results: Vec<UnifiedOutboxRecord> = conn
            .interact(move |conn| {
                conn.transaction::<Vec<UnifiedOutboxRecord>, diesel::result::Error, _>(|conn| {
                    let now = UniversalTimestamp::now().to_naive();
                    let stale_cutoff = stale_claim_cutoff(now, lease);

                    let due: Vec<UnifiedOutboxRecord> = outbox_records::table
                        .filter(outbox_records::status.eq(OutboxStatus::Pending.as_str()))
                        .filter(outbox_records::next_attempt_at.le(now))
                        .filter(
                            outbox_records::claimed_by
                                .is_null()
                                .or(outbox_records::claimed_at.le(stale_cutoff)),
                        )
                        .order((
                            outbox_records::next_attempt_at.asc(),
                            outbox_records::id.asc(),
                        ))
                        .limit(limit)
                        .load(conn)?;

                    if due.is_empty() {
                        return Ok(Vec::new());
                    }

                    let ids: Vec<i64> = due.iter().map(|r| r.id).collect();

                    diesel::update(
                        outbox_records::table.filter(outbox_records::id.eq_any(&ids)),
                    )
                    .set((
                        outbox_records::claimed_by.eq(Some(claimant.clone())),
                        outbox_records::claimed_at.eq(Some(now)),
                    ))
                    .execute(conn)?;

                    outbox_records::table
                        .filter(outbox_records::id.eq_any(&ids))
                        .order(outbox_records::id.asc())
                        .load(conn)
                })
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(results.into_iter().map(Into::into).collect())
    }

    /// Marks a record as delivered and releases its claim.
    pub async fn mark_delivered(&self, id: i64) -> Result<(), ValidationError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.mark_delivered_postgres(id).await,
            self.mark_delivered_sqlite(id).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn mark_delivered_postgres(&self, id: i64) -> Result<(), ValidationError> {
        let conn = self
            .dal
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let updated: usize = conn
            .interact(move |conn| {
                let now = UniversalTimestamp::now().to_naive();
                diesel::update(outbox_records::table.find(id))
                    .set((
                        outbox_records::status.eq(OutboxStatus::Delivered.as_str()),
                        outbox_records::processed_at_utc.eq(Some(now)),
                        outbox_records::last_error.eq(None::<String>),
                        outbox_records::claimed_by.eq(None::<String>),
                        outbox_records::claimed_at.eq(None::<NaiveDateTime>),
                    ))
                    .execute(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        if updated == 0 {
            return Err(ValidationError::RecordNotFound(id));
        }
        Ok(())
    }

    #[cfg(feature = "sqlite")]
    async fn mark_delivered_sqlite(&self, id: i64) -> Result<(), ValidationError> {
        let conn = self
            .dal
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let updated: usize = conn
            .interact(move |conn| {
                let now = UniversalTimestamp::now().to_naive();
                diesel::update(outbox_records::table.find(id))
                    .set((
                        outbox_records::status.eq(OutboxStatus::Delivered.as_str()),
                        outbox_records::processed_at_utc.eq(Some(now)),
                        outbox_records::last_error.eq(None::<String>),
                        outbox_records::claimed_by.eq(None::<String>),
                        outbox_records::claimed_at.eq(None::<NaiveDateTime>),
                    ))
                    .execute(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        if updated == 0 {
            return Err(ValidationError::RecordNotFound(id));
        }
        Ok(())
    }

    /// Records a failed delivery attempt and releases the claim.
    ///
    /// With `retry_at` set, the record stays pending and becomes due again at
    /// that time. With `None`, the record is parked as dead and the
    /// dispatcher will not pick it up again until an operator requeues it.
    pub async fn mark_failed(
        &self,
        id: i64,
        error: &str,
        retry_at: Option<UniversalTimestamp>,
    ) -> Result<(), ValidationError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.mark_failed_postgres(id, error, retry_at).await,
            self.mark_failed_sqlite(id, error, retry_at).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn mark_failed_postgres(
        &self,
        id: i64,
        error: &str,
        retry_at: Option<UniversalTimestamp>,
    ) -> Result<(), ValidationError> {
        let conn = self
            .dal
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let error = error.to_string();

        let updated: usize = conn
            .interact(move |conn| match retry_at {
                Some(retry_at) => diesel::update(outbox_records::table.find(id))
                    .set((
                        outbox_records::last_error.eq(Some(error)),
                        outbox_records::attempts.eq(outbox_records::attempts + 1),
                        outbox_records::next_attempt_at.eq(retry_at.to_naive()),
                        outbox_records::claimed_by.eq(None::<String>),
                        outbox_records::claimed_at.eq(None::<NaiveDateTime>),
                    ))
                    .execute(conn),
                None => diesel::update(outbox_records::table.find(id))
                    .set((
                        outbox_records::last_error.eq(Some(error)),
                        outbox_records::attempts.eq(outbox_records::attempts + 1),
                        outbox_records::status.eq(OutboxStatus::Dead.as_str()),
                        outbox_records::claimed_by.eq(None::<String>),
                        outbox_records::claimed_at.eq(None::<NaiveDateTime>),
                    ))
                    .execute(conn),
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        if updated == 0 {
            return Err(ValidationError::RecordNotFound(id));
        }
        Ok(())
    }

    #[cfg(feature = "sqlite")]
    async fn mark_failed_sqlite(
        &self,
        id: i64,
        error: &str,
        retry_at: Option<UniversalTimestamp>,
    ) -> Result<(), ValidationError> {
        let conn = self
            .dal
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let error = error.to_string();

        let updated: usize = conn
            .interact(move |conn| match retry_at {
                Some(retry_at) => diesel::update(outbox_records::table.find(id))
                    .set((
                        outbox_records::last_error.eq(Some(error)),
                        outbox_records::attempts.eq(outbox_records::attempts + 1),
                        outbox_records::next_attempt_at.eq(retry_at.to_naive()),
                        outbox_records::claimed_by.eq(None::<String>),
                        outbox_records::claimed_at.eq(None::<NaiveDateTime>),
                    ))
                    .execute(conn),
                None => diesel::update(outbox_records::table.find(id))
                    .set((
                        outbox_records::last_error.eq(Some(error)),
                        outbox_records::attempts.eq(outbox_records::attempts + 1),
                        outbox_records::status.eq(OutboxStatus::Dead.as_str()),
                        outbox_records::claimed_by.eq(None::<String>),
                        outbox_records::claimed_at.eq(None::<NaiveDateTime>),
                    ))
                    .execute(conn),
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        if updated == 0 {
            return Err(ValidationError::RecordNotFound(id));
        }
        Ok(())
    }

    /// Releases all claims held by `claimant`, returning how many were
    /// released. Called on dispatcher shutdown so in-flight records become
    /// immediately available to other dispatchers.
    pub async fn release_claims(&self, claimant: &str) -> Result<i64, ValidationError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.release_claims_postgres(claimant).await,
            self.release_claims_sqlite(claimant).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn release_claims_postgres(&self, claimant: &str) -> Result<i64, ValidationError> {
        let conn = self
            .dal
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let claimant = claimant.to_string();

        let released: usize = conn
            .interact(move |conn| {
                diesel::update(
                    outbox_records::table.filter(outbox_records::claimed_by.eq(claimant)),
                )
                .set((
                    outbox_records::claimed_by.eq(None::<String>),
                    outbox_records::claimed_at.eq(None::<NaiveDateTime>),
                ))
                .execute(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(released as i64)
    }

    #[cfg(feature = "sqlite")]
    async fn release_claims_sqlite(&self, claimant: &str) -> Result<i64, ValidationError> {
        let conn = self
            .dal
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let claimant = claimant.to_string();

        let released: usize = conn
            .interact(move |conn| {
                diesel::update(
                    outbox_records::table.filter(outbox_records::claimed_by.eq(claimant)),
                )
                .set((
                    outbox_records::claimed_by.eq(None::<String>),
                    outbox_records::claimed_at.eq(None::<NaiveDateTime>),
                ))
                .execute(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(released as i64)
    }

    /// Returns a dead record to the pending queue with a fresh attempt
    /// budget. Operator-facing; used after the underlying consumer problem
    /// has been fixed.
    pub async fn requeue_dead(&self, id: i64) -> Result<(), ValidationError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.requeue_dead_postgres(id).await,
            self.requeue_dead_sqlite(id).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn requeue_dead_postgres(&self, id: i64) -> Result<(), ValidationError> {
        let conn = self
            .dal
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let updated: usize = conn
            .interact(move |conn| {
                let now = UniversalTimestamp::now().to_naive();
                diesel::update(
                    outbox_records::table
                        .find(id)
                        .filter(outbox_records::status.eq(OutboxStatus::Dead.as_str())),
                )
                .set((
                    outbox_records::status.eq(OutboxStatus::Pending.as_str()),
                    outbox_records::attempts.eq(0),
                    outbox_records::next_attempt_at.eq(now),
                    outbox_records::last_error.eq(None::<String>),
                ))
                .execute(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        if updated == 0 {
            return Err(ValidationError::RecordNotFound(id));
        }
        Ok(())
    }

    #[cfg(feature = "sqlite")]
    async fn requeue_dead_sqlite(&self, id: i64) -> Result<(), ValidationError> {
        let conn = self
            .dal
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let updated: usize = conn
            .interact(move |conn| {
                let now = UniversalTimestamp::now().to_naive();
                diesel::update(
                    outbox_records::table
                        .find(id)
                        .filter(outbox_records::status.eq(OutboxStatus::Dead.as_str())),
                )
                .set((
                    outbox_records::status.eq(OutboxStatus::Pending.as_str()),
                    outbox_records::attempts.eq(0),
                    outbox_records::next_attempt_at.eq(now),
                    outbox_records::last_error.eq(None::<String>),
                ))
                .execute(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        if updated == 0 {
            return Err(ValidationError::RecordNotFound(id));
        }
        Ok(())
    }

    /// Deletes delivered records processed before `cutoff`, returning how
    /// many were removed. Retention cleanup; pending and dead records are
    /// never touched.
    pub async fn delete_delivered_older_than(
        &self,
        cutoff: UniversalTimestamp,
    ) -> Result<i64, ValidationError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.delete_delivered_older_than_postgres(cutoff).await,
            self.delete_delivered_older_than_sqlite(cutoff).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn delete_delivered_older_than_postgres(
        &self,
        cutoff: UniversalTimestamp,
    ) -> Result<i64, ValidationError> {
        let conn = self
            .dal
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let cutoff = cutoff.to_naive();

        let deleted: usize = conn
            .interact(move |conn| {
                diesel::delete(
                    outbox_records::table
                        .filter(outbox_records::status.eq(OutboxStatus::Delivered.as_str()))
                        .filter(outbox_records::processed_at_utc.lt(cutoff)),
                )
                .execute(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(deleted as i64)
    }

    #[cfg(feature = "sqlite")]
    async fn delete_delivered_older_than_sqlite(
        &self,
        cutoff: UniversalTimestamp,
    ) -> Result<i64, ValidationError> {
        let conn = self
            .dal
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let cutoff = cutoff.to_naive();

        let deleted: usize = conn
            .interact(move |conn| {
                diesel::delete(
                    outbox_records::table
                        .filter(outbox_records::status.eq(OutboxStatus::Delivered.as_str()))
                        .filter(outbox_records::processed_at_utc.lt(cutoff)),
                )
                .execute(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(deleted as i64)
    }
}

/// Builds the insertable row for a fresh pending record.
fn pending_row(record: NewOutboxRecord) -> NewUnifiedOutboxRecord {
    let occurred = record.occurred_at_utc.to_naive();
    NewUnifiedOutboxRecord {
        event_type: record.event_type,
        payload: record.payload,
        occurred_at_utc: occurred,
        status: OutboxStatus::Pending.as_str().to_string(),
        attempts: 0,
        next_attempt_at: occurred,
    }
}

/// Claims taken at or before this instant are considered abandoned.
fn stale_claim_cutoff(now: NaiveDateTime, lease: Duration) -> NaiveDateTime {
    now - chrono::Duration::from_std(lease).unwrap_or_else(|_| chrono::Duration::seconds(30))
}
