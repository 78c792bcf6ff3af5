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

//! The dispatcher loop: claim, deliver, record the outcome.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::config::DispatcherConfig;
use super::consumer::{ConsumerRegistry, EventDelivery};
use super::signal::WorkSignal;
use crate::dal::DAL;
use crate::database::universal_types::UniversalTimestamp;
use crate::error::{DispatchError, ValidationError};
use crate::models::OutboxRecord;

/// Outcome counters for one dispatch cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    /// Records claimed this cycle.
    pub claimed: usize,
    /// Records delivered and marked as such.
    pub delivered: usize,
    /// Records rescheduled for a later attempt.
    pub retried: usize,
    /// Records parked as dead.
    pub dead: usize,
}

/// Polls the outbox and delivers pending records to registered consumers.
///
/// Multiple dispatcher instances may run against the same table; claims keep
/// them from processing the same record concurrently, and expired leases let
/// survivors take over work from a crashed instance.
pub struct OutboxDispatcher {
    dal: DAL,
    registry: ConsumerRegistry,
    config: DispatcherConfig,
    dispatcher_id: String,
    signal: Arc<WorkSignal>,
}

impl OutboxDispatcher {
    /// Creates a dispatcher with a fresh instance id.
    pub fn new(dal: DAL, registry: ConsumerRegistry, config: DispatcherConfig) -> Self {
        Self {
            dal,
            registry,
            config,
            dispatcher_id: Uuid::new_v4().to_string(),
            signal: Arc::new(WorkSignal::new()),
        }
    }

    /// Returns the work signal to hand to a [`CommandExecutor`] so commits
    /// wake this dispatcher immediately.
    ///
    /// [`CommandExecutor`]: crate::pipeline::CommandExecutor
    pub fn work_signal(&self) -> Arc<WorkSignal> {
        self.signal.clone()
    }

    /// Returns this instance's claim id.
    pub fn dispatcher_id(&self) -> &str {
        &self.dispatcher_id
    }

    /// Runs one dispatch cycle: claim up to `batch_size` due records and
    /// deliver each in id order.
    ///
    /// Per-record outcomes (consumer failures, malformed payloads) are
    /// recorded on the record itself and never fail the cycle; only storage
    /// errors propagate.
    pub async fn poll_once(&self) -> Result<DispatchStats, ValidationError> {
        let records = self
            .dal
            .outbox_record()
            .claim_batch(
                &self.dispatcher_id,
                self.config.batch_size,
                self.config.claim_lease,
            )
            .await?;

        let mut stats = DispatchStats {
            claimed: records.len(),
            ..Default::default()
        };

        for record in records {
            self.deliver_record(record, &mut stats).await?;
        }

        if stats.claimed > 0 {
            debug!(
                claimed = stats.claimed,
                delivered = stats.delivered,
                retried = stats.retried,
                dead = stats.dead,
                "Dispatch cycle complete"
            );
        }

        Ok(stats)
    }

    /// Delivers one claimed record and records the outcome.
    async fn deliver_record(
        &self,
        record: OutboxRecord,
        stats: &mut DispatchStats,
    ) -> Result<(), ValidationError> {
        let attempt = record.attempts + 1;

        let payload: serde_json::Value = match serde_json::from_str(&record.payload) {
            Ok(value) => value,
            Err(e) => {
                // A payload that cannot be decoded will never deliver, no
                // matter how often it is retried. Park it immediately.
                let err = DispatchError::MalformedPayload {
                    record_id: record.id,
                    reason: e.to_string(),
                };
                error!(record_id = record.id, error = %err, "Parking malformed record");
                self.dal
                    .outbox_record()
                    .mark_failed(record.id, &err.to_string(), None)
                    .await?;
                stats.dead += 1;
                return Ok(());
            }
        };

        let delivery = EventDelivery {
            record_id: record.id,
            event_type: record.event_type.clone(),
            payload,
            occurred_at: record.occurred_at_utc,
            attempt,
        };

        match self.consume_all(&delivery).await {
            Ok(()) => {
                self.dal.outbox_record().mark_delivered(record.id).await?;
                stats.delivered += 1;
                debug!(
                    record_id = record.id,
                    event_type = %record.event_type,
                    attempt,
                    "Record delivered"
                );
            }
            Err(err) => {
                if attempt >= self.config.max_attempts {
                    warn!(
                        record_id = record.id,
                        event_type = %record.event_type,
                        attempt,
                        error = %err,
                        "Attempt budget spent, parking record as dead"
                    );
                    self.dal
                        .outbox_record()
                        .mark_failed(record.id, &err.to_string(), None)
                        .await?;
                    stats.dead += 1;
                } else {
                    let delay = self.config.retry_delay(attempt);
                    let retry_at =
                        UniversalTimestamp(UniversalTimestamp::now().into_inner()
                            + chrono::Duration::from_std(delay)
                                .unwrap_or_else(|_| chrono::Duration::seconds(60)));
                    warn!(
                        record_id = record.id,
                        event_type = %record.event_type,
                        attempt,
                        retry_in_ms = delay.as_millis() as u64,
                        error = %err,
                        "Delivery failed, scheduling retry"
                    );
                    self.dal
                        .outbox_record()
                        .mark_failed(record.id, &err.to_string(), Some(retry_at))
                        .await?;
                    stats.retried += 1;
                }
            }
        }

        Ok(())
    }

    /// Runs every matching consumer; the first failure aborts the record's
    /// delivery for this attempt.
    async fn consume_all(&self, delivery: &EventDelivery) -> Result<(), DispatchError> {
        let consumers = self.registry.matching(&delivery.event_type);
        if consumers.is_empty() {
            return Err(DispatchError::NoConsumer(delivery.event_type.clone()));
        }

        for consumer in consumers {
            consumer.consume(delivery).await.map_err(|e| match e {
                DispatchError::ConsumerFailure { .. } => e,
                other => DispatchError::ConsumerFailure {
                    consumer: consumer.name().to_string(),
                    reason: other.to_string(),
                },
            })?;
        }

        Ok(())
    }

    /// Starts the background dispatch loop.
    ///
    /// The loop wakes on the poll interval or a work-signal nudge, whichever
    /// comes first, and drains full batches back to back. On shutdown it
    /// finishes the current cycle and releases any claims it still holds.
    pub fn start(self) -> DispatcherHandle {
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);

        let task = tokio::spawn(async move {
            info!(dispatcher_id = %self.dispatcher_id, "Outbox dispatcher started");

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                    _ = self.wait_for_work() => {
                        // Drain back to back while cycles come back full, so
                        // a backlog clears faster than one batch per tick.
                        loop {
                            match self.poll_once().await {
                                Ok(stats) if stats.claimed == self.config.batch_size => continue,
                                Ok(_) => break,
                                Err(e) => {
                                    error!(error = %e, "Dispatch cycle failed");
                                    break;
                                }
                            }
                        }
                    }
                }
            }

            match self
                .dal
                .outbox_record()
                .release_claims(&self.dispatcher_id)
                .await
            {
                Ok(released) if released > 0 => {
                    info!(released, "Released outstanding claims on shutdown")
                }
                Ok(_) => {}
                Err(e) => error!(error = %e, "Failed to release claims on shutdown"),
            }

            info!(dispatcher_id = %self.dispatcher_id, "Outbox dispatcher stopped");
        });

        DispatcherHandle { shutdown_tx, task }
    }

    /// Waits for the next poll tick or a commit nudge.
    async fn wait_for_work(&self) {
        tokio::select! {
            _ = tokio::time::sleep(self.config.poll_interval) => {}
            _ = self.signal.notified() => {}
        }
    }
}

impl std::fmt::Debug for OutboxDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboxDispatcher")
            .field("dispatcher_id", &self.dispatcher_id)
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish()
    }
}

/// Handle to a running dispatcher.
pub struct DispatcherHandle {
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl DispatcherHandle {
    /// Signals shutdown and waits for the loop to finish its current cycle
    /// and release its claims.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            error!(error = %e, "Dispatcher task panicked during shutdown");
        }
    }

    /// Aborts the dispatcher task without waiting. Claims are left to expire
    /// via the lease.
    pub fn abort(self) {
        self.task.abort();
    }
}
