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

//! Integration tests for the outbox record DAL: claim exclusivity, lease
//! expiry, status transitions, and retention cleanup.

use std::time::Duration;

use chrono::Utc;
use mercantile_outbox::dal::DAL;
use mercantile_outbox::error::ValidationError;
use mercantile_outbox::models::NewOutboxRecord;
use mercantile_outbox::{OutboxStatus, UniversalTimestamp};
use serde_json::json;
use serial_test::serial;

use crate::fixtures::get_or_init_fixture;

const LEASE: Duration = Duration::from_secs(30);

async fn seed(dal: &DAL, count: usize) -> Vec<i64> {
    let mut ids = Vec::new();
    for i in 0..count {
        let record = dal
            .outbox_record()
            .create(NewOutboxRecord {
                event_type: "order_placed".to_string(),
                payload: json!({"order": i}).to_string(),
                occurred_at_utc: UniversalTimestamp::now(),
            })
            .await
            .expect("seed record");
        ids.push(record.id);
    }
    ids
}

#[tokio::test]
#[serial]
async fn test_create_and_get_by_id() {
    let fixture = get_or_init_fixture().await;
    let mut fixture = fixture.lock().unwrap();
    fixture.reset_database().await;

    let dal = fixture.get_dal();
    let created = dal
        .outbox_record()
        .create(NewOutboxRecord {
            event_type: "order_placed".to_string(),
            payload: json!({"order": 1}).to_string(),
            occurred_at_utc: UniversalTimestamp::now(),
        })
        .await
        .unwrap();

    let fetched = dal.outbox_record().get_by_id(created.id).await.unwrap();
    assert_eq!(fetched.event_type, "order_placed");
    assert_eq!(fetched.status, OutboxStatus::Pending.as_str());
    assert_eq!(fetched.attempts, 0);
    assert!(fetched.processed_at_utc.is_none());
    assert!(fetched.last_error.is_none());
    assert!(fetched.claimed_by.is_none());

    let missing = dal.outbox_record().get_by_id(999_999).await;
    assert!(matches!(missing, Err(ValidationError::RecordNotFound(_))));
}

#[tokio::test]
#[serial]
async fn test_claim_batch_is_exclusive_while_lease_holds() {
    let fixture = get_or_init_fixture().await;
    let mut fixture = fixture.lock().unwrap();
    fixture.reset_database().await;

    let dal = fixture.get_dal();
    seed(&dal, 2).await;

    let first = dal
        .outbox_record()
        .claim_batch("dispatcher-a", 10, LEASE)
        .await
        .unwrap();
    assert_eq!(first.len(), 2);
    assert!(first
        .iter()
        .all(|r| r.claimed_by.as_deref() == Some("dispatcher-a")));

    // While the lease holds, a second claimant sees nothing.
    let second = dal
        .outbox_record()
        .claim_batch("dispatcher-b", 10, LEASE)
        .await
        .unwrap();
    assert!(second.is_empty());
}

#[tokio::test]
#[serial]
async fn test_claim_batch_skips_future_retries() {
    let fixture = get_or_init_fixture().await;
    let mut fixture = fixture.lock().unwrap();
    fixture.reset_database().await;

    let dal = fixture.get_dal();
    let ids = seed(&dal, 1).await;

    // Schedule the record an hour into the future.
    let retry_at = UniversalTimestamp(Utc::now() + chrono::Duration::hours(1));
    dal.outbox_record()
        .mark_failed(ids[0], "downstream timeout", Some(retry_at))
        .await
        .unwrap();

    let claimed = dal
        .outbox_record()
        .claim_batch("dispatcher-a", 10, LEASE)
        .await
        .unwrap();
    assert!(claimed.is_empty());

    // Move the schedule into the past and it becomes due again.
    let retry_at = UniversalTimestamp(Utc::now() - chrono::Duration::seconds(1));
    dal.outbox_record()
        .mark_failed(ids[0], "downstream timeout", Some(retry_at))
        .await
        .unwrap();

    let claimed = dal
        .outbox_record()
        .claim_batch("dispatcher-a", 10, LEASE)
        .await
        .unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].attempts, 2);
}

#[tokio::test]
#[serial]
async fn test_stale_claim_is_reclaimable() {
    let fixture = get_or_init_fixture().await;
    let mut fixture = fixture.lock().unwrap();
    fixture.reset_database().await;

    let dal = fixture.get_dal();
    let ids = seed(&dal, 1).await;

    let claimed = dal
        .outbox_record()
        .claim_batch("dispatcher-a", 10, Duration::from_millis(5))
        .await
        .unwrap();
    assert_eq!(claimed.len(), 1);

    tokio::time::sleep(Duration::from_millis(20)).await;

    let reclaimed = dal
        .outbox_record()
        .claim_batch("dispatcher-b", 10, Duration::from_millis(5))
        .await
        .unwrap();
    assert_eq!(reclaimed.len(), 1);
    assert_eq!(reclaimed[0].id, ids[0]);
    assert_eq!(reclaimed[0].claimed_by.as_deref(), Some("dispatcher-b"));
}

#[tokio::test]
#[serial]
async fn test_mark_delivered_clears_claim_and_error() {
    let fixture = get_or_init_fixture().await;
    let mut fixture = fixture.lock().unwrap();
    fixture.reset_database().await;

    let dal = fixture.get_dal();
    let ids = seed(&dal, 1).await;

    let retry_at = UniversalTimestamp(Utc::now() - chrono::Duration::seconds(1));
    dal.outbox_record()
        .mark_failed(ids[0], "first attempt failed", Some(retry_at))
        .await
        .unwrap();

    dal.outbox_record()
        .claim_batch("dispatcher-a", 10, LEASE)
        .await
        .unwrap();

    dal.outbox_record().mark_delivered(ids[0]).await.unwrap();

    let record = dal.outbox_record().get_by_id(ids[0]).await.unwrap();
    assert_eq!(record.status, OutboxStatus::Delivered.as_str());
    assert!(record.processed_at_utc.is_some());
    assert!(record.last_error.is_none());
    assert!(record.claimed_by.is_none());
    assert!(record.claimed_at.is_none());
    // The failed attempt stays counted.
    assert_eq!(record.attempts, 1);
}

#[tokio::test]
#[serial]
async fn test_release_claims_frees_records() {
    let fixture = get_or_init_fixture().await;
    let mut fixture = fixture.lock().unwrap();
    fixture.reset_database().await;

    let dal = fixture.get_dal();
    seed(&dal, 3).await;

    dal.outbox_record()
        .claim_batch("dispatcher-a", 10, LEASE)
        .await
        .unwrap();

    let released = dal
        .outbox_record()
        .release_claims("dispatcher-a")
        .await
        .unwrap();
    assert_eq!(released, 3);

    // Released records are immediately claimable by someone else.
    let claimed = dal
        .outbox_record()
        .claim_batch("dispatcher-b", 10, LEASE)
        .await
        .unwrap();
    assert_eq!(claimed.len(), 3);
}

#[tokio::test]
#[serial]
async fn test_count_by_status_and_retention_cleanup() {
    let fixture = get_or_init_fixture().await;
    let mut fixture = fixture.lock().unwrap();
    fixture.reset_database().await;

    let dal = fixture.get_dal();
    let ids = seed(&dal, 3).await;

    dal.outbox_record().mark_delivered(ids[0]).await.unwrap();
    dal.outbox_record()
        .mark_failed(ids[1], "gave up", None)
        .await
        .unwrap();

    assert_eq!(
        dal.outbox_record()
            .count_by_status(OutboxStatus::Pending)
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        dal.outbox_record()
            .count_by_status(OutboxStatus::Delivered)
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        dal.outbox_record()
            .count_by_status(OutboxStatus::Dead)
            .await
            .unwrap(),
        1
    );

    // Cleanup removes only delivered records older than the cutoff.
    let cutoff = UniversalTimestamp(Utc::now() + chrono::Duration::seconds(1));
    let deleted = dal
        .outbox_record()
        .delete_delivered_older_than(cutoff)
        .await
        .unwrap();
    assert_eq!(deleted, 1);

    assert_eq!(
        dal.outbox_record()
            .count_by_status(OutboxStatus::Pending)
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        dal.outbox_record()
            .count_by_status(OutboxStatus::Dead)
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
#[serial]
async fn test_requeue_dead_rejects_non_dead_records() {
    let fixture = get_or_init_fixture().await;
    let mut fixture = fixture.lock().unwrap();
    fixture.reset_database().await;

    let dal = fixture.get_dal();
    let ids = seed(&dal, 1).await;

    let result = dal.outbox_record().requeue_dead(ids[0]).await;
    assert!(matches!(result, Err(ValidationError::RecordNotFound(_))));
}
