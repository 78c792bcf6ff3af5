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

//! Integration tests for the transactional command pipeline: atomicity of
//! business writes and outbox inserts, rollback on handler failure, and
//! ordering of persisted events.

use crate::fixtures::get_or_init_fixture;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Text};
use mercantile_outbox::error::CommandError;
use mercantile_outbox::models::DomainEvent;
use mercantile_outbox::pipeline::{Command, CommandExecutor, TransactionalCommand, UnitOfWork};
use mercantile_outbox::{OutboxStatus, PipelineError};
use serde_json::json;
use serial_test::serial;

#[derive(QueryableByName)]
struct IdRow {
    #[diesel(sql_type = BigInt)]
    id: i64,
}

#[derive(QueryableByName)]
struct CountRow {
    #[diesel(sql_type = BigInt)]
    count: i64,
}

fn insert_branch_sqlite(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<i64, diesel::result::Error> {
    diesel::sql_query("INSERT INTO branches (name) VALUES (?)")
        .bind::<Text, _>(name.to_string())
        .execute(conn)?;
    let row: IdRow = diesel::sql_query("SELECT last_insert_rowid() AS id").get_result(conn)?;
    Ok(row.id)
}

fn count_branches(conn: &mut SqliteConnection) -> i64 {
    let row: CountRow = diesel::sql_query("SELECT COUNT(*) AS count FROM branches")
        .get_result(conn)
        .expect("branches table should exist");
    row.count
}

/// Creates a branch and records a `branch_created` event. Optionally fails
/// after recording, to exercise rollback.
struct AddBranch {
    name: String,
    fail_after_record: bool,
}

impl AddBranch {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fail_after_record: false,
        }
    }

    fn failing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fail_after_record: true,
        }
    }
}

impl TransactionalCommand for AddBranch {
    type Output = i64;

    fn name(&self) -> &str {
        "add_branch"
    }

    fn apply_postgres(
        &self,
        conn: &mut PgConnection,
        uow: &mut UnitOfWork,
    ) -> Result<i64, CommandError> {
        let row: IdRow = diesel::sql_query("INSERT INTO branches (name) VALUES ($1) RETURNING id")
            .bind::<Text, _>(self.name.clone())
            .get_result(conn)?;
        uow.record(DomainEvent::from_value(
            "branch_created",
            json!({"branch_id": row.id, "name": self.name}),
        ));
        if self.fail_after_record {
            return Err(CommandError::Rejected("rejected after recording".into()));
        }
        Ok(row.id)
    }

    fn apply_sqlite(
        &self,
        conn: &mut SqliteConnection,
        uow: &mut UnitOfWork,
    ) -> Result<i64, CommandError> {
        let id = insert_branch_sqlite(conn, &self.name)?;
        uow.record(DomainEvent::from_value(
            "branch_created",
            json!({"branch_id": id, "name": self.name}),
        ));
        if self.fail_after_record {
            return Err(CommandError::Rejected("rejected after recording".into()));
        }
        Ok(id)
    }
}

/// Records one event per given name, in order.
struct AddBranches {
    names: Vec<String>,
}

impl TransactionalCommand for AddBranches {
    type Output = Vec<i64>;

    fn name(&self) -> &str {
        "add_branches"
    }

    fn apply_postgres(
        &self,
        conn: &mut PgConnection,
        uow: &mut UnitOfWork,
    ) -> Result<Vec<i64>, CommandError> {
        let mut ids = Vec::new();
        for name in &self.names {
            let row: IdRow =
                diesel::sql_query("INSERT INTO branches (name) VALUES ($1) RETURNING id")
                    .bind::<Text, _>(name.clone())
                    .get_result(conn)?;
            uow.record(DomainEvent::from_value(
                "branch_created",
                json!({"branch_id": row.id, "name": name}),
            ));
            ids.push(row.id);
        }
        Ok(ids)
    }

    fn apply_sqlite(
        &self,
        conn: &mut SqliteConnection,
        uow: &mut UnitOfWork,
    ) -> Result<Vec<i64>, CommandError> {
        let mut ids = Vec::new();
        for name in &self.names {
            let id = insert_branch_sqlite(conn, name)?;
            uow.record(DomainEvent::from_value(
                "branch_created",
                json!({"branch_id": id, "name": name}),
            ));
            ids.push(id);
        }
        Ok(ids)
    }
}

/// Creates a branch without emitting any event.
struct AddBranchSilently {
    name: String,
}

impl Command for AddBranchSilently {
    type Output = i64;

    fn name(&self) -> &str {
        "add_branch_silently"
    }

    fn apply_postgres(&self, conn: &mut PgConnection) -> Result<i64, CommandError> {
        let row: IdRow = diesel::sql_query("INSERT INTO branches (name) VALUES ($1) RETURNING id")
            .bind::<Text, _>(self.name.clone())
            .get_result(conn)?;
        Ok(row.id)
    }

    fn apply_sqlite(&self, conn: &mut SqliteConnection) -> Result<i64, CommandError> {
        Ok(insert_branch_sqlite(conn, &self.name)?)
    }
}

#[tokio::test]
#[serial]
async fn test_command_and_events_commit_together() {
    let fixture = get_or_init_fixture().await;
    let mut fixture = fixture.lock().unwrap();
    fixture.reset_database().await;

    let dal = fixture.get_dal();
    let executor = CommandExecutor::new(dal.clone());

    let branch_id = executor
        .execute(AddBranch::new("Main Street"))
        .await
        .expect("command should commit");

    let pending = dal.outbox_record().list_pending(10).await.unwrap();
    assert_eq!(pending.len(), 1);

    let record = &pending[0];
    assert_eq!(record.event_type, "branch_created");
    assert_eq!(record.status, OutboxStatus::Pending.as_str());
    assert_eq!(record.attempts, 0);
    assert!(record.processed_at_utc.is_none());
    assert!(record.claimed_by.is_none());

    let payload: serde_json::Value = serde_json::from_str(&record.payload).unwrap();
    assert_eq!(payload["branch_id"], branch_id);
    assert_eq!(payload["name"], "Main Street");
}

#[tokio::test]
#[serial]
async fn test_handler_failure_rolls_back_mutation_and_events() {
    let fixture = get_or_init_fixture().await;
    let mut fixture = fixture.lock().unwrap();
    fixture.reset_database().await;

    let dal = fixture.get_dal();
    let executor = CommandExecutor::new(dal.clone());

    let result = executor.execute(AddBranch::failing("Doomed Branch")).await;
    assert!(matches!(
        result,
        Err(PipelineError::Command(CommandError::Rejected(_)))
    ));

    // Neither the branch row nor the recorded event survived the rollback.
    assert_eq!(dal.outbox_record().count_pending().await.unwrap(), 0);

    let conn = dal.database.get_sqlite_connection().await.unwrap();
    let branches = conn.interact(|conn| count_branches(conn)).await.unwrap();
    assert_eq!(branches, 0);
}

#[tokio::test]
#[serial]
async fn test_constraint_violation_drops_recorded_events() {
    let fixture = get_or_init_fixture().await;
    let mut fixture = fixture.lock().unwrap();
    fixture.reset_database().await;

    let dal = fixture.get_dal();
    let executor = CommandExecutor::new(dal.clone());

    executor
        .execute(AddBranch::new("Duplicate"))
        .await
        .expect("first insert should commit");

    // The UNIQUE constraint on branches.name fires inside the second
    // command's transaction; its event must vanish with the rollback.
    let result = executor.execute(AddBranch::new("Duplicate")).await;
    assert!(result.is_err());

    assert_eq!(dal.outbox_record().count_pending().await.unwrap(), 1);

    let conn = dal.database.get_sqlite_connection().await.unwrap();
    let branches = conn.interact(|conn| count_branches(conn)).await.unwrap();
    assert_eq!(branches, 1);
}

#[tokio::test]
#[serial]
async fn test_events_persist_in_recording_order() {
    let fixture = get_or_init_fixture().await;
    let mut fixture = fixture.lock().unwrap();
    fixture.reset_database().await;

    let dal = fixture.get_dal();
    let executor = CommandExecutor::new(dal.clone());

    let names = vec!["North".to_string(), "South".to_string(), "East".to_string()];
    let ids = executor
        .execute(AddBranches {
            names: names.clone(),
        })
        .await
        .unwrap();
    assert_eq!(ids.len(), 3);

    // list_pending orders by outbox id; payloads must come back in the
    // order the handler recorded them.
    let pending = dal.outbox_record().list_pending(10).await.unwrap();
    assert_eq!(pending.len(), 3);

    let recorded_names: Vec<String> = pending
        .iter()
        .map(|r| {
            let payload: serde_json::Value = serde_json::from_str(&r.payload).unwrap();
            payload["name"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(recorded_names, names);

    let record_ids: Vec<i64> = pending.iter().map(|r| r.id).collect();
    let mut sorted = record_ids.clone();
    sorted.sort_unstable();
    assert_eq!(record_ids, sorted);
}

#[tokio::test]
#[serial]
async fn test_plain_command_writes_no_outbox_records() {
    let fixture = get_or_init_fixture().await;
    let mut fixture = fixture.lock().unwrap();
    fixture.reset_database().await;

    let dal = fixture.get_dal();
    let executor = CommandExecutor::new(dal.clone());

    executor
        .execute_plain(AddBranchSilently {
            name: "Quiet Branch".to_string(),
        })
        .await
        .expect("plain command should commit");

    assert_eq!(dal.outbox_record().count_pending().await.unwrap(), 0);

    let conn = dal.database.get_sqlite_connection().await.unwrap();
    let branches = conn.interact(|conn| count_branches(conn)).await.unwrap();
    assert_eq!(branches, 1);
}
