//! SQLite storage for bounties and submissions
//!
//! Single persistence layer for the review engine. Reads are snapshot
//! queries; every mutation that touches winner flags or counters runs
//! through [`SubmissionStore::with_tx`] so invariant checks and counter
//! writes commit atomically or not at all.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row, Transaction};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{ReviewError, Result};
use crate::models::{Bounty, BountyType, RewardMap, Submission, SubmissionPage};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS bounties (
    id TEXT PRIMARY KEY,
    sponsor_id TEXT NOT NULL,
    title TEXT NOT NULL,
    rewards TEXT NOT NULL,
    deadline TEXT NOT NULL,
    bounty_type TEXT NOT NULL,
    winners_selected INTEGER NOT NULL DEFAULT 0,
    payments_made INTEGER NOT NULL DEFAULT 0,
    total_submissions INTEGER NOT NULL DEFAULT 0,
    is_winners_announced INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS submissions (
    id TEXT PRIMARY KEY,
    bounty_id TEXT NOT NULL REFERENCES bounties(id),
    talent_id TEXT NOT NULL,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    is_winner INTEGER NOT NULL DEFAULT 0,
    winner_position TEXT,
    is_paid INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_submissions_bounty
    ON submissions(bounty_id, created_at DESC, id DESC);
"#;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBounty {
    pub sponsor_id: String,
    pub title: String,
    pub rewards: RewardMap,
    pub deadline: DateTime<Utc>,
    #[serde(rename = "type", default = "default_bounty_type")]
    pub bounty_type: BountyType,
}

fn default_bounty_type() -> BountyType {
    BountyType::Fixed
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubmission {
    pub talent_id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
}

pub struct SubmissionStore {
    conn: Mutex<Connection>,
}

impl SubmissionStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Runs `f` inside a transaction, committing on success and rolling
    /// back on any error so no partial state is ever visible.
    pub(crate) fn with_tx<T>(&self, f: impl FnOnce(&Transaction) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    pub fn create_bounty(&self, new: NewBounty) -> Result<Bounty> {
        let bounty = Bounty {
            id: Uuid::new_v4().to_string(),
            sponsor_id: new.sponsor_id,
            title: new.title,
            rewards: new.rewards,
            deadline: new.deadline,
            bounty_type: new.bounty_type,
            winners_selected: 0,
            payments_made: 0,
            total_submissions: 0,
            is_winners_announced: false,
            created_at: Utc::now(),
        };
        let rewards_json = serde_json::to_string(&bounty.rewards)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO bounties (id, sponsor_id, title, rewards, deadline, bounty_type, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                bounty.id,
                bounty.sponsor_id,
                bounty.title,
                rewards_json,
                bounty.deadline.to_rfc3339(),
                bounty.bounty_type.as_str(),
                bounty.created_at.to_rfc3339(),
            ],
        )?;
        Ok(bounty)
    }

    pub fn get_bounty(&self, bounty_id: &str) -> Result<Bounty> {
        let conn = self.conn.lock().unwrap();
        query_bounty(&conn, bounty_id)
    }

    /// Inserts a submission and bumps the owning bounty's total in the
    /// same transaction.
    pub fn create_submission(&self, bounty_id: &str, new: NewSubmission) -> Result<Submission> {
        let submission = Submission {
            id: Uuid::new_v4().to_string(),
            bounty_id: bounty_id.to_string(),
            talent_id: new.talent_id,
            title: new.title,
            content: new.content,
            is_winner: false,
            winner_position: None,
            is_paid: false,
            created_at: Utc::now(),
        };
        self.with_tx(|tx| {
            // NotFound before insert so the caller gets the right error.
            get_bounty_tx(tx, bounty_id)?;
            tx.execute(
                "INSERT INTO submissions (id, bounty_id, talent_id, title, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    submission.id,
                    submission.bounty_id,
                    submission.talent_id,
                    submission.title,
                    submission.content,
                    submission.created_at.to_rfc3339(),
                ],
            )?;
            tx.execute(
                "UPDATE bounties SET total_submissions = total_submissions + 1 WHERE id = ?1",
                params![bounty_id],
            )?;
            Ok(())
        })?;
        Ok(submission)
    }

    pub fn get_submission(&self, submission_id: &str) -> Result<Submission> {
        let conn = self.conn.lock().unwrap();
        query_submission(&conn, submission_id)
    }

    /// Paginated, filtered listing ordered by creation time descending with
    /// identifier as tie-break, so pagination stays deterministic under
    /// concurrent inserts. `search_text` is a case-insensitive substring
    /// match on title and content; empty means no filter.
    pub fn list(
        &self,
        bounty_id: &str,
        search_text: &str,
        take: u32,
        skip: i64,
    ) -> Result<SubmissionPage> {
        if skip < 0 {
            return Err(ReviewError::OutOfRange {
                what: "skip",
                value: skip,
            });
        }
        let conn = self.conn.lock().unwrap();
        query_bounty(&conn, bounty_id)?;

        let filter = search_text.trim().to_lowercase();
        let total: u32 = conn.query_row(
            "SELECT COUNT(*) FROM submissions
             WHERE bounty_id = ?1
               AND (?2 = '' OR instr(lower(title), ?2) > 0 OR instr(lower(content), ?2) > 0)",
            params![bounty_id, filter],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(
            "SELECT id, bounty_id, talent_id, title, content, is_winner, winner_position, is_paid, created_at
             FROM submissions
             WHERE bounty_id = ?1
               AND (?2 = '' OR instr(lower(title), ?2) > 0 OR instr(lower(content), ?2) > 0)
             ORDER BY created_at DESC, id DESC
             LIMIT ?3 OFFSET ?4",
        )?;
        let items = stmt
            .query_map(params![bounty_id, filter, take, skip], submission_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(SubmissionPage { items, total })
    }

    /// Write path for the payment-execution collaborator, the sole writer
    /// of `is_paid`. Refuses to mark a non-winner paid since that would
    /// create a ledger inconsistency at the source.
    pub fn record_payment(&self, submission_id: &str, paid: bool) -> Result<Submission> {
        self.with_tx(|tx| {
            let submission = get_submission_tx(tx, submission_id)?;
            if paid && !submission.is_winner {
                return Err(ReviewError::LedgerInconsistent {
                    bounty_id: submission.bounty_id.clone(),
                    detail: format!("submission {} is not a winner", submission.id),
                });
            }
            tx.execute(
                "UPDATE submissions SET is_paid = ?1 WHERE id = ?2",
                params![paid, submission_id],
            )?;
            crate::ledger::recompute_tx(tx, &submission.bounty_id)?;
            get_submission_tx(tx, submission_id)
        })
    }
}

// ============================================================================
// Transaction-scoped helpers shared with the allocator, ledger and gate
// ============================================================================

pub(crate) fn get_bounty_tx(tx: &Transaction, bounty_id: &str) -> Result<Bounty> {
    query_bounty(tx, bounty_id)
}

pub(crate) fn get_submission_tx(tx: &Transaction, submission_id: &str) -> Result<Submission> {
    query_submission(tx, submission_id)
}

/// Identifier of the winning submission currently holding `rank`, if any.
pub(crate) fn position_holder_tx(
    tx: &Transaction,
    bounty_id: &str,
    rank: &str,
) -> Result<Option<String>> {
    let mut stmt = tx.prepare(
        "SELECT id FROM submissions
         WHERE bounty_id = ?1 AND is_winner = 1 AND winner_position = ?2",
    )?;
    let holder = stmt
        .query_row(params![bounty_id, rank], |row| row.get(0))
        .ok();
    Ok(holder)
}

pub(crate) fn set_winner_tx(tx: &Transaction, submission_id: &str, rank: &str) -> Result<()> {
    tx.execute(
        "UPDATE submissions SET is_winner = 1, winner_position = ?1 WHERE id = ?2",
        params![rank, submission_id],
    )?;
    Ok(())
}

pub(crate) fn clear_winner_tx(tx: &Transaction, submission_id: &str) -> Result<()> {
    tx.execute(
        "UPDATE submissions SET is_winner = 0, winner_position = NULL WHERE id = ?1",
        params![submission_id],
    )?;
    Ok(())
}

/// All current winners of a bounty as (submission id, rank label) pairs.
pub(crate) fn winners_tx(tx: &Transaction, bounty_id: &str) -> Result<Vec<(String, String)>> {
    let mut stmt = tx.prepare(
        "SELECT id, winner_position FROM submissions
         WHERE bounty_id = ?1 AND is_winner = 1 AND winner_position IS NOT NULL",
    )?;
    let winners = stmt
        .query_map(params![bounty_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(winners)
}

pub(crate) fn set_announced_tx(tx: &Transaction, bounty_id: &str) -> Result<()> {
    tx.execute(
        "UPDATE bounties SET is_winners_announced = 1 WHERE id = ?1",
        params![bounty_id],
    )?;
    Ok(())
}

pub(crate) fn update_counters_tx(
    tx: &Transaction,
    bounty_id: &str,
    winners_selected: u32,
    payments_made: u32,
) -> Result<()> {
    tx.execute(
        "UPDATE bounties SET winners_selected = ?1, payments_made = ?2 WHERE id = ?3",
        params![winners_selected, payments_made, bounty_id],
    )?;
    Ok(())
}

// ============================================================================
// Row mapping
// ============================================================================

const BOUNTY_COLUMNS: &str = "id, sponsor_id, title, rewards, deadline, bounty_type, \
     winners_selected, payments_made, total_submissions, is_winners_announced, created_at";

fn query_bounty(conn: &Connection, bounty_id: &str) -> Result<Bounty> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOUNTY_COLUMNS} FROM bounties WHERE id = ?1"
    ))?;
    let mut rows = stmt.query_map(params![bounty_id], bounty_from_row)?;
    match rows.next() {
        Some(row) => Ok(row?),
        None => Err(ReviewError::not_found("bounty", bounty_id)),
    }
}

fn query_submission(conn: &Connection, submission_id: &str) -> Result<Submission> {
    let mut stmt = conn.prepare(
        "SELECT id, bounty_id, talent_id, title, content, is_winner, winner_position, is_paid, created_at
         FROM submissions WHERE id = ?1",
    )?;
    let mut rows = stmt.query_map(params![submission_id], submission_from_row)?;
    match rows.next() {
        Some(row) => Ok(row?),
        None => Err(ReviewError::not_found("submission", submission_id)),
    }
}

fn bounty_from_row(row: &Row) -> rusqlite::Result<Bounty> {
    let rewards_json: String = row.get(3)?;
    let rewards: RewardMap = serde_json::from_str(&rewards_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;
    let bounty_type: String = row.get(5)?;
    Ok(Bounty {
        id: row.get(0)?,
        sponsor_id: row.get(1)?,
        title: row.get(2)?,
        rewards,
        deadline: parse_ts(row.get::<_, String>(4)?, 4)?,
        bounty_type: BountyType::parse(&bounty_type),
        winners_selected: row.get(6)?,
        payments_made: row.get(7)?,
        total_submissions: row.get(8)?,
        is_winners_announced: row.get(9)?,
        created_at: parse_ts(row.get::<_, String>(10)?, 10)?,
    })
}

fn submission_from_row(row: &Row) -> rusqlite::Result<Submission> {
    Ok(Submission {
        id: row.get(0)?,
        bounty_id: row.get(1)?,
        talent_id: row.get(2)?,
        title: row.get(3)?,
        content: row.get(4)?,
        is_winner: row.get(5)?,
        winner_position: row.get(6)?,
        is_paid: row.get(7)?,
        created_at: parse_ts(row.get::<_, String>(8)?, 8)?,
    })
}

fn parse_ts(raw: String, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_bounty(store: &SubmissionStore) -> Bounty {
        store
            .create_bounty(NewBounty {
                sponsor_id: "sponsor-1".to_string(),
                title: "Design a logo".to_string(),
                rewards: [("1".to_string(), 1000.0), ("2".to_string(), 500.0)]
                    .into_iter()
                    .collect(),
                deadline: Utc::now() + Duration::days(7),
                bounty_type: BountyType::Fixed,
            })
            .unwrap()
    }

    #[test]
    fn create_and_fetch_bounty() {
        let store = SubmissionStore::in_memory().unwrap();
        let bounty = sample_bounty(&store);
        let fetched = store.get_bounty(&bounty.id).unwrap();
        assert_eq!(fetched.title, "Design a logo");
        assert_eq!(fetched.rewards.len(), 2);
        assert_eq!(fetched.total_submissions, 0);
        assert!(!fetched.is_winners_announced);
    }

    #[test]
    fn missing_bounty_is_not_found() {
        let store = SubmissionStore::in_memory().unwrap();
        let err = store.get_bounty("nope").unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn submission_insert_bumps_total() {
        let store = SubmissionStore::in_memory().unwrap();
        let bounty = sample_bounty(&store);
        for i in 0..3 {
            store
                .create_submission(
                    &bounty.id,
                    NewSubmission {
                        talent_id: format!("talent-{i}"),
                        title: format!("entry {i}"),
                        content: String::new(),
                    },
                )
                .unwrap();
        }
        assert_eq!(store.get_bounty(&bounty.id).unwrap().total_submissions, 3);
    }

    #[test]
    fn list_paginates_with_total() {
        let store = SubmissionStore::in_memory().unwrap();
        let bounty = sample_bounty(&store);
        for i in 0..25 {
            store
                .create_submission(
                    &bounty.id,
                    NewSubmission {
                        talent_id: format!("talent-{i}"),
                        title: format!("entry {i}"),
                        content: String::new(),
                    },
                )
                .unwrap();
        }
        let page = store.list(&bounty.id, "", 10, 0).unwrap();
        assert_eq!(page.items.len(), 10);
        assert_eq!(page.total, 25);

        let second = store.list(&bounty.id, "", 10, 10).unwrap();
        assert_eq!(second.items.len(), 10);
        let first_ids: Vec<_> = page.items.iter().map(|s| &s.id).collect();
        assert!(second.items.iter().all(|s| !first_ids.contains(&&s.id)));
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let store = SubmissionStore::in_memory().unwrap();
        let bounty = sample_bounty(&store);
        store
            .create_submission(
                &bounty.id,
                NewSubmission {
                    talent_id: "t1".to_string(),
                    title: "Minimalist Logo Draft".to_string(),
                    content: "vector artwork".to_string(),
                },
            )
            .unwrap();
        store
            .create_submission(
                &bounty.id,
                NewSubmission {
                    talent_id: "t2".to_string(),
                    title: "Mascot concept".to_string(),
                    content: "hand drawn".to_string(),
                },
            )
            .unwrap();

        let page = store.list(&bounty.id, "LOGO", 10, 0).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].title, "Minimalist Logo Draft");

        // content matches too
        let page = store.list(&bounty.id, "drawn", 10, 0).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].talent_id, "t2");
    }

    #[test]
    fn negative_skip_is_out_of_range() {
        let store = SubmissionStore::in_memory().unwrap();
        let bounty = sample_bounty(&store);
        let err = store.list(&bounty.id, "", 10, -1).unwrap_err();
        assert_eq!(err.code(), "out_of_range");
    }

    #[test]
    fn payment_on_non_winner_is_rejected() {
        let store = SubmissionStore::in_memory().unwrap();
        let bounty = sample_bounty(&store);
        let sub = store
            .create_submission(
                &bounty.id,
                NewSubmission {
                    talent_id: "t1".to_string(),
                    title: "entry".to_string(),
                    content: String::new(),
                },
            )
            .unwrap();
        let err = store.record_payment(&sub.id, true).unwrap_err();
        assert_eq!(err.code(), "ledger_inconsistent");
        assert!(!store.get_submission(&sub.id).unwrap().is_paid);
    }
}
