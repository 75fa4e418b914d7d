//! SQL for the `health_status` projection and the `test_results` ledger.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::types::{HealthStatusCode, HealthStatusRecord, TestResult, TestSubmission};
use crate::error::{CoreError, Result};

/// Document key for a projection row.
#[must_use]
pub fn doc_id(pseudonym: &str, infection_id: &str) -> String {
    format!("{pseudonym}_{infection_id}")
}

type RawRecord = (String, String, i64, Option<i64>, bool, i64);

fn read_record(row: &Row<'_>) -> rusqlite::Result<RawRecord> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn from_raw(
    (pseudonym, infection_id, code, status_date, new_alert, updated_at): RawRecord,
) -> Result<HealthStatusRecord> {
    let status = HealthStatusCode::from_code(code).ok_or_else(|| {
        CoreError::Storage(format!("Invalid health status {code} for {infection_id}"))
    })?;
    Ok(HealthStatusRecord {
        pseudonym,
        infection_id,
        status,
        status_date,
        new_alert,
        updated_at,
    })
}

/// Retrieves the projection for one key.
pub fn get(
    conn: &Connection,
    pseudonym: &str,
    infection_id: &str,
) -> Result<Option<HealthStatusRecord>> {
    let raw = conn
        .query_row(
            r"
            SELECT pseudonym, infection_id, health_status, status_date, new_alert, updated_at
            FROM health_status
            WHERE id = ?1
            ",
            params![doc_id(pseudonym, infection_id)],
            read_record,
        )
        .optional()?;
    raw.map(from_raw).transpose()
}

/// Retrieves every stored projection for a pseudonym.
pub fn list(conn: &Connection, pseudonym: &str) -> Result<Vec<HealthStatusRecord>> {
    let mut stmt = conn.prepare(
        r"
        SELECT pseudonym, infection_id, health_status, status_date, new_alert, updated_at
        FROM health_status
        WHERE pseudonym = ?1
        ORDER BY infection_id
        ",
    )?;
    let rows = stmt
        .query_map(params![pseudonym], read_record)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(from_raw).collect()
}

/// Writes a projection, replacing any existing row for the key.
pub fn upsert(conn: &Connection, record: &HealthStatusRecord) -> Result<()> {
    conn.execute(
        r"
        INSERT INTO health_status
            (id, pseudonym, infection_id, health_status, status_date, new_alert, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(id) DO UPDATE SET
            health_status = excluded.health_status,
            status_date = excluded.status_date,
            new_alert = excluded.new_alert,
            updated_at = excluded.updated_at
        ",
        params![
            doc_id(&record.pseudonym, &record.infection_id),
            &record.pseudonym,
            &record.infection_id,
            record.status.code(),
            record.status_date,
            record.new_alert,
            record.updated_at,
        ],
    )?;
    Ok(())
}

/// Creates a not-tested row unless one exists.
///
/// Returns whether a row was created.
pub fn seed_not_tested(
    conn: &Connection,
    pseudonym: &str,
    infection_id: &str,
    now: i64,
) -> Result<bool> {
    let rows = conn.execute(
        r"
        INSERT OR IGNORE INTO health_status
            (id, pseudonym, infection_id, health_status, status_date, new_alert, updated_at)
        VALUES (?1, ?2, ?3, ?4, NULL, 0, ?5)
        ",
        params![
            doc_id(pseudonym, infection_id),
            pseudonym,
            infection_id,
            HealthStatusCode::NotTested.code(),
            now,
        ],
    )?;
    Ok(rows > 0)
}

/// Sets the unread flag. Returns whether a row matched.
pub fn set_new_alert(
    conn: &Connection,
    pseudonym: &str,
    infection_id: &str,
    new_alert: bool,
) -> Result<bool> {
    let rows = conn.execute(
        "UPDATE health_status SET new_alert = ?1 WHERE id = ?2",
        params![new_alert, doc_id(pseudonym, infection_id)],
    )?;
    Ok(rows > 0)
}

/// Deletes every projection row for a pseudonym.
pub fn delete_for(conn: &Connection, pseudonym: &str) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM health_status WHERE pseudonym = ?1",
        params![pseudonym],
    )?)
}

/// Appends a result to the ledger.
pub fn append_result(
    conn: &Connection,
    pseudonym: &str,
    submission: &TestSubmission,
    submitted_at: i64,
) -> Result<i64> {
    conn.execute(
        r"
        INSERT INTO test_results (pseudonym, infection_id, positive, test_date, submitted_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ",
        params![
            pseudonym,
            &submission.infection_id,
            submission.positive,
            submission.test_date,
            submitted_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Retrieves the ledger for a test pseudonym, oldest first.
pub fn results_for(conn: &Connection, pseudonym: &str) -> Result<Vec<TestResult>> {
    let mut stmt = conn.prepare(
        r"
        SELECT id, pseudonym, infection_id, positive, test_date, submitted_at
        FROM test_results
        WHERE pseudonym = ?1
        ORDER BY test_date, id
        ",
    )?;
    let results = stmt
        .query_map(params![pseudonym], |row| {
            Ok(TestResult {
                id: row.get(0)?,
                pseudonym: row.get(1)?,
                infection_id: row.get(2)?,
                positive: row.get(3)?,
                test_date: row.get(4)?,
                submitted_at: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(results)
}

/// Deletes the ledger for a test pseudonym.
pub fn delete_results_for(conn: &Connection, pseudonym: &str) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM test_results WHERE pseudonym = ?1",
        params![pseudonym],
    )?)
}
