//! SQL for the `exposure_alerts` collection.

use rusqlite::{params, Connection, Row};

use super::types::{AlertStatus, ExposureAlert};
use crate::error::{CoreError, Result};

const COLUMNS: &str = "id, infection_id, sender, recipient, status, created_at, updated_at";

type RawRow = (String, String, String, String, i64, i64, i64);

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn from_raw(
    (id, infection_id, sender, recipient, status, created_at, updated_at): RawRow,
) -> Result<ExposureAlert> {
    let status = AlertStatus::from_code(status)
        .ok_or_else(|| CoreError::Storage(format!("Invalid status {status} on alert {id}")))?;
    Ok(ExposureAlert {
        id,
        infection_id,
        sender,
        recipient,
        status,
        created_at,
        updated_at,
    })
}

fn query(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<ExposureAlert>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, read_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(from_raw).collect()
}

/// Inserts a new edge.
pub fn insert(conn: &Connection, alert: &ExposureAlert) -> Result<()> {
    conn.execute(
        &format!("INSERT INTO exposure_alerts ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
        params![
            &alert.id,
            &alert.infection_id,
            &alert.sender,
            &alert.recipient,
            alert.status.code(),
            alert.created_at,
            alert.updated_at,
        ],
    )?;
    Ok(())
}

/// Sets the status of an edge.
pub fn set_status(conn: &Connection, id: &str, status: AlertStatus, updated_at: i64) -> Result<()> {
    let rows = conn.execute(
        "UPDATE exposure_alerts SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.code(), updated_at, id],
    )?;
    if rows == 0 {
        return Err(CoreError::NotFound(format!("Alert not found: {id}")));
    }
    Ok(())
}

/// Replaces the participant identifiers stored on an edge.
pub fn set_participants(
    conn: &Connection,
    id: &str,
    sender: &str,
    recipient: &str,
    updated_at: i64,
) -> Result<()> {
    conn.execute(
        "UPDATE exposure_alerts SET sender = ?1, recipient = ?2, updated_at = ?3 WHERE id = ?4",
        params![sender, recipient, updated_at, id],
    )?;
    Ok(())
}

/// Returns the directed edges from `sender` to `recipient` with a status.
pub fn directed_with_status(
    conn: &Connection,
    sender: &str,
    recipient: &str,
    status: AlertStatus,
) -> Result<Vec<ExposureAlert>> {
    query(
        conn,
        &format!(
            r"
            SELECT {COLUMNS} FROM exposure_alerts
            WHERE sender = ?1 AND recipient = ?2 AND status = ?3
            ORDER BY infection_id, created_at
            "
        ),
        params![sender, recipient, status.code()],
    )
}

/// Returns every edge between two pseudonyms, in either direction.
pub fn for_pair(conn: &Connection, a: &str, b: &str) -> Result<Vec<ExposureAlert>> {
    query(
        conn,
        &format!(
            r"
            SELECT {COLUMNS} FROM exposure_alerts
            WHERE (sender = ?1 AND recipient = ?2) OR (sender = ?2 AND recipient = ?1)
            ORDER BY infection_id, created_at, id
            "
        ),
        params![a, b],
    )
}

/// Returns the active edges between two pseudonyms, in either direction.
pub fn active_between(conn: &Connection, a: &str, b: &str) -> Result<Vec<ExposureAlert>> {
    Ok(for_pair(conn, a, b)?
        .into_iter()
        .filter(|alert| alert.status == AlertStatus::Active)
        .collect())
}

/// Returns the active outgoing edges of `sender` for one infection.
pub fn active_outgoing(
    conn: &Connection,
    sender: &str,
    infection_id: &str,
) -> Result<Vec<ExposureAlert>> {
    query(
        conn,
        &format!(
            r"
            SELECT {COLUMNS} FROM exposure_alerts
            WHERE sender = ?1 AND infection_id = ?2 AND status = ?3
            ORDER BY created_at, id
            "
        ),
        params![sender, infection_id, AlertStatus::Active.code()],
    )
}

/// Returns whether an edge with the given key and status exists.
pub fn exists(
    conn: &Connection,
    infection_id: &str,
    sender: &str,
    recipient: &str,
    status: AlertStatus,
) -> Result<bool> {
    let count: i64 = conn.query_row(
        r"
        SELECT COUNT(*) FROM exposure_alerts
        WHERE infection_id = ?1 AND sender = ?2 AND recipient = ?3 AND status = ?4
        ",
        params![infection_id, sender, recipient, status.code()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Retires every open edge involving `pseudonym`.
///
/// Pending requests expire while active and sent edges are deactivated.
/// Returns the number of edges retired.
pub fn retire_for_participant(conn: &Connection, pseudonym: &str, now: i64) -> Result<usize> {
    let expired = conn.execute(
        r"
        UPDATE exposure_alerts SET status = ?2, updated_at = ?3
        WHERE (sender = ?1 OR recipient = ?1) AND status = ?4
        ",
        params![
            pseudonym,
            AlertStatus::Expired.code(),
            now,
            AlertStatus::PendingRequest.code(),
        ],
    )?;
    let deactivated = conn.execute(
        r"
        UPDATE exposure_alerts SET status = ?2, updated_at = ?3
        WHERE (sender = ?1 OR recipient = ?1) AND status IN (?4, ?5)
        ",
        params![
            pseudonym,
            AlertStatus::Deactivated.code(),
            now,
            AlertStatus::Active.code(),
            AlertStatus::Sent.code(),
        ],
    )?;
    Ok(expired + deactivated)
}
