//! SQL for the `connections` collection.
//!
//! Pair queries always match both directions because sender and recipient
//! are not canonically ordered.

use rusqlite::{params, Connection as DbConnection, OptionalExtension, Row};

use super::types::{Connection, ConnectionLevel, ConnectionStatus};
use crate::error::{CoreError, Result};

const COLUMNS: &str = "id, sender, recipient, level, status, created_at, updated_at, expires_at";

type RawRow = (String, String, String, i64, i64, i64, i64, Option<i64>);

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn from_raw(
    (id, sender, recipient, level, status, created_at, updated_at, expires_at): RawRow,
) -> Result<Connection> {
    let level = ConnectionLevel::from_code(level)
        .ok_or_else(|| CoreError::Storage(format!("Invalid level {level} on connection {id}")))?;
    let status = ConnectionStatus::from_code(status)
        .ok_or_else(|| CoreError::Storage(format!("Invalid status {status} on connection {id}")))?;
    Ok(Connection {
        id,
        sender,
        recipient,
        level,
        status,
        created_at,
        updated_at,
        expires_at,
    })
}

fn query(conn: &DbConnection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Connection>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, read_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(from_raw).collect()
}

/// Inserts a new connection record.
pub fn insert(conn: &DbConnection, connection: &Connection) -> Result<()> {
    conn.execute(
        &format!("INSERT INTO connections ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
        params![
            &connection.id,
            &connection.sender,
            &connection.recipient,
            connection.level.code(),
            connection.status.code(),
            connection.created_at,
            connection.updated_at,
            connection.expires_at,
        ],
    )?;
    Ok(())
}

/// Retrieves a connection by id.
pub fn get(conn: &DbConnection, id: &str) -> Result<Option<Connection>> {
    let raw = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM connections WHERE id = ?1"),
            params![id],
            read_row,
        )
        .optional()?;
    raw.map(from_raw).transpose()
}

/// Sets the status of a connection.
pub fn update_status(
    conn: &DbConnection,
    id: &str,
    status: ConnectionStatus,
    updated_at: i64,
) -> Result<()> {
    let rows = conn.execute(
        "UPDATE connections SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.code(), updated_at, id],
    )?;
    if rows == 0 {
        return Err(CoreError::NotFound(format!("Connection not found: {id}")));
    }
    Ok(())
}

/// Returns every record between two pseudonyms, in either direction.
pub fn between(conn: &DbConnection, a: &str, b: &str) -> Result<Vec<Connection>> {
    query(
        conn,
        &format!(
            r"
            SELECT {COLUMNS} FROM connections
            WHERE (sender = ?1 AND recipient = ?2) OR (sender = ?2 AND recipient = ?1)
            ORDER BY created_at, id
            "
        ),
        params![a, b],
    )
}

/// Returns the live records between two pseudonyms.
pub fn live_between(conn: &DbConnection, a: &str, b: &str, now: i64) -> Result<Vec<Connection>> {
    Ok(between(conn, a, b)?
        .into_iter()
        .filter(|c| c.is_live(now))
        .collect())
}

/// Returns the active record between two pseudonyms, if any.
pub fn active_between(conn: &DbConnection, a: &str, b: &str) -> Result<Option<Connection>> {
    Ok(between(conn, a, b)?
        .into_iter()
        .filter(|c| c.status == ConnectionStatus::Active)
        .max_by_key(|c| c.updated_at))
}

/// Retires pending records between the pair whose expiry has passed.
///
/// Returns the number of records retired.
pub fn retire_expired_between(conn: &DbConnection, a: &str, b: &str, now: i64) -> Result<usize> {
    let rows = conn.execute(
        r"
        UPDATE connections SET status = ?3, updated_at = ?4
        WHERE ((sender = ?1 AND recipient = ?2) OR (sender = ?2 AND recipient = ?1))
          AND status = ?5 AND expires_at IS NOT NULL AND expires_at < ?4
        ",
        params![
            a,
            b,
            ConnectionStatus::Cancelled.code(),
            now,
            ConnectionStatus::Pending.code(),
        ],
    )?;
    Ok(rows)
}

/// Returns every record where `pseudonym` is a participant.
pub fn for_participant(conn: &DbConnection, pseudonym: &str) -> Result<Vec<Connection>> {
    query(
        conn,
        &format!(
            r"
            SELECT {COLUMNS} FROM connections
            WHERE sender = ?1 OR recipient = ?1
            ORDER BY updated_at DESC, id
            "
        ),
        params![pseudonym],
    )
}

/// Returns the counterparts of `pseudonym`'s active connections at the given levels.
pub fn active_partners(
    conn: &DbConnection,
    pseudonym: &str,
    levels: &[ConnectionLevel],
) -> Result<Vec<String>> {
    let mut partners: Vec<String> = for_participant(conn, pseudonym)?
        .into_iter()
        .filter(|c| c.status == ConnectionStatus::Active && levels.contains(&c.level))
        .filter_map(|c| c.counterpart(pseudonym).map(str::to_string))
        .collect();
    partners.sort_unstable();
    partners.dedup();
    Ok(partners)
}

/// Deactivates every non-terminal record involving `pseudonym`.
///
/// Returns the number of records retired.
pub fn retire_for_participant(conn: &DbConnection, pseudonym: &str, now: i64) -> Result<usize> {
    let rows = conn.execute(
        r"
        UPDATE connections SET status = ?2, updated_at = ?3
        WHERE (sender = ?1 OR recipient = ?1) AND status < ?4
        ",
        params![
            pseudonym,
            ConnectionStatus::Deactivated.code(),
            now,
            ConnectionStatus::Rejected.code(),
        ],
    )?;
    Ok(rows)
}
