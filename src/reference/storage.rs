//! SQL for the read-only reference collections.
//!
//! The `put_*` writers exist for the owning collaborators and for seeding
//! test fixtures; the engines only read.

use rusqlite::{params, Connection, OptionalExtension};

use super::types::{Infection, Membership, Profile};
use crate::error::Result;

/// Loads every infection row, ordered by id.
pub fn load_infections(conn: &Connection) -> Result<Vec<Infection>> {
    let mut stmt = conn.prepare(
        r"
        SELECT id, name, window_period_max, treatment_period_min
        FROM infection_reference
        ORDER BY id
        ",
    )?;

    let infections = stmt
        .query_map([], |row| {
            Ok(Infection {
                id: row.get(0)?,
                name: row.get(1)?,
                window_period_max: row.get(2)?,
                treatment_period_min: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(infections)
}

/// Inserts or replaces an infection row.
pub fn put_infection(conn: &Connection, infection: &Infection) -> Result<()> {
    conn.execute(
        r"
        INSERT INTO infection_reference (id, name, window_period_max, treatment_period_min)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            window_period_max = excluded.window_period_max,
            treatment_period_min = excluded.treatment_period_min
        ",
        params![
            &infection.id,
            &infection.name,
            infection.window_period_max,
            infection.treatment_period_min,
        ],
    )?;
    Ok(())
}

/// Retrieves a profile by profile pseudonym.
pub fn get_profile(conn: &Connection, pseudonym: &str) -> Result<Option<Profile>> {
    let profile = conn
        .query_row(
            "SELECT pseudonym, display_name, avatar_path FROM profiles WHERE pseudonym = ?1",
            params![pseudonym],
            |row| {
                Ok(Profile {
                    pseudonym: row.get(0)?,
                    display_name: row.get(1)?,
                    avatar_path: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(profile)
}

/// Inserts or replaces a profile.
pub fn put_profile(conn: &Connection, profile: &Profile) -> Result<()> {
    conn.execute(
        r"
        INSERT INTO profiles (pseudonym, display_name, avatar_path)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(pseudonym) DO UPDATE SET
            display_name = excluded.display_name,
            avatar_path = excluded.avatar_path
        ",
        params![&profile.pseudonym, &profile.display_name, &profile.avatar_path],
    )?;
    Ok(())
}

/// Retrieves a membership by membership pseudonym.
pub fn get_membership(conn: &Connection, pseudonym: &str) -> Result<Option<Membership>> {
    let membership = conn
        .query_row(
            r"
            SELECT pseudonym, membership_type, start_date, end_date
            FROM memberships
            WHERE pseudonym = ?1
            ",
            params![pseudonym],
            |row| {
                Ok(Membership {
                    pseudonym: row.get(0)?,
                    membership_type: row.get(1)?,
                    start_date: row.get(2)?,
                    end_date: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(membership)
}

/// Inserts or replaces a membership.
pub fn put_membership(conn: &Connection, membership: &Membership) -> Result<()> {
    conn.execute(
        r"
        INSERT INTO memberships (pseudonym, membership_type, start_date, end_date)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(pseudonym) DO UPDATE SET
            membership_type = excluded.membership_type,
            start_date = excluded.start_date,
            end_date = excluded.end_date
        ",
        params![
            &membership.pseudonym,
            &membership.membership_type,
            membership.start_date,
            membership.end_date,
        ],
    )?;
    Ok(())
}
