//! The `regions` table.
//!
//! One row per region key, replaced wholesale on every sync. Records with
//! no region are stored under [`UNKNOWN_REGION`] with `unlabelled` set, so
//! they stay apart from any region the feed itself calls `"Unknown"`.
//!
//! [`UNKNOWN_REGION`]: epi_risk_case_models::UNKNOWN_REGION

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use duckdb::Connection;
use epi_risk_case_models::RegionalAggregate;
use epi_risk_database_models::StoredRegion;

use crate::DbError;

const META_LAST_REFRESHED: &str = "last_refreshed";

const SELECT_COLUMNS: &str = "region, active, deceased, migrated, recovered, \
     male, female, gender_unknown, total, last_updated::TEXT, unlabelled";

/// Opens (or creates) the regions database at `path` and ensures the
/// schema exists.
///
/// # Errors
///
/// Returns [`DbError`] if the directory, connection, or schema cannot be
/// created.
pub fn open(path: &Path) -> Result<Connection, DbError> {
    if let Some(parent) = path.parent() {
        crate::paths::ensure_dir(parent)?;
    }

    log::debug!("Opening regions database at {}", path.display());
    let conn = Connection::open(path)?;
    create_schema(&conn)?;
    Ok(conn)
}

/// Opens a throwaway in-memory database with the schema in place.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema cannot be created.
pub fn open_in_memory() -> Result<Connection, DbError> {
    let conn = Connection::open_in_memory()?;
    create_schema(&conn)?;
    Ok(conn)
}

fn create_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS regions (
            region TEXT NOT NULL,
            unlabelled BOOLEAN NOT NULL,
            active UBIGINT NOT NULL,
            deceased UBIGINT NOT NULL,
            migrated UBIGINT NOT NULL,
            recovered UBIGINT NOT NULL,
            male UBIGINT NOT NULL,
            female UBIGINT NOT NULL,
            gender_unknown UBIGINT NOT NULL,
            total UBIGINT NOT NULL,
            last_updated TIMESTAMP NOT NULL,
            PRIMARY KEY (region, unlabelled)
        );

        CREATE TABLE IF NOT EXISTS _meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )?;

    Ok(())
}

/// Upserts one row per region, stamping each with `updated_at`.
///
/// Blank keys are stored as [`UNKNOWN_REGION`] with `unlabelled` set.
/// Aggregates sharing a stored key are summed before writing. The whole
/// batch is written in one transaction.
///
/// Returns the number of rows written.
///
/// # Errors
///
/// Returns [`DbError`] if any write fails; nothing is committed in that
/// case.
///
/// [`UNKNOWN_REGION`]: epi_risk_case_models::UNKNOWN_REGION
pub fn upsert_regions(
    conn: &Connection,
    aggregates: &[RegionalAggregate],
    updated_at: DateTime<Utc>,
) -> Result<u64, DbError> {
    let mut merged: BTreeMap<(&str, bool), RegionalAggregate> = BTreeMap::new();
    for agg in aggregates {
        let label = agg.region_label();
        merged
            .entry((label, agg.is_unlabelled()))
            .or_insert_with(|| RegionalAggregate::new(label))
            .merge(agg);
    }

    let stamp = updated_at.format("%Y-%m-%d %H:%M:%S").to_string();

    conn.execute_batch("BEGIN TRANSACTION")?;
    match write_rows(conn, &merged, &stamp) {
        Ok(written) => {
            conn.execute_batch("COMMIT")?;
            log::info!("Upserted {written} regions");
            Ok(written)
        }
        Err(e) => {
            conn.execute_batch("ROLLBACK").ok();
            Err(e)
        }
    }
}

fn write_rows(
    conn: &Connection,
    rows: &BTreeMap<(&str, bool), RegionalAggregate>,
    stamp: &str,
) -> Result<u64, DbError> {
    let mut stmt = conn.prepare(
        "INSERT INTO regions (
            region, unlabelled, active, deceased, migrated, recovered,
            male, female, gender_unknown, total, last_updated
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, CAST(? AS TIMESTAMP))
        ON CONFLICT (region, unlabelled) DO UPDATE SET
            active = EXCLUDED.active,
            deceased = EXCLUDED.deceased,
            migrated = EXCLUDED.migrated,
            recovered = EXCLUDED.recovered,
            male = EXCLUDED.male,
            female = EXCLUDED.female,
            gender_unknown = EXCLUDED.gender_unknown,
            total = EXCLUDED.total,
            last_updated = EXCLUDED.last_updated",
    )?;

    let mut written = 0u64;
    for (&(_, unlabelled), agg) in rows {
        let rows = stmt.execute(duckdb::params![
            agg.region,
            unlabelled,
            agg.active,
            agg.deceased,
            agg.migrated,
            agg.recovered,
            agg.male,
            agg.female,
            agg.gender_unknown,
            agg.total,
            stamp,
        ])?;
        written += u64::try_from(rows).unwrap_or(0);
    }

    Ok(written)
}

/// Returns every stored region, ordered by name.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a timestamp cannot be read.
pub fn all_regions(conn: &Connection) -> Result<Vec<StoredRegion>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM regions ORDER BY region, unlabelled"
    ))?;
    let rows = stmt.query_map([], read_row)?;

    rows.map(|row| row.map_err(DbError::from).and_then(into_stored))
        .collect()
}

/// Finds the region whose name contains `name`, ignoring case.
///
/// An exact (case-insensitive) match wins; otherwise the alphabetically
/// first partial match is returned. A named region wins over the
/// placeholder row sharing its key. A blank `name` matches nothing.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a timestamp cannot be read.
pub fn find_region(conn: &Connection, name: &str) -> Result<Option<StoredRegion>, DbError> {
    let needle = name.trim();
    if needle.is_empty() {
        return Ok(None);
    }

    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM regions
         WHERE contains(lower(region), lower(?))
         ORDER BY lower(region) = lower(?) DESC, region, unlabelled
         LIMIT 1"
    ))?;

    match stmt.query_row([needle, needle], read_row) {
        Ok(raw) => into_stored(raw).map(Some),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(DbError::DuckDb(e)),
    }
}

/// Records the feed's own refresh time.
///
/// # Errors
///
/// Returns [`DbError`] if the upsert fails.
pub fn set_last_refreshed(conn: &Connection, refreshed: DateTime<Utc>) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO _meta (key, value) VALUES (?, ?)
         ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
        duckdb::params![META_LAST_REFRESHED, refreshed.to_rfc3339()],
    )?;
    Ok(())
}

/// Returns the feed refresh time stored by the last sync, if any.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or the stored value is not a
/// timestamp.
pub fn last_refreshed(conn: &Connection) -> Result<Option<DateTime<Utc>>, DbError> {
    let mut stmt = conn.prepare("SELECT value FROM _meta WHERE key = ?")?;
    let value: String = match stmt.query_row([META_LAST_REFRESHED], |row| row.get(0)) {
        Ok(v) => v,
        Err(duckdb::Error::QueryReturnedNoRows) => return Ok(None),
        Err(e) => return Err(DbError::DuckDb(e)),
    };

    DateTime::parse_from_rfc3339(&value)
        .map(|dt| Some(dt.with_timezone(&Utc)))
        .map_err(|e| DbError::Conversion {
            message: format!("stored refresh time {value:?}: {e}"),
        })
}

type RawRow = (RegionalAggregate, String, bool);

fn read_row(row: &duckdb::Row<'_>) -> duckdb::Result<RawRow> {
    Ok((
        RegionalAggregate {
            region: row.get(0)?,
            active: row.get(1)?,
            deceased: row.get(2)?,
            migrated: row.get(3)?,
            recovered: row.get(4)?,
            male: row.get(5)?,
            female: row.get(6)?,
            gender_unknown: row.get(7)?,
            total: row.get(8)?,
        },
        row.get(9)?,
        row.get(10)?,
    ))
}

fn into_stored((aggregate, last_updated, unlabelled): RawRow) -> Result<StoredRegion, DbError> {
    let last_updated = parse_timestamp(&last_updated).ok_or_else(|| DbError::Conversion {
        message: format!("last_updated {last_updated:?} for {:?}", aggregate.region),
    })?;
    Ok(StoredRegion {
        aggregate,
        unlabelled,
        last_updated,
    })
}

/// Parses `DuckDB`'s `TIMESTAMP::TEXT` output, with or without fractional
/// seconds.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
