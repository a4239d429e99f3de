//! Database migrations

use crate::error::Result;
use rusqlite::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub fn run(conn: &mut Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Migration to version 1: catalog mirror
fn migrate_v1(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );
        CREATE TABLE IF NOT EXISTS places (
            list TEXT NOT NULL,
            id INTEGER NOT NULL,
            title TEXT NOT NULL,
            subtitle TEXT NOT NULL DEFAULT '',
            region TEXT,
            country_id INTEGER,
            parent_id INTEGER,
            latitude REAL,
            longitude REAL,
            visitors INTEGER NOT NULL DEFAULT 0,
            visible INTEGER NOT NULL DEFAULT 1,
            synthetic INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (list, id)
        );
        CREATE INDEX IF NOT EXISTS idx_places_parent ON places(list, parent_id);
        CREATE INDEX IF NOT EXISTS idx_places_title ON places(list, title COLLATE NOCASE);
        CREATE TABLE IF NOT EXISTS map_pins (
            list TEXT NOT NULL,
            id INTEGER NOT NULL,
            title TEXT NOT NULL,
            latitude REAL NOT NULL,
            longitude REAL NOT NULL,
            PRIMARY KEY (list, id)
        );
        CREATE TABLE IF NOT EXISTS photos (
            id INTEGER PRIMARY KEY,
            location_id INTEGER NOT NULL,
            user_id INTEGER,
            url TEXT NOT NULL,
            caption TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_photos_location ON photos(location_id, created_at DESC);
        CREATE TABLE IF NOT EXISTS posts (
            id INTEGER PRIMARY KEY,
            location_id INTEGER NOT NULL,
            user_id INTEGER,
            text TEXT NOT NULL,
            created_at INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_posts_location ON posts(location_id, created_at DESC);
        INSERT INTO schema_version (version) VALUES (1);",
    )?;
    tx.commit()?;

    tracing::info!("Migrated database to version 1");
    Ok(())
}

/// Migration to version 2: user-scoped state and leaderboards
fn migrate_v2(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS visits (
            list TEXT NOT NULL,
            id INTEGER NOT NULL,
            PRIMARY KEY (list, id)
        );
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            full_name TEXT NOT NULL,
            country TEXT,
            picture_url TEXT
        );
        CREATE TABLE IF NOT EXISTS rankings (
            list TEXT NOT NULL,
            page INTEGER NOT NULL,
            id INTEGER NOT NULL,
            rank INTEGER NOT NULL,
            full_name TEXT NOT NULL,
            visited INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (list, page, id)
        );
        CREATE INDEX IF NOT EXISTS idx_rankings_rank ON rankings(list, rank);
        INSERT INTO schema_version (version) VALUES (2);",
    )?;
    tx.commit()?;

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            [name],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_migrations() {
        let mut conn = Connection::open_in_memory().unwrap();
        run(&mut conn).unwrap();

        let version = get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_migrations_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        run(&mut conn).unwrap();
        run(&mut conn).unwrap(); // Should not fail

        let version = get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_migration_v2_creates_user_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        run(&mut conn).unwrap();

        for table in ["places", "map_pins", "visits", "users", "rankings"] {
            assert!(table_exists(&conn, table), "missing table {table}");
        }
    }
}
