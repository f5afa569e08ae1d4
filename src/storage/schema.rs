//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Swapi-Harvest database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track harvest runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- Resolved characters; list columns hold delimited names
CREATE TABLE IF NOT EXISTS characters (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    person_id INTEGER NOT NULL,
    birth_year VARCHAR(100) NOT NULL,
    eye_color VARCHAR(100) NOT NULL,
    films VARCHAR(200) NOT NULL,
    gender VARCHAR(100) NOT NULL,
    hair_color VARCHAR(100) NOT NULL,
    height VARCHAR(100) NOT NULL,
    home_world VARCHAR(100) NOT NULL,
    mass VARCHAR(100) NOT NULL,
    name VARCHAR(100) NOT NULL,
    skin_color VARCHAR(100) NOT NULL,
    species VARCHAR(200) NOT NULL,
    starships VARCHAR(200) NOT NULL,
    vehicles VARCHAR(200) NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_characters_person ON characters(person_id);
"#;

/// Drops every table created by [`SCHEMA_SQL`]
pub const DROP_SQL: &str = r#"
DROP TABLE IF EXISTS characters;
DROP TABLE IF EXISTS runs;
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

/// Drops and recreates all tables
pub fn reset_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(DROP_SQL)?;
    initialize_schema(conn)
}
