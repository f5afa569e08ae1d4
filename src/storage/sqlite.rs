//! SQLite storage implementation
//!
//! This module provides the SQLite record sink for [`Character`] records and
//! the run bookkeeping used by the CLI.

use crate::record::Character;
use crate::storage::schema::{initialize_schema, reset_schema};
use crate::storage::traits::{RecordSink, SinkError, SinkResult};
use crate::storage::{RunRecord, RunStatus};
use crate::HarvestError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite storage backend
///
/// The connection sits behind a mutex so batches dispatched concurrently
/// write one transaction at a time.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Opens (or creates) the database at `path` and initializes its schema
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> SinkResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| SinkError::Poisoned(e.to_string()))
    }

    /// Drops and recreates every table
    pub fn reset(&self) -> SinkResult<()> {
        let conn = self.lock()?;
        reset_schema(&conn)?;
        Ok(())
    }

    // ===== Run Management =====

    pub fn create_run(&self, config_hash: &str) -> SinkResult<i64> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Sets the final status of a run and stamps its finish time
    pub fn finish_run(&self, run_id: i64, status: RunStatus) -> SinkResult<()> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        Ok(())
    }

    pub fn latest_run(&self) -> SinkResult<Option<RunRecord>> {
        let conn = self.lock()?;
        let run = conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    Ok(RunRecord {
                        id: row.get(0)?,
                        started_at: row.get(1)?,
                        finished_at: row.get(2)?,
                        config_hash: row.get(3)?,
                        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
                            .unwrap_or(RunStatus::Failed),
                    })
                },
            )
            .optional()?;
        Ok(run)
    }

    // ===== Characters =====

    pub fn count_characters(&self) -> SinkResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM characters", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Loads all stored characters ordered by person id
    pub fn load_characters(&self) -> SinkResult<Vec<Character>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT person_id, birth_year, eye_color, films, gender, hair_color, height,
             home_world, mass, name, skin_color, species, starships, vehicles
             FROM characters ORDER BY person_id, id",
        )?;

        let characters = stmt
            .query_map([], |row| {
                Ok(Character {
                    person_id: row.get(0)?,
                    birth_year: row.get(1)?,
                    eye_color: row.get(2)?,
                    films: row.get(3)?,
                    gender: row.get(4)?,
                    hair_color: row.get(5)?,
                    height: row.get(6)?,
                    home_world: row.get(7)?,
                    mass: row.get(8)?,
                    name: row.get(9)?,
                    skin_color: row.get(10)?,
                    species: row.get(11)?,
                    starships: row.get(12)?,
                    vehicles: row.get(13)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(characters)
    }
}

impl RecordSink<Character> for SqliteStorage {
    fn store(&self, records: &[Character]) -> SinkResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO characters (person_id, birth_year, eye_color, films, gender,
                 hair_color, height, home_world, mass, name, skin_color, species, starships, vehicles)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            )?;
            for c in records {
                stmt.execute(params![
                    c.person_id,
                    c.birth_year,
                    c.eye_color,
                    c.films,
                    c.gender,
                    c.hair_color,
                    c.height,
                    c.home_world,
                    c.mass,
                    c.name,
                    c.skin_color,
                    c.species,
                    c.starships,
                    c.vehicles,
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!("Stored {} characters", records.len());
        Ok(())
    }
}
