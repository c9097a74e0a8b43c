//! SQLite persistence for one day of a deployment.

use std::path::Path;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use finscan_models::AnalysisStatus;

use crate::error::StoreResult;

/// A persisted video record.
#[derive(Debug, Clone)]
pub struct VideoRecord {
    pub vid: i64,
    pub filename: String,
    pub duration: f64,
    pub description: String,
    pub fps: f64,
    pub creation_date: i64,
    pub width: i64,
    pub height: i64,
    pub variable_framerate: bool,
    pub uri: String,
}

impl VideoRecord {
    /// Build an unsaved record for a video file; `vid` is assigned on
    /// insert.
    pub fn new(
        filename: impl Into<String>,
        description: impl Into<String>,
        duration: f64,
        fps: f64,
        width: i64,
        height: i64,
    ) -> Self {
        let filename = filename.into();
        let uri = format!("file://{filename}");
        Self {
            vid: 0,
            filename,
            duration,
            description: description.into(),
            fps,
            creation_date: Utc::now().timestamp(),
            width,
            height,
            variable_framerate: false,
            uri,
        }
    }
}

/// A persisted analysis method record.
#[derive(Debug, Clone)]
pub struct MethodRecord {
    pub mid: i64,
    pub creation_date: i64,
    pub description: String,
    pub parameters: String,
    pub automated: bool,
    pub path: String,
}

/// A persisted analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisRecord {
    pub aid: i64,
    pub mid: i64,
    pub vid: i64,
    pub status: String,
    pub parameters: String,
    pub results: String,
}

/// Handle on one day's database.
pub struct DayStore {
    conn: Connection,
}

impl DayStore {
    /// Open (or create) the database at `path` and ensure the schema
    /// exists. An existing file's data is left untouched.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let existed = path.exists();
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        let store = Self { conn };
        store.migrate()?;
        if !existed {
            info!(db = %path.display(), "created new day database");
        } else {
            debug!(db = %path.display(), "reusing existing day database");
        }
        Ok(store)
    }

    /// In-memory database, for tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> StoreResult<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS video (
                vid                 INTEGER PRIMARY KEY AUTOINCREMENT,
                filename            TEXT    NOT NULL,
                duration            REAL    NOT NULL,
                description         TEXT    NOT NULL,
                fps                 REAL    NOT NULL,
                creation_date       INTEGER NOT NULL,
                width               INTEGER NOT NULL,
                height              INTEGER NOT NULL,
                variable_framerate  INTEGER NOT NULL DEFAULT 0,
                uri                 TEXT    NOT NULL
            );

            CREATE TABLE IF NOT EXISTS analysis_method (
                mid            INTEGER PRIMARY KEY AUTOINCREMENT,
                creation_date  INTEGER NOT NULL,
                description    TEXT    NOT NULL UNIQUE,
                parameters     TEXT    NOT NULL,
                automated      INTEGER NOT NULL,
                path           TEXT    NOT NULL
            );

            CREATE TABLE IF NOT EXISTS analysis (
                aid         INTEGER PRIMARY KEY AUTOINCREMENT,
                mid         INTEGER NOT NULL REFERENCES analysis_method (mid),
                vid         INTEGER NOT NULL REFERENCES video (vid),
                status      TEXT    NOT NULL,
                parameters  TEXT    NOT NULL,
                results     TEXT    NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_analysis_vid ON analysis (vid);
        ",
        )?;
        Ok(())
    }

    /// Insert a video record and return its assigned id.
    pub fn insert_video(&self, record: &VideoRecord) -> StoreResult<i64> {
        self.conn.execute(
            "INSERT INTO video
             (filename, duration, description, fps, creation_date,
              width, height, variable_framerate, uri)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.filename,
                record.duration,
                record.description,
                record.fps,
                record.creation_date,
                record.width,
                record.height,
                record.variable_framerate,
                record.uri,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Register an analysis method, keyed by its unique description.
    ///
    /// Exactly-once under repeated runs: a second registration with the
    /// same description returns the existing row's id without touching it.
    pub fn register_method(
        &self,
        description: &str,
        parameters: &str,
        path: &str,
    ) -> StoreResult<i64> {
        self.conn.execute(
            "INSERT INTO analysis_method
             (creation_date, description, parameters, automated, path)
             VALUES (?1, ?2, ?3, 1, ?4)
             ON CONFLICT (description) DO NOTHING",
            params![Utc::now().timestamp(), description, parameters, path],
        )?;
        let mid = self.conn.query_row(
            "SELECT mid FROM analysis_method WHERE description = ?1",
            params![description],
            |row| row.get(0),
        )?;
        Ok(mid)
    }

    /// Record one analysis run; always appends a new row.
    pub fn insert_analysis(
        &self,
        mid: i64,
        vid: i64,
        status: AnalysisStatus,
        results: &str,
    ) -> StoreResult<i64> {
        self.conn.execute(
            "INSERT INTO analysis (mid, vid, status, parameters, results)
             VALUES (?1, ?2, ?3, '', ?4)",
            params![mid, vid, status.as_str(), results],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Look up a video by its stored filename.
    pub fn video_by_filename(&self, filename: &str) -> StoreResult<Option<VideoRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT vid, filename, duration, description, fps, creation_date,
                        width, height, variable_framerate, uri
                 FROM video WHERE filename = ?1",
                params![filename],
                |row| {
                    Ok(VideoRecord {
                        vid: row.get(0)?,
                        filename: row.get(1)?,
                        duration: row.get(2)?,
                        description: row.get(3)?,
                        fps: row.get(4)?,
                        creation_date: row.get(5)?,
                        width: row.get(6)?,
                        height: row.get(7)?,
                        variable_framerate: row.get(8)?,
                        uri: row.get(9)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    /// Analysis runs recorded for a video, oldest first.
    pub fn analyses_for_video(&self, vid: i64) -> StoreResult<Vec<AnalysisRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT aid, mid, vid, status, parameters, results
             FROM analysis WHERE vid = ?1 ORDER BY aid",
        )?;
        let rows = stmt.query_map(params![vid], |row| {
            Ok(AnalysisRecord {
                aid: row.get(0)?,
                mid: row.get(1)?,
                vid: row.get(2)?,
                status: row.get(3)?,
                parameters: row.get(4)?,
                results: row.get(5)?,
            })
        })?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Look up a method by its unique description.
    pub fn method_by_description(&self, description: &str) -> StoreResult<Option<MethodRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT mid, creation_date, description, parameters, automated, path
                 FROM analysis_method WHERE description = ?1",
                params![description],
                |row| {
                    Ok(MethodRecord {
                        mid: row.get(0)?,
                        creation_date: row.get(1)?,
                        description: row.get(2)?,
                        parameters: row.get(3)?,
                        automated: row.get(4)?,
                        path: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    /// Number of analysis runs recorded for a video.
    pub fn analysis_count_for_video(&self, vid: i64) -> StoreResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM analysis WHERE vid = ?1",
            params![vid],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Number of videos recorded in this day's database.
    pub fn video_count(&self) -> StoreResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM video", [], |row| row.get(0))?;
        Ok(count)
    }
}
