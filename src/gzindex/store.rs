//! C3 — SQLite-backed sidecar index store.
//!
//! Mirrors the schema and transactional rebuild discipline of the original
//! indexer's raw `sqlite3` usage: one write transaction per rebuild
//! (delete-then-insert), WAL mode so reads never block on it.
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::gzindex::error::IndexError;
use crate::gzindex::model::{Checkpoint, Chunk, FileIdentity};

pub struct IndexStore {
    conn: Connection,
}

impl IndexStore {
    pub fn open(idx_path: &Path) -> Result<Self, IndexError> {
        let conn = Connection::open(idx_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS files (
                id INTEGER PRIMARY KEY,
                logical_name TEXT UNIQUE NOT NULL,
                byte_size INTEGER NOT NULL,
                mtime_unix INTEGER NOT NULL,
                sha256_hex TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS chunks (
                id INTEGER PRIMARY KEY,
                file_id INTEGER NOT NULL,
                chunk_idx INTEGER NOT NULL,
                c_offset INTEGER NOT NULL,
                c_size INTEGER NOT NULL,
                uc_offset INTEGER NOT NULL,
                uc_size INTEGER NOT NULL,
                num_events INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS chunks_file_idx ON chunks(file_id, chunk_idx);
            CREATE TABLE IF NOT EXISTS checkpoints (
                id INTEGER PRIMARY KEY,
                file_id INTEGER NOT NULL,
                uc_offset INTEGER NOT NULL,
                c_offset INTEGER NOT NULL,
                bits INTEGER NOT NULL,
                dict_compressed BLOB NOT NULL
            );
            CREATE INDEX IF NOT EXISTS checkpoints_file_uc_off_idx ON checkpoints(file_id, uc_offset);
            CREATE TABLE IF NOT EXISTS metadata (
                file_id INTEGER PRIMARY KEY,
                chunk_size INTEGER NOT NULL,
                checkpoint_interval INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(Self { conn })
    }

    pub fn get_file_identity(&self, logical_name: &str) -> Result<Option<FileIdentity>, IndexError> {
        let row = self
            .conn
            .query_row(
                "SELECT logical_name, byte_size, mtime_unix, sha256_hex FROM files WHERE logical_name = ?1",
                params![logical_name],
                |r| {
                    Ok(FileIdentity {
                        logical_name: r.get(0)?,
                        byte_size: r.get(1)?,
                        mtime_unix: r.get(2)?,
                        sha256_hex: r.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Start a transactional rebuild: open `BEGIN IMMEDIATE`, delete any
    /// existing rows for this logical name, upsert the file identity, and
    /// return the `file_id` new rows should be inserted under. Call
    /// [`commit_rebuild`] to finish, or drop the store (or let an error
    /// propagate) to roll back.
    pub fn begin_rebuild(&mut self, identity: &FileIdentity) -> Result<i64, IndexError> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        let file_id: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM files WHERE logical_name = ?1",
                params![identity.logical_name],
                |r| r.get(0),
            )
            .optional()?;
        let file_id = match file_id {
            Some(id) => {
                self.conn.execute("DELETE FROM chunks WHERE file_id = ?1", params![id])?;
                self.conn.execute("DELETE FROM checkpoints WHERE file_id = ?1", params![id])?;
                self.conn.execute(
                    "UPDATE files SET byte_size=?2, mtime_unix=?3, sha256_hex=?4 WHERE id=?1",
                    params![id, identity.byte_size, identity.mtime_unix, identity.sha256_hex],
                )?;
                id
            }
            None => {
                self.conn.execute(
                    "INSERT INTO files (logical_name, byte_size, mtime_unix, sha256_hex) VALUES (?1, ?2, ?3, ?4)",
                    params![identity.logical_name, identity.byte_size, identity.mtime_unix, identity.sha256_hex],
                )?;
                self.conn.last_insert_rowid()
            }
        };
        Ok(file_id)
    }

    pub fn put_chunk(&mut self, file_id: i64, c: &Chunk) -> Result<(), IndexError> {
        self.conn.execute(
            "INSERT INTO chunks (file_id, chunk_idx, c_offset, c_size, uc_offset, uc_size, num_events)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![file_id, c.chunk_idx, c.c_offset, c.c_size, c.uc_offset, c.uc_size, c.num_events],
        )?;
        Ok(())
    }

    pub fn put_checkpoint(&mut self, file_id: i64, cp: &Checkpoint) -> Result<(), IndexError> {
        self.conn.execute(
            "INSERT INTO checkpoints (file_id, uc_offset, c_offset, bits, dict_compressed)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![file_id, cp.uc_offset, cp.c_offset, cp.bits, cp.dict_compressed],
        )?;
        Ok(())
    }

    pub fn commit_rebuild(&mut self, file_id: i64, chunk_size: u64, checkpoint_interval: u64) -> Result<(), IndexError> {
        self.conn.execute(
            "INSERT INTO metadata (file_id, chunk_size, checkpoint_interval) VALUES (?1, ?2, ?3)
             ON CONFLICT(file_id) DO UPDATE SET chunk_size=excluded.chunk_size, checkpoint_interval=excluded.checkpoint_interval",
            params![file_id, chunk_size, checkpoint_interval],
        )?;
        self.conn.execute_batch("COMMIT")?;
        debug!(file_id, "index rebuild committed");
        Ok(())
    }

    pub fn file_id(&self, logical_name: &str) -> Result<Option<i64>, IndexError> {
        let id = self
            .conn
            .query_row("SELECT id FROM files WHERE logical_name = ?1", params![logical_name], |r| r.get(0))
            .optional()?;
        Ok(id)
    }

    /// Nearest checkpoint at or below `uc_target`, falling back to the
    /// smallest available checkpoint when `uc_target` is below the first
    /// real one (see DESIGN.md Open Question 1).
    pub fn find_checkpoint(&self, file_id: i64, uc_target: u64) -> Result<Option<Checkpoint>, IndexError> {
        let found = self
            .conn
            .query_row(
                "SELECT uc_offset, c_offset, bits, dict_compressed FROM checkpoints
                 WHERE file_id = ?1 AND uc_offset <= ?2 ORDER BY uc_offset DESC LIMIT 1",
                params![file_id, uc_target],
                Self::row_to_checkpoint,
            )
            .optional()?;
        if found.is_some() {
            return Ok(found);
        }
        let smallest = self
            .conn
            .query_row(
                "SELECT uc_offset, c_offset, bits, dict_compressed FROM checkpoints
                 WHERE file_id = ?1 ORDER BY uc_offset ASC LIMIT 1",
                params![file_id],
                Self::row_to_checkpoint,
            )
            .optional()?;
        Ok(smallest)
    }

    pub fn iter_chunks(&self, file_id: i64) -> Result<Vec<Chunk>, IndexError> {
        let mut stmt = self.conn.prepare(
            "SELECT chunk_idx, c_offset, c_size, uc_offset, uc_size, num_events FROM chunks
             WHERE file_id = ?1 ORDER BY chunk_idx ASC",
        )?;
        let rows = stmt
            .query_map(params![file_id], |r| {
                Ok(Chunk {
                    chunk_idx: r.get(0)?,
                    c_offset: r.get(1)?,
                    c_size: r.get(2)?,
                    uc_offset: r.get(3)?,
                    uc_size: r.get(4)?,
                    num_events: r.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn row_to_checkpoint(r: &rusqlite::Row) -> rusqlite::Result<Checkpoint> {
        Ok(Checkpoint {
            uc_offset: r.get(0)?,
            c_offset: r.get(1)?,
            bits: r.get::<_, i64>(2)? as u8,
            dict_compressed: r.get(3)?,
        })
    }
}
