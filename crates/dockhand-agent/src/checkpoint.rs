use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use dockhand_core::config::{CheckpointBackend, CheckpointConfig};
use dockhand_core::error::{DockhandError, Result};
use dockhand_core::traits::Checkpointer;
use dockhand_core::types::{Checkpoint, ThreadId};

/// In-memory checkpointer. Threads live as long as the process.
#[derive(Default)]
pub struct MemorySaver {
    threads: Mutex<HashMap<ThreadId, Vec<Checkpoint>>>,
}

impl MemorySaver {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<ThreadId, Vec<Checkpoint>>>> {
        self.threads
            .lock()
            .map_err(|e| DockhandError::Checkpoint(e.to_string()))
    }
}

impl Checkpointer for MemorySaver {
    fn get(&self, thread_id: &ThreadId) -> BoxFuture<'_, Result<Option<Checkpoint>>> {
        let thread_id = thread_id.clone();
        Box::pin(async move {
            Ok(self
                .lock()?
                .get(&thread_id)
                .and_then(|cps| cps.last().cloned()))
        })
    }

    fn put(&self, checkpoint: Checkpoint) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.lock()?
                .entry(checkpoint.thread_id.clone())
                .or_default()
                .push(checkpoint);
            Ok(())
        })
    }

    fn list(&self, thread_id: &ThreadId) -> BoxFuture<'_, Result<Vec<Checkpoint>>> {
        let thread_id = thread_id.clone();
        Box::pin(async move { Ok(self.lock()?.get(&thread_id).cloned().unwrap_or_default()) })
    }

    fn delete(&self, thread_id: &ThreadId) -> BoxFuture<'_, Result<usize>> {
        let thread_id = thread_id.clone();
        Box::pin(async move {
            Ok(self
                .lock()?
                .remove(&thread_id)
                .map(|cps| cps.len())
                .unwrap_or(0))
        })
    }
}

/// Persistent checkpointer backed by SQLite, so a thread can be resumed by a
/// later process.
pub struct SqliteSaver {
    conn: Mutex<Connection>,
}

impl SqliteSaver {
    /// Open or create the checkpoint database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DockhandError::Checkpoint(format!("Failed to create checkpoint directory: {}", e))
                })?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| DockhandError::Checkpoint(format!("Failed to open checkpoint store: {}", e)))?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;

             CREATE TABLE IF NOT EXISTS checkpoints (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 thread_id TEXT NOT NULL,
                 checkpoint_id TEXT NOT NULL UNIQUE,
                 step INTEGER NOT NULL,
                 messages_json TEXT NOT NULL,
                 timestamp TEXT NOT NULL
             );

             CREATE INDEX IF NOT EXISTS idx_cp_thread
                 ON checkpoints(thread_id, id DESC);",
        )
        .map_err(|e| DockhandError::Checkpoint(format!("Failed to initialize checkpoint schema: {}", e)))?;

        debug!(path = %path.display(), "Opened checkpoint store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DockhandError::Checkpoint(e.to_string()))
    }
}

/// A checkpoint row before its transcript is decoded.
struct StoredCheckpoint {
    thread_id: String,
    checkpoint_id: String,
    step: i64,
    messages_json: String,
    timestamp: String,
}

impl StoredCheckpoint {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            thread_id: row.get(0)?,
            checkpoint_id: row.get(1)?,
            step: row.get(2)?,
            messages_json: row.get(3)?,
            timestamp: row.get(4)?,
        })
    }

    fn decode(self) -> Result<Checkpoint> {
        Ok(Checkpoint {
            thread_id: ThreadId(self.thread_id),
            checkpoint_id: self.checkpoint_id,
            step: self.step as usize,
            messages: serde_json::from_str(&self.messages_json)?,
            timestamp: DateTime::parse_from_rfc3339(&self.timestamp)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

fn sql_err(e: rusqlite::Error) -> DockhandError {
    DockhandError::Checkpoint(e.to_string())
}

impl Checkpointer for SqliteSaver {
    fn get(&self, thread_id: &ThreadId) -> BoxFuture<'_, Result<Option<Checkpoint>>> {
        let thread_id = thread_id.clone();
        Box::pin(async move {
            let row = {
                let conn = self.conn()?;
                conn.query_row(
                    "SELECT thread_id, checkpoint_id, step, messages_json, timestamp
                     FROM checkpoints
                     WHERE thread_id = ?1
                     ORDER BY id DESC
                     LIMIT 1",
                    params![thread_id.as_str()],
                    StoredCheckpoint::from_row,
                )
                .optional()
                .map_err(sql_err)?
            };
            row.map(StoredCheckpoint::decode).transpose()
        })
    }

    fn put(&self, checkpoint: Checkpoint) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let messages_json = serde_json::to_string(&checkpoint.messages)?;
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO checkpoints (thread_id, checkpoint_id, step, messages_json, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    checkpoint.thread_id.as_str(),
                    checkpoint.checkpoint_id,
                    checkpoint.step as i64,
                    messages_json,
                    checkpoint.timestamp.to_rfc3339(),
                ],
            )
            .map_err(|e| DockhandError::Checkpoint(format!("Failed to save checkpoint: {}", e)))?;
            Ok(())
        })
    }

    fn list(&self, thread_id: &ThreadId) -> BoxFuture<'_, Result<Vec<Checkpoint>>> {
        let thread_id = thread_id.clone();
        Box::pin(async move {
            let rows = {
                let conn = self.conn()?;
                let mut stmt = conn
                    .prepare(
                        "SELECT thread_id, checkpoint_id, step, messages_json, timestamp
                         FROM checkpoints
                         WHERE thread_id = ?1
                         ORDER BY id ASC",
                    )
                    .map_err(sql_err)?;
                let rows = stmt
                    .query_map(params![thread_id.as_str()], StoredCheckpoint::from_row)
                    .map_err(sql_err)?
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .map_err(sql_err)?;
                rows
            };
            rows.into_iter().map(StoredCheckpoint::decode).collect()
        })
    }

    fn delete(&self, thread_id: &ThreadId) -> BoxFuture<'_, Result<usize>> {
        let thread_id = thread_id.clone();
        Box::pin(async move {
            let conn = self.conn()?;
            conn.execute(
                "DELETE FROM checkpoints WHERE thread_id = ?1",
                params![thread_id.as_str()],
            )
            .map_err(|e| DockhandError::Checkpoint(format!("Failed to delete checkpoints: {}", e)))
        })
    }
}

/// Build the configured checkpointer. Relative sqlite paths resolve against
/// `working_dir`.
pub fn open_checkpointer(
    config: &CheckpointConfig,
    working_dir: &Path,
) -> Result<Option<Arc<dyn Checkpointer>>> {
    match config.backend {
        CheckpointBackend::Memory => Ok(Some(Arc::new(MemorySaver::new()))),
        CheckpointBackend::Sqlite => {
            let path = working_dir.join(&config.path);
            info!(path = %path.display(), "Using sqlite checkpoints");
            Ok(Some(Arc::new(SqliteSaver::open(&path)?)))
        }
        CheckpointBackend::None => Ok(None),
    }
}
