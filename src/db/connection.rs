//! SQLite handle for the readings store.
//!
//! Two worker threads each own one connection. The writer applies migrations
//! and performs every insert, so writes are serialized. The reader runs scans
//! on a `query_only` connection; under WAL it never waits on an insert.

use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc, Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use rusqlite::Connection;
use tokio::sync::oneshot;

use super::migrations::migrate;

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

static MEMORY_DB_SEQ: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Clone, Copy)]
enum Role {
    Writer,
    Reader,
}

impl Role {
    fn thread_name(self) -> &'static str {
        match self {
            Role::Writer => "pitemp-db-writer",
            Role::Reader => "pitemp-db-reader",
        }
    }

    fn prepare(self, conn: &mut Connection) -> Result<()> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        match self {
            Role::Writer => {
                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    warn!("WAL unavailable, keeping default journal: {err}");
                }
                migrate(conn).context("failed to run database migrations")
            }
            Role::Reader => {
                conn.pragma_update(None, "query_only", true)?;
                // Only matters for shared-cache memory databases.
                conn.pragma_update(None, "read_uncommitted", true)?;
                Ok(())
            }
        }
    }
}

/// A thread that owns one connection and runs submitted jobs in order.
/// Dropping it closes the queue and joins the thread.
struct Worker {
    role: Role,
    jobs: Option<mpsc::Sender<Job>>,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    fn spawn(role: Role, target: &Path) -> Result<Self> {
        let (jobs_tx, jobs_rx) = mpsc::channel::<Job>();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<()>>(1);
        let target = target.to_path_buf();

        let thread = thread::Builder::new()
            .name(role.thread_name().into())
            .spawn(move || {
                let opened = Connection::open(&target)
                    .with_context(|| format!("failed to open {}", target.display()))
                    .and_then(|mut conn| role.prepare(&mut conn).map(|()| conn));

                let mut conn = match opened {
                    Ok(conn) => {
                        let _ = ready_tx.send(Ok(()));
                        conn
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };

                for job in jobs_rx {
                    job(&mut conn);
                }
                debug!("{} stopped", role.thread_name());
            })
            .with_context(|| format!("failed to spawn {}", role.thread_name()))?;

        ready_rx
            .recv()
            .with_context(|| format!("{} exited during startup", role.thread_name()))??;

        Ok(Self {
            role,
            jobs: Some(jobs_tx),
            thread: Some(thread),
        })
    }

    async fn submit<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let name = self.role.thread_name();
        let jobs = self
            .jobs
            .as_ref()
            .ok_or_else(|| anyhow!("{name} is shut down"))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        jobs.send(Box::new(move |conn| {
            let _ = reply_tx.send(task(conn));
        }))
        .map_err(|_| anyhow!("{name} is not running"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("{name} dropped the request"))?
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        drop(self.jobs.take());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("{} panicked", self.role.thread_name());
            }
        }
    }
}

/// Handle to the readings store. Clones share both workers.
#[derive(Clone)]
pub struct Database {
    reader: Arc<Worker>,
    writer: Arc<Worker>,
}

impl Database {
    /// Opens (or creates) the database at `db_path`. `":memory:"` opens a
    /// private in-memory database shared by this handle's two connections.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let target = if db_path.as_os_str() == ":memory:" {
            let seq = MEMORY_DB_SEQ.fetch_add(1, Ordering::Relaxed);
            PathBuf::from(format!(
                "file:pitemp-{}-{seq}?mode=memory&cache=shared",
                std::process::id()
            ))
        } else {
            if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create database directory {}", parent.display())
                })?;
            }
            db_path.clone()
        };

        // The writer creates the schema, so it has to be up before the reader.
        let writer = Worker::spawn(Role::Writer, &target)?;
        let reader = Worker::spawn(Role::Reader, &target)?;

        info!("Database ready at {}", db_path.display());

        Ok(Self {
            reader: Arc::new(reader),
            writer: Arc::new(writer),
        })
    }

    /// Runs `task` on the writer connection.
    pub async fn write<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.writer.submit(task).await
    }

    /// Runs `task` on the read-only connection.
    pub async fn read<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.reader.submit(task).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn count(db: &Database) -> i64 {
        db.read(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM sensor_values", [], |row| row.get(0))?)
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn reader_sees_committed_writes() {
        let db = Database::new(":memory:").unwrap();
        db.write(|conn| {
            conn.execute(
                "INSERT INTO sensor_values VALUES ('2024-01-01 10:00:00', '1', 20.0, 50.0)",
                [],
            )?;
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(count(&db).await, 1);
    }

    #[tokio::test]
    async fn reader_connection_refuses_writes() {
        let db = Database::new(":memory:").unwrap();

        let result = db
            .read(|conn| {
                conn.execute(
                    "INSERT INTO sensor_values VALUES ('2024-01-01 10:00:00', '1', 20.0, 50.0)",
                    [],
                )?;
                Ok(())
            })
            .await;

        assert!(result.is_err());
        assert_eq!(count(&db).await, 0);
    }

    #[tokio::test]
    async fn memory_databases_are_isolated() {
        let first = Database::new(":memory:").unwrap();
        let second = Database::new(":memory:").unwrap();
        first
            .write(|conn| {
                conn.execute(
                    "INSERT INTO sensor_values VALUES ('2024-01-01 10:00:00', '1', 20.0, 50.0)",
                    [],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(count(&first).await, 1);
        assert_eq!(count(&second).await, 0);
    }

    #[tokio::test]
    async fn file_database_is_created_with_parent_directory() {
        let dir = std::env::temp_dir().join(format!("pitemp-db-{}", std::process::id()));
        let path = dir.join("nested").join("readings.db");

        {
            let db = Database::new(&path).unwrap();
            assert_eq!(count(&db).await, 0);
        }

        assert!(path.exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
