//! SQLite driver backed by `rusqlite`
//!
//! `SqliteConnection` is a connection *factory*: every `begin` opens a fresh
//! `rusqlite::Connection` on the database file and starts a transaction on
//! it, so concurrent call trees never share a SQLite handle. The physical
//! connection is closed once the transaction is committed or rolled back.
//!
//! Write transactions use `BEGIN IMMEDIATE` to take the write lock up front.
//! Read-only transactions set `PRAGMA query_only`, so any write inside them
//! fails at the statement.
//!
//! `:memory:` databases are private to one connection and therefore do not
//! survive from one transaction to the next; use a file.

use rusqlite::{OpenFlags, Params, Row};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;
use txroute_core::{Connection, Error, Result, Transaction, TxOptions};

/// Default time to wait for a locked database
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A SQLite database file that transactions can be begun on
#[derive(Debug)]
pub struct SqliteConnection {
    path: PathBuf,
    busy_timeout: Duration,
    read_only_file: bool,
    closed: AtomicBool,
}

impl SqliteConnection {
    /// Read-write connection to `path`, creating the file if missing
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Self {
            path: path.as_ref().to_path_buf(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            read_only_file: false,
            closed: AtomicBool::new(false),
        };
        conn.ping()?;
        Ok(conn)
    }

    /// Connection that opens `path` read-only, as a replica
    ///
    /// The file must already exist.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Self {
            path: path.as_ref().to_path_buf(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            read_only_file: true,
            closed: AtomicBool::new(false),
        };
        conn.ping()?;
        Ok(conn)
    }

    /// Set how long a statement waits on a locked database
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Database file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open and immediately drop a handle, to check the file is reachable
    pub fn ping(&self) -> Result<()> {
        self.connect().map(drop)
    }

    fn connect(&self) -> Result<rusqlite::Connection> {
        let flags = if self.read_only_file {
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX
        };
        rusqlite::Connection::open_with_flags(&self.path, flags)
            .map_err(|e| Error::Connect(format!("{}: {}", self.path.display(), e)))
    }
}

impl Connection for SqliteConnection {
    type Tx = SqliteTx;

    fn begin(&self, options: &TxOptions) -> Result<SqliteTx> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Begin(format!("{} is closed", self.path.display())));
        }
        let mut busy_timeout = self.busy_timeout;
        if let Some(deadline) = options.deadline {
            let now = Instant::now();
            if deadline <= now {
                return Err(Error::Begin("deadline exceeded before begin".to_string()));
            }
            busy_timeout = busy_timeout.min(deadline - now);
        }

        let conn = self.connect()?;
        let begin = |e: rusqlite::Error| Error::Begin(e.to_string());
        conn.busy_timeout(busy_timeout).map_err(begin)?;
        let read_only = options.read_only || self.read_only_file;
        if read_only {
            conn.execute_batch("PRAGMA query_only = ON; BEGIN DEFERRED")
                .map_err(begin)?;
        } else {
            conn.execute_batch("BEGIN IMMEDIATE").map_err(begin)?;
        }
        debug!(
            target: "txroute::txn",
            path = %self.path.display(),
            read_only,
            isolation = ?options.isolation,
            "sqlite transaction begun"
        );
        Ok(SqliteTx { conn, read_only })
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// An open SQLite transaction
///
/// Dropping it without commit or rollback closes the connection, which makes
/// SQLite roll the transaction back.
#[derive(Debug)]
pub struct SqliteTx {
    conn: rusqlite::Connection,
    read_only: bool,
}

impl SqliteTx {
    /// True for replica / read-only transactions
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Run one statement, returning the number of changed rows
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> rusqlite::Result<usize> {
        self.conn.execute(sql, params)
    }

    /// Run several statements separated by `;`
    pub fn execute_batch(&self, sql: &str) -> rusqlite::Result<()> {
        self.conn.execute_batch(sql)
    }

    /// Run a query and map its first row
    pub fn query_row<T, P, F>(&self, sql: &str, params: P, f: F) -> rusqlite::Result<T>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.conn.query_row(sql, params, f)
    }

    /// Underlying `rusqlite` connection
    pub fn connection(&self) -> &rusqlite::Connection {
        &self.conn
    }
}

impl Transaction for SqliteTx {
    fn commit(self) -> Result<()> {
        self.conn
            .execute_batch("COMMIT")
            .map_err(|e| Error::Commit(e.to_string()))
    }

    fn rollback(self) -> Result<()> {
        self.conn
            .execute_batch("ROLLBACK")
            .map_err(|e| Error::Rollback(e.to_string()))
    }
}
