//! Recording in-memory driver
//!
//! `MockConn` implements `Connection` without a database behind it. Every
//! begin, statement, commit and rollback is appended to a log that tests can
//! inspect, and each phase can be made to fail on demand.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use txroute_core::{Connection, Error, Result, Transaction, TxOptions};

/// One recorded driver call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// `begin` succeeded
    Begin,
    /// Statement run through `MockTx::execute`
    Exec(String),
    /// `commit` was called
    Commit,
    /// `rollback` was called
    Rollback,
}

#[derive(Debug, Default)]
struct MockState {
    ops: Vec<Op>,
    options: Vec<TxOptions>,
}

/// Recording connection
#[derive(Debug, Clone)]
pub struct MockConn {
    name: Arc<str>,
    state: Arc<Mutex<MockState>>,
    fail_begin: Arc<AtomicBool>,
    fail_commit: Arc<AtomicBool>,
    fail_rollback: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl MockConn {
    /// New connection named `name`
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            state: Arc::new(Mutex::new(MockState::default())),
            fail_begin: Arc::new(AtomicBool::new(false)),
            fail_commit: Arc::new(AtomicBool::new(false)),
            fail_rollback: Arc::new(AtomicBool::new(false)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Connection name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Make every following `begin` fail
    pub fn fail_begin(&self) {
        self.fail_begin.store(true, Ordering::SeqCst);
    }

    /// Make every following `commit` fail
    pub fn fail_commit(&self) {
        self.fail_commit.store(true, Ordering::SeqCst);
    }

    /// Make every following `rollback` fail
    pub fn fail_rollback(&self) {
        self.fail_rollback.store(true, Ordering::SeqCst);
    }

    /// All recorded calls, in order
    pub fn ops(&self) -> Vec<Op> {
        self.state.lock().ops.clone()
    }

    fn count(&self, op: &Op) -> usize {
        self.state.lock().ops.iter().filter(|o| *o == op).count()
    }

    /// Number of successful begins
    pub fn begins(&self) -> usize {
        self.count(&Op::Begin)
    }

    /// Number of commits
    pub fn commits(&self) -> usize {
        self.count(&Op::Commit)
    }

    /// Number of rollbacks
    pub fn rollbacks(&self) -> usize {
        self.count(&Op::Rollback)
    }

    /// Options passed to the most recent `begin`
    pub fn last_options(&self) -> Option<TxOptions> {
        self.state.lock().options.last().copied()
    }

    /// True once `close` was called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Connection for MockConn {
    type Tx = MockTx;

    fn begin(&self, options: &TxOptions) -> Result<MockTx> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Begin(format!("{} is closed", self.name)));
        }
        if self.fail_begin.load(Ordering::SeqCst) {
            return Err(Error::Begin(format!("{} refused begin", self.name)));
        }
        let mut state = self.state.lock();
        state.ops.push(Op::Begin);
        state.options.push(*options);
        Ok(MockTx {
            conn: self.clone(),
            read_only: options.read_only,
        })
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Transaction produced by `MockConn`
#[derive(Debug)]
pub struct MockTx {
    conn: MockConn,
    read_only: bool,
}

impl MockTx {
    /// Name of the connection this transaction was begun on
    pub fn connection_name(&self) -> &str {
        self.conn.name()
    }

    /// True if begun with `read_only`
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Record a statement
    pub fn execute(&mut self, sql: &str) {
        self.conn.state.lock().ops.push(Op::Exec(sql.to_string()));
    }
}

impl Transaction for MockTx {
    fn commit(self) -> Result<()> {
        self.conn.state.lock().ops.push(Op::Commit);
        if self.conn.fail_commit.load(Ordering::SeqCst) {
            return Err(Error::Commit(format!("{} lost connection", self.conn.name)));
        }
        Ok(())
    }

    fn rollback(self) -> Result<()> {
        self.conn.state.lock().ops.push(Op::Rollback);
        if self.conn.fail_rollback.load(Ordering::SeqCst) {
            return Err(Error::Rollback(format!("{} lost connection", self.conn.name)));
        }
        Ok(())
    }
}
