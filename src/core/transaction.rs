//! Run-scoped transaction coordination.
//!
//! Every transactional unit is wrapped in a [`Transaction`]. When the wrapped
//! unit returns (or unwinds) the transaction is pre-committed into an ordered
//! list. After the run the worker fires exactly one of
//! [`TransactionManager::commit_all`] or [`TransactionManager::rollback_all`].

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::{AppResult, Node, RunContext, Transactional};
use crate::state::SharedState;

/// Lifecycle of a managed unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    /// Registered, not yet run in the current cycle.
    UnCommitted,
    /// Ran and waits for the run's verdict.
    PreCommit,
    /// Committed by the last verdict.
    Committed,
    /// Rolled back by the last verdict.
    RolledBack,
}

/// Handle for a managed unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxId(usize);

struct Ledger {
    units: Vec<Arc<dyn Transactional>>,
    status: Vec<TxStatus>,
    pre_committed: Vec<usize>,
}

/// Records transactional units and issues one commit/rollback per run.
pub struct TransactionManager {
    ledger: Mutex<Ledger>,
}

impl TransactionManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ledger: Mutex::new(Ledger {
                units: Vec::new(),
                status: Vec::new(),
                pre_committed: Vec::new(),
            }),
        }
    }

    /// Register `unit` and return a [`Node`] that pre-commits it after each run.
    pub fn manage(self: &Arc<Self>, unit: Arc<dyn Transactional>) -> Transaction {
        let mut ledger = self.ledger.lock();
        let id = TxId(ledger.units.len());
        ledger.units.push(unit);
        ledger.status.push(TxStatus::UnCommitted);
        drop(ledger);

        Transaction {
            manager: Arc::clone(self),
            id,
        }
    }

    /// Append `id` to the pre-commit list unless it is already there.
    pub fn pre_commit(&self, id: TxId) {
        let mut ledger = self.ledger.lock();
        if ledger.status[id.0] == TxStatus::PreCommit {
            return;
        }
        ledger.status[id.0] = TxStatus::PreCommit;
        ledger.pre_committed.push(id.0);
    }

    /// Commit every pre-committed unit in registration order.
    pub fn commit_all(&self) {
        let mut ledger = self.ledger.lock();
        let list = std::mem::take(&mut ledger.pre_committed);
        debug!(count = list.len(), "committing transactions");
        for idx in list {
            ledger.units[idx].commit();
            ledger.status[idx] = TxStatus::Committed;
        }
    }

    /// Roll back every pre-committed unit in reverse registration order.
    pub fn rollback_all(&self) {
        let mut ledger = self.ledger.lock();
        let list = std::mem::take(&mut ledger.pre_committed);
        debug!(count = list.len(), "rolling back transactions");
        for idx in list.into_iter().rev() {
            ledger.units[idx].rollback();
            ledger.status[idx] = TxStatus::RolledBack;
        }
    }

    /// Current status of `id`.
    #[must_use]
    pub fn status(&self, id: TxId) -> TxStatus {
        self.ledger.lock().status[id.0]
    }

    /// Number of units waiting for a verdict.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.ledger.lock().pre_committed.len()
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ledger = self.ledger.lock();
        f.debug_struct("TransactionManager")
            .field("status", &ledger.status)
            .field("pre_committed", &ledger.pre_committed)
            .finish()
    }
}

/// A managed transactional unit.
#[derive(Debug)]
pub struct Transaction {
    manager: Arc<TransactionManager>,
    id: TxId,
}

impl Transaction {
    /// Handle of the wrapped unit.
    #[must_use]
    pub const fn id(&self) -> TxId {
        self.id
    }
}

/// Pre-commits on drop so that an unwinding unit is still finalized.
struct PreCommitOnDrop<'a> {
    manager: &'a TransactionManager,
    id: TxId,
}

impl Drop for PreCommitOnDrop<'_> {
    fn drop(&mut self) {
        self.manager.pre_commit(self.id);
    }
}

impl Node for Transaction {
    fn run(&self, ctx: &RunContext, state: &SharedState) -> AppResult<()> {
        let _pre_commit = PreCommitOnDrop {
            manager: &self.manager,
            id: self.id,
        };
        let unit = Arc::clone(&self.manager.ledger.lock().units[self.id.0]);
        unit.run(ctx, state)
    }

    fn priority(&self) -> i32 {
        self.manager.ledger.lock().units[self.id.0].priority()
    }
}
