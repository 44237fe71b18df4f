//! Core abstractions: units of work, run context, errors, and transactions.

pub mod context;
pub mod error;
pub mod node;
pub mod timeout;
pub mod transaction;

pub use context::RunContext;
pub use error::{AppResult, ContextError, EngineError};
pub use node::{FuncNode, Node, Transactional, Unit};
pub use timeout::Timeout;
pub use transaction::{Transaction, TransactionManager, TxId, TxStatus};
