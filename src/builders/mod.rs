//! Builders that turn graph descriptions into runnable components.

pub mod worker_builder;

pub use worker_builder::{build_worker, WorkerBuilder};
