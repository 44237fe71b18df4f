//! Unit tests for individual components

mod error_test;
mod config_test;
mod state_test;
mod graph_test;
mod builders_test;
mod runtime_test;
