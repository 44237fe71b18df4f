//! Engine facade and run reporting.

pub mod engine;
pub mod report;

pub use engine::{Engine, WorkerFactory};
pub use report::{RunReport, VertexCost};
