#![doc = include_str!("../README.md")]

pub mod asserts;
pub mod connection;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod simulator;
pub mod sql;

pub use connection::E2eConnection;
pub use error::HarnessError;
pub use logging::init_tracing;
pub use pipeline::{PipelineKind, TransformRegistry};
pub use simulator::SimulatorClient;
pub use sql::PgBackend;
