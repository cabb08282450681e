pub mod cli;
pub mod config;
pub mod deadline;
pub mod fleet;
pub mod ids;
pub mod session;
pub mod telemetry;
pub mod transport;
