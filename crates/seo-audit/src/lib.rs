pub mod audit;
pub mod config;
pub mod error;
pub mod placeholder;
pub mod telemetry;
