pub mod commands;
pub mod config;
pub mod error;
pub mod storage_factory;
pub mod telemetry;
