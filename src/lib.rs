#![forbid(unsafe_code)]

pub mod acp;
pub mod approval;
pub mod audit;
pub mod config;
pub mod console;
pub mod errors;
pub mod models;
pub mod orchestrator;
pub mod persistence;
pub mod tools;
pub mod transport;

pub use config::ClientConfig;
pub use errors::{AppError, Result};
