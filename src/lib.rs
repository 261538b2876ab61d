// Core modules
pub mod book;
pub mod bus;
pub mod config;
pub mod counters;
pub mod engine;
pub mod error;
pub mod executor;
pub mod market;
pub mod models;
pub mod persistence;
pub mod runtime;
pub mod strategy;

// Re-export commonly used types
pub use config::Config;
pub use engine::{FillResult, SymbolEngine};
pub use models::*;

// Error handling for bus and persistence I/O; typed domain errors live in `error`.
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
