pub mod config;
pub mod error;
pub mod monitor;
pub mod schema;
pub mod storage;
pub mod twitter;
