//! Watches a directory of per-user image submissions and records each
//! near-duplicate pair found inside a submission exactly once.

pub mod config;
pub mod core;
pub mod database;
pub mod logging;
pub mod services;
