//! Side-effecting operations: backend calls, caching, user interaction,
//! subprocesses, network and filesystem discovery.

pub mod backend;
pub mod cache;
pub mod config;
pub mod discovery;
pub mod fetch;
pub mod prompt;
pub mod schema;
pub mod shell;
pub mod transcript;
pub mod ui;
