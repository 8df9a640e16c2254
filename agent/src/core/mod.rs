//! Deterministic, pure logic shared by the agent.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod cache_key;
pub mod conversation;
pub mod policy;
pub mod protocol;
pub mod types;
