//! Stable exit codes for the agent binaries.

/// The session finished (`DONE` or an empty batch), or the summary was written.
pub const OK: i32 = 0;
/// Config, backend, cache, transcript or other failure.
pub const FAILED: i32 = 1;
/// The backend broke the step protocol (unknown step, malformed batch).
pub const PROTOCOL_VIOLATION: i32 = 2;
