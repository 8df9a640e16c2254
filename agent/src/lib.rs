//! Interactive repository agent.
//!
//! A language model is sent the running conversation and answers with a batch
//! of typed steps. The steps are executed against the filesystem, the shell,
//! the network or the user, and their results are appended to the conversation
//! for the next round.
//!
//! - **[`core`]**: Pure logic (step types, protocol decoding, cache keys,
//!   confirmation policy). No I/O.
//! - **[`io`]**: Side effects (backend, cache store, UI, shell, HTTP, config).
//!   Behind traits where tests need to substitute them.
//!
//! [`interpreter`], [`fs_steps`], [`code_operation`] and [`session`] combine
//! the two into the agent loop.

pub mod code_operation;
pub mod core;
pub mod exit_codes;
pub mod fs_steps;
pub mod interpreter;
pub mod io;
pub mod logging;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
