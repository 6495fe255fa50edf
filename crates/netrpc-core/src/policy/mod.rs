//! Reliability policies applied by the retry stage.

pub mod retry;

pub use retry::{RetryConfig, RetryPolicy, RetryState, MAX_ATTEMPTS};
