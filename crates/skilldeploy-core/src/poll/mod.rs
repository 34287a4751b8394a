//! Polling primitives: retry scheduling and cancellation.

pub mod cancel;
pub mod retry;

pub use cancel::{CancelHandle, Cancellation};
pub use retry::{RetryPolicy, retry};
