//! Outbound call discipline for network sources: a fixed-rate gate and a
//! bounded exponential-backoff retry filtered by error class.

pub mod rate_limiter;
pub mod retry;

pub use rate_limiter::RateLimiter;
pub use retry::{RetryPolicy, Transient};
