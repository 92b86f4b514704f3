//! The shared outbound-request layer: one rate-limited choke point for every page fetch in a
//! run, covering both static HTTP GETs and headless-browser rendering.

pub mod gate;
pub mod limiter;

pub use gate::{FetchConfigs, FetchGate, RetryPolicy};
pub use limiter::RateLimiter;
