//! Sliding-window rate limiting on top of the shared store.
//!
//! Each identifier owns a sorted set of request timestamps under
//! `{namespace}:{identifier}`. A check prunes entries older than the window,
//! inserts the current request, counts and refreshes the set's expiry in one
//! atomic batch. Any store failure fails open.

mod config;
mod observer;
mod service;


pub use config::{IP_SCOPE, RateLimitConfig, RateLimitPolicies, USER_SCOPE, scale};
pub use observer::{TracingViolationObserver, ViolationObserver};
pub use service::RateLimitService;
