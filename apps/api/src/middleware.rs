mod admin;
mod cache;
mod client_ip;
mod identity;
mod rate_limit;

#[cfg(test)]
mod tests;

pub use admin::require_admin;
pub use cache::{CacheRoute, cache_response};
pub use identity::{IdentityResolver, authenticate};
pub use rate_limit::{RateLimitLayer, RateLimitOptions, with_rate_limit};
