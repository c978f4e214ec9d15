//! cloud-ratelimit - per-operation rate limiting for cloud API calls
//!
//! This crate throttles the outbound calls a cloud-infrastructure controller
//! makes against a remote cloud API. Limits are configured per
//! `(version, service, operation)` with specification strings such as
//! `ga.Addresses.Get,qps,1.5,5`, and every call is admitted through
//! [`ratelimit::RateLimiterRegistry::admit`] before it is issued.

pub mod config;
pub mod context;
pub mod error;
pub mod ratelimit;

pub use context::{CallContext, ContextError};
pub use error::{RateLimitError, Result, SpecError};
pub use ratelimit::{CallRateLimiter, RateLimitKey, RateLimiterRegistry};
