//! Per-operation rate limiting.

mod backend;
mod bucket;
mod key;
mod registry;
mod spec;

pub use backend::CallRateLimiter;
pub use bucket::{Throttle, TokenBucket};
pub use key::{ApiVersion, OperationKey, RateLimitKey};
pub use registry::RateLimiterRegistry;
pub use spec::{LimiterKind, LimiterSpec, QPS};
