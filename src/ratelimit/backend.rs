//! Rate limiter trait consumed by cloud API call sites.

use std::sync::Arc;

use async_trait::async_trait;

use super::key::RateLimitKey;
use super::registry::RateLimiterRegistry;
use crate::context::CallContext;
use crate::error::Result;

/// Gate consulted before every outbound cloud API call.
///
/// `Ok(())` means the call may proceed. An error means the call must not be
/// issued; retrying is up to the caller.
#[async_trait]
pub trait CallRateLimiter: Send + Sync {
    /// Wait until the call identified by `key` may proceed or `ctx` ends.
    async fn admit(&self, ctx: &CallContext, key: &RateLimitKey) -> Result<()>;
}

#[async_trait]
impl CallRateLimiter for RateLimiterRegistry {
    async fn admit(&self, ctx: &CallContext, key: &RateLimitKey) -> Result<()> {
        RateLimiterRegistry::admit(self, ctx, key).await
    }
}

/// An absent limiter admits every call.
#[async_trait]
impl<T: CallRateLimiter> CallRateLimiter for Option<T> {
    async fn admit(&self, ctx: &CallContext, key: &RateLimitKey) -> Result<()> {
        match self {
            Some(limiter) => limiter.admit(ctx, key).await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl<T: CallRateLimiter + ?Sized> CallRateLimiter for Arc<T> {
    async fn admit(&self, ctx: &CallContext, key: &RateLimitKey) -> Result<()> {
        (**self).admit(ctx, key).await
    }
}
