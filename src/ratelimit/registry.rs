//! Registry of per-operation rate limiters.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use super::bucket::Throttle;
use super::key::{OperationKey, RateLimitKey};
use super::spec::LimiterSpec;
use crate::context::CallContext;
use crate::error::{RateLimitError, Result};

/// Maps each configured operation to its own limiter.
///
/// The registry is immutable once built and can be shared freely across
/// tasks; every limiter guards its own bucket.
pub struct RateLimiterRegistry {
    /// Limiters indexed by operation key
    limiters: HashMap<OperationKey, Arc<dyn Throttle>>,
}

impl RateLimiterRegistry {
    /// Build a registry from specification strings.
    ///
    /// Expected format of each spec:
    /// `[version].[service].[operation],[type],[param1],[param2],...`.
    /// A later spec for the same operation replaces an earlier one. The first
    /// malformed spec aborts construction.
    ///
    /// Returns `Ok(None)` when no spec is given; an absent registry admits
    /// every call.
    pub fn from_specs<I, S>(specs: I) -> Result<Option<Self>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut limiters: HashMap<OperationKey, Arc<dyn Throttle>> = HashMap::new();

        for spec in specs {
            let spec = LimiterSpec::parse(spec.as_ref())?;
            let limiter = spec.kind.build();

            info!(
                key = %spec.key,
                qps = limiter.qps(),
                burst = limiter.burst(),
                "Configured rate limiting"
            );

            if limiters.insert(spec.key.clone(), limiter).is_some() {
                debug!(key = %spec.key, "Replaced earlier rate limit for operation");
            }
        }

        if limiters.is_empty() {
            return Ok(None);
        }

        Ok(Some(Self { limiters }))
    }

    /// The limiter selected for `key`, ignoring its caller id.
    pub fn limiter(&self, key: &RateLimitKey) -> Option<&Arc<dyn Throttle>> {
        self.limiters.get(&key.operation_key())
    }

    /// Number of configured operations.
    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    /// Always false for a registry returned by [`RateLimiterRegistry::from_specs`].
    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }

    /// Configured operations and their limiters.
    pub fn iter(&self) -> impl Iterator<Item = (&OperationKey, &Arc<dyn Throttle>)> {
        self.limiters.iter()
    }

    /// Wait until the call identified by `key` may proceed.
    ///
    /// Operations without a configured limiter are admitted immediately,
    /// whatever the state of `ctx`. Otherwise this waits for a token from the
    /// operation's limiter or for `ctx` to end, whichever comes first.
    ///
    /// The wait runs as a detached task. When `ctx` ends first that task keeps
    /// going and takes its token once one is available.
    pub async fn admit(&self, ctx: &CallContext, key: &RateLimitKey) -> Result<()> {
        let Some(limiter) = self.limiter(key) else {
            trace!(key = %key, "No rate limit configured, admitting");
            return Ok(());
        };

        if limiter.try_accept() {
            trace!(key = %key, "Token available, admitting");
            return Ok(());
        }

        if let Some(err) = ctx.err() {
            debug!(key = %key, error = %err, "Context ended before waiting for a token");
            return Err(err.into());
        }

        if !limiter.can_admit() {
            let err = ctx.done().await;
            warn!(key = %key, error = %err, burst = limiter.burst(), "Rate limiter never admits");
            return Err(err.into());
        }

        let acquire = Arc::clone(limiter);
        let acquired = tokio::spawn(async move { acquire.accept().await });

        trace!(key = %key, "Waiting for a token");

        tokio::select! {
            joined = acquired => {
                joined.map_err(|e| {
                    RateLimitError::RateLimit(format!("token acquisition for {} failed: {}", key, e))
                })?;
                trace!(key = %key, "Token acquired, admitting");
                Ok(())
            }
            err = ctx.done() => {
                warn!(key = %key, error = %err, "Gave up waiting for rate limiter");
                Err(err.into())
            }
        }
    }
}

impl fmt::Debug for RateLimiterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.limiters.iter()).finish()
    }
}
