//! Resolution policy: attempt budget, call deadlines, restricted fields.

use std::future::Future;
use std::time::Duration;

use crate::error::PricingError;

/// Default attempts per resource.
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Field excluded from first-attempt synthesis by default (SKU display name).
pub const DEFAULT_RESTRICTED_FIELD: &str = "skuName";

/// How the pricing core resolves each resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionPolicy {
    /// Maximum tool invocations per resource (at least 1).
    pub max_attempts: usize,
    /// Optional deadline applied to every external call.
    pub call_timeout: Option<Duration>,
    /// Schema fields withheld from the first attempt.
    pub restricted_fields: Vec<String>,
}

impl Default for ResolutionPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            call_timeout: None,
            restricted_fields: vec![DEFAULT_RESTRICTED_FIELD.to_string()],
        }
    }
}

impl ResolutionPolicy {
    /// Sets the attempt budget, clamped to at least one.
    #[must_use]
    pub fn with_max_attempts(mut self, n: usize) -> Self {
        self.max_attempts = n.max(1);
        self
    }

    /// Sets a per-call deadline.
    #[must_use]
    pub const fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// Runs `fut` under the configured deadline, if any.
    ///
    /// On expiry, `on_timeout` builds the error from a description of the
    /// deadline.
    pub(crate) async fn deadline<F, T>(
        &self,
        fut: F,
        on_timeout: impl FnOnce(String) -> PricingError,
    ) -> Result<T, PricingError>
    where
        F: Future<Output = Result<T, PricingError>>,
    {
        match self.call_timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .unwrap_or_else(|_| Err(on_timeout(format!("timed out after {limit:?}")))),
            None => fut.await,
        }
    }
}
