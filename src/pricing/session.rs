//! Pricing tool session capabilities.
//!
//! A [`SessionProvider`] opens a [`Session`]: a live [`PricingSession`]
//! handle plus the tool's discovered [`ParameterSchema`]. Closing consumes
//! the handle, so a session cannot be used or released after release.

use async_trait::async_trait;

use crate::core::{Filter, ParameterSchema, PricingResult};
use crate::error::PricingError;

/// An open connection to the pricing tool.
#[async_trait]
pub trait PricingSession: Send + Sync {
    /// Executes `filter` against the tool.
    ///
    /// Implementations must not retry; retry policy belongs to the
    /// resolution loop.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::Invocation`] on transport or remote failure.
    async fn invoke(&self, filter: &Filter) -> Result<PricingResult, PricingError>;

    /// Releases the connection.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::Cleanup`] if release fails.
    async fn close(self: Box<Self>) -> Result<(), PricingError>;
}

/// Opens pricing sessions.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Connects to the tool and discovers its parameter schema.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::Session`] if the connection or schema
    /// discovery fails. Implementations release any partially opened
    /// connection before returning an error.
    async fn establish(&self) -> Result<Session, PricingError>;
}

/// An established session: the tool handle and its schema.
pub struct Session {
    /// Connection handle; released with [`PricingSession::close`].
    pub handle: Box<dyn PricingSession>,
    /// Discovered input schema.
    pub schema: ParameterSchema,
}

impl Session {
    /// Bundles a handle with its schema.
    #[must_use]
    pub fn new(handle: Box<dyn PricingSession>, schema: ParameterSchema) -> Self {
        Self { handle, schema }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("handle", &"<dyn PricingSession>")
            .field("schema_fields", &self.schema.fields().count())
            .finish()
    }
}
