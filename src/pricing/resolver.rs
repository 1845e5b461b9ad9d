//! Per-resource resolution loop.
//!
//! Drives synthesizer ↔ pricing tool round-trips for one resource:
//! synthesize a filter, invoke the tool, and on an empty result try again
//! with feedback naming every rejected filter. The first attempt withholds
//! restricted fields; later attempts permit them. Stops at the first
//! non-empty result or when the attempt budget is spent.

use tracing::debug;

use super::policy::ResolutionPolicy;
use super::progress::{ProgressEvent, ProgressSink};
use super::session::PricingSession;
use super::synthesizer::{Feedback, FilterSynthesizer, SynthesisRequest};
use crate::core::{Filter, ParameterSchema, PricingResult, Resource};
use crate::error::PricingError;

/// First attempt (1-based) allowed to use restricted fields.
const WIDE_FIELDS_FROM_ATTEMPT: usize = 2;

/// Loop state carried from one attempt to the next.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolutionState {
    /// Attempts made so far.
    pub attempt: usize,
    /// Whether restricted fields are permitted on the next attempt.
    pub permit_wide_fields: bool,
    /// Filters tried so far, oldest first.
    pub tried: Vec<Filter>,
}

impl ResolutionState {
    /// State before the first attempt: narrow mode, no history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feedback for the next attempt; `None` before the first attempt.
    #[must_use]
    pub fn feedback(&self) -> Option<Feedback<'_>> {
        (!self.tried.is_empty()).then_some(Feedback {
            rejected: &self.tried,
        })
    }

    /// Records a completed attempt and widens the field set for the next one.
    pub fn record(&mut self, filter: Filter) {
        self.attempt += 1;
        self.tried.push(filter);
        self.permit_wide_fields = self.attempt + 1 >= WIDE_FIELDS_FROM_ATTEMPT;
    }

    /// Returns `true` once `max_attempts` attempts have been made.
    #[must_use]
    pub const fn exhausted(&self, max_attempts: usize) -> bool {
        self.attempt >= max_attempts
    }
}

/// Outcome of resolving one resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Last result set obtained; empty when attempts were exhausted.
    pub result: PricingResult,
    /// Final loop state, including every filter attempted.
    pub state: ResolutionState,
}

impl Resolution {
    /// Filters attempted, oldest first.
    #[must_use]
    pub fn filters(&self) -> &[Filter] {
        &self.state.tried
    }

    /// Number of tool invocations made.
    #[must_use]
    pub const fn attempts(&self) -> usize {
        self.state.attempt
    }
}

/// Position of a resource within its batch (1-based), for progress events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPosition {
    /// 1-based index.
    pub index: usize,
    /// Batch size.
    pub total: usize,
}

/// Resolves single resources against an open pricing session.
pub struct ResolutionLoop<'a> {
    synthesizer: &'a dyn FilterSynthesizer,
    session: &'a dyn PricingSession,
    schema: &'a ParameterSchema,
    policy: &'a ResolutionPolicy,
}

impl<'a> ResolutionLoop<'a> {
    /// Binds the loop to its collaborators.
    #[must_use]
    pub fn new(
        synthesizer: &'a dyn FilterSynthesizer,
        session: &'a dyn PricingSession,
        schema: &'a ParameterSchema,
        policy: &'a ResolutionPolicy,
    ) -> Self {
        Self {
            synthesizer,
            session,
            schema,
            policy,
        }
    }

    /// Resolves one resource.
    ///
    /// Attempts run strictly one after another. An empty result set is
    /// retried; a synthesis or invocation failure aborts the resource.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::Synthesis`] or [`PricingError::Invocation`]
    /// from the first failing call.
    pub async fn resolve(
        &self,
        resource: &Resource,
        position: BatchPosition,
        sink: &dyn ProgressSink,
    ) -> Result<Resolution, PricingError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut state = ResolutionState::new();

        loop {
            let filter = self.synthesize(resource, &state).await?;
            let attempt_number = state.attempt + 1;
            debug!(
                resource_index = position.index,
                attempt = attempt_number,
                wide = state.permit_wide_fields,
                %filter,
                "invoking pricing tool"
            );

            let outcome = self
                .policy
                .deadline(self.session.invoke(&filter), PricingError::invocation)
                .await;

            sink.emit(ProgressEvent::Attempt {
                resource_index: position.index,
                total: position.total,
                attempt_number,
                filter: filter.clone(),
                result: outcome.as_ref().ok().cloned(),
                error: outcome.as_ref().err().map(ToString::to_string),
            });

            let result = outcome?;
            debug!(
                resource_index = position.index,
                attempt = attempt_number,
                records = result.data.len(),
                "pricing tool responded"
            );

            state.record(filter);
            if !result.is_empty() || state.exhausted(max_attempts) {
                return Ok(Resolution { result, state });
            }
        }
    }

    async fn synthesize(
        &self,
        resource: &Resource,
        state: &ResolutionState,
    ) -> Result<Filter, PricingError> {
        let request = SynthesisRequest {
            resource,
            schema: self.schema,
            feedback: state.feedback(),
            permit_wide_fields: state.permit_wide_fields,
        };
        self.policy
            .deadline(self.synthesizer.synthesize(&request), PricingError::synthesis)
            .await
    }
}
