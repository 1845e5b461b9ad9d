//! Batch orchestrator.
//!
//! Turns a list of resources into a list of priced resources over one
//! pricing session: establish, resolve each resource in order, release.
//! The output always has one entry per input, in input order. Failures
//! degrade to sentinel pricing instead of failing the batch.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::policy::ResolutionPolicy;
use super::progress::{ProgressEvent, ProgressSink};
use super::resolver::{BatchPosition, ResolutionLoop};
use super::session::{PricingSession, Session, SessionProvider};
use super::synthesizer::FilterSynthesizer;
use crate::core::{ParameterSchema, Resource, ResourcePricing};
use crate::error::PricingError;

/// Result of pricing one batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingBatch {
    /// One entry per input resource, in input order.
    pub resources: Vec<ResourcePricing>,
    /// Resources that received a real price record.
    pub priced: usize,
    /// Resources that received sentinel pricing.
    pub no_info: usize,
    /// Per-resource failure messages (resolution errors, not empty results).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<String>,
    /// Set when the session could not be established.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_error: Option<String>,
    /// `true` if the batch was cancelled before every resource was tried.
    pub cancelled: bool,
    /// Wall-clock time spent on the batch.
    #[serde(serialize_with = "serialize_duration")]
    pub elapsed: Duration,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_duration<S>(d: &Duration, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_f64(d.as_secs_f64())
}

/// Resolves pricing for batches of resources.
pub struct PricingOrchestrator {
    sessions: Arc<dyn SessionProvider>,
    synthesizer: Arc<dyn FilterSynthesizer>,
    policy: ResolutionPolicy,
}

impl PricingOrchestrator {
    /// Creates an orchestrator over the given collaborators.
    pub fn new(
        sessions: Arc<dyn SessionProvider>,
        synthesizer: Arc<dyn FilterSynthesizer>,
        policy: ResolutionPolicy,
    ) -> Self {
        Self {
            sessions,
            synthesizer,
            policy,
        }
    }

    /// Prices `resources`, returning one entry per input in the same order.
    ///
    /// Never fails: session, synthesis and invocation errors all degrade to
    /// sentinel pricing.
    pub async fn resolve_pricing(
        &self,
        resources: &[Resource],
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Vec<ResourcePricing> {
        self.resolve_batch(resources, sink, cancel).await.resources
    }

    /// Like [`resolve_pricing`](Self::resolve_pricing), with batch
    /// statistics.
    ///
    /// # Panics
    ///
    /// Re-raises a panic from a collaborator, after the session has been
    /// released.
    pub async fn resolve_batch(
        &self,
        resources: &[Resource],
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> PricingBatch {
        let start = Instant::now();
        let total = resources.len();

        // Step 1: establish the session, or degrade the whole batch.
        let session = match self.establish().await {
            Ok(session) => session,
            Err(e) => {
                error!(error = %e, total, "pricing session unavailable; all resources unpriced");
                return PricingBatch::degraded(resources, e.to_string(), start.elapsed());
            }
        };
        let Session { handle, schema } = session;

        // Step 2: resolve each resource; a panic is held until release.
        let outcome = AssertUnwindSafe(self.resolve_all(
            handle.as_ref(),
            &schema,
            resources,
            sink,
            cancel,
        ))
        .catch_unwind()
        .await;

        // Step 3: release exactly once on every path.
        Self::release(handle).await;

        match outcome {
            Ok((priced, failures, cancelled)) => {
                PricingBatch::collect(priced, failures, cancelled, start.elapsed())
            }
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    async fn establish(&self) -> Result<Session, PricingError> {
        let mut session = self
            .policy
            .deadline(self.sessions.establish(), PricingError::session)
            .await?;
        session.schema = session
            .schema
            .with_restricted_fields(&self.policy.restricted_fields);
        debug!(
            fields = session.schema.fields().count(),
            "pricing session established"
        );
        Ok(session)
    }

    async fn resolve_all(
        &self,
        handle: &dyn PricingSession,
        schema: &ParameterSchema,
        resources: &[Resource],
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> (Vec<ResourcePricing>, Vec<String>, bool) {
        let total = resources.len();
        let resolver = ResolutionLoop::new(self.synthesizer.as_ref(), handle, schema, &self.policy);
        let mut priced = Vec::with_capacity(total);
        let mut failures = Vec::new();

        for (i, resource) in resources.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(
                    remaining = total - i,
                    "pricing cancelled; remaining resources unpriced"
                );
                priced.extend(resources[i..].iter().cloned().map(ResourcePricing::no_info));
                return (priced, failures, true);
            }

            let position = BatchPosition { index: i + 1, total };
            sink.emit(ProgressEvent::Progress {
                resource_index: position.index,
                total,
            });
            info!(
                resource_index = position.index,
                total,
                resource_type = %resource.resource_type,
                sku = %resource.sku,
                "fetching pricing"
            );

            match resolver.resolve(resource, position, sink).await {
                Ok(resolution) => {
                    if resolution.result.is_empty() {
                        info!(
                            resource_index = position.index,
                            attempts = resolution.attempts(),
                            "no pricing found"
                        );
                    }
                    priced.push(ResourcePricing::from_result(
                        resource.clone(),
                        &resolution.result,
                    ));
                }
                Err(e) => {
                    warn!(
                        resource_index = position.index,
                        kind = e.kind(),
                        error = %e,
                        "pricing failed for resource"
                    );
                    failures.push(format!("resource {} ({}): {e}", position.index, resource.sku));
                    priced.push(ResourcePricing::no_info(resource.clone()));
                }
            }
        }

        (priced, failures, false)
    }

    async fn release(handle: Box<dyn PricingSession>) {
        match handle.close().await {
            Ok(()) => debug!("pricing session closed"),
            Err(e) => warn!(error = %e, "failed to close pricing session"),
        }
    }
}

impl PricingBatch {
    fn degraded(resources: &[Resource], reason: String, elapsed: Duration) -> Self {
        Self {
            resources: resources
                .iter()
                .cloned()
                .map(ResourcePricing::no_info)
                .collect(),
            priced: 0,
            no_info: resources.len(),
            failures: Vec::new(),
            session_error: Some(reason),
            cancelled: false,
            elapsed,
        }
    }

    fn collect(
        resources: Vec<ResourcePricing>,
        failures: Vec<String>,
        cancelled: bool,
        elapsed: Duration,
    ) -> Self {
        let no_info = resources.iter().filter(|r| r.is_no_info()).count();
        Self {
            priced: resources.len() - no_info,
            no_info,
            resources,
            failures,
            session_error: None,
            cancelled,
            elapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use proptest::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::core::PricingResult;
    use crate::pricing::progress::{CollectingSink, NoopSink};
    use crate::pricing::testing::{
        ScriptedProvider, ScriptedSession, ScriptedSynthesizer, one_record, sample_vm,
    };

    fn orchestrator(
        provider: ScriptedProvider,
        synthesizer: ScriptedSynthesizer,
    ) -> (PricingOrchestrator, Arc<ScriptedProvider>, Arc<ScriptedSynthesizer>) {
        let provider = Arc::new(provider);
        let synthesizer = Arc::new(synthesizer);
        let orch = PricingOrchestrator::new(
            Arc::clone(&provider) as Arc<dyn SessionProvider>,
            Arc::clone(&synthesizer) as Arc<dyn FilterSynthesizer>,
            ResolutionPolicy::default(),
        );
        (orch, provider, synthesizer)
    }

    fn region_only() -> ScriptedSynthesizer {
        ScriptedSynthesizer::cycling(vec![json!({"armRegionName": "eastus"})])
    }

    fn resource(n: usize) -> Resource {
        Resource::new(
            "Microsoft.Compute/virtualMachines",
            format!("Standard_D{n}s_v3"),
            format!("{n} vCPUs"),
            "eastus",
        )
    }

    #[tokio::test]
    async fn test_example_scenario_third_attempt() {
        let session = ScriptedSession::new(vec![
            Ok(PricingResult::default()),
            Ok(PricingResult::default()),
            Ok(one_record(0.096)),
        ]);
        let counters = session.counters();
        let synthesizer = ScriptedSynthesizer::cycling(vec![
            json!({"armRegionName": "eastus", "armSkuName": "Standard_D2s_v3"}),
            json!({"armRegionName": "eastus", "serviceName": "Virtual Machines"}),
            json!({"armRegionName": "eastus", "skuName": "D2s v3"}),
        ]);
        let (orch, _, _) = orchestrator(ScriptedProvider::with_session(session), synthesizer);
        let sink = CollectingSink::new();

        let out = orch
            .resolve_pricing(&[sample_vm()], &sink, &CancellationToken::new())
            .await;

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].resource, sample_vm());
        assert!(!out[0].is_no_info());
        assert!((out[0].pricing.retail_price - 0.096).abs() < f64::EPSILON);
        assert!((out[0].pricing.unit_price - 0.096).abs() < f64::EPSILON);
        assert_eq!(out[0].pricing.currency_code, "USD");
        assert_eq!(out[0].pricing.unit_of_measure, "1 Hour");
        let json = serde_json::to_value(&out[0]).unwrap_or_default();
        assert!(json["pricing"].get("noInfo").is_none());

        assert_eq!(counters.invocations.load(Ordering::SeqCst), 3);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
        assert_eq!(sink.count("progress"), 1);
        assert_eq!(sink.count("attempt"), 3);
    }

    #[tokio::test]
    async fn test_session_failure_degrades_batch() {
        let (orch, provider, synthesizer) =
            orchestrator(ScriptedProvider::unreachable(), region_only());
        let sink = CollectingSink::new();
        let input: Vec<Resource> = (1..=5).map(resource).collect();

        let batch = orch
            .resolve_batch(&input, &sink, &CancellationToken::new())
            .await;

        assert_eq!(batch.resources.len(), 5);
        assert!(batch.resources.iter().all(ResourcePricing::is_no_info));
        for (out, input) in batch.resources.iter().zip(&input) {
            assert_eq!(&out.resource, input);
            assert_eq!(out.pricing.unit_of_measure, "N/A");
        }
        assert_eq!(batch.no_info, 5);
        assert!(batch.session_error.is_some());
        assert_eq!(provider.establishes(), 1);
        assert!(synthesizer.requests().is_empty());
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_failure_is_isolated_to_resource() {
        let session = ScriptedSession::new(vec![Ok(one_record(0.5)), Ok(one_record(0.25))]);
        let counters = session.counters();
        let synthesizer = region_only().failing_for("Standard_D2s_v3");
        let (orch, _, synthesizer) =
            orchestrator(ScriptedProvider::with_session(session), synthesizer);
        let input = vec![resource(1), resource(2), resource(3)];

        let batch = orch
            .resolve_batch(&input, &NoopSink, &CancellationToken::new())
            .await;

        assert_eq!(batch.resources.len(), 3);
        assert!((batch.resources[0].pricing.retail_price - 0.5).abs() < f64::EPSILON);
        assert!(batch.resources[1].is_no_info());
        assert!((batch.resources[2].pricing.retail_price - 0.25).abs() < f64::EPSILON);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.priced, 2);
        assert_eq!(counters.invocations.load(Ordering::SeqCst), 2);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);

        let asked: Vec<String> = synthesizer.requests().into_iter().map(|c| c.sku).collect();
        assert_eq!(asked, ["Standard_D1s_v3", "Standard_D2s_v3", "Standard_D3s_v3"]);
    }

    #[tokio::test]
    async fn test_session_establish_timeout_degrades_batch() {
        let session = ScriptedSession::new(vec![Ok(one_record(1.0))]);
        let counters = session.counters();
        let provider = ScriptedProvider::with_session(session).with_delay(Duration::from_secs(30));
        let synthesizer = Arc::new(region_only());
        let orch = PricingOrchestrator::new(
            Arc::new(provider),
            Arc::clone(&synthesizer) as Arc<dyn FilterSynthesizer>,
            ResolutionPolicy::default().with_call_timeout(Duration::from_millis(50)),
        );

        let batch = orch
            .resolve_batch(&[resource(1), resource(2)], &NoopSink, &CancellationToken::new())
            .await;

        assert!(batch.resources.iter().all(ResourcePricing::is_no_info));
        let reason = batch.session_error.unwrap_or_default();
        assert!(reason.starts_with("pricing session failed"), "{reason}");
        assert!(reason.contains("timed out"), "{reason}");
        assert!(synthesizer.requests().is_empty());
        assert_eq!(counters.invocations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_synthesis_timeout_is_isolated() {
        let session = ScriptedSession::new(vec![Ok(one_record(0.5)), Ok(one_record(0.25))]);
        let counters = session.counters();
        let synthesizer =
            region_only().slow_for("Standard_D2s_v3", Duration::from_secs(30));
        let orch = PricingOrchestrator::new(
            Arc::new(ScriptedProvider::with_session(session)),
            Arc::new(synthesizer),
            ResolutionPolicy::default().with_call_timeout(Duration::from_millis(50)),
        );

        let batch = orch
            .resolve_batch(
                &[resource(1), resource(2), resource(3)],
                &NoopSink,
                &CancellationToken::new(),
            )
            .await;

        assert!(!batch.resources[0].is_no_info());
        assert!(batch.resources[1].is_no_info());
        assert!(!batch.resources[2].is_no_info());
        assert_eq!(batch.failures.len(), 1);
        assert!(batch.failures[0].contains("filter synthesis failed"), "{}", batch.failures[0]);
        assert!(batch.failures[0].contains("timed out"), "{}", batch.failures[0]);
        assert!(batch.session_error.is_none());
        assert_eq!(counters.invocations.load(Ordering::SeqCst), 2);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invocation_error_is_isolated() {
        let session = ScriptedSession::new(vec![
            Err(PricingError::invocation("bad gateway")),
            Ok(one_record(1.0)),
        ]);
        let counters = session.counters();
        let (orch, _, _) = orchestrator(ScriptedProvider::with_session(session), region_only());

        let out = orch
            .resolve_pricing(&[resource(1), resource(2)], &NoopSink, &CancellationToken::new())
            .await;

        assert!(out[0].is_no_info());
        assert!(!out[1].is_no_info());
        assert_eq!(counters.invocations.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_close_failure_is_swallowed() {
        let session = ScriptedSession::new(vec![Ok(one_record(1.0))]).with_close_failure();
        let counters = session.counters();
        let (orch, _, _) = orchestrator(ScriptedProvider::with_session(session), region_only());

        let out = orch
            .resolve_pricing(&[resource(1)], &NoopSink, &CancellationToken::new())
            .await;

        assert!(!out[0].is_no_info());
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_batch_still_releases_session() {
        let session = ScriptedSession::always_empty();
        let counters = session.counters();
        let (orch, _, _) = orchestrator(ScriptedProvider::with_session(session), region_only());

        let out = orch
            .resolve_pricing(&[], &NoopSink, &CancellationToken::new())
            .await;

        assert!(out.is_empty());
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancellation_fills_sentinels() {
        let session = ScriptedSession::new(vec![Ok(one_record(1.0))]);
        let counters = session.counters();
        let (orch, _, _) = orchestrator(ScriptedProvider::with_session(session), region_only());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let batch = orch
            .resolve_batch(&[resource(1), resource(2)], &NoopSink, &cancel)
            .await;

        assert!(batch.cancelled);
        assert_eq!(batch.resources.len(), 2);
        assert!(batch.resources.iter().all(ResourcePricing::is_no_info));
        assert_eq!(counters.invocations.load(Ordering::SeqCst), 0);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    /// Cancels its token when the first attempt is reported.
    struct CancelOnAttempt(CancellationToken);

    impl ProgressSink for CancelOnAttempt {
        fn emit(&self, event: ProgressEvent) {
            if matches!(event, ProgressEvent::Attempt { .. }) {
                self.0.cancel();
            }
        }
    }

    #[tokio::test]
    async fn test_cancellation_after_first_resource_keeps_its_price() {
        let session = ScriptedSession::new(vec![Ok(one_record(0.5)), Ok(one_record(0.25))]);
        let counters = session.counters();
        let (orch, _, _) = orchestrator(ScriptedProvider::with_session(session), region_only());
        let cancel = CancellationToken::new();
        let sink = CancelOnAttempt(cancel.clone());

        let batch = orch
            .resolve_batch(&[resource(1), resource(2), resource(3)], &sink, &cancel)
            .await;

        assert!(batch.cancelled);
        assert_eq!(batch.resources.len(), 3);
        assert!((batch.resources[0].pricing.retail_price - 0.5).abs() < f64::EPSILON);
        assert!(batch.resources[1].is_no_info());
        assert!(batch.resources[2].is_no_info());
        assert_eq!(batch.resources[2].resource, resource(3));
        assert_eq!(batch.priced, 1);
        assert_eq!(batch.no_info, 2);
        assert_eq!(counters.invocations.load(Ordering::SeqCst), 1);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panic_still_releases_session() {
        let session = ScriptedSession::always_empty().panicking();
        let counters = session.counters();
        let (orch, _, _) = orchestrator(ScriptedProvider::with_session(session), region_only());

        let handle = tokio::spawn(async move {
            orch.resolve_pricing(&[resource(1)], &NoopSink, &CancellationToken::new())
                .await
        });

        let joined = handle.await;
        assert!(joined.is_err_and(|e| e.is_panic()));
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_progress_events_are_one_based_and_ordered() {
        let session = ScriptedSession::always_empty();
        let (orch, _, _) = orchestrator(ScriptedProvider::with_session(session), region_only());
        let sink = CollectingSink::new();

        orch.resolve_pricing(&[resource(1), resource(2)], &sink, &CancellationToken::new())
            .await;

        let indices: Vec<(usize, &str)> = sink
            .events()
            .iter()
            .map(|e| match e {
                ProgressEvent::Progress { resource_index, .. } => (*resource_index, "progress"),
                ProgressEvent::Attempt { resource_index, .. } => (*resource_index, "attempt"),
                ProgressEvent::Stage { .. } => (0, "stage"),
            })
            .collect();
        assert_eq!(indices.len(), 8);
        assert_eq!(indices[0], (1, "progress"));
        assert_eq!(indices[1..4], [(1, "attempt"); 3]);
        assert_eq!(indices[4], (2, "progress"));
        assert_eq!(indices[5..8], [(2, "attempt"); 3]);
    }

    proptest! {
        #[test]
        fn prop_output_matches_input_order_and_count(
            outcomes in prop::collection::vec(0u8..3, 0..12)
        ) {
            let script = outcomes
                .iter()
                .map(|o| match o {
                    0 => Ok(one_record(0.1)),
                    1 => Err(PricingError::invocation("flaky")),
                    _ => Ok(PricingResult::default()),
                })
                .collect();
            let session = ScriptedSession::new(script);
            let (orch, _, _) =
                orchestrator(ScriptedProvider::with_session(session), region_only());
            let input: Vec<Resource> = (0..outcomes.len()).map(resource).collect();

            let rt = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap_or_else(|_| unreachable!());
            let out = rt.block_on(orch.resolve_pricing(&input, &NoopSink, &CancellationToken::new()));

            prop_assert_eq!(out.len(), input.len());
            for (o, i) in out.iter().zip(&input) {
                prop_assert_eq!(&o.resource, i);
            }
        }

        #[test]
        fn prop_attempts_bounded(max_attempts in 1usize..6) {
            let session = ScriptedSession::always_empty();
            let counters = session.counters();
            let provider = Arc::new(ScriptedProvider::with_session(session));
            let orch = PricingOrchestrator::new(
                provider,
                Arc::new(region_only()),
                ResolutionPolicy::default().with_max_attempts(max_attempts),
            );

            let rt = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap_or_else(|_| unreachable!());
            let out = rt.block_on(orch.resolve_pricing(&[sample_vm()], &NoopSink, &CancellationToken::new()));

            prop_assert!(out[0].is_no_info());
            prop_assert_eq!(counters.invocations.load(Ordering::SeqCst), max_attempts);
        }
    }
}
