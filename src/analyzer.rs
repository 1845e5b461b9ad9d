//! End-to-end template analysis.
//!
//! ```text
//! template ─▶ ExtractorAgent ─▶ PricingOrchestrator ─▶ CostEstimate ─▶ ReportAgent
//! ```
//!
//! Stage events bracket the core's per-resource progress so a consumer
//! sees one ordered stream for the whole run.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::agent::{
    AgentConfig, ExtractorAgent, FilterAgent, LlmProvider, PromptSet, ReportAgent,
    create_provider,
};
use crate::core::{CostEstimate, Resource, ResourcePricing};
use crate::error::{AgentError, CommandError, Result};
use crate::mcp::McpSessionProvider;
use crate::pricing::{PricingBatch, PricingOrchestrator, ProgressEvent, ProgressSink};

/// Stage: resource extraction started.
pub const STAGE_ANALYZING: &str = "analyzing template";
/// Stage: pricing lookups started.
pub const STAGE_PRICING: &str = "fetching pricing";
/// Stage: report generation started.
pub const STAGE_REPORTING: &str = "generating report";
/// Stage: the report is ready.
pub const STAGE_READY: &str = "ready";

/// Everything produced by one analysis run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    /// HTML cost report.
    pub report: String,
    /// Resources found in the template.
    pub resources: Vec<Resource>,
    /// The same resources with their pricing.
    pub resources_with_pricing: Vec<ResourcePricing>,
    /// Monthly roll-up.
    pub estimate: CostEstimate,
    /// Resources that received a real price.
    pub priced: usize,
    /// Wall-clock time for the whole run.
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_secs<S>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_f64(d.as_secs_f64())
}

/// Runs the extract → price → estimate → report pipeline.
pub struct Analyzer {
    provider: Arc<dyn LlmProvider>,
    extractor: ExtractorAgent,
    reporter: ReportAgent,
    pricing: PricingOrchestrator,
    call_timeout: Option<Duration>,
}

impl Analyzer {
    /// Assembles an analyzer from its parts.
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        extractor: ExtractorAgent,
        reporter: ReportAgent,
        pricing: PricingOrchestrator,
    ) -> Self {
        Self {
            provider,
            extractor,
            reporter,
            pricing,
            call_timeout: None,
        }
    }

    /// Bounds each extraction and report model call by `timeout`.
    #[must_use]
    pub const fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// Wires the production collaborators: the configured LLM provider,
    /// prompts from the prompt directory, and the MCP pricing tool.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be created.
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        let provider = create_provider(config)?;
        let prompts = PromptSet::load(config.prompt_dir.as_deref());

        let synthesizer = Arc::new(FilterAgent::new(
            config,
            prompts.filter,
            Arc::clone(&provider),
        ));
        let sessions = Arc::new(McpSessionProvider::new(
            config.mcp_url.clone(),
            config.pricing_tool.clone(),
        ));
        let pricing = PricingOrchestrator::new(sessions, synthesizer, config.resolution_policy());

        let analyzer = Self::new(
            provider,
            ExtractorAgent::new(config, prompts.extractor),
            ReportAgent::new(config, prompts.report),
            pricing,
        );
        Ok(match config.call_timeout {
            Some(timeout) => analyzer.with_call_timeout(timeout),
            None => analyzer,
        })
    }

    async fn deadline<F, T>(&self, fut: F) -> std::result::Result<T, AgentError>
    where
        F: Future<Output = std::result::Result<T, AgentError>>,
    {
        match self.call_timeout {
            Some(limit) => tokio::time::timeout(limit, fut).await.unwrap_or_else(|_| {
                Err(AgentError::Timeout {
                    seconds: limit.as_secs(),
                })
            }),
            None => fut.await,
        }
    }

    /// Extracts billable resources from `template`.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::InvalidInput`] for a blank template, or an
    /// agent error if the model call fails or exceeds the call timeout.
    pub async fn extract(&self, template: &str) -> Result<Vec<Resource>> {
        if template.trim().is_empty() {
            return Err(CommandError::InvalidInput("template is empty".to_string()).into());
        }
        let extraction = self.extractor.extract(self.provider.as_ref(), template);
        Ok(self.deadline(extraction).await?)
    }

    /// Prices already-extracted resources. Never fails.
    pub async fn price(
        &self,
        resources: &[Resource],
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> PricingBatch {
        self.pricing.resolve_batch(resources, sink, cancel).await
    }

    /// Runs the full pipeline on `template`.
    ///
    /// # Errors
    ///
    /// Fails on a blank template, an extraction or report model failure,
    /// or cancellation before the report is written. Pricing failures do
    /// not fail the run; they leave resources unpriced.
    pub async fn analyze(
        &self,
        template: &str,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<AnalysisReport> {
        let start = Instant::now();

        sink.emit(ProgressEvent::stage(STAGE_ANALYZING));
        let resources = self.extract(template).await?;
        info!(count = resources.len(), "resources extracted");
        if resources.is_empty() {
            warn!("no billable resources found in template");
        }

        sink.emit(ProgressEvent::stage(STAGE_PRICING));
        let batch = self.price(&resources, sink, cancel).await;
        if cancel.is_cancelled() {
            return Err(CommandError::ExecutionFailed("analysis cancelled".to_string()).into());
        }

        let priced = batch.priced;
        let estimate = CostEstimate::from_resources(batch.resources);
        info!(
            priced,
            unpriced = estimate.unpriced_count(),
            total_cost = estimate.total_cost,
            currency = %estimate.currency,
            "estimate computed"
        );

        sink.emit(ProgressEvent::stage(STAGE_REPORTING));
        let report = self
            .deadline(self.reporter.generate(self.provider.as_ref(), &estimate))
            .await?;
        sink.emit(ProgressEvent::stage(STAGE_READY));

        Ok(AnalysisReport {
            report,
            resources,
            resources_with_pricing: estimate.resources.clone(),
            estimate,
            priced,
            elapsed: start.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use serde_json::json;

    use super::*;
    use crate::agent::traits::tests::ScriptedProvider as ScriptedLlm;
    use crate::core::PricingResult;
    use crate::error::Error;
    use crate::pricing::testing::{
        ScriptedProvider as ScriptedSessions, ScriptedSession, ScriptedSynthesizer, one_record,
    };
    use crate::pricing::{CollectingSink, ResolutionPolicy};

    const VM_JSON: &str = r#"Resources:
[{"resourceType": "Microsoft.Compute/virtualMachines", "sku": "Standard_D2s_v3", "capacity": "2 vCPUs, 8GiB", "armRegionName": "eastus"}]"#;

    fn analyzer(llm: Arc<ScriptedLlm>, sessions: ScriptedSessions) -> Analyzer {
        let config = AgentConfig::builder()
            .api_key("test")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let synthesizer = ScriptedSynthesizer::cycling(vec![
            json!({"armRegionName": "eastus", "armSkuName": "Standard_D2s_v3"}),
        ]);
        let pricing = PricingOrchestrator::new(
            Arc::new(sessions),
            Arc::new(synthesizer),
            ResolutionPolicy::default(),
        );
        Analyzer::new(
            llm,
            ExtractorAgent::new(&config, "extract".to_string()),
            ReportAgent::new(&config, "report".to_string()),
            pricing,
        )
    }

    fn stages(sink: &CollectingSink) -> Vec<String> {
        sink.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::Stage { message } => Some(message),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_analyze_full_pipeline() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok(VM_JSON.to_string()),
            Ok("```html\n<h2>Estimate</h2>\n```".to_string()),
        ]));
        let session = ScriptedSession::new(vec![Ok(one_record(0.1))]);
        let counters = session.counters();
        let analyzer = analyzer(Arc::clone(&llm), ScriptedSessions::with_session(session));
        let sink = CollectingSink::new();

        let report = analyzer
            .analyze("{\"resources\": []}", &sink, &CancellationToken::new())
            .await
            .unwrap_or_else(|_| unreachable!());

        assert_eq!(report.report, "<h2>Estimate</h2>");
        assert_eq!(report.resources.len(), 1);
        assert_eq!(report.resources_with_pricing.len(), 1);
        assert_eq!(report.priced, 1);
        assert!((report.estimate.total_cost - 73.0).abs() < 1e-9);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);

        assert_eq!(
            stages(&sink),
            vec![STAGE_ANALYZING, STAGE_PRICING, STAGE_REPORTING, STAGE_READY]
        );
        let kinds: Vec<&str> = sink.events().iter().map(ProgressEvent::kind).collect();
        assert_eq!(
            kinds,
            vec!["stage", "stage", "progress", "attempt", "stage", "stage"]
        );

        // The report prompt carries the priced estimate.
        let requests = llm.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].messages[1].content.contains("\"totalCost\""));
    }

    #[tokio::test]
    async fn test_analyze_pricing_outage_still_reports() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok(VM_JSON.to_string()),
            Ok("<p>No prices</p>".to_string()),
        ]));
        let analyzer = analyzer(llm, ScriptedSessions::unreachable());

        let report = analyzer
            .analyze("template", &CollectingSink::new(), &CancellationToken::new())
            .await
            .unwrap_or_else(|_| unreachable!());

        assert_eq!(report.priced, 0);
        assert!(report.resources_with_pricing[0].is_no_info());
        assert!(report.estimate.total_cost.abs() < f64::EPSILON);
        assert_eq!(report.report, "<p>No prices</p>");
    }

    #[tokio::test]
    async fn test_analyze_empty_template_rejected() {
        let llm = Arc::new(ScriptedLlm::new(Vec::new()));
        let analyzer = analyzer(Arc::clone(&llm), ScriptedSessions::unreachable());

        let result = analyzer
            .analyze("  \n", &CollectingSink::new(), &CancellationToken::new())
            .await;

        assert!(matches!(
            result,
            Err(Error::Command(CommandError::InvalidInput(_)))
        ));
        assert!(llm.requests().is_empty());
    }

    #[tokio::test]
    async fn test_analyze_extraction_failure_propagates() {
        let llm = Arc::new(ScriptedLlm::new(vec![Err(AgentError::ApiRequest {
            message: "unauthorized".to_string(),
            status: Some(401),
        })]));
        let sessions = ScriptedSessions::with_session(ScriptedSession::always_empty());
        let analyzer = analyzer(llm, sessions);

        let result = analyzer
            .analyze("template", &CollectingSink::new(), &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(Error::Agent(AgentError::ApiRequest { .. }))));
    }

    #[tokio::test]
    async fn test_analyze_unparsable_extraction_prices_nothing() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok("I could not find any resources.".to_string()),
            Ok("<p>Nothing to price</p>".to_string()),
        ]));
        let session = ScriptedSession::new(vec![Ok(PricingResult::default())]);
        let analyzer = analyzer(llm, ScriptedSessions::with_session(session));

        let report = analyzer
            .analyze("template", &CollectingSink::new(), &CancellationToken::new())
            .await
            .unwrap_or_else(|_| unreachable!());

        assert!(report.resources.is_empty());
        assert!(report.resources_with_pricing.is_empty());
        assert_eq!(report.estimate.currency, "USD");
    }

    #[tokio::test]
    async fn test_slow_extraction_times_out() {
        let llm = Arc::new(
            ScriptedLlm::new(vec![Ok(VM_JSON.to_string())]).with_delay(Duration::from_secs(30)),
        );
        let analyzer = analyzer(llm, ScriptedSessions::unreachable())
            .with_call_timeout(Duration::from_millis(50));
        let sink = CollectingSink::new();

        let result = analyzer
            .analyze("template", &sink, &CancellationToken::new())
            .await;

        assert!(matches!(
            result,
            Err(Error::Agent(AgentError::Timeout { seconds: 0 }))
        ));
        assert_eq!(stages(&sink), vec![STAGE_ANALYZING]);
    }

    #[tokio::test]
    async fn test_slow_report_times_out() {
        let llm = Arc::new(
            ScriptedLlm::new(vec![
                Ok(VM_JSON.to_string()),
                Ok("<p>late</p>".to_string()),
            ])
            .with_delay_from(1, Duration::from_secs(30)),
        );
        let analyzer = analyzer(Arc::clone(&llm), ScriptedSessions::unreachable())
            .with_call_timeout(Duration::from_secs(1));
        let sink = CollectingSink::new();

        let result = analyzer
            .analyze("template", &sink, &CancellationToken::new())
            .await;

        assert!(matches!(
            result,
            Err(Error::Agent(AgentError::Timeout { seconds: 1 }))
        ));
        assert_eq!(llm.requests().len(), 2);
        assert!(stages(&sink).contains(&STAGE_REPORTING.to_string()));
        assert!(!stages(&sink).contains(&STAGE_READY.to_string()));
    }

    #[tokio::test]
    async fn test_analyze_cancelled_skips_report() {
        let llm = Arc::new(ScriptedLlm::new(vec![Ok(VM_JSON.to_string())]));
        let analyzer = analyzer(
            Arc::clone(&llm),
            ScriptedSessions::with_session(ScriptedSession::always_empty()),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();
        let sink = CollectingSink::new();

        let result = analyzer.analyze("template", &sink, &cancel).await;

        assert!(matches!(
            result,
            Err(Error::Command(CommandError::ExecutionFailed(_)))
        ));
        assert_eq!(llm.requests().len(), 1);
        assert!(!stages(&sink).contains(&STAGE_REPORTING.to_string()));
    }
}
