//! Output formatting for CLI results and progress lines.

#![allow(clippy::format_push_string)]

use std::fmt::Write as _;

use serde::Serialize;

use crate::core::{CostEstimate, Resource, ResourcePricing};
use crate::pricing::{PricingBatch, ProgressEvent};

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty JSON for results, one JSON object per line for progress.
    Json,
}

impl OutputFormat {
    /// Parses a format name; unknown names fall back to text.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" | "ndjson" => Self::Json,
            _ => Self::Text,
        }
    }

    /// Serializes `value` as pretty JSON.
    #[must_use]
    pub fn to_json<T: Serialize>(self, value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }
}

/// One progress line for stderr.
#[must_use]
pub fn format_progress(event: &ProgressEvent, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => serde_json::to_string(event).unwrap_or_default(),
        OutputFormat::Text => match event {
            ProgressEvent::Stage { message } => format!("==> {message}"),
            ProgressEvent::Progress {
                resource_index,
                total,
            } => format!("[{resource_index}/{total}] resolving pricing"),
            ProgressEvent::Attempt {
                resource_index,
                total,
                attempt_number,
                filter,
                result,
                error,
            } => {
                let filter = serde_json::to_string(filter).unwrap_or_default();
                let outcome = match (result, error) {
                    (_, Some(error)) => format!("failed: {error}"),
                    (Some(result), None) => format!("{} record(s)", result.data.len()),
                    (None, None) => "no result".to_string(),
                };
                format!(
                    "[{resource_index}/{total}] attempt {attempt_number} {filter} -> {outcome}"
                )
            }
        },
    }
}

/// Lists extracted resources, one per line.
#[must_use]
pub fn format_resources(resources: &[Resource]) -> String {
    if resources.is_empty() {
        return "No billable resources found.\n".to_string();
    }
    let mut out = format!("{} resource(s):\n", resources.len());
    for (i, r) in resources.iter().enumerate() {
        let _ = writeln!(
            out,
            "  {:>2}. {} | sku: {} | capacity: {} | region: {}",
            i + 1,
            r.resource_type,
            blank_as_dash(&r.sku),
            blank_as_dash(&r.capacity),
            blank_as_dash(&r.arm_region_name),
        );
    }
    out
}

fn blank_as_dash(s: &str) -> &str {
    if s.trim().is_empty() { "-" } else { s }
}

fn format_priced_line(out: &mut String, index: usize, priced: &ResourcePricing) {
    let p = &priced.pricing;
    if priced.is_no_info() {
        let _ = writeln!(
            out,
            "  {:>2}. {} ({}): no pricing information",
            index, priced.resource.resource_type, priced.resource.sku
        );
    } else {
        let _ = writeln!(
            out,
            "  {:>2}. {} ({}): {:.4} {} per {}",
            index,
            priced.resource.resource_type,
            priced.resource.sku,
            p.retail_price,
            p.currency_code,
            p.unit_of_measure
        );
    }
}

/// Summarizes a pricing batch.
#[must_use]
pub fn format_batch(batch: &PricingBatch) -> String {
    let mut out = String::new();
    for (i, priced) in batch.resources.iter().enumerate() {
        format_priced_line(&mut out, i + 1, priced);
    }
    let _ = writeln!(
        out,
        "\nPriced: {}/{} | No info: {} | Time: {:.1}s",
        batch.priced,
        batch.resources.len(),
        batch.no_info,
        batch.elapsed.as_secs_f64()
    );
    if let Some(ref e) = batch.session_error {
        let _ = writeln!(out, "Pricing session unavailable: {e}");
    }
    for failure in &batch.failures {
        let _ = writeln!(out, "Resolution error: {failure}");
    }
    if batch.cancelled {
        out.push_str("Cancelled before every resource was priced.\n");
    }
    out
}

/// Summarizes a cost estimate.
#[must_use]
pub fn format_estimate(estimate: &CostEstimate) -> String {
    let mut out = String::new();
    for (i, priced) in estimate.resources.iter().enumerate() {
        format_priced_line(&mut out, i + 1, priced);
    }
    let _ = writeln!(
        out,
        "\nEstimated monthly cost: {:.2} {} ({} of {} resource(s) unpriced)",
        estimate.total_cost,
        estimate.currency,
        estimate.unpriced_count(),
        estimate.resources.len()
    );
    out
}
