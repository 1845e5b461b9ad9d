//! CLI command implementations.
//!
//! Each command returns the text to print on stdout. Progress and logs go
//! to stderr.

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::format_push_string)]

use std::io::{self, Read, Write as IoWrite};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::agent::config::AgentConfigBuilder;
use crate::agent::{AgentConfig, PromptSet};
use crate::analyzer::Analyzer;
use crate::cli::output::{
    OutputFormat, format_batch, format_estimate, format_progress, format_resources,
};
use crate::cli::parser::{Cli, Commands};
use crate::core::Resource;
use crate::error::{CommandError, Result};
use crate::mcp::McpSessionProvider;
use crate::pricing::{NoopSink, ProgressEvent, ProgressSink, SessionProvider};

/// Executes the CLI command.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Analyze {
            input,
            html_only,
            quiet,
        } => cmd_analyze(cli, input, *html_only, *quiet, format),
        Commands::Extract { input } => cmd_extract(cli, input, format),
        Commands::Price { input, quiet } => cmd_price(cli, input, *quiet, format),
        Commands::Schema => cmd_schema(cli, format),
        Commands::InitPrompts { dir } => cmd_init_prompts(dir.as_deref(), format),
    }
}

/// Applies command-line overrides on top of the environment.
fn config_builder(cli: &Cli) -> AgentConfigBuilder {
    let mut builder = AgentConfig::builder();
    if let Some(ref url) = cli.mcp_url {
        builder = builder.mcp_url(url);
    }
    if let Some(n) = cli.max_attempts {
        builder = builder.max_filter_attempts(n);
    }
    if let Some(secs) = cli.call_timeout {
        builder = builder.call_timeout(Duration::from_secs(secs));
    }
    if let Some(ref dir) = cli.prompt_dir {
        builder = builder.prompt_dir(dir);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    builder.from_env()
}

fn build_analyzer(cli: &Cli) -> Result<Analyzer> {
    let config = config_builder(cli).build().map_err(|e| {
        CommandError::ExecutionFailed(format!("Agent configuration error: {e}"))
    })?;
    debug!(
        mcp_url = %config.mcp_url,
        attempts = config.max_filter_attempts,
        "configuration resolved"
    );
    Analyzer::from_config(&config)
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}")).into()
    })
}

/// Reads a file, or stdin when `path` is `-`.
fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut content = String::new();
        io::stdin().read_to_string(&mut content)?;
        return Ok(content);
    }
    std::fs::read_to_string(path).map_err(|e| {
        CommandError::InvalidInput(format!("cannot read {}: {e}", path.display())).into()
    })
}

/// Cancels `token` on Ctrl-C.
fn cancel_on_interrupt(token: &CancellationToken) {
    let token = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if result.is_ok() {
                    warn!("interrupted; finishing current resource");
                    token.cancel();
                }
            }
            () = token.cancelled() => {}
        }
    });
}

/// Prints progress events to stderr from a background task, so slow
/// terminals never hold up the pricing loop.
struct ProgressStream {
    tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
    printer: Option<JoinHandle<()>>,
}

impl ProgressStream {
    /// Must be called inside the runtime.
    fn start(format: OutputFormat, quiet: bool) -> Self {
        if quiet {
            return Self {
                tx: None,
                printer: None,
            };
        }
        let (tx, mut rx) = mpsc::unbounded_channel::<ProgressEvent>();
        let printer = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let _ = writeln!(io::stderr(), "{}", format_progress(&event, format));
            }
        });
        Self {
            tx: Some(tx),
            printer: Some(printer),
        }
    }

    fn sink(&self) -> &dyn ProgressSink {
        match self.tx {
            Some(ref tx) => tx,
            None => &NoopSink,
        }
    }

    /// Waits until every emitted event has been printed.
    async fn finish(mut self) {
        drop(self.tx.take());
        if let Some(printer) = self.printer.take()
            && let Err(e) = printer.await
        {
            warn!(error = %e, "progress printer stopped");
        }
    }
}

fn cmd_analyze(
    cli: &Cli,
    input: &Path,
    html_only: bool,
    quiet: bool,
    format: OutputFormat,
) -> Result<String> {
    let template = read_input(input)?;
    let analyzer = build_analyzer(cli)?;
    let rt = runtime()?;

    let report = rt.block_on(async {
        let cancel = CancellationToken::new();
        cancel_on_interrupt(&cancel);
        let progress = ProgressStream::start(format, quiet);
        let result = analyzer.analyze(&template, progress.sink(), &cancel).await;
        progress.finish().await;
        cancel.cancel();
        result
    })?;

    if html_only {
        return Ok(format!("{}\n", report.report));
    }
    match format {
        OutputFormat::Text => {
            let mut out = format_estimate(&report.estimate);
            out.push_str(&format!(
                "Time: {:.1}s\n\n{}\n",
                report.elapsed.as_secs_f64(),
                report.report
            ));
            Ok(out)
        }
        OutputFormat::Json => Ok(format.to_json(&report)),
    }
}

fn cmd_extract(cli: &Cli, input: &Path, format: OutputFormat) -> Result<String> {
    let template = read_input(input)?;
    let analyzer = build_analyzer(cli)?;
    let resources = runtime()?.block_on(analyzer.extract(&template))?;

    match format {
        OutputFormat::Text => Ok(format_resources(&resources)),
        OutputFormat::Json => Ok(format.to_json(&resources)),
    }
}

fn cmd_price(cli: &Cli, input: &Path, quiet: bool, format: OutputFormat) -> Result<String> {
    let content = read_input(input)?;
    let resources: Vec<Resource> = serde_json::from_str(&content).map_err(|e| {
        CommandError::InvalidInput(format!("expected a JSON array of resources: {e}"))
    })?;
    let analyzer = build_analyzer(cli)?;
    let rt = runtime()?;

    let batch = rt.block_on(async {
        let cancel = CancellationToken::new();
        cancel_on_interrupt(&cancel);
        let progress = ProgressStream::start(format, quiet);
        let batch = analyzer.price(&resources, progress.sink(), &cancel).await;
        progress.finish().await;
        cancel.cancel();
        batch
    });

    match format {
        OutputFormat::Text => Ok(format_batch(&batch)),
        OutputFormat::Json => Ok(format.to_json(&batch)),
    }
}

fn cmd_schema(cli: &Cli, format: OutputFormat) -> Result<String> {
    let (url, tool) = config_builder(cli).pricing_target();
    let provider = McpSessionProvider::new(url, tool);
    let rt = runtime()?;

    let schema = rt.block_on(async {
        let session = provider.establish().await?;
        let description = session.schema.describe(true);
        if let Err(e) = session.handle.close().await {
            warn!(error = %e, "failed to close pricing session");
        }
        Ok::<_, crate::error::PricingError>(description)
    })?;

    match format {
        OutputFormat::Text => Ok(format!("{schema}\n")),
        OutputFormat::Json => {
            let value: serde_json::Value = serde_json::from_str(&schema)?;
            Ok(format.to_json(&value))
        }
    }
}

fn cmd_init_prompts(dir: Option<&Path>, format: OutputFormat) -> Result<String> {
    let target_dir = dir
        .map(PathBuf::from)
        .or_else(PromptSet::default_dir)
        .ok_or_else(|| {
            CommandError::ExecutionFailed(
                "Could not determine home directory for default prompt path".to_string(),
            )
        })?;

    let written = PromptSet::write_defaults(&target_dir).map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to write prompt templates: {e}"))
    })?;

    match format {
        OutputFormat::Text => {
            if written.is_empty() {
                return Ok(format!(
                    "All prompt templates already exist in: {}\n",
                    target_dir.display()
                ));
            }
            let mut output = format!(
                "Wrote {} prompt template(s) to: {}\n",
                written.len(),
                target_dir.display()
            );
            for path in &written {
                output.push_str(&format!(
                    "  {}\n",
                    path.file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or("unknown")
                ));
            }
            output.push_str("\nEdit these files to customize agent system prompts.\n");
            Ok(output)
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "directory": target_dir.to_string_lossy(),
                "written": written.iter().map(|p| p.to_string_lossy().into_owned()).collect::<Vec<_>>(),
                "count": written.len()
            });
            Ok(format.to_json(&json))
        }
    }
}
