//! The analyze module sends archived site text to an LLM under one or more focus modes
//! and collects the answers into analysis results.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use llm::builder::LLMBuilder;
use llm::chat::{ChatMessage, ChatProvider};
use log::{debug, error, info, warn};
use once_cell::sync::Lazy;
use rate_guard::{RateLimit, StdTokenBucket, TokenBucketBuilder};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::compose::{ReportPaths, compose_report};
use crate::constants::THINK_STRIPPER;
use crate::error::Result;
use crate::prompt::{Focus, PromptTemplates};
use crate::storage::{SiteRecord, load_index, prepare_output_root};

static THINK_STRIPPER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(THINK_STRIPPER).expect("Failed to compile THINK_STRIPPER regex"));

/// Shared data for one analysis run.
pub struct AnalyzeContext<'a> {
    /// LLM model answering the prompts
    pub model: &'a dyn ChatProvider,
    /// Model name recorded in the results
    pub model_name: &'a str,
    pub templates: &'a PromptTemplates,
    /// Characters of site data per prompt
    pub char_budget: usize,
    /// Rate limiter for controlling request frequency
    pub rate_limiter: Option<&'a StdTokenBucket>,
}

/// Answer of the model, or the reason there is none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisOutcome {
    Response(String),
    Error(String),
}

impl AnalysisOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, AnalysisOutcome::Error(_))
    }
}

/// Analysis of one site under one focus mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub site: String,
    pub url: String,
    pub focus: Focus,
    pub model: String,
    pub prompt: String,
    pub outcome: AnalysisOutcome,
    pub timestamp: DateTime<Utc>,
}

/// Settings of [`analyze_index`] taken from the command line.
#[derive(Debug, Clone)]
pub struct AnalyzeSettings {
    pub model_name: String,
    pub foci: Vec<String>,
    pub templates: PromptTemplates,
    pub char_budget: usize,
    /// Rate limit: requests per minute (default: no limit)
    pub rpm: Option<u32>,
    pub output_dir: PathBuf,
}

/// Analyzes every site of a sites index and writes the combined report.
///
/// # Errors
///
/// Returns an error if:
/// * A focus name is unknown (checked before anything else)
/// * The report folder cannot be written (checked before any inference)
/// * The index cannot be read
/// * The LLM model fails to build
/// * The report cannot be written
pub async fn analyze_index(
    index_path: &Path,
    llm_builder: LLMBuilder,
    settings: &AnalyzeSettings,
) -> anyhow::Result<ReportPaths> {
    let foci = Focus::parse_all(&settings.foci)?;
    prepare_output_root(&settings.output_dir)?;

    let records = load_index(index_path).with_context(|| {
        format!(
            "Scraped data file not found or unreadable: {}. Run `sitescribe scrape <urls>` first",
            index_path.display()
        )
    })?;

    let model = llm_builder
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build LLM model: {}", e))?;

    let rate_limiter = settings.rpm.and_then(build_rate_limiter);

    let ctx = AnalyzeContext {
        model: model.as_ref(),
        model_name: &settings.model_name,
        templates: &settings.templates,
        char_budget: settings.char_budget,
        rate_limiter: rate_limiter.as_ref(),
    };

    info!(
        "Analyzing {} site(s) with {} (focus: {})",
        records.len(),
        settings.model_name,
        foci.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    );

    let results = analyze(&ctx, &records, &foci).await?;
    let failed = results.iter().filter(|result| result.outcome.is_error()).count();
    if failed > 0 {
        warn!("{failed} of {} analyses failed", results.len());
    }

    let paths = compose_report(&results, &settings.model_name, &foci, &settings.output_dir)?;
    Ok(paths)
}

fn build_rate_limiter(rpm: u32) -> Option<StdTokenBucket> {
    let capacity = rpm.max(1) as u64;
    let refill_interval = Duration::from_secs_f64(60.0 / capacity as f64);

    TokenBucketBuilder::builder()
        .capacity(capacity)
        .refill_amount(1_u64)
        .refill_every(refill_interval)
        .with_time(rate_guard::StdTimeSource::new())
        .with_precision::<rate_guard::Nanos>()
        .build()
        .ok()
}

/// Analyzes every successfully archived record under every focus, in record order and
/// then focus order. Failed records are skipped.
///
/// # Errors
///
/// Returns [`crate::Error::UnknownFocus`] before any request is made if a focus name is
/// not one of the fixed modes. Inference failures do not error, they are recorded as
/// [`AnalysisOutcome::Error`].
pub async fn analyze<S: AsRef<str>>(
    ctx: &AnalyzeContext<'_>,
    records: &[SiteRecord],
    foci: &[S],
) -> Result<Vec<AnalysisResult>> {
    let foci = Focus::parse_all(foci)?;
    let mut results = Vec::new();

    for record in records {
        if !record.success {
            warn!("Skipping {} as it was not archived", record.url);
            continue;
        }

        let text = match record.read_text() {
            Ok(text) => text.unwrap_or_default(),
            Err(read_error) => {
                warn!("Analyzing {} without content: {read_error}", record.url);
                String::new()
            }
        };

        for focus in &foci {
            results.push(analyze_site(ctx, record, &text, *focus).await);
        }
    }

    Ok(results)
}

/// Runs one focus mode against one site.
pub async fn analyze_site(
    ctx: &AnalyzeContext<'_>,
    record: &SiteRecord,
    text: &str,
    focus: Focus,
) -> AnalysisResult {
    let prompt = ctx.templates.render(focus, record, text, ctx.char_budget);

    info!("Analyzing {} ({focus})", record.url);
    let outcome = match ask_model(&prompt, ctx).await {
        Ok(response) => {
            debug!("Analyzed {} ({focus})", record.url);
            AnalysisOutcome::Response(response)
        }
        Err(model_error) => {
            error!("Analysis of {} ({focus}) failed: {model_error}", record.url);
            AnalysisOutcome::Error(model_error.to_string())
        }
    };

    AnalysisResult {
        site: record.domain.clone(),
        url: record.url.clone(),
        focus,
        model: ctx.model_name.to_string(),
        prompt,
        outcome,
        timestamp: Utc::now(),
    }
}

/// Sends `prompt` to the model and returns the answer without `<think>` blocks.
///
/// # Errors
///
/// Returns an error if the LLM chat operation fails
pub async fn ask_model(prompt: &str, ctx: &AnalyzeContext<'_>) -> anyhow::Result<String> {
    let messages = vec![ChatMessage::user().content(prompt).build()];

    if let Some(limiter) = ctx.rate_limiter {
        loop {
            match limiter.try_acquire(1) {
                Ok(()) => break,
                Err(_) => {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }

    let response = ctx
        .model
        .chat(&messages)
        .await
        .map_err(|err| anyhow::anyhow!("LLM error: {err}."))?
        .to_string();

    Ok(THINK_STRIPPER_REGEX
        .replace_all(&response, "")
        .trim()
        .to_owned())
}
