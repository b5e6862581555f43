//! sitescribe is a CLI tool that archives websites with curl and analyzes the archived
//! content with a locally served LLM.
//!
//! The tool has five commands:
//! 1. `models` - Lists the models available on the inference service
//! 2. `scrape` - Archives one or more pages and writes a sites index
//! 3. `crawl` - Archives pages reachable from seeds within the same domain
//! 4. `analyze` - Analyzes a sites index and writes a report
//! 5. `run` - Scrapes and analyzes in one go

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use env_logger::Builder;
use llm::builder::{LLMBackend, LLMBuilder};
use log::{LevelFilter, info};
use url::Url;

use sitescribe::{
    ArchiveOptions, Archiver, Crawler, CurlFetcher, Focus, PromptTemplates, TextBy,
    analyze::{AnalyzeSettings, analyze_index},
    constants::{
        DEFAULT_ANALYSIS_DIR, DEFAULT_BACKEND, DEFAULT_CHAR_BUDGET, DEFAULT_CRAWL_MAX_PAGES,
        DEFAULT_ENDPOINT, DEFAULT_INFERENCE_TIMEOUT_SECS, DEFAULT_MAX_SCRIPTS, DEFAULT_MODEL,
        DEFAULT_OUTPUT_DIR, DEFAULT_TIMEOUT_SECS, MODEL_API_KEY_ENV_NAME, SCRIPT_DELAY,
        SITES_INDEX_FILE,
    },
    models::list_models,
    scrape::scrape,
    storage::{prepare_output_root, write_index},
};

/// A CLI tool to archive websites and analyze them with a local LLM
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// The command to execute
    #[command(subcommand)]
    command: Command,

    #[arg(long, short, action = clap::ArgAction::Count, help = "Output v(v...)erbosity: error (0), warn (1), info (2), debug (3), trace (4)", global = true, default_value_t = 2)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// List models available on the inference service
    Models {
        /// Base URL of the inference service
        #[arg(long, default_value = DEFAULT_ENDPOINT)]
        endpoint: String,
    },
    /// Archive web pages (HTML, text and scripts)
    Scrape {
        /// One or more URLs to scrape
        #[arg(required = true)]
        urls: Vec<String>,
        #[command(flatten)]
        scrape: ScrapeArgs,
    },
    /// Archive pages reachable from the given seeds within their domain
    Crawl {
        /// One or more seed URLs
        #[arg(required = true)]
        urls: Vec<String>,
        /// Maximum link depth below a seed
        #[arg(long, short, default_value_t = 1)]
        depth: usize,
        /// Maximum pages archived per seed, 0 for no limit
        #[arg(long, default_value_t = DEFAULT_CRAWL_MAX_PAGES)]
        max_pages: usize,
        #[command(flatten)]
        scrape: ScrapeArgs,
    },
    /// Analyze previously scraped sites with the LLM
    Analyze {
        /// Sites index written by `scrape` or `crawl`
        #[arg(long, short, default_value_t = default_index_file())]
        file: String,
        #[command(flatten)]
        analyze: AnalyzeArgs,
    },
    /// Scrape and analyze in one go
    Run {
        /// One or more URLs to scrape
        #[arg(required = true)]
        urls: Vec<String>,
        #[command(flatten)]
        scrape: ScrapeArgs,
        #[command(flatten)]
        analyze: AnalyzeArgs,
    },
}

#[derive(Args)]
struct ScrapeArgs {
    /// Output folder for archived sites
    #[arg(long, short, default_value = DEFAULT_OUTPUT_DIR)]
    output: PathBuf,
    /// Skip JavaScript file downloads
    #[arg(long)]
    no_js: bool,
    /// Request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,
    /// Text extraction method: "plain" (default), "dom_smoothie" or "fast_html2md"
    #[arg(long, default_value = "plain")]
    text_by: TextBy,
    /// Maximum JavaScript files saved per page
    #[arg(long, default_value_t = DEFAULT_MAX_SCRIPTS)]
    max_scripts: usize,
    /// curl executable used for fetching
    #[arg(long, default_value = "curl")]
    curl: String,
}

impl ScrapeArgs {
    fn archive_options(&self) -> ArchiveOptions {
        ArchiveOptions {
            download_js: !self.no_js,
            timeout: Duration::from_secs(self.timeout),
            output_root: self.output.clone(),
            text_by: self.text_by,
            max_scripts: self.max_scripts,
            script_delay: SCRIPT_DELAY,
        }
    }

    fn archiver(&self) -> Archiver<CurlFetcher> {
        Archiver::new(CurlFetcher::new(&self.curl), self.archive_options())
    }
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Model name (e.g. llama3, mistral, codellama)
    #[arg(long, short, default_value = DEFAULT_MODEL)]
    model: String,
    /// Analysis focus area: general, technical, content or seo (repeatable)
    #[arg(long = "focus", default_value = "general")]
    foci: Vec<String>,
    /// Base URL of the inference service
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,
    /// LLM backend of the inference service
    #[arg(long, default_value = DEFAULT_BACKEND)]
    backend: String,
    /// Rate limit: requests per minute (default: no limit)
    #[arg(long, short)]
    rpm: Option<u32>,
    /// Replace the prompt of a focus with the contents of a file
    #[arg(long = "template", value_name = "FOCUS=PATH")]
    templates: Vec<String>,
    /// Characters of site data sent per prompt
    #[arg(long, default_value_t = DEFAULT_CHAR_BUDGET)]
    char_budget: usize,
    /// Inference request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_INFERENCE_TIMEOUT_SECS)]
    inference_timeout: u64,
    /// Output folder for the analysis report
    #[arg(long, default_value = DEFAULT_ANALYSIS_DIR)]
    analysis_dir: PathBuf,
}

fn default_index_file() -> String {
    Path::new(DEFAULT_OUTPUT_DIR)
        .join(SITES_INDEX_FILE)
        .display()
        .to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    Builder::new()
        .filter_level(match cli.verbose {
            0 => LevelFilter::Error,
            1 => LevelFilter::Warn,
            2 => LevelFilter::Info,
            3 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        })
        .init();

    match cli.command {
        Command::Models { endpoint } => handle_models_command(&endpoint).await,
        Command::Scrape { urls, scrape } => {
            let index = handle_scrape_command(&urls, &scrape).await?;
            info!("Scraping complete! Data saved to: {}", index.display());
            Ok(())
        }
        Command::Crawl {
            urls,
            depth,
            max_pages,
            scrape,
        } => handle_crawl_command(&urls, depth, max_pages, &scrape).await,
        Command::Analyze { file, analyze } => {
            let settings = analyze_settings(&analyze)?;
            handle_analyze_command(Path::new(&file), &analyze, &settings).await
        }
        Command::Run {
            urls,
            scrape,
            analyze,
        } => {
            let settings = analyze_settings(&analyze)?;
            info!("Starting scrape and analysis pipeline...");
            let index = handle_scrape_command(&urls, &scrape).await?;
            handle_analyze_command(&index, &analyze, &settings).await
        }
    }
}

async fn handle_models_command(endpoint: &str) -> Result<()> {
    let endpoint = Url::parse(endpoint).map_err(|e| anyhow::anyhow!("Invalid endpoint: {}", e))?;
    let models = list_models(&endpoint).await?;

    if models.is_empty() {
        println!("No models found. Install models with: ollama pull <model-name>");
        return Ok(());
    }

    println!("Available models:");
    for model in models {
        println!("   • {} ({:.1} GB)", model.name, model.size_gb());
    }
    Ok(())
}

async fn handle_scrape_command(urls: &[String], args: &ScrapeArgs) -> Result<PathBuf> {
    prepare_output_root(&args.output)?;
    info!("Scraping {} URL(s)...", urls.len());

    let (_, index) = scrape(&args.archiver(), urls).await?;
    Ok(index)
}

async fn handle_crawl_command(
    urls: &[String],
    depth: usize,
    max_pages: usize,
    args: &ScrapeArgs,
) -> Result<()> {
    prepare_output_root(&args.output)?;

    let crawler = Crawler::new(args.archiver(), depth)
        .with_max_pages((max_pages > 0).then_some(max_pages));

    let records = crawler.crawl_all(urls).await?;
    let index = write_index(&args.output, &records)?;
    info!("Crawl data saved to: {}", index.display());
    Ok(())
}

async fn handle_analyze_command(
    index: &Path,
    args: &AnalyzeArgs,
    settings: &AnalyzeSettings,
) -> Result<()> {
    let llm_builder = LLMBuilder::new()
        .backend(
            LLMBackend::from_str(&args.backend)
                .map_err(|e| anyhow::anyhow!("Invalid LLM backend: {}", e))?,
        )
        .model(&args.model)
        .base_url(&args.endpoint)
        .timeout_seconds(args.inference_timeout);

    let llm_builder = match std::env::var(MODEL_API_KEY_ENV_NAME) {
        Ok(model_key) => {
            info!("API key is provided through {MODEL_API_KEY_ENV_NAME}");
            llm_builder.api_key(model_key)
        }
        Err(_) => llm_builder,
    };

    let paths = analyze_index(index, llm_builder, settings).await?;
    info!(
        "Analysis complete! Report saved to: {}",
        paths.markdown.display()
    );
    Ok(())
}

/// Validates focus names, loads template overrides and checks the report folder before
/// any work starts.
fn analyze_settings(args: &AnalyzeArgs) -> Result<AnalyzeSettings> {
    Focus::parse_all(&args.foci)?;
    prepare_output_root(&args.analysis_dir)?;

    let mut templates = PromptTemplates::default();
    for entry in &args.templates {
        let (focus, path) = entry
            .split_once('=')
            .context(format!("Invalid template override `{entry}`, expected FOCUS=PATH"))?;
        let content = fs::read_to_string(path)
            .context(format!("Failed to read template file: {path}"))?;
        templates = templates.with_template(focus.parse::<Focus>()?, content);
    }

    Ok(AnalyzeSettings {
        model_name: args.model.clone(),
        foci: args.foci.clone(),
        templates,
        char_budget: args.char_budget,
        rpm: args.rpm,
        output_dir: args.analysis_dir.clone(),
    })
}
