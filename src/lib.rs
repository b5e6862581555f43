//! The sitescribe library archives websites through an external HTTP client and
//! analyzes the archived text with a locally served LLM.

pub mod analyze;
pub mod compose;
pub mod constants;
pub mod crawl;
pub mod error;
pub mod fetch;
pub mod models;
pub mod parse;
pub mod prompt;
pub mod scrape;
pub mod storage;

/// Enum representing the text extraction method.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum TextBy {
    /// Visible text with scripts, styles and page chrome removed
    #[default]
    Plain,
    /// Use dom_smoothie readability for text extraction
    DomSmoothie,
    /// Use fast_html2md for text extraction
    FastHtml2Md,
}

impl std::str::FromStr for TextBy {
    type Err = String;

    fn from_str(input: &str) -> std::result::Result<Self, Self::Err> {
        match input.to_lowercase().as_str() {
            "plain" => Ok(TextBy::Plain),
            "dom_smoothie" => Ok(TextBy::DomSmoothie),
            "fast_html2md" => Ok(TextBy::FastHtml2Md),
            _ => Err(format!("Invalid text extraction method: {}", input)),
        }
    }
}

pub use analyze::{AnalysisOutcome, AnalysisResult, analyze, analyze_index};
pub use compose::compose_report;
pub use crawl::{Crawler, Frontier};
pub use error::{Error, Result};
pub use fetch::{CurlFetcher, Fetched, Fetcher};
pub use parse::{Extracted, Extractor, normalize_url};
pub use prompt::{Focus, PromptTemplates};
pub use scrape::{ArchiveOptions, Archiver, scrape};
pub use storage::SiteRecord;
