//! The parse module extracts visible text, metadata, script sources and in-domain links
//! from fetched HTML.
//!
//! Extraction goes through the [`DocumentParser`] / [`Document`] pair so that the rest of
//! the crate never touches a concrete DOM. [`HtmlParser`] is the `scraper` backed
//! implementation. Malformed markup never aborts extraction: the parser recovers and
//! whatever could be read is returned.

use std::collections::{BTreeMap, HashSet};

use dom_smoothie::{Article, CandidateSelectMode, Config, Readability, TextMode};
use log::{debug, warn};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Node, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::TextBy;
use crate::constants::MAX_TEXT_CHARS;

static SCRIPT_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("script[src]").expect("Failed to compile script selector"));
static ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("Failed to compile anchor selector"));
static META_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("meta").expect("Failed to compile meta selector"));
static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("title").expect("Failed to compile title selector"));
static BASE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("base[href]").expect("Failed to compile base selector"));
static HEADING_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h1, h2").expect("Failed to compile heading selector"));

/// Elements whose text never counts as page content.
const SKIPPED_TEXT_ELEMENTS: [&str; 6] = ["script", "style", "noscript", "nav", "footer", "header"];

/// Descriptive metadata found in the document head.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub author: Option<String>,
    pub og_tags: BTreeMap<String, String>,
}

/// A parsed HTML document.
pub trait Document {
    /// Raw `src` attribute values of script elements, in document order.
    fn script_sources(&self) -> Vec<String>;
    /// Raw `href` attribute values of anchors, in document order.
    fn link_targets(&self) -> Vec<String>;
    /// Text outside of scripts, styles and page chrome, one fragment per line.
    fn visible_text(&self) -> String;
    fn metadata(&self) -> PageMetadata;
    /// `href` of the first `<base>` element, if any.
    fn base_href(&self) -> Option<String>;
}

/// Builds a [`Document`] from markup.
pub trait DocumentParser {
    type Document: Document;

    fn parse_document(&self, html: &str) -> Self::Document;
}

/// [`DocumentParser`] implemented on top of `scraper` (html5ever).
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlParser;

impl DocumentParser for HtmlParser {
    type Document = HtmlDocument;

    fn parse_document(&self, html: &str) -> HtmlDocument {
        let html = Html::parse_document(html);
        if !html.errors.is_empty() {
            debug!("Recovered from {} markup errors", html.errors.len());
        }
        HtmlDocument { html }
    }
}

pub struct HtmlDocument {
    html: Html,
}

impl HtmlDocument {
    fn attribute_values(&self, selector: &Selector, attribute: &str) -> Vec<String> {
        self.html
            .select(selector)
            .filter_map(|element| element.value().attr(attribute))
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn first_text(&self, selector: &Selector) -> Option<String> {
        self.html
            .select(selector)
            .map(element_text)
            .find(|text| !text.is_empty())
    }
}

impl Document for HtmlDocument {
    fn script_sources(&self) -> Vec<String> {
        self.attribute_values(&SCRIPT_SELECTOR, "src")
    }

    fn link_targets(&self) -> Vec<String> {
        self.attribute_values(&ANCHOR_SELECTOR, "href")
    }

    fn visible_text(&self) -> String {
        let mut fragments = Vec::new();
        for node in self.html.tree.root().descendants() {
            let Node::Text(text) = node.value() else {
                continue;
            };
            let hidden = node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|element| SKIPPED_TEXT_ELEMENTS.contains(&element.name()))
            });
            if !hidden {
                fragments.push(String::from(&**text));
            }
        }
        fragments.join("\n")
    }

    fn base_href(&self) -> Option<String> {
        self.attribute_values(&BASE_SELECTOR, "href").into_iter().next()
    }

    fn metadata(&self) -> PageMetadata {
        let mut metadata = PageMetadata {
            title: self
                .first_text(&TITLE_SELECTOR)
                .or_else(|| self.first_text(&HEADING_SELECTOR)),
            ..PageMetadata::default()
        };

        for meta in self.html.select(&META_SELECTOR) {
            let element = meta.value();
            let content = element.attr("content").unwrap_or_default().trim();
            let name = element.attr("name").unwrap_or_default().to_lowercase();
            let property = element.attr("property").unwrap_or_default().to_lowercase();

            match name.as_str() {
                "description" => metadata.description = Some(content.to_string()),
                "keywords" => {
                    metadata.keywords = content
                        .split(',')
                        .map(str::trim)
                        .filter(|keyword| !keyword.is_empty())
                        .map(str::to_string)
                        .collect();
                }
                "author" => metadata.author = Some(content.to_string()),
                _ if property.starts_with("og:") => {
                    metadata.og_tags.insert(property, content.to_string());
                }
                _ => {}
            }
        }

        metadata
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

/// Everything the archiver needs from one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    pub text: String,
    pub metadata: PageMetadata,
    /// Absolute script URLs in document order, without duplicates.
    pub script_urls: Vec<String>,
    /// Normalized same-host page links in document order, without duplicates.
    pub links: Vec<String>,
}

/// Turns raw HTML into [`Extracted`] content using a [`DocumentParser`].
#[derive(Debug, Clone, Default)]
pub struct Extractor<P = HtmlParser> {
    parser: P,
    text_by: TextBy,
}

impl Extractor<HtmlParser> {
    pub fn new(text_by: TextBy) -> Self {
        Self::with_parser(HtmlParser, text_by)
    }
}

impl<P: DocumentParser> Extractor<P> {
    pub fn with_parser(parser: P, text_by: TextBy) -> Self {
        Self { parser, text_by }
    }

    /// Extracts content from `html` fetched from `page_url`. Relative references are
    /// resolved against the document's `<base href>`, or `page_url` without one, and
    /// only links on the page's host are kept.
    pub fn extract(&self, html: &str, page_url: &Url) -> Extracted {
        let document = self.parser.parse_document(html);

        let text = match self.text_by {
            TextBy::Plain => document.visible_text(),
            TextBy::DomSmoothie => readable_text(html).unwrap_or_else(|| document.visible_text()),
            TextBy::FastHtml2Md => html2md::parse_html(html, false),
        };

        let base = document
            .base_href()
            .and_then(|href| page_url.join(&href).ok())
            .unwrap_or_else(|| page_url.clone());

        Extracted {
            text: clean_text(&text),
            metadata: document.metadata(),
            script_urls: resolve_scripts(document.script_sources(), &base),
            links: resolve_links(document.link_targets(), &base, page_url),
        }
    }
}

/// Runs readability over the page, `None` when no article could be found.
fn readable_text(html: &str) -> Option<String> {
    let config = Config {
        text_mode: TextMode::Markdown,
        candidate_select_mode: CandidateSelectMode::DomSmoothie,
        ..Default::default()
    };

    let article: Result<Article, _> =
        Readability::new(html, None, Some(config)).and_then(|mut readability| readability.parse());

    match article {
        Ok(article) => Some(article.text_content.to_string()),
        Err(error) => {
            warn!("Readability failed, falling back to plain text: {error}");
            None
        }
    }
}

/// One trimmed phrase per line, blank lines dropped, capped at [`MAX_TEXT_CHARS`].
fn clean_text(raw: &str) -> String {
    raw.lines()
        .flat_map(|line| line.split("  "))
        .map(str::trim)
        .filter(|phrase| !phrase.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        .chars()
        .take(MAX_TEXT_CHARS)
        .collect()
}

fn resolve_scripts(sources: Vec<String>, base: &Url) -> Vec<String> {
    let mut seen = HashSet::new();
    sources
        .into_iter()
        .filter_map(|source| base.join(&source).ok())
        .filter(is_http)
        .map(String::from)
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// Same-host links as they should be fetched (fragment removed), deduplicated on their
/// normalized form.
fn resolve_links(targets: Vec<String>, base: &Url, page_url: &Url) -> Vec<String> {
    let mut seen = HashSet::from([normalize_url(page_url)]);
    targets
        .into_iter()
        .filter_map(|target| base.join(&target).ok())
        .filter(|url| is_http(url) && url.host_str() == page_url.host_str())
        .filter(|url| seen.insert(normalize_url(url)))
        .map(|mut url| {
            url.set_fragment(None);
            url.to_string()
        })
        .collect()
}

fn is_http(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

/// Canonical form used for visited-set comparison: no fragment and no trailing slash
/// on non-root paths.
pub fn normalize_url(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }
    url.to_string()
}
