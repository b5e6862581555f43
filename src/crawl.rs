//! The crawl module follows in-domain links from a seed page up to a depth limit,
//! archiving every page it visits.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use log::{debug, info, warn};
use url::Url;

use crate::constants::SITE_DELAY;
use crate::error::{Error, Result};
use crate::fetch::Fetcher;
use crate::parse::normalize_url;
use crate::scrape::Archiver;
use crate::storage::SiteRecord;

/// Lifecycle of a URL within one crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    Queued,
    Visiting,
    Visited,
    Failed,
}

/// Pending and seen URLs of one crawl. URLs are queued as discovered and tracked by
/// their normalized form, so a page is visited at most once however it is linked.
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<(String, usize)>,
    states: HashMap<String, PageState>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `url` at `depth` unless it was seen before in any state.
    pub fn enqueue(&mut self, url: String, depth: usize) -> bool {
        let key = frontier_key(&url);
        if self.states.contains_key(&key) {
            return false;
        }
        self.states.insert(key, PageState::Queued);
        self.queue.push_back((url, depth));
        true
    }

    /// Takes the oldest queued URL and marks it as being visited.
    pub fn pop(&mut self) -> Option<(String, usize)> {
        let (url, depth) = self.queue.pop_front()?;
        self.states.insert(frontier_key(&url), PageState::Visiting);
        Some((url, depth))
    }

    pub fn mark_visited(&mut self, url: &str) {
        self.set_state(url, PageState::Visited);
    }

    pub fn mark_failed(&mut self, url: &str) {
        self.set_state(url, PageState::Failed);
    }

    fn set_state(&mut self, url: &str, state: PageState) {
        if let Some(current) = self.states.get_mut(&frontier_key(url)) {
            *current = state;
        }
    }

    pub fn state(&self, url: &str) -> Option<PageState> {
        self.states.get(&frontier_key(url)).copied()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// URLs that finished, successfully or not.
    pub fn finished(&self) -> usize {
        self.states
            .values()
            .filter(|state| matches!(state, PageState::Visited | PageState::Failed))
            .count()
    }
}

fn frontier_key(url: &str) -> String {
    Url::parse(url).map_or_else(|_| url.to_string(), |parsed| normalize_url(&parsed))
}

/// Breadth-first crawler restricted to the seed's host.
pub struct Crawler<F> {
    archiver: Archiver<F>,
    max_depth: usize,
    max_pages: Option<usize>,
    site_delay: Duration,
}

impl<F: Fetcher> Crawler<F> {
    pub fn new(archiver: Archiver<F>, max_depth: usize) -> Self {
        Self {
            archiver,
            max_depth,
            max_pages: None,
            site_delay: SITE_DELAY,
        }
    }

    pub fn with_max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_site_delay(mut self, site_delay: Duration) -> Self {
        self.site_delay = site_delay;
        self
    }

    pub fn archiver(&self) -> &Archiver<F> {
        &self.archiver
    }

    /// Crawls every seed in turn and returns all records in visiting order. Seeds are
    /// validated before the first page is fetched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] for the first seed that cannot be parsed
    pub async fn crawl_all(&self, seeds: &[String]) -> Result<Vec<SiteRecord>> {
        for seed in seeds {
            parse_seed(seed)?;
        }

        let mut records = Vec::new();
        for (position, seed) in seeds.iter().enumerate() {
            if position > 0 {
                tokio::time::sleep(self.site_delay).await;
            }
            records.extend(self.crawl(seed).await?);
        }
        Ok(records)
    }

    /// Crawls from `seed` and returns one record per visited page in visiting order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if the seed cannot be parsed
    pub async fn crawl(&self, seed: &str) -> Result<Vec<SiteRecord>> {
        let mut seed_url = parse_seed(seed)?;
        seed_url.set_fragment(None);
        let seed_host = seed_url.host_str().map(str::to_string);

        info!(
            "Starting crawl on {seed} (max depth {}, max pages {})",
            self.max_depth,
            self.max_pages
                .map_or_else(|| "unlimited".to_string(), |pages| pages.to_string())
        );

        let mut frontier = Frontier::new();
        frontier.enqueue(seed_url.to_string(), 0);
        let mut records = Vec::new();

        while let Some((url, depth)) = frontier.pop() {
            if !records.is_empty() {
                tokio::time::sleep(self.site_delay).await;
            }

            let page = self.archiver.archive_page(&url, depth).await;
            if page.record.success {
                frontier.mark_visited(&url);
                if depth < self.max_depth {
                    enqueue_links(&mut frontier, page.links, depth + 1, seed_host.as_deref());
                }
            } else {
                warn!("Giving up on {url}");
                frontier.mark_failed(&url);
            }
            records.push(page.record);

            debug!(
                "Crawled {} pages, {} queued",
                frontier.finished(),
                frontier.queued()
            );

            if self.max_pages.is_some_and(|max_pages| records.len() >= max_pages) {
                info!("Reached the page limit with {} URLs left", frontier.queued());
                break;
            }
        }

        let visited = records.iter().filter(|record| record.success).count();
        info!("Crawl complete! Scraped {visited} of {} pages", records.len());
        Ok(records)
    }
}

fn parse_seed(seed: &str) -> Result<Url> {
    Url::parse(seed).map_err(|source| Error::InvalidUrl {
        url: seed.to_string(),
        source,
    })
}

/// Queues the links that stay on the seed's host.
fn enqueue_links(frontier: &mut Frontier, links: Vec<String>, depth: usize, seed_host: Option<&str>) {
    for link in links {
        let in_domain = Url::parse(&link).is_ok_and(|url| url.host_str() == seed_host);
        if in_domain && frontier.enqueue(link.clone(), depth) {
            debug!("Queued {link} at depth {depth}");
        }
    }
}
