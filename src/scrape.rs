//! The scrape module archives pages to disk: raw HTML, extracted text, linked scripts
//! and a manifest per page, plus a sites index per invocation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use log::{error, info, warn};
use url::Url;

use crate::TextBy;
use crate::constants::{
    DEFAULT_MAX_SCRIPTS, DEFAULT_OUTPUT_DIR, DEFAULT_TIMEOUT_SECS, HTML_FILE, SCRIPT_DELAY,
    SCRIPTS_DIR, SITE_DELAY, TEXT_FILE,
};
use crate::error::Result;
use crate::fetch::Fetcher;
use crate::parse::{Extracted, Extractor};
use crate::storage::{
    SiteRecord, domain_of, reset_dir, script_file_name, site_dir_name, write_file, write_index,
    write_manifest,
};

/// Settings shared by every page archived in one invocation.
#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    pub download_js: bool,
    pub timeout: Duration,
    pub output_root: PathBuf,
    pub text_by: TextBy,
    /// Upper bound on scripts saved per page.
    pub max_scripts: usize,
    /// Pause between two script fetches of the same page.
    pub script_delay: Duration,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            download_js: true,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            output_root: PathBuf::from(DEFAULT_OUTPUT_DIR),
            text_by: TextBy::default(),
            max_scripts: DEFAULT_MAX_SCRIPTS,
            script_delay: SCRIPT_DELAY,
        }
    }
}

/// A freshly archived page together with the links found on it.
#[derive(Debug, Clone)]
pub struct ArchivedPage {
    pub record: SiteRecord,
    pub links: Vec<String>,
}

/// Fetches, extracts and stores single pages.
pub struct Archiver<F> {
    fetcher: F,
    extractor: Extractor,
    options: ArchiveOptions,
}

impl<F: Fetcher> Archiver<F> {
    pub fn new(fetcher: F, options: ArchiveOptions) -> Self {
        Self {
            fetcher,
            extractor: Extractor::new(options.text_by),
            options,
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn options(&self) -> &ArchiveOptions {
        &self.options
    }

    /// Archives one page and returns its record. Never fails: fetch and write problems
    /// end up in a record with `success == false`.
    pub async fn archive(&self, url: &str) -> SiteRecord {
        self.archive_page(url, 0).await.record
    }

    /// Archives one page discovered at `depth`, keeping the links found on it.
    pub async fn archive_page(&self, url: &str, depth: usize) -> ArchivedPage {
        let mut page_url = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(parse_error) => {
                error!("Error parsing URL {url}: {parse_error}");
                return ArchivedPage {
                    record: SiteRecord::failed(
                        url,
                        self.options.output_root.clone(),
                        depth,
                        format!("invalid url: {parse_error}"),
                    ),
                    links: Vec::new(),
                };
            }
        };

        page_url.set_fragment(None);
        let url = page_url.to_string();
        let directory = self.options.output_root.join(site_dir_name(&page_url));

        info!("Scraping {url}");
        let fetched = self.fetcher.fetch(&url, self.options.timeout).await;
        if !fetched.ok {
            warn!("Failed to fetch {url}");
            return ArchivedPage {
                record: SiteRecord::failed(&url, directory, depth, "fetch failed"),
                links: Vec::new(),
            };
        }

        let extracted = self.extractor.extract(&fetched.body, &page_url);
        let links = extracted.links.clone();

        match self
            .persist(&url, &directory, depth, &fetched.body, extracted)
            .await
        {
            Ok(record) => {
                info!(
                    "Scraped {} ({} scripts saved, {} missing)",
                    record.domain,
                    record.script_files.len(),
                    record.missing_scripts.len()
                );
                ArchivedPage { record, links }
            }
            Err(write_error) => {
                error!("Unable to store {url}: {write_error}");
                ArchivedPage {
                    record: SiteRecord::failed(&url, directory, depth, write_error.to_string()),
                    links,
                }
            }
        }
    }

    async fn persist(
        &self,
        url: &str,
        directory: &Path,
        depth: usize,
        html: &str,
        extracted: Extracted,
    ) -> Result<SiteRecord> {
        reset_dir(directory)?;

        let html_file = directory.join(HTML_FILE);
        write_file(&html_file, html)?;
        let text_file = directory.join(TEXT_FILE);
        write_file(&text_file, &extracted.text)?;

        let (script_files, missing_scripts) = if self.options.download_js {
            self.download_scripts(&extracted.script_urls, &directory.join(SCRIPTS_DIR))
                .await?
        } else {
            (Vec::new(), Vec::new())
        };

        let record = SiteRecord {
            domain: domain_of(url),
            url: url.to_string(),
            depth,
            directory: directory.to_path_buf(),
            html_file: Some(html_file),
            text_file: Some(text_file),
            metadata: extracted.metadata,
            script_files,
            missing_scripts,
            fetched_at: Utc::now(),
            success: true,
            error: None,
        };
        write_manifest(&record)?;

        Ok(record)
    }

    /// Fetches scripts one after another with politeness pacing in between. A script
    /// that cannot be fetched is reported as missing, a failed write aborts the page.
    async fn download_scripts(
        &self,
        script_urls: &[String],
        scripts_dir: &Path,
    ) -> Result<(Vec<PathBuf>, Vec<String>)> {
        let mut saved = Vec::new();
        let mut missing = Vec::new();

        if script_urls.len() > self.options.max_scripts {
            info!(
                "Found {} scripts, keeping the first {}",
                script_urls.len(),
                self.options.max_scripts
            );
        }

        for (index, script_url) in script_urls
            .iter()
            .take(self.options.max_scripts)
            .enumerate()
        {
            if index > 0 {
                tokio::time::sleep(self.options.script_delay).await;
            }

            let fetched = self.fetcher.fetch(script_url, self.options.timeout).await;
            if !fetched.ok {
                warn!("Failed to download {script_url}");
                missing.push(script_url.clone());
                continue;
            }

            let path = scripts_dir.join(script_file_name(index, script_url));
            write_file(&path, &fetched.body)?;
            saved.push(path);
        }

        Ok((saved, missing))
    }
}

/// Archives every URL in order with [`SITE_DELAY`] between sites and writes the sites
/// index. One record is returned per URL, failed ones included.
///
/// # Errors
///
/// Returns an error if the sites index cannot be written
pub async fn scrape<F: Fetcher>(
    archiver: &Archiver<F>,
    urls: &[String],
) -> Result<(Vec<SiteRecord>, PathBuf)> {
    scrape_with_delay(archiver, urls, SITE_DELAY).await
}

/// [`scrape`] with an explicit pause between sites.
///
/// # Errors
///
/// Returns an error if the sites index cannot be written
pub async fn scrape_with_delay<F: Fetcher>(
    archiver: &Archiver<F>,
    urls: &[String],
    site_delay: Duration,
) -> Result<(Vec<SiteRecord>, PathBuf)> {
    let mut records = Vec::with_capacity(urls.len());

    for (position, url) in urls.iter().enumerate() {
        if position > 0 {
            tokio::time::sleep(site_delay).await;
        }
        info!("[{}/{}] {url}", position + 1, urls.len());
        records.push(archiver.archive(url).await);
    }

    let index = write_index(&archiver.options().output_root, &records)?;
    let succeeded = records.iter().filter(|record| record.success).count();
    info!("Successfully scraped {succeeded}/{} sites", urls.len());

    Ok((records, index))
}
