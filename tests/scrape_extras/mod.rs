#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use sitescribe::{ArchiveOptions, Fetched, Fetcher, TextBy};

pub(crate) const SEED_URL: &str = "https://example.com/";

pub(crate) const SEED_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Test Page</title>
    <meta name="description" content="A test page">
    <meta name="keywords" content="test, sample, page">
    <meta property="og:title" content="Test Page OG">
    <script src="/js/app.js"></script>
    <script src="https://cdn.example.org/lib.min.js"></script>
</head>
<body>
    <header><nav><a href="/#top">Home</a></nav></header>
    <main>
        <h1>Welcome</h1>
        <p>This is a test page with some content.</p>
        <a href="https://example.com/about">About us</a>
        <a href="https://external.com/">External Link</a>
    </main>
    <footer>Footer content</footer>
</body>
</html>"#;

pub(crate) const ABOUT_HTML: &str = r#"<html><head><title>About</title></head>
<body><p>About this company.</p><a href="/">Back home</a></body></html>"#;

/// Fetcher answering from a fixed URL to body table and remembering every request.
#[derive(Default)]
pub(crate) struct StubFetcher {
    pages: HashMap<String, String>,
    calls: RefCell<Vec<String>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), body.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn was_fetched(&self, url: &str) -> bool {
        self.calls.borrow().iter().any(|call| call == url)
    }
}

impl Fetcher for StubFetcher {
    async fn fetch(&self, url: &str, _timeout: Duration) -> Fetched {
        self.calls.borrow_mut().push(url.to_string());
        match self.pages.get(url) {
            Some(body) => Fetched::success(body.clone()),
            None => Fetched::failed(),
        }
    }
}

/// Options writing into `root` without any pacing delay.
pub(crate) fn options(root: &Path, download_js: bool) -> ArchiveOptions {
    ArchiveOptions {
        download_js,
        timeout: Duration::from_secs(5),
        output_root: root.to_path_buf(),
        text_by: TextBy::Plain,
        max_scripts: 10,
        script_delay: Duration::ZERO,
    }
}

/// A site whose pages link in a chain: `/` -> `/a` -> `/b` -> `/c`.
pub(crate) fn chain_fetcher() -> StubFetcher {
    StubFetcher::new()
        .with_page("https://chain.test/", r#"<a href="/a">a</a>"#)
        .with_page("https://chain.test/a", r#"<a href="/b">b</a>"#)
        .with_page("https://chain.test/b", r#"<a href="/c">c</a>"#)
        .with_page("https://chain.test/c", r#"<p>end</p>"#)
}
