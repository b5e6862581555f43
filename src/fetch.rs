//! The fetch module retrieves page bodies through an external HTTP client process.
//!
//! Callers only see the [`Fetcher`] trait, so the process-backed implementation can be
//! swapped (for a pooled or in-process client, or a fixture in tests) without touching
//! the archiver or the crawler.

use log::{debug, warn};
use std::future::Future;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use url::Url;

use crate::constants::{FETCH_GRACE, USER_AGENT};

/// Outcome of a single fetch. A failed fetch always carries an empty body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Fetched {
    pub body: String,
    pub ok: bool,
}

impl Fetched {
    pub fn success(body: String) -> Self {
        Self { body, ok: true }
    }

    pub fn failed() -> Self {
        Self::default()
    }
}

/// Retrieves the body of a URL within a time bound. Implementations never fail loudly:
/// every problem collapses into [`Fetched::failed`].
pub trait Fetcher {
    fn fetch(&self, url: &str, timeout: Duration) -> impl Future<Output = Fetched>;
}

/// Fetcher backed by the `curl` command line client.
#[derive(Debug, Clone)]
pub struct CurlFetcher {
    program: String,
}

impl Default for CurlFetcher {
    fn default() -> Self {
        Self::new("curl")
    }
}

impl CurlFetcher {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

}

impl Fetcher for CurlFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Fetched {
        if !is_fetchable(url) {
            warn!("Refusing to fetch {url}: only http(s) URLs are supported");
            return Fetched::failed();
        }

        let max_time = timeout.as_secs().max(1).to_string();
        let mut command = Command::new(&self.program);
        command
            .args(["-sL", "--max-time", &max_time, "-A", USER_AGENT])
            .args(["-w", "\n%{http_code}"])
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(timeout + FETCH_GRACE, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(error)) => {
                warn!("Unable to run {} for {url}: {error}", self.program);
                return Fetched::failed();
            }
            Err(_) => {
                warn!("Fetching {url} timed out after {}s", timeout.as_secs());
                return Fetched::failed();
            }
        };

        if !output.status.success() {
            warn!(
                "{} exited with {} for {url}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Fetched::failed();
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let fetched = interpret_output(&stdout);
        if fetched.ok {
            debug!("Fetched {url} ({} bytes)", fetched.body.len());
        } else {
            warn!("Fetching {url} returned no usable body");
        }
        fetched
    }
}

/// Splits curl's stdout into the body and the trailing status line written by
/// `-w "\n%{http_code}"`, and decides whether the fetch succeeded.
pub fn interpret_output(stdout: &str) -> Fetched {
    let Some((body, status)) = stdout.rsplit_once('\n') else {
        return Fetched::failed();
    };

    match status.trim().parse::<u16>() {
        Ok(status) if (200..300).contains(&status) && !body.is_empty() => {
            Fetched::success(body.to_string())
        }
        Ok(status) => {
            debug!("Rejecting response with status {status}");
            Fetched::failed()
        }
        Err(_) => Fetched::failed(),
    }
}

fn is_fetchable(url: &str) -> bool {
    Url::parse(url).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}
