//! The storage module owns the on-disk layout: directory names derived from URLs,
//! per-site manifests and the sites index written at the end of a scrape.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use crate::constants::{MANIFEST_FILE, SITES_INDEX_FILE};
use crate::error::{Error, Result};
use crate::parse::{PageMetadata, normalize_url};

const MAX_DIR_STEM_CHARS: usize = 80;
const MAX_SCRIPT_NAME_CHARS: usize = 60;
const HASH_SUFFIX_CHARS: usize = 8;
const WRITE_PROBE_FILE: &str = ".sitescribe-write-probe";

/// Metadata describing one archived page. Written once as `manifest.json` and collected
/// into the sites index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRecord {
    pub domain: String,
    pub url: String,
    /// Discovery depth, `0` for seeds.
    #[serde(default)]
    pub depth: usize,
    pub directory: PathBuf,
    #[serde(default)]
    pub html_file: Option<PathBuf>,
    #[serde(default)]
    pub text_file: Option<PathBuf>,
    #[serde(default)]
    pub metadata: PageMetadata,
    #[serde(default)]
    pub script_files: Vec<PathBuf>,
    /// Script URLs that were discovered but could not be fetched.
    #[serde(default)]
    pub missing_scripts: Vec<String>,
    pub fetched_at: DateTime<Utc>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SiteRecord {
    /// Record for a page that could not be archived.
    pub fn failed(url: &str, directory: PathBuf, depth: usize, error: impl Into<String>) -> Self {
        Self {
            domain: domain_of(url),
            url: url.to_string(),
            depth,
            directory,
            html_file: None,
            text_file: None,
            metadata: PageMetadata::default(),
            script_files: Vec::new(),
            missing_scripts: Vec::new(),
            fetched_at: Utc::now(),
            success: false,
            error: Some(error.into()),
        }
    }

    /// Loads the archived text of this page, `None` when nothing was archived.
    ///
    /// # Errors
    ///
    /// Returns an error if the text file is listed but cannot be read
    pub fn read_text(&self) -> Result<Option<String>> {
        let Some(path) = &self.text_file else {
            return Ok(None);
        };

        fs::read_to_string(path)
            .map(Some)
            .map_err(|source| Error::Read {
                path: path.clone(),
                source,
            })
    }
}

/// Host of `url` as written in the records, or the raw input when it has none.
pub fn domain_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

/// Replaces every character outside `[A-Za-z0-9_-]` with `_`.
pub fn safe_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Directory name for a page: the sanitized host and path, followed by a short SHA-256
/// of the normalized URL.
///
/// Sanitizing is lossy (`a.b` and `a_b` look the same afterwards), the hash suffix keeps
/// distinct pages apart while the same page always maps to the same directory. The
/// result never contains a path separator or a `..` component.
pub fn site_dir_name(url: &Url) -> String {
    let mut stem = safe_filename(url.host_str().unwrap_or_default());
    if stem.is_empty() {
        stem.push_str("site");
    }

    let path = url.path().trim_matches('/');
    if !path.is_empty() {
        stem.push('_');
        stem.push_str(&safe_filename(path));
    }

    let stem: String = stem.chars().take(MAX_DIR_STEM_CHARS).collect();
    let digest = format!("{:x}", Sha256::digest(normalize_url(url).as_bytes()));
    let suffix = digest.get(..HASH_SUFFIX_CHARS).unwrap_or(&digest);

    format!("{stem}-{suffix}")
}

/// File name for the `index`-th script of a page, built from the last path segment of
/// its URL. The numeric prefix keeps scripts sharing a name apart.
pub fn script_file_name(index: usize, script_url: &str) -> String {
    let segment = Url::parse(script_url)
        .ok()
        .and_then(|url| {
            url.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .unwrap_or_default();

    let name: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_start_matches('.')
        .chars()
        .take(MAX_SCRIPT_NAME_CHARS)
        .collect();

    if name.is_empty() {
        format!("{index:03}-script.js")
    } else {
        format!("{index:03}-{name}")
    }
}

/// Creates the output root and checks that files can be written into it.
///
/// # Errors
///
/// Returns [`Error::OutputRoot`] if the directory cannot be created or written
pub fn prepare_output_root(root: &Path) -> Result<()> {
    let output_root_error = |source| Error::OutputRoot {
        path: root.to_path_buf(),
        source,
    };

    fs::create_dir_all(root).map_err(output_root_error)?;
    let probe = root.join(WRITE_PROBE_FILE);
    fs::write(&probe, b"").map_err(output_root_error)?;
    fs::remove_file(&probe).map_err(output_root_error)?;

    Ok(())
}

/// Empties `directory` so a fresh archive never mixes with files of an earlier run.
///
/// # Errors
///
/// Returns an error if the directory cannot be removed or created
pub fn reset_dir(directory: &Path) -> Result<()> {
    if directory.exists() {
        debug!("Replacing previous archive in {}", directory.display());
        fs::remove_dir_all(directory).map_err(|source| Error::Write {
            path: directory.to_path_buf(),
            source,
        })?;
    }

    fs::create_dir_all(directory).map_err(|source| Error::Write {
        path: directory.to_path_buf(),
        source,
    })
}

/// Writes `contents` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`Error::Write`] on any filesystem failure
pub fn write_file(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    let write_error = |source| Error::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_error)?;
    }
    fs::write(path, contents).map_err(write_error)
}

/// Serializes `value` as pretty JSON into `path`.
///
/// # Errors
///
/// Returns an error if serialization or the write fails
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    write_file(path, json)
}

/// Writes the manifest of `record` into its directory.
///
/// # Errors
///
/// Returns an error if the manifest cannot be written
pub fn write_manifest(record: &SiteRecord) -> Result<PathBuf> {
    let path = record.directory.join(MANIFEST_FILE);
    write_json(&path, record)?;
    Ok(path)
}

/// Reads the manifest stored in `directory`.
///
/// # Errors
///
/// Returns an error if the manifest is missing or malformed
pub fn read_manifest(directory: &Path) -> Result<SiteRecord> {
    read_json(&directory.join(MANIFEST_FILE))
}

/// Writes the sites index for one invocation, replacing any previous one.
///
/// # Errors
///
/// Returns an error if the index cannot be written
pub fn write_index(root: &Path, records: &[SiteRecord]) -> Result<PathBuf> {
    let path = root.join(SITES_INDEX_FILE);
    write_json(&path, records)?;
    Ok(path)
}

/// Loads a sites index written by [`write_index`].
///
/// # Errors
///
/// Returns an error if the file is missing or malformed
pub fn load_index(path: &Path) -> Result<Vec<SiteRecord>> {
    read_json(path)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let json = fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&json)?)
}
