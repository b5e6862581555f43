//! The models module asks the inference service which models it can serve.

use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;
use url::Url;

use crate::constants::MODELS_TIMEOUT;

const BYTES_PER_GB: f64 = 1_073_741_824.0;

/// A model installed on the inference service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    /// Size on disk in bytes
    #[serde(default)]
    pub size: u64,
}

impl ModelInfo {
    pub fn size_gb(&self) -> f64 {
        self.size as f64 / BYTES_PER_GB
    }
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

/// Lists the models served at `endpoint` (Ollama's `/api/tags`).
///
/// # Errors
///
/// Returns an error if:
/// * The endpoint is unreachable or answers with a non-success status
/// * The response is not the expected JSON
pub async fn list_models(endpoint: &Url) -> Result<Vec<ModelInfo>> {
    let tags_url = endpoint
        .join("api/tags")
        .context("Unable to build the model listing URL")?;
    debug!("Listing models from {tags_url}");

    let client = reqwest::Client::builder().timeout(MODELS_TIMEOUT).build()?;
    let response = client
        .get(tags_url.clone())
        .send()
        .await
        .with_context(|| {
            format!("Error connecting to {endpoint}. Make sure the inference service is running")
        })?
        .error_for_status()
        .with_context(|| format!("Could not list models at {tags_url}"))?;

    let tags: TagsResponse = response
        .json()
        .await
        .context("Unexpected model listing response")?;

    Ok(tags.models)
}
