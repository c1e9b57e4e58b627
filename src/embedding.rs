use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::{debug, warn};

use crate::config::{EmbeddingProvider, SearchConfig};
use crate::error::{FileSearchError, Result};

/// One upstream embedding call: `embed(texts)[i]` is the vector for `texts[i]`.
#[async_trait(?Send)]
pub trait EmbeddingClient {
    fn model(&self) -> &str;

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

pub fn create_client(config: &SearchConfig) -> Result<Box<dyn EmbeddingClient>> {
    match config.provider {
        EmbeddingProvider::Fastembed => Ok(Box::new(FastEmbedClient::new(&config.embedding_model)?)),
        EmbeddingProvider::Openai => {
            let api_key = config.openai_api_key.clone().ok_or_else(|| {
                FileSearchError::configuration("OPENAI_API_KEY is required for the openai provider")
            })?;
            Ok(Box::new(OpenAiEmbeddingClient::new(
                &config.openai_base_url,
                api_key,
                &config.embedding_model,
            )))
        }
    }
}

pub struct FastEmbedClient {
    model: TextEmbedding,
    model_name: String,
}

impl FastEmbedClient {
    pub fn new(model_name: &str) -> Result<Self> {
        let model = TextEmbedding::try_new(
            InitOptions::new(resolve_fastembed_model(model_name)?).with_show_download_progress(true),
        )
        .map_err(|e| FileSearchError::embedding(e.to_string()))?;

        Ok(Self {
            model,
            model_name: model_name.to_string(),
        })
    }
}

/// Accepts either the enum name (`AllMiniLML6V2`) or the model code.
fn resolve_fastembed_model(name: &str) -> Result<EmbeddingModel> {
    TextEmbedding::list_supported_models()
        .into_iter()
        .find(|info| {
            info.model_code.eq_ignore_ascii_case(name)
                || format!("{:?}", info.model).eq_ignore_ascii_case(name)
        })
        .map(|info| info.model)
        .ok_or_else(|| FileSearchError::configuration(format!("unknown fastembed model '{}'", name)))
}

#[async_trait(?Send)]
impl EmbeddingClient for FastEmbedClient {
    fn model(&self) -> &str {
        &self.model_name
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.model
            .embed(texts.to_vec(), Some(texts.len().max(1)))
            .map_err(|e| FileSearchError::embedding(e.to_string()))
    }
}

pub struct OpenAiEmbeddingClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model_name: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbeddingClient {
    pub fn new(base_url: &str, api_key: String, model_name: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            api_key,
            model_name: model_name.to_string(),
        }
    }
}

#[async_trait(?Send)]
impl EmbeddingClient for OpenAiEmbeddingClient {
    fn model(&self) -> &str {
        &self.model_name
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.model_name,
            input: texts,
        };
        let mut response: EmbeddingResponse = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // items carry their input position; don't trust response order
        response.data.sort_by_key(|item| item.index);
        Ok(response.data.into_iter().map(|item| item.embedding).collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedText {
    /// Position of the source text in the input slice.
    pub index: usize,
    pub vector: Vec<f32>,
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub embedded: Vec<EmbeddedText>,
    pub failed: Vec<Range<usize>>,
}

impl BatchOutcome {
    pub fn failed_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.failed.iter().flat_map(|range| range.clone())
    }
}

/// Embeds `texts` in sequential chunks of `batch_size`.
///
/// A failing chunk is logged and skipped, so `embedded` may be a strict subset
/// of the input. Vectors are paired with their text through the chunk offset
/// plus their position inside the chunk.
pub async fn embed_batches(
    client: &dyn EmbeddingClient,
    texts: &[String],
    batch_size: usize,
) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();
    if texts.is_empty() {
        return outcome;
    }

    let batch_size = batch_size.max(1);
    let batch_count = texts.len().div_ceil(batch_size);
    let progress = ProgressBar::new(batch_count as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("  {spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} batches {msg}")
    {
        progress.set_style(style.progress_chars("=>-"));
    }

    for (batch_number, chunk) in texts.chunks(batch_size).enumerate() {
        let offset = batch_number * batch_size;
        let range = offset..offset + chunk.len();

        match client.embed(chunk).await {
            Ok(vectors) if vectors.len() == chunk.len() => {
                debug!("Embedded batch {} ({} texts)", batch_number + 1, chunk.len());
                outcome.embedded.extend(
                    vectors
                        .into_iter()
                        .enumerate()
                        .map(|(position, vector)| EmbeddedText {
                            index: offset + position,
                            vector,
                        }),
                );
            }
            Ok(vectors) => {
                warn!(
                    "Batch {} returned {} embeddings for {} texts, skipping it",
                    batch_number + 1,
                    vectors.len(),
                    chunk.len()
                );
                outcome.failed.push(range);
            }
            Err(e) => {
                warn!("Batch {} failed, skipping it: {}", batch_number + 1, e);
                outcome.failed.push(range);
            }
        }
        progress.inc(1);
    }

    progress.finish_with_message(format!("{} embedded", outcome.embedded.len()));
    outcome
}
