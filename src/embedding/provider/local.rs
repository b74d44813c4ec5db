// Copyright 2025 Muvon Un Limited
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Reference client for a self-hosted embedding server. Speaks the same
//! `{"input": [...], "model": "..."}` -> `{"data": [{"embedding": [...]}]}`
//! shape as the cloud providers below, but with no auth header, so
//! operators can point at any local inference process without this crate
//! vendoring one.

use anyhow::{Context, Result};
use serde_json::{json, Value};

use super::super::types::InputType;
use super::{EmbeddingProvider, HTTP_CLIENT};

const DEFAULT_DIMENSION: usize = 768;

/// Local provider implementation for trait
pub struct LocalProviderImpl {
	model_name: String,
	base_url: String,
	dimension: usize,
}

impl LocalProviderImpl {
	pub fn new(model: &str, base_url: &str) -> Result<Self> {
		if model.trim().is_empty() {
			return Err(anyhow::anyhow!("local provider model name must not be empty"));
		}
		Ok(Self {
			model_name: model.to_string(),
			base_url: base_url.trim_end_matches('/').to_string(),
			dimension: DEFAULT_DIMENSION,
		})
	}

	/// Override the dimension once the server's actual output width is known
	/// (e.g. read from a `/v1/models` probe); defaults to [`DEFAULT_DIMENSION`].
	pub fn with_dimension(mut self, dimension: usize) -> Self {
		self.dimension = dimension;
		self
	}
}

#[async_trait::async_trait]
impl EmbeddingProvider for LocalProviderImpl {
	async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
		LocalProvider::generate_embeddings(text, &self.base_url, &self.model_name).await
	}

	async fn generate_embeddings_batch(
		&self,
		texts: Vec<String>,
		input_type: InputType,
	) -> Result<Vec<Vec<f32>>> {
		let processed_texts: Vec<String> = texts
			.into_iter()
			.map(|text| input_type.apply_prefix(&text))
			.collect();
		LocalProvider::generate_embeddings_batch(processed_texts, &self.base_url, &self.model_name)
			.await
	}

	fn get_dimension(&self) -> usize {
		self.dimension
	}
}

/// Local provider implementation
pub struct LocalProvider;

impl LocalProvider {
	pub async fn generate_embeddings(contents: &str, base_url: &str, model: &str) -> Result<Vec<f32>> {
		let result =
			Self::generate_embeddings_batch(vec![contents.to_string()], base_url, model).await?;
		result
			.first()
			.cloned()
			.ok_or_else(|| anyhow::anyhow!("No embeddings found"))
	}

	pub async fn generate_embeddings_batch(
		texts: Vec<String>,
		base_url: &str,
		model: &str,
	) -> Result<Vec<Vec<f32>>> {
		let response = HTTP_CLIENT
			.post(format!("{base_url}/v1/embeddings"))
			.json(&json!({
				"input": texts,
				"model": model,
			}))
			.send()
			.await
			.context("local embedding server request failed")?;

		if !response.status().is_success() {
			let error_text = response.text().await?;
			return Err(anyhow::anyhow!("local embedding server error: {}", error_text));
		}

		let response_json: Value = response.json().await?;

		let embeddings = response_json["data"]
			.as_array()
			.context("Failed to get embeddings array")?
			.iter()
			.map(|data| {
				data["embedding"]
					.as_array()
					.unwrap_or(&Vec::new())
					.iter()
					.map(|v| v.as_f64().unwrap_or_default() as f32)
					.collect()
			})
			.collect();

		Ok(embeddings)
	}
}
