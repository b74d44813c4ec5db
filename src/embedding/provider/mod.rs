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

//! Embedding providers module
//!
//! This module contains implementations for the embedding providers this
//! crate ships reference clients for: two cloud API-key providers (Jina,
//! Voyage) and a self-hosted HTTP provider with no auth (Local).

use anyhow::Result;
use reqwest::Client;
use std::sync::LazyLock;
use std::time::Duration;

use super::types::{EmbeddingProviderType, InputType};

// Shared HTTP client with connection pooling for optimal performance
static HTTP_CLIENT: LazyLock<Client> = LazyLock::new(|| {
	Client::builder()
		.pool_max_idle_per_host(10)
		.pool_idle_timeout(Duration::from_secs(30))
		.timeout(Duration::from_secs(120)) // Increased from 60s to 120s for embedding APIs
		.connect_timeout(Duration::from_secs(10))
		.build()
		.expect("Failed to create HTTP client")
});

pub mod jina;
pub mod local;
pub mod voyage;

pub use jina::{JinaProvider, JinaProviderImpl};
pub use local::{LocalProvider, LocalProviderImpl};
pub use voyage::{VoyageProvider, VoyageProviderImpl};

/// Trait for embedding providers
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
	async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>>;
	async fn generate_embeddings_batch(
		&self,
		texts: Vec<String>,
		input_type: InputType,
	) -> Result<Vec<Vec<f32>>>;

	/// Get the vector dimension for this provider's model
	fn get_dimension(&self) -> usize;

	/// Validate if the model is supported (optional, defaults to true)
	fn is_model_supported(&self) -> bool {
		true
	}
}

/// Create an embedding provider from provider type and model. `local_base_url`
/// is only consulted for [`EmbeddingProviderType::Local`].
pub fn create_embedding_provider_from_parts(
	provider: &EmbeddingProviderType,
	model: &str,
	local_base_url: &str,
) -> Result<Box<dyn EmbeddingProvider>> {
	match provider {
		EmbeddingProviderType::Jina => Ok(Box::new(JinaProviderImpl::new(model)?)),
		EmbeddingProviderType::Voyage => Ok(Box::new(VoyageProviderImpl::new(model)?)),
		EmbeddingProviderType::Local => {
			Ok(Box::new(LocalProviderImpl::new(model, local_base_url)?))
		}
	}
}
