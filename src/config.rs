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

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::embedding::types::EmbeddingConfig;
use crate::storage;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
	pub chunk_size: usize,
	pub chunk_overlap: usize,

	/// Chunks below this many characters are merged with a neighbor instead
	/// of standing alone.
	pub chunking_threshold: usize,

	/// Text above `chunking_threshold` is split into `EmbeddingChunk`
	/// nodes; text at or below it is truncated to this many characters
	/// and embedded directly on the parent (spec §4.4 "small" task).
	pub max_text_length: usize,

	pub embeddings_batch_size: usize,

	/// Maximum tokens per batch for embeddings generation (global limit).
	/// This prevents API errors like "max allowed tokens per submitted batch is 120000".
	/// Uses tiktoken cl100k_base tokenizer for counting. Default: 100000
	pub embeddings_max_tokens_per_batch: usize,

	/// How often to flush data to storage during indexing (in batches).
	/// 1 = flush after every batch (safest, slower)
	/// 5 = flush every 5 batches (faster, less safe)
	pub flush_frequency: usize,

	/// Debounce window the ingestion queue applies to coalesce bursts of
	/// file-change notifications for the same path.
	pub change_debounce_ms: u64,

	pub ignore_patterns: Vec<String>,
}

impl Default for IndexConfig {
	fn default() -> Self {
		Self {
			chunk_size: 2000,
			chunk_overlap: 200,
			chunking_threshold: 3000,
			max_text_length: 4000,
			embeddings_batch_size: 500,
			embeddings_max_tokens_per_batch: 100000,
			flush_frequency: 2,
			change_debounce_ms: 500,
			ignore_patterns: vec![
				".git/".to_string(),
				"target/".to_string(),
				"node_modules/".to_string(),
			],
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
	pub default_limit: usize,
	pub min_score: f32,

	/// RRF rank constant (`1 / (k + rank)`), used only when `use_rrf` is set.
	pub rrf_k: u32,

	/// Weight given to the BM25 signal in the default semantic-first boost fusion.
	pub boost_factor: f32,
	pub bm25_only_top_n: usize,
	pub fuzzy_distance: u8,

	/// false = semantic-first BM25 boost (the default fusion strategy);
	/// true = Reciprocal Rank Fusion, opt-in per search call.
	pub use_rrf: bool,

	pub lock_wait_timeout_secs: u64,
	pub pending_edit_wait_secs: u64,
}

impl Default for SearchConfig {
	fn default() -> Self {
		Self {
			default_limit: 20,
			min_score: 0.3,
			rrf_k: 60,
			boost_factor: 0.3,
			bm25_only_top_n: 5,
			fuzzy_distance: 0,
			use_rrf: false,
			lock_wait_timeout_secs: 300,
			pending_edit_wait_secs: 30,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocksConfig {
	/// 0 = infinite. Batch-scoped acquisitions instead use
	/// `max(lock_min_batch_timeout_secs, lock_per_batch_timeout_secs * batch_count)`.
	pub default_timeout_secs: u64,
	pub lock_min_batch_timeout_secs: u64,
	pub lock_per_batch_timeout_secs: u64,
}

impl Default for LocksConfig {
	fn default() -> Self {
		Self {
			default_timeout_secs: 0,
			lock_min_batch_timeout_secs: 1200,
			lock_per_batch_timeout_secs: 120,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrphanConfig {
	/// Reserved project id for nodes discovered via `touch_file`/`create_mentioned_file`
	/// before any real project claims them.
	pub synthetic_project_id: String,
	pub retention_days: u32,
}

impl Default for OrphanConfig {
	fn default() -> Self {
		Self {
			synthetic_project_id: "touched-files".to_string(),
			retention_days: 30,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
	/// Configuration version for future migrations
	#[serde(default = "default_version")]
	pub version: u32,

	#[serde(default)]
	pub index: IndexConfig,

	#[serde(default)]
	pub search: SearchConfig,

	#[serde(default)]
	pub embedding: EmbeddingConfig,

	#[serde(default)]
	pub locks: LocksConfig,

	#[serde(default)]
	pub orphan: OrphanConfig,
}

fn default_version() -> u32 {
	1
}

impl Default for Config {
	fn default() -> Self {
		Self {
			version: default_version(),
			index: IndexConfig::default(),
			search: SearchConfig::default(),
			embedding: EmbeddingConfig::default(),
			locks: LocksConfig::default(),
			orphan: OrphanConfig::default(),
		}
	}
}

impl Config {
	pub fn load() -> Result<Self> {
		let config_path = Self::get_system_config_path()?;

		let config = if config_path.exists() {
			let content = fs::read_to_string(&config_path)?;
			toml::from_str(&content)?
		} else {
			// Load from template first, then save to system config
			let template_config = Self::load_from_template()?;

			// Ensure the parent directory exists
			if let Some(parent) = config_path.parent() {
				if !parent.exists() {
					fs::create_dir_all(parent)?;
				}
			}

			// Save template as the new config
			let toml_content = toml::to_string_pretty(&template_config)?;
			fs::write(&config_path, toml_content)?;
			template_config
		};

		Ok(config)
	}

	/// Load configuration from the default template
	fn load_from_template() -> Result<Self> {
		// Try to load from embedded template first
		let template_content = Self::get_default_template_content()?;
		let config: Config = toml::from_str(&template_content)?;
		Ok(config)
	}

	/// Get the default template content
	fn get_default_template_content() -> Result<String> {
		// First try to read from config-templates/default.toml in the current directory
		let template_path = std::path::Path::new("config-templates/default.toml");
		if template_path.exists() {
			return Ok(fs::read_to_string(template_path)?);
		}

		// If not found, use embedded template
		Ok(include_str!("../config-templates/default.toml").to_string())
	}

	pub fn save(&self) -> Result<()> {
		let config_path = Self::get_system_config_path()?;

		// Ensure the parent directory exists
		if let Some(parent) = config_path.parent() {
			if !parent.exists() {
				fs::create_dir_all(parent)?;
			}
		}

		let toml_content = toml::to_string_pretty(self)?;
		fs::write(config_path, toml_content)?;
		Ok(())
	}

	/// Get the system-wide config file path
	/// Stored at ~/.local/share/ragforge/config.toml (same level as the embedding cache)
	pub fn get_system_config_path() -> Result<PathBuf> {
		let system_storage = storage::get_system_storage_dir()?;
		Ok(system_storage.join("config.toml"))
	}

	/// `max(lock_min_batch_timeout_secs, lock_per_batch_timeout_secs * batch_count)`,
	/// the batch-scoped lock acquisition timeout.
	pub fn batch_lock_timeout_secs(&self, batch_count: usize) -> u64 {
		(self.locks.lock_per_batch_timeout_secs * batch_count as u64)
			.max(self.locks.lock_min_batch_timeout_secs)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_config() {
		let config = Config::default();
		assert_eq!(config.version, 1);
		assert_eq!(config.index.chunk_size, 2000);
		assert_eq!(config.index.chunking_threshold, 3000);
		assert_eq!(config.search.default_limit, 20);
		assert!(!config.search.use_rrf);
		assert_eq!(config.orphan.synthetic_project_id, "touched-files");
	}

	#[test]
	fn test_template_loading() {
		let result = Config::load_from_template();
		assert!(result.is_ok(), "Should be able to load from template");

		let config = result.unwrap();
		assert_eq!(config.version, 1);
		assert_eq!(config.index.chunk_size, 2000);
	}

	#[test]
	fn test_batch_lock_timeout_scales_with_batch_count() {
		let config = Config::default();
		assert_eq!(config.batch_lock_timeout_secs(1), 1200);
		assert_eq!(config.batch_lock_timeout_secs(20), 2400);
	}
}
