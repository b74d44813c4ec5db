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

//! The embedding engine (spec §4.4): the multi-embedding pass that turns
//! `linked` nodes into `ready` ones by computing and writing vectors.
//!
//! Grounded on `embedding/mod.rs`'s hash-based cache invalidation
//! (`calculate_content_hash`, `split_texts_into_token_limited_batches`)
//! and on `store/table_ops.rs`'s `IF NOT EXISTS`-style index
//! provisioning, generalized from one fixed vector index per block table
//! to one per `(label, embedding_field)` pair plus
//! `(EmbeddingChunk, embedding_content)`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use crate::context::AppContext;
use crate::embedding::chunking::{chunk_text_paragraph_aware, TextChunk};
use crate::embedding::types::InputType;
use crate::embedding::{calculate_content_hash, count_tokens, generate_embeddings_batch};
use crate::error::CoreError;
use crate::graph::schema::{EmbeddingField, EmbeddingFieldConfig, LabelSchema};
use crate::graph::{ContentNode, GraphStore, Relationship};
use crate::node_state::NodeState;
use crate::parser::{deterministic_uuid, ContentKind, ParserRegistry};

pub const EMBEDDING_CHUNK_LABEL: &str = "EmbeddingChunk";
const HAS_EMBEDDING_CHUNK: &str = "HAS_EMBEDDING_CHUNK";
const MAX_RETRIES: u32 = 3;

/// `EmbeddingChunk` isn't a parser-declared node type — every oversized
/// content field produces them the same way — so its schema is supplied
/// here rather than derived from `ParserRegistry::label_schemas`.
pub fn embedding_chunk_schema(text_dimension: usize) -> LabelSchema {
	LabelSchema {
		label: EMBEDDING_CHUNK_LABEL.to_string(),
		embedding_fields: vec![EmbeddingFieldConfig {
			field: EmbeddingField::Content,
			dimension: text_dimension,
		}],
	}
}

enum TaskTarget {
	Small { uuid: String, field: EmbeddingField },
	Chunk { parent_uuid: String, index: usize, chunk: TextChunk },
}

struct EmbedTask {
	text: String,
	is_code: bool,
	target: TaskTarget,
}

/// Drives the four phases of spec §4.4 over one project: collect,
/// delete-stale-chunks, embed, write.
pub struct EmbeddingEngine {
	ctx: Arc<AppContext>,
	store: Arc<dyn GraphStore>,
	parsers: Arc<ParserRegistry>,
}

impl EmbeddingEngine {
	pub fn new(ctx: Arc<AppContext>, store: Arc<dyn GraphStore>, parsers: Arc<ParserRegistry>) -> Self {
		Self { ctx, store, parsers }
	}

	/// One pass over `project_id`. Returns the number of parent nodes
	/// that reached `ready`.
	pub async fn run_pass(&self, project_id: &str) -> Result<usize, CoreError> {
		let config = self.ctx.config.clone();
		let _guard = self
			.ctx
			.locks
			.embedding
			.acquire(format!("embedding pass for {project_id}"), config.locks.default_timeout_secs)
			.await?;

		let mut nodes: HashMap<String, ContentNode> = HashMap::new();
		let mut tasks: Vec<EmbedTask> = Vec::new();
		// parent uuid -> (chunk count, full source text, is_code)
		let mut chunked_parents: HashMap<String, (usize, String, bool)> = HashMap::new();

		// 1. Collect phase: one fetch per (label, field), filtered to `linked`.
		for node_type in self.parsers.node_types() {
			let linked = self.ctx.node_states.read().uuids_in_state(project_id, NodeState::Linked);
			if linked.is_empty() {
				continue;
			}
			let is_code = node_type.content_kind == ContentKind::Code;
			let pending = self
				.store
				.nodes_pending_embedding(project_id, node_type.label, linked.len() * 4 + 16)
				.await?;

			for node in pending {
				if !linked.contains(&node.uuid) {
					continue;
				}

				for extractor in &node_type.field_extractors {
					let Some(field) = extractor.field else { continue };
					let Some(text) = node.properties.get(extractor.property).and_then(Value::as_str) else {
						continue;
					};
					if text.is_empty() {
						continue;
					}

					if field == EmbeddingField::Content {
						if let Some(chunking) = node_type.chunking_config {
							if text.chars().count() > config.index.chunking_threshold {
								let chunks = chunk_text_paragraph_aware(text, chunking.chunk_size, chunking.chunk_overlap);
								let count = chunks.len();
								for (index, chunk) in chunks.into_iter().enumerate() {
									tasks.push(EmbedTask {
										text: chunk.content.clone(),
										// `EmbeddingChunk`'s content column is declared at a single
										// fixed dimension, so every chunk is embedded through the
										// text model regardless of the parent's own content kind.
										is_code: false,
										target: TaskTarget::Chunk {
											parent_uuid: node.uuid.clone(),
											index,
											chunk,
										},
									});
								}
								chunked_parents.insert(node.uuid.clone(), (count, text.to_string(), false));
								nodes.entry(node.uuid.clone()).or_insert_with(|| node.clone());
								continue;
							}
						}
					}

					let truncated = truncate_chars(text, config.index.max_text_length);
					tasks.push(EmbedTask {
						text: truncated,
						is_code,
						target: TaskTarget::Small {
							uuid: node.uuid.clone(),
							field,
						},
					});
					nodes.entry(node.uuid.clone()).or_insert_with(|| node.clone());
				}
			}
		}

		if tasks.is_empty() {
			return Ok(0);
		}

		// 2. Delete-stale-chunks phase: one detach-delete per parent.
		for parent_uuid in chunked_parents.keys() {
			let Some(parent) = nodes.get(parent_uuid) else { continue };
			let existing = self
				.store
				.nodes_by_path(project_id, EMBEDDING_CHUNK_LABEL, &parent.path)
				.await?;
			for chunk in existing {
				if chunk.properties.get("parentUuid").and_then(Value::as_str) != Some(parent_uuid.as_str()) {
					continue;
				}
				self.store.delete_relationship(parent_uuid, HAS_EMBEDDING_CHUNK, &chunk.uuid).await?;
				self.store.delete_nodes_by_uuids(EMBEDDING_CHUNK_LABEL, &[chunk.uuid]).await?;
			}
		}

		// 3. Embed phase: batched provider calls, retried with backoff,
		// grouped by code/text since they use different provider models.
		let mut failed_uuids: Vec<(String, String)> = Vec::new();
		let mut vectors: Vec<Option<Vec<f32>>> = vec![None; tasks.len()];

		for is_code in [true, false] {
			let group_indices: Vec<usize> = tasks
				.iter()
				.enumerate()
				.filter(|(_, t)| t.is_code == is_code)
				.map(|(i, _)| i)
				.collect();
			if group_indices.is_empty() {
				continue;
			}

			for batch in batch_indices(
				&group_indices,
				&tasks,
				config.index.embeddings_batch_size,
				config.index.embeddings_max_tokens_per_batch,
			) {
				let texts: Vec<String> = batch.iter().map(|&i| tasks[i].text.clone()).collect();
				match self.embed_with_retry(texts, is_code, &config).await {
					Ok(batch_vectors) => {
						for (i, vector) in batch.iter().zip(batch_vectors) {
							vectors[*i] = Some(vector);
						}
					}
					Err(e) => {
						for &i in &batch {
							let reason = e.to_string();
							match &tasks[i].target {
								TaskTarget::Small { uuid, .. } => failed_uuids.push((uuid.clone(), reason)),
								TaskTarget::Chunk { parent_uuid, .. } => failed_uuids.push((parent_uuid.clone(), reason)),
							}
						}
						tracing::warn!("embedding batch failed after retries, {} task(s) dropped: {e}", batch.len());
					}
				}
			}
		}

		for (uuid, reason) in &failed_uuids {
			self.ctx.node_states.write().mark_failed(uuid, reason.clone());
		}

		// 4. Write phase. Code and text fields are embedded by different
		// configured models, so provider/model are resolved per task.
		let (code_provider, code_model) = crate::embedding::types::parse_provider_model(&config.embedding.code_model);
		let code_provider_name = format!("{code_provider:?}").to_lowercase();
		let (text_provider, text_model) = crate::embedding::types::parse_provider_model(&config.embedding.text_model);
		let text_provider_name = format!("{text_provider:?}").to_lowercase();

		let mut chunk_nodes_by_parent: HashMap<String, Vec<ContentNode>> = HashMap::new();
		let mut chunk_rels: Vec<Relationship> = Vec::new();

		for (i, task) in tasks.iter().enumerate() {
			let Some(vector) = vectors[i].take() else { continue };
			let (provider_name, model) = if task.is_code {
				(&code_provider_name, &code_model)
			} else {
				(&text_provider_name, &text_model)
			};
			match &task.target {
				TaskTarget::Small { uuid, field } => {
					if let Some(node) = nodes.get_mut(uuid) {
						let hash = calculate_content_hash(&task.text);
						set_embedding(node, *field, vector, &hash, provider_name, model);
					}
				}
				TaskTarget::Chunk { parent_uuid, index, chunk } => {
					let Some(parent) = nodes.get(parent_uuid) else { continue };
					let chunk_uuid = deterministic_uuid(&[project_id, parent_uuid, "embedding_chunk", &index.to_string()]);
					let content_hash = calculate_content_hash(&chunk.content);
					let mut properties = serde_json::Map::new();
					properties.insert("content".to_string(), json!(chunk.content));
					properties.insert("parentUuid".to_string(), json!(parent_uuid));
					properties.insert("parentLabel".to_string(), json!(parent.label));
					properties.insert("chunkIndex".to_string(), json!(index));
					properties.insert("startChar".to_string(), json!(chunk.start_char));
					properties.insert("endChar".to_string(), json!(chunk.end_char));

					let mut chunk_node = ContentNode {
						uuid: chunk_uuid.clone(),
						project_id: project_id.to_string(),
						label: EMBEDDING_CHUNK_LABEL.to_string(),
						path: parent.path.clone(),
						content_hash: content_hash.clone(),
						properties,
						embedding_name: None,
						embedding_content: None,
						embedding_description: None,
						embedding_name_hash: None,
						embedding_content_hash: None,
						embedding_description_hash: None,
						embedding_provider: None,
						embedding_model: None,
					};
					set_embedding(&mut chunk_node, EmbeddingField::Content, vector, &content_hash, provider_name, model);
					chunk_rels.push(Relationship {
						from_uuid: parent_uuid.clone(),
						rel_type: HAS_EMBEDDING_CHUNK.to_string(),
						to_uuid: chunk_uuid,
						properties: serde_json::Map::new(),
					});
					chunk_nodes_by_parent.entry(parent_uuid.clone()).or_default().push(chunk_node);
				}
			}
		}

		// (uuid, provider, model) for every node that reached `ready`.
		let mut ready_uuids: Vec<(String, String, String)> = Vec::new();

		for (parent_uuid, (chunk_count, full_text, is_code)) in &chunked_parents {
			let Some(written) = chunk_nodes_by_parent.get(parent_uuid) else { continue };
			if written.len() != *chunk_count {
				// Some chunks failed to embed; leave the parent `linked` for the next pass.
				continue;
			}
			let (provider_name, model) = if *is_code {
				(&code_provider_name, &code_model)
			} else {
				(&text_provider_name, &text_model)
			};
			if let Some(parent) = nodes.get_mut(parent_uuid) {
				parent.properties.insert("usesChunks".to_string(), json!(true));
				parent.properties.insert("chunkCount".to_string(), json!(chunk_count));
				parent.embedding_content_hash = Some(calculate_content_hash(full_text));
				parent.embedding_provider = Some(provider_name.clone());
				parent.embedding_model = Some(model.clone());
				ready_uuids.push((parent_uuid.clone(), provider_name.clone(), model.clone()));
			}
		}

		for (uuid, node) in &nodes {
			if chunked_parents.contains_key(uuid) {
				continue;
			}
			if node.embedding_name.is_some() || node.embedding_content.is_some() || node.embedding_description.is_some() {
				let provider_name = node.embedding_provider.clone().unwrap_or_default();
				let model = node.embedding_model.clone().unwrap_or_default();
				ready_uuids.push((uuid.clone(), provider_name, model));
			}
		}

		let to_write: Vec<ContentNode> = nodes.into_values().collect();
		self.store.write_embeddings(&to_write).await?;

		let all_chunks: Vec<ContentNode> = chunk_nodes_by_parent.into_values().flatten().collect();
		if !all_chunks.is_empty() {
			self.store.upsert_nodes(&all_chunks).await?;
			self.store.upsert_relationships(&chunk_rels).await?;
		}

		for (uuid, provider_name, model) in &ready_uuids {
			let mut states = self.ctx.node_states.write();
			if states.mark_ready(uuid, provider_name, model).is_ok() {
				self.ctx.events.publish(crate::events::IngestionEvent::NodeTransitioned {
					project_id: project_id.to_string(),
					uuid: uuid.clone(),
					from: NodeState::Linked,
					to: NodeState::Ready,
				});
			}
		}

		if !ready_uuids.is_empty() {
			let (_, provider_name, model) = &ready_uuids[0];
			self.ctx.events.publish(crate::events::IngestionEvent::EmbeddingsWritten {
				project_id: project_id.to_string(),
				count: ready_uuids.len(),
				provider: provider_name.clone(),
				model: model.clone(),
			});
		}

		Ok(ready_uuids.len())
	}

	async fn embed_with_retry(
		&self,
		texts: Vec<String>,
		is_code: bool,
		config: &crate::config::Config,
	) -> Result<Vec<Vec<f32>>, CoreError> {
		let mut attempt = 0;
		loop {
			match generate_embeddings_batch(texts.clone(), is_code, InputType::Document, config).await {
				Ok(vectors) => return Ok(vectors),
				Err(e) if attempt < MAX_RETRIES => {
					attempt += 1;
					let backoff = Duration::from_millis(200 * 2u64.pow(attempt));
					tracing::warn!("embedding batch failed (attempt {attempt}/{MAX_RETRIES}): {e}; retrying in {backoff:?}");
					tokio::time::sleep(backoff).await;
				}
				Err(e) => return Err(CoreError::ProviderUnavailable(e.to_string())),
			}
		}
	}
}

fn set_embedding(
	node: &mut ContentNode,
	field: EmbeddingField,
	vector: Vec<f32>,
	hash: &str,
	provider: &str,
	model: &str,
) {
	match field {
		EmbeddingField::Name => {
			node.embedding_name = Some(vector);
			node.embedding_name_hash = Some(hash.to_string());
		}
		EmbeddingField::Content => {
			node.embedding_content = Some(vector);
			node.embedding_content_hash = Some(hash.to_string());
		}
		EmbeddingField::Description => {
			node.embedding_description = Some(vector);
			node.embedding_description_hash = Some(hash.to_string());
		}
	}
	node.embedding_provider = Some(provider.to_string());
	node.embedding_model = Some(model.to_string());
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
	if text.chars().count() <= max_chars {
		text.to_string()
	} else {
		text.chars().take(max_chars).collect()
	}
}

/// Groups `indices` (a subset of positions in `tasks`) into batches that
/// respect both a maximum item count and a maximum total token count,
/// the same two-dimensional budget `split_texts_into_token_limited_batches`
/// applies to a flat text list, adapted here to preserve each task's
/// original index for writing results back.
fn batch_indices(indices: &[usize], tasks: &[EmbedTask], max_batch_size: usize, max_tokens: usize) -> Vec<Vec<usize>> {
	let mut batches = Vec::new();
	let mut current = Vec::new();
	let mut current_tokens = 0usize;

	for &i in indices {
		let tokens = count_tokens(&tasks[i].text);
		let would_overflow = !current.is_empty() && (current.len() >= max_batch_size || current_tokens + tokens > max_tokens);
		if would_overflow {
			batches.push(std::mem::take(&mut current));
			current_tokens = 0;
		}
		current_tokens += tokens;
		current.push(i);
	}
	if !current.is_empty() {
		batches.push(current);
	}
	batches
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn embedding_chunk_schema_declares_a_content_vector() {
		let schema = embedding_chunk_schema(1536);
		assert_eq!(schema.label, EMBEDDING_CHUNK_LABEL);
		assert_eq!(schema.embedding_fields.len(), 1);
		assert_eq!(schema.embedding_fields[0].field, EmbeddingField::Content);
	}

	#[test]
	fn truncate_chars_respects_char_boundaries() {
		let text = "a".repeat(100);
		assert_eq!(truncate_chars(&text, 10).chars().count(), 10);
		assert_eq!(truncate_chars("short", 10), "short");
	}
}
