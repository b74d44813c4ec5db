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

//! The graph-store client (spec §6 "graph store wire protocol"): a
//! `GraphStore` trait with one reference implementation backed by
//! `lancedb`/`arrow` — the teacher's actual storage engine — generalized
//! from four fixed tables (`code_blocks`/`text_blocks`/`document_blocks`/
//! `graphrag_nodes`) into one table per parser-declared label plus one
//! relationships table. LanceDB's native FTS index stands in for the
//! abstract "Lucene full-text index" and its IVF_PQ vector index for the
//! abstract "vector index", both provisioned `IF NOT EXISTS`-style the
//! way `store/table_ops.rs` already does for vector indexes.

pub mod lance_store;
pub mod schema;
pub mod table_ops;
pub mod vector_optimizer;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::CoreError;

pub use schema::{EmbeddingFieldConfig, LabelSchema};

/// A tagged variant at the storage boundary (spec §9 re-architecture of
/// "dynamic dispatch over untyped records"): every node is `{label,
/// props}`, with the label's schema (declared by the owning parser)
/// validated on write by the concrete store.
#[derive(Debug, Clone)]
pub struct ContentNode {
	pub uuid: String,
	pub project_id: String,
	pub label: String,
	pub path: String,
	pub content_hash: String,
	/// Arbitrary parser-declared properties, including the three
	/// well-known embeddable fields (`name`, `content`, `description`)
	/// when the label's schema extracts them.
	pub properties: serde_json::Map<String, Value>,
	pub embedding_name: Option<Vec<f32>>,
	pub embedding_content: Option<Vec<f32>>,
	pub embedding_description: Option<Vec<f32>>,
	pub embedding_name_hash: Option<String>,
	pub embedding_content_hash: Option<String>,
	pub embedding_description_hash: Option<String>,
	pub embedding_provider: Option<String>,
	pub embedding_model: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Relationship {
	pub from_uuid: String,
	pub rel_type: String,
	pub to_uuid: String,
	pub properties: serde_json::Map<String, Value>,
}

/// One row of a hybrid search result, as returned by `GraphStore::search`.
#[derive(Debug, Clone)]
pub struct SearchHit {
	pub node: ContentNode,
	pub vector_score: Option<f32>,
	pub keyword_score: Option<f32>,
}

/// The graph-store wire protocol every backend must implement. A single
/// reference implementation (`lance_store::LanceGraphStore`) ships with
/// this crate.
#[async_trait]
pub trait GraphStore: Send + Sync {
	/// Provision storage for `schemas` — one table per label, each with
	/// its declared embedding fields and a full-text index over its
	/// content-bearing properties. Skips tables/indexes that already
	/// exist with matching dimensions (spec §6: `IF NOT EXISTS`-style).
	async fn ensure_schema(&self, schemas: &[LabelSchema]) -> Result<(), CoreError>;

	/// Insert or, on a `uuid` collision, replace nodes in place
	/// (preserving the uuid), per spec §4.3's change-tracking contract.
	async fn upsert_nodes(&self, nodes: &[ContentNode]) -> Result<(), CoreError>;

	/// `(uuid -> contentHash)` for every node of `label` under `path`,
	/// used by the orchestrator's diff against a freshly-parsed file.
	async fn file_node_hashes(
		&self,
		project_id: &str,
		path: &str,
		label: &str,
	) -> Result<std::collections::HashMap<String, String>, CoreError>;

	/// Fetch a single node by its `uuid`, for callers that need to
	/// read-modify-write existing properties (e.g. the touched-files
	/// subsystem's `accessCount` bump) rather than blindly overwriting on
	/// upsert, or that only hold a uuid from a relationship row.
	async fn get_node_by_uuid(&self, label: &str, uuid: &str) -> Result<Option<ContentNode>, CoreError>;

	/// Every node of `label` under `path`, for callers that need full
	/// properties rather than just the `(uuid, hash)` pairs
	/// `file_node_hashes` returns (e.g. matching a `File`'s child scopes
	/// by name when resolving pending imports).
	async fn nodes_by_path(&self, project_id: &str, label: &str, path: &str) -> Result<Vec<ContentNode>, CoreError>;

	/// Every relationship of `rel_type` whose `to_uuid` is `uuid`.
	async fn relationships_to(&self, to_uuid: &str, rel_type: &str) -> Result<Vec<Relationship>, CoreError>;

	/// Every node of `label` owned by `project_id`, for maintenance passes
	/// that need to reason about a project's whole node set (e.g. pruning
	/// now-childless orphan `Directory` nodes after a migration) rather
	/// than one path at a time.
	async fn nodes_for_project(&self, project_id: &str, label: &str) -> Result<Vec<ContentNode>, CoreError>;

	/// Delete every node with the given `path` across all labels, and
	/// detach (remove) relationships that reference them.
	async fn delete_nodes_by_path(&self, project_id: &str, path: &str) -> Result<(), CoreError>;

	async fn delete_nodes_by_uuids(&self, label: &str, uuids: &[String]) -> Result<(), CoreError>;

	/// `MERGE`-style upsert keyed on `(from_uuid, rel_type, to_uuid)`;
	/// relationship properties are overwritten on conflict.
	async fn upsert_relationships(&self, relationships: &[Relationship]) -> Result<(), CoreError>;

	async fn delete_relationships_for_uuid(&self, uuid: &str) -> Result<(), CoreError>;

	/// Delete exactly one `(from_uuid, rel_type, to_uuid)` relationship,
	/// for callers (e.g. resolved `PENDING_IMPORT` edges) that must not
	/// disturb other relationships touching the same nodes.
	async fn delete_relationship(&self, from_uuid: &str, rel_type: &str, to_uuid: &str) -> Result<(), CoreError>;

	/// Fetch nodes pending an embedding refresh (one of the three hash
	/// columns is `null` while the corresponding property is non-empty),
	/// for the embedding engine's drain loop.
	async fn nodes_pending_embedding(
		&self,
		project_id: &str,
		label: &str,
		limit: usize,
	) -> Result<Vec<ContentNode>, CoreError>;

	async fn write_embeddings(&self, nodes: &[ContentNode]) -> Result<(), CoreError>;

	/// Rewrite every node's `project_id` from `old` to `new`, replacing
	/// `old_path_prefix` with `new_path_prefix` in `path`, for the
	/// `register_project` parent/child containment migration (spec §4.3).
	/// Embeddings and hashes are preserved (uuids are untouched).
	async fn reassign_project(
		&self,
		old: &str,
		new: &str,
		old_path_prefix: &str,
		new_path_prefix: &str,
	) -> Result<(), CoreError>;

	/// Rewrite `project_id` from `old_project` to `new_project`, and strip
	/// `old_path_prefix` in favor of `new_path_prefix`, but only for nodes
	/// whose `path` actually starts with `old_path_prefix` — unlike
	/// [`GraphStore::reassign_project`], which moves an entire project's
	/// nodes unconditionally. Used by `migrate_orphans_to_project` (spec
	/// §4.6), which must leave unrelated orphan nodes under the synthetic
	/// project untouched. Returns the migrated nodes (post-rewrite) so the
	/// caller can derive `BELONGS_TO` edges and prune empty ancestors.
	async fn migrate_path_prefix(
		&self,
		old_project: &str,
		new_project: &str,
		old_path_prefix: &str,
		new_path_prefix: &str,
	) -> Result<Vec<ContentNode>, CoreError>;

	/// Vector search over `label`'s `field` ("name"/"content"/
	/// "description") embedding column.
	async fn vector_search(
		&self,
		project_id: &str,
		label: &str,
		field: &str,
		query_vector: &[f32],
		limit: usize,
	) -> Result<Vec<SearchHit>, CoreError>;

	/// Full-text (BM25-equivalent) search over `label`'s indexed text.
	async fn keyword_search(
		&self,
		project_id: &str,
		label: &str,
		query: &str,
		limit: usize,
	) -> Result<Vec<SearchHit>, CoreError>;

	async fn remove_project(&self, project_id: &str) -> Result<(), CoreError>;
}
