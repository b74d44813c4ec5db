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

//! The hybrid search planner (spec §4.5): fuses BM25 full-text queries
//! with vector queries across every parser-declared embedding field,
//! normalizes to one hit per node, and renders the result envelope.
//!
//! Grounded on `indexer/search.rs`'s result-rendering/truncation pattern
//! (`render_utils::truncate_content_smartly`, reused verbatim for result
//! snippets) and `reranker.rs`'s multiplicative scoring style, which the
//! semantic-first BM25 boost in [`fuse_semantic_first`] generalizes from
//! "boost a single block list" to "boost semantic hits that also matched
//! BM25".

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use crate::context::AppContext;
use crate::embedding::engine::EMBEDDING_CHUNK_LABEL;
use crate::error::CoreError;
use crate::graph::schema::EmbeddingField;
use crate::graph::{GraphStore, SearchHit};
use crate::indexer::render_utils::truncate_content_smartly;
use crate::ingestion::Orchestrator;
use crate::parser::ParserRegistry;

const SNIPPET_MAX_CHARS: usize = 400;

/// The span within a chunked parent's full content that a chunk-level
/// semantic hit actually matched (spec §4.5 point 2 / §8 scenario 5).
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MatchedRange {
	pub start_char: usize,
	pub end_char: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingTypeOption {
	Name,
	Content,
	Description,
	All,
}

impl EmbeddingTypeOption {
	fn fields(self) -> Vec<EmbeddingField> {
		match self {
			EmbeddingTypeOption::Name => vec![EmbeddingField::Name],
			EmbeddingTypeOption::Content => vec![EmbeddingField::Content],
			EmbeddingTypeOption::Description => vec![EmbeddingField::Description],
			EmbeddingTypeOption::All => vec![
				EmbeddingField::Name,
				EmbeddingField::Content,
				EmbeddingField::Description,
			],
		}
	}
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
	/// Exact project set to search. `None` searches every registered
	/// project except the orphan subsystem's synthetic project (spec
	/// §4.5's project filter), unless `touched_files_base_path` is set.
	pub projects: Option<Vec<String>>,
	/// Restrict to these labels (spec `nodeTypes`). `None` searches
	/// every label the parser registry declares.
	pub node_types: Option<Vec<String>>,
	pub semantic: bool,
	pub embedding_type: EmbeddingTypeOption,
	pub hybrid: bool,
	pub glob: Option<String>,
	pub base_path: Option<String>,
	pub limit: usize,
	pub offset: usize,
	pub min_score: f32,
	pub touched_files_base_path: Option<String>,
	pub rrf_k: Option<u32>,
	pub fuzzy_distance: u8,
	/// Overrides `SearchConfig::use_rrf` for one call (spec §9 Open
	/// Question 3: RRF is retained behind a flag, semantic-first boost
	/// is the default).
	pub use_rrf: Option<bool>,
}

impl SearchOptions {
	pub fn from_config(config: &crate::config::SearchConfig) -> Self {
		Self {
			projects: None,
			node_types: None,
			semantic: true,
			embedding_type: EmbeddingTypeOption::Content,
			hybrid: false,
			glob: None,
			base_path: None,
			limit: config.default_limit,
			offset: 0,
			min_score: config.min_score,
			touched_files_base_path: None,
			rrf_k: Some(config.rrf_k),
			fuzzy_distance: config.fuzzy_distance,
			use_rrf: None,
		}
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResultItem {
	pub uuid: String,
	pub project_id: String,
	pub label: String,
	pub path: String,
	pub file_path: String,
	pub score: f32,
	pub snippet: String,
	pub properties: serde_json::Map<String, serde_json::Value>,
	/// Set when this hit was found via a chunk of an oversized content
	/// field rather than the node's own embedding (spec §8 scenario 5).
	pub matched_range: Option<MatchedRange>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
	pub results: Vec<SearchResultItem>,
	pub total_count: usize,
	pub searched_projects: Vec<String>,
}

pub struct SearchPlanner {
	ctx: Arc<AppContext>,
	store: Arc<dyn GraphStore>,
	parsers: Arc<ParserRegistry>,
	orchestrator: Arc<Orchestrator>,
}

impl SearchPlanner {
	pub fn new(
		ctx: Arc<AppContext>,
		store: Arc<dyn GraphStore>,
		parsers: Arc<ParserRegistry>,
		orchestrator: Arc<Orchestrator>,
	) -> Self {
		Self {
			ctx,
			store,
			parsers,
			orchestrator,
		}
	}

	pub async fn search(&self, query: &str, options: SearchOptions) -> Result<SearchResponse, CoreError> {
		self.orchestrator.wait_for_pending_edits().await?;

		let projects = self.resolve_projects(&options);
		let labels = self.resolve_labels(&options);
		let candidate_limit = (options.limit * 3).clamp(options.limit, 150);

		let mut matched_ranges: HashMap<String, MatchedRange> = HashMap::new();

		let hits = if !options.semantic {
			let _guard = self
				.ctx
				.locks
				.ingestion
				.acquire("keyword search", self.ctx.config.search.lock_wait_timeout_secs)
				.await?;
			self.keyword_candidates(query, &projects, &labels, options.fuzzy_distance, candidate_limit)
				.await?
				.into_iter()
				.map(|hit| (hit.clone(), hit.keyword_score.unwrap_or(0.0)))
				.collect::<Vec<_>>()
		} else if !options.hybrid {
			let _guard = self
				.ctx
				.locks
				.embedding
				.acquire("semantic search", self.ctx.config.search.lock_wait_timeout_secs)
				.await?;
			let (semantic, ranges) = self
				.semantic_candidates(
					query,
					&projects,
					&labels,
					&options.embedding_type.fields(),
					candidate_limit,
					options.min_score,
				)
				.await?;
			matched_ranges = ranges;
			semantic
				.into_iter()
				.map(|hit| {
					let score = hit.vector_score.unwrap_or(0.0);
					(hit, score)
				})
				.collect::<Vec<_>>()
		} else {
			let embed_guard = self
				.ctx
				.locks
				.embedding
				.acquire("hybrid search (semantic half)", self.ctx.config.search.lock_wait_timeout_secs)
				.await?;
			let (semantic, ranges) = self
				.semantic_candidates(
					query,
					&projects,
					&labels,
					&options.embedding_type.fields(),
					candidate_limit,
					options.min_score,
				)
				.await?;
			matched_ranges = ranges;
			drop(embed_guard);

			let ingest_guard = self
				.ctx
				.locks
				.ingestion
				.acquire("hybrid search (keyword half)", self.ctx.config.search.lock_wait_timeout_secs)
				.await?;
			let keyword = self
				.keyword_candidates(query, &projects, &labels, options.fuzzy_distance, candidate_limit)
				.await?;
			drop(ingest_guard);

			let use_rrf = options.use_rrf.unwrap_or(self.ctx.config.search.use_rrf);
			if use_rrf {
				fuse_rrf(semantic, keyword, options.rrf_k.unwrap_or(self.ctx.config.search.rrf_k))
			} else {
				fuse_semantic_first(
					semantic,
					keyword,
					self.ctx.config.search.boost_factor,
					self.ctx.config.search.bm25_only_top_n,
				)
			}
		};

		let mut hits = hits;
		hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

		let glob_matcher = options
			.glob
			.as_deref()
			.map(globset::Glob::new)
			.transpose()
			.map_err(|e| CoreError::BadInput {
				field: "glob".to_string(),
				reason: format!("{e}"),
			})?
			.map(|g| g.compile_matcher());

		let mut results: Vec<SearchResultItem> = Vec::new();
		let mut searched_projects = std::collections::BTreeSet::new();
		for (hit, score) in hits {
			if score < options.min_score {
				continue;
			}
			if let Some(matcher) = &glob_matcher {
				if !matcher.is_match(&hit.node.path) {
					continue;
				}
			}
			if let Some(base_path) = &options.base_path {
				if !hit.node.path.starts_with(base_path.as_str()) {
					continue;
				}
			}

			let Some(project) = self.ctx.projects.read().get(&hit.node.project_id) else {
				continue;
			};
			searched_projects.insert(hit.node.project_id.clone());

			let content = hit
				.node
				.properties
				.get("content")
				.or_else(|| hit.node.properties.get("own_content"))
				.and_then(|v| v.as_str())
				.unwrap_or_default();
			let matched_range = matched_ranges.get(&hit.node.uuid).copied();
			// A chunk-level hit snippets from the matched span rather than
			// the start of the (possibly much larger) parent content.
			let snippet_source: std::borrow::Cow<str> = match matched_range {
				Some(range) => content
					.chars()
					.skip(range.start_char)
					.take(range.end_char.saturating_sub(range.start_char))
					.collect::<String>()
					.into(),
				None => content.into(),
			};
			let (snippet, _) = truncate_content_smartly(&snippet_source, SNIPPET_MAX_CHARS);

			results.push(SearchResultItem {
				uuid: hit.node.uuid.clone(),
				project_id: hit.node.project_id.clone(),
				label: hit.node.label.clone(),
				path: hit.node.path.clone(),
				file_path: format!("{}/{}", project.path.display(), hit.node.path),
				score,
				snippet,
				properties: hit.node.properties.clone(),
				matched_range,
			});
		}

		let total_count = results.len();
		let page = results
			.into_iter()
			.skip(options.offset)
			.take(options.limit)
			.collect();

		Ok(SearchResponse {
			results: page,
			total_count,
			searched_projects: searched_projects.into_iter().collect(),
		})
	}

	fn resolve_projects(&self, options: &SearchOptions) -> Vec<String> {
		if let Some(projects) = &options.projects {
			return projects.clone();
		}
		let synthetic = &self.ctx.config.orphan.synthetic_project_id;
		self.ctx
			.projects
			.read()
			.all()
			.into_iter()
			.map(|p| p.id)
			.filter(|id| {
				if id != synthetic {
					return true;
				}
				options.touched_files_base_path.is_some()
			})
			.collect()
	}

	fn resolve_labels(&self, options: &SearchOptions) -> Vec<String> {
		if let Some(node_types) = &options.node_types {
			return node_types.clone();
		}
		self.parsers
			.label_schemas(1, 1)
			.into_iter()
			.map(|schema| schema.label)
			.collect()
	}

	/// Returns merged semantic hits (one per node, chunk hits already
	/// normalized to their parent node) plus the `matchedRange` for every
	/// uuid whose best hit actually came from an `EmbeddingChunk` rather
	/// than the node's own embedding (spec §8 scenario 5).
	async fn semantic_candidates(
		&self,
		query: &str,
		projects: &[String],
		labels: &[String],
		fields: &[EmbeddingField],
		limit: usize,
		min_score: f32,
	) -> Result<(Vec<SearchHit>, HashMap<String, MatchedRange>), CoreError> {
		let mut vectors_by_kind: HashMap<&'static str, Vec<f32>> = HashMap::new();
		let mut merged: HashMap<String, SearchHit> = HashMap::new();
		let mut ranges: HashMap<String, MatchedRange> = HashMap::new();

		for label in labels {
			let Some(kind) = self.parsers.content_kind_for_label(label) else {
				continue;
			};
			let is_code = matches!(kind, crate::parser::ContentKind::Code);
			let kind_key = if is_code { "code" } else { "text" };
			let vector = match vectors_by_kind.get(kind_key) {
				Some(v) => v.clone(),
				None => {
					let v = crate::embedding::generate_embeddings(query, is_code, &self.ctx.config)
						.await
						.map_err(|e| CoreError::ProviderUnavailable(format!("{e}")))?;
					vectors_by_kind.insert(kind_key, v.clone());
					v
				}
			};

			for field in fields {
				for project_id in projects {
					let hits = self
						.store
						.vector_search(project_id, label, field.column(), &vector, limit)
						.await?;
					for hit in hits {
						if hit.vector_score.unwrap_or(0.0) < min_score {
							continue;
						}
						merged.entry(hit.node.uuid.clone()).or_insert(hit);
					}
				}
			}
		}

		// `EmbeddingChunk` isn't in `labels` (no parser declares it), so a
		// chunk-level match is only found by searching it directly. Only
		// relevant when the caller is after content matches.
		if fields.contains(&EmbeddingField::Content) {
			let vector = match vectors_by_kind.get("text") {
				Some(v) => v.clone(),
				None => crate::embedding::generate_embeddings(query, false, &self.ctx.config)
					.await
					.map_err(|e| CoreError::ProviderUnavailable(format!("{e}")))?,
			};

			let mut best_chunk_per_parent: HashMap<String, SearchHit> = HashMap::new();
			for project_id in projects {
				let hits = self
					.store
					.vector_search(project_id, EMBEDDING_CHUNK_LABEL, "content", &vector, limit)
					.await?;
				for hit in hits {
					if hit.vector_score.unwrap_or(0.0) < min_score {
						continue;
					}
					let Some(parent_uuid) = hit.node.properties.get("parentUuid").and_then(|v| v.as_str()) else {
						continue;
					};
					let better = best_chunk_per_parent
						.get(parent_uuid)
						.map(|existing| hit.vector_score.unwrap_or(0.0) > existing.vector_score.unwrap_or(0.0))
						.unwrap_or(true);
					if better {
						best_chunk_per_parent.insert(parent_uuid.to_string(), hit);
					}
				}
			}

			for (parent_uuid, chunk_hit) in best_chunk_per_parent {
				// A node already matched on its own embedding outranks a
				// chunk-derived match for the same node.
				if merged.contains_key(&parent_uuid) {
					continue;
				}
				let Some(parent_label) = chunk_hit.node.properties.get("parentLabel").and_then(|v| v.as_str()) else {
					continue;
				};
				let Some(parent) = self.store.get_node_by_uuid(parent_label, &parent_uuid).await? else {
					continue;
				};
				let start_char = chunk_hit
					.node
					.properties
					.get("startChar")
					.and_then(|v| v.as_u64())
					.unwrap_or(0) as usize;
				let end_char = chunk_hit
					.node
					.properties
					.get("endChar")
					.and_then(|v| v.as_u64())
					.unwrap_or(0) as usize;
				ranges.insert(parent_uuid.clone(), MatchedRange { start_char, end_char });
				merged.insert(
					parent_uuid,
					SearchHit {
						node: parent,
						vector_score: chunk_hit.vector_score,
						keyword_score: None,
					},
				);
			}
		}

		let mut out: Vec<SearchHit> = merged.into_values().collect();
		out.sort_by(|a, b| {
			b.vector_score
				.unwrap_or(0.0)
				.partial_cmp(&a.vector_score.unwrap_or(0.0))
				.unwrap_or(Ordering::Equal)
		});
		Ok((out, ranges))
	}

	async fn keyword_candidates(
		&self,
		query: &str,
		projects: &[String],
		labels: &[String],
		fuzzy_distance: u8,
		limit: usize,
	) -> Result<Vec<SearchHit>, CoreError> {
		let escaped = lucene_query(query, fuzzy_distance);
		let mut merged: HashMap<String, SearchHit> = HashMap::new();
		for project_id in projects {
			for label in labels {
				let hits = self.store.keyword_search(project_id, label, &escaped, limit).await?;
				for hit in hits {
					merged.entry(hit.node.uuid.clone()).or_insert(hit);
				}
			}
		}
		let mut out: Vec<SearchHit> = merged.into_values().collect();
		out.sort_by(|a, b| {
			b.keyword_score
				.unwrap_or(0.0)
				.partial_cmp(&a.keyword_score.unwrap_or(0.0))
				.unwrap_or(Ordering::Equal)
		});
		Ok(out)
	}
}

/// Lucene-escapes each whitespace-separated word and appends
/// `~fuzzyDistance` when requested (spec §4.5 keyword-only path).
fn lucene_query(query: &str, fuzzy_distance: u8) -> String {
	query
		.split_whitespace()
		.map(|word| {
			let escaped = lucene_escape(word);
			if fuzzy_distance > 0 {
				format!("{escaped}~{fuzzy_distance}")
			} else {
				escaped
			}
		})
		.collect::<Vec<_>>()
		.join(" ")
}

const LUCENE_SPECIAL: &[char] = &[
	'+', '-', '&', '|', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*', '?', ':', '\\', '/',
];

fn lucene_escape(word: &str) -> String {
	let mut out = String::with_capacity(word.len());
	for ch in word.chars() {
		if LUCENE_SPECIAL.contains(&ch) {
			out.push('\\');
		}
		out.push(ch);
	}
	out
}

/// Semantic-first BM25 boost (spec §4.5 path 3, the default fusion
/// strategy): a semantic hit that also matched BM25 is boosted by
/// `1 + boostFactor/sqrt(bm25Rank)`; the top `bm25_only_top_n` BM25-only
/// hits are folded in with a synthetic base score so exact keyword
/// matches surface even without strong semantic similarity.
fn fuse_semantic_first(
	semantic: Vec<SearchHit>,
	keyword: Vec<SearchHit>,
	boost_factor: f32,
	bm25_only_top_n: usize,
) -> Vec<(SearchHit, f32)> {
	let keyword_rank: HashMap<String, usize> = keyword
		.iter()
		.enumerate()
		.map(|(i, hit)| (hit.node.uuid.clone(), i + 1))
		.collect();

	let mut scored: HashMap<String, (SearchHit, f32)> = HashMap::new();
	for hit in semantic {
		let base = hit.vector_score.unwrap_or(0.0);
		let score = match keyword_rank.get(&hit.node.uuid) {
			Some(&rank) => base * (1.0 + boost_factor / (rank as f32).sqrt()),
			None => base,
		};
		scored.insert(hit.node.uuid.clone(), (hit, score));
	}

	for (position, hit) in keyword.into_iter().enumerate() {
		if position >= bm25_only_top_n {
			break;
		}
		scored.entry(hit.node.uuid.clone()).or_insert_with(|| {
			let synthetic = 0.4 - 0.05 * position as f32;
			(hit, synthetic)
		});
	}

	scored.into_values().collect()
}

/// Reciprocal Rank Fusion fallback (spec §9 Open Question 3): retained
/// behind `SearchConfig::use_rrf` / `SearchOptions::use_rrf`.
fn fuse_rrf(semantic: Vec<SearchHit>, keyword: Vec<SearchHit>, k: u32) -> Vec<(SearchHit, f32)> {
	let mut scored: HashMap<String, (SearchHit, f32)> = HashMap::new();
	for (rank, hit) in semantic.into_iter().enumerate() {
		let contribution = 1.0 / (k as f32 + rank as f32 + 1.0);
		scored
			.entry(hit.node.uuid.clone())
			.and_modify(|(_, score)| *score += contribution)
			.or_insert((hit, contribution));
	}
	for (rank, hit) in keyword.into_iter().enumerate() {
		let contribution = 1.0 / (k as f32 + rank as f32 + 1.0);
		scored
			.entry(hit.node.uuid.clone())
			.and_modify(|(_, score)| *score += contribution)
			.or_insert((hit, contribution));
	}
	scored.into_values().collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn lucene_escape_backslashes_special_characters() {
		assert_eq!(lucene_escape("foo:bar"), "foo\\:bar");
		assert_eq!(lucene_escape("a+b"), "a\\+b");
	}

	#[test]
	fn lucene_query_appends_fuzzy_suffix_per_word() {
		assert_eq!(lucene_query("foo bar", 2), "foo~2 bar~2");
		assert_eq!(lucene_query("foo bar", 0), "foo bar");
	}

	fn node(uuid: &str) -> crate::graph::ContentNode {
		crate::graph::ContentNode {
			uuid: uuid.to_string(),
			project_id: "p1".to_string(),
			label: "Scope".to_string(),
			path: "a.rs".to_string(),
			content_hash: "h".to_string(),
			properties: serde_json::Map::new(),
			embedding_name: None,
			embedding_content: None,
			embedding_description: None,
			embedding_name_hash: None,
			embedding_content_hash: None,
			embedding_description_hash: None,
			embedding_provider: None,
			embedding_model: None,
		}
	}

	#[test]
	fn semantic_first_boost_rewards_hits_present_in_both_lists() {
		let semantic = vec![
			SearchHit {
				node: node("a"),
				vector_score: Some(0.5),
				keyword_score: None,
			},
			SearchHit {
				node: node("b"),
				vector_score: Some(0.5),
				keyword_score: None,
			},
		];
		let keyword = vec![SearchHit {
			node: node("a"),
			vector_score: None,
			keyword_score: Some(9.0),
		}];

		let fused = fuse_semantic_first(semantic, keyword, 0.3, 5);
		let score_a = fused.iter().find(|(h, _)| h.node.uuid == "a").unwrap().1;
		let score_b = fused.iter().find(|(h, _)| h.node.uuid == "b").unwrap().1;
		assert!(score_a > score_b);
	}

	#[test]
	fn semantic_first_boost_folds_in_top_bm25_only_hits() {
		let keyword = vec![SearchHit {
			node: node("only-bm25"),
			vector_score: None,
			keyword_score: Some(5.0),
		}];
		let fused = fuse_semantic_first(vec![], keyword, 0.3, 5);
		assert_eq!(fused.len(), 1);
		assert!((fused[0].1 - 0.4).abs() < 1e-6);
	}
}
