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

//! The parser registry and plug-in parser ABI (spec §4.2): an immutable
//! (after startup) set of parsers, each declaring supported extensions
//! and a set of [`NodeTypeDefinition`]s. Parsers are pure: given a path,
//! raw bytes and the existing `uuid` map for that file, they return a
//! structural graph fragment with deterministic uuids, so re-parsing an
//! unchanged file reproduces identical identifiers.

pub mod markdown;
pub mod scope;

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::CoreError;
use crate::graph::schema::{EmbeddingField, EmbeddingFieldConfig, LabelSchema};
use crate::graph::{ContentNode, Relationship};

/// Which embedding model config (`code_model` vs `text_model`) a
/// label's content-bearing fields should be embedded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
	Code,
	Text,
}

/// One `{name, content, description?, displayPath}` pure extractor over
/// a node's already-populated properties (spec §4.2). `field` identifies
/// which of the three embeddable columns this extractor feeds, or `None`
/// for `displayPath` (used only by search result rendering).
pub struct FieldExtractor {
	pub field: Option<EmbeddingField>,
	pub property: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
	pub chunk_size: usize,
	pub chunk_overlap: usize,
}

/// A parser-declared node type: its label, property contract and which
/// properties feed which embedding columns. The registry auto-derives
/// the embedding-field configuration and index provisioning list from
/// this (spec §4.2).
pub struct NodeTypeDefinition {
	pub label: &'static str,
	pub required_properties: Vec<&'static str>,
	pub additional_properties: Vec<&'static str>,
	pub content_hash_field: &'static str,
	pub content_kind: ContentKind,
	pub field_extractors: Vec<FieldExtractor>,
	pub chunking_config: Option<ChunkingConfig>,
}

pub struct ParseOutput {
	pub nodes: Vec<ContentNode>,
	pub relationships: Vec<Relationship>,
}

/// The plug-in parser ABI. Implementations are pure functions of their
/// input: same path + bytes + existing uuid map always yields the same
/// output.
pub trait Parser: Send + Sync {
	fn name(&self) -> &'static str;
	fn version(&self) -> u32;
	fn extensions(&self) -> &'static [&'static str];

	/// Fallback routing for files whose extension isn't claimed by any
	/// parser, or to break an extension tie (spec §4.2: "falling back to
	/// the first `canHandle` hit").
	fn can_handle(&self, _path: &Path) -> bool {
		false
	}

	fn node_types(&self) -> Vec<NodeTypeDefinition>;

	/// `existing_uuids` maps a parser-internal stable key (e.g. a scope's
	/// qualified name, or a section's heading path) to the uuid it had
	/// the last time this file was parsed, so unchanged fragments keep
	/// their identity across re-parses. `project_id` is stamped onto
	/// every emitted node but never affects uuid derivation.
	fn parse(
		&self,
		project_id: &str,
		path: &Path,
		bytes: &[u8],
		existing_uuids: &HashMap<String, String>,
	) -> Result<ParseOutput, CoreError>;
}

/// SHA-256 over a stable key, truncated to 32 hex chars — deterministic
/// uuids so re-parsing an unchanged file reproduces identical ids
/// (spec §4.2).
pub fn deterministic_uuid(parts: &[&str]) -> String {
	let mut hasher = Sha256::new();
	hasher.update(parts.join("\u{1}").as_bytes());
	format!("{:x}", hasher.finalize())[..32].to_string()
}

/// Extension collisions are resolved by last-registered-wins with a
/// warning (spec §4.2).
#[derive(Default)]
pub struct ParserRegistry {
	parsers: Vec<Arc<dyn Parser>>,
	by_extension: HashMap<String, usize>,
}

impl ParserRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&mut self, parser: Arc<dyn Parser>) {
		let index = self.parsers.len();
		for ext in parser.extensions() {
			if let Some(previous) = self.by_extension.insert(ext.to_string(), index) {
				let previous_name = self.parsers[previous].name();
				tracing::warn!(
					"extension '{}' reassigned from parser '{}' to '{}'",
					ext,
					previous_name,
					parser.name()
				);
			}
		}
		self.parsers.push(parser);
	}

	pub fn parser_for(&self, path: &Path) -> Option<Arc<dyn Parser>> {
		if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
			if let Some(&index) = self.by_extension.get(ext) {
				return Some(self.parsers[index].clone());
			}
		}
		self.parsers.iter().find(|p| p.can_handle(path)).cloned()
	}

	pub fn parse(
		&self,
		project_id: &str,
		path: &Path,
		bytes: &[u8],
		existing_uuids: &HashMap<String, String>,
	) -> Result<ParseOutput, CoreError> {
		let parser = self.parser_for(path).ok_or_else(|| CoreError::ParseFailure {
			file: path.display().to_string(),
			reason: "no parser registered for this file".to_string(),
		})?;
		parser.parse(project_id, path, bytes, existing_uuids)
	}

	/// Auto-derives one [`LabelSchema`] per distinct label across every
	/// registered parser's node types (spec §4.2 "list of node labels
	/// and embedding property names used by index provisioning").
	pub fn label_schemas(&self, code_dimension: usize, text_dimension: usize) -> Vec<LabelSchema> {
		let mut schemas: HashMap<&'static str, LabelSchema> = HashMap::new();
		for parser in &self.parsers {
			for node_type in parser.node_types() {
				let dimension = match node_type.content_kind {
					ContentKind::Code => code_dimension,
					ContentKind::Text => text_dimension,
				};
				let entry = schemas.entry(node_type.label).or_insert_with(|| LabelSchema {
					label: node_type.label.to_string(),
					embedding_fields: Vec::new(),
				});
				for extractor in &node_type.field_extractors {
					if let Some(field) = extractor.field {
						if !entry.embedding_fields.iter().any(|c| c.field == field) {
							entry.embedding_fields.push(EmbeddingFieldConfig { field, dimension });
						}
					}
				}
			}
		}
		schemas.into_values().collect()
	}

	/// Every node type declared across every registered parser, for
	/// callers (the embedding engine) that need `field_extractors`/
	/// `chunking_config` per label rather than just the derived schema.
	pub fn node_types(&self) -> Vec<NodeTypeDefinition> {
		self.parsers.iter().flat_map(|p| p.node_types()).collect()
	}

	/// Which embedding model config a label's content was embedded with,
	/// for the search planner to pick the matching query embedding model.
	pub fn content_kind_for_label(&self, label: &str) -> Option<ContentKind> {
		self.parsers
			.iter()
			.flat_map(|p| p.node_types())
			.find(|node_type| node_type.label == label)
			.map(|node_type| node_type.content_kind)
	}
}

/// Convenience for building a node's `properties` map from `(key,
/// value)` pairs, used by parser implementations.
pub fn properties(pairs: impl IntoIterator<Item = (&'static str, Value)>) -> serde_json::Map<String, Value> {
	pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	struct StubParser {
		exts: &'static [&'static str],
	}

	impl Parser for StubParser {
		fn name(&self) -> &'static str {
			"stub"
		}
		fn version(&self) -> u32 {
			1
		}
		fn extensions(&self) -> &'static [&'static str] {
			self.exts
		}
		fn node_types(&self) -> Vec<NodeTypeDefinition> {
			vec![]
		}
		fn parse(
			&self,
			_project_id: &str,
			_path: &Path,
			_bytes: &[u8],
			_existing_uuids: &HashMap<String, String>,
		) -> Result<ParseOutput, CoreError> {
			Ok(ParseOutput {
				nodes: vec![],
				relationships: vec![],
			})
		}
	}

	#[test]
	fn deterministic_uuid_is_stable_across_calls() {
		let a = deterministic_uuid(&["proj1", "Scope", "a.rs::foo"]);
		let b = deterministic_uuid(&["proj1", "Scope", "a.rs::foo"]);
		assert_eq!(a, b);
		assert_eq!(a.len(), 32);
	}

	#[test]
	fn deterministic_uuid_differs_on_any_part_change() {
		let a = deterministic_uuid(&["proj1", "Scope", "a.rs::foo"]);
		let b = deterministic_uuid(&["proj1", "Scope", "a.rs::bar"]);
		assert_ne!(a, b);
	}

	#[test]
	fn later_registration_wins_extension_collisions() {
		let mut registry = ParserRegistry::new();
		registry.register(Arc::new(StubParser { exts: &["md"] }));
		registry.register(Arc::new(StubParser { exts: &["md"] }));
		assert_eq!(registry.parsers.len(), 2);
		let resolved = registry.parser_for(Path::new("README.md")).unwrap();
		assert!(Arc::ptr_eq(&resolved, &registry.parsers[1]));
	}
}
