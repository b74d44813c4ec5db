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

//! `Scope` parser plug-in: one node per meaningful tree-sitter region
//! (function, struct, trait, ...) in a source file, grounded on the
//! teacher's `indexer/code_region_extractor.rs` region extraction and
//! `indexer/languages/{rust,python}.rs` language implementations. Only
//! Rust and Python are wired up as the two kept ABI examples; the
//! teacher's much larger language roster is left unregistered (see
//! DESIGN.md).

use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tree_sitter::Parser as TsParser;

use crate::error::CoreError;
use crate::graph::schema::EmbeddingField;
use crate::graph::{ContentNode, Relationship};
use crate::indexer::code_region_extractor::{extract_meaningful_regions, CodeRegion};
use crate::indexer::languages::{self, Language};

use super::{properties, ChunkingConfig, ContentKind, FieldExtractor, NodeTypeDefinition, ParseOutput, Parser};

/// One tree-sitter-backed language front-end for the `Scope` label.
/// `tree_sitter::Parser` is `!Sync`, so each instance owns its own
/// behind a mutex rather than sharing one across worker threads.
pub struct ScopeParser {
	language_name: &'static str,
	extensions: &'static [&'static str],
	parser: Mutex<TsParser>,
}

impl ScopeParser {
	pub fn rust() -> Result<Self, CoreError> {
		Self::for_language("rust", &["rs"])
	}

	pub fn python() -> Result<Self, CoreError> {
		Self::for_language("python", &["py"])
	}

	fn for_language(language_name: &'static str, extensions: &'static [&'static str]) -> Result<Self, CoreError> {
		let lang_impl = languages::get_language(language_name).ok_or_else(|| CoreError::BadInput {
			field: "language".to_string(),
			reason: format!("no tree-sitter grammar registered for '{language_name}'"),
		})?;
		let mut parser = TsParser::new();
		parser
			.set_language(&lang_impl.get_ts_language())
			.map_err(|e| CoreError::BadInput {
				field: "language".to_string(),
				reason: format!("failed to load tree-sitter grammar for '{language_name}': {e}"),
			})?;
		Ok(Self {
			language_name,
			extensions,
			parser: Mutex::new(parser),
		})
	}

	fn language_impl(&self) -> Box<dyn Language> {
		languages::get_language(self.language_name).expect("validated at construction")
	}
}

impl Parser for ScopeParser {
	fn name(&self) -> &'static str {
		self.language_name
	}

	fn version(&self) -> u32 {
		1
	}

	fn extensions(&self) -> &'static [&'static str] {
		self.extensions
	}

	fn node_types(&self) -> Vec<NodeTypeDefinition> {
		vec![NodeTypeDefinition {
			label: "Scope",
			required_properties: vec!["name", "kind", "language", "content"],
			additional_properties: vec!["symbols"],
			content_hash_field: "content_hash",
			content_kind: ContentKind::Code,
			field_extractors: vec![
				FieldExtractor {
					field: Some(EmbeddingField::Name),
					property: "name",
				},
				FieldExtractor {
					field: Some(EmbeddingField::Content),
					property: "content",
				},
			],
			chunking_config: Some(ChunkingConfig {
				chunk_size: 3000,
				chunk_overlap: 0,
			}),
		}]
	}

	fn parse(
		&self,
		project_id: &str,
		path: &Path,
		bytes: &[u8],
		existing_uuids: &HashMap<String, String>,
	) -> Result<ParseOutput, CoreError> {
		let contents = String::from_utf8_lossy(bytes);
		let path_str = path.display().to_string();

		let tree = {
			let mut parser = self.parser.lock().expect("tree-sitter parser mutex poisoned");
			parser.parse(contents.as_ref(), None).ok_or_else(|| CoreError::ParseFailure {
				file: path_str.clone(),
				reason: "tree-sitter failed to produce a parse tree".to_string(),
			})?
		};

		let lang_impl = self.language_impl();
		let mut regions: Vec<CodeRegion> = Vec::new();
		extract_meaningful_regions(tree.root_node(), &contents, lang_impl.as_ref(), &mut regions);

		let mut nodes = Vec::with_capacity(regions.len());
		let mut relationships = Vec::new();
		let mut previous_uuid: Option<String> = None;

		for region in &regions {
			let name = region.symbols.first().cloned().unwrap_or_else(|| region.node_kind.clone());
			let key = format!("Scope:{path_str}:{}:{}", region.node_kind, name);
			let uuid = existing_uuids
				.get(&key)
				.cloned()
				.unwrap_or_else(|| super::deterministic_uuid(&[project_id, "Scope", &key]));

			let content_hash = crate::embedding::calculate_content_hash(&region.content);

			nodes.push(ContentNode {
				uuid: uuid.clone(),
				project_id: project_id.to_string(),
				label: "Scope".to_string(),
				path: path_str.clone(),
				content_hash,
				properties: properties([
					("name", json!(name)),
					("kind", json!(region.node_kind)),
					("language", json!(self.language_name)),
					("content", json!(region.content)),
					("symbols", json!(region.symbols)),
					("start_line", json!(region.start_line)),
					("end_line", json!(region.end_line)),
				]),
				embedding_name: None,
				embedding_content: None,
				embedding_description: None,
				embedding_name_hash: None,
				embedding_content_hash: None,
				embedding_description_hash: None,
				embedding_provider: None,
				embedding_model: None,
			});

			if let Some(previous) = previous_uuid.replace(uuid.clone()) {
				relationships.push(Relationship {
					from_uuid: previous,
					rel_type: "NEXT_CHUNK".to_string(),
					to_uuid: uuid,
					properties: Default::default(),
				});
			}
		}

		Ok(ParseOutput { nodes, relationships })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn extracts_one_scope_per_function() {
		let parser = ScopeParser::rust().unwrap();
		let source = b"fn alpha() {}\n\nfn beta() {}\n";
		let output = parser
			.parse("proj1", Path::new("lib.rs"), source, &HashMap::new())
			.unwrap();

		let names: Vec<_> = output
			.nodes
			.iter()
			.map(|n| n.properties["name"].as_str().unwrap().to_string())
			.collect();
		assert!(names.contains(&"alpha".to_string()));
		assert!(names.contains(&"beta".to_string()));
	}

	#[test]
	fn reparsing_unchanged_file_reuses_uuids() {
		let parser = ScopeParser::python().unwrap();
		let source = b"def alpha():\n    pass\n";
		let first = parser
			.parse("proj1", Path::new("mod.py"), source, &HashMap::new())
			.unwrap();

		let mut existing = HashMap::new();
		for node in &first.nodes {
			let key = format!(
				"Scope:{}:{}:{}",
				node.path, node.properties["kind"], node.properties["name"]
			);
			existing.insert(key, node.uuid.clone());
		}

		let second = parser
			.parse("proj1", Path::new("mod.py"), source, &existing)
			.unwrap();

		let first_uuids: Vec<_> = first.nodes.iter().map(|n| &n.uuid).collect();
		let second_uuids: Vec<_> = second.nodes.iter().map(|n| &n.uuid).collect();
		assert_eq!(first_uuids, second_uuids);
	}
}
