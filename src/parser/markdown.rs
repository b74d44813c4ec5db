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

//! Markdown parser plug-in: `MarkdownDocument` (one per file) containing
//! `MarkdownSection` children (spec §3 data model), built on the
//! teacher's `indexer/markdown_processor.rs` header-hierarchy chunker.

use serde_json::json;
use std::collections::HashMap;
use std::path::Path;

use crate::error::CoreError;
use crate::graph::schema::EmbeddingField;
use crate::graph::{ContentNode, Relationship};
use crate::indexer::markdown_processor::parse_document_hierarchy;

use super::{properties, ChunkingConfig, ContentKind, FieldExtractor, NodeTypeDefinition, ParseOutput, Parser};

pub struct MarkdownParser {
	pub chunk_size: usize,
}

impl MarkdownParser {
	pub fn new(chunk_size: usize) -> Self {
		Self { chunk_size }
	}
}

impl Parser for MarkdownParser {
	fn name(&self) -> &'static str {
		"markdown"
	}

	fn version(&self) -> u32 {
		1
	}

	fn extensions(&self) -> &'static [&'static str] {
		&["md", "markdown"]
	}

	fn node_types(&self) -> Vec<NodeTypeDefinition> {
		vec![
			NodeTypeDefinition {
				label: "MarkdownDocument",
				required_properties: vec!["path", "title"],
				additional_properties: vec![],
				content_hash_field: "content_hash",
				content_kind: ContentKind::Text,
				field_extractors: vec![FieldExtractor {
					field: Some(EmbeddingField::Name),
					property: "title",
				}],
				chunking_config: None,
			},
			NodeTypeDefinition {
				label: "MarkdownSection",
				required_properties: vec!["title", "own_content", "level"],
				additional_properties: vec!["context"],
				content_hash_field: "content_hash",
				content_kind: ContentKind::Text,
				field_extractors: vec![
					FieldExtractor {
						field: Some(EmbeddingField::Name),
						property: "title",
					},
					FieldExtractor {
						field: Some(EmbeddingField::Content),
						property: "own_content",
					},
				],
				chunking_config: Some(ChunkingConfig {
					chunk_size: self.chunk_size,
					chunk_overlap: 200,
				}),
			},
		]
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

		let document_title = contents
			.lines()
			.find(|line| line.trim_start().starts_with('#'))
			.map(|line| line.trim_start_matches('#').trim().to_string())
			.unwrap_or_else(|| {
				path.file_stem()
					.and_then(|s| s.to_str())
					.unwrap_or("untitled")
					.to_string()
			});

		let doc_key = format!("MarkdownDocument:{path_str}");
		let doc_uuid = existing_uuids
			.get(&doc_key)
			.cloned()
			.unwrap_or_else(|| super::deterministic_uuid(&[project_id, "MarkdownDocument", &path_str]));

		let doc_hash = crate::embedding::calculate_content_hash(&contents);
		let mut nodes = vec![ContentNode {
			uuid: doc_uuid.clone(),
			project_id: project_id.to_string(),
			label: "MarkdownDocument".to_string(),
			path: path_str.clone(),
			content_hash: doc_hash,
			properties: properties([("title", json!(document_title)), ("path", json!(path_str))]),
			embedding_name: None,
			embedding_content: None,
			embedding_description: None,
			embedding_name_hash: None,
			embedding_content_hash: None,
			embedding_description_hash: None,
			embedding_provider: None,
			embedding_model: None,
		}];

		let mut relationships = Vec::new();

		let hierarchy = parse_document_hierarchy(&contents);
		let chunks = hierarchy.bottom_up_chunking(self.chunk_size);

		let mut previous_section_uuid: Option<String> = None;
		for chunk in chunks {
			let section_key = format!("MarkdownSection:{path_str}:{}:{}", chunk.start_line, chunk.title);
			let section_uuid = existing_uuids
				.get(&section_key)
				.cloned()
				.unwrap_or_else(|| super::deterministic_uuid(&[project_id, "MarkdownSection", &section_key]));

			let content_hash = crate::embedding::calculate_content_hash(&chunk.storage_content);

			nodes.push(ContentNode {
				uuid: section_uuid.clone(),
				project_id: project_id.to_string(),
				label: "MarkdownSection".to_string(),
				path: path_str.clone(),
				content_hash,
				properties: properties([
					("title", json!(chunk.title)),
					("own_content", json!(chunk.storage_content)),
					("context", json!(chunk.context)),
					("level", json!(chunk.level)),
					("start_line", json!(chunk.start_line)),
					("end_line", json!(chunk.end_line)),
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

			relationships.push(Relationship {
				from_uuid: doc_uuid.clone(),
				rel_type: "CONTAINS".to_string(),
				to_uuid: section_uuid.clone(),
				properties: Default::default(),
			});

			if let Some(previous) = previous_section_uuid.replace(section_uuid.clone()) {
				relationships.push(Relationship {
					from_uuid: previous,
					rel_type: "NEXT_CHUNK".to_string(),
					to_uuid: section_uuid,
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
	fn parses_a_document_with_one_section_per_heading() {
		let parser = MarkdownParser::new(2000);
		let content = b"# Title\n\nIntro text.\n\n## Section A\n\nBody A.\n\n## Section B\n\nBody B.\n";
		let output = parser
			.parse("proj1", Path::new("docs/readme.md"), content, &HashMap::new())
			.unwrap();

		let document = output.nodes.iter().find(|n| n.label == "MarkdownDocument").unwrap();
		assert_eq!(document.properties["title"], "Title");

		let sections: Vec<_> = output.nodes.iter().filter(|n| n.label == "MarkdownSection").collect();
		assert!(!sections.is_empty());

		let contains_edges = output
			.relationships
			.iter()
			.filter(|r| r.rel_type == "CONTAINS")
			.count();
		assert_eq!(contains_edges, sections.len());
	}

	#[test]
	fn reparsing_unchanged_content_reuses_uuids() {
		let parser = MarkdownParser::new(2000);
		let content = b"# Title\n\n## Section A\n\nBody.\n";
		let first = parser
			.parse("proj1", Path::new("a.md"), content, &HashMap::new())
			.unwrap();

		let mut existing = HashMap::new();
		for node in &first.nodes {
			let key = if node.label == "MarkdownDocument" {
				format!("MarkdownDocument:{}", node.path)
			} else {
				format!(
					"MarkdownSection:{}:{}:{}",
					node.path, node.properties["start_line"], node.properties["title"]
				)
			};
			existing.insert(key, node.uuid.clone());
		}

		let second = parser
			.parse("proj1", Path::new("a.md"), content, &existing)
			.unwrap();

		let first_uuids: Vec<_> = first.nodes.iter().map(|n| &n.uuid).collect();
		let second_uuids: Vec<_> = second.nodes.iter().map(|n| &n.uuid).collect();
		assert_eq!(first_uuids, second_uuids);
	}
}
