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

//! What the parser registry (spec §4.2) hands to the graph store for
//! index provisioning: the list of labels and, per label, which of the
//! three well-known embedding fields (`name`/`content`/`description`)
//! that label's parser extracts, plus the vector dimension to provision
//! for each (derived from the active embedding provider/model).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmbeddingField {
	Name,
	Content,
	Description,
}

impl EmbeddingField {
	pub fn column(self) -> &'static str {
		match self {
			EmbeddingField::Name => "embedding_name",
			EmbeddingField::Content => "embedding_content",
			EmbeddingField::Description => "embedding_description",
		}
	}

	pub fn hash_column(self) -> &'static str {
		match self {
			EmbeddingField::Name => "embedding_name_hash",
			EmbeddingField::Content => "embedding_content_hash",
			EmbeddingField::Description => "embedding_description_hash",
		}
	}
}

#[derive(Debug, Clone)]
pub struct EmbeddingFieldConfig {
	pub field: EmbeddingField,
	pub dimension: usize,
}

/// One parser-declared node type plus the embedding columns its table
/// needs provisioned. `table_name` is derived from `label` (lowercased,
/// pluralized by convention) so two labels never collide.
#[derive(Debug, Clone)]
pub struct LabelSchema {
	pub label: String,
	pub embedding_fields: Vec<EmbeddingFieldConfig>,
}

impl LabelSchema {
	pub fn table_name(&self) -> String {
		format!("nodes_{}", to_snake_case(&self.label))
	}
}

fn to_snake_case(label: &str) -> String {
	let mut out = String::with_capacity(label.len() + 4);
	for (i, ch) in label.chars().enumerate() {
		if ch.is_uppercase() {
			if i > 0 {
				out.push('_');
			}
			out.extend(ch.to_lowercase());
		} else {
			out.push(ch);
		}
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn table_name_snake_cases_the_label() {
		let schema = LabelSchema {
			label: "MarkdownSection".to_string(),
			embedding_fields: vec![],
		};
		assert_eq!(schema.table_name(), "nodes_markdown_section");
	}

	#[test]
	fn embedding_field_columns_are_stable() {
		assert_eq!(EmbeddingField::Name.column(), "embedding_name");
		assert_eq!(EmbeddingField::Content.hash_column(), "embedding_content_hash");
	}
}
