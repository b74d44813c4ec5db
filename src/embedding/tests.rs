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

#[cfg(test)]
mod embedding_tests {
	use crate::config::Config;
	use crate::embedding::types::{parse_provider_model, EmbeddingConfig};
	use crate::embedding::{
		count_tokens, create_embedding_provider_from_parts, split_texts_into_token_limited_batches,
		EmbeddingProviderType,
	};

	#[test]
	fn test_local_provider_creation() {
		let result = create_embedding_provider_from_parts(
			&EmbeddingProviderType::Local,
			"bge-small",
			"http://127.0.0.1:8080",
		);
		assert!(result.is_ok(), "Should be able to create a Local provider");
	}

	#[test]
	fn test_provider_model_parsing() {
		let test_cases = vec![
			("voyage:voyage-code-3", EmbeddingProviderType::Voyage, "voyage-code-3"),
			("jinaai:jina-embeddings-v3", EmbeddingProviderType::Jina, "jina-embeddings-v3"),
			("local:bge-small", EmbeddingProviderType::Local, "bge-small"),
			// Legacy format without provider falls back to Voyage
			("voyage-3.5-lite", EmbeddingProviderType::Voyage, "voyage-3.5-lite"),
		];

		for (input, expected_provider, expected_model) in test_cases {
			let (provider, model) = parse_provider_model(input);
			assert_eq!(
				provider, expected_provider,
				"Provider should match for input: {}",
				input
			);
			assert_eq!(model, expected_model, "Model should match for input: {}", input);
		}
	}

	#[test]
	fn test_default_config_format() {
		let config = Config::default();

		assert!(
			config.embedding.code_model.contains(':'),
			"Code model should use provider:model format"
		);
		assert!(
			config.embedding.text_model.contains(':'),
			"Text model should use provider:model format"
		);

		let (code_provider, _) = parse_provider_model(&config.embedding.code_model);
		let (text_provider, _) = parse_provider_model(&config.embedding.text_model);
		assert_eq!(code_provider, EmbeddingProviderType::Voyage);
		assert_eq!(text_provider, EmbeddingProviderType::Voyage);
	}

	#[test]
	fn test_embedding_config_methods() {
		let config = EmbeddingConfig {
			code_model: "voyage:voyage-code-3".to_string(),
			text_model: "voyage:voyage-3.5-lite".to_string(),
			local_base_url: "http://127.0.0.1:8080".to_string(),
		};

		let active_provider = config.get_active_provider();
		assert_eq!(active_provider, EmbeddingProviderType::Voyage);

		let dim = config
			.get_vector_dimension(&EmbeddingProviderType::Voyage, "voyage-code-3")
			.unwrap();
		assert_eq!(dim, 1024);

		let dim2 = config
			.get_vector_dimension(&EmbeddingProviderType::Voyage, "voyage-code-2")
			.unwrap();
		assert_eq!(dim2, 1536);
	}

	#[test]
	fn test_token_counting() {
		let text = "Hello world!";
		let token_count = count_tokens(text);
		assert!(token_count > 0, "Should count tokens for basic text");

		let empty_count = count_tokens("");
		assert_eq!(empty_count, 0, "Empty string should have 0 tokens");

		let long_text = "This is a longer text that should have more tokens than the simple hello world example.";
		let long_count = count_tokens(long_text);
		assert!(long_count > token_count, "Longer text should have more tokens");
	}

	#[test]
	fn test_token_limited_batching() {
		let texts = vec![
			"Short text".to_string(),
			"This is a medium length text that has more tokens".to_string(),
			"Another short one".to_string(),
			"This is a very long text that contains many words and should definitely exceed any reasonable token limit for a single batch when combined with other texts".to_string(),
			"Final text".to_string(),
		];

		let batches = split_texts_into_token_limited_batches(texts.clone(), 10, 20);
		assert!(batches.len() > 1, "Should create multiple batches with small token limit");

		let total_texts: usize = batches.iter().map(|b| b.len()).sum();
		assert_eq!(total_texts, texts.len(), "All texts should be included in batches");

		let single_batch = split_texts_into_token_limited_batches(texts.clone(), 100, 10000);
		assert_eq!(single_batch.len(), 1, "Should create single batch with large limits");
		assert_eq!(single_batch[0].len(), texts.len(), "Single batch should contain all texts");
	}

	#[test]
	fn test_config_has_token_limit() {
		let config = Config::default();
		assert!(
			config.index.embeddings_max_tokens_per_batch > 0,
			"Should have positive token limit"
		);
		assert_eq!(
			config.index.embeddings_max_tokens_per_batch, 100000,
			"Should have default token limit of 100000"
		);
	}
}
