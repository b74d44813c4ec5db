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

//! Paragraph-aware chunking for oversized embeddable text (spec §4.4
//! "chunking contract"): chunk 0 starts at char 0, each chunk targets
//! `chunk_size` characters with `overlap` characters of repeated context
//! carried into the next chunk, preferring to break on a blank-line
//! boundary over a mid-word cut the way `markdown_processor.rs`'s
//! `bottom_up_chunking` already prefers header boundaries for markdown.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
	pub content: String,
	pub start_char: usize,
	pub end_char: usize,
}

/// Splits `text` into chunks of approximately `chunk_size` characters,
/// each overlapping the previous by `overlap` characters. Returns a
/// single chunk covering the whole text when it already fits.
pub fn chunk_text_paragraph_aware(text: &str, chunk_size: usize, overlap: usize) -> Vec<TextChunk> {
	let chars: Vec<char> = text.chars().collect();
	if chars.is_empty() {
		return Vec::new();
	}
	if chars.len() <= chunk_size {
		return vec![TextChunk {
			content: text.to_string(),
			start_char: 0,
			end_char: chars.len(),
		}];
	}

	let mut boundaries = vec![0usize];
	for i in 0..chars.len().saturating_sub(1) {
		if chars[i] == '\n' && chars[i + 1] == '\n' {
			boundaries.push(i + 2);
		}
	}
	boundaries.push(chars.len());

	let slack = (chunk_size / 4).max(1);
	let mut chunks = Vec::new();
	let mut start = 0usize;

	while start < chars.len() {
		let target_end = (start + chunk_size).min(chars.len());
		let end = boundaries
			.iter()
			.copied()
			.filter(|&b| b > start)
			.min_by_key(|&b| (b as i64 - target_end as i64).abs())
			.filter(|&b| b == chars.len() || (b as i64 - target_end as i64).unsigned_abs() as usize <= slack)
			.unwrap_or(target_end);

		chunks.push(TextChunk {
			content: chars[start..end].iter().collect(),
			start_char: start,
			end_char: end,
		});

		if end >= chars.len() {
			break;
		}
		start = end.saturating_sub(overlap).max(start + 1);
	}

	chunks
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn text_under_chunk_size_is_a_single_chunk() {
		let chunks = chunk_text_paragraph_aware("short text", 2000, 200);
		assert_eq!(chunks.len(), 1);
		assert_eq!(chunks[0].start_char, 0);
		assert_eq!(chunks[0].end_char, "short text".chars().count());
	}

	#[test]
	fn chunk_zero_starts_at_char_zero() {
		let long_text = "word ".repeat(2000);
		let chunks = chunk_text_paragraph_aware(&long_text, 2000, 200);
		assert!(chunks.len() > 1);
		assert_eq!(chunks[0].start_char, 0);
	}

	#[test]
	fn consecutive_chunks_overlap() {
		let long_text = "word ".repeat(2000);
		let chunks = chunk_text_paragraph_aware(&long_text, 2000, 200);
		for pair in chunks.windows(2) {
			assert!(pair[1].start_char < pair[0].end_char, "expected overlap between consecutive chunks");
		}
	}

	#[test]
	fn prefers_paragraph_boundary_near_target() {
		let mut text = "a".repeat(1000);
		text.push_str("\n\n");
		text.push_str(&"b".repeat(1000));
		let chunks = chunk_text_paragraph_aware(&text, 1010, 0);
		assert_eq!(chunks[0].end_char, 1002);
	}
}
