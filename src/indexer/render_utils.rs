/// Smart content truncation that preserves beginning and end when content is too long
/// Returns (truncated_content, was_truncated)
pub fn truncate_content_smartly(content: &str, max_characters: usize) -> (String, bool) {
	// If max_characters is 0, return full content (disabled)
	if max_characters == 0 {
		return (content.to_string(), false);
	}

	// If content fits within limit, return as-is
	if content.len() <= max_characters {
		return (content.to_string(), false);
	}

	let lines: Vec<&str> = content.lines().collect();

	// If it's just one long line, truncate it differently
	if lines.len() == 1 {
		let chars: Vec<char> = content.chars().collect();
		if chars.len() <= max_characters {
			return (content.to_string(), false);
		}

		// For single long line, show first and last parts
		let show_start = max_characters / 3;
		let show_end = max_characters / 3;
		let start_part: String = chars.iter().take(show_start).collect();
		let end_part: String = chars.iter().skip(chars.len() - show_end).collect();

		let truncated = format!(
			"{}\\n[... {} characters omitted ...]\\n{}",
			start_part.trim_end(),
			chars.len() - show_start - show_end,
			end_part.trim_start()
		);
		return (truncated, true);
	}

	// For multi-line content, work with lines
	let mut current_length = 0;
	let mut start_lines = Vec::new();
	let mut end_lines = Vec::new();

	// Reserve space for the middle message
	let middle_message_size = 50; // Approximate size of "[... X lines omitted ...]"
	let target_size = max_characters.saturating_sub(middle_message_size);
	let start_target = target_size / 2;
	let end_target = target_size / 2;

	// Collect start lines
	for line in &lines {
		let line_len = line.len() + 1; // +1 for newline
		if current_length + line_len <= start_target {
			start_lines.push(*line);
			current_length += line_len;
		} else {
			break;
		}
	}

	// Collect end lines (working backwards)
	current_length = 0;
	for line in lines.iter().rev() {
		let line_len = line.len() + 1; // +1 for newline
		if current_length + line_len <= end_target {
			end_lines.insert(0, *line);
			current_length += line_len;
		} else {
			break;
		}
	}

	// Ensure we don't overlap
	let start_count = start_lines.len();
	let end_count = end_lines.len();
	let total_lines = lines.len();

	if start_count + end_count >= total_lines {
		// If we would show most lines anyway, just show all
		return (content.to_string(), false);
	}

	let omitted_lines = total_lines - start_count - end_count;

	// Build the truncated content
	let mut result = String::new();

	// Add start lines
	for line in &start_lines {
		result.push_str(line);
		result.push('\n');
	}

	// Add truncation message
	if omitted_lines > 0 {
		result.push_str(&format!("[... {} more lines ...]\\n", omitted_lines));
	}

	// Add end lines
	for line in &end_lines {
		result.push_str(line);
		result.push('\n');
	}

	// Remove trailing newline
	if result.ends_with('\n') {
		result.pop();
	}

	(result, true)
}
