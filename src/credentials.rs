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

//! `.env`-style credentials, loaded via `dotenvy` and kept separate from
//! the TOML config (spec §6): API keys are secrets that don't belong in a
//! file `Config::save` rewrites wholesale, and `dotenvy` already sits in
//! the teacher's dependency graph unused in the retrieved source.
//!
//! Provider code (`embedding/provider/{jina,voyage}.rs`) reads
//! `JINA_API_KEY`/`VOYAGE_API_KEY` directly from the process environment;
//! this module's job is only to make sure a project-local `.env` has been
//! loaded into that environment before those reads happen.

use std::path::Path;

/// Load `.env` from `project_path` if present, falling back to the
/// current working directory. Missing files are not an error: a
/// deployment may provide these vars directly in the process
/// environment instead.
pub fn load_credentials(project_path: &Path) -> anyhow::Result<()> {
	let project_env = project_path.join(".env");
	if project_env.exists() {
		dotenvy::from_path(&project_env)?;
		return Ok(());
	}

	// Best-effort: a `.env` in the current directory, if any. dotenvy
	// returns `Err` when no file is found at all, which isn't a real
	// error for us.
	match dotenvy::dotenv() {
		Ok(_) | Err(dotenvy::Error::Io(_)) => Ok(()),
		Err(err) => Err(err.into()),
	}
}

/// Names of the environment variables the embedding providers read.
/// Used by `register_project` to fail fast with a clear
/// `CoreError::BadInput` instead of a provider HTTP 401 deep in a batch.
pub const JINA_API_KEY: &str = "JINA_API_KEY";
pub const VOYAGE_API_KEY: &str = "VOYAGE_API_KEY";

/// Whether the environment has a non-empty credential for `provider`.
/// `Local` has no credential (it's the self-hosted no-auth archetype).
pub fn has_credential(provider: &crate::embedding::types::EmbeddingProviderType) -> bool {
	use crate::embedding::types::EmbeddingProviderType;
	match provider {
		EmbeddingProviderType::Jina => env_var_is_set(JINA_API_KEY),
		EmbeddingProviderType::Voyage => env_var_is_set(VOYAGE_API_KEY),
		EmbeddingProviderType::Local => true,
	}
}

fn env_var_is_set(name: &str) -> bool {
	std::env::var(name).map(|v| !v.is_empty()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::embedding::types::EmbeddingProviderType;

	#[test]
	fn local_provider_never_needs_a_credential() {
		assert!(has_credential(&EmbeddingProviderType::Local));
	}

	#[test]
	fn missing_env_var_reports_no_credential() {
		std::env::remove_var(VOYAGE_API_KEY);
		assert!(!has_credential(&EmbeddingProviderType::Voyage));
	}

	#[test]
	fn loading_from_a_nonexistent_project_falls_back_without_erroring() {
		let dir = std::env::temp_dir().join("ragforge_credentials_test_missing_env");
		let _ = std::fs::create_dir_all(&dir);
		assert!(load_credentials(&dir).is_ok());
		let _ = std::fs::remove_dir_all(&dir);
	}
}
