use anyhow::Result;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Get the system-wide storage directory for RagForge.
/// Following XDG Base Directory specification on Unix-like systems
/// and proper conventions on other systems
pub fn get_system_storage_dir() -> Result<PathBuf> {
	let base_dir = if cfg!(target_os = "macos") {
		// macOS: ~/.local/share/ragforge
		dirs::home_dir()
			.ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
			.join(".local")
			.join("share")
			.join("ragforge")
	} else if cfg!(target_os = "windows") {
		// Windows: %APPDATA%/ragforge
		dirs::data_dir()
			.ok_or_else(|| anyhow::anyhow!("Unable to determine data directory"))?
			.join("ragforge")
	} else {
		// Linux and other Unix-like: ~/.local/share/ragforge or $XDG_DATA_HOME/ragforge
		if let Ok(xdg_data_home) = std::env::var("XDG_DATA_HOME") {
			PathBuf::from(xdg_data_home).join("ragforge")
		} else {
			dirs::home_dir()
				.ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
				.join(".local")
				.join("share")
				.join("ragforge")
		}
	};

	if !base_dir.exists() {
		fs::create_dir_all(&base_dir)?;
	}

	Ok(base_dir)
}

/// Get the project identifier for a given directory.
/// First tries to get the git remote URL, falls back to a path hash.
pub fn get_project_identifier(project_path: &Path) -> Result<String> {
	if let Ok(git_remote) = get_git_remote_url(project_path) {
		let mut hasher = Sha256::new();
		hasher.update(git_remote.as_bytes());
		let result = hasher.finalize();
		return Ok(format!("{:x}", result)[..16].to_string());
	}

	let absolute_path = project_path.canonicalize().or_else(|_| {
		if project_path.is_absolute() {
			Ok(project_path.to_path_buf())
		} else {
			std::env::current_dir().map(|cwd| cwd.join(project_path))
		}
	})?;

	let mut hasher = Sha256::new();
	hasher.update(absolute_path.to_string_lossy().as_bytes());
	let result = hasher.finalize();
	Ok(format!("{:x}", result)[..16].to_string())
}

/// Try to get the Git remote URL for a project
fn get_git_remote_url(project_path: &Path) -> Result<String> {
	let output = Command::new("git")
		.arg("-C")
		.arg(project_path)
		.arg("remote")
		.arg("get-url")
		.arg("origin")
		.output()?;

	if output.status.success() {
		let url = String::from_utf8(output.stdout)?.trim().to_string();

		if !url.is_empty() {
			return Ok(normalize_git_url(&url));
		}
	}

	Err(anyhow::anyhow!("No git remote found"))
}

/// Normalize git URL to be consistent regardless of protocol
/// e.g., https://github.com/user/repo.git and git@github.com:user/repo.git
/// both become github.com/user/repo
fn normalize_git_url(url: &str) -> String {
	let url = url.trim();

	let url = if let Some(stripped) = url.strip_suffix(".git") {
		stripped
	} else {
		url
	};

	// Handle SSH format: git@host:user/repo
	if url.contains('@') && url.contains(':') && !url.contains("://") {
		if let Some(at_pos) = url.find('@') {
			if let Some(colon_pos) = url[at_pos..].find(':') {
				let host = &url[at_pos + 1..at_pos + colon_pos];
				let path = &url[at_pos + colon_pos + 1..];
				return format!("{}/{}", host, path);
			}
		}
	}

	// Handle HTTPS format: https://host/user/repo
	if url.starts_with("http://") || url.starts_with("https://") {
		if let Some(scheme_end) = url.find("://") {
			return url[scheme_end + 3..].to_string();
		}
	}

	url.to_string()
}

/// Get the storage path for a specific project
pub fn get_project_storage_path(project_path: &Path) -> Result<PathBuf> {
	let system_dir = get_system_storage_dir()?;
	let project_id = get_project_identifier(project_path)?;

	Ok(system_dir.join(project_id))
}

/// Get the database path for a specific project
pub fn get_project_database_path(project_path: &Path) -> Result<PathBuf> {
	let project_storage = get_project_storage_path(project_path)?;
	Ok(project_storage.join("storage"))
}

/// Get the config path for a specific project (local to project)
/// Config remains local to projects for project-specific settings
pub fn get_project_config_path(project_path: &Path) -> Result<PathBuf> {
	Ok(project_path.join(".ragforge"))
}

/// Get the system-wide cache directory for shared resources
pub fn get_system_cache_dir() -> Result<PathBuf> {
	let cache_dir = if cfg!(target_os = "macos") {
		// macOS: ~/.cache/ragforge
		dirs::home_dir()
			.ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
			.join(".cache")
			.join("ragforge")
	} else if cfg!(target_os = "windows") {
		// Windows: %LOCALAPPDATA%/ragforge/cache
		dirs::cache_dir()
			.ok_or_else(|| anyhow::anyhow!("Unable to determine cache directory"))?
			.join("ragforge")
	} else {
		// Linux and other Unix-like: ~/.cache/ragforge or $XDG_CACHE_HOME/ragforge
		if let Ok(xdg_cache_home) = std::env::var("XDG_CACHE_HOME") {
			PathBuf::from(xdg_cache_home).join("ragforge")
		} else {
			dirs::home_dir()
				.ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
				.join(".cache")
				.join("ragforge")
		}
	};

	if !cache_dir.exists() {
		fs::create_dir_all(&cache_dir)?;
	}

	Ok(cache_dir)
}

/// Get the system-wide cache directory for downloaded/cached embedding
/// provider artifacts (e.g. a local provider's on-disk model cache).
pub fn get_embedding_cache_dir() -> Result<PathBuf> {
	let cache_dir = get_system_cache_dir()?.join("embeddings");

	if !cache_dir.exists() {
		fs::create_dir_all(&cache_dir)?;
	}

	Ok(cache_dir)
}

/// Ensure the project storage directory exists
pub fn ensure_project_storage_exists(project_path: &Path) -> Result<PathBuf> {
	let storage_path = get_project_storage_path(project_path)?;

	if !storage_path.exists() {
		fs::create_dir_all(&storage_path)?;
	}

	Ok(storage_path)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::env;

	#[test]
	fn test_normalize_git_url() {
		assert_eq!(
			normalize_git_url("https://github.com/user/repo.git"),
			"github.com/user/repo"
		);
		assert_eq!(
			normalize_git_url("https://github.com/user/repo"),
			"github.com/user/repo"
		);
		assert_eq!(
			normalize_git_url("git@github.com:user/repo.git"),
			"github.com/user/repo"
		);
		assert_eq!(
			normalize_git_url("git@github.com:user/repo"),
			"github.com/user/repo"
		);
		assert_eq!(normalize_git_url("local/path/to/repo"), "local/path/to/repo");
	}

	#[test]
	fn test_project_identifier() {
		let temp_dir = env::temp_dir().join("test_ragforge");
		let _ = fs::create_dir_all(&temp_dir);

		let id1 = get_project_identifier(&temp_dir).unwrap();
		let id2 = get_project_identifier(&temp_dir).unwrap();

		assert_eq!(id1, id2);
		assert_eq!(id1.len(), 16);

		let _ = fs::remove_dir_all(&temp_dir);
	}

	#[test]
	fn test_system_storage_dir() {
		let storage_dir = get_system_storage_dir().unwrap();
		assert!(storage_dir.to_string_lossy().contains("ragforge"));
		assert!(storage_dir.is_absolute());
	}

	#[test]
	fn test_system_cache_dir() {
		let cache_dir = get_system_cache_dir().unwrap();
		assert!(cache_dir.to_string_lossy().contains("ragforge"));
		assert!(cache_dir.is_absolute());

		let storage_dir = get_system_storage_dir().unwrap();
		assert_ne!(cache_dir, storage_dir);
	}

	#[test]
	fn test_embedding_cache_dir() {
		let embedding_cache = get_embedding_cache_dir().unwrap();
		assert!(embedding_cache.to_string_lossy().contains("ragforge"));
		assert!(embedding_cache.to_string_lossy().contains("embeddings"));
		assert!(embedding_cache.is_absolute());
	}
}
