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

//! The ingestion orchestrator (spec §4.3): reacts to filesystem events,
//! shapes them into a work queue, parses in batches, upserts into the
//! graph with change tracking, and advances node state machines.
//!
//! Grounded on `indexer/mod.rs`'s `NoindexWalker`/`index_files` batch
//! walk, `commands/watch.rs`'s debounced-watch wiring (moved into
//! [`watcher`]) and `watcher_config.rs`'s ignored-path list.

pub mod watcher;

use parking_lot::Mutex as SyncMutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::context::{AppContext, ProjectHandle, ProjectType};
use crate::error::CoreError;
use crate::events::IngestionEvent;
use crate::graph::GraphStore;
use crate::node_state::{NodeState, NodeStateRecord};
use crate::parser::{ParserRegistry, ParseOutput};
use crate::storage;
use crate::watcher_config::IGNORED_PATHS;

pub use watcher::{WatchHandle, WatchOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChangeKind {
	Created,
	Updated,
	Deleted,
}

/// Orchestrates ingestion for every registered project. Cheap to clone:
/// every field is an `Arc` (or wraps one), so a clone shares the same
/// watch handles and debounce state.
#[derive(Clone)]
pub struct Orchestrator {
	ctx: Arc<AppContext>,
	store: Arc<dyn GraphStore>,
	parsers: Arc<ParserRegistry>,
	watches: Arc<SyncMutex<HashMap<String, WatchHandle>>>,
	/// Per-path debounce generation counters for `queue_file_change`
	/// (spec §5: "for concurrent writers the later event wins, the queue
	/// is a map keyed by path").
	pending_edits: Arc<SyncMutex<HashMap<PathBuf, u64>>>,
}

impl Orchestrator {
	pub fn new(ctx: Arc<AppContext>, store: Arc<dyn GraphStore>, parsers: Arc<ParserRegistry>) -> Self {
		Self {
			ctx,
			store,
			parsers,
			watches: Arc::new(SyncMutex::new(HashMap::new())),
			pending_edits: Arc::new(SyncMutex::new(HashMap::new())),
		}
	}

	/// Idempotent; resolves parent/child containment (spec §4.3).
	pub async fn register_project(
		&self,
		path: &Path,
		project_type: ProjectType,
		display_name: Option<String>,
	) -> Result<String, CoreError> {
		let path = path
			.canonicalize()
			.map_err(|e| CoreError::BadInput {
				field: "path".to_string(),
				reason: format!("{e}"),
			})?;

		if let Some(existing) = self.ctx.projects.read().containing(&path) {
			return Ok(existing.id);
		}

		let project_id = storage::get_project_identifier(&path).map_err(|e| CoreError::BadInput {
			field: "path".to_string(),
			reason: format!("failed to compute project identifier: {e}"),
		})?;

		// Open Question 4: "touched-files" is reserved for the orphan subsystem.
		if project_id == self.ctx.config.orphan.synthetic_project_id {
			return Err(CoreError::Conflict {
				kind: "project id collides with the reserved synthetic project id".to_string(),
			});
		}

		let children = self.ctx.projects.read().children_of(&path);
		for child in &children {
			self.store
				.reassign_project(
					&child.id,
					&project_id,
					&child.path.to_string_lossy(),
					&path.to_string_lossy(),
				)
				.await?;
			self.ctx.projects.write().remove(&child.id);
		}

		let handle = ProjectHandle {
			id: project_id.clone(),
			path,
			display_name: display_name.unwrap_or_else(|| project_id.clone()),
			project_type,
		};
		self.ctx.projects.write().insert(handle);

		Ok(project_id)
	}

	/// Begins debounced watching for an already-registered project path
	/// (spec §4.3). Performs the initial full scan unless the project
	/// already has content and `skip_initial_sync` isn't explicitly
	/// `Some(false)`.
	pub async fn start_watching(&self, path: &Path, options: WatchOptions) -> Result<(), CoreError> {
		let handle = self.require_project(path)?;

		let already_has_content = self
			.ctx
			.node_states
			.read()
			.counters_for_project(&handle.id)
			.values()
			.sum::<usize>()
			> 0;
		let skip_initial = match options.skip_initial_sync {
			Some(false) => false,
			Some(true) => true,
			None => already_has_content,
		};
		if !skip_initial {
			self.full_scan(&handle).await?;
		}

		let mut ignored: Vec<String> = IGNORED_PATHS.iter().map(|s| s.to_string()).collect();
		ignored.extend(self.ctx.config.index.ignore_patterns.iter().cloned());
		ignored.extend(options.exclude.iter().cloned());

		let project_id = handle.id.clone();
		let this = self.clone();
		let project_path = handle.path.clone();
		let debounce_ms = self.ctx.config.index.change_debounce_ms;

		let watch_handle = watcher::spawn(&handle.path, debounce_ms, ignored, move |paths| {
			let this = this.clone();
			let project_id = project_id.clone();
			let project_path = project_path.clone();
			tokio::spawn(async move {
				if let Err(e) = this.apply_paths(&project_id, &project_path, paths).await {
					tracing::warn!("watch batch failed for project {project_id}: {e}");
				}
			});
		})?;

		self.watches.lock().insert(handle.id.clone(), watch_handle);
		Ok(())
	}

	pub fn stop_watching(&self, path: &Path) -> Result<(), CoreError> {
		let handle = self.require_project(path)?;
		self.watches.lock().remove(&handle.id);
		Ok(())
	}

	pub fn pause(&self, path: &Path) -> Result<(), CoreError> {
		let handle = self.require_project(path)?;
		if let Some(watch) = self.watches.lock().get(&handle.id) {
			watch.pause();
		}
		Ok(())
	}

	/// Resume flushes any events observed while paused (spec §4.3).
	pub async fn resume(&self, path: &Path) -> Result<(), CoreError> {
		let handle = self.require_project(path)?;
		let coalesced = self
			.watches
			.lock()
			.get(&handle.id)
			.map(|watch| watch.resume())
			.unwrap_or_default();
		if !coalesced.is_empty() {
			self.apply_paths(&handle.id, &handle.path, coalesced).await?;
		}
		Ok(())
	}

	/// Called by tool handlers that edit files directly; batches with a
	/// short debounce so many edits collapse into one parse pass (spec
	/// §4.3, default 500 ms per `IndexConfig::change_debounce_ms`).
	pub fn queue_file_change(&self, project_id: &str, path: PathBuf, kind: FileChangeKind) -> Result<(), CoreError> {
		self.ctx.project(project_id)?;

		let generation = {
			let mut pending = self.pending_edits.lock();
			let counter = pending.entry(path.clone()).or_insert(0);
			*counter += 1;
			*counter
		};

		let debounce_ms = self.ctx.config.index.change_debounce_ms;
		let this = self.clone();
		let project_id = project_id.to_string();

		tokio::spawn(async move {
			tokio::time::sleep(Duration::from_millis(debounce_ms)).await;
			let is_latest = this.pending_edits.lock().get(&path).copied() == Some(generation);
			if !is_latest {
				return;
			}
			this.pending_edits.lock().remove(&path);
			if let Err(e) = this.apply_change(&project_id, &path, kind).await {
				tracing::warn!("queued file change failed for {}: {e}", path.display());
			}
		});

		Ok(())
	}

	/// Deletes all nodes with `project_id == p.id` and removes the
	/// project (spec §4.3).
	pub async fn forget_project(&self, path: &Path) -> Result<(), CoreError> {
		let handle = self.require_project(path)?;
		self.watches.lock().remove(&handle.id);
		self.store.remove_project(&handle.id).await?;
		self.ctx.node_states.write().remove_project(&handle.id);
		self.ctx.projects.write().remove(&handle.id);
		self.ctx.events.publish(IngestionEvent::ProjectForgotten {
			project_id: handle.id,
		});
		Ok(())
	}

	/// Blocks until every debounced edit enqueued so far has been applied,
	/// up to `pending_edit_wait_secs` (spec §5: `waitForPendingEdits`).
	pub async fn wait_for_pending_edits(&self) -> Result<(), CoreError> {
		let deadline = Duration::from_secs(self.ctx.config.search.pending_edit_wait_secs);
		let start = tokio::time::Instant::now();
		loop {
			if self.pending_edits.lock().is_empty() {
				return Ok(());
			}
			if start.elapsed() >= deadline {
				return Err(CoreError::LockTimeout {
					lock: "pending_edits".to_string(),
					op: "wait_for_pending_edits".to_string(),
					held_by: "debounced edit queue".to_string(),
				});
			}
			tokio::time::sleep(Duration::from_millis(25)).await;
		}
	}

	fn require_project(&self, path: &Path) -> Result<ProjectHandle, CoreError> {
		self.ctx
			.projects
			.read()
			.containing(path)
			.ok_or_else(|| CoreError::ProjectNotFound(path.display().to_string()))
	}

	async fn full_scan(&self, project: &ProjectHandle) -> Result<(), CoreError> {
		let mut builder = ignore::WalkBuilder::new(&project.path);
		builder.hidden(true).git_ignore(true).git_global(true).git_exclude(true);
		builder.add_custom_ignore_filename(".noindex");

		let mut paths = Vec::new();
		for entry in builder.build().flatten() {
			if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
				paths.push(entry.into_path());
			}
		}

		self.apply_paths(&project.id, &project.path, paths).await
	}

	async fn apply_paths(&self, project_id: &str, project_root: &Path, paths: Vec<PathBuf>) -> Result<(), CoreError> {
		if paths.is_empty() {
			return Ok(());
		}

		let timeout = self.ctx.config.batch_lock_timeout_secs(paths.len());
		let _guard = self
			.ctx
			.locks
			.ingestion
			.acquire(format!("ingest batch of {} file(s)", paths.len()), timeout)
			.await?;

		self.ctx.events.publish(IngestionEvent::BatchStarted {
			project_id: project_id.to_string(),
			batch_size: paths.len(),
		});

		let mut indexed = 0usize;
		let mut skipped = 0usize;
		let mut failed = 0usize;

		for path in paths {
			let kind = if path.exists() {
				FileChangeKind::Updated
			} else {
				FileChangeKind::Deleted
			};
			match self
				.apply_change_locked(project_id, project_root, &path, kind)
				.await
			{
				Ok(true) => indexed += 1,
				Ok(false) => skipped += 1,
				Err(e) => {
					failed += 1;
					tracing::warn!("failed to ingest {}: {e}", path.display());
				}
			}
		}

		self.ctx.events.publish(IngestionEvent::BatchCompleted {
			project_id: project_id.to_string(),
			indexed,
			skipped,
			failed,
		});

		Ok(())
	}

	/// Acquires the ingestion lock for a single debounced/queued change.
	async fn apply_change(&self, project_id: &str, path: &Path, kind: FileChangeKind) -> Result<(), CoreError> {
		let project = self.ctx.project(project_id)?;
		let timeout = self.ctx.config.batch_lock_timeout_secs(1);
		let _guard = self
			.ctx
			.locks
			.ingestion
			.acquire(format!("queued change: {}", path.display()), timeout)
			.await?;
		self.apply_change_locked(project_id, &project.path, path, kind).await?;
		Ok(())
	}

	/// Parses `path`, diffs against the stored `(uuid -> contentHash)` map
	/// and upserts the result (spec §4.3 "change tracking"). Returns
	/// whether any node was actually written (`false` for an unchanged
	/// file, so callers can count it as skipped).
	async fn apply_change_locked(
		&self,
		project_id: &str,
		project_root: &Path,
		path: &Path,
		kind: FileChangeKind,
	) -> Result<bool, CoreError> {
		let relative = path.strip_prefix(project_root).unwrap_or(path);
		let relative_str = relative.to_string_lossy().to_string();

		if kind == FileChangeKind::Deleted {
			self.store.delete_nodes_by_path(project_id, &relative_str).await?;
			return Ok(true);
		}

		let Some(parser) = self.parsers.parser_for(relative) else {
			return Ok(false);
		};

		let bytes = match std::fs::read(path) {
			Ok(bytes) => bytes,
			Err(_) => {
				// Raced with a delete between the watcher event and this read.
				self.store.delete_nodes_by_path(project_id, &relative_str).await?;
				return Ok(true);
			}
		};

		let mut changed = false;
		for node_type in parser.node_types() {
			let existing_hashes = self
				.store
				.file_node_hashes(project_id, &relative_str, node_type.label)
				.await?;

			// Parsers derive uuids deterministically from (project_id, label,
			// stable key), so an empty map here still reproduces identical
			// uuids for unchanged fragments; `existing_uuids` exists for
			// parsers whose stable key isn't recoverable from content alone.
			let output: ParseOutput = parser.parse(project_id, relative, &bytes, &HashMap::new())?;

			let mut changed_nodes = Vec::new();
			for node in output.nodes.iter().filter(|n| n.label == node_type.label) {
				match existing_hashes.get(&node.uuid) {
					Some(hash) if hash == &node.content_hash => {}
					_ => changed_nodes.push(node.clone()),
				}
			}

			let fresh_uuids: std::collections::HashSet<&String> =
				output.nodes.iter().map(|n| &n.uuid).collect();
			let stale_uuids: Vec<String> = existing_hashes
				.keys()
				.filter(|uuid| !fresh_uuids.contains(uuid))
				.cloned()
				.collect();
			if !stale_uuids.is_empty() {
				self.store.delete_nodes_by_uuids(node_type.label, &stale_uuids).await?;
				changed = true;
			}

			if !changed_nodes.is_empty() {
				self.store.upsert_nodes(&changed_nodes).await?;
				self.store.upsert_relationships(&output.relationships).await?;
				changed = true;

				for node in &changed_nodes {
					let mut states = self.ctx.node_states.write();
					match states.get(&node.uuid) {
						None => states.insert(NodeStateRecord::new(&node.uuid, project_id, NodeState::Discovered)),
						Some(record) if record.state == NodeState::Ready => {
							let _ = states.transition(&node.uuid, NodeState::Dirty);
						}
						_ => {}
					}
					let _ = states.try_claim(&node.uuid);
					let _ = states.transition(&node.uuid, NodeState::Parsed);
					let _ = states.transition(&node.uuid, NodeState::Linked);
					self.ctx.events.publish(IngestionEvent::NodeTransitioned {
						project_id: project_id.to_string(),
						uuid: node.uuid.clone(),
						from: NodeState::Parsed,
						to: NodeState::Linked,
					});
				}
			}
		}

		Ok(changed)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::graph::schema::LabelSchema;
	use crate::graph::lance_store::LanceGraphStore;
	use crate::parser::markdown::MarkdownParser;
	use std::sync::Arc;

	async fn test_orchestrator(tmp: &tempfile::TempDir) -> Orchestrator {
		let ctx = AppContext::for_testing();
		let db_path = tmp.path().join("db");
		let store: Arc<dyn GraphStore> = Arc::new(LanceGraphStore::connect(db_path.to_str().unwrap()).await.unwrap());

		let mut parsers = ParserRegistry::new();
		parsers.register(Arc::new(MarkdownParser::new(2000)));
		let parsers = Arc::new(parsers);

		let schemas: Vec<LabelSchema> = parsers.label_schemas(1536, 1536);
		store.ensure_schema(&schemas).await.unwrap();

		Orchestrator::new(ctx, store, parsers)
	}

	#[tokio::test]
	async fn register_project_is_idempotent() {
		let tmp = tempfile::tempdir().unwrap();
		std::fs::write(tmp.path().join("a.md"), "# Hi\n").unwrap();
		let orchestrator = test_orchestrator(&tmp).await;

		let first = orchestrator
			.register_project(tmp.path(), ProjectType::Local, None)
			.await
			.unwrap();
		let second = orchestrator
			.register_project(tmp.path(), ProjectType::Local, None)
			.await
			.unwrap();
		assert_eq!(first, second);
	}

	#[tokio::test]
	async fn full_scan_ingests_a_markdown_file() {
		let tmp = tempfile::tempdir().unwrap();
		std::fs::write(tmp.path().join("a.md"), "# Title\n\nbody\n").unwrap();
		let orchestrator = test_orchestrator(&tmp).await;

		let project_id = orchestrator
			.register_project(tmp.path(), ProjectType::Local, None)
			.await
			.unwrap();
		orchestrator
			.start_watching(tmp.path(), WatchOptions::default())
			.await
			.unwrap();

		let hashes = orchestrator
			.store
			.file_node_hashes(&project_id, "a.md", "MarkdownDocument")
			.await
			.unwrap();
		assert_eq!(hashes.len(), 1);
	}

	#[tokio::test]
	async fn deleting_a_file_removes_its_nodes() {
		let tmp = tempfile::tempdir().unwrap();
		let file_path = tmp.path().join("a.md");
		std::fs::write(&file_path, "# Title\n\nbody\n").unwrap();
		let orchestrator = test_orchestrator(&tmp).await;

		let project_id = orchestrator
			.register_project(tmp.path(), ProjectType::Local, None)
			.await
			.unwrap();
		orchestrator
			.start_watching(tmp.path(), WatchOptions::default())
			.await
			.unwrap();

		std::fs::remove_file(&file_path).unwrap();
		orchestrator
			.apply_change(&project_id, &file_path, FileChangeKind::Deleted)
			.await
			.unwrap();

		let hashes = orchestrator
			.store
			.file_node_hashes(&project_id, "a.md", "MarkdownDocument")
			.await
			.unwrap();
		assert!(hashes.is_empty());
	}
}
