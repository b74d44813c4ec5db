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

//! The orphan / touched-files subsystem (spec §4.6): files outside any
//! registered project are tracked under the synthetic `"touched-files"`
//! project so that reads via file tools and results from full-project
//! searches share one content store.
//!
//! Grounded on `ingestion/mod.rs`'s read-before-write change-tracking
//! shape (here applied to a single `File`/`Directory` node instead of a
//! parsed batch) and `indexer/graphrag/import_resolver.rs::ImportResolver`,
//! repurposed from "resolve an import to a file path for GraphRAG" to
//! "resolve an import to a file path for a `PENDING_IMPORT` edge".

use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::context::AppContext;
use crate::error::CoreError;
use crate::events::IngestionEvent;
use crate::graph::schema::LabelSchema;
use crate::graph::{ContentNode, GraphStore, Relationship};
use crate::indexer::graphrag::import_resolver::ImportResolver;
use crate::node_state::{NodeState, NodeStateRecord};
use crate::parser::{deterministic_uuid, properties};

pub const FILE_LABEL: &str = "File";
pub const DIRECTORY_LABEL: &str = "Directory";

const REL_CONTAINS: &str = "CONTAINS";
const REL_PENDING_IMPORT: &str = "PENDING_IMPORT";
const REL_CONSUMES: &str = "CONSUMES";
const REL_BELONGS_TO: &str = "BELONGS_TO";

/// `File`/`Directory` aren't parser-declared node types — the orphan
/// subsystem and the ingestion orchestrator create them directly — so
/// their schemas are supplied here rather than derived from
/// `ParserRegistry::label_schemas`. Neither carries embedding fields;
/// they exist to anchor structure, not to be searched semantically.
pub fn structural_label_schemas() -> Vec<LabelSchema> {
	vec![
		LabelSchema {
			label: FILE_LABEL.to_string(),
			embedding_fields: vec![],
		},
		LabelSchema {
			label: DIRECTORY_LABEL.to_string(),
			embedding_fields: vec![],
		},
	]
}

/// What to transition a touched file's state to, per spec §4.6: only
/// `discovered|mentioned -> parsing` is caller-requested; every other
/// edge (`missing -> discovered`, `mentioned -> discovered`) is implicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TouchInitialState {
	#[default]
	Discovered,
	Parsing,
}

#[derive(Debug, Clone)]
pub struct TouchResult {
	pub created: bool,
	/// `None` means the file had no prior record at all ("missing").
	pub previous_state: Option<NodeState>,
	pub new_state: NodeState,
}

/// Tracks orphan/touched files: `touch_file`, `create_mentioned_file`,
/// `resolve_pending_imports`, `migrate_orphans_to_project` (spec §4.6).
#[derive(Clone)]
pub struct OrphanTracker {
	ctx: Arc<AppContext>,
	store: Arc<dyn GraphStore>,
}

impl OrphanTracker {
	pub fn new(ctx: Arc<AppContext>, store: Arc<dyn GraphStore>) -> Self {
		Self { ctx, store }
	}

	fn synthetic_project_id(&self) -> String {
		self.ctx.config.orphan.synthetic_project_id.clone()
	}

	/// The project that already claims `path`, or the synthetic orphan
	/// project if none does.
	fn project_id_for(&self, path: &Path) -> String {
		self.ctx
			.projects
			.read()
			.containing(path)
			.map(|handle| handle.id)
			.unwrap_or_else(|| self.synthetic_project_id())
	}

	/// Orphan-project nodes store the absolute path (there's no project
	/// root to make them relative to); real-project nodes store the path
	/// relative to their project root, matching `ingestion::Orchestrator`'s
	/// convention. `migrate_orphans_to_project` is exactly the operation
	/// that converts a node from the former convention to the latter.
	fn path_for_project(&self, project_id: &str, absolute_path: &str) -> String {
		if project_id == self.synthetic_project_id() {
			return absolute_path.to_string();
		}
		if let Some(handle) = self.ctx.projects.read().get(project_id) {
			if let Ok(relative) = Path::new(absolute_path).strip_prefix(&handle.path) {
				return relative.to_string_lossy().to_string();
			}
		}
		absolute_path.to_string()
	}

	/// File/Directory uuids are derived from the absolute path regardless
	/// of which project currently claims them, so a later
	/// `migrate_orphans_to_project` call preserves identity (and with it
	/// embeddings and hashes), per spec §4.6.
	fn file_uuid(absolute_path: &str) -> String {
		deterministic_uuid(&[FILE_LABEL, absolute_path])
	}

	fn directory_uuid(absolute_path: &str) -> String {
		deterministic_uuid(&[DIRECTORY_LABEL, absolute_path])
	}

	/// `touch_file(path, {initialState}) -> {created, previousState,
	/// newState}` (spec §4.6).
	pub async fn touch_file(
		&self,
		path: &Path,
		initial_state: TouchInitialState,
	) -> Result<TouchResult, CoreError> {
		let absolute = path.canonicalize().map_err(|e| CoreError::BadInput {
			field: "path".to_string(),
			reason: format!("{e}"),
		})?;
		let absolute_str = absolute.to_string_lossy().to_string();
		let project_id = self.project_id_for(&absolute);
		let uuid = Self::file_uuid(&absolute_str);

		self.ensure_directory_chain(&project_id, &absolute).await?;

		let existing = self.store.get_node_by_uuid(FILE_LABEL, &uuid).await?;
		let previous_state = existing
			.as_ref()
			.and_then(|_| self.ctx.node_states.read().get(&uuid))
			.map(|record| record.state);
		let created = existing.is_none();

		let requested_parsing = initial_state == TouchInitialState::Parsing;
		let new_state = match previous_state {
			None => NodeState::Discovered,
			Some(NodeState::Mentioned) if requested_parsing => NodeState::Parsing,
			Some(NodeState::Mentioned) => NodeState::Discovered,
			Some(NodeState::Discovered) if requested_parsing => NodeState::Parsing,
			Some(other) => other,
		};

		let access_count = existing
			.as_ref()
			.and_then(|node| node.properties.get("accessCount"))
			.and_then(|value| value.as_u64())
			.unwrap_or(0)
			+ 1;

		let node = ContentNode {
			uuid: uuid.clone(),
			project_id: project_id.clone(),
			label: FILE_LABEL.to_string(),
			path: self.path_for_project(&project_id, &absolute_str),
			content_hash: existing.as_ref().map(|n| n.content_hash.clone()).unwrap_or_default(),
			properties: properties([
				("absolutePath", json!(absolute_str)),
				("accessCount", json!(access_count)),
				("lastAccessed", json!(chrono::Utc::now().to_rfc3339())),
			]),
			embedding_name: existing.as_ref().and_then(|n| n.embedding_name.clone()),
			embedding_content: existing.as_ref().and_then(|n| n.embedding_content.clone()),
			embedding_description: existing.as_ref().and_then(|n| n.embedding_description.clone()),
			embedding_name_hash: existing.as_ref().and_then(|n| n.embedding_name_hash.clone()),
			embedding_content_hash: existing.as_ref().and_then(|n| n.embedding_content_hash.clone()),
			embedding_description_hash: existing.as_ref().and_then(|n| n.embedding_description_hash.clone()),
			embedding_provider: existing.as_ref().and_then(|n| n.embedding_provider.clone()),
			embedding_model: existing.as_ref().and_then(|n| n.embedding_model.clone()),
		};
		self.store.upsert_nodes(&[node]).await?;

		match previous_state {
			None => self
				.ctx
				.node_states
				.write()
				.insert(NodeStateRecord::new(&uuid, &project_id, NodeState::Discovered)),
			Some(old) if old != new_state => {
				let _ = self.ctx.node_states.write().transition(&uuid, new_state);
				self.ctx.events.publish(IngestionEvent::NodeTransitioned {
					project_id: project_id.clone(),
					uuid: uuid.clone(),
					from: old,
					to: new_state,
				});
			}
			_ => {}
		}

		Ok(TouchResult {
			created,
			previous_state,
			new_state,
		})
	}

	/// `create_mentioned_file(target, {importer, symbols, importPath})`
	/// (spec §4.6). Idempotent: re-running with the same arguments leaves
	/// an already-discovered/linked/ready target's state untouched, and
	/// `upsert_relationships`' merge-by-key semantics make the
	/// `PENDING_IMPORT` edge itself idempotent too.
	pub async fn create_mentioned_file(
		&self,
		target_absolute_path: &str,
		importer_absolute_path: &str,
		symbols: Vec<String>,
		import_path: String,
		scope_uuid: Option<String>,
	) -> Result<(), CoreError> {
		let target_path = Path::new(target_absolute_path);
		let project_id = self.project_id_for(target_path);
		let uuid = Self::file_uuid(target_absolute_path);

		if self.store.get_node_by_uuid(FILE_LABEL, &uuid).await?.is_none() {
			self.ensure_directory_chain(&project_id, target_path).await?;
			let node = ContentNode {
				uuid: uuid.clone(),
				project_id: project_id.clone(),
				label: FILE_LABEL.to_string(),
				path: self.path_for_project(&project_id, target_absolute_path),
				content_hash: String::new(),
				properties: properties([
					("absolutePath", json!(target_absolute_path)),
					("accessCount", json!(0)),
				]),
				embedding_name: None,
				embedding_content: None,
				embedding_description: None,
				embedding_name_hash: None,
				embedding_content_hash: None,
				embedding_description_hash: None,
				embedding_provider: None,
				embedding_model: None,
			};
			self.store.upsert_nodes(&[node]).await?;
			self.ctx
				.node_states
				.write()
				.insert(NodeStateRecord::new(&uuid, &project_id, NodeState::Mentioned));
		}

		let importer_uuid = Self::file_uuid(importer_absolute_path);
		let mut edge_properties = properties([
			("importPath", json!(import_path)),
			("symbols", json!(symbols)),
		]);
		if let Some(scope_uuid) = scope_uuid {
			edge_properties.insert("scopeUuid".to_string(), json!(scope_uuid));
		}

		self.store
			.upsert_relationships(&[Relationship {
				from_uuid: importer_uuid,
				rel_type: REL_PENDING_IMPORT.to_string(),
				to_uuid: uuid,
				properties: edge_properties,
			}])
			.await?;

		Ok(())
	}

	/// `resolve_pending_imports(absolutePath)` (spec §4.6): invoked when a
	/// file transitions into `linked`. Matches each incoming
	/// `PENDING_IMPORT` edge's `symbols` against the target file's `Scope`
	/// nodes (`name` or `exportedAs`), `MERGE`s a `CONSUMES` edge from the
	/// importing scope, and deletes only the edges that resolved — an
	/// edge whose symbol hasn't been defined yet stays pending for the
	/// next pass.
	pub async fn resolve_pending_imports(&self, absolute_path: &str) -> Result<usize, CoreError> {
		let project_id = self.project_id_for(Path::new(absolute_path));
		let file_uuid = Self::file_uuid(absolute_path);

		let pending = self.store.relationships_to(&file_uuid, REL_PENDING_IMPORT).await?;
		if pending.is_empty() {
			return Ok(0);
		}

		let relative_path = self.path_for_project(&project_id, absolute_path);
		let target_scopes = self.store.nodes_by_path(&project_id, "Scope", &relative_path).await?;

		let mut resolved = 0usize;
		for edge in &pending {
			let symbols: Vec<String> = edge
				.properties
				.get("symbols")
				.and_then(|v| v.as_array())
				.map(|values| values.iter().filter_map(|v| v.as_str().map(String::from)).collect())
				.unwrap_or_default();
			if symbols.is_empty() {
				continue;
			}

			let matched: Vec<&ContentNode> = target_scopes
				.iter()
				.filter(|scope| {
					let name = scope.properties.get("name").and_then(|v| v.as_str());
					let exported_as = scope.properties.get("exportedAs").and_then(|v| v.as_str());
					name.map(|n| symbols.iter().any(|s| s == n)).unwrap_or(false)
						|| exported_as.map(|n| symbols.iter().any(|s| s == n)).unwrap_or(false)
				})
				.collect();

			if matched.is_empty() {
				continue;
			}

			// Falls back to the importer File's uuid (file-level
			// granularity) when no specific importing scope was recorded.
			let source_uuid = edge
				.properties
				.get("scopeUuid")
				.and_then(|v| v.as_str())
				.map(str::to_string)
				.unwrap_or_else(|| edge.from_uuid.clone());

			let consumes: Vec<Relationship> = matched
				.iter()
				.map(|scope| Relationship {
					from_uuid: source_uuid.clone(),
					rel_type: REL_CONSUMES.to_string(),
					to_uuid: scope.uuid.clone(),
					properties: properties([(
						"importPath",
						edge.properties.get("importPath").cloned().unwrap_or(serde_json::Value::Null),
					)]),
				})
				.collect();
			self.store.upsert_relationships(&consumes).await?;
			self.store
				.delete_relationship(&edge.from_uuid, REL_PENDING_IMPORT, &edge.to_uuid)
				.await?;
			resolved += 1;
		}

		Ok(resolved)
	}

	/// `migrate_orphans_to_project(projectId, projectRoot)` (spec §4.6):
	/// when a project is registered over files already tracked as
	/// orphans, rewrite their `projectId` and paths, anchor them to the
	/// project with `BELONGS_TO` edges, convert now-intra-project
	/// `PENDING_IMPORT` edges to `CONSUMES`, and prune any `Directory`
	/// ancestor left with no remaining children in the synthetic project.
	pub async fn migrate_orphans_to_project(&self, project_id: &str, project_root: &Path) -> Result<usize, CoreError> {
		let synthetic = self.synthetic_project_id();
		let root_str = project_root.to_string_lossy().to_string();

		let migrated = self
			.store
			.migrate_path_prefix(&synthetic, project_id, &root_str, "")
			.await?;
		if migrated.is_empty() {
			return Ok(0);
		}

		let root_dir_uuid = Self::directory_uuid(&root_str);
		let mut belongs_to = Vec::new();
		for node in &migrated {
			if node.uuid == root_dir_uuid {
				continue;
			}
			belongs_to.push(Relationship {
				from_uuid: node.uuid.clone(),
				rel_type: REL_BELONGS_TO.to_string(),
				to_uuid: root_dir_uuid.clone(),
				properties: Default::default(),
			});
		}
		if !belongs_to.is_empty() {
			self.store.upsert_relationships(&belongs_to).await?;
		}

		for node in migrated.iter().filter(|n| n.label == FILE_LABEL) {
			let pending = self.store.relationships_to(&node.uuid, REL_PENDING_IMPORT).await?;
			for edge in pending {
				self.store
					.upsert_relationships(&[Relationship {
						from_uuid: edge.from_uuid.clone(),
						rel_type: REL_CONSUMES.to_string(),
						to_uuid: edge.to_uuid.clone(),
						properties: edge.properties.clone(),
					}])
					.await?;
				self.store
					.delete_relationship(&edge.from_uuid, REL_PENDING_IMPORT, &edge.to_uuid)
					.await?;
			}
		}

		self.prune_orphan_directories(&synthetic).await?;

		Ok(migrated.len())
	}

	/// Ensures a `Directory` node chain exists from `path`'s parent up to
	/// the owning project's root (or the filesystem root for orphan
	/// files), `CONTAINS`-linking each level to the one below it.
	async fn ensure_directory_chain(&self, project_id: &str, absolute_path: &Path) -> Result<(), CoreError> {
		let stop_at = self.ctx.projects.read().get(project_id).map(|h| h.path);
		let mut child_uuid = Self::file_uuid(&absolute_path.to_string_lossy());
		let mut current = absolute_path.parent().map(PathBuf::from);

		while let Some(dir) = current {
			let dir_str = dir.to_string_lossy().to_string();
			let dir_uuid = Self::directory_uuid(&dir_str);

			if self.store.get_node_by_uuid(DIRECTORY_LABEL, &dir_uuid).await?.is_none() {
				let node = ContentNode {
					uuid: dir_uuid.clone(),
					project_id: project_id.to_string(),
					label: DIRECTORY_LABEL.to_string(),
					path: self.path_for_project(project_id, &dir_str),
					content_hash: String::new(),
					properties: properties([("absolutePath", json!(dir_str))]),
					embedding_name: None,
					embedding_content: None,
					embedding_description: None,
					embedding_name_hash: None,
					embedding_content_hash: None,
					embedding_description_hash: None,
					embedding_provider: None,
					embedding_model: None,
				};
				self.store.upsert_nodes(&[node]).await?;
			}

			self.store
				.upsert_relationships(&[Relationship {
					from_uuid: dir_uuid.clone(),
					rel_type: REL_CONTAINS.to_string(),
					to_uuid: child_uuid,
					properties: Default::default(),
				}])
				.await?;

			let reached_project_root = stop_at.as_ref().map(|root| root == &dir).unwrap_or(false);
			if reached_project_root || dir.parent().is_none() {
				break;
			}

			child_uuid = dir_uuid;
			current = dir.parent().map(PathBuf::from);
		}

		Ok(())
	}

	/// Deletes `Directory` nodes under the synthetic project with no
	/// remaining `File`/`Directory` child, looping until a pass removes
	/// nothing so a cascade of now-empty ancestors is fully collapsed.
	async fn prune_orphan_directories(&self, synthetic: &str) -> Result<(), CoreError> {
		loop {
			let directories = self.store.nodes_for_project(synthetic, DIRECTORY_LABEL).await?;
			let files = self.store.nodes_for_project(synthetic, FILE_LABEL).await?;

			let mut stale = Vec::new();
			for dir in &directories {
				let prefix = format!("{}/", dir.path.trim_end_matches('/'));
				let has_file_child = files.iter().any(|f| f.path.starts_with(&prefix));
				let has_dir_child = directories
					.iter()
					.any(|other| other.uuid != dir.uuid && other.path.starts_with(&prefix));
				if !has_file_child && !has_dir_child {
					stale.push(dir.uuid.clone());
				}
			}

			if stale.is_empty() {
				return Ok(());
			}
			self.store.delete_nodes_by_uuids(DIRECTORY_LABEL, &stale).await?;
		}
	}
}

/// Resolves a relative import statement found in `source_file` to an
/// absolute path among `all_files` (also absolute), or `None` if it
/// doesn't resolve to any known file. Thin wrapper around
/// `ImportResolver`, which works in whatever path convention its caller
/// feeds it.
pub fn resolve_import_target(import_path: &str, source_file: &str, all_files: &[String]) -> Option<String> {
	let language = language_for_extension(Path::new(source_file))?;
	let mut resolver = ImportResolver::new(all_files);
	resolver.resolve_import(import_path, source_file, &language)
}

fn language_for_extension(path: &Path) -> Option<String> {
	match path.extension().and_then(|e| e.to_str())? {
		"rs" => Some("rust".to_string()),
		"js" | "mjs" => Some("javascript".to_string()),
		"ts" | "tsx" => Some("typescript".to_string()),
		"py" => Some("python".to_string()),
		"go" => Some("go".to_string()),
		"php" => Some("php".to_string()),
		"cpp" | "cc" | "cxx" | "c++" => Some("cpp".to_string()),
		"c" | "h" => Some("c".to_string()),
		"rb" => Some("ruby".to_string()),
		"sh" | "bash" => Some("bash".to_string()),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::graph::lance_store::LanceGraphStore;
	use crate::parser::ParserRegistry;

	async fn test_tracker(tmp: &tempfile::TempDir) -> OrphanTracker {
		let ctx = AppContext::for_testing();
		let db_path = tmp.path().join("db");
		let store: Arc<dyn GraphStore> = Arc::new(LanceGraphStore::connect(db_path.to_str().unwrap()).await.unwrap());

		let mut schemas = structural_label_schemas();
		schemas.extend(ParserRegistry::new().label_schemas(1536, 1536));
		schemas.push(LabelSchema {
			label: "Scope".to_string(),
			embedding_fields: vec![],
		});
		store.ensure_schema(&schemas).await.unwrap();

		OrphanTracker::new(ctx, store)
	}

	#[tokio::test]
	async fn touch_file_on_a_brand_new_path_transitions_missing_to_discovered() {
		let tmp = tempfile::tempdir().unwrap();
		let file_path = tmp.path().join("a/b/c.ts");
		std::fs::create_dir_all(file_path.parent().unwrap()).unwrap();
		std::fs::write(&file_path, "export function foo() {}").unwrap();

		let tracker = test_tracker(&tmp).await;
		let result = tracker
			.touch_file(&file_path, TouchInitialState::Discovered)
			.await
			.unwrap();

		assert!(result.created);
		assert_eq!(result.previous_state, None);
		assert_eq!(result.new_state, NodeState::Discovered);
	}

	#[tokio::test]
	async fn touch_file_increments_access_count_on_repeat_visits() {
		let tmp = tempfile::tempdir().unwrap();
		let file_path = tmp.path().join("a.ts");
		std::fs::write(&file_path, "export function foo() {}").unwrap();

		let tracker = test_tracker(&tmp).await;
		tracker
			.touch_file(&file_path, TouchInitialState::Discovered)
			.await
			.unwrap();
		tracker
			.touch_file(&file_path, TouchInitialState::Discovered)
			.await
			.unwrap();

		let absolute = file_path.canonicalize().unwrap();
		let uuid = OrphanTracker::file_uuid(&absolute.to_string_lossy());
		let node = tracker.store.get_node_by_uuid(FILE_LABEL, &uuid).await.unwrap().unwrap();
		assert_eq!(node.properties.get("accessCount").and_then(|v| v.as_u64()), Some(2));
	}

	#[tokio::test]
	async fn create_mentioned_file_is_idempotent() {
		let tmp = tempfile::tempdir().unwrap();
		let importer = tmp.path().join("b.ts");
		let target = tmp.path().join("a.ts");
		std::fs::write(&importer, "import {foo} from './a';").unwrap();
		std::fs::write(&target, "export function foo() {}").unwrap();

		let tracker = test_tracker(&tmp).await;
		let importer_abs = importer.canonicalize().unwrap().to_string_lossy().to_string();
		let target_abs = target.canonicalize().unwrap().to_string_lossy().to_string();

		for _ in 0..2 {
			tracker
				.create_mentioned_file(
					&target_abs,
					&importer_abs,
					vec!["foo".to_string()],
					"./a".to_string(),
					None,
				)
				.await
				.unwrap();
		}

		let uuid = OrphanTracker::file_uuid(&target_abs);
		let node = tracker.store.get_node_by_uuid(FILE_LABEL, &uuid).await.unwrap().unwrap();
		assert_eq!(node.properties.get("absolutePath").and_then(|v| v.as_str()), Some(target_abs.as_str()));

		let pending = tracker
			.store
			.relationships_to(&uuid, REL_PENDING_IMPORT)
			.await
			.unwrap();
		assert_eq!(pending.len(), 1);
	}

	#[tokio::test]
	async fn resolve_pending_imports_matches_symbol_and_deletes_the_edge() {
		let tmp = tempfile::tempdir().unwrap();
		let importer = tmp.path().join("b.ts");
		let target = tmp.path().join("a.ts");
		std::fs::write(&importer, "import {foo} from './a';").unwrap();
		std::fs::write(&target, "export function foo() {}").unwrap();

		let tracker = test_tracker(&tmp).await;
		let importer_abs = importer.canonicalize().unwrap().to_string_lossy().to_string();
		let target_abs = target.canonicalize().unwrap().to_string_lossy().to_string();

		tracker
			.create_mentioned_file(
				&target_abs,
				&importer_abs,
				vec!["foo".to_string()],
				"./a".to_string(),
				None,
			)
			.await
			.unwrap();

		// Simulate the target file having been parsed into a matching Scope.
		let scope_uuid = deterministic_uuid(&["touched-files", "Scope", &format!("{target_abs}::foo")]);
		let scope = ContentNode {
			uuid: scope_uuid,
			project_id: "touched-files".to_string(),
			label: "Scope".to_string(),
			path: target_abs.clone(),
			content_hash: "h".to_string(),
			properties: properties([("name", json!("foo"))]),
			embedding_name: None,
			embedding_content: None,
			embedding_description: None,
			embedding_name_hash: None,
			embedding_content_hash: None,
			embedding_description_hash: None,
			embedding_provider: None,
			embedding_model: None,
		};
		tracker.store.upsert_nodes(&[scope]).await.unwrap();

		let resolved = tracker.resolve_pending_imports(&target_abs).await.unwrap();
		assert_eq!(resolved, 1);

		let target_uuid = OrphanTracker::file_uuid(&target_abs);
		let pending = tracker
			.store
			.relationships_to(&target_uuid, REL_PENDING_IMPORT)
			.await
			.unwrap();
		assert!(pending.is_empty());

		let importer_uuid = OrphanTracker::file_uuid(&importer_abs);
		let consumes = tracker.store.relationships_to(
			&deterministic_uuid(&["touched-files", "Scope", &format!("{target_abs}::foo")]),
			REL_CONSUMES,
		)
		.await
		.unwrap();
		assert_eq!(consumes.len(), 1);
		assert_eq!(consumes[0].from_uuid, importer_uuid);
	}
}
