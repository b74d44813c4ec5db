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

//! The single application context (spec §9 design note), replacing the
//! cyclic project/registry/manager ownership graph and the global
//! singletons (lock set, node-state table, event bus) those would
//! otherwise require. `AppContext` is constructed once at startup and
//! threaded through tasks by reference (`Arc<AppContext>`); tests build a
//! fresh one per case with [`AppContext::for_testing`].

use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::error::CoreError;
use crate::events::EventBus;
use crate::locks::LockSet;
use crate::node_state::{new_state_table, NodeStateTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectType {
	Local,
}

/// Metadata for one registered project. Cross-references to a project
/// elsewhere in the crate are by `id` lookup through
/// [`ProjectRegistry::get`]; nothing holds a back-pointer to a project.
#[derive(Debug, Clone)]
pub struct ProjectHandle {
	pub id: String,
	pub path: PathBuf,
	pub display_name: String,
	pub project_type: ProjectType,
}

/// A single owning registry keyed by `projectId` (spec §9), resolving
/// parent/child containment: registering a path inside an existing
/// project returns that project's id, and registering a parent of
/// existing projects migrates them (handled by the ingestion
/// orchestrator, which owns the migration logic; this registry only
/// tracks the resulting id <-> path mapping).
#[derive(Default)]
pub struct ProjectRegistry {
	by_id: HashMap<String, ProjectHandle>,
}

impl ProjectRegistry {
	pub fn get(&self, project_id: &str) -> Option<ProjectHandle> {
		self.by_id.get(project_id).cloned()
	}

	/// The project whose path contains `path`, if any — the longest
	/// matching registered path wins.
	pub fn containing(&self, path: &Path) -> Option<ProjectHandle> {
		self.by_id
			.values()
			.filter(|handle| path.starts_with(&handle.path))
			.max_by_key(|handle| handle.path.as_os_str().len())
			.cloned()
	}

	/// Every project whose path is contained by (but not equal to) `path`.
	pub fn children_of(&self, path: &Path) -> Vec<ProjectHandle> {
		self.by_id
			.values()
			.filter(|handle| handle.path != path && handle.path.starts_with(path))
			.cloned()
			.collect()
	}

	pub fn insert(&mut self, handle: ProjectHandle) {
		self.by_id.insert(handle.id.clone(), handle);
	}

	pub fn remove(&mut self, project_id: &str) -> Option<ProjectHandle> {
		self.by_id.remove(project_id)
	}

	pub fn all(&self) -> Vec<ProjectHandle> {
		self.by_id.values().cloned().collect()
	}
}

/// Owns every piece of process-wide shared state this crate needs:
/// config, the two-lock set, the node-state table, the event bus and the
/// project registry. One instance lives for the process lifetime (or one
/// per test case); nothing in the crate reaches for a global/static
/// instead of a reference to this.
pub struct AppContext {
	pub config: Config,
	pub locks: LockSet,
	pub node_states: NodeStateTable,
	pub events: EventBus,
	pub projects: RwLock<ProjectRegistry>,
}

impl AppContext {
	pub fn new(config: Config) -> Arc<Self> {
		Arc::new(Self {
			config,
			locks: LockSet::new(),
			node_states: new_state_table(),
			events: EventBus::default(),
			projects: RwLock::new(ProjectRegistry::default()),
		})
	}

	/// A fresh context with default config, for tests (spec §9: "tests
	/// instantiate a fresh context per case").
	pub fn for_testing() -> Arc<Self> {
		Self::new(Config::default())
	}

	pub fn project(&self, project_id: &str) -> Result<ProjectHandle, CoreError> {
		self.projects
			.read()
			.get(project_id)
			.ok_or_else(|| CoreError::ProjectNotFound(project_id.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn handle(id: &str, path: &str) -> ProjectHandle {
		ProjectHandle {
			id: id.to_string(),
			path: PathBuf::from(path),
			display_name: id.to_string(),
			project_type: ProjectType::Local,
		}
	}

	#[test]
	fn containing_picks_the_longest_matching_path() {
		let mut registry = ProjectRegistry::default();
		registry.insert(handle("outer", "/proj"));
		registry.insert(handle("inner", "/proj/sub"));

		let found = registry.containing(Path::new("/proj/sub/file.rs")).unwrap();
		assert_eq!(found.id, "inner");
	}

	#[test]
	fn children_of_excludes_the_path_itself() {
		let mut registry = ProjectRegistry::default();
		registry.insert(handle("outer", "/proj"));
		registry.insert(handle("inner", "/proj/sub"));

		let children = registry.children_of(Path::new("/proj"));
		assert_eq!(children.len(), 1);
		assert_eq!(children[0].id, "inner");
	}

	#[test]
	fn project_lookup_fails_with_project_not_found() {
		let ctx = AppContext::for_testing();
		let err = ctx.project("missing").unwrap_err();
		assert!(matches!(err, CoreError::ProjectNotFound(_)));
	}

	#[test]
	fn testing_contexts_are_independent() {
		let a = AppContext::for_testing();
		let b = AppContext::for_testing();
		a.projects.write().insert(handle("p1", "/proj"));
		assert!(a.project("p1").is_ok());
		assert!(b.project("p1").is_err());
	}
}
