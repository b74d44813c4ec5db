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

//! The node state machine that governs every content node's progression
//! from first discovery to "ready for search" (spec §4.1).
//!
//! Grounded on `state.rs`'s `SharedState` pattern (a `parking_lot`-guarded
//! shared struct queried by dashboards), generalized from one flat
//! indexing-progress counter into a per-node state with validated
//! transitions and per-project counters.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeState {
	Discovered,
	Parsing,
	Parsed,
	Linked,
	Ready,
	Dirty,
	Failed,
	Mentioned,
}

impl NodeState {
	/// Whether `self -> to` is one of the allowed edges in spec §4.1.
	///
	/// `discovered -> parsing -> parsed -> linked -> ready`;
	/// `ready -> dirty -> parsing -> ...`; any state -> `failed`;
	/// `mentioned -> discovered` (first direct access).
	pub fn can_transition(self, to: NodeState) -> bool {
		use NodeState::*;
		if to == Failed {
			return true;
		}
		matches!(
			(self, to),
			(Discovered, Parsing)
				| (Parsing, Parsed)
				| (Parsed, Linked)
				| (Linked, Ready)
				| (Ready, Dirty)
				| (Dirty, Parsing)
				| (Mentioned, Discovered)
				| (Mentioned, Parsing)
				| (Failed, Parsing)
		)
	}
}

/// Tracks the current state of one node plus the bookkeeping columns
/// spec §4.1 says every transition stamps.
#[derive(Debug, Clone)]
pub struct NodeStateRecord {
	pub uuid: String,
	pub project_id: String,
	pub state: NodeState,
	pub state_changed_at: chrono::DateTime<chrono::Utc>,
	pub embedded_at: Option<chrono::DateTime<chrono::Utc>>,
	pub embedding_provider: Option<String>,
	pub embedding_model: Option<String>,
	pub last_error: Option<String>,
}

impl NodeStateRecord {
	pub fn new(uuid: impl Into<String>, project_id: impl Into<String>, state: NodeState) -> Self {
		Self {
			uuid: uuid.into(),
			project_id: project_id.into(),
			state,
			state_changed_at: chrono::Utc::now(),
			embedded_at: None,
			embedding_provider: None,
			embedding_model: None,
			last_error: None,
		}
	}
}

/// Claim token returned by [`NodeStateTable::try_claim`]. Only the holder of
/// this token may perform the follow-on `parsing -> parsed` transition; it
/// proves the discovered/mentioned -> parsing edge was taken atomically.
pub struct ClaimToken {
	pub uuid: String,
}

/// In-process table of node states, shared across the orchestrator, the
/// embedding engine and the search planner. The atomic claim
/// (`discovered|mentioned -> parsing`) is implemented as a single
/// compare-and-swap under the table's write lock so only one worker can
/// ever win a race on the same file.
#[derive(Default)]
pub struct NodeStateTableInner {
	states: HashMap<String, NodeStateRecord>,
}

pub type NodeStateTable = Arc<RwLock<NodeStateTableInner>>;

pub fn new_state_table() -> NodeStateTable {
	Arc::new(RwLock::new(NodeStateTableInner::default()))
}

impl NodeStateTableInner {
	pub fn insert(&mut self, record: NodeStateRecord) {
		self.states.insert(record.uuid.clone(), record);
	}

	pub fn get(&self, uuid: &str) -> Option<NodeStateRecord> {
		self.states.get(uuid).cloned()
	}

	/// Atomically claim a file out of `discovered`/`mentioned`/`failed` into
	/// `parsing`. Returns `None` if the node is missing or already claimed
	/// by a concurrent worker (i.e. not in a claimable state).
	pub fn try_claim(&mut self, uuid: &str) -> Option<ClaimToken> {
		let record = self.states.get_mut(uuid)?;
		if !record.state.can_transition(NodeState::Parsing) {
			return None;
		}
		record.state = NodeState::Parsing;
		record.state_changed_at = chrono::Utc::now();
		Some(ClaimToken {
			uuid: uuid.to_string(),
		})
	}

	/// Apply a validated transition, stamping `state_changed_at` and the
	/// embedding bookkeeping columns when relevant. Panics in debug builds
	/// (returns `Err` in release) on a disallowed edge, per spec §7's
	/// `InvalidState` policy.
	pub fn transition(
		&mut self,
		uuid: &str,
		to: NodeState,
	) -> Result<(), crate::error::CoreError> {
		let record = self
			.states
			.get_mut(uuid)
			.ok_or_else(|| crate::error::CoreError::ProjectNotFound(uuid.to_string()))?;
		if !record.state.can_transition(to) {
			return Err(crate::error::invalid_state(uuid, record.state, to));
		}
		record.state = to;
		record.state_changed_at = chrono::Utc::now();
		Ok(())
	}

	pub fn mark_ready(&mut self, uuid: &str, provider: &str, model: &str) -> Result<(), crate::error::CoreError> {
		self.transition(uuid, NodeState::Ready)?;
		if let Some(record) = self.states.get_mut(uuid) {
			record.embedded_at = Some(chrono::Utc::now());
			record.embedding_provider = Some(provider.to_string());
			record.embedding_model = Some(model.to_string());
		}
		Ok(())
	}

	pub fn mark_failed(&mut self, uuid: &str, error: impl Into<String>) {
		if let Some(record) = self.states.get_mut(uuid) {
			record.state = NodeState::Failed;
			record.state_changed_at = chrono::Utc::now();
			record.last_error = Some(error.into());
		}
	}

	/// Every uuid in `project_id` currently in `state`, for the embedding
	/// engine's collect phase (spec §4.4 step 1: "filtered to nodes in
	/// state `linked`").
	pub fn uuids_in_state(&self, project_id: &str, state: NodeState) -> std::collections::HashSet<String> {
		self.states
			.values()
			.filter(|record| record.project_id == project_id && record.state == state)
			.map(|record| record.uuid.clone())
			.collect()
	}

	/// Per-project counts by state, for dashboards (spec §4.1).
	pub fn counters_for_project(&self, project_id: &str) -> HashMap<NodeState, usize> {
		let mut counters = HashMap::new();
		for record in self.states.values() {
			if record.project_id == project_id {
				*counters.entry(record.state).or_insert(0) += 1;
			}
		}
		counters
	}

	pub fn remove(&mut self, uuid: &str) {
		self.states.remove(uuid);
	}

	pub fn remove_project(&mut self, project_id: &str) {
		self.states.retain(|_, record| record.project_id != project_id);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn allowed_transitions_follow_the_happy_path() {
		assert!(NodeState::Discovered.can_transition(NodeState::Parsing));
		assert!(NodeState::Parsing.can_transition(NodeState::Parsed));
		assert!(NodeState::Parsed.can_transition(NodeState::Linked));
		assert!(NodeState::Linked.can_transition(NodeState::Ready));
		assert!(NodeState::Ready.can_transition(NodeState::Dirty));
		assert!(NodeState::Dirty.can_transition(NodeState::Parsing));
		assert!(NodeState::Mentioned.can_transition(NodeState::Discovered));
	}

	#[test]
	fn any_state_can_fail() {
		for state in [
			NodeState::Discovered,
			NodeState::Parsing,
			NodeState::Parsed,
			NodeState::Linked,
			NodeState::Ready,
			NodeState::Dirty,
			NodeState::Mentioned,
		] {
			assert!(state.can_transition(NodeState::Failed));
		}
	}

	#[test]
	fn regressions_outside_the_dirty_path_are_forbidden() {
		assert!(!NodeState::Ready.can_transition(NodeState::Parsed));
		assert!(!NodeState::Linked.can_transition(NodeState::Discovered));
		assert!(!NodeState::Parsed.can_transition(NodeState::Discovered));
	}

	#[test]
	fn claim_is_exclusive_across_concurrent_workers() {
		let mut table = NodeStateTableInner::default();
		table.insert(NodeStateRecord::new("u1", "p1", NodeState::Discovered));

		let first = table.try_claim("u1");
		assert!(first.is_some());
		assert_eq!(table.get("u1").unwrap().state, NodeState::Parsing);

		// A second worker racing on the same uuid must not also win the claim.
		let second = table.try_claim("u1");
		assert!(second.is_none());
	}

	#[test]
	fn counters_are_scoped_per_project() {
		let mut table = NodeStateTableInner::default();
		table.insert(NodeStateRecord::new("a", "proj-1", NodeState::Ready));
		table.insert(NodeStateRecord::new("b", "proj-1", NodeState::Ready));
		table.insert(NodeStateRecord::new("c", "proj-2", NodeState::Dirty));

		let counters = table.counters_for_project("proj-1");
		assert_eq!(counters.get(&NodeState::Ready), Some(&2));
		assert_eq!(counters.get(&NodeState::Dirty), None);
	}
}
