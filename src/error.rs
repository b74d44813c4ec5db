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

//! Tagged error enum returned at every public core operation boundary.
//!
//! Internal plumbing keeps using `anyhow::Result` the way the rest of this
//! crate does; `CoreError` exists at the seams that external callers (the
//! CLI/MCP layer, tests) actually match on.

use crate::node_state::NodeState;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
	#[error("core is not initialized")]
	NotInitialized,

	#[error("graph store is unavailable: {0}")]
	StoreUnavailable(String),

	#[error("failed to parse {file}: {reason}")]
	ParseFailure { file: String, reason: String },

	#[error("embedding provider is unavailable: {0}")]
	ProviderUnavailable(String),

	#[error("embedding provider rate limited: {0}")]
	ProviderRateLimited(String),

	#[error("invalid state transition for {uuid}: {from:?} -> {to:?}")]
	InvalidState {
		uuid: String,
		from: NodeState,
		to: NodeState,
	},

	#[error("lock timeout acquiring {lock} for {op} (held by: {held_by})")]
	LockTimeout {
		lock: String,
		op: String,
		held_by: String,
	},

	#[error("project not found: {0}")]
	ProjectNotFound(String),

	#[error("conflict: {kind}")]
	Conflict { kind: String },

	#[error("bad input for {field}: {reason}")]
	BadInput { field: String, reason: String },
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Helper for the programmer-error policy in spec §7: `InvalidState`
/// transitions panic in debug builds and surface as `Err` in release.
pub fn invalid_state(uuid: impl Into<String>, from: NodeState, to: NodeState) -> CoreError {
	let err = CoreError::InvalidState {
		uuid: uuid.into(),
		from,
		to,
	};
	if cfg!(debug_assertions) {
		panic!("{err}");
	}
	err
}
