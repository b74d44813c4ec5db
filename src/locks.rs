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

//! The two-lock concurrency model (spec §5): the **ingestion lock**
//! serializes operations that modify content nodes or their structural
//! relationships, and the **embedding lock** serializes operations that
//! compute or write vectors. Built on `tokio::sync::Mutex` rather than
//! `parking_lot` because lock holders cooperatively suspend at I/O
//! boundaries (store writes, provider HTTP calls) while holding the lock.

use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::timeout;

use crate::error::CoreError;

/// Held while `guard` is alive; records who's holding it for diagnostics
/// and for `CoreError::LockTimeout`'s `held_by` field.
pub struct LockGuard<'a> {
	_guard: MutexGuard<'a, String>,
}

/// A single named mutex plus the description of its current holder, so a
/// timed-out acquisition can report who it was waiting on.
pub struct NamedLock {
	name: &'static str,
	holder: Mutex<String>,
}

impl NamedLock {
	pub fn new(name: &'static str) -> Self {
		Self {
			name,
			holder: Mutex::new(String::new()),
		}
	}

	/// Acquire the lock, recording `description` as the new holder.
	/// `timeout_secs == 0` waits forever; otherwise returns
	/// `CoreError::LockTimeout` if the wait exceeds it.
	pub async fn acquire(
		&self,
		description: impl Into<String>,
		timeout_secs: u64,
	) -> Result<LockGuard<'_>, CoreError> {
		let description = description.into();

		let guard = if timeout_secs == 0 {
			self.holder.lock().await
		} else {
			match timeout(Duration::from_secs(timeout_secs), self.holder.lock()).await {
				Ok(guard) => guard,
				Err(_) => {
					let held_by = self.holder.try_lock().map(|g| g.clone()).unwrap_or_else(|_| {
						// Someone else holds it; best-effort snapshot isn't possible without
						// blocking, so report what we know.
						"unknown".to_string()
					});
					return Err(CoreError::LockTimeout {
						lock: self.name.to_string(),
						op: description,
						held_by,
					});
				}
			}
		};

		let mut guard = guard;
		*guard = description;

		Ok(LockGuard { _guard: guard })
	}
}

/// Owns the ingestion lock and the embedding lock. One instance is shared
/// (via `Arc`) across the orchestrator, the embedding engine and the search
/// planner for a given project.
pub struct LockSet {
	pub ingestion: NamedLock,
	pub embedding: NamedLock,
}

impl Default for LockSet {
	fn default() -> Self {
		Self {
			ingestion: NamedLock::new("ingestion"),
			embedding: NamedLock::new("embedding"),
		}
	}
}

impl LockSet {
	pub fn new() -> Self {
		Self::default()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;

	#[tokio::test]
	async fn sequential_acquisitions_succeed() {
		let lock = NamedLock::new("ingestion");
		{
			let _guard = lock.acquire("first", 0).await.unwrap();
		}
		let _guard = lock.acquire("second", 0).await.unwrap();
	}

	#[tokio::test]
	async fn contended_acquisition_times_out_with_lock_timeout_error() {
		let lock = Arc::new(NamedLock::new("embedding"));
		let held = lock.acquire("long-running batch", 0).await.unwrap();

		let waiter = lock.clone();
		let err = waiter.acquire("impatient caller", 1).await.unwrap_err();
		assert!(matches!(err, CoreError::LockTimeout { .. }));

		drop(held);
		// Once released, a fresh acquisition succeeds immediately.
		let _guard = lock.acquire("after release", 1).await.unwrap();
	}

	#[test]
	fn batch_timeout_scales_with_batch_count() {
		let config = crate::config::Config::default();
		assert_eq!(config.batch_lock_timeout_secs(1), 1200);
		assert_eq!(config.batch_lock_timeout_secs(50), 6000);
	}
}
