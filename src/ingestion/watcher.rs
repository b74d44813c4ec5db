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

//! Debounced filesystem watching (spec §4.3 `start_watching`), grounded
//! on `commands/watch.rs`'s `notify_debouncer_mini` wiring and
//! `watcher_config.rs`'s ignored-path list, generalized from one
//! whole-repo rescan-on-any-change into a per-project watch that reports
//! the changed paths and supports pause/resume (spec §5: "events
//! received while paused are coalesced and re-emitted on resume").

use notify_debouncer_mini::{new_debouncer, DebouncedEvent, Debouncer};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::CoreError;

#[derive(Debug, Clone, Default)]
pub struct WatchOptions {
	pub include: Vec<String>,
	pub exclude: Vec<String>,
	pub verbose: bool,
	/// `None` defers to "skip unless the project is empty" (spec §4.3's
	/// default); `Some(false)` forces a full scan regardless.
	pub skip_initial_sync: Option<bool>,
}

/// One active debounced watch. Dropping it stops the underlying OS watch.
pub struct WatchHandle {
	_debouncer: Debouncer<notify::RecommendedWatcher>,
	paused: Arc<AtomicBool>,
	coalesced: Arc<Mutex<Vec<PathBuf>>>,
}

impl WatchHandle {
	pub fn pause(&self) {
		self.paused.store(true, Ordering::SeqCst);
	}

	/// Resumes delivery and returns every path observed while paused, so
	/// the caller can flush them as a single batch.
	pub fn resume(&self) -> Vec<PathBuf> {
		self.paused.store(false, Ordering::SeqCst);
		std::mem::take(&mut *self.coalesced.lock())
	}
}

/// Starts a debounced watch over `root`, forwarding the changed paths
/// (filtered against `ignored_substrings`) to `on_change`. Paused watches
/// coalesce events into the handle's queue instead of forwarding them.
pub fn spawn(
	root: &Path,
	debounce_ms: u64,
	ignored_substrings: Vec<String>,
	mut on_change: impl FnMut(Vec<PathBuf>) + Send + 'static,
) -> Result<WatchHandle, CoreError> {
	let paused = Arc::new(AtomicBool::new(false));
	let coalesced = Arc::new(Mutex::new(Vec::new()));

	let paused_cb = paused.clone();
	let coalesced_cb = coalesced.clone();

	let mut debouncer = new_debouncer(
		Duration::from_millis(debounce_ms.max(1)),
		move |res: Result<Vec<DebouncedEvent>, notify::Error>| match res {
			Ok(events) => {
				let paths: Vec<PathBuf> = events
					.into_iter()
					.map(|e| e.path)
					.filter(|path| {
						let path_str = path.to_string_lossy();
						!ignored_substrings
							.iter()
							.any(|ignored| path_str.contains(ignored.as_str()))
					})
					.collect();
				if paths.is_empty() {
					return;
				}
				if paused_cb.load(Ordering::SeqCst) {
					coalesced_cb.lock().extend(paths);
				} else {
					on_change(paths);
				}
			}
			Err(e) => {
				tracing::warn!("file watcher error: {e:?}");
			}
		},
	)
	.map_err(|e| CoreError::BadInput {
		field: "path".to_string(),
		reason: format!("failed to start file watcher: {e}"),
	})?;

	debouncer
		.watcher()
		.watch(root, notify::RecursiveMode::Recursive)
		.map_err(|e| CoreError::BadInput {
			field: "path".to_string(),
			reason: format!("failed to watch {}: {e}", root.display()),
		})?;

	Ok(WatchHandle {
		_debouncer: debouncer,
		paused,
		coalesced,
	})
}
