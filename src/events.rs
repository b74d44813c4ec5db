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

//! Explicit event types on a bounded channel (spec §9 design note),
//! replacing coroutine-style chained callbacks (`afterIngestion`,
//! `afterBatch`, `onFileIndexed`). The orchestrator owns the sender half;
//! subscribers are plain consumers of a cloned receiver's stream of
//! `IngestionEvent`s.

use tokio::sync::broadcast;

use crate::node_state::NodeState;

/// Default channel capacity; a slow subscriber lags rather than blocking
/// the orchestrator (see [`broadcast::Receiver::recv`]'s `Lagged` error).
pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub enum IngestionEvent {
	/// A file-change batch started processing for a project.
	BatchStarted { project_id: String, batch_size: usize },

	/// A single node transitioned state.
	NodeTransitioned {
		project_id: String,
		uuid: String,
		from: NodeState,
		to: NodeState,
	},

	/// A node failed to parse or embed.
	NodeFailed {
		project_id: String,
		uuid: String,
		reason: String,
	},

	/// A batch finished; `indexed`/`skipped`/`failed` partition the batch.
	BatchCompleted {
		project_id: String,
		indexed: usize,
		skipped: usize,
		failed: usize,
	},

	/// The embedding engine wrote vectors for a batch of ready nodes.
	EmbeddingsWritten {
		project_id: String,
		count: usize,
		provider: String,
		model: String,
	},

	/// A project was deregistered and its nodes removed.
	ProjectForgotten { project_id: String },
}

impl IngestionEvent {
	pub fn project_id(&self) -> &str {
		match self {
			IngestionEvent::BatchStarted { project_id, .. }
			| IngestionEvent::NodeTransitioned { project_id, .. }
			| IngestionEvent::NodeFailed { project_id, .. }
			| IngestionEvent::BatchCompleted { project_id, .. }
			| IngestionEvent::EmbeddingsWritten { project_id, .. }
			| IngestionEvent::ProjectForgotten { project_id } => project_id,
		}
	}
}

/// Owns the single broadcast sender; subscribers call [`EventBus::subscribe`]
/// to get their own receiver. Cloning an `EventBus` shares the same channel.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<IngestionEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<IngestionEvent> {
		self.sender.subscribe()
	}

	/// Best-effort publish: with no subscribers this is a no-op, matching
	/// `broadcast::Sender::send`'s semantics (`Err` only means "nobody is
	/// listening right now", never a delivery failure worth propagating).
	pub fn publish(&self, event: IngestionEvent) {
		let _ = self.sender.send(event);
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(DEFAULT_CAPACITY)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn subscriber_receives_published_event() {
		let bus = EventBus::default();
		let mut rx = bus.subscribe();

		bus.publish(IngestionEvent::BatchStarted {
			project_id: "proj1".to_string(),
			batch_size: 10,
		});

		let event = rx.recv().await.unwrap();
		assert_eq!(event.project_id(), "proj1");
		assert!(matches!(event, IngestionEvent::BatchStarted { batch_size: 10, .. }));
	}

	#[test]
	fn publish_with_no_subscribers_does_not_panic() {
		let bus = EventBus::default();
		bus.publish(IngestionEvent::ProjectForgotten {
			project_id: "proj1".to_string(),
		});
	}
}
