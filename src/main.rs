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

//! RagForge daemon entry point: loads configuration, wires the graph
//! store, parser registry and the four subsystems (ingestion
//! orchestrator, embedding engine, hybrid search planner, orphan
//! tracker) around one shared [`AppContext`], then runs until
//! interrupted.
//!
//! CLI/MCP argument grammar is out of scope for this crate (see
//! SPEC_FULL.md §1); this binary takes the project path to watch from
//! its first argument (defaulting to the current directory) and
//! otherwise runs as a long-lived process, the way `octocode`'s
//! `commands/watch.rs` ran a debounced watch loop.

use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt::Layer, prelude::*, registry::Registry, EnvFilter};

use ragforge_core::config::Config;
use ragforge_core::context::{AppContext, ProjectType};
use ragforge_core::embedding::engine::{embedding_chunk_schema, EmbeddingEngine};
use ragforge_core::embedding::{create_embedding_provider_from_parts, parse_provider_model};
use ragforge_core::graph::lance_store::LanceGraphStore;
use ragforge_core::graph::GraphStore;
use ragforge_core::ingestion::{Orchestrator, WatchOptions};
use ragforge_core::orphan::{structural_label_schemas, OrphanTracker};
use ragforge_core::parser::{markdown::MarkdownParser, scope::ScopeParser, ParserRegistry};
use ragforge_core::search::SearchPlanner;
use ragforge_core::storage;

/// File-rotated structured logs under the project's storage directory,
/// grounded on `mcp/logging.rs`'s `init_mcp_logging`: a daily-rotating
/// JSON file layer plus, outside of release builds, a human-readable
/// stderr layer.
fn init_logging(log_dir: &std::path::Path) -> anyhow::Result<()> {
	std::fs::create_dir_all(log_dir)?;
	let file_appender = tracing_appender::rolling::RollingFileAppender::new(
		tracing_appender::rolling::Rotation::DAILY,
		log_dir,
		"ragforge-daemon.log",
	);
	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	let file_layer = Layer::new()
		.with_writer(file_appender)
		.with_ansi(false)
		.with_target(true)
		.with_file(true)
		.with_line_number(true)
		.json();
	let console_layer = Layer::new().with_writer(std::io::stderr).with_target(false);

	Registry::default()
		.with(file_layer)
		.with(console_layer)
		.with(env_filter)
		.init();

	Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let _ = dotenvy::dotenv();

	let project_path = std::env::args()
		.nth(1)
		.map(PathBuf::from)
		.unwrap_or(std::env::current_dir()?);
	let project_path = project_path.canonicalize()?;

	let config = Config::load()?;
	init_logging(&storage::get_system_cache_dir()?.join("logs")).ok();

	tracing::info!(path = %project_path.display(), "starting ragforge daemon");

	let ctx = AppContext::new(config.clone());

	let database_path = storage::get_project_database_path(&project_path)?;
	std::fs::create_dir_all(&database_path)?;
	let store: Arc<dyn GraphStore> = Arc::new(LanceGraphStore::connect(&database_path.to_string_lossy()).await?);

	let mut parsers = ParserRegistry::new();
	parsers.register(Arc::new(MarkdownParser::new(config.index.chunk_size)));
	parsers.register(Arc::new(ScopeParser::rust()?));
	parsers.register(Arc::new(ScopeParser::python()?));
	let parsers = Arc::new(parsers);

	let (code_provider, code_model) = parse_provider_model(&config.embedding.code_model);
	let (text_provider, text_model) = parse_provider_model(&config.embedding.text_model);
	let code_dimension = create_embedding_provider_from_parts(&code_provider, &code_model, &config.embedding.local_base_url)?
		.get_dimension();
	let text_dimension = create_embedding_provider_from_parts(&text_provider, &text_model, &config.embedding.local_base_url)?
		.get_dimension();

	let mut schemas = parsers.label_schemas(code_dimension, text_dimension);
	schemas.extend(structural_label_schemas());
	schemas.push(embedding_chunk_schema(text_dimension));
	store.ensure_schema(&schemas).await?;

	let orchestrator = Arc::new(Orchestrator::new(ctx.clone(), store.clone(), parsers.clone()));
	let embedding_engine = Arc::new(EmbeddingEngine::new(ctx.clone(), store.clone(), parsers.clone()));
	let search_planner = Arc::new(SearchPlanner::new(ctx.clone(), store.clone(), parsers.clone(), orchestrator.clone()));
	let orphan_tracker = Arc::new(OrphanTracker::new(ctx.clone(), store.clone()));
	// The search planner and orphan tracker aren't driven by this entry
	// point directly; they're shared, long-lived handles other in-process
	// callers (the tool callback interface, SPEC_FULL.md §6) invoke.
	let _ = (&search_planner, &orphan_tracker);

	let project_id = orchestrator
		.register_project(&project_path, ProjectType::Local, None)
		.await?;
	orchestrator.start_watching(&project_path, WatchOptions::default()).await?;

	tracing::info!(project_id = %project_id, "project registered and watching for changes");

	// Periodically drains `linked` nodes into `ready` ones, independent of
	// the ingestion watch loop (spec §4.4: the embedding engine runs as
	// its own pass rather than inline with parsing).
	let drain_ctx = ctx.clone();
	let drain_engine = embedding_engine.clone();
	let drain_project_id = project_id.clone();
	tokio::spawn(async move {
		loop {
			match drain_engine.run_pass(&drain_project_id).await {
				Ok(0) => tokio::time::sleep(std::time::Duration::from_secs(5)).await,
				Ok(n) => tracing::info!(count = n, "embedding pass completed"),
				Err(e) => {
					tracing::warn!("embedding pass failed: {e}");
					tokio::time::sleep(std::time::Duration::from_secs(5)).await;
				}
			}
			if drain_ctx.project(&drain_project_id).is_err() {
				break;
			}
		}
	});

	tokio::signal::ctrl_c().await?;
	tracing::info!("shutting down");
	orchestrator.stop_watching(&project_path)?;

	Ok(())
}
