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

//! LanceDB-backed [`GraphStore`]. Generalizes the teacher's four fixed
//! tables into one table per parser-declared label plus a shared
//! `relationships` table, reusing `table_ops::TableOperations` and
//! `vector_optimizer::VectorOptimizer` for the mechanics (table
//! existence checks, index provisioning) that don't depend on the
//! per-label schema shape.

use arrow::array::{Array, FixedSizeListArray, Float32Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{connect, Connection, DistanceType};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::CoreError;
use crate::graph::schema::{EmbeddingField, LabelSchema};
use crate::graph::table_ops::TableOperations;
use crate::graph::vector_optimizer::VectorOptimizer;
use crate::graph::{ContentNode, GraphStore, Relationship, SearchHit};

const RELATIONSHIPS_TABLE: &str = "relationships";
const EMBEDDING_FIELDS: [EmbeddingField; 3] = [
	EmbeddingField::Name,
	EmbeddingField::Content,
	EmbeddingField::Description,
];

fn store_err(context: &str, err: impl std::fmt::Display) -> CoreError {
	CoreError::StoreUnavailable(format!("{context}: {err}"))
}

pub struct LanceGraphStore {
	db: Connection,
	schemas: RwLock<HashMap<String, LabelSchema>>,
}

impl LanceGraphStore {
	pub async fn connect(storage_path: &str) -> Result<Self, CoreError> {
		let db = connect(storage_path)
			.execute()
			.await
			.map_err(|e| store_err("failed to open graph store", e))?;
		Ok(Self {
			db,
			schemas: RwLock::new(HashMap::new()),
		})
	}

	fn table_ops(&self) -> TableOperations<'_> {
		TableOperations::new(&self.db)
	}

	fn schema_for(&self, label: &str) -> Result<LabelSchema, CoreError> {
		self.schemas
			.read()
			.get(label)
			.cloned()
			.ok_or_else(|| CoreError::BadInput {
				field: "label".to_string(),
				reason: format!("no schema provisioned for label '{label}'"),
			})
	}

	fn node_table_schema(label_schema: &LabelSchema) -> Arc<Schema> {
		let mut fields = vec![
			Field::new("id", DataType::Utf8, false),
			Field::new("project_id", DataType::Utf8, false),
			Field::new("label", DataType::Utf8, false),
			Field::new("path", DataType::Utf8, false),
			Field::new("content_hash", DataType::Utf8, false),
			Field::new("properties_json", DataType::Utf8, false),
			Field::new("search_text", DataType::Utf8, false),
			Field::new("embedding_provider", DataType::Utf8, true),
			Field::new("embedding_model", DataType::Utf8, true),
		];

		for field_config in &label_schema.embedding_fields {
			fields.push(Field::new(
				field_config.field.column(),
				DataType::FixedSizeList(
					Arc::new(Field::new("item", DataType::Float32, true)),
					field_config.dimension as i32,
				),
				true,
			));
			fields.push(Field::new(field_config.field.hash_column(), DataType::Utf8, true));
		}

		Arc::new(Schema::new(fields))
	}

	fn node_to_batch(&self, label_schema: &LabelSchema, nodes: &[ContentNode]) -> Result<RecordBatch, CoreError> {
		let schema = Self::node_table_schema(label_schema);

		let mut columns: Vec<Arc<dyn Array>> = Vec::with_capacity(schema.fields().len());
		columns.push(Arc::new(StringArray::from(
			nodes.iter().map(|n| n.uuid.as_str()).collect::<Vec<_>>(),
		)));
		columns.push(Arc::new(StringArray::from(
			nodes.iter().map(|n| n.project_id.as_str()).collect::<Vec<_>>(),
		)));
		columns.push(Arc::new(StringArray::from(
			nodes.iter().map(|n| n.label.as_str()).collect::<Vec<_>>(),
		)));
		columns.push(Arc::new(StringArray::from(
			nodes.iter().map(|n| n.path.as_str()).collect::<Vec<_>>(),
		)));
		columns.push(Arc::new(StringArray::from(
			nodes.iter().map(|n| n.content_hash.as_str()).collect::<Vec<_>>(),
		)));
		columns.push(Arc::new(StringArray::from(
			nodes
				.iter()
				.map(|n| serde_json::to_string(&n.properties).unwrap_or_default())
				.collect::<Vec<_>>(),
		)));
		columns.push(Arc::new(StringArray::from(
			nodes.iter().map(|n| search_text(n)).collect::<Vec<_>>(),
		)));
		columns.push(Arc::new(StringArray::from(
			nodes
				.iter()
				.map(|n| n.embedding_provider.clone())
				.collect::<Vec<_>>(),
		)));
		columns.push(Arc::new(StringArray::from(
			nodes.iter().map(|n| n.embedding_model.clone()).collect::<Vec<_>>(),
		)));

		for field_config in &label_schema.embedding_fields {
			let (vectors, hashes): (Vec<Option<Vec<f32>>>, Vec<Option<String>>) = nodes
				.iter()
				.map(|n| embedding_for(n, field_config.field))
				.unzip();
			columns.push(Arc::new(fixed_size_list_of_optional(
				&vectors,
				field_config.dimension,
			)));
			columns.push(Arc::new(StringArray::from(hashes)));
		}

		RecordBatch::try_new(schema, columns).map_err(|e| store_err("failed to build node batch", e))
	}
}

fn search_text(node: &ContentNode) -> String {
	let mut parts = Vec::new();
	for key in ["name", "content", "description"] {
		if let Some(value) = node.properties.get(key).and_then(|v| v.as_str()) {
			parts.push(value.to_string());
		}
	}
	parts.join("\n")
}

fn embedding_for(node: &ContentNode, field: EmbeddingField) -> (Option<Vec<f32>>, Option<String>) {
	match field {
		EmbeddingField::Name => (node.embedding_name.clone(), node.embedding_name_hash.clone()),
		EmbeddingField::Content => (node.embedding_content.clone(), node.embedding_content_hash.clone()),
		EmbeddingField::Description => (
			node.embedding_description.clone(),
			node.embedding_description_hash.clone(),
		),
	}
}

fn fixed_size_list_of_optional(vectors: &[Option<Vec<f32>>], dimension: usize) -> FixedSizeListArray {
	let mut flattened = Vec::with_capacity(vectors.len() * dimension);
	let mut validity = Vec::with_capacity(vectors.len());
	for vector in vectors {
		match vector {
			Some(values) => {
				flattened.extend_from_slice(values);
				validity.push(true);
			}
			None => {
				flattened.extend(std::iter::repeat(0.0f32).take(dimension));
				validity.push(false);
			}
		}
	}
	FixedSizeListArray::new(
		Arc::new(Field::new("item", DataType::Float32, true)),
		dimension as i32,
		Arc::new(Float32Array::from(flattened)),
		Some(validity.into()),
	)
}

fn batch_to_nodes(label_schema: &LabelSchema, batch: &RecordBatch) -> Vec<ContentNode> {
	let mut out = Vec::with_capacity(batch.num_rows());

	let ids = string_column(batch, "id");
	let project_ids = string_column(batch, "project_id");
	let labels = string_column(batch, "label");
	let paths = string_column(batch, "path");
	let hashes = string_column(batch, "content_hash");
	let properties_json = string_column(batch, "properties_json");
	let providers = string_column(batch, "embedding_provider");
	let models = string_column(batch, "embedding_model");

	for row in 0..batch.num_rows() {
		let properties = properties_json
			.get(row)
			.and_then(|raw| serde_json::from_str(raw).ok())
			.unwrap_or_default();

		let mut node = ContentNode {
			uuid: ids.get(row).cloned().unwrap_or_default(),
			project_id: project_ids.get(row).cloned().unwrap_or_default(),
			label: labels.get(row).cloned().unwrap_or_default(),
			path: paths.get(row).cloned().unwrap_or_default(),
			content_hash: hashes.get(row).cloned().unwrap_or_default(),
			properties,
			embedding_name: None,
			embedding_content: None,
			embedding_description: None,
			embedding_name_hash: None,
			embedding_content_hash: None,
			embedding_description_hash: None,
			embedding_provider: providers.get(row).cloned().flatten(),
			embedding_model: models.get(row).cloned().flatten(),
		};

		for field_config in &label_schema.embedding_fields {
			let vector = fixed_size_list_row(batch, field_config.field.column(), row);
			let hash = string_column(batch, field_config.field.hash_column())
				.get(row)
				.cloned()
				.flatten();
			match field_config.field {
				EmbeddingField::Name => {
					node.embedding_name = vector;
					node.embedding_name_hash = hash;
				}
				EmbeddingField::Content => {
					node.embedding_content = vector;
					node.embedding_content_hash = hash;
				}
				EmbeddingField::Description => {
					node.embedding_description = vector;
					node.embedding_description_hash = hash;
				}
			}
		}

		out.push(node);
	}

	out
}

fn string_column(batch: &RecordBatch, name: &str) -> Vec<Option<String>> {
	let Some(column) = batch.column_by_name(name) else {
		return vec![None; batch.num_rows()];
	};
	let Some(array) = column.as_any().downcast_ref::<StringArray>() else {
		return vec![None; batch.num_rows()];
	};
	(0..array.len())
		.map(|i| (!array.is_null(i)).then(|| array.value(i).to_string()))
		.collect()
}

fn fixed_size_list_row(batch: &RecordBatch, name: &str, row: usize) -> Option<Vec<f32>> {
	let column = batch.column_by_name(name)?;
	let array = column.as_any().downcast_ref::<FixedSizeListArray>()?;
	if array.is_null(row) {
		return None;
	}
	let values = array.value(row);
	let values = values.as_any().downcast_ref::<Float32Array>()?;
	Some(values.values().to_vec())
}

#[async_trait]
impl GraphStore for LanceGraphStore {
	async fn ensure_schema(&self, schemas: &[LabelSchema]) -> Result<(), CoreError> {
		for label_schema in schemas {
			let table_name = label_schema.table_name();
			let ops = self.table_ops();
			if !ops
				.table_exists(&table_name)
				.await
				.map_err(|e| store_err("table_exists", e))?
			{
				let schema = Self::node_table_schema(label_schema);
				ops.create_table_with_schema(&table_name, schema)
					.await
					.map_err(|e| store_err("create_table_with_schema", e))?;
			}

			for field_config in &label_schema.embedding_fields {
				let _ = ops
					.create_vector_index_optimized(
						&table_name,
						field_config.field.column(),
						field_config.dimension,
					)
					.await;
			}

			let table = self
				.db
				.open_table(&table_name)
				.execute()
				.await
				.map_err(|e| store_err("open_table", e))?;
			let has_fts_index = table
				.list_indices()
				.await
				.map_err(|e| store_err("list_indices", e))?
				.iter()
				.any(|idx| idx.columns == vec!["search_text".to_string()]);
			if !has_fts_index {
				let _ = table
					.create_index(
						&["search_text"],
						lancedb::index::Index::FTS(lancedb::index::scalar::FtsIndexBuilder::default()),
					)
					.execute()
					.await;
			}

			self.schemas
				.write()
				.insert(label_schema.label.clone(), label_schema.clone());
		}

		if !self
			.table_ops()
			.table_exists(RELATIONSHIPS_TABLE)
			.await
			.map_err(|e| store_err("table_exists", e))?
		{
			let schema = Arc::new(Schema::new(vec![
				Field::new("from_uuid", DataType::Utf8, false),
				Field::new("rel_type", DataType::Utf8, false),
				Field::new("to_uuid", DataType::Utf8, false),
				Field::new("properties_json", DataType::Utf8, false),
			]));
			self.table_ops()
				.create_table_with_schema(RELATIONSHIPS_TABLE, schema)
				.await
				.map_err(|e| store_err("create_table_with_schema", e))?;
		}

		Ok(())
	}

	async fn upsert_nodes(&self, nodes: &[ContentNode]) -> Result<(), CoreError> {
		if nodes.is_empty() {
			return Ok(());
		}

		let mut by_label: HashMap<String, Vec<ContentNode>> = HashMap::new();
		for node in nodes {
			by_label.entry(node.label.clone()).or_default().push(node.clone());
		}

		for (label, nodes) in by_label {
			let label_schema = self.schema_for(&label)?;
			let table_name = label_schema.table_name();

			let uuids: Vec<String> = nodes.iter().map(|n| n.uuid.clone()).collect();
			self.delete_nodes_by_uuids(&label, &uuids).await?;

			let batch = self.node_to_batch(&label_schema, &nodes)?;
			self.table_ops()
				.store_batch(&table_name, batch)
				.await
				.map_err(|e| store_err("store_batch", e))?;
		}

		Ok(())
	}

	async fn file_node_hashes(
		&self,
		project_id: &str,
		path: &str,
		label: &str,
	) -> Result<HashMap<String, String>, CoreError> {
		let label_schema = self.schema_for(label)?;
		let table_name = label_schema.table_name();

		if !self
			.table_ops()
			.table_exists(&table_name)
			.await
			.map_err(|e| store_err("table_exists", e))?
		{
			return Ok(HashMap::new());
		}

		let table = self
			.db
			.open_table(&table_name)
			.execute()
			.await
			.map_err(|e| store_err("open_table", e))?;

		let mut results = table
			.query()
			.only_if(format!("project_id = '{project_id}' AND path = '{path}'"))
			.select(Select::Columns(vec!["id".to_string(), "content_hash".to_string()]))
			.execute()
			.await
			.map_err(|e| store_err("query", e))?;

		let mut out = HashMap::new();
		while let Some(batch) = results
			.try_next()
			.await
			.map_err(|e| store_err("query stream", e))?
		{
			let ids = string_column(&batch, "id");
			let hashes = string_column(&batch, "content_hash");
			for (id, hash) in ids.into_iter().zip(hashes) {
				if let (Some(id), Some(hash)) = (id, hash) {
					out.insert(id, hash);
				}
			}
		}

		Ok(out)
	}

	async fn get_node_by_uuid(&self, label: &str, uuid: &str) -> Result<Option<ContentNode>, CoreError> {
		let label_schema = self.schema_for(label)?;
		let table_name = label_schema.table_name();

		if !self
			.table_ops()
			.table_exists(&table_name)
			.await
			.map_err(|e| store_err("table_exists", e))?
		{
			return Ok(None);
		}

		let table = self
			.db
			.open_table(&table_name)
			.execute()
			.await
			.map_err(|e| store_err("open_table", e))?;

		let mut results = table
			.query()
			.only_if(format!("id = '{uuid}'"))
			.limit(1)
			.execute()
			.await
			.map_err(|e| store_err("query", e))?;

		while let Some(batch) = results
			.try_next()
			.await
			.map_err(|e| store_err("query stream", e))?
		{
			if let Some(node) = batch_to_nodes(&label_schema, &batch).into_iter().next() {
				return Ok(Some(node));
			}
		}

		Ok(None)
	}

	async fn nodes_by_path(&self, project_id: &str, label: &str, path: &str) -> Result<Vec<ContentNode>, CoreError> {
		let label_schema = self.schema_for(label)?;
		let table_name = label_schema.table_name();

		if !self
			.table_ops()
			.table_exists(&table_name)
			.await
			.map_err(|e| store_err("table_exists", e))?
		{
			return Ok(vec![]);
		}

		let table = self
			.db
			.open_table(&table_name)
			.execute()
			.await
			.map_err(|e| store_err("open_table", e))?;

		let mut results = table
			.query()
			.only_if(format!("project_id = '{project_id}' AND path = '{path}'"))
			.execute()
			.await
			.map_err(|e| store_err("query", e))?;

		let mut out = Vec::new();
		while let Some(batch) = results
			.try_next()
			.await
			.map_err(|e| store_err("query stream", e))?
		{
			out.extend(batch_to_nodes(&label_schema, &batch));
		}
		Ok(out)
	}

	async fn relationships_to(&self, to_uuid: &str, rel_type: &str) -> Result<Vec<Relationship>, CoreError> {
		if !self
			.table_ops()
			.table_exists(RELATIONSHIPS_TABLE)
			.await
			.map_err(|e| store_err("table_exists", e))?
		{
			return Ok(vec![]);
		}

		let table = self
			.db
			.open_table(RELATIONSHIPS_TABLE)
			.execute()
			.await
			.map_err(|e| store_err("open_table", e))?;

		let mut results = table
			.query()
			.only_if(format!("to_uuid = '{to_uuid}' AND rel_type = '{rel_type}'"))
			.execute()
			.await
			.map_err(|e| store_err("query", e))?;

		let mut out = Vec::new();
		while let Some(batch) = results
			.try_next()
			.await
			.map_err(|e| store_err("query stream", e))?
		{
			let from_uuids = string_column(&batch, "from_uuid");
			let rel_types = string_column(&batch, "rel_type");
			let to_uuids = string_column(&batch, "to_uuid");
			let properties_json = string_column(&batch, "properties_json");
			for row in 0..batch.num_rows() {
				let properties = properties_json
					.get(row)
					.and_then(|raw| raw.as_ref())
					.and_then(|raw| serde_json::from_str(raw).ok())
					.unwrap_or_default();
				out.push(Relationship {
					from_uuid: from_uuids.get(row).cloned().flatten().unwrap_or_default(),
					rel_type: rel_types.get(row).cloned().flatten().unwrap_or_default(),
					to_uuid: to_uuids.get(row).cloned().flatten().unwrap_or_default(),
					properties,
				});
			}
		}
		Ok(out)
	}

	async fn nodes_for_project(&self, project_id: &str, label: &str) -> Result<Vec<ContentNode>, CoreError> {
		let label_schema = self.schema_for(label)?;
		let table_name = label_schema.table_name();

		if !self
			.table_ops()
			.table_exists(&table_name)
			.await
			.map_err(|e| store_err("table_exists", e))?
		{
			return Ok(vec![]);
		}

		let table = self
			.db
			.open_table(&table_name)
			.execute()
			.await
			.map_err(|e| store_err("open_table", e))?;

		let mut results = table
			.query()
			.only_if(format!("project_id = '{project_id}'"))
			.execute()
			.await
			.map_err(|e| store_err("query", e))?;

		let mut out = Vec::new();
		while let Some(batch) = results
			.try_next()
			.await
			.map_err(|e| store_err("query stream", e))?
		{
			out.extend(batch_to_nodes(&label_schema, &batch));
		}
		Ok(out)
	}

	async fn delete_nodes_by_path(&self, project_id: &str, path: &str) -> Result<(), CoreError> {
		let labels: Vec<String> = self.schemas.read().keys().cloned().collect();
		for label in labels {
			let label_schema = self.schema_for(&label)?;
			let table_name = label_schema.table_name();
			if !self
				.table_ops()
				.table_exists(&table_name)
				.await
				.map_err(|e| store_err("table_exists", e))?
			{
				continue;
			}
			let table = self
				.db
				.open_table(&table_name)
				.execute()
				.await
				.map_err(|e| store_err("open_table", e))?;
			table
				.delete(&format!("project_id = '{project_id}' AND path = '{path}'"))
				.await
				.map_err(|e| store_err("delete", e))?;
		}
		Ok(())
	}

	async fn delete_nodes_by_uuids(&self, label: &str, uuids: &[String]) -> Result<(), CoreError> {
		if uuids.is_empty() {
			return Ok(());
		}
		let label_schema = self.schema_for(label)?;
		let table_name = label_schema.table_name();
		if !self
			.table_ops()
			.table_exists(&table_name)
			.await
			.map_err(|e| store_err("table_exists", e))?
		{
			return Ok(());
		}
		let table = self
			.db
			.open_table(&table_name)
			.execute()
			.await
			.map_err(|e| store_err("open_table", e))?;
		let filter = uuids
			.iter()
			.map(|id| format!("id = '{id}'"))
			.collect::<Vec<_>>()
			.join(" OR ");
		table
			.delete(&filter)
			.await
			.map_err(|e| store_err("delete", e))?;
		Ok(())
	}

	async fn upsert_relationships(&self, relationships: &[Relationship]) -> Result<(), CoreError> {
		if relationships.is_empty() {
			return Ok(());
		}

		let table = self
			.db
			.open_table(RELATIONSHIPS_TABLE)
			.execute()
			.await
			.map_err(|e| store_err("open_table", e))?;

		let filter = relationships
			.iter()
			.map(|r| {
				format!(
					"(from_uuid = '{}' AND rel_type = '{}' AND to_uuid = '{}')",
					r.from_uuid, r.rel_type, r.to_uuid
				)
			})
			.collect::<Vec<_>>()
			.join(" OR ");
		table.delete(&filter).await.map_err(|e| store_err("delete", e))?;

		let schema = Arc::new(Schema::new(vec![
			Field::new("from_uuid", DataType::Utf8, false),
			Field::new("rel_type", DataType::Utf8, false),
			Field::new("to_uuid", DataType::Utf8, false),
			Field::new("properties_json", DataType::Utf8, false),
		]));
		let batch = RecordBatch::try_new(
			schema,
			vec![
				Arc::new(StringArray::from(
					relationships.iter().map(|r| r.from_uuid.as_str()).collect::<Vec<_>>(),
				)),
				Arc::new(StringArray::from(
					relationships.iter().map(|r| r.rel_type.as_str()).collect::<Vec<_>>(),
				)),
				Arc::new(StringArray::from(
					relationships.iter().map(|r| r.to_uuid.as_str()).collect::<Vec<_>>(),
				)),
				Arc::new(StringArray::from(
					relationships
						.iter()
						.map(|r| serde_json::to_string(&r.properties).unwrap_or_default())
						.collect::<Vec<_>>(),
				)),
			],
		)
		.map_err(|e| store_err("build relationship batch", e))?;

		self.table_ops()
			.store_batch(RELATIONSHIPS_TABLE, batch)
			.await
			.map_err(|e| store_err("store_batch", e))?;

		Ok(())
	}

	async fn delete_relationships_for_uuid(&self, uuid: &str) -> Result<(), CoreError> {
		if !self
			.table_ops()
			.table_exists(RELATIONSHIPS_TABLE)
			.await
			.map_err(|e| store_err("table_exists", e))?
		{
			return Ok(());
		}
		let table = self
			.db
			.open_table(RELATIONSHIPS_TABLE)
			.execute()
			.await
			.map_err(|e| store_err("open_table", e))?;
		table
			.delete(&format!("from_uuid = '{uuid}' OR to_uuid = '{uuid}'"))
			.await
			.map_err(|e| store_err("delete", e))?;
		Ok(())
	}

	async fn delete_relationship(&self, from_uuid: &str, rel_type: &str, to_uuid: &str) -> Result<(), CoreError> {
		if !self
			.table_ops()
			.table_exists(RELATIONSHIPS_TABLE)
			.await
			.map_err(|e| store_err("table_exists", e))?
		{
			return Ok(());
		}
		let table = self
			.db
			.open_table(RELATIONSHIPS_TABLE)
			.execute()
			.await
			.map_err(|e| store_err("open_table", e))?;
		table
			.delete(&format!(
				"from_uuid = '{from_uuid}' AND rel_type = '{rel_type}' AND to_uuid = '{to_uuid}'"
			))
			.await
			.map_err(|e| store_err("delete", e))?;
		Ok(())
	}

	async fn nodes_pending_embedding(
		&self,
		project_id: &str,
		label: &str,
		limit: usize,
	) -> Result<Vec<ContentNode>, CoreError> {
		let label_schema = self.schema_for(label)?;
		let table_name = label_schema.table_name();
		if !self
			.table_ops()
			.table_exists(&table_name)
			.await
			.map_err(|e| store_err("table_exists", e))?
		{
			return Ok(vec![]);
		}

		let missing_hash_clauses: Vec<String> = EMBEDDING_FIELDS
			.iter()
			.filter(|f| label_schema.embedding_fields.iter().any(|c| c.field == **f))
			.map(|f| format!("{} IS NULL", f.hash_column()))
			.collect();
		if missing_hash_clauses.is_empty() {
			return Ok(vec![]);
		}

		let table = self
			.db
			.open_table(&table_name)
			.execute()
			.await
			.map_err(|e| store_err("open_table", e))?;

		let mut results = table
			.query()
			.only_if(format!(
				"project_id = '{project_id}' AND ({})",
				missing_hash_clauses.join(" OR ")
			))
			.limit(limit)
			.execute()
			.await
			.map_err(|e| store_err("query", e))?;

		let mut out = Vec::new();
		while let Some(batch) = results
			.try_next()
			.await
			.map_err(|e| store_err("query stream", e))?
		{
			out.extend(batch_to_nodes(&label_schema, &batch));
		}
		Ok(out)
	}

	async fn write_embeddings(&self, nodes: &[ContentNode]) -> Result<(), CoreError> {
		self.upsert_nodes(nodes).await
	}

	async fn migrate_path_prefix(
		&self,
		old_project: &str,
		new_project: &str,
		old_path_prefix: &str,
		new_path_prefix: &str,
	) -> Result<Vec<ContentNode>, CoreError> {
		let labels: Vec<String> = self.schemas.read().keys().cloned().collect();
		let mut migrated_all = Vec::new();

		for label in labels {
			let label_schema = self.schema_for(&label)?;
			let table_name = label_schema.table_name();
			if !self
				.table_ops()
				.table_exists(&table_name)
				.await
				.map_err(|e| store_err("table_exists", e))?
			{
				continue;
			}
			let table = self
				.db
				.open_table(&table_name)
				.execute()
				.await
				.map_err(|e| store_err("open_table", e))?;

			let mut results = table
				.query()
				.only_if(format!("project_id = '{old_project}'"))
				.execute()
				.await
				.map_err(|e| store_err("query", e))?;

			let mut migrated = Vec::new();
			let mut migrated_uuids = Vec::new();
			while let Some(batch) = results
				.try_next()
				.await
				.map_err(|e| store_err("query stream", e))?
			{
				for mut node in batch_to_nodes(&label_schema, &batch) {
					let Some(rest) = node.path.strip_prefix(old_path_prefix) else {
						continue;
					};
					node.project_id = new_project.to_string();
					node.path = format!("{new_path_prefix}{rest}");
					migrated_uuids.push(node.uuid.clone());
					migrated.push(node);
				}
			}

			if migrated.is_empty() {
				continue;
			}

			let filter = migrated_uuids
				.iter()
				.map(|id| format!("id = '{id}'"))
				.collect::<Vec<_>>()
				.join(" OR ");
			table.delete(&filter).await.map_err(|e| store_err("delete", e))?;

			let batch = self.node_to_batch(&label_schema, &migrated)?;
			self.table_ops()
				.store_batch(&table_name, batch)
				.await
				.map_err(|e| store_err("store_batch", e))?;

			migrated_all.extend(migrated);
		}

		Ok(migrated_all)
	}

	async fn vector_search(
		&self,
		project_id: &str,
		label: &str,
		field: &str,
		query_vector: &[f32],
		limit: usize,
	) -> Result<Vec<SearchHit>, CoreError> {
		let label_schema = self.schema_for(label)?;
		let table_name = label_schema.table_name();
		if !self
			.table_ops()
			.table_exists(&table_name)
			.await
			.map_err(|e| store_err("table_exists", e))?
		{
			return Ok(vec![]);
		}

		let table = self
			.db
			.open_table(&table_name)
			.execute()
			.await
			.map_err(|e| store_err("open_table", e))?;

		let row_count = table.count_rows(None).await.unwrap_or(0);
		let dimension = query_vector.len();
		let index_params = VectorOptimizer::calculate_index_params(row_count, dimension);
		let search_params =
			VectorOptimizer::calculate_search_params(index_params.num_partitions, row_count);

		let mut results = table
			.vector_search(query_vector)
			.map_err(|e| store_err("vector_search", e))?
			.column(field)
			.distance_type(DistanceType::Cosine)
			.nprobes(search_params.nprobes)
			.only_if(format!("project_id = '{project_id}'"))
			.limit(limit)
			.execute()
			.await
			.map_err(|e| store_err("vector_search execute", e))?;

		let mut hits = Vec::new();
		while let Some(batch) = results
			.try_next()
			.await
			.map_err(|e| store_err("vector_search stream", e))?
		{
			let distances = batch
				.column_by_name("_distance")
				.and_then(|c| c.as_any().downcast_ref::<Float32Array>().cloned());
			for (row, node) in batch_to_nodes(&label_schema, &batch).into_iter().enumerate() {
				let score = distances.as_ref().map(|d| 1.0 - d.value(row));
				hits.push(SearchHit {
					node,
					vector_score: score,
					keyword_score: None,
				});
			}
		}
		Ok(hits)
	}

	async fn keyword_search(
		&self,
		project_id: &str,
		label: &str,
		query: &str,
		limit: usize,
	) -> Result<Vec<SearchHit>, CoreError> {
		let label_schema = self.schema_for(label)?;
		let table_name = label_schema.table_name();
		if !self
			.table_ops()
			.table_exists(&table_name)
			.await
			.map_err(|e| store_err("table_exists", e))?
		{
			return Ok(vec![]);
		}

		let table = self
			.db
			.open_table(&table_name)
			.execute()
			.await
			.map_err(|e| store_err("open_table", e))?;

		let escaped = query.replace('\'', "''");
		let mut results = table
			.query()
			.only_if(format!("project_id = '{project_id}'"))
			.full_text_search(lancedb::query::FullTextSearchQuery::new(escaped).columns(Some(vec![
				"search_text".to_string(),
			])))
			.limit(limit)
			.execute()
			.await
			.map_err(|e| store_err("keyword_search execute", e))?;

		let mut hits = Vec::new();
		while let Some(batch) = results
			.try_next()
			.await
			.map_err(|e| store_err("keyword_search stream", e))?
		{
			let scores = batch
				.column_by_name("_score")
				.and_then(|c| c.as_any().downcast_ref::<Float32Array>().cloned());
			for (row, node) in batch_to_nodes(&label_schema, &batch).into_iter().enumerate() {
				let score = scores.as_ref().map(|s| s.value(row));
				hits.push(SearchHit {
					node,
					vector_score: None,
					keyword_score: score,
				});
			}
		}
		Ok(hits)
	}

	async fn reassign_project(
		&self,
		old: &str,
		new: &str,
		old_path_prefix: &str,
		new_path_prefix: &str,
	) -> Result<(), CoreError> {
		let labels: Vec<String> = self.schemas.read().keys().cloned().collect();
		for label in labels {
			let label_schema = self.schema_for(&label)?;
			let table_name = label_schema.table_name();
			if !self
				.table_ops()
				.table_exists(&table_name)
				.await
				.map_err(|e| store_err("table_exists", e))?
			{
				continue;
			}
			let table = self
				.db
				.open_table(&table_name)
				.execute()
				.await
				.map_err(|e| store_err("open_table", e))?;

			let mut results = table
				.query()
				.only_if(format!("project_id = '{old}'"))
				.execute()
				.await
				.map_err(|e| store_err("query", e))?;

			let mut migrated = Vec::new();
			while let Some(batch) = results
				.try_next()
				.await
				.map_err(|e| store_err("query stream", e))?
			{
				for mut node in batch_to_nodes(&label_schema, &batch) {
					node.project_id = new.to_string();
					if let Some(rest) = node.path.strip_prefix(old_path_prefix) {
						node.path = format!("{new_path_prefix}{rest}");
					}
					migrated.push(node);
				}
			}

			if migrated.is_empty() {
				continue;
			}

			table
				.delete(&format!("project_id = '{old}'"))
				.await
				.map_err(|e| store_err("delete", e))?;

			let batch = self.node_to_batch(&label_schema, &migrated)?;
			self.table_ops()
				.store_batch(&table_name, batch)
				.await
				.map_err(|e| store_err("store_batch", e))?;
		}
		Ok(())
	}

	async fn remove_project(&self, project_id: &str) -> Result<(), CoreError> {
		let labels: Vec<String> = self.schemas.read().keys().cloned().collect();
		for label in labels {
			let label_schema = self.schema_for(&label)?;
			let table_name = label_schema.table_name();
			if !self
				.table_ops()
				.table_exists(&table_name)
				.await
				.map_err(|e| store_err("table_exists", e))?
			{
				continue;
			}
			let table = self
				.db
				.open_table(&table_name)
				.execute()
				.await
				.map_err(|e| store_err("open_table", e))?;
			table
				.delete(&format!("project_id = '{project_id}'"))
				.await
				.map_err(|e| store_err("delete", e))?;
		}
		Ok(())
	}
}
