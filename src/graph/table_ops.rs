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

use anyhow::Result;
use std::sync::Arc;

use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;

use lancedb::{query::ExecutableQuery, Connection};

use super::vector_optimizer::VectorOptimizer;

/// Generic table operations for LanceDB, shared across the per-label node
/// tables and the `relationships` table.
pub struct TableOperations<'a> {
	pub db: &'a Connection,
}

impl<'a> TableOperations<'a> {
	pub fn new(db: &'a Connection) -> Self {
		Self { db }
	}

	/// Check if a table exists
	pub async fn table_exists(&self, table_name: &str) -> Result<bool> {
		let table_names = self.db.table_names().execute().await?;
		Ok(table_names.contains(&table_name.to_string()))
	}

	/// Create a table with the given schema
	pub async fn create_table_with_schema(&self, table_name: &str, schema: Arc<Schema>) -> Result<()> {
		let _table = self.db.create_empty_table(table_name, schema).execute().await?;
		Ok(())
	}

	/// Store a record batch in a table (create table if it doesn't exist)
	pub async fn store_batch(&self, table_name: &str, batch: RecordBatch) -> Result<()> {
		use std::iter::once;
		let schema = batch.schema();

		if self.table_exists(table_name).await? {
			let table = self.db.open_table(table_name).execute().await?;
			let batch_reader = arrow::record_batch::RecordBatchIterator::new(once(Ok(batch)), schema);
			table.add(batch_reader).execute().await?;
		} else {
			let batch_reader = arrow::record_batch::RecordBatchIterator::new(once(Ok(batch)), schema);
			let _table = self.db.create_table(table_name, batch_reader).execute().await?;
		}

		Ok(())
	}

	/// Check if index already exists with good parameters and handle dynamic dataset changes
	pub async fn create_vector_index_optimized(
		&self,
		table_name: &str,
		column_name: &str,
		vector_dimension: usize,
	) -> Result<()> {
		if !self.table_exists(table_name).await? {
			return Err(anyhow::anyhow!("Table {} does not exist", table_name));
		}

		let table = self.db.open_table(table_name).execute().await?;
		let row_count = table.count_rows(None).await?;

		let index_params = VectorOptimizer::calculate_index_params(row_count, vector_dimension);

		if !index_params.should_create_index {
			tracing::debug!(
				"Skipping index creation for table '{}' with {} rows - brute force search will be faster",
				table_name, row_count
			);
			return Ok(());
		}

		let existing_indices = table.list_indices().await?;
		let has_embedding_index = existing_indices.iter().any(|idx| idx.columns == vec![column_name]);

		if has_embedding_index {
			tracing::debug!(
				"Vector index already exists for table '{}' with {} rows. Consider recreating if dataset grew significantly.",
				table_name, row_count
			);
			return Ok(());
		}

		tracing::info!(
			"Creating optimized vector index for table '{}': {} rows, {} partitions, {} sub-vectors, {} bits",
			table_name, row_count, index_params.num_partitions, index_params.num_sub_vectors, index_params.num_bits
		);

		let start_time = std::time::Instant::now();

		table
			.create_index(
				&[column_name],
				lancedb::index::Index::IvfPq(
					lancedb::index::vector::IvfPqIndexBuilder::default()
						.distance_type(index_params.distance_type)
						.num_partitions(index_params.num_partitions)
						.num_sub_vectors(index_params.num_sub_vectors)
						.num_bits(index_params.num_bits as u32),
				),
			)
			.execute()
			.await?;

		let duration = start_time.elapsed();
		tracing::info!(
			"Successfully created optimized vector index for table '{}' in {:.2}s",
			table_name,
			duration.as_secs_f64()
		);
		Ok(())
	}
}
