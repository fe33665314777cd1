use std::time::Instant;

use tracing::debug;

use crate::core::traits::{SourceRows, SourceStore};
use crate::error::Result;

/// Reads whole tables from the source.
pub struct RowExtractor<'a, S: SourceStore + ?Sized> {
    source: &'a S,
}

impl<'a, S: SourceStore + ?Sized> RowExtractor<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Every row of `table` in native order, with the source column names.
    pub async fn extract(&self, table: &str) -> Result<SourceRows> {
        let started = Instant::now();
        let rows = self.source.fetch_rows(table).await?;
        debug!(
            "Extracted {} rows ({} columns) from {} in {:?}",
            rows.len(),
            rows.columns.len(),
            table,
            started.elapsed()
        );
        Ok(rows)
    }

    /// Source column names of `table`, without reading rows.
    pub async fn columns(&self, table: &str) -> Result<Vec<String>> {
        self.source.list_columns(table).await
    }
}
