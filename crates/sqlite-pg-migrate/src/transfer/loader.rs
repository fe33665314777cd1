use tracing::trace;

use crate::core::schema::TableSpec;
use crate::core::traits::{TargetRow, TargetStore};
use crate::error::Result;

/// Insert-or-overwrite by id, one row per call.
pub struct UpsertLoader<'a, T: TargetStore + ?Sized> {
    target: &'a T,
    table: &'a TableSpec,
    rows_loaded: u64,
}

impl<'a, T: TargetStore + ?Sized> UpsertLoader<'a, T> {
    pub fn new(target: &'a T, table: &'a TableSpec) -> Self {
        Self {
            target,
            table,
            rows_loaded: 0,
        }
    }

    /// Upsert one row inside the caller's open transaction.
    pub async fn load(&mut self, row: &TargetRow) -> Result<()> {
        let written = self.target.upsert_row(self.table, row).await?;
        self.rows_loaded += 1;
        trace!("Upserted row into {} ({} affected)", self.table.name, written);
        Ok(())
    }

    /// Rows loaded so far.
    pub fn rows_loaded(&self) -> u64 {
        self.rows_loaded
    }
}
