use tracing::{debug, info};

use crate::core::schema::TableSpec;
use crate::core::traits::TargetStore;
use crate::error::{MigrateError, Result};

/// Moves the id sequence past the highest migrated id.
pub struct SequenceReconciler<'a, T: TargetStore + ?Sized> {
    target: &'a T,
}

impl<'a, T: TargetStore + ?Sized> SequenceReconciler<'a, T> {
    pub fn new(target: &'a T) -> Self {
        Self { target }
    }

    /// Set the next generated id of `table` to `max(id) + 1`.
    ///
    /// Returns the next id, or `None` when the table is empty or its id
    /// owns no sequence. Every failure is a `SequenceResetFailed`.
    pub async fn reconcile(&self, table: &TableSpec) -> Result<Option<i64>> {
        let max_id = self
            .target
            .max_id(table)
            .await
            .map_err(|e| MigrateError::sequence_reset(&table.name, e))?;

        let Some(max_id) = max_id else {
            debug!("{} is empty, sequence left as is", table.name);
            return Ok(None);
        };

        let next = max_id
            .checked_add(1)
            .ok_or_else(|| MigrateError::sequence_reset(&table.name, "max id is at the limit"))?;

        let reset = self
            .target
            .reset_sequence(table, next)
            .await
            .map_err(|e| MigrateError::sequence_reset(&table.name, e))?;

        if reset {
            info!("{}: next id is {}", table.name, next);
            Ok(Some(next))
        } else {
            Ok(None)
        }
    }
}
