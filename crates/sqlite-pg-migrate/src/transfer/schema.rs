use tracing::{debug, info};

use crate::core::schema::TableSpec;
use crate::core::traits::TargetStore;
use crate::error::Result;

/// Creates missing target tables. Existing tables are never altered.
pub struct SchemaGuarantor<'a, T: TargetStore + ?Sized> {
    target: &'a T,
}

impl<'a, T: TargetStore + ?Sized> SchemaGuarantor<'a, T> {
    pub fn new(target: &'a T) -> Self {
        Self { target }
    }

    /// Make sure `table` exists. Returns true if it had to be created.
    pub async fn ensure(&self, table: &TableSpec) -> Result<bool> {
        if self.target.table_exists(&table.name).await? {
            debug!("Table {} already exists, leaving schema untouched", table.name);
            return Ok(false);
        }

        info!("Creating table {}", table.name);
        self.target.create_table(table).await?;
        Ok(true)
    }
}
