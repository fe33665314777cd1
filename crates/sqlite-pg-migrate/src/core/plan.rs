//! Dependency ordering of migrated tables.

use std::collections::{HashMap, VecDeque};

use super::schema::TableSpec;
use crate::error::{MigrateError, Result};

/// Tables in foreign key dependency order.
///
/// Invariant: no table appears before a table it references.
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    tables: Vec<TableSpec>,
}

impl MigrationPlan {
    /// Order `tables` so that referenced tables come first.
    ///
    /// Ties are broken by declaration order, so the plan is deterministic.
    /// Self references do not constrain the order. Fails on duplicate table
    /// names, references to undeclared tables, and cycles.
    pub fn new(tables: Vec<TableSpec>) -> Result<Self> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        for (i, table) in tables.iter().enumerate() {
            if index.insert(table.name.as_str(), i).is_some() {
                return Err(MigrateError::Config(format!(
                    "table '{}' is declared more than once",
                    table.name
                )));
            }
        }

        let mut in_degree = vec![0usize; tables.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); tables.len()];

        for (i, table) in tables.iter().enumerate() {
            for referenced in table.referenced_tables() {
                if referenced == table.name {
                    continue;
                }
                let parent = *index.get(referenced).ok_or_else(|| {
                    MigrateError::Config(format!(
                        "table '{}' references undeclared table '{}'",
                        table.name, referenced
                    ))
                })?;
                if !dependents[parent].contains(&i) {
                    dependents[parent].push(i);
                    in_degree[i] += 1;
                }
            }
        }

        // Kahn's algorithm, always releasing the earliest declared table first
        let mut ready: VecDeque<usize> = (0..tables.len()).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(tables.len());

        while let Some(i) = ready.pop_front() {
            order.push(i);
            for &child in &dependents[i] {
                in_degree[child] -= 1;
                if in_degree[child] == 0 {
                    let pos = ready.partition_point(|&r| r < child);
                    ready.insert(pos, child);
                }
            }
        }

        if order.len() != tables.len() {
            let stuck: Vec<&str> = (0..tables.len())
                .filter(|i| !order.contains(i))
                .map(|i| tables[i].name.as_str())
                .collect();
            return Err(MigrateError::Config(format!(
                "foreign key cycle between tables: {}",
                stuck.join(", ")
            )));
        }

        let mut slots: Vec<Option<TableSpec>> = tables.into_iter().map(Some).collect();
        let tables = order
            .into_iter()
            .filter_map(|i| slots[i].take())
            .collect();

        Ok(Self { tables })
    }

    /// Restrict the plan to the named tables, keeping dependency order.
    ///
    /// An empty selection keeps every table.
    pub fn select(self, names: &[String]) -> Result<Self> {
        if names.is_empty() {
            return Ok(self);
        }

        if let Some(unknown) = names
            .iter()
            .find(|n| !self.tables.iter().any(|t| &t.name == *n))
        {
            return Err(MigrateError::Config(format!(
                "unknown table '{}' (known tables: {})",
                unknown,
                self.table_names().join(", ")
            )));
        }

        let tables = self
            .tables
            .into_iter()
            .filter(|t| names.contains(&t.name))
            .collect();
        Ok(Self { tables })
    }

    /// Tables in migration order.
    pub fn tables(&self) -> &[TableSpec] {
        &self.tables
    }

    /// Table names in migration order.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
