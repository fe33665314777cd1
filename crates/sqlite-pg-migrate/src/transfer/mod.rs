//! Per-table migration steps.
//!
//! Each step borrows the store it works on and is driven by the
//! orchestrator in this order: [`SchemaGuarantor`], [`RowExtractor`],
//! [`ColumnRemapper`] and [`UpsertLoader`] for every row, then
//! [`SequenceReconciler`].

mod extractor;
mod loader;
mod remap;
mod schema;
mod sequence;

pub use extractor::RowExtractor;
pub use loader::UpsertLoader;
pub use remap::{coerce, ColumnRemapper};
pub use schema::SchemaGuarantor;
pub use sequence::SequenceReconciler;
