//! Table schema as seen by the index: column definitions and their types.

pub mod column;
pub mod table;

pub use column::ColumnType;
pub use table::{ColumnDefinition, TableSchema};
