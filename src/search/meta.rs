//! Synthetic rows carrying a computed payload in the index column.

use chrono::Utc;

use crate::index::IndexRef;
use crate::schema::TableSchema;
use crate::storage::{Cell, ColumnFamily, PartitionKey, StorageRow};

/// Build a row holding `payload` in the index's column.
///
/// Returns `None` when the table does not declare that column. The row has
/// an empty partition key and is stamped with the current time.
pub fn make_synthetic_row(
    schema: &TableSchema,
    index: &IndexRef,
    payload: Vec<u8>,
) -> Option<StorageRow> {
    schema.value_type(&index.column)?;
    let timestamp = Utc::now().timestamp_micros();
    let columns = ColumnFamily::new().with_cell(index.column.clone(), Cell::new(payload, timestamp));
    Some(StorageRow::new(PartitionKey::empty(), columns))
}
