#![allow(dead_code)]

use std::sync::Arc;

use rowlens::index::FieldType;
use rowlens::{
    BackgroundRepairer, Clause, ColumnType, ExtendedFilter, IndexConfig, IndexRef, MemoryIndex,
    MemoryRowStore, PartitionKey, ResultRow, RowIndexSearcher, RowStore, StorageRow, TableSchema,
};

/// (key, tags, state, segment)
pub const ROWS: [(i32, &str, &str, i32); 10] = [
    (1, "hello1 tag1 lol1", "CA", 1),
    (2, "hello1 tag1 lol2", "LA", 2),
    (3, "hello1 tag2 lol1", "NY", 1),
    (4, "hello1 tag2 lol2", "TX", 2),
    (5, "hllo3 tag3 lol3", "TX", 3),
    (6, "hello2 tag1 lol1", "CA", 4),
    (7, "hello2 tag1 lol2", "NY", 5),
    (8, "hello2 tag2 lol1", "CA", 6),
    (9, "hello2 tag2 lol2", "TX", 7),
    (10, "hell3 tag3 lol3", "TX", 8),
];

pub struct Fixture {
    pub schema: TableSchema,
    pub store: Arc<MemoryRowStore>,
    pub index: Arc<MemoryIndex>,
    pub repairer: Arc<BackgroundRepairer>,
    pub searcher: RowIndexSearcher,
}

pub fn key(i: i32) -> PartitionKey {
    PartitionKey::new(i.to_be_bytes().to_vec())
}

impl Fixture {
    pub fn new(meta_column: bool) -> rowlens::Result<Self> {
        let schema = TableSchema::new("ks", "tag2", "key", ColumnType::Int)
            .with_column("tags", ColumnType::Text)
            .with_column("state", ColumnType::Text)
            .with_column("segment", ColumnType::Int)
            .with_column("magic", ColumnType::Text);
        let config = Arc::new(
            IndexConfig::builder()
                .add_field("tags", FieldType::Text)
                .add_field("state", FieldType::String)
                .add_field("segment", FieldType::Integer)
                .meta_column(meta_column)
                .shards(4)
                .build(),
        );

        let store = Arc::new(MemoryRowStore::new(schema.clone()));
        let index = Arc::new(MemoryIndex::new(Arc::clone(&config))?);
        let repairer = Arc::new(BackgroundRepairer::spawn(index.clone())?);
        let searcher = RowIndexSearcher::new(
            IndexRef::new("tag_idx", "magic"),
            config,
            store.clone(),
            index.clone(),
            repairer.clone(),
        );
        Ok(Self {
            schema,
            store,
            index,
            repairer,
            searcher,
        })
    }

    /// A fixture holding every row of [`ROWS`], written and indexed at 10.
    pub fn with_rows(meta_column: bool) -> rowlens::Result<Self> {
        let fixture = Self::new(meta_column)?;
        for (k, tags, state, segment) in ROWS {
            fixture.insert(k, tags, state, segment, 10)?;
        }
        Ok(fixture)
    }

    /// Write a row and index its current state.
    pub fn insert(&self, k: i32, tags: &str, state: &str, segment: i32, timestamp: i64) -> rowlens::Result<()> {
        let pk = key(k);
        self.store.write_value(&pk, "tags", tags, timestamp)?;
        self.store.write_value(&pk, "state", state, timestamp)?;
        self.store.write_value(&pk, "segment", segment, timestamp)?;
        let columns = self.store.read_row(&pk)?.unwrap_or_default();
        self.index.index_row(&self.schema, &StorageRow::new(pk, columns))?;
        Ok(())
    }

    /// Search with the payload in the index column and no other clause.
    pub fn query(&self, payload: &str, max_rows: usize) -> rowlens::Result<Vec<ResultRow>> {
        self.searcher.search(&request(payload, max_rows))
    }

    /// Partition keys of the returned rows, in result order.
    pub fn keys(&self, rows: &[ResultRow]) -> Vec<i32> {
        rows.iter()
            .map(|row| {
                self.schema
                    .key_string(&row.row().key)
                    .unwrap()
                    .parse()
                    .unwrap()
            })
            .collect()
    }
}

pub fn request(payload: &str, max_rows: usize) -> ExtendedFilter {
    ExtendedFilter::new(vec![Clause::eq("magic", payload.as_bytes().to_vec())], max_rows)
}

/// The index column of a synthetic row, as text.
pub fn meta_payload(row: &ResultRow) -> String {
    assert!(row.is_synthetic(), "expected a synthetic row, got {row:?}");
    let cell = row.row().columns.get("magic").expect("meta column");
    String::from_utf8(cell.value.clone()).unwrap()
}

pub fn sorted(mut keys: Vec<i32>) -> Vec<i32> {
    keys.sort_unstable();
    keys
}
