//! A sharded, in-memory inverted index.
//!
//! Documents live in shards picked by the CRC32 of their partition key.
//! Writers copy the current snapshot on write, so a searcher keeps seeing
//! the documents that existed when it was acquired.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ahash::AHashMap;
use chrono::DateTime;
use log::debug;
use parking_lot::RwLock;

use crate::data::DataValue;
use crate::error::{Result, RowlensError};
use crate::index::analysis::analyze;
use crate::index::collector::{Collector, DocValues, ScoredDoc};
use crate::index::config::{FieldType, IndexConfig};
use crate::index::query::{BooleanClause, NativeQuery, Occur};
use crate::index::{IndexEntry, IndexSearcher, IndexWriter, SearchableIndex};
use crate::schema::TableSchema;
use crate::storage::{PartitionKey, StorageRow};
use crate::util::levenshtein::within_distance;

const BM25_K1: f32 = 1.2;
const BM25_B: f32 = 0.75;

#[derive(Debug, Clone)]
struct IndexedField {
    /// Terms in position order.
    terms: Vec<String>,
    value: DataValue,
}

#[derive(Debug, Clone)]
struct StoredDoc {
    doc_id: u64,
    entry: IndexEntry,
    fields: AHashMap<String, IndexedField>,
}

impl DocValues for StoredDoc {
    fn value(&self, field: &str) -> Option<&DataValue> {
        self.fields.get(field).map(|f| &f.value)
    }
}

#[derive(Debug, Clone, Default)]
struct FieldStats {
    doc_freq: AHashMap<String, usize>,
    total_terms: u64,
    docs: u64,
}

impl FieldStats {
    fn add(&mut self, field: &IndexedField) {
        self.docs += 1;
        self.total_terms += field.terms.len() as u64;
        for term in unique_terms(&field.terms) {
            *self.doc_freq.entry(term.clone()).or_default() += 1;
        }
    }

    fn remove(&mut self, field: &IndexedField) {
        self.docs = self.docs.saturating_sub(1);
        self.total_terms = self.total_terms.saturating_sub(field.terms.len() as u64);
        for term in unique_terms(&field.terms) {
            if let Some(count) = self.doc_freq.get_mut(term) {
                *count -= 1;
                if *count == 0 {
                    self.doc_freq.remove(term);
                }
            }
        }
    }
}

fn unique_terms(terms: &[String]) -> impl Iterator<Item = &String> {
    terms
        .iter()
        .enumerate()
        .filter(move |(i, term)| !terms[..*i].contains(term))
        .map(|(_, term)| term)
}

#[derive(Debug, Clone)]
struct Snapshot {
    shards: Vec<Vec<StoredDoc>>,
    stats: AHashMap<String, FieldStats>,
    next_doc_id: u64,
    doc_count: usize,
}

impl Snapshot {
    fn new(shards: usize) -> Self {
        Self {
            shards: vec![Vec::new(); shards],
            stats: AHashMap::new(),
            next_doc_id: 0,
            doc_count: 0,
        }
    }

    fn shard_of(&self, key: &PartitionKey) -> usize {
        crc32fast::hash(key.as_bytes()) as usize % self.shards.len()
    }

    fn insert(&mut self, entry: IndexEntry, fields: AHashMap<String, IndexedField>) -> u64 {
        let doc_id = self.next_doc_id;
        self.next_doc_id += 1;
        for (name, field) in &fields {
            self.stats.entry(name.clone()).or_default().add(field);
        }
        let shard = self.shard_of(&entry.key);
        self.shards[shard].push(StoredDoc {
            doc_id,
            entry,
            fields,
        });
        self.doc_count += 1;
        doc_id
    }

    fn remove_where(&mut self, key: &PartitionKey, pred: impl Fn(&StoredDoc) -> bool) -> usize {
        let shard = self.shard_of(key);
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.shards[shard])
            .into_iter()
            .partition(|doc| doc.entry.key == *key && pred(doc));
        self.shards[shard] = kept;
        for doc in &removed {
            for (name, field) in &doc.fields {
                if let Some(stats) = self.stats.get_mut(name) {
                    stats.remove(field);
                }
            }
        }
        self.doc_count -= removed.len();
        removed.len()
    }
}

/// In-memory implementation of the index seams.
///
/// `add_entry` appends a new document even when the partition already has
/// one, which is how stale entries come about; `upsert_entry` replaces them.
#[derive(Debug)]
pub struct MemoryIndex {
    config: Arc<IndexConfig>,
    snapshot: RwLock<Arc<Snapshot>>,
    open_searchers: Arc<AtomicUsize>,
}

impl MemoryIndex {
    pub fn new(config: Arc<IndexConfig>) -> Result<Self> {
        config.validate()?;
        let snapshot = Snapshot::new(config.shards);
        Ok(Self {
            config,
            snapshot: RwLock::new(Arc::new(snapshot)),
            open_searchers: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn config(&self) -> &Arc<IndexConfig> {
        &self.config
    }

    /// Index a document for `entry`. Values of fields the configuration does
    /// not declare are ignored, as are nulls.
    pub fn add_entry<I, S>(&self, entry: IndexEntry, values: I) -> Result<u64>
    where
        I: IntoIterator<Item = (S, DataValue)>,
        S: Into<String>,
    {
        let fields = self.index_fields(values)?;
        let mut snapshot = self.snapshot.write();
        Ok(Arc::make_mut(&mut snapshot).insert(entry, fields))
    }

    /// Replace every document of the entry's partition with a new one.
    pub fn upsert_entry<I, S>(&self, entry: IndexEntry, values: I) -> Result<u64>
    where
        I: IntoIterator<Item = (S, DataValue)>,
        S: Into<String>,
    {
        let fields = self.index_fields(values)?;
        let mut snapshot = self.snapshot.write();
        let snapshot = Arc::make_mut(&mut snapshot);
        let key = entry.key.clone();
        snapshot.remove_where(&key, |_| true);
        Ok(snapshot.insert(entry, fields))
    }

    /// Index the current state of a stored row.
    ///
    /// The entry's timestamp is the newest write among the indexed columns.
    pub fn index_row(&self, schema: &TableSchema, row: &StorageRow) -> Result<u64> {
        let mut values = Vec::new();
        let mut timestamp = i64::MIN;
        for (column, cell) in row.columns.iter() {
            if !self.config.is_indexed(column) {
                continue;
            }
            if let Some(value) = row.value(schema, column)? {
                values.push((column.to_string(), value));
                timestamp = timestamp.max(cell.timestamp);
            }
        }
        if timestamp == i64::MIN {
            timestamp = row.columns.iter().map(|(_, c)| c.timestamp).max().unwrap_or(0);
        }
        let entry = IndexEntry::new(row.key.clone(), schema.key_string(&row.key)?, timestamp);
        self.upsert_entry(entry, values)
    }

    /// Number of live documents.
    pub fn len(&self) -> usize {
        self.snapshot.read().doc_count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of searchers handed out and not yet dropped.
    pub fn open_searchers(&self) -> usize {
        self.open_searchers.load(Ordering::SeqCst)
    }

    fn index_fields<I, S>(&self, values: I) -> Result<AHashMap<String, IndexedField>>
    where
        I: IntoIterator<Item = (S, DataValue)>,
        S: Into<String>,
    {
        let mut fields = AHashMap::new();
        for (name, value) in values {
            let name = name.into();
            let Some(field_type) = self.config.field_type(&name) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let field = index_value(&name, field_type, value)?;
            fields.insert(name, field);
        }
        Ok(fields)
    }
}

fn index_value(name: &str, field_type: FieldType, value: DataValue) -> Result<IndexedField> {
    let mismatch = |value: &DataValue| {
        RowlensError::index(format!("field '{name}' of type {field_type:?} cannot index '{value}'"))
    };

    let value = match field_type {
        FieldType::Text => {
            let text = value.to_string();
            return Ok(IndexedField {
                terms: analyze(&text),
                value: DataValue::Text(text),
            });
        }
        FieldType::String => DataValue::Text(value.to_string()),
        FieldType::Integer | FieldType::Long | FieldType::Float | FieldType::Double => {
            if !value.is_numeric() {
                return Err(mismatch(&value));
            }
            value
        }
        FieldType::Boolean => match &value {
            DataValue::Boolean(_) => value,
            DataValue::Text(text) => match text.to_ascii_lowercase().as_str() {
                "true" => DataValue::Boolean(true),
                "false" => DataValue::Boolean(false),
                _ => return Err(mismatch(&value)),
            },
            _ => return Err(mismatch(&value)),
        },
        FieldType::Date => match &value {
            DataValue::Timestamp(_) => value,
            DataValue::Int(_) | DataValue::BigInt(_) => {
                let millis = value.as_f64().map(|v| v as i64).unwrap_or_default();
                DateTime::from_timestamp_millis(millis)
                    .map(DataValue::Timestamp)
                    .ok_or_else(|| mismatch(&value))?
            }
            _ => return Err(mismatch(&value)),
        },
    };

    Ok(IndexedField {
        terms: vec![value.to_string()],
        value,
    })
}

impl SearchableIndex for MemoryIndex {
    fn acquire_searcher(&self) -> Result<Box<dyn IndexSearcher>> {
        let snapshot = Arc::clone(&self.snapshot.read());
        self.open_searchers.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySearcher {
            snapshot,
            _lease: SearcherLease {
                open: Arc::clone(&self.open_searchers),
            },
        }))
    }
}

impl IndexWriter for MemoryIndex {
    fn delete_partition(&self, key: &PartitionKey) -> Result<usize> {
        let mut snapshot = self.snapshot.write();
        let removed = Arc::make_mut(&mut snapshot).remove_where(key, |_| true);
        debug!("deleted {removed} documents of partition {key:?}");
        Ok(removed)
    }

    fn delete_entry(&self, key: &PartitionKey, key_string: &str, timestamp: i64) -> Result<usize> {
        let mut snapshot = self.snapshot.write();
        let removed =
            Arc::make_mut(&mut snapshot).remove_where(key, |doc| doc.entry.timestamp == timestamp);
        debug!("deleted {removed} documents of partition {key_string} at {timestamp}");
        Ok(removed)
    }
}

#[derive(Debug)]
struct SearcherLease {
    open: Arc<AtomicUsize>,
}

impl Drop for SearcherLease {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug)]
struct MemorySearcher {
    snapshot: Arc<Snapshot>,
    _lease: SearcherLease,
}

impl MemorySearcher {
    fn score(&self, query: &NativeQuery, doc: &StoredDoc) -> Option<f32> {
        match query {
            NativeQuery::All => Some(1.0),
            NativeQuery::Term { field, term } => {
                let indexed = doc.fields.get(field)?;
                let tf = indexed.terms.iter().filter(|t| *t == term).count();
                (tf > 0).then(|| self.bm25(field, term, tf, indexed.terms.len()))
            }
            NativeQuery::Phrase { field, terms, slop } => {
                let indexed = doc.fields.get(field)?;
                let freq = phrase_freq(&indexed.terms, terms, *slop as usize);
                (freq > 0).then(|| {
                    terms
                        .iter()
                        .map(|term| self.bm25(field, term, freq, indexed.terms.len()))
                        .sum()
                })
            }
            NativeQuery::Prefix { field, prefix } => {
                self.any_term(doc, field, |term| term.starts_with(prefix.as_str()))
            }
            NativeQuery::Pattern { field, regex } => {
                self.any_term(doc, field, |term| regex.is_match(term))
            }
            NativeQuery::Fuzzy {
                field,
                term,
                max_edits,
            } => self.any_term(doc, field, |candidate| {
                within_distance(candidate, term, *max_edits as usize)
            }),
            NativeQuery::Range {
                field,
                lower,
                upper,
            } => {
                let indexed = doc.fields.get(field)?;
                let matched = match &indexed.value {
                    // Text ranges run over terms, like any other term query.
                    DataValue::Text(_) => indexed.terms.iter().any(|term| {
                        NativeQuery::in_range(&DataValue::Text(term.clone()), lower, upper)
                    }),
                    value => NativeQuery::in_range(value, lower, upper),
                };
                matched.then_some(1.0)
            }
            NativeQuery::Boolean(clauses) => self.score_boolean(clauses, doc),
        }
    }

    fn score_boolean(&self, clauses: &[BooleanClause], doc: &StoredDoc) -> Option<f32> {
        let mut score = 0.0;
        let mut required = false;
        let mut should_matched = false;
        for clause in clauses {
            let matched = self.score(&clause.query, doc);
            match clause.occur {
                Occur::Must => {
                    required = true;
                    score += matched?;
                }
                Occur::Filter => {
                    required = true;
                    matched?;
                }
                Occur::MustNot => {
                    if matched.is_some() {
                        return None;
                    }
                }
                Occur::Should => {
                    if let Some(s) = matched {
                        should_matched = true;
                        score += s;
                    }
                }
            }
        }
        (required || should_matched).then_some(score)
    }

    /// Constant score for multi-term queries.
    fn any_term(&self, doc: &StoredDoc, field: &str, pred: impl Fn(&str) -> bool) -> Option<f32> {
        let indexed = doc.fields.get(field)?;
        indexed.terms.iter().any(|t| pred(t)).then_some(1.0)
    }

    fn bm25(&self, field: &str, term: &str, tf: usize, len: usize) -> f32 {
        let docs = self.snapshot.doc_count.max(1) as f32;
        let (df, avg_len) = match self.snapshot.stats.get(field) {
            Some(stats) => (
                stats.doc_freq.get(term).copied().unwrap_or(1) as f32,
                (stats.total_terms as f32 / stats.docs.max(1) as f32).max(1.0),
            ),
            None => (1.0, 1.0),
        };
        let idf = (1.0 + (docs - df + 0.5) / (df + 0.5)).ln();
        let tf = tf as f32;
        let norm = BM25_K1 * (1.0 - BM25_B + BM25_B * len as f32 / avg_len);
        idf * tf * (BM25_K1 + 1.0) / (tf + norm)
    }
}

/// Number of positions where `phrase` starts and each following term shows
/// up within `slop` extra positions of the previous one.
fn phrase_freq(terms: &[String], phrase: &[String], slop: usize) -> usize {
    let Some((first, rest)) = phrase.split_first() else {
        return 0;
    };
    terms
        .iter()
        .enumerate()
        .filter(|(_, term)| *term == first)
        .filter(|(start, _)| {
            let mut position = *start;
            rest.iter().all(|wanted| {
                let window = terms
                    .iter()
                    .enumerate()
                    .skip(position + 1)
                    .take(slop + 1)
                    .find(|(_, term)| *term == wanted);
                match window {
                    Some((found, _)) => {
                        position = found;
                        true
                    }
                    None => false,
                }
            })
        })
        .count()
}

impl IndexSearcher for MemorySearcher {
    fn max_doc(&self) -> usize {
        self.snapshot.doc_count
    }

    fn search(&self, query: &NativeQuery, collector: &mut dyn Collector) -> Result<()> {
        for shard in &self.snapshot.shards {
            for doc in shard {
                if let Some(score) = self.score(query, doc) {
                    collector.collect(ScoredDoc {
                        doc_id: doc.doc_id,
                        score,
                        entry: &doc.entry,
                        values: doc,
                    })?;
                }
            }
        }
        Ok(())
    }
}
