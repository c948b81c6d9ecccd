//! Bounded, ranked collection of search hits.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::data::DataValue;
use crate::error::Result;
use crate::index::IndexEntry;
use crate::index::query::SortField;

/// Field values of a matched document, as indexed.
pub trait DocValues {
    fn value(&self, field: &str) -> Option<&DataValue>;
}

/// A matching document handed to a [`Collector`].
pub struct ScoredDoc<'a> {
    pub doc_id: u64,
    pub score: f32,
    pub entry: &'a IndexEntry,
    pub values: &'a dyn DocValues,
}

/// Receives matching documents during a search.
pub trait Collector {
    fn collect(&mut self, doc: ScoredDoc<'_>) -> Result<()>;

    /// Number of documents seen so far, kept or not.
    fn total_hits(&self) -> u64;
}

/// What a hit was ranked by.
#[derive(Debug, Clone, PartialEq)]
pub enum RankKey {
    Score(f32),
    /// The hit's values for the declared sort fields, in declaration order.
    Fields(Vec<DataValue>),
}

/// A collected hit, ready for row resolution.
#[derive(Debug, Clone)]
pub struct DocumentHit {
    pub doc_id: u64,
    pub rank: RankKey,
    pub entry: IndexEntry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SortValue {
    value: DataValue,
    reverse: bool,
}

impl Ord for SortValue {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.reverse {
            other.value.cmp(&self.value)
        } else {
            self.value.cmp(&other.value)
        }
    }
}

impl PartialOrd for SortValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug)]
enum Rank {
    Score(f32),
    Fields(Vec<SortValue>),
}

/// Heap element. Orders "better" hits first, so the heap's maximum is the
/// worst kept candidate.
#[derive(Debug)]
struct Candidate {
    doc_id: u64,
    rank: Rank,
    entry: IndexEntry,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_rank = match (&self.rank, &other.rank) {
            (Rank::Score(a), Rank::Score(b)) => b.total_cmp(a),
            (Rank::Fields(a), Rank::Fields(b)) => a.cmp(b),
            // A collector ranks every hit the same way.
            (Rank::Score(_), Rank::Fields(_)) => Ordering::Less,
            (Rank::Fields(_), Rank::Score(_)) => Ordering::Greater,
        };
        by_rank.then_with(|| self.doc_id.cmp(&other.doc_id))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

/// Keeps the best `limit` hits of a search.
///
/// Hits rank by the declared sort fields when there are any, otherwise by
/// descending score. Equal ranks fall back to ascending document id, which
/// is index insertion order.
#[derive(Debug)]
pub struct ResultCollector {
    limit: usize,
    sort: Vec<SortField>,
    heap: BinaryHeap<Candidate>,
    total_hits: u64,
}

impl ResultCollector {
    pub fn new(limit: usize) -> Self {
        Self::with_sort(limit, Vec::new())
    }

    pub fn with_sort(limit: usize, sort: Vec<SortField>) -> Self {
        Self {
            limit,
            sort,
            heap: BinaryHeap::with_capacity(limit.min(1024) + 1),
            total_hits: 0,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// The kept hits, best first.
    pub fn into_hits(self) -> Vec<DocumentHit> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|candidate| DocumentHit {
                doc_id: candidate.doc_id,
                rank: match candidate.rank {
                    Rank::Score(score) => RankKey::Score(score),
                    Rank::Fields(values) => {
                        RankKey::Fields(values.into_iter().map(|v| v.value).collect())
                    }
                },
                entry: candidate.entry,
            })
            .collect()
    }

    fn rank_of(&self, doc: &ScoredDoc<'_>) -> Rank {
        if self.sort.is_empty() {
            return Rank::Score(doc.score);
        }
        Rank::Fields(
            self.sort
                .iter()
                .map(|field| SortValue {
                    value: doc.values.value(&field.field).cloned().unwrap_or(DataValue::Null),
                    reverse: field.reverse,
                })
                .collect(),
        )
    }
}

impl Collector for ResultCollector {
    fn collect(&mut self, doc: ScoredDoc<'_>) -> Result<()> {
        self.total_hits += 1;
        if self.limit == 0 {
            return Ok(());
        }

        let candidate = Candidate {
            doc_id: doc.doc_id,
            rank: self.rank_of(&doc),
            entry: doc.entry.clone(),
        };

        if self.heap.len() < self.limit {
            self.heap.push(candidate);
        } else if let Some(worst) = self.heap.peek()
            && candidate < *worst
        {
            self.heap.pop();
            self.heap.push(candidate);
        }
        Ok(())
    }

    fn total_hits(&self) -> u64 {
        self.total_hits
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::storage::PartitionKey;

    struct Values(HashMap<String, DataValue>);

    impl DocValues for Values {
        fn value(&self, field: &str) -> Option<&DataValue> {
            self.0.get(field)
        }
    }

    fn feed(collector: &mut ResultCollector, docs: &[(u64, f32, &str)]) {
        for (doc_id, score, state) in docs {
            let entry = IndexEntry::new(PartitionKey::new(doc_id.to_be_bytes().to_vec()), doc_id.to_string(), 1);
            let values = Values(HashMap::from([("state".to_string(), DataValue::from(*state))]));
            collector
                .collect(ScoredDoc {
                    doc_id: *doc_id,
                    score: *score,
                    entry: &entry,
                    values: &values,
                })
                .unwrap();
        }
    }

    fn ids(hits: &[DocumentHit]) -> Vec<u64> {
        hits.iter().map(|h| h.doc_id).collect()
    }

    #[test]
    fn test_keeps_best_by_score() {
        let mut collector = ResultCollector::new(2);
        feed(&mut collector, &[(0, 0.5, "CA"), (1, 2.0, "NY"), (2, 1.0, "TX"), (3, 0.1, "LA")]);
        assert_eq!(collector.total_hits(), 4);
        let hits = collector.into_hits();
        assert_eq!(ids(&hits), vec![1, 2]);
        assert_eq!(hits[0].rank, RankKey::Score(2.0));
    }

    #[test]
    fn test_ties_break_by_doc_id() {
        let mut collector = ResultCollector::new(3);
        feed(&mut collector, &[(4, 1.0, "a"), (1, 1.0, "b"), (3, 1.0, "c"), (2, 1.0, "d")]);
        assert_eq!(ids(&collector.into_hits()), vec![1, 2, 3]);
    }

    #[test]
    fn test_sort_fields() {
        let mut collector = ResultCollector::with_sort(3, vec![SortField::new("state", false)]);
        feed(&mut collector, &[(0, 9.0, "TX"), (1, 1.0, "CA"), (2, 1.0, "NY"), (3, 1.0, "CA")]);
        assert_eq!(ids(&collector.into_hits()), vec![1, 3, 2]);

        let mut collector = ResultCollector::with_sort(2, vec![SortField::new("state", true)]);
        feed(&mut collector, &[(0, 9.0, "TX"), (1, 1.0, "CA"), (2, 1.0, "NY")]);
        let hits = collector.into_hits();
        assert_eq!(ids(&hits), vec![0, 2]);
        assert_eq!(hits[0].rank, RankKey::Fields(vec![DataValue::from("TX")]));
    }

    #[test]
    fn test_zero_limit_counts_only() {
        let mut collector = ResultCollector::new(0);
        feed(&mut collector, &[(0, 1.0, "CA")]);
        assert_eq!(collector.total_hits(), 1);
        assert!(collector.into_hits().is_empty());
    }
}
