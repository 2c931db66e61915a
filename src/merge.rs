//! Merging top hits from several queries.
//!
//! When the same query runs against several shards, segments or nodes, each
//! run returns its own top hits, already sorted. [`merge`] combines them into
//! a single top-N list as if one query had run over everything.
//!
//! Hits compare on the sort fields first. Remaining ties go to the hit from
//! the shard listed first, then to the hit with the lowest `doc`, so merging
//! is deterministic.
//!
//! ```
//! use nestor::merge::{merge, MergeSortField, ScoreDoc, TopDocs};
//!
//! let shard0 = TopDocs::new(2, vec![ScoreDoc::new(0, 1.5), ScoreDoc::new(1, 0.8)]);
//! let shard1 = TopDocs::new(2, vec![ScoreDoc::new(0, 1.7), ScoreDoc::new(1, 1.2)]);
//!
//! let sort = [MergeSortField::Score { reverse: false }];
//! let merged = merge(Some(&sort), 10, &[shard0, shard1]).unwrap();
//!
//! let order: Vec<(usize, usize)> = merged
//!     .score_docs
//!     .iter()
//!     .map(|d| (d.shard_index, d.doc))
//!     .collect();
//! assert_eq!(order, vec![(1, 0), (0, 0), (1, 1), (0, 1)]);
//! assert_eq!(merged.total_hits, 4);
//! ```

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde_json::Value;

use crate::error::{NestorError, Result};

/// A sort value returned with a hit.
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    /// The document has no value for the sort field.
    Null,
    Long(i64),
    Double(f64),
    Text(String),
}

impl SortValue {
    /// Convert a JSON sort value as returned by the backend.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => SortValue::Null,
            Value::Bool(b) => SortValue::Long(i64::from(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => SortValue::Long(i),
                None => SortValue::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => SortValue::Text(s.clone()),
            other => SortValue::Text(other.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SortValue::Null)
    }

    /// Compare two non-null values; numbers sort before text.
    fn compare(&self, other: &SortValue) -> Ordering {
        match (self, other) {
            (SortValue::Long(a), SortValue::Long(b)) => a.cmp(b),
            (SortValue::Long(a), SortValue::Double(b)) => compare_long_double(*a, *b),
            (SortValue::Double(a), SortValue::Long(b)) => compare_long_double(*b, *a).reverse(),
            (SortValue::Double(a), SortValue::Double(b)) => a.total_cmp(b),
            (SortValue::Text(a), SortValue::Text(b)) => a.cmp(b),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            SortValue::Null => 0,
            SortValue::Long(_) | SortValue::Double(_) => 1,
            SortValue::Text(_) => 2,
        }
    }
}

/// Compare a long with a double without rounding the long.
fn compare_long_double(long: i64, double: f64) -> Ordering {
    // 2^63: the first double above every i64.
    const LONG_BOUND: f64 = 9_223_372_036_854_775_808.0;

    if double.is_nan() {
        return (long as f64).total_cmp(&double);
    }
    if double >= LONG_BOUND {
        return Ordering::Less;
    }
    if double < -LONG_BOUND {
        return Ordering::Greater;
    }
    let whole = double.trunc();
    // In range and integral, so the cast is exact.
    long.cmp(&(whole as i64)).then_with(|| {
        if double > whole {
            Ordering::Less
        } else if double < whole {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    })
}

/// How one sort criterion compares hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeSortField {
    /// Compare scores, highest first unless `reverse`.
    Score { reverse: bool },
    /// Compare the sort value at this position, lowest first unless
    /// `reverse`. Null values go last or first regardless of `reverse`.
    Field { reverse: bool, missing_last: bool },
    /// Compare `doc`, lowest first.
    Doc,
}

/// A single hit.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreDoc {
    /// Position of the hit within its shard.
    pub doc: usize,
    pub score: f32,
    /// Index of the shard in the merged input; set by [`merge`].
    pub shard_index: usize,
    /// One value per sort criterion.
    pub sort_values: Vec<SortValue>,
}

impl ScoreDoc {
    pub fn new(doc: usize, score: f32) -> Self {
        ScoreDoc {
            doc,
            score,
            shard_index: 0,
            sort_values: Vec::new(),
        }
    }

    pub fn with_sort_values(mut self, sort_values: Vec<SortValue>) -> Self {
        self.sort_values = sort_values;
        self
    }
}

/// The top hits of one query, sorted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TopDocs {
    pub total_hits: u64,
    pub score_docs: Vec<ScoreDoc>,
}

impl TopDocs {
    pub fn new(total_hits: u64, score_docs: Vec<ScoreDoc>) -> Self {
        TopDocs {
            total_hits,
            score_docs,
        }
    }
}

/// Merge the first `top_n` hits of `shards`.
///
/// With `sort == None`, hits are ordered by descending score.
pub fn merge(sort: Option<&[MergeSortField]>, top_n: usize, shards: &[TopDocs]) -> Result<TopDocs> {
    merge_from(sort, 0, top_n, shards)
}

/// Merge `shards` and return `size` hits starting at rank `start`.
pub fn merge_from(
    sort: Option<&[MergeSortField]>,
    start: usize,
    size: usize,
    shards: &[TopDocs],
) -> Result<TopDocs> {
    let sort = sort.unwrap_or(&[MergeSortField::Score { reverse: false }]);
    validate_sort_values(sort, shards)?;

    let total_hits = shards.iter().map(|shard| shard.total_hits).sum();

    let mut queue: BinaryHeap<Cursor<'_>> = shards
        .iter()
        .enumerate()
        .filter(|(_, shard)| !shard.score_docs.is_empty())
        .map(|(shard_index, shard)| Cursor {
            shard_index,
            position: 0,
            hits: &shard.score_docs,
            sort,
        })
        .collect();

    let end = start.saturating_add(size);
    let mut score_docs = Vec::with_capacity(size.min(64));
    let mut rank = 0;

    while rank < end {
        let Some(mut cursor) = queue.pop() else {
            break;
        };

        if rank >= start {
            let mut hit = cursor.current().clone();
            hit.shard_index = cursor.shard_index;
            score_docs.push(hit);
        }
        rank += 1;

        cursor.position += 1;
        if cursor.position < cursor.hits.len() {
            queue.push(cursor);
        }
    }

    Ok(TopDocs {
        total_hits,
        score_docs,
    })
}

/// Hits carry one sort value per criterion. Hits may carry none when no
/// criterion reads sort values.
fn validate_sort_values(sort: &[MergeSortField], shards: &[TopDocs]) -> Result<()> {
    let needs_values = sort.iter().any(|f| matches!(f, MergeSortField::Field { .. }));
    for (shard_index, shard) in shards.iter().enumerate() {
        for hit in &shard.score_docs {
            let count = hit.sort_values.len();
            if count != sort.len() && (needs_values || count > 0) {
                return Err(NestorError::invalid_argument(format!(
                    "Hit {} of shard {shard_index} has {} sort values, expected {}",
                    hit.doc,
                    hit.sort_values.len(),
                    sort.len()
                )));
            }
        }
    }
    Ok(())
}

/// Compare two hits; `Less` means `a` ranks before `b`.
fn compare_hits(
    a: &ScoreDoc,
    a_shard: usize,
    b: &ScoreDoc,
    b_shard: usize,
    sort: &[MergeSortField],
) -> Ordering {
    for (position, field) in sort.iter().enumerate() {
        let ordering = match field {
            MergeSortField::Score { reverse } => {
                let ordering = b.score.total_cmp(&a.score);
                if *reverse { ordering.reverse() } else { ordering }
            }
            MergeSortField::Doc => a.doc.cmp(&b.doc),
            MergeSortField::Field {
                reverse,
                missing_last,
            } => {
                let null = SortValue::Null;
                let va = a.sort_values.get(position).unwrap_or(&null);
                let vb = b.sort_values.get(position).unwrap_or(&null);
                match (va.is_null(), vb.is_null()) {
                    (true, true) => Ordering::Equal,
                    (true, false) if *missing_last => Ordering::Greater,
                    (true, false) => Ordering::Less,
                    (false, true) if *missing_last => Ordering::Less,
                    (false, true) => Ordering::Greater,
                    (false, false) => {
                        let ordering = va.compare(vb);
                        if *reverse { ordering.reverse() } else { ordering }
                    }
                }
            }
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    a_shard.cmp(&b_shard).then(a.doc.cmp(&b.doc))
}

/// The next unconsumed hit of one shard.
struct Cursor<'a> {
    shard_index: usize,
    position: usize,
    hits: &'a [ScoreDoc],
    sort: &'a [MergeSortField],
}

impl Cursor<'_> {
    fn current(&self) -> &ScoreDoc {
        &self.hits[self.position]
    }
}

impl Ord for Cursor<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap pops the greatest element: invert so the best hit wins.
        compare_hits(
            other.current(),
            other.shard_index,
            self.current(),
            self.shard_index,
            self.sort,
        )
    }
}

impl PartialOrd for Cursor<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Cursor<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Cursor<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order(top_docs: &TopDocs) -> Vec<(usize, usize)> {
        top_docs
            .score_docs
            .iter()
            .map(|d| (d.shard_index, d.doc))
            .collect()
    }

    #[test]
    fn test_score_ascending() {
        let shard0 = TopDocs::new(2, vec![ScoreDoc::new(0, 0.8), ScoreDoc::new(1, 1.5)]);
        let shard1 = TopDocs::new(2, vec![ScoreDoc::new(0, 1.2), ScoreDoc::new(1, 1.7)]);
        let sort = [MergeSortField::Score { reverse: true }];

        let merged = merge(Some(&sort), 10, &[shard0, shard1]).unwrap();
        assert_eq!(order(&merged), vec![(0, 0), (1, 0), (0, 1), (1, 1)]);
    }

    #[test]
    fn test_ties_go_to_first_shard() {
        let shard0 = TopDocs::new(1, vec![ScoreDoc::new(5, 1.0)]);
        let shard1 = TopDocs::new(1, vec![ScoreDoc::new(0, 1.0)]);
        let merged = merge(None, 10, &[shard0, shard1]).unwrap();
        assert_eq!(order(&merged), vec![(0, 5), (1, 0)]);
    }

    #[test]
    fn test_field_sort_with_missing_values() {
        let sort = [MergeSortField::Field {
            reverse: false,
            missing_last: true,
        }];
        let shard0 = TopDocs::new(
            2,
            vec![
                ScoreDoc::new(0, f32::NAN).with_sort_values(vec![SortValue::Long(1)]),
                ScoreDoc::new(1, f32::NAN).with_sort_values(vec![SortValue::Null]),
            ],
        );
        let shard1 = TopDocs::new(
            1,
            vec![ScoreDoc::new(0, f32::NAN).with_sort_values(vec![SortValue::Double(0.5)])],
        );

        let merged = merge(Some(&sort), 10, &[shard0.clone(), shard1.clone()]).unwrap();
        assert_eq!(order(&merged), vec![(1, 0), (0, 0), (0, 1)]);

        let first = [MergeSortField::Field {
            reverse: true,
            missing_last: false,
        }];
        let shard0_desc = TopDocs::new(
            2,
            vec![
                ScoreDoc::new(0, f32::NAN).with_sort_values(vec![SortValue::Null]),
                ScoreDoc::new(1, f32::NAN).with_sort_values(vec![SortValue::Long(1)]),
            ],
        );
        let merged = merge(Some(&first), 10, &[shard0_desc, shard1]).unwrap();
        assert_eq!(order(&merged), vec![(0, 0), (0, 1), (1, 0)]);
    }

    #[test]
    fn test_paging_and_total() {
        let shard0 = TopDocs::new(10, vec![ScoreDoc::new(0, 3.0), ScoreDoc::new(1, 1.0)]);
        let shard1 = TopDocs::new(7, vec![ScoreDoc::new(0, 2.0), ScoreDoc::new(1, 0.5)]);

        let page = merge_from(None, 1, 2, &[shard0.clone(), shard1.clone()]).unwrap();
        assert_eq!(page.total_hits, 17);
        assert_eq!(order(&page), vec![(1, 0), (0, 1)]);

        let beyond = merge_from(None, 10, 5, &[shard0, shard1]).unwrap();
        assert!(beyond.score_docs.is_empty());
        assert_eq!(beyond.total_hits, 17);
    }

    #[test]
    fn test_missing_sort_values_rejected() {
        let sort = [
            MergeSortField::Score { reverse: false },
            MergeSortField::Field {
                reverse: false,
                missing_last: true,
            },
        ];
        let shard = TopDocs::new(1, vec![ScoreDoc::new(0, 1.0)]);
        assert!(merge(Some(&sort), 10, &[shard]).is_err());
    }

    #[test]
    fn test_sort_values_must_match_score_sort() {
        let sort = [MergeSortField::Score { reverse: false }];
        let values = vec![SortValue::Long(1), SortValue::Long(2), SortValue::Long(3)];
        let shard = TopDocs::new(1, vec![ScoreDoc::new(0, 1.0).with_sort_values(values)]);
        assert!(matches!(
            merge(Some(&sort), 10, &[shard.clone()]),
            Err(NestorError::InvalidArgument(_))
        ));
        assert!(merge(None, 10, &[shard]).is_err());

        let matching = TopDocs::new(
            1,
            vec![ScoreDoc::new(0, 1.0).with_sort_values(vec![SortValue::Double(1.0)])],
        );
        assert!(merge(Some(&sort), 10, &[matching]).is_ok());

        let index_order = [MergeSortField::Doc];
        let unvalued = TopDocs::new(1, vec![ScoreDoc::new(0, 1.0)]);
        assert!(merge(Some(&index_order), 10, &[unvalued]).is_ok());
    }

    #[test]
    fn test_long_and_double_compare_exactly() {
        let big = (1i64 << 53) + 1;
        let rounded = SortValue::Double((1i64 << 53) as f64);
        assert_eq!(SortValue::Long(big).compare(&rounded), Ordering::Greater);
        assert_eq!(rounded.compare(&SortValue::Long(big)), Ordering::Less);

        assert_eq!(
            SortValue::Long(2).compare(&SortValue::Double(2.0)),
            Ordering::Equal
        );
        assert_eq!(
            SortValue::Long(2).compare(&SortValue::Double(2.5)),
            Ordering::Less
        );
        assert_eq!(
            SortValue::Long(-2).compare(&SortValue::Double(-2.5)),
            Ordering::Greater
        );
        assert_eq!(
            SortValue::Long(i64::MAX).compare(&SortValue::Double(9.3e18)),
            Ordering::Less
        );
        assert_eq!(
            SortValue::Long(i64::MIN).compare(&SortValue::Double(-9.3e18)),
            Ordering::Greater
        );

        let sort = [MergeSortField::Field {
            reverse: false,
            missing_last: true,
        }];
        let shard0 = TopDocs::new(
            1,
            vec![ScoreDoc::new(0, 1.0).with_sort_values(vec![SortValue::Long(big)])],
        );
        let shard1 = TopDocs::new(1, vec![ScoreDoc::new(0, 1.0).with_sort_values(vec![rounded])]);
        let merged = merge(Some(&sort), 10, &[shard0, shard1]).unwrap();
        assert_eq!(order(&merged), vec![(1, 0), (0, 0)]);
    }

    #[test]
    fn test_sort_value_from_json() {
        assert_eq!(SortValue::from_json(&json!(null)), SortValue::Null);
        assert_eq!(SortValue::from_json(&json!(12)), SortValue::Long(12));
        assert_eq!(SortValue::from_json(&json!(1.5)), SortValue::Double(1.5));
        assert_eq!(SortValue::from_json(&json!("x")), SortValue::Text("x".to_string()));
        assert_eq!(SortValue::from_json(&json!(true)), SortValue::Long(1));
    }

    #[test]
    fn test_empty_input() {
        let merged = merge(None, 10, &[]).unwrap();
        assert_eq!(merged, TopDocs::default());
    }
}
