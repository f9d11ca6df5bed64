// crates/core/src/progress.rs
//! Compact representation of the set of completed job numbers.
//!
//! The set is "mostly a prefix": `floor` is the largest number below which
//! everything is complete, `above` holds the sparse completions past the
//! first gap. A store with floor 2 and above `{4, 5}` represents
//! `{0, 1, 2, 4, 5}`; adding 3 collapses it to floor 5.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::ParseProgressError;
use crate::task::JobNumber;

/// Set of completed job numbers with a contiguous prefix and a sparse tail.
///
/// `floor` is signed so a store that contains nothing yet can sit one below
/// the first job number (a fresh sequence starting at 0 has floor −1).
/// Invariants, restored after every mutation: every element of `above` is
/// strictly greater than `floor`, and `floor + 1` is never in `above`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressStore {
    floor: i64,
    above: BTreeSet<JobNumber>,
}

impl Default for ProgressStore {
    /// The empty store: contains no number at all.
    fn default() -> Self {
        Self::new(-1)
    }
}

impl ProgressStore {
    /// A store where everything at or below `floor` is complete.
    pub fn new(floor: i64) -> Self {
        Self {
            floor,
            above: BTreeSet::new(),
        }
    }

    /// A store with sparse completions past the prefix. Entries at or below
    /// `floor` are absorbed immediately.
    pub fn with_above(floor: i64, above: impl IntoIterator<Item = JobNumber>) -> Self {
        let mut store = Self {
            floor,
            above: above.into_iter().collect(),
        };
        store.normalize();
        store
    }

    pub fn floor(&self) -> i64 {
        self.floor
    }

    /// Whether `num` has been completed.
    pub fn contains(&self, num: JobNumber) -> bool {
        num as i64 <= self.floor || self.above.contains(&num)
    }

    /// Record `num` as complete. Idempotent.
    pub fn add(&mut self, num: JobNumber) {
        if num as i64 <= self.floor {
            return;
        }
        self.above.insert(num);
        self.normalize();
    }

    /// The numbers strictly between the floor and the smallest sparse
    /// completion, in order. Empty when there is no sparse tail.
    pub fn missing(&self) -> Vec<JobNumber> {
        match self.above.first() {
            Some(&min) => ((self.floor + 1) as JobNumber..min).collect(),
            None => Vec::new(),
        }
    }

    /// Absorb any contiguous run starting at `floor + 1` into the floor and
    /// drop entries the floor has swallowed.
    fn normalize(&mut self) {
        while let Some(&min) = self.above.first() {
            if min as i64 <= self.floor {
                self.above.pop_first();
            } else if min as i64 == self.floor + 1 {
                self.floor += 1;
                self.above.pop_first();
            } else {
                break;
            }
        }
    }
}

/// Serialized form: `<floor>&<csv-of-above>`, the sparse tail in sorted
/// order. An empty tail leaves nothing after the `&`.
impl fmt::Display for ProgressStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}&", self.floor)?;
        let mut first = true;
        for num in &self.above {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{num}")?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for ProgressStore {
    type Err = ParseProgressError;

    /// Split on the first `&`; empty segments in the list are skipped.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (floor_text, list_text) = s
            .split_once('&')
            .ok_or(ParseProgressError::MissingSeparator)?;
        let floor = floor_text
            .parse::<i64>()
            .map_err(|source| ParseProgressError::InvalidNumber {
                text: floor_text.to_string(),
                source,
            })?;
        let mut above = BTreeSet::new();
        for part in list_text.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let num = part
                .parse::<JobNumber>()
                .map_err(|source| ParseProgressError::InvalidNumber {
                    text: part.to_string(),
                    source,
                })?;
            above.insert(num);
        }
        let mut store = Self { floor, above };
        store.normalize();
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_store_contains_nothing() {
        let store = ProgressStore::default();
        assert_eq!(store.floor(), -1);
        assert!(!store.contains(0));
        assert!(store.missing().is_empty());
    }

    #[test]
    fn test_add_zero_raises_floor() {
        let mut store = ProgressStore::default();
        store.add(0);
        assert_eq!(store.floor(), 0);
        assert!(store.contains(0));
    }

    #[test]
    fn test_compaction_absorbs_contiguous_run() {
        // floor 2 + {4, 5}: adding 3 collapses everything into the floor.
        let mut store = ProgressStore::with_above(2, [4, 5]);
        store.add(3);
        assert_eq!(store.floor(), 5);
        assert!(store.missing().is_empty());
        assert_eq!(store.to_string(), "5&");
    }

    #[test]
    fn test_missing_stops_at_first_sparse_entry() {
        let store = ProgressStore::with_above(0, [3, 5]);
        assert_eq!(store.missing(), vec![1, 2]);
        assert!(!store.contains(4));
        assert!(store.contains(5));
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut store = ProgressStore::with_above(0, [3]);
        store.add(3);
        store.add(3);
        assert_eq!(store, ProgressStore::with_above(0, [3]));
    }

    #[test]
    fn test_contains_is_monotone() {
        let mut store = ProgressStore::default();
        for num in [5, 0, 3, 1, 2, 4] {
            store.add(num);
            assert!(store.contains(num));
        }
        for num in 0..=5 {
            assert!(store.contains(num));
        }
        assert_eq!(store.floor(), 5);
    }

    #[test]
    fn test_constructor_absorbs_low_entries() {
        let store = ProgressStore::with_above(4, [1, 2, 5, 9]);
        assert_eq!(store.floor(), 5);
        assert_eq!(store.missing(), vec![6, 7, 8]);
    }

    #[test]
    fn test_serialize_round_trip() {
        let store = ProgressStore::with_above(7, [10, 12]);
        let parsed: ProgressStore = store.to_string().parse().unwrap();
        assert_eq!(parsed, store);
    }

    #[test]
    fn test_serialize_is_canonical() {
        let a = ProgressStore::with_above(2, [5, 4, 7]);
        let b = ProgressStore::with_above(2, [7, 5, 4]);
        assert_eq!(a.to_string(), b.to_string());
        assert_eq!(a.to_string(), "2&4,5,7");
    }

    #[test]
    fn test_empty_tail_round_trips() {
        let store = ProgressStore::new(41);
        assert_eq!(store.to_string(), "41&");
        let parsed: ProgressStore = "41&".parse().unwrap();
        assert_eq!(parsed, store);
    }

    #[test]
    fn test_parse_skips_empty_segments_and_whitespace() {
        let parsed: ProgressStore = " 3&5,,7, \n".parse().unwrap();
        assert_eq!(parsed, ProgressStore::with_above(3, [5, 7]));
    }

    #[test]
    fn test_parse_normalizes() {
        let parsed: ProgressStore = "2&3,4,9".parse().unwrap();
        assert_eq!(parsed.floor(), 4);
        assert_eq!(parsed.missing(), vec![5, 6, 7, 8]);
    }

    #[test]
    fn test_parse_negative_floor() {
        let parsed: ProgressStore = "-1&2".parse().unwrap();
        assert!(!parsed.contains(0));
        assert!(parsed.contains(2));
        assert_eq!(parsed.missing(), vec![0, 1]);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            "12".parse::<ProgressStore>(),
            Err(ParseProgressError::MissingSeparator)
        ));
        assert!(matches!(
            "a&1".parse::<ProgressStore>(),
            Err(ParseProgressError::InvalidNumber { .. })
        ));
        assert!(matches!(
            "1&2,x".parse::<ProgressStore>(),
            Err(ParseProgressError::InvalidNumber { .. })
        ));
    }
}
