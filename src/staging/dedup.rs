//! Within-chunk duplicate removal

use std::collections::HashSet;

use super::record::CanonicalRecord;

/// Records kept after deduplication, plus how many were dropped
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupOutcome {
    /// Survivors in their original relative order
    pub records: Vec<CanonicalRecord>,
    /// Number of records dropped as duplicates
    pub duplicates: usize,
}

/// Drop later occurrences of a `(product_id, sku_id, seller_name)` key within one chunk.
///
/// Records with any key component missing never collide and are always kept.
/// Nothing is remembered across chunks.
pub fn dedup_chunk(mut records: Vec<CanonicalRecord>) -> DedupOutcome {
    let before = records.len();
    let mut seen: HashSet<(i64, i64, String)> = HashSet::with_capacity(before);

    records.retain(|record| match record.dedup_key() {
        Some((product_id, sku_id, seller)) => {
            seen.insert((product_id, sku_id, seller.to_string()))
        }
        None => true,
    });

    DedupOutcome {
        duplicates: before - records.len(),
        records,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(product_id: Option<i64>, sku_id: Option<i64>, seller: Option<&str>) -> CanonicalRecord {
        let mut record = CanonicalRecord::new("f.csv", "b");
        record.product_id = product_id;
        record.sku_id = sku_id;
        record.seller_name = seller.map(str::to_string);
        record
    }

    #[test]
    fn test_first_occurrence_wins() {
        let mut first = record(Some(1), Some(10), Some("A"));
        first.price = Some(9.99);
        let mut second = record(Some(1), Some(10), Some("A"));
        second.price = Some(5.0);
        let other = record(Some(2), Some(20), Some("B"));

        let outcome = dedup_chunk(vec![first.clone(), second, other.clone()]);
        assert_eq!(outcome.duplicates, 1);
        assert_eq!(outcome.records, vec![first, other]);
    }

    #[test]
    fn test_incomplete_keys_never_collide() {
        let records = vec![
            record(Some(1), Some(10), None),
            record(Some(1), Some(10), None),
            record(None, Some(10), Some("A")),
            record(None, Some(10), Some("A")),
        ];

        let outcome = dedup_chunk(records);
        assert_eq!(outcome.duplicates, 0);
        assert_eq!(outcome.records.len(), 4);
    }

    #[test]
    fn test_seller_name_is_case_sensitive() {
        let outcome = dedup_chunk(vec![
            record(Some(1), Some(10), Some("Shop")),
            record(Some(1), Some(10), Some("shop")),
        ]);
        assert_eq!(outcome.duplicates, 0);
    }

    #[test]
    fn test_empty_chunk() {
        let outcome = dedup_chunk(Vec::new());
        assert_eq!(outcome, DedupOutcome::default());
    }
}
