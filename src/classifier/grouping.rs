//! Partitioning of production records into per-well chronological histories.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::models::ProductionRecord;

// ---

/// Identity of one producing entity: a well number within a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WellKey<'a> {
    pub well_id: i64,
    pub pool: &'a str,
}

/// One well's rows in chronological order.
///
/// `rows[i]` is the input index of the record at position `i` of the history,
/// so a record's 0-based position within its group is its offset in `rows`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WellHistory<'a> {
    pub key: WellKey<'a>,
    pub rows: Vec<usize>,
}

impl WellHistory<'_> {
    /// `(position, input index)` pairs in chronological order.
    pub fn positions(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.rows.iter().copied().enumerate()
    }
}

/// Result of partitioning a record set.
///
/// Every input index appears exactly once, either in one history or in `undated`.
#[derive(Debug, Default)]
pub struct Partition<'a> {
    pub histories: Vec<WellHistory<'a>>,
    /// Records whose reporting date is missing; they take no part in ordering.
    pub undated: Vec<usize>,
}

/// Group records by (well, pool) and order each group by reporting date.
///
/// Rows sharing a date are ordered by their values (see [`chronological`]),
/// so the result does not depend on the order rows were loaded in. Only rows
/// identical in every loaded column fall back to input order. Histories come
/// out sorted by key.
pub fn partition(records: &[ProductionRecord]) -> Partition<'_> {
    // ---
    let mut groups: BTreeMap<WellKey<'_>, Vec<usize>> = BTreeMap::new();
    let mut undated = Vec::new();

    for (idx, record) in records.iter().enumerate() {
        if record.report_date.is_none() {
            undated.push(idx);
            continue;
        }
        let key = WellKey {
            well_id: record.well_id,
            pool: &record.pool,
        };
        groups.entry(key).or_default().push(idx);
    }

    let histories = groups
        .into_iter()
        .map(|(key, mut rows)| {
            rows.sort_by(|&a, &b| chronological(&records[a], &records[b]).then(a.cmp(&b)));
            WellHistory { key, rows }
        })
        .collect();

    Partition { histories, undated }
}

/// Order within a group: date, then oil ascending (missing last), then the
/// remaining columns.
fn chronological(a: &ProductionRecord, b: &ProductionRecord) -> Ordering {
    // ---
    a.report_date
        .cmp(&b.report_date)
        .then_with(|| cmp_volume(a.oil_volume, b.oil_volume))
        .then_with(|| a.api_no.cmp(&b.api_no))
        .then_with(|| cmp_volume(a.carried.water_volume, b.carried.water_volume))
        .then_with(|| cmp_volume(a.carried.gas_volume, b.carried.gas_volume))
        .then_with(|| cmp_volume(a.carried.days_produced, b.carried.days_produced))
        .then_with(|| cmp_volume(a.carried.oil_sold, b.carried.oil_sold))
        .then_with(|| cmp_volume(a.carried.gas_sold, b.carried.gas_sold))
        .then_with(|| cmp_volume(a.carried.gas_flared, b.carried.gas_flared))
}

/// Total order on optional volumes; NaN sorts above every number, `None` last.
fn cmp_volume(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
