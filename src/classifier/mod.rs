//! Well status classification over a full production history.
//!
//! The classifier is a pure batch transform: records in, the same records out
//! with zero flags and a status attached, in input order. Each (well, pool)
//! history is independent, so large inputs are mapped over wells in parallel.
//!
//! Submodules:
//! - `grouping` – partition by well identity and order chronologically
//! - `windows` – trailing zero-production windows per history
//! - `precedence` – ordered status rules, last match wins

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde_json::{Map, Value};

use crate::models::{ClassifiedRecord, ProductionRecord, WellStatus, ZeroFlags};

mod grouping;
mod precedence;
mod windows;

use grouping::WellHistory;
use precedence::RowFacts;

// ---

/// Tuning knobs that do not affect the result.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyOptions {
    /// Inputs with at least this many rows are classified in parallel.
    pub parallel_min_rows: usize,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self {
            parallel_min_rows: 100_000,
        }
    }
}

/// Counts describing one classification pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassificationSummary {
    pub row_count: usize,
    pub group_count: usize,
    /// Rows without a usable reporting date.
    pub undated_count: usize,
    /// Dated rows whose oil volume was missing or NaN.
    pub missing_oil_count: usize,
    pub status_counts: BTreeMap<WellStatus, usize>,
}

/// Classified records in input order plus the pass summary.
#[derive(Debug, Clone)]
pub struct Classification {
    pub records: Vec<ClassifiedRecord>,
    pub summary: ClassificationSummary,
}

/// Derived values for one input row.
#[derive(Debug, Clone, Copy, Default)]
struct Derived {
    position: Option<usize>,
    flags: ZeroFlags,
    status: WellStatus,
    missing_oil: bool,
}

/// Classify every record.
///
/// Undated records are kept, with all flags false and status `Unknown`.
/// Any status or flags from a previous run are not inputs; the result depends
/// only on identity, dates and oil volumes.
pub fn classify(records: Vec<ProductionRecord>, options: &ClassifyOptions) -> Classification {
    // ---
    let partition = grouping::partition(&records);
    let parallel = records.len() >= options.parallel_min_rows;

    tracing::debug!(
        rows = records.len(),
        groups = partition.histories.len(),
        undated = partition.undated.len(),
        parallel,
        "Partitioned production history"
    );

    let per_history: Vec<Vec<(usize, Derived)>> = if parallel {
        partition
            .histories
            .par_iter()
            .map(|history| classify_history(&records, history))
            .collect()
    } else {
        partition
            .histories
            .iter()
            .map(|history| classify_history(&records, history))
            .collect()
    };

    let mut derived = vec![Derived::default(); records.len()];
    for (idx, row) in per_history.into_iter().flatten() {
        derived[idx] = row;
    }

    let mut summary = ClassificationSummary {
        row_count: records.len(),
        group_count: partition.histories.len(),
        undated_count: partition.undated.len(),
        ..Default::default()
    };

    let records = records
        .into_iter()
        .zip(derived)
        .map(|(record, row)| {
            *summary.status_counts.entry(row.status).or_default() += 1;
            if row.missing_oil {
                summary.missing_oil_count += 1;
            }
            ClassifiedRecord {
                record,
                group_position: row.position,
                flags: row.flags,
                status: row.status,
            }
        })
        .collect();

    Classification { records, summary }
}

/// Scan one chronologically ordered history.
fn classify_history(records: &[ProductionRecord], history: &WellHistory<'_>) -> Vec<(usize, Derived)> {
    // ---
    tracing::trace!(
        well_id = history.key.well_id,
        pool = history.key.pool,
        months = history.rows.len(),
        "Scanning well history"
    );

    let oil = history.rows.iter().map(|&idx| records[idx].measured_oil());
    let flags = windows::zero_flags(oil);

    history
        .positions()
        .zip(flags)
        .map(|((position, idx), flags)| {
            let oil = records[idx].measured_oil();
            let status = precedence::assign_status(&RowFacts { flags, oil });
            (
                idx,
                Derived {
                    position: Some(position),
                    flags,
                    status,
                    missing_oil: oil.is_none(),
                },
            )
        })
        .collect()
}

impl ClassificationSummary {
    /// Status counts keyed by stored label, as kept in the run audit table.
    pub fn status_counts_json(&self) -> Value {
        // ---
        let counts: Map<String, Value> = self
            .status_counts
            .iter()
            .map(|(status, count)| (status.as_str().to_string(), Value::from(*count as u64)))
            .collect();
        Value::Object(counts)
    }

    pub fn log_summary(&self) {
        // ---
        tracing::info!(
            "Classified {} rows across {} wells ({} undated, {} with missing oil)",
            self.row_count,
            self.group_count,
            self.undated_count,
            self.missing_oil_count
        );
        for status in WellStatus::ALL {
            let count = self.status_counts.get(&status).copied().unwrap_or(0);
            tracing::info!("  {:<9}: {}", status.as_str(), count);
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::CarriedVolumes;
    use chrono::NaiveDate;

    const A: WellStatus = WellStatus::Active;
    const IA1: WellStatus = WellStatus::InactiveOneMonth;
    const IA2: WellStatus = WellStatus::InactiveTwoMonths;
    const IA: WellStatus = WellStatus::Inactive;
    const AB: WellStatus = WellStatus::Abandoned;
    const UNKNOWN: WellStatus = WellStatus::Unknown;

    fn month(offset: u32) -> NaiveDate {
        // ---
        NaiveDate::from_ymd_opt(2020 + (offset / 12) as i32, offset % 12 + 1, 1).unwrap()
    }

    fn record(well_id: i64, pool: &str, offset: u32, oil: Option<f64>) -> ProductionRecord {
        // ---
        ProductionRecord {
            well_id,
            api_no: Some(33_000_000_000 + well_id),
            pool: pool.to_string(),
            report_date: Some(month(offset)),
            oil_volume: oil,
            carried: CarriedVolumes::default(),
        }
    }

    fn history(well_id: i64, pool: &str, oil: &[f64]) -> Vec<ProductionRecord> {
        // ---
        oil.iter()
            .enumerate()
            .map(|(i, v)| record(well_id, pool, i as u32, Some(*v)))
            .collect()
    }

    fn sequential() -> ClassifyOptions {
        ClassifyOptions {
            parallel_min_rows: usize::MAX,
        }
    }

    fn parallel() -> ClassifyOptions {
        ClassifyOptions {
            parallel_min_rows: 0,
        }
    }

    fn statuses(classification: &Classification) -> Vec<WellStatus> {
        classification.records.iter().map(|r| r.status).collect()
    }

    #[test]
    fn test_seven_month_decline() {
        // ---
        let result = classify(
            history(1, "BAKKEN", &[5.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
            &sequential(),
        );

        assert_eq!(statuses(&result), [A, IA1, IA2, IA, IA, IA, AB]);

        let one: Vec<bool> = result.records.iter().map(|r| r.flags.one_month).collect();
        let two: Vec<bool> = result.records.iter().map(|r| r.flags.two_months).collect();
        assert_eq!(one, [false, true, true, true, true, true, true]);
        assert_eq!(two, [false, false, true, true, true, true, true]);
    }

    #[test]
    fn test_abandoned_needs_six_dry_months_in_group() {
        // ---
        let five = classify(history(1, "BAKKEN", &[0.0; 5]), &sequential());
        assert!(!statuses(&five).contains(&AB));

        let six = classify(history(1, "BAKKEN", &[0.0; 6]), &sequential());
        assert_eq!(statuses(&six), [IA1, IA2, IA, IA, IA, AB]);

        // A producing month restarts the count
        let restarted = classify(
            history(1, "BAKKEN", &[0.0, 0.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
            &sequential(),
        );
        assert!(!statuses(&restarted).contains(&AB));

        // Dry months of another pool do not count toward this one
        let mut records = history(1, "BAKKEN", &[0.0; 3]);
        records.extend(history(1, "MADISON", &[0.0; 3]));
        let split = classify(records, &sequential());
        assert!(!statuses(&split).contains(&AB));
        assert!(split.records.iter().all(|r| !r.flags.six_months));
    }

    #[test]
    fn test_active_month_after_dry_month() {
        // ---
        let result = classify(history(1, "BAKKEN", &[0.0, 5.0]), &sequential());
        assert_eq!(statuses(&result), [IA1, A]);
    }

    #[test]
    fn test_windows_do_not_cross_groups() {
        // ---
        // Well 1 ends dry; well 2 starts dry right after it in storage order
        let mut records = history(1, "BAKKEN", &[0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        records.extend(history(2, "BAKKEN", &[0.0, 0.0]));
        records.extend(history(2, "THREE FORKS", &[0.0]));

        let result = classify(records, &sequential());

        assert_eq!(
            statuses(&result),
            [IA1, IA2, IA, IA, IA, AB, IA1, IA2, IA1]
        );
        assert!(!result.records[6].flags.two_months);
        assert!(!result.records[8].flags.two_months);
    }

    #[test]
    fn test_output_keeps_input_order() {
        // ---
        // Same well, shuffled months: 0 -> 5.0, 1 -> 0.0, 2 -> 0.0
        let records = vec![
            record(3, "BAKKEN", 2, Some(0.0)),
            record(3, "BAKKEN", 0, Some(5.0)),
            record(3, "BAKKEN", 1, Some(0.0)),
        ];

        let result = classify(records.clone(), &sequential());

        assert_eq!(statuses(&result), [IA2, A, IA1]);
        let positions: Vec<_> = result.records.iter().map(|r| r.group_position).collect();
        assert_eq!(positions, [Some(2), Some(0), Some(1)]);
        for (out, input) in result.records.iter().zip(&records) {
            assert_eq!(&out.record, input);
        }
    }

    #[test]
    fn test_undated_rows_are_unknown_and_do_not_break_history() {
        // ---
        let mut records = history(4, "BAKKEN", &[0.0, 0.0, 0.0]);
        let mut undated = record(4, "BAKKEN", 99, Some(250.0));
        undated.report_date = None;
        records.insert(1, undated);

        let result = classify(records, &sequential());

        assert_eq!(statuses(&result), [IA1, UNKNOWN, IA2, IA]);
        assert_eq!(result.records[1].flags, ZeroFlags::default());
        assert_eq!(result.records[1].group_position, None);
        assert_eq!(result.records[3].group_position, Some(2));
        assert_eq!(result.summary.undated_count, 1);
    }

    #[test]
    fn test_missing_oil_degrades_to_unknown() {
        // ---
        let records = vec![
            record(5, "BAKKEN", 0, Some(0.0)),
            record(5, "BAKKEN", 1, None),
            record(5, "BAKKEN", 2, Some(f64::NAN)),
            record(5, "BAKKEN", 3, Some(0.0)),
            record(5, "BAKKEN", 4, Some(0.0)),
        ];

        let result = classify(records, &sequential());

        assert_eq!(statuses(&result), [IA1, UNKNOWN, UNKNOWN, IA1, IA2]);
        assert_eq!(result.summary.missing_oil_count, 2);
        // NaN is written back as read
        assert!(result.records[2].record.oil_volume.is_some_and(f64::is_nan));
    }

    #[test]
    fn test_status_invariants_hold() {
        // ---
        let mut records = Vec::new();
        for well in 0..25i64 {
            let oil: Vec<f64> = (0..30i64)
                .map(|m| if (m * 3 + well) % 7 < 4 { 0.0 } else { (m + 1) as f64 })
                .collect();
            records.extend(history(well, if well % 2 == 0 { "BAKKEN" } else { "MADISON" }, &oil));
        }

        let result = classify(records, &sequential());

        for row in &result.records {
            assert!(WellStatus::ALL.contains(&row.status));
            let oil = row.record.oil_volume.unwrap();
            if oil > 0.0 {
                assert_eq!(row.status, A);
                assert!(!row.flags.two_months);
            }
            if matches!(row.status, IA2 | IA | AB) {
                assert!(row.flags.two_months);
            }
            if row.flags.six_months {
                assert_eq!(row.status, AB);
            }
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        // ---
        let mut records = Vec::new();
        for well in 0..50i64 {
            for m in (0..24u32).rev() {
                let oil = match (m as i64 + well) % 9 {
                    0 => None,
                    1..=4 => Some(0.0),
                    _ => Some(f64::from(m) * 1.5 + 1.0),
                };
                records.push(record(well % 10, &format!("POOL-{}", well / 10), m, oil));
            }
        }

        let seq = classify(records.clone(), &sequential());
        let par = classify(records, &parallel());

        assert_eq!(seq.records, par.records);
        assert_eq!(seq.summary, par.summary);
    }

    #[test]
    fn test_rerun_is_idempotent() {
        // ---
        let records = history(8, "BAKKEN", &[3.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);

        let first = classify(records, &sequential());
        let second = classify(
            first.records.iter().map(|r| r.record.clone()).collect(),
            &sequential(),
        );

        assert_eq!(first.records, second.records);
        assert_eq!(statuses(&second), [A, IA1, IA2, IA, A, IA1, IA2, IA, IA, IA, AB]);
    }

    #[test]
    fn test_duplicate_months_classify_the_same_in_any_load_order() {
        // ---
        let mut records = history(6, "BAKKEN", &[4.0]);
        for oil in [0.0, 0.0, 5.0, 0.0] {
            records.push(record(6, "BAKKEN", 1, Some(oil)));
        }
        let mut reloaded = records.clone();
        reloaded.reverse();
        reloaded.swap(0, 2);

        let first = classify(records, &sequential());
        let second = classify(reloaded, &sequential());

        assert_eq!(first.summary, second.summary);

        let by_contents = |c: &Classification| {
            let mut rows: Vec<(u64, Option<usize>, WellStatus)> = c
                .records
                .iter()
                .map(|r| (r.record.oil_volume.unwrap_or(f64::NAN).to_bits(), r.group_position, r.status))
                .collect();
            rows.sort_unstable();
            rows
        };
        assert_eq!(by_contents(&first), by_contents(&second));
        assert_eq!(first.summary.status_counts.get(&A), Some(&2));
        assert_eq!(first.summary.status_counts.get(&IA), Some(&1));
    }

    #[test]
    fn test_summary_counts() {
        // ---
        let mut records = history(9, "BAKKEN", &[5.0, 0.0, 0.0]);
        let mut undated = record(9, "BAKKEN", 0, Some(1.0));
        undated.report_date = None;
        records.push(undated);

        let summary = classify(records, &sequential()).summary;

        assert_eq!(summary.row_count, 4);
        assert_eq!(summary.group_count, 1);
        assert_eq!(summary.undated_count, 1);
        assert_eq!(summary.status_counts.get(&A), Some(&1));
        assert_eq!(summary.status_counts.get(&UNKNOWN), Some(&1));
        assert_eq!(summary.status_counts.get(&AB), None);

        let json = summary.status_counts_json();
        assert_eq!(json["IA 1 - A"], 1);
        assert_eq!(json["IA 2 - A"], 1);
    }

    #[test]
    fn test_empty_input() {
        // ---
        let result = classify(Vec::new(), &parallel());
        assert!(result.records.is_empty());
        assert_eq!(result.summary, ClassificationSummary::default());
    }
}
