//! Data models for the well-status pipeline.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ---

/// Date layouts seen in the monthly production exports.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Raw production row as read from `production_data`.
///
/// `date_text` is selected as `date::text` so the loader does not care whether
/// the column was imported as `DATE` or as free text.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RawProductionRow {
    // ---
    pub file_no: i64,
    pub api_no: Option<i64>,
    pub pool: String,
    pub date_text: Option<String>,
    pub bbls_oil: Option<f64>,
    pub bbls_water: Option<f64>,
    pub mcf_gas: Option<f64>,
    pub days_produced: Option<f64>,
    pub oil_sold: Option<f64>,
    pub mcf_sold: Option<f64>,
    pub mcf_flared: Option<f64>,
}

/// Measured quantities the classifier never reads; written back unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CarriedVolumes {
    pub water_volume: Option<f64>,
    pub gas_volume: Option<f64>,
    pub days_produced: Option<f64>,
    pub oil_sold: Option<f64>,
    pub gas_sold: Option<f64>,
    pub gas_flared: Option<f64>,
}

/// One month of production for one (well, pool).
#[derive(Debug, Clone, PartialEq)]
pub struct ProductionRecord {
    // ---
    pub well_id: i64,
    pub api_no: Option<i64>,
    pub pool: String,
    /// `None` when the source date was missing or unparseable.
    pub report_date: Option<NaiveDate>,
    /// Barrels of oil/condensate, as stored. May be NaN.
    pub oil_volume: Option<f64>,
    pub carried: CarriedVolumes,
}

impl RawProductionRow {
    // ---
    pub fn to_record(self) -> ProductionRecord {
        // ---
        let report_date = self.date_text.as_deref().and_then(parse_report_date);

        ProductionRecord {
            well_id: self.file_no,
            api_no: self.api_no,
            pool: self.pool,
            report_date,
            oil_volume: self.bbls_oil,
            carried: CarriedVolumes {
                water_volume: self.bbls_water,
                gas_volume: self.mcf_gas,
                days_produced: self.days_produced,
                oil_sold: self.oil_sold,
                gas_sold: self.mcf_sold,
                gas_flared: self.mcf_flared,
            },
        }
    }
}

impl ProductionRecord {
    /// Oil volume usable for classification: missing and NaN both count as absent.
    pub fn measured_oil(&self) -> Option<f64> {
        self.oil_volume.filter(|v| !v.is_nan())
    }
}

/// Parse a reporting date from the text forms found in the source exports.
///
/// Time-of-day parts are discarded; only the calendar date orders a well's history.
pub fn parse_report_date(text: &str) -> Option<NaiveDate> {
    // ---
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Operating status of a well for one reporting month.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum WellStatus {
    #[default]
    #[serde(rename = "Unknown")]
    Unknown,
    #[serde(rename = "A")]
    Active,
    #[serde(rename = "IA 1 - A")]
    InactiveOneMonth,
    #[serde(rename = "IA 2 - A")]
    InactiveTwoMonths,
    #[serde(rename = "IA")]
    Inactive,
    #[serde(rename = "AB")]
    Abandoned,
}

impl WellStatus {
    pub const ALL: [WellStatus; 6] = [
        WellStatus::Unknown,
        WellStatus::Active,
        WellStatus::InactiveOneMonth,
        WellStatus::InactiveTwoMonths,
        WellStatus::Inactive,
        WellStatus::Abandoned,
    ];

    /// Label stored in the `status` column.
    pub fn as_str(self) -> &'static str {
        match self {
            WellStatus::Unknown => "Unknown",
            WellStatus::Active => "A",
            WellStatus::InactiveOneMonth => "IA 1 - A",
            WellStatus::InactiveTwoMonths => "IA 2 - A",
            WellStatus::Inactive => "IA",
            WellStatus::Abandoned => "AB",
        }
    }
}

impl fmt::Display for WellStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WellStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        WellStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| anyhow!("Unknown well status label: '{}'", s))
    }
}

/// Trailing window lengths, in reporting months, tested for zero oil output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ZeroWindow {
    OneMonth,
    TwoMonths,
    ThreeMonths,
    SixMonths,
}

impl ZeroWindow {
    pub const ALL: [ZeroWindow; 4] = [
        ZeroWindow::OneMonth,
        ZeroWindow::TwoMonths,
        ZeroWindow::ThreeMonths,
        ZeroWindow::SixMonths,
    ];

    pub fn months(self) -> usize {
        match self {
            ZeroWindow::OneMonth => 1,
            ZeroWindow::TwoMonths => 2,
            ZeroWindow::ThreeMonths => 3,
            ZeroWindow::SixMonths => 6,
        }
    }

    /// Name of the persisted flag column.
    pub fn column(self) -> &'static str {
        match self {
            ZeroWindow::OneMonth => "no_prod_1m",
            ZeroWindow::TwoMonths => "no_prod_2m",
            ZeroWindow::ThreeMonths => "no_prod_3m",
            ZeroWindow::SixMonths => "no_prod_6m",
        }
    }

    /// Name of the index built on the flag column.
    pub fn index_name(self) -> &'static str {
        match self {
            ZeroWindow::OneMonth => "idx_np1m",
            ZeroWindow::TwoMonths => "idx_np2m",
            ZeroWindow::ThreeMonths => "idx_np3m",
            ZeroWindow::SixMonths => "idx_np6m",
        }
    }
}

impl FromStr for ZeroWindow {
    type Err = anyhow::Error;

    /// Accepts `1m`, `1`, `2m`, ... (case-insensitive).
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        let months = s.strip_suffix('m').unwrap_or(&s);
        ZeroWindow::ALL
            .into_iter()
            .find(|w| w.months().to_string() == months)
            .ok_or_else(|| anyhow!("Invalid zero window '{}', expected one of 1m, 2m, 3m, 6m", s))
    }
}

/// Per-row results of every trailing zero-production window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZeroFlags {
    pub one_month: bool,
    pub two_months: bool,
    pub three_months: bool,
    pub six_months: bool,
}

impl ZeroFlags {
    pub fn get(&self, window: ZeroWindow) -> bool {
        match window {
            ZeroWindow::OneMonth => self.one_month,
            ZeroWindow::TwoMonths => self.two_months,
            ZeroWindow::ThreeMonths => self.three_months,
            ZeroWindow::SixMonths => self.six_months,
        }
    }
}

/// A production record with its derived status and zero flags attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedRecord {
    pub record: ProductionRecord,
    /// 0-based position in the record's (well, pool) history; `None` when undated.
    pub group_position: Option<usize>,
    pub flags: ZeroFlags,
    pub status: WellStatus,
}
