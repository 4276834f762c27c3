use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use tabled::Tabled;

use crate::error::PipelineError;

/// A column of the case export, plus the derived `CIUDAD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    CaseNumber,
    Zone,
    City,
    Company,
    Affected,
    Box,
    OpenDate,
    CaseStatus,
    TaskStatus,
    OltSwitch,
}

impl Field {
    /// Fields read from the source file, in export order.
    pub const SOURCE: [Field; 9] = [
        Field::CaseNumber,
        Field::Zone,
        Field::Company,
        Field::Affected,
        Field::Box,
        Field::OpenDate,
        Field::CaseStatus,
        Field::TaskStatus,
        Field::OltSwitch,
    ];

    pub const REQUIRED: [Field; 2] = [Field::Zone, Field::OpenDate];

    pub fn column(self) -> &'static str {
        match self {
            Field::CaseNumber => "NUMERO_CASO",
            Field::Zone => "ZONA",
            Field::City => "CIUDAD",
            Field::Company => "EMPRESA",
            Field::Affected => "AFECTADOS",
            Field::Box => "CAJA",
            Field::OpenDate => "FE_APERTURA",
            Field::CaseStatus => "ESTADO_CASO",
            Field::TaskStatus => "ESTADO_TAREA",
            Field::OltSwitch => "OLT_SW",
        }
    }

    fn alias(self) -> &'static str {
        match self {
            Field::CaseNumber => "case_number",
            Field::Zone => "zone",
            Field::City => "city",
            Field::Company => "company",
            Field::Affected => "affected",
            Field::Box => "box",
            Field::OpenDate => "open_date",
            Field::CaseStatus => "case_status",
            Field::TaskStatus => "task_status",
            Field::OltSwitch => "olt_switch",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Field {
    type Err = PipelineError;

    /// Accepts either the export column name (`ZONA`) or the snake-case alias (`zone`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Field::SOURCE
            .iter()
            .chain(std::iter::once(&Field::City))
            .copied()
            .find(|f| f.column().eq_ignore_ascii_case(s) || f.alias().eq_ignore_ascii_case(s))
            .ok_or_else(|| PipelineError::UnknownField(s.to_string()))
    }
}

/// One data row as read from the export: column name -> cell text.
/// Blank cells are not present in `values`.
#[derive(Debug, Clone, Default)]
pub struct RawRow {
    /// 1-based line (or sheet row) in the source file.
    pub line: usize,
    pub values: HashMap<String, String>,
}

impl RawRow {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<RawRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub case_number: Option<String>,
    pub zone: String,
    pub city: String,
    pub company: Option<String>,
    pub affected: Option<String>,
    pub box_id: Option<String>,
    pub opened_at: NaiveDateTime,
    pub case_status: Option<String>,
    pub task_status: Option<String>,
    pub olt_switch: Option<String>,
}

impl Record {
    pub fn open_date(&self) -> NaiveDate {
        self.opened_at.date()
    }

    pub fn value(&self, field: Field) -> Option<String> {
        match field {
            Field::CaseNumber => self.case_number.clone(),
            Field::Zone => Some(self.zone.clone()),
            Field::City => Some(self.city.clone()),
            Field::Company => self.company.clone(),
            Field::Affected => self.affected.clone(),
            Field::Box => self.box_id.clone(),
            Field::OpenDate => Some(self.open_date().format("%Y-%m-%d").to_string()),
            Field::CaseStatus => self.case_status.clone(),
            Field::TaskStatus => self.task_status.clone(),
            Field::OltSwitch => self.olt_switch.clone(),
        }
    }
}

/// Records plus the set of fields the source actually provided.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub fields: BTreeSet<Field>,
    pub records: Vec<Record>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_field(&self, field: Field) -> bool {
        self.fields.contains(&field)
    }

    pub fn missing_fields(&self, wanted: &[Field]) -> Vec<Field> {
        wanted.iter().copied().filter(|f| !self.has_field(*f)).collect()
    }

    /// New dataset sharing this one's schema.
    pub fn with_records(&self, records: Vec<Record>) -> Dataset {
        Dataset { fields: self.fields.clone(), records }
    }

    /// Sorted distinct values of `field`, skipping absent ones.
    pub fn distinct(&self, field: Field) -> Vec<String> {
        let set: BTreeSet<String> = self.records.iter().filter_map(|r| r.value(field)).collect();
        set.into_iter().collect()
    }

    pub fn date_span(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.records.iter().map(Record::open_date).min()?;
        let last = self.records.iter().map(Record::open_date).max()?;
        Some((first, last))
    }
}

/// Multi-select over string values. An empty selection means "all".
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Selection {
    #[default]
    All,
    Only(BTreeSet<String>),
}

impl Selection {
    pub fn of<I, S>(values: I) -> Selection
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = values
            .into_iter()
            .map(|v| v.into().trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
        if set.is_empty() {
            Selection::All
        } else {
            Selection::Only(set)
        }
    }

    pub fn admits(&self, value: Option<&str>) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(set) if set.is_empty() => true,
            Selection::Only(set) => value.map_or(false, |v| set.contains(v)),
        }
    }
}

/// Inclusive open-date range. Either bound may be missing, which makes the
/// range incomplete.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> DateRange {
        DateRange { start: Some(start), end: Some(end) }
    }

    /// First to last open date of the dataset; incomplete when it is empty.
    pub fn spanning(dataset: &Dataset) -> DateRange {
        match dataset.date_span() {
            Some((start, end)) => DateRange::new(start, end),
            None => DateRange::default(),
        }
    }

    /// Both bounds when the range is complete and well ordered.
    pub fn bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        match (self.start, self.end) {
            (Some(start), Some(end)) if start <= end => Some((start, end)),
            _ => None,
        }
    }
}

pub const AFFECTED_PREFIXES: [&str; 2] = ["mimg", "tn_wifi"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CategoryMode {
    #[default]
    None,
    ShowOnly,
    Exclude,
}

impl CategoryMode {
    /// Maps the two UI toggles to a mode; "show only" wins over "exclude".
    pub fn from_toggles(show_only: bool, exclude: bool) -> CategoryMode {
        match (show_only, exclude) {
            (true, _) => CategoryMode::ShowOnly,
            (false, true) => CategoryMode::Exclude,
            (false, false) => CategoryMode::None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterRequest {
    pub cities: Selection,
    pub zones: Selection,
    pub companies: Selection,
    pub date_range: DateRange,
    pub category: CategoryMode,
}

impl FilterRequest {
    /// The request that lets every record of `dataset` through.
    pub fn all(dataset: &Dataset) -> FilterRequest {
        FilterRequest {
            date_range: DateRange::spanning(dataset),
            ..FilterRequest::default()
        }
    }
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct GroupCount {
    #[serde(rename = "Value")]
    #[tabled(rename = "Value")]
    pub value: String,
    #[serde(rename = "Count")]
    #[tabled(rename = "Count")]
    pub count: usize,
}

/// Zone x open-date case counts. Only observed zones and dates appear.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PivotReport {
    pub dates: Vec<NaiveDate>,
    pub rows: Vec<PivotRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PivotRow {
    pub zone: String,
    /// One cell per entry of `PivotReport::dates`, zero-filled.
    pub counts: Vec<usize>,
    pub total: usize,
}

impl PivotReport {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
impl PivotReport {
    pub fn total(&self, zone: &str) -> Option<usize> {
        self.rows.iter().find(|r| r.zone == zone).map(|r| r.total)
    }

    pub fn count(&self, zone: &str, date: NaiveDate) -> usize {
        let Some(col) = self.dates.iter().position(|d| *d == date) else {
            return 0;
        };
        self.rows
            .iter()
            .find(|r| r.zone == zone)
            .map_or(0, |r| r.counts[col])
    }
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct DuplicateRow {
    #[serde(rename = "NUMERO_CASO")]
    #[tabled(rename = "NUMERO_CASO")]
    pub case_number: String,
    #[serde(rename = "CAJA")]
    #[tabled(rename = "CAJA")]
    pub box_id: String,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct FinalizedTaskRow {
    #[serde(rename = "NUMERO_CASO")]
    #[tabled(rename = "NUMERO_CASO")]
    pub case_number: String,
    #[serde(rename = "ESTADO_CASO")]
    #[tabled(rename = "ESTADO_CASO")]
    pub case_status: String,
    #[serde(rename = "ESTADO_TAREA")]
    #[tabled(rename = "ESTADO_TAREA")]
    pub task_status: String,
    #[serde(rename = "OLT_SW")]
    #[tabled(rename = "OLT_SW")]
    pub olt_switch: String,
}

/// Finalized-task projection. `Unavailable` means the report cannot be
/// computed from this schema, which is not the same as having no rows.
#[derive(Debug, Clone, PartialEq)]
pub enum FinalizedTasks {
    Unavailable { missing: Vec<Field> },
    Rows(Vec<FinalizedTaskRow>),
}

/// Flat row for the case detail table and `cases.csv`.
#[derive(Debug, Serialize, Tabled, Clone)]
pub struct CaseRow {
    #[serde(rename = "NUMERO_CASO")]
    #[tabled(rename = "NUMERO_CASO")]
    pub case_number: String,
    #[serde(rename = "FE_APERTURA")]
    #[tabled(rename = "FE_APERTURA")]
    pub opened_at: String,
    #[serde(rename = "CIUDAD")]
    #[tabled(rename = "CIUDAD")]
    pub city: String,
    #[serde(rename = "ZONA")]
    #[tabled(rename = "ZONA")]
    pub zone: String,
    #[serde(rename = "EMPRESA")]
    #[tabled(rename = "EMPRESA")]
    pub company: String,
    #[serde(rename = "AFECTADOS")]
    #[tabled(rename = "AFECTADOS")]
    pub affected: String,
    #[serde(rename = "CAJA")]
    #[tabled(rename = "CAJA")]
    pub box_id: String,
    #[serde(rename = "ESTADO_CASO")]
    #[tabled(rename = "ESTADO_CASO")]
    pub case_status: String,
    #[serde(rename = "ESTADO_TAREA")]
    #[tabled(rename = "ESTADO_TAREA")]
    pub task_status: String,
    #[serde(rename = "OLT_SW")]
    #[tabled(rename = "OLT_SW")]
    pub olt_switch: String,
}

impl From<&Record> for CaseRow {
    fn from(r: &Record) -> Self {
        CaseRow {
            case_number: r.case_number.clone().unwrap_or_default(),
            opened_at: r.opened_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            city: r.city.clone(),
            zone: r.zone.clone(),
            company: r.company.clone().unwrap_or_default(),
            affected: r.affected.clone().unwrap_or_default(),
            box_id: r.box_id.clone().unwrap_or_default(),
            case_status: r.case_status.clone().unwrap_or_default(),
            task_status: r.task_status.clone().unwrap_or_default(),
            olt_switch: r.olt_switch.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct SummaryStats {
    pub total_cases: usize,
    pub total_cities: usize,
    pub total_zones: usize,
    pub total_companies: usize,
    pub first_open_date: Option<NaiveDate>,
    pub last_open_date: Option<NaiveDate>,
    pub duplicated_boxes: usize,
    /// `None` when the finalized-task report is unavailable for this schema.
    pub finalized_tasks: Option<usize>,
}
