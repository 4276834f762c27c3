use crate::types::{
    Dataset, DuplicateRow, Field, FinalizedTaskRow, FinalizedTasks, GroupCount, PivotReport,
    PivotRow, Record, SummaryStats,
};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Columns the finalized-task projection needs from the source.
pub const FINALIZED_FIELDS: [Field; 4] = [
    Field::CaseNumber,
    Field::CaseStatus,
    Field::TaskStatus,
    Field::OltSwitch,
];

const FINALIZED_STATUS: &str = "finalizada";

/// Count records per value of `field`, most frequent first. Ties keep the
/// order in which values first appear. Records without a value are skipped.
pub fn group_counts(data: &Dataset, field: Field) -> Vec<GroupCount> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut rows: Vec<GroupCount> = Vec::new();
    for r in &data.records {
        let Some(value) = r.value(field) else { continue };
        match index.get(&value).copied() {
            Some(i) => rows[i].count += 1,
            None => {
                index.insert(value.clone(), rows.len());
                rows.push(GroupCount { value, count: 1 });
            }
        }
    }
    // `sort_by` is stable, so first-occurrence order survives among ties.
    rows.sort_by(|a, b| b.count.cmp(&a.count));
    rows
}

/// Zone x open-date matrix with a total per zone.
pub fn pivot(data: &Dataset) -> PivotReport {
    let mut cells: BTreeMap<String, BTreeMap<NaiveDate, usize>> = BTreeMap::new();
    let mut dates: BTreeSet<NaiveDate> = BTreeSet::new();
    for r in &data.records {
        let date = r.open_date();
        dates.insert(date);
        *cells.entry(r.zone.clone()).or_default().entry(date).or_insert(0) += 1;
    }

    let dates: Vec<NaiveDate> = dates.into_iter().collect();
    let rows = cells
        .into_iter()
        .map(|(zone, by_date)| {
            let counts: Vec<usize> = dates
                .iter()
                .map(|d| by_date.get(d).copied().unwrap_or(0))
                .collect();
            let total = counts.iter().sum();
            PivotRow { zone, counts, total }
        })
        .collect();
    PivotReport { dates, rows }
}

/// Every record whose box identifier is shared with another record, sorted
/// by box. Blank and missing boxes are ignored.
pub fn duplicates(data: &Dataset) -> Vec<DuplicateRow> {
    let boxed: Vec<(&Record, &str)> = data
        .records
        .iter()
        .filter_map(|r| match r.box_id.as_deref() {
            Some(b) if !b.is_empty() => Some((r, b)),
            _ => None,
        })
        .collect();

    let mut freq: HashMap<&str, usize> = HashMap::new();
    for (_, b) in &boxed {
        *freq.entry(*b).or_insert(0) += 1;
    }

    let mut rows: Vec<DuplicateRow> = boxed
        .into_iter()
        .filter(|(_, b)| freq.get(b).copied().unwrap_or(0) >= 2)
        .map(|(r, b)| DuplicateRow {
            case_number: r.case_number.clone().unwrap_or_default(),
            box_id: b.to_string(),
        })
        .collect();
    rows.sort_by(|a, b| a.box_id.cmp(&b.box_id));
    rows
}

pub fn finalized_tasks(data: &Dataset) -> FinalizedTasks {
    let missing = data.missing_fields(&FINALIZED_FIELDS);
    if !missing.is_empty() {
        return FinalizedTasks::Unavailable { missing };
    }

    let rows = data
        .records
        .iter()
        .filter(|r| {
            r.task_status
                .as_deref()
                .map_or(false, |s| s.trim().to_lowercase() == FINALIZED_STATUS)
        })
        .map(|r| FinalizedTaskRow {
            case_number: r.case_number.clone().unwrap_or_default(),
            case_status: r.case_status.clone().unwrap_or_default(),
            task_status: r.task_status.clone().unwrap_or_default(),
            olt_switch: r.olt_switch.clone().unwrap_or_default(),
        })
        .collect();
    FinalizedTasks::Rows(rows)
}

pub fn generate_summary(data: &Dataset) -> SummaryStats {
    let span = data.date_span();
    let duplicated_boxes = duplicates(data)
        .iter()
        .map(|d| d.box_id.as_str())
        .collect::<BTreeSet<_>>()
        .len();
    let finalized = match finalized_tasks(data) {
        FinalizedTasks::Rows(rows) => Some(rows.len()),
        FinalizedTasks::Unavailable { .. } => None,
    };
    SummaryStats {
        total_cases: data.len(),
        total_cities: data.distinct(Field::City).len(),
        total_zones: data.distinct(Field::Zone).len(),
        total_companies: data.distinct(Field::Company).len(),
        first_open_date: span.map(|(first, _)| first),
        last_open_date: span.map(|(_, last)| last),
        duplicated_boxes,
        finalized_tasks: finalized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::map_city;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, d).unwrap()
    }

    fn record(case: &str, zone: &str, d: u32) -> Record {
        Record {
            case_number: Some(case.to_string()),
            zone: zone.to_string(),
            city: map_city(zone),
            company: Some("NETLIFE".to_string()),
            affected: None,
            box_id: None,
            opened_at: day(d).and_hms_opt(8, 30, 0).unwrap(),
            case_status: Some("Abierto".to_string()),
            task_status: Some("Pendiente".to_string()),
            olt_switch: Some("OLT-GYE-01".to_string()),
        }
    }

    fn full_schema(records: Vec<Record>) -> Dataset {
        Dataset {
            fields: Field::SOURCE.iter().copied().chain([Field::City]).collect(),
            records,
        }
    }

    fn with_box(mut r: Record, b: Option<&str>) -> Record {
        r.box_id = b.map(str::to_string);
        r
    }

    #[test]
    fn group_counts_orders_by_count_then_first_seen() {
        let ds = full_schema(vec![
            record("1", "SUR 2 UIO", 1),
            record("2", "KENNEDY GYE", 1),
            record("3", "MACHALA", 2),
            record("4", "KENNEDY GYE", 2),
            record("5", "MACHALA", 3),
            record("6", "AURORA GYE", 3),
        ]);
        let counts = group_counts(&ds, Field::Zone);
        let got: Vec<(&str, usize)> = counts.iter().map(|g| (g.value.as_str(), g.count)).collect();
        assert_eq!(
            got,
            vec![("KENNEDY GYE", 2), ("MACHALA", 2), ("SUR 2 UIO", 1), ("AURORA GYE", 1)]
        );

        let by_city = group_counts(&ds, Field::City);
        assert_eq!(by_city[0], GroupCount { value: "Guayaquil".into(), count: 3 });
    }

    #[test]
    fn group_counts_skips_absent_values() {
        let mut r = record("1", "MACHALA", 1);
        r.company = None;
        let ds = full_schema(vec![r, record("2", "MACHALA", 1)]);
        assert_eq!(
            group_counts(&ds, Field::Company),
            vec![GroupCount { value: "NETLIFE".into(), count: 1 }]
        );
    }

    #[test]
    fn pivot_fills_zeros_and_totals_match_group_counts() {
        let ds = full_schema(vec![
            record("1", "KENNEDY GYE", 1),
            record("2", "KENNEDY GYE", 1),
            record("3", "MUROS UIO", 4),
            record("4", "KENNEDY GYE", 4),
        ]);
        let p = pivot(&ds);
        assert_eq!(p.dates, vec![day(1), day(4)]);
        assert_eq!(p.rows.len(), 2);
        assert_eq!(p.rows[0].zone, "KENNEDY GYE");
        assert_eq!(p.rows[0].counts, vec![2, 1]);
        assert_eq!(p.rows[1].counts, vec![0, 1]);
        assert_eq!(p.count("MUROS UIO", day(1)), 0);
        assert_eq!(p.count("MUROS UIO", day(9)), 0);

        for g in group_counts(&ds, Field::Zone) {
            assert_eq!(p.total(&g.value), Some(g.count), "zone {}", g.value);
        }
    }

    #[test]
    fn duplicates_keep_every_member_sorted_by_box() {
        let boxes = [Some("C"), Some("A"), Some("B"), Some("C"), None, Some("A"), Some("C")];
        let records = boxes
            .iter()
            .enumerate()
            .map(|(i, b)| with_box(record(&(i + 1).to_string(), "MACHALA", 1), *b))
            .collect();
        let rows = duplicates(&full_schema(records));
        let got: Vec<(&str, &str)> = rows
            .iter()
            .map(|d| (d.case_number.as_str(), d.box_id.as_str()))
            .collect();
        assert_eq!(
            got,
            vec![("2", "A"), ("6", "A"), ("1", "C"), ("4", "C"), ("7", "C")]
        );
    }

    #[test]
    fn duplicates_ignore_blank_boxes() {
        let ds = full_schema(vec![
            with_box(record("1", "MACHALA", 1), Some("")),
            with_box(record("2", "MACHALA", 1), Some("")),
            with_box(record("3", "MACHALA", 1), Some("X")),
        ]);
        assert!(duplicates(&ds).is_empty());
    }

    #[test]
    fn finalized_tasks_projects_matching_rows() {
        let mut done = record("7", "MACHALA", 1);
        done.task_status = Some(" FINALIZADA ".to_string());
        let ds = full_schema(vec![record("6", "MACHALA", 1), done]);
        match finalized_tasks(&ds) {
            FinalizedTasks::Rows(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].case_number, "7");
                assert_eq!(rows[0].olt_switch, "OLT-GYE-01");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn finalized_tasks_distinguishes_unavailable_from_empty() {
        let ds = full_schema(vec![record("1", "MACHALA", 1)]);
        assert_eq!(finalized_tasks(&ds), FinalizedTasks::Rows(Vec::new()));

        let mut partial = ds.clone();
        partial.fields.remove(&Field::OltSwitch);
        assert_eq!(
            finalized_tasks(&partial),
            FinalizedTasks::Unavailable { missing: vec![Field::OltSwitch] }
        );
    }

    #[test]
    fn empty_dataset_gives_empty_reports() {
        let ds = full_schema(Vec::new());
        assert!(group_counts(&ds, Field::Zone).is_empty());
        assert!(pivot(&ds).is_empty());
        assert!(pivot(&ds).dates.is_empty());
        assert!(duplicates(&ds).is_empty());
        assert_eq!(finalized_tasks(&ds), FinalizedTasks::Rows(Vec::new()));

        let s = generate_summary(&ds);
        assert_eq!(s.total_cases, 0);
        assert_eq!(s.first_open_date, None);
        assert_eq!(s.finalized_tasks, Some(0));
    }

    #[test]
    fn summary_counts_distinct_values() {
        let mut done = with_box(record("3", "MUROS UIO", 5), Some("B1"));
        done.task_status = Some("Finalizada".to_string());
        let ds = full_schema(vec![
            with_box(record("1", "KENNEDY GYE", 2), Some("B1")),
            record("2", "SUR 1 GYE", 3),
            done,
        ]);
        let s = generate_summary(&ds);
        assert_eq!(s.total_cases, 3);
        assert_eq!(s.total_cities, 2);
        assert_eq!(s.total_zones, 3);
        assert_eq!(s.total_companies, 1);
        assert_eq!(s.first_open_date, Some(day(2)));
        assert_eq!(s.last_open_date, Some(day(5)));
        assert_eq!(s.duplicated_boxes, 1);
        assert_eq!(s.finalized_tasks, Some(1));
    }
}
