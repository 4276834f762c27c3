use crate::types::{CategoryMode, Dataset, Field, FilterRequest, Record, AFFECTED_PREFIXES};
use chrono::NaiveDate;
use tracing::{debug, warn};

/// Apply `request` to `dataset`, returning the matching records in their
/// original order. The input is never modified.
///
/// An incomplete or inverted date range yields an empty dataset. The
/// affected-service mode is ignored when the source has no `AFECTADOS` column.
pub fn filter(dataset: &Dataset, request: &FilterRequest) -> Dataset {
    let Some((start, end)) = request.date_range.bounds() else {
        warn!(range = ?request.date_range, "incomplete date range, no records selected");
        return dataset.with_records(Vec::new());
    };

    let category = if dataset.has_field(Field::Affected) {
        request.category
    } else {
        if request.category != CategoryMode::None {
            debug!(mode = ?request.category, "no affected column, category filter skipped");
        }
        CategoryMode::None
    };

    let records: Vec<Record> = dataset
        .records
        .iter()
        .filter(|r| matches(r, request, category, start, end))
        .cloned()
        .collect();

    debug!(input = dataset.len(), output = records.len(), "filter applied");
    dataset.with_records(records)
}

fn matches(
    record: &Record,
    request: &FilterRequest,
    category: CategoryMode,
    start: NaiveDate,
    end: NaiveDate,
) -> bool {
    request.cities.admits(Some(record.city.as_str()))
        && request.zones.admits(Some(record.zone.as_str()))
        && request.companies.admits(record.company.as_deref())
        && (start..=end).contains(&record.open_date())
        && category_admits(category, record.affected.as_deref())
}

fn category_admits(mode: CategoryMode, affected: Option<&str>) -> bool {
    match mode {
        CategoryMode::None => true,
        CategoryMode::ShowOnly => affected.map_or(false, has_tracked_prefix),
        CategoryMode::Exclude => !affected.map_or(false, has_tracked_prefix),
    }
}

/// Case-insensitive check against the tracked affected-service prefixes.
pub fn has_tracked_prefix(affected: &str) -> bool {
    let lower = affected.to_lowercase();
    AFFECTED_PREFIXES.iter().any(|p| lower.starts_with(*p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::map_city;
    use crate::types::{DateRange, Selection};
    use std::collections::BTreeSet;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, d).unwrap()
    }

    fn record(case: &str, zone: &str, company: &str, affected: Option<&str>, d: u32) -> Record {
        Record {
            case_number: Some(case.to_string()),
            zone: zone.to_string(),
            city: map_city(zone),
            company: Some(company.to_string()),
            affected: affected.map(str::to_string),
            box_id: None,
            opened_at: day(d).and_hms_opt(9, 0, 0).unwrap(),
            case_status: None,
            task_status: None,
            olt_switch: None,
        }
    }

    fn dataset() -> Dataset {
        Dataset {
            fields: Field::SOURCE.iter().copied().chain([Field::City]).collect::<BTreeSet<_>>(),
            records: vec![
                record("1", "KENNEDY GYE", "NETLIFE", Some("MIMG_01"), 1),
                record("2", "SUR 1 GYE", "CNT", Some("otro_servicio"), 3),
                record("3", "MUROS UIO", "NETLIFE", Some("tn_wifi_7"), 5),
                record("4", "OtherZone", "CLARO", None, 7),
                record("5", "ARMENIA UIO", "CNT", Some("Tn_WiFi_2"), 9),
            ],
        }
    }

    fn cases(ds: &Dataset) -> Vec<&str> {
        ds.records
            .iter()
            .map(|r| r.case_number.as_deref().unwrap_or(""))
            .collect()
    }

    #[test]
    fn no_op_request_returns_input() {
        let ds = dataset();
        let out = filter(&ds, &FilterRequest::all(&ds));
        assert_eq!(out, ds);
    }

    #[test]
    fn city_selection_keeps_order() {
        let ds = dataset();
        let req = FilterRequest {
            cities: Selection::of(["Guayaquil"]),
            ..FilterRequest::all(&ds)
        };
        let out = filter(&ds, &req);
        assert_eq!(cases(&out), vec!["1", "2"]);
    }

    #[test]
    fn filter_is_idempotent() {
        let ds = dataset();
        let req = FilterRequest {
            companies: Selection::of(["NETLIFE", "CNT"]),
            category: CategoryMode::Exclude,
            ..FilterRequest::all(&ds)
        };
        let once = filter(&ds, &req);
        let twice = filter(&once, &req);
        assert_eq!(once, twice);
        assert_eq!(cases(&once), vec!["2"]);
    }

    #[test]
    fn empty_selections_mean_all() {
        let ds = dataset();
        let req = FilterRequest {
            cities: Selection::Only(BTreeSet::new()),
            companies: Selection::of(Vec::<String>::new()),
            ..FilterRequest::all(&ds)
        };
        assert_eq!(filter(&ds, &req).len(), 5);
    }

    #[test]
    fn zone_and_company_predicates_combine() {
        let ds = dataset();
        let req = FilterRequest {
            zones: Selection::of(["MUROS UIO", "ARMENIA UIO"]),
            companies: Selection::of(["CNT"]),
            ..FilterRequest::all(&ds)
        };
        assert_eq!(cases(&filter(&ds, &req)), vec!["5"]);
    }

    #[test]
    fn date_bounds_are_inclusive() {
        let ds = dataset();
        let req = FilterRequest {
            date_range: DateRange::new(day(3), day(7)),
            ..FilterRequest::default()
        };
        assert_eq!(cases(&filter(&ds, &req)), vec!["2", "3", "4"]);
    }

    #[test]
    fn incomplete_range_yields_empty_regardless_of_other_filters() {
        let ds = dataset();
        for range in [
            DateRange::default(),
            DateRange { start: Some(day(1)), end: None },
            DateRange { start: None, end: Some(day(9)) },
            DateRange::new(day(9), day(1)),
        ] {
            let req = FilterRequest { date_range: range, ..FilterRequest::default() };
            let out = filter(&ds, &req);
            assert!(out.is_empty(), "range {range:?}");
            assert_eq!(out.fields, ds.fields);
        }
    }

    #[test]
    fn show_only_matches_prefixes_case_insensitively() {
        let ds = dataset();
        let req = FilterRequest { category: CategoryMode::ShowOnly, ..FilterRequest::all(&ds) };
        assert_eq!(cases(&filter(&ds, &req)), vec!["1", "3", "5"]);
    }

    #[test]
    fn show_only_and_exclude_partition_present_values() {
        let ds = dataset();
        let show = filter(&ds, &FilterRequest { category: CategoryMode::ShowOnly, ..FilterRequest::all(&ds) });
        let excl = filter(&ds, &FilterRequest { category: CategoryMode::Exclude, ..FilterRequest::all(&ds) });

        for r in &ds.records {
            let in_show = show.records.contains(r);
            let in_excl = excl.records.contains(r);
            if r.affected.is_some() {
                assert!(in_show ^ in_excl, "record {:?}", r.case_number);
            } else {
                assert!(!in_show && in_excl, "record {:?}", r.case_number);
            }
        }
    }

    #[test]
    fn category_mode_needs_the_affected_column() {
        let mut ds = dataset();
        ds.fields.remove(&Field::Affected);
        for r in &mut ds.records {
            r.affected = None;
        }
        for category in [CategoryMode::ShowOnly, CategoryMode::Exclude] {
            let out = filter(&ds, &FilterRequest { category, ..FilterRequest::all(&ds) });
            assert_eq!(out.len(), 5, "mode {category:?}");
        }

        // With the column present, a blank cell is still dropped by ShowOnly.
        let ds = dataset();
        let req = FilterRequest { category: CategoryMode::ShowOnly, ..FilterRequest::all(&ds) };
        assert!(!cases(&filter(&ds, &req)).contains(&"4"));
    }

    #[test]
    fn prefix_check() {
        assert!(has_tracked_prefix("MIMG"));
        assert!(has_tracked_prefix("tn_wifi_gye"));
        assert!(!has_tracked_prefix("x_mimg"));
        assert!(!has_tracked_prefix(""));
    }
}
