use crate::error::{PipelineError, PipelineResult};
use crate::mapper::map_city;
use crate::types::{Dataset, Field, RawRow, RawTable, Record};
use crate::util::{parse_datetime_safe, trim_opt};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Build the normalized dataset from a raw table.
///
/// All-or-nothing: the first row without a usable zone or open date aborts
/// the whole load, since date filtering assumes every record has a date.
pub fn normalize(table: &RawTable) -> PipelineResult<Dataset> {
    let mut fields: BTreeSet<Field> = Field::SOURCE
        .iter()
        .copied()
        .filter(|f| table.columns.iter().any(|c| c.trim() == f.column()))
        .collect();
    fields.insert(Field::City);

    let records = table
        .rows
        .iter()
        .map(normalize_row)
        .collect::<PipelineResult<Vec<Record>>>()?;

    info!(records = records.len(), fields = fields.len(), "dataset normalized");
    Ok(Dataset { fields, records })
}

fn normalize_row(row: &RawRow) -> PipelineResult<Record> {
    let zone = row
        .get(Field::Zone.column())
        .map(|z| z.trim().to_string())
        .ok_or_else(|| missing(row.line, Field::Zone))?;

    let raw_date = row.get(Field::OpenDate.column());
    let opened_at = match parse_datetime_safe(raw_date) {
        Some(dt) => dt,
        None => {
            let Some(value) = raw_date else {
                return Err(missing(row.line, Field::OpenDate));
            };
            debug!(line = row.line, value, "unparseable open date");
            return Err(PipelineError::DataFormat {
                line: row.line,
                field: Field::OpenDate,
                reason: format!("cannot parse '{}' as a date", value.trim()),
            });
        }
    };

    let text = |field: Field| trim_opt(row.get(field.column()));

    Ok(Record {
        case_number: text(Field::CaseNumber),
        city: map_city(&zone),
        zone,
        company: text(Field::Company),
        affected: text(Field::Affected),
        box_id: text(Field::Box),
        opened_at,
        case_status: text(Field::CaseStatus),
        task_status: text(Field::TaskStatus),
        olt_switch: text(Field::OltSwitch),
    })
}

fn missing(line: usize, field: Field) -> PipelineError {
    PipelineError::DataFormat {
        line,
        field,
        reason: "value is missing".to_string(),
    }
}
