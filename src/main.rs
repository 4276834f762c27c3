// Entry point and command-line flow.
//
// - `columns` lists the header of an export and which known fields it has.
// - `report` loads, filters and prints every report once, optionally
//   exporting CSV files and a JSON summary.
// - `interactive` keeps the dataset in memory and loops over a filter menu
//   and a results menu.
mod error;
mod filter;
mod loader;
mod mapper;
mod normalize;
mod output;
mod reports;
mod types;
mod util;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use types::{
    CaseRow, CategoryMode, Dataset, DateRange, Field, FilterRequest, FinalizedTasks, Selection,
};

#[derive(Parser, Debug)]
#[command(
    name = "case_report",
    version,
    about = "Filter and summarize branch support-case exports"
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the columns of the export and the known fields it provides
    Columns(SourceArgs),
    /// Load, filter and print every report once
    Report {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        filters: FilterArgs,
        /// Rows shown per table preview
        #[arg(long, default_value_t = 10)]
        rows: usize,
        /// Write CSV reports and summary.json into this directory
        #[arg(long)]
        export_dir: Option<PathBuf>,
        /// Extra case counts by field, e.g. `city` or `ESTADO_CASO` (repeatable)
        #[arg(long = "count-by")]
        count_by: Vec<String>,
    },
    /// Menu-driven filtering over a dataset held in memory
    Interactive {
        #[command(flatten)]
        source: SourceArgs,
    },
}

#[derive(Args, Debug, Clone)]
struct SourceArgs {
    /// Case export (.csv, .xlsx, .xls, .ods); looked up in the current
    /// directory when omitted
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Rows above the header row [default: 5 for spreadsheets, 0 for CSV]
    #[arg(long)]
    skip_rows: Option<usize>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CityPreset {
    /// Use --city (or every city when none is given)
    All,
    Guayaquil,
    Quito,
}

#[derive(Args, Debug, Clone)]
struct FilterArgs {
    /// Quick city selection; anything but `all` overrides --city
    #[arg(long, value_enum, default_value = "all")]
    city_preset: CityPreset,

    /// City to keep (repeatable)
    #[arg(long = "city")]
    cities: Vec<String>,

    /// Zone to keep (repeatable)
    #[arg(long = "zone")]
    zones: Vec<String>,

    /// Company to keep (repeatable)
    #[arg(long = "company")]
    companies: Vec<String>,

    /// First open date (YYYY-MM-DD); with --to omitted too, the whole dataset
    #[arg(long, value_parser = parse_cli_date)]
    from: Option<NaiveDate>,

    /// Last open date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_cli_date)]
    to: Option<NaiveDate>,

    /// Keep only cases affecting MIMG / TN_WIFI services
    #[arg(long)]
    show_only_affected: bool,

    /// Drop cases affecting MIMG / TN_WIFI services
    #[arg(long)]
    exclude_affected: bool,
}

impl FilterArgs {
    fn to_request(&self, dataset: &Dataset) -> FilterRequest {
        let cities = match self.city_preset {
            CityPreset::All => Selection::of(self.cities.iter().cloned()),
            CityPreset::Guayaquil => Selection::of([mapper::GUAYAQUIL]),
            CityPreset::Quito => Selection::of([mapper::QUITO]),
        };
        FilterRequest {
            cities,
            zones: Selection::of(self.zones.iter().cloned()),
            companies: Selection::of(self.companies.iter().cloned()),
            date_range: date_range_or_span(self.from, self.to, dataset),
            category: CategoryMode::from_toggles(self.show_only_affected, self.exclude_affected),
        }
    }
}

fn parse_cli_date(s: &str) -> std::result::Result<NaiveDate, String> {
    util::parse_date_safe(Some(s)).ok_or_else(|| format!("invalid date '{}', expected YYYY-MM-DD", s))
}

/// Neither bound given means the full span; a single bound stays incomplete.
fn date_range_or_span(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    dataset: &Dataset,
) -> DateRange {
    match (start, end) {
        (None, None) => DateRange::spanning(dataset),
        (start, end) => {
            if start.is_none() || end.is_none() {
                warn!("only one date bound given; the date range is incomplete");
            }
            DateRange { start, end }
        }
    }
}

/// Range from two typed bounds. Blank input means no bound; a bound that does
/// not parse makes the whole range incomplete.
fn typed_date_range(start: &str, end: &str, dataset: &Dataset) -> DateRange {
    let malformed: Vec<&str> = [start, end]
        .into_iter()
        .filter(|s| !s.trim().is_empty() && util::parse_date_safe(Some(*s)).is_none())
        .collect();
    if !malformed.is_empty() {
        warn!(?malformed, "unparseable date bound; the date range is incomplete");
        return DateRange::default();
    }
    date_range_or_span(
        util::parse_date_safe(Some(start)),
        util::parse_date_safe(Some(end)),
        dataset,
    )
}

/// Explicit session state for the interactive mode.
struct Session {
    original: Dataset,
    request: FilterRequest,
    current: Dataset,
}

impl Session {
    fn new(original: Dataset) -> Session {
        let request = FilterRequest::all(&original);
        let current = filter::filter(&original, &request);
        Session { original, request, current }
    }

    fn apply(&mut self, request: FilterRequest) {
        self.current = filter::filter(&self.original, &request);
        self.request = request;
    }

    fn reset(&mut self) {
        self.apply(FilterRequest::all(&self.original));
    }
}

fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn resolve_source(source: &SourceArgs) -> Result<(PathBuf, usize)> {
    let path = match &source.file {
        Some(p) => p.clone(),
        None => loader::discover_source(Path::new("."), loader::DEFAULT_SOURCE_PREFIX)
            .context("no --file given and no export found in the current directory")?,
    };
    let skip = source
        .skip_rows
        .unwrap_or_else(|| loader::default_skip_rows(&path));
    Ok((path, skip))
}

/// Load and normalize the export. Fails on the first malformed record.
fn load_dataset(source: &SourceArgs) -> Result<Dataset> {
    let (path, skip) = resolve_source(source)?;
    let (table, load_report) = loader::load_table(&path, skip)
        .with_context(|| format!("failed to load {}", path.display()))?;
    loader::check_required_columns(&table.columns)
        .with_context(|| format!("unexpected layout in {}", path.display()))?;
    let dataset = normalize::normalize(&table)
        .with_context(|| format!("failed to normalize {}", path.display()))?;

    println!(
        "Loaded '{}': {} cases ({} rows read).",
        path.display(),
        util::format_int(dataset.len()),
        util::format_int(load_report.total_rows)
    );
    if load_report.blank_rows > 0 {
        println!(
            "Note: {} blank rows skipped.",
            util::format_int(load_report.blank_rows)
        );
    }
    println!();
    Ok(dataset)
}

fn handle_columns(source: &SourceArgs) -> Result<()> {
    let (path, skip) = resolve_source(source)?;
    let (table, _) = loader::load_table(&path, skip)
        .with_context(|| format!("failed to load {}", path.display()))?;

    println!("Columns in '{}':", path.display());
    for col in &table.columns {
        let known = Field::SOURCE.iter().any(|f| f.column() == col);
        println!("  {}{}", col, if known { "" } else { "  (not used)" });
    }
    let missing: Vec<&str> = Field::SOURCE
        .iter()
        .map(|f| f.column())
        .filter(|c| !table.columns.iter().any(|col| col == c))
        .collect();
    if missing.is_empty() {
        println!("\nAll known fields are present.");
    } else {
        println!("\nMissing fields: {}", missing.join(", "));
    }
    if let Err(e) = loader::check_required_columns(&table.columns) {
        println!("Error: {}", e);
    }
    Ok(())
}

fn print_reports(data: &Dataset, max_rows: usize) {
    println!("Filtered cases: {}\n", util::format_int(data.len()));
    if data.is_empty() {
        println!("No data for the current filters.\n");
        return;
    }

    println!("Case Detail\n");
    print_detail(data, max_rows);

    println!("Cases by Zone\n");
    print_bars(data, Field::Zone);
    println!("Cases by Company\n");
    print_bars(data, Field::Company);

    println!("Cases by Zone and Date\n");
    print_pivot(data);

    println!("Cases with Repeated Box\n");
    print_duplicates(data, max_rows);

    println!("Finalized Tasks\n");
    print_finalized(data, max_rows);
}

fn print_detail(data: &Dataset, max_rows: usize) {
    let rows: Vec<CaseRow> = data.records.iter().map(CaseRow::from).collect();
    output::preview_table_rows(&rows, max_rows);
}

fn print_bars(data: &Dataset, field: Field) {
    match output::render_bars(&reports::group_counts(data, field)) {
        Some(chart) => println!("{}\n", chart),
        None => println!("(no data)\n"),
    }
}

fn print_pivot(data: &Dataset) {
    match output::render_pivot(&reports::pivot(data)) {
        Some(table) => println!("{}\n", table),
        None => println!("(no data)\n"),
    }
}

fn print_duplicates(data: &Dataset, max_rows: usize) {
    let dups = reports::duplicates(data);
    if dups.is_empty() {
        println!("No repeated boxes in the filtered data.\n");
    } else {
        output::preview_table_rows(&dups, max_rows);
    }
}

fn print_finalized(data: &Dataset, max_rows: usize) {
    match reports::finalized_tasks(data) {
        FinalizedTasks::Unavailable { missing } => {
            let names: Vec<&str> = missing.iter().map(|f| f.column()).collect();
            println!("Unavailable: missing columns {}.\n", names.join(", "));
        }
        FinalizedTasks::Rows(rows) if rows.is_empty() => {
            println!("No finalized tasks in the filtered data.\n");
        }
        FinalizedTasks::Rows(rows) => output::preview_table_rows(&rows, max_rows),
    }
}

fn export_reports(dir: &Path, data: &Dataset) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("cannot create {}", dir.display()))?;

    let cases: Vec<CaseRow> = data.records.iter().map(CaseRow::from).collect();
    output::write_csv(&dir.join("cases.csv"), &cases)?;
    output::write_csv(
        &dir.join("cases_by_zone.csv"),
        &reports::group_counts(data, Field::Zone),
    )?;
    output::write_csv(
        &dir.join("cases_by_company.csv"),
        &reports::group_counts(data, Field::Company),
    )?;
    output::write_pivot_csv(&dir.join("cases_by_zone_and_date.csv"), &reports::pivot(data))?;
    output::write_csv(&dir.join("repeated_boxes.csv"), &reports::duplicates(data))?;
    let finalized_path = dir.join("finalized_tasks.csv");
    match reports::finalized_tasks(data) {
        FinalizedTasks::Rows(rows) => output::write_csv(&finalized_path, &rows)?,
        // An earlier export must not outlive a summary that reports `null`.
        FinalizedTasks::Unavailable { .. } => match std::fs::remove_file(&finalized_path) {
            Ok(()) => info!(path = %finalized_path.display(), "stale export removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("cannot remove {}", finalized_path.display()))
            }
        },
    }
    output::write_json(&dir.join("summary.json"), &reports::generate_summary(data))?;

    info!(dir = %dir.display(), "reports exported");
    println!("Reports exported to {}\n", dir.display());
    Ok(())
}

fn handle_report(
    source: &SourceArgs,
    filters: &FilterArgs,
    rows: usize,
    export_dir: Option<&Path>,
    count_by: &[String],
) -> Result<()> {
    let extra_counts = count_by
        .iter()
        .map(|name| name.parse::<Field>())
        .collect::<std::result::Result<Vec<Field>, _>>()?;

    let dataset = load_dataset(source)?;
    let request = filters.to_request(&dataset);
    let filtered = filter::filter(&dataset, &request);
    print_reports(&filtered, rows);
    if !filtered.is_empty() {
        for field in extra_counts {
            println!("Cases by {}\n", field);
            print_bars(&filtered, field);
        }
    }
    if let Some(dir) = export_dir {
        export_reports(dir, &filtered)?;
    }
    Ok(())
}

/// Print `label` and read one trimmed line. `None` on end of input.
fn prompt(label: &str) -> Option<String> {
    print!("{}", label);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    match io::stdin().read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

fn split_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Ask for a new filter request. `None` when input ends mid-way.
fn ask_filters(session: &Session) -> Option<FilterRequest> {
    let data = &session.original;
    println!("\n--- Filters ---");

    println!("Cities available: {}", data.distinct(Field::City).join(", "));
    let cities = split_list(&prompt("Cities (blank for all, comma-separated): ")?);

    println!("\nZones available: {}", data.distinct(Field::Zone).join(", "));
    let zones = split_list(&prompt("Zones (blank for all, comma-separated): ")?);

    println!("\nCompanies available: {}", data.distinct(Field::Company).join(", "));
    let companies = split_list(&prompt("Companies (blank for all, comma-separated): ")?);

    println!("\nOpen date range (YYYY-MM-DD, leave both blank for all dates):");
    let start = prompt("Start date: ")?;
    let end = prompt("End date: ")?;
    let date_range = typed_date_range(&start, &end, data);

    println!("\nAffected services: [0] no filter  [1] only MIMG/TN_WIFI  [2] omit MIMG/TN_WIFI");
    let category = match prompt("Choice: ")?.as_str() {
        "1" => CategoryMode::ShowOnly,
        "2" => CategoryMode::Exclude,
        _ => CategoryMode::None,
    };

    Some(FilterRequest {
        cities: Selection::of(cities),
        zones: Selection::of(zones),
        companies: Selection::of(companies),
        date_range,
        category,
    })
}

/// Results menu. Returns `false` when input has ended.
fn results_menu(session: &Session) -> bool {
    let data = &session.current;
    loop {
        println!("\n--- Results ({} cases) ---", util::format_int(data.len()));
        println!("[1] Case detail");
        println!("[2] Cases by zone");
        println!("[3] Cases by company");
        println!("[4] Cases by zone and date");
        println!("[5] Repeated boxes");
        println!("[6] Finalized tasks");
        println!("[7] Export reports");
        println!("[8] Back to main menu");
        let Some(choice) = prompt("Enter choice: ") else {
            return false;
        };
        println!();
        match choice.as_str() {
            "1" => print_detail(data, usize::MAX),
            "2" => print_bars(data, Field::Zone),
            "3" => print_bars(data, Field::Company),
            "4" => print_pivot(data),
            "5" => print_duplicates(data, usize::MAX),
            "6" => print_finalized(data, usize::MAX),
            "7" => {
                let Some(dir) = prompt("Export directory [reports]: ") else {
                    return false;
                };
                let dir = if dir.is_empty() { "reports".to_string() } else { dir };
                if let Err(e) = export_reports(Path::new(&dir), data) {
                    eprintln!("Export failed: {:#}\n", e);
                }
            }
            "8" => return true,
            _ => println!("Invalid choice. Please enter 1-8."),
        }
    }
}

fn handle_interactive(source: &SourceArgs) -> Result<()> {
    let mut session = Session::new(load_dataset(source)?);
    loop {
        println!("--- Main Menu ---");
        println!(
            "{} of {} cases selected.",
            util::format_int(session.current.len()),
            util::format_int(session.original.len())
        );
        println!("[1] Apply filters");
        println!("[2] View results");
        println!("[3] Reset filters");
        println!("[4] Exit");
        let Some(choice) = prompt("Enter choice: ") else {
            break;
        };
        match choice.as_str() {
            "1" => {
                let Some(request) = ask_filters(&session) else {
                    break;
                };
                session.apply(request);
                println!(
                    "\n{} cases match the filters.",
                    util::format_int(session.current.len())
                );
                if !results_menu(&session) {
                    break;
                }
            }
            "2" => {
                if !results_menu(&session) {
                    break;
                }
            }
            "3" => {
                session.reset();
                println!("Filters reset.\n");
            }
            "4" => break,
            _ => println!("Invalid choice. Please enter 1-4.\n"),
        }
    }
    info!(request = ?session.request, "session ended");
    println!("Exiting the program.");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match &cli.command {
        Command::Columns(source) => handle_columns(source),
        Command::Report {
            source,
            filters,
            rows,
            export_dir,
            count_by,
        } => handle_report(source, filters, *rows, export_dir.as_deref(), count_by),
        Command::Interactive { source } => handle_interactive(source),
    }
}
