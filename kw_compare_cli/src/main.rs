mod glyph;

use std::fmt::Display;
use std::fs::{self, File};
use std::io::{self, Write};
use std::panic;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};
use kw_compare::{
    render_insights, repair_show, ChartMatrix, Comparator, CompareConfig, DataSource, Dataset,
    IdentityScheme, Insight, KarmaRange, LoadedSource, Loader, Period, RawShow, Season, HOURS,
};
use plotters::prelude::*;
use rayon::prelude::*;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::glyph::GlyphTextBackend;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_COMMIT_HASH"), ")");

#[derive(Parser, Debug)]
#[command(author, version = VERSION, about = "Karma progression comparison CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the show picker for the current filters
    List(ListArgs),
    /// Chart and summarize the selected shows
    Compare(CompareArgs),
    /// Fill missing hours and write a repaired dataset
    Clean(CleanArgs),
}

/// Sources plus the selection and filter flags shared by `list` and `compare`.
#[derive(Args, Debug)]
struct ViewArgs {
    /// Dataset URLs or JSON files
    #[arg(required = true, value_hint = ValueHint::AnyPath)]
    sources: Vec<String>,

    /// Case-insensitive title search
    #[arg(long)]
    search: Option<String>,

    /// Year filter (`current`, `all`, or a year)
    #[arg(long, value_parser = parse_period_arg::<i32>)]
    year: Option<PeriodArg<i32>>,

    /// Season filter (`current`, `all`, or winter|spring|summer|fall)
    #[arg(long, value_parser = parse_period_arg::<Season>)]
    season: Option<PeriodArg<Season>>,

    /// Minimum final karma
    #[arg(long)]
    min_karma: Option<i64>,

    /// Maximum final karma
    #[arg(long)]
    max_karma: Option<i64>,

    /// Clear search/year/season and span the whole karma range before applying other filters
    #[arg(long, action = ArgAction::SetTrue)]
    reset_filters: bool,

    /// Toggle a show by identity (repeatable, applied in order)
    #[arg(long = "select")]
    select: Vec<String>,

    /// Clear the selection before applying `--select`
    #[arg(long, action = ArgAction::SetTrue)]
    clear: bool,

    /// Do not auto-select the first show
    #[arg(long, action = ArgAction::SetTrue)]
    no_auto_select: bool,

    /// Maximum number of selected shows
    #[arg(long)]
    selection_cap: Option<usize>,

    /// Identity scheme
    #[arg(long, value_enum)]
    identity: Option<IdentityOpt>,

    /// Optional JSON config path
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct ListArgs {
    #[command(flatten)]
    view: ViewArgs,

    /// Output format
    #[arg(long, value_enum, default_value_t = ListFormat::Table)]
    format: ListFormat,
}

#[derive(Parser, Debug)]
struct CompareArgs {
    #[command(flatten)]
    view: ViewArgs,

    /// Output matrix CSV path (`-` for stdout)
    #[arg(short, long, default_value = "karma.csv", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Output PNG chart path
    #[arg(long, value_hint = ValueHint::FilePath)]
    png: Option<PathBuf>,

    /// Output SVG chart path
    #[arg(long, value_hint = ValueHint::FilePath)]
    svg: Option<PathBuf>,

    /// Optional CSV to write per-show statistics
    #[arg(long, value_hint = ValueHint::FilePath)]
    stats_output: Option<PathBuf>,

    /// Optional JSON report path
    #[arg(long, value_hint = ValueHint::FilePath)]
    report: Option<PathBuf>,

    /// Do not print the statistics panel
    #[arg(long, action = ArgAction::SetTrue)]
    quiet: bool,
}

#[derive(Parser, Debug)]
struct CleanArgs {
    /// Dataset URLs or JSON files
    #[arg(required = true, value_hint = ValueHint::AnyPath)]
    sources: Vec<String>,

    /// Output JSON path (`-` for stdout)
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum IdentityOpt {
    Composite,
    Provider,
}

impl From<IdentityOpt> for IdentityScheme {
    fn from(value: IdentityOpt) -> Self {
        match value {
            IdentityOpt::Composite => IdentityScheme::Composite,
            IdentityOpt::Provider => IdentityScheme::Provider,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ListFormat {
    Table,
    Json,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum PeriodArg<T> {
    Current,
    All,
    Is(T),
}

fn parse_period_arg<T>(input: &str) -> Result<PeriodArg<T>, String>
where
    T: FromStr,
    T::Err: Display,
{
    match input.trim().to_ascii_lowercase().as_str() {
        "current" => Ok(PeriodArg::Current),
        "all" | "" => Ok(PeriodArg::All),
        other => other
            .parse::<T>()
            .map(PeriodArg::Is)
            .map_err(|e| e.to_string()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = match &cli.command {
        Command::List(args) => args.view.verbose,
        Command::Compare(args) => args.view.verbose,
        Command::Clean(args) => args.verbose,
    };
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match cli.command {
        Command::List(args) => handle_list(args),
        Command::Compare(args) => handle_compare(args),
        Command::Clean(args) => handle_clean(args),
    }
}

fn handle_list(args: ListArgs) -> Result<()> {
    let (comparator, _) = build_comparator(&args.view)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_listing(&comparator, args.format, &mut out)
}

fn write_listing<W: Write>(comparator: &Comparator, format: ListFormat, out: &mut W) -> Result<()> {
    match format {
        ListFormat::Table => write_picker_table(comparator, out)?,
        ListFormat::Json => {
            let listing = PickerListing {
                years: comparator.dataset().years(),
                seasons: comparator.dataset().seasons(),
                shows: comparator.picker(),
            };
            serde_json::to_writer_pretty(&mut *out, &listing)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

fn handle_compare(args: CompareArgs) -> Result<()> {
    let (comparator, sources) = build_comparator(&args.view)?;
    let matrix = comparator.matrix();
    let insights = comparator.insights();
    info!(
        "Charting {} of {} selected shows",
        matrix.series.len(),
        comparator.selection().len()
    );

    if args.output.as_os_str() == "-" {
        write_matrix_stdout(&matrix)?;
    } else {
        write_matrix_csv(&matrix, &args.output)?;
        info!("Wrote matrix CSV: {}", args.output.display());
    }

    if let Some(path) = args.stats_output.as_ref() {
        write_stats_csv(&insights, path)?;
        info!("Wrote statistics: {}", path.display());
    }

    if let Some(path) = args.report.as_ref() {
        write_report(&comparator, &sources, &matrix, &insights, path)?;
        info!("Wrote report: {}", path.display());
    }

    let palette = comparator.config().palette_rgb();
    if let Some(path) = args.png.as_ref() {
        if let Err(err) = render_chart_guard(&matrix, &palette, path, ChartKind::Png) {
            warn!("Skipping PNG render ({}): {}", path.display(), err);
        } else {
            info!("Wrote plot: {}", path.display());
        }
    }
    if let Some(path) = args.svg.as_ref() {
        if let Err(err) = render_chart_guard(&matrix, &palette, path, ChartKind::Svg) {
            warn!("Skipping SVG render ({}): {}", path.display(), err);
        } else {
            info!("Wrote plot: {}", path.display());
        }
    }

    if !args.quiet && args.output.as_os_str() != "-" {
        if insights.is_empty() {
            println!("No shows selected.");
        } else {
            print!("{}", render_insights(&insights));
        }
    }
    Ok(())
}

fn handle_clean(args: CleanArgs) -> Result<()> {
    let sources = load_sources(&args.sources)?;
    let mut shows: Vec<RawShow> = sources.into_iter().flat_map(|s| s.shows).collect();
    let repaired = shows
        .iter_mut()
        .map(repair_show)
        .filter(|changed| *changed)
        .count();
    info!("Repaired {} of {} shows", repaired, shows.len());

    let json = serde_json::to_string_pretty(&shows)?;
    if args.output.as_os_str() == "-" {
        println!("{json}");
    } else {
        fs::write(&args.output, json + "\n")
            .with_context(|| format!("failed to write {}", args.output.display()))?;
        info!("Wrote repaired dataset: {}", args.output.display());
    }
    Ok(())
}

fn load_config(view: &ViewArgs) -> Result<CompareConfig> {
    let mut config = match view.config.as_ref() {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            CompareConfig::from_json(&text)
                .with_context(|| format!("failed to parse {}", path.display()))?
        }
        None => CompareConfig::default(),
    };
    if let Some(identity) = view.identity {
        config.identity = identity.into();
    }
    if let Some(cap) = view.selection_cap {
        config.selection_cap = Some(cap);
    }
    if view.no_auto_select {
        config.auto_select_first = false;
    }
    config.validate()?;
    Ok(config)
}

fn load_sources(inputs: &[String]) -> Result<Vec<LoadedSource>> {
    if inputs.is_empty() {
        return Err(anyhow!("no data sources supplied"));
    }
    let loader = Loader::new()?;
    let indexed: Vec<(usize, DataSource)> = inputs
        .iter()
        .map(|input| DataSource::parse(input))
        .enumerate()
        .collect();

    let mut loaded: Vec<(usize, LoadedSource)> = indexed
        .par_iter()
        .map(|(idx, source)| -> Result<(usize, LoadedSource)> {
            let loaded = loader.load(source)?;
            debug!("{} sha256={}", loaded.origin, loaded.sha256);
            Ok((*idx, loaded))
        })
        .collect::<Result<Vec<_>>>()?;

    loaded.sort_by_key(|(idx, _)| *idx);
    Ok(loaded.into_iter().map(|(_, source)| source).collect())
}

fn build_comparator(view: &ViewArgs) -> Result<(Comparator, Vec<LoadedSource>)> {
    let config = load_config(view)?;
    let sources = load_sources(&view.sources)?;
    let raw: Vec<RawShow> = sources.iter().flat_map(|s| s.shows.iter().cloned()).collect();
    let dataset = Dataset::from_raw(&raw, config.identity);
    if dataset.is_empty() {
        warn!("No shows found in {} source(s)", sources.len());
    }

    let mut comparator = Comparator::load(dataset, config);
    apply_view(&mut comparator, view)?;
    Ok((comparator, sources))
}

fn apply_view(comparator: &mut Comparator, view: &ViewArgs) -> Result<()> {
    if view.reset_filters {
        comparator.reset_filters();
    }
    if let Some(search) = view.search.as_ref() {
        comparator.set_search(search.as_str());
    }
    match view.year {
        Some(PeriodArg::All) => comparator.set_year(None),
        Some(PeriodArg::Is(year)) => comparator.set_year(Some(year)),
        Some(PeriodArg::Current) => {
            comparator.set_year(Some(Period::current().year))
        }
        None => {}
    }
    match view.season {
        Some(PeriodArg::All) => comparator.set_season(None),
        Some(PeriodArg::Is(season)) => comparator.set_season(Some(season)),
        Some(PeriodArg::Current) => {
            comparator.set_season(Some(Period::current().season))
        }
        None => {}
    }
    if view.min_karma.is_some() || view.max_karma.is_some() {
        let current = comparator.filter_state().karma_range;
        comparator.set_karma_range(KarmaRange {
            min: view.min_karma.unwrap_or(current.min),
            max: view.max_karma.unwrap_or(current.max),
        })?;
    }

    if view.clear {
        comparator.clear_selection();
    }
    for identity in &view.select {
        let outcome = comparator
            .toggle(identity)
            .with_context(|| format!("failed to toggle {identity}"))?;
        debug!("--select {}: {:?}", identity, outcome);
    }
    Ok(())
}

#[derive(Serialize)]
struct PickerListing<'a> {
    years: Vec<i32>,
    seasons: Vec<Season>,
    shows: Vec<kw_compare::PickerEntry<'a>>,
}

fn write_picker_table<W: Write>(comparator: &Comparator, out: &mut W) -> Result<()> {
    let dataset = comparator.dataset();
    let years: Vec<String> = dataset.years().iter().map(i32::to_string).collect();
    let seasons: Vec<&str> = dataset.seasons().iter().map(|s| s.as_str()).collect();
    writeln!(out, "years: {}", years.join(", "))?;
    writeln!(out, "seasons: {}", seasons.join(", "))?;

    let picker = comparator.picker();
    if picker.is_empty() {
        writeln!(out, "No shows match the current filters.")?;
        return Ok(());
    }
    for entry in picker {
        let show = entry.show;
        let period = match (show.season, show.year) {
            (Some(season), Some(year)) => format!("{season} {year}"),
            (None, Some(year)) => year.to_string(),
            (Some(season), None) => season.to_string(),
            (None, None) => "-".to_string(),
        };
        writeln!(
            out,
            "[{}] {}\t{} (Ep {})\t{}\t{}",
            if entry.selected { "x" } else { " " },
            show.identity,
            show.title,
            show.episode,
            period,
            show.final_karma
        )?;
    }
    Ok(())
}

fn write_matrix_stdout(matrix: &ChartMatrix) -> Result<()> {
    let stdout = io::stdout();
    let handle = stdout.lock();
    let mut writer = csv::Writer::from_writer(handle);
    write_matrix_rows(matrix, &mut writer)
}

fn write_matrix_csv(matrix: &ChartMatrix, path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);
    write_matrix_rows(matrix, &mut writer)
}

fn write_matrix_rows<W: Write>(matrix: &ChartMatrix, writer: &mut csv::Writer<W>) -> Result<()> {
    let mut header = vec!["hour".to_string()];
    header.extend(matrix.series.iter().map(|s| s.key()));
    writer.write_record(&header)?;

    for row in &matrix.rows {
        let mut record = vec![row.hour.to_string()];
        record.extend(
            row.values
                .iter()
                .map(|v| v.map(|k| k.to_string()).unwrap_or_default()),
        );
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

fn write_stats_csv(insights: &[Insight], path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);
    write_stats_rows(insights, &mut writer)
}

fn write_stats_rows<W: Write>(insights: &[Insight], writer: &mut csv::Writer<W>) -> Result<()> {
    writer.write_record([
        "identity",
        "title",
        "episode",
        "start_karma",
        "end_karma",
        "growth",
        "growth_percent",
        "max_hourly_gain",
        "max_gain_hour",
        "peak_karma",
        "sample_count",
    ])?;

    for insight in insights {
        let s = &insight.stats;
        writer.write_record([
            insight.identity.clone(),
            insight.title.clone(),
            insight.episode.clone(),
            s.start_karma.to_string(),
            s.end_karma.to_string(),
            s.growth.to_string(),
            s.growth_percent
                .map(|v| format!("{:.1}", v))
                .unwrap_or_else(|| "".into()),
            s.max_hourly_gain
                .map(|g| g.gain.to_string())
                .unwrap_or_else(|| "".into()),
            s.max_hourly_gain
                .map(|g| g.hour.to_string())
                .unwrap_or_else(|| "".into()),
            s.peak_karma
                .map(|v| v.to_string())
                .unwrap_or_else(|| "".into()),
            s.sample_count.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct SourceDigest<'a> {
    origin: &'a str,
    sha256: &'a str,
    shows: usize,
}

fn write_report(
    comparator: &Comparator,
    sources: &[LoadedSource],
    matrix: &ChartMatrix,
    insights: &[Insight],
    path: &Path,
) -> Result<()> {
    let digests: Vec<SourceDigest> = sources
        .iter()
        .map(|s| SourceDigest {
            origin: &s.origin,
            sha256: &s.sha256,
            shows: s.shows.len(),
        })
        .collect();
    let report = serde_json::json!({
        "generated_at": Utc::now().to_rfc3339(),
        "version": VERSION,
        "sources": digests,
        "identity": comparator.dataset().scheme(),
        "state": comparator.state(),
        "series": matrix.series,
        "rows": JsonValue::Array(matrix.to_json_rows()),
        "insights": insights,
    });
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(file, &report)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

enum ChartKind {
    Png,
    Svg,
}

fn render_chart_guard(
    matrix: &ChartMatrix,
    palette: &[(u8, u8, u8)],
    path: &Path,
    kind: ChartKind,
) -> Result<(), String> {
    let render = || -> Result<(), String> {
        render_chart(matrix, palette, path, kind).map_err(|e| format!("plotting error: {}", e))
    };

    panic::catch_unwind(panic::AssertUnwindSafe(render))
        .map_err(|_| "plotting backend panicked".to_string())?
}

fn render_chart(
    matrix: &ChartMatrix,
    palette: &[(u8, u8, u8)],
    path: &Path,
    kind: ChartKind,
) -> Result<()> {
    if matrix.is_empty() {
        return Err(anyhow!("no shows to chart"));
    }
    match kind {
        ChartKind::Png => {
            let backend = BitMapBackend::new(path, (1280, 760));
            let root = GlyphTextBackend::new(backend).into_drawing_area();
            draw_chart(root, matrix, palette)?;
        }
        ChartKind::Svg => {
            let root = SVGBackend::new(path, (1280, 760)).into_drawing_area();
            draw_chart(root, matrix, palette)?;
        }
    }
    Ok(())
}

/// Contiguous runs of present samples; a missing hour breaks the line.
fn segments(column: &[(u32, Option<i64>)]) -> Vec<Vec<(u32, i64)>> {
    let mut out = Vec::new();
    let mut current = Vec::new();
    for &(hour, value) in column {
        match value {
            Some(karma) => current.push((hour, karma)),
            None if !current.is_empty() => out.push(std::mem::take(&mut current)),
            None => {}
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn draw_chart<DB>(
    root: DrawingArea<DB, plotters::coord::Shift>,
    matrix: &ChartMatrix,
    palette: &[(u8, u8, u8)],
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let area = root;
    area.fill(&WHITE)?;
    let y_max = matrix.max_karma().unwrap_or(0).max(0).saturating_add(10);
    let mut chart = ChartBuilder::on(&area)
        .margin(25)
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(1u32..HOURS, 0i64..y_max)?;

    chart
        .configure_mesh()
        .light_line_style(&TRANSPARENT)
        .x_desc("Hours since thread creation")
        .y_desc("Karma")
        .x_label_formatter(&|v| format!("{}", v))
        .y_label_formatter(&|v| format!("{}", v))
        .draw()?;

    for (idx, series) in matrix.series.iter().enumerate() {
        let (r, g, b) = palette
            .get(series.color_index)
            .copied()
            .unwrap_or((50, 50, 50));
        let color = RGBColor(r, g, b);
        let style = ShapeStyle {
            color: color.to_rgba(),
            filled: false,
            stroke_width: 2,
        };

        let runs = segments(&matrix.column(idx));
        for run in &runs {
            chart.draw_series(
                run.iter()
                    .map(|&point| Circle::new(point, 3, color.filled())),
            )?;
        }
        let mut runs = runs.into_iter();
        let first = runs.next().unwrap_or_default();
        chart
            .draw_series(LineSeries::new(first, style))?
            .label(series.label.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 30, y)], color));
        for run in runs {
            chart.draw_series(LineSeries::new(run, style))?;
        }
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.7))
        .border_style(&BLACK.mix(0.3))
        .position(SeriesLabelPosition::UpperLeft)
        .draw()?;

    area.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kw_compare::{build_matrix, IdentityScheme};

    const SAMPLE: &str = r#"[
        {"mal_id": 1, "title": "Alpha", "episode": 1, "season": "fall", "year": 2024,
         "hourly_karma": [{"hour": 1, "karma": 10}, {"hour": 48, "karma": 110}]},
        {"mal_id": 2, "title": "Beta", "episode": 1, "season": "fall", "year": 2024,
         "hourly_karma": [{"hour": 1, "karma": 5}, {"hour": 24, "karma": 15}]}
    ]"#;

    fn sample_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        file
    }

    fn compare_args(extra: &[&str]) -> CompareArgs {
        let mut argv = vec!["kw_compare", "compare"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Compare(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn period_args() {
        assert_eq!(parse_period_arg::<i32>("all"), Ok(PeriodArg::All));
        assert_eq!(parse_period_arg::<i32>("Current"), Ok(PeriodArg::Current));
        assert_eq!(parse_period_arg::<i32>("2024"), Ok(PeriodArg::Is(2024)));
        assert_eq!(
            parse_period_arg::<Season>("autumn"),
            Ok(PeriodArg::Is(Season::Fall))
        );
        assert!(parse_period_arg::<i32>("soon").is_err());
    }

    #[test]
    fn compare_flags_parse() {
        let args = compare_args(&[
            "data.json",
            "--year",
            "all",
            "--select",
            "1-ep1",
            "--select",
            "2-ep1",
            "--selection-cap",
            "3",
            "--identity",
            "provider",
            "-o",
            "-",
        ]);
        assert_eq!(args.view.sources, vec!["data.json"]);
        assert_eq!(args.view.year, Some(PeriodArg::All));
        assert_eq!(args.view.select, vec!["1-ep1", "2-ep1"]);
        assert_eq!(args.view.selection_cap, Some(3));
        assert!(matches!(args.view.identity, Some(IdentityOpt::Provider)));
        assert_eq!(args.output, PathBuf::from("-"));
    }

    #[test]
    fn view_flags_drive_selection() {
        let file = sample_file();
        let path = file.path().to_string_lossy().to_string();
        let args = compare_args(&[
            path.as_str(),
            "--year",
            "all",
            "--season",
            "all",
            "--select",
            "2-ep1",
        ]);
        let (comparator, sources) = build_comparator(&args.view).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(comparator.charted(), vec!["1-ep1", "2-ep1"]);

        let args = compare_args(&[path.as_str(), "--year", "all", "--season", "all", "--clear"]);
        let (comparator, _) = build_comparator(&args.view).unwrap();
        assert!(comparator.selection().is_empty());
    }

    #[test]
    fn cap_violation_is_reported() {
        let file = sample_file();
        let path = file.path().to_string_lossy().to_string();
        let args = compare_args(&[path.as_str(), "--selection-cap", "1", "--select", "2-ep1"]);
        assert!(build_comparator(&args.view).is_err());
    }

    #[test]
    fn matrix_csv_leaves_gaps_empty() {
        let raw = kw_compare::parse_shows(SAMPLE.as_bytes()).unwrap();
        let dataset = Dataset::from_raw(&raw, IdentityScheme::Composite);
        let matrix = build_matrix(&["1-ep1", "2-ep1"], &dataset, 12);
        let mut writer = csv::Writer::from_writer(Vec::new());
        write_matrix_rows(&matrix, &mut writer).unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 49);
        assert_eq!(lines[0], "hour,karma_1-ep1,karma_2-ep1");
        assert_eq!(lines[1], "1,10,5");
        assert_eq!(lines[2], "2,,");
        assert_eq!(lines[24], "24,,15");
        assert_eq!(lines[48], "48,110,");
    }

    fn sample_comparator(extra: &[&str]) -> (Comparator, Vec<LoadedSource>, tempfile::NamedTempFile) {
        let file = sample_file();
        let path = file.path().to_string_lossy().to_string();
        let mut argv = vec![path.as_str(), "--year", "all", "--season", "all"];
        argv.extend_from_slice(extra);
        let args = compare_args(&argv);
        let (comparator, sources) = build_comparator(&args.view).unwrap();
        (comparator, sources, file)
    }

    #[test]
    fn list_table_marks_selected_shows() {
        let (comparator, _, _file) = sample_comparator(&[]);
        let mut out = Vec::new();
        write_listing(&comparator, ListFormat::Table, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "years: 2024");
        assert_eq!(lines[1], "seasons: fall");
        assert!(lines[2].starts_with("[x] 1-ep1\tAlpha (Ep 1)"));
        assert!(lines[2].ends_with("\t110"));
        assert!(lines[3].starts_with("[ ] 2-ep1\tBeta (Ep 1)"));

        let (comparator, _, _file) = sample_comparator(&["--search", "nothing"]);
        let mut out = Vec::new();
        write_listing(&comparator, ListFormat::Table, &mut out).unwrap();
        assert!(String::from_utf8(out)
            .unwrap()
            .contains("No shows match the current filters."));
    }

    #[test]
    fn list_json_carries_picker_state() {
        let (comparator, _, _file) = sample_comparator(&[]);
        let mut out = Vec::new();
        write_listing(&comparator, ListFormat::Json, &mut out).unwrap();
        let listing: JsonValue = serde_json::from_slice(&out).unwrap();
        assert_eq!(listing["years"], serde_json::json!([2024]));
        let shows = listing["shows"].as_array().unwrap();
        assert_eq!(shows.len(), 2);
        assert_eq!(shows[0]["show"]["identity"], "1-ep1");
        assert_eq!(shows[0]["selected"], true);
        assert_eq!(shows[0]["color_index"], 0);
        assert_eq!(shows[1]["selected"], false);
        assert!(shows[1]["color_index"].is_null());
    }

    #[test]
    fn stats_rows_leave_undefined_cells_empty() {
        let raw = kw_compare::parse_shows(
            br#"[
                {"mal_id": 1, "title": "Alpha", "episode": 1,
                 "hourly_karma": [{"hour": 1, "karma": 10}, {"hour": 2, "karma": 14}, {"hour": 48, "karma": 110}]},
                {"mal_id": 5, "title": "Late", "episode": 2,
                 "hourly_karma": [{"hour": 2, "karma": 4}, {"hour": 4, "karma": 9}]}
            ]"#,
        )
        .unwrap();
        let dataset = Dataset::from_raw(&raw, IdentityScheme::Composite);
        let matrix = build_matrix(&["1-ep1", "5-ep2"], &dataset, 12);
        let insights = kw_compare::insights(&matrix, &dataset);
        let mut writer = csv::Writer::from_writer(Vec::new());
        write_stats_rows(&insights, &mut writer).unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("identity,title,episode,start_karma"));
        assert_eq!(lines[1], "1-ep1,Alpha,1,10,110,100,1000.0,4,2,110,3");
        assert_eq!(lines[2], "5-ep2,Late,2,0,9,9,,,,9,2");
    }

    #[test]
    fn report_records_digests_and_gaps() {
        let (comparator, sources, _file) = sample_comparator(&["--select", "2-ep1"]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let matrix = comparator.matrix();
        write_report(&comparator, &sources, &matrix, &comparator.insights(), &path).unwrap();

        let report: JsonValue = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        let digest = report["sources"][0]["sha256"].as_str().unwrap();
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(report["sources"][0]["shows"], 2);
        assert_eq!(report["version"], VERSION);

        let rows = report["rows"].as_array().unwrap();
        assert_eq!(rows.len(), 48);
        assert_eq!(rows[0]["karma_1-ep1"], 10);
        assert!(rows[1]["karma_1-ep1"].is_null());
        assert!(rows[1]["karma_2-ep1"].is_null());
        assert_eq!(rows[23]["karma_2-ep1"], 15);
        assert_eq!(report["insights"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn charts_render_to_png_and_svg() {
        let (comparator, _, _file) = sample_comparator(&["--select", "2-ep1"]);
        let matrix = comparator.matrix();
        let palette = comparator.config().palette_rgb();
        let dir = tempfile::tempdir().unwrap();

        let png = dir.path().join("chart.png");
        assert_eq!(
            render_chart_guard(&matrix, &palette, &png, ChartKind::Png),
            Ok(())
        );
        assert!(fs::metadata(&png).unwrap().len() > 0);

        let svg = dir.path().join("chart.svg");
        assert_eq!(
            render_chart_guard(&matrix, &palette, &svg, ChartKind::Svg),
            Ok(())
        );
        let text = fs::read_to_string(&svg).unwrap();
        assert!(text.contains("<svg"));
        assert!(text.contains("Alpha (Ep 1)"));
    }

    #[test]
    fn empty_chart_is_an_error() {
        let (comparator, _, _file) = sample_comparator(&["--clear"]);
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("chart.png");
        assert!(render_chart_guard(&comparator.matrix(), &[], &png, ChartKind::Png).is_err());
    }

    #[test]
    fn segments_split_on_missing_hours() {
        let column = vec![(1, Some(1)), (2, None), (3, Some(3)), (4, Some(4)), (5, None)];
        assert_eq!(segments(&column), vec![vec![(1, 1)], vec![(3, 3), (4, 4)]]);
        assert!(segments(&[(1, None)]).is_empty());
    }

    #[test]
    fn clean_writes_complete_series() {
        let file = sample_file();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("clean.json");
        let cli = Cli::try_parse_from([
            "kw_compare",
            "clean",
            file.path().to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
        ])
        .unwrap();
        let Command::Clean(args) = cli.command else {
            panic!("expected clean");
        };
        handle_clean(args).unwrap();

        let shows = kw_compare::parse_shows(&fs::read(&out).unwrap()).unwrap();
        assert_eq!(shows.len(), 2);
        for show in &shows {
            assert_eq!(show.samples().len(), 48);
        }
        assert_eq!(shows[1].samples()[47].karma, 15);
    }
}
