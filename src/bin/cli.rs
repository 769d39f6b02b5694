use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;

use practice_analytics::config::{set_global_config, PracticeConfig};
use practice_analytics::data_types::parse_date;
use practice_analytics::export::{exporter_for, select_field, to_value};
use practice_analytics::prelude::*;

#[derive(Parser)]
#[command(name = "pacli", version)]
#[command(about = "Practice Analytics CLI - Provider, financial and scenario views over a practice's CSV exports", long_about = None)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show row counts, quarantined rows and load issues
    Stats(StatsArgs),
    /// List every provider's metrics for a window
    Providers(ProvidersArgs),
    /// Compare one provider against peers
    Provider(ProviderArgs),
    /// Revenue, payments and outstanding claims for a window
    Financial(FinancialArgs),
    /// Model revenue under changed MBT percentages
    Scenario(ScenarioArgs),
    /// Most recently seen patients
    Recent(RecentArgs),
    /// Show the effective configuration
    Config(ConfigArgs),
}

#[derive(Args)]
struct CommonArgs {
    /// Directory containing patients.csv, procedures.csv, billing.csv, doctors.csv and hospitals.csv
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Reference date for trailing windows (YYYY-MM-DD), defaults to today
    #[arg(long, global = true)]
    as_of: Option<String>,
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct OutputArgs {
    /// Write to a file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,
    /// Output format
    #[arg(long, value_enum, global = true, default_value_t = FormatOpt::Json)]
    format: FormatOpt,
    /// Single-line JSON
    #[arg(long, global = true)]
    compact: bool,
    /// Emit only one field of the view, e.g. `procedure_series` or `totals`
    #[arg(long, global = true)]
    series: Option<String>,
    /// CSV field delimiter
    #[arg(long, global = true, default_value = ",", value_parser = parse_delimiter)]
    delimiter: u8,
    /// Omit the CSV header row
    #[arg(long, global = true)]
    no_header: bool,
}

#[derive(Args)]
struct WindowArgs {
    /// Trailing window in days (defaults to the configured window)
    #[arg(long, conflicts_with_all = ["start", "end"], value_parser = clap::value_parser!(u32).range(1..=36500))]
    days: Option<u32>,
    /// Window start (YYYY-MM-DD), requires --end
    #[arg(long, requires = "end")]
    start: Option<String>,
    /// Window end (YYYY-MM-DD), requires --start
    #[arg(long, requires = "start")]
    end: Option<String>,
}

#[derive(Args)]
struct StatsArgs {
    /// Print a readable summary instead of JSON
    #[arg(long)]
    summary: bool,
}

#[derive(Args)]
struct ProvidersArgs {
    #[command(flatten)]
    window: WindowArgs,
    /// Location ID, or "all"
    #[arg(long, default_value = "all")]
    location: String,
}

#[derive(Args)]
struct ProviderArgs {
    /// Provider ID of the subject
    #[arg(short, long)]
    provider: String,
    /// Peer provider IDs (comma separated); all other providers when omitted
    #[arg(long, value_delimiter = ',')]
    peers: Vec<String>,
    #[command(flatten)]
    window: WindowArgs,
    /// Location ID, or "all"
    #[arg(long, default_value = "all")]
    location: String,
    /// Series granularity: month or week
    #[arg(long, default_value = "month", value_parser = parse_granularity)]
    granularity: Granularity,
}

#[derive(Args)]
struct FinancialArgs {
    #[command(flatten)]
    window: WindowArgs,
    /// Number of outstanding claims to list (defaults to the configured limit)
    #[arg(long)]
    claims_limit: Option<usize>,
}

#[derive(Args)]
struct ScenarioArgs {
    /// Period: last30days, last90days, lastyear or ytd
    #[arg(long, default_value = "last30days", value_parser = parse_period)]
    period: ScenarioPeriod,
    /// Scenario file (JSON, or TOML by extension)
    #[arg(long)]
    scenario: Option<PathBuf>,
    /// Scenario name when no file is given
    #[arg(long, default_value = "Scenario")]
    name: String,
    /// New MBT for a procedure description, e.g. "Consultation=150" (repeatable)
    #[arg(long = "set", value_parser = parse_adjustment)]
    adjustments: Vec<(String, f64)>,
    /// Show only the baseline per procedure description
    #[arg(long)]
    baseline: bool,
}

#[derive(Args)]
struct RecentArgs {
    /// Number of patients (defaults to the configured limit)
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(Args)]
struct ConfigArgs {
    /// Write the effective configuration to the default config path
    #[arg(long)]
    init: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum FormatOpt {
    Json,
    Jsonl,
    Csv,
}

impl From<FormatOpt> for ExportFormat {
    fn from(opt: FormatOpt) -> Self {
        match opt {
            FormatOpt::Json => ExportFormat::Json,
            FormatOpt::Jsonl => ExportFormat::JsonLines,
            FormatOpt::Csv => ExportFormat::Csv,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.common.verbose);

    if let Err(err) = run(cli) {
        match err.downcast_ref::<PracticeError>() {
            Some(practice_err) => eprintln!("Error: {}", practice_err.user_message()),
            None => eprintln!("Error: {:#}", err),
        }
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.format_timestamp(None).init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli.common)?;
    set_global_config(config.clone());
    let as_of = resolve_as_of(cli.common.as_of.as_deref())?;
    let output = &cli.common.output;

    match cli.command {
        Commands::Stats(args) => cmd_stats(args, &config, output),
        Commands::Providers(args) => cmd_providers(args, &config, as_of, output),
        Commands::Provider(args) => cmd_provider(args, &config, as_of, output),
        Commands::Financial(args) => cmd_financial(args, &config, as_of, output),
        Commands::Scenario(args) => cmd_scenario(args, &config, as_of, output),
        Commands::Recent(args) => cmd_recent(args, &config, as_of, output),
        Commands::Config(args) => cmd_config(args, &config),
    }
}

fn load_config(common: &CommonArgs) -> anyhow::Result<PracticeConfig> {
    let mut config = match &common.config {
        Some(path) => PracticeConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PracticeConfig::load(),
    };
    if let Some(dir) = &common.data_dir {
        config.data_dir = Some(dir.clone());
    }
    Ok(config)
}

fn parse_cli_date(value: &str) -> practice_analytics::Result<NaiveDate> {
    parse_date(value).ok_or_else(|| PracticeError::date_parse_with_format(value, "YYYY-MM-DD"))
}

fn resolve_as_of(value: Option<&str>) -> anyhow::Result<NaiveDate> {
    match value {
        Some(value) => Ok(parse_cli_date(value)?),
        None => Ok(Local::now().date_naive()),
    }
}

fn resolve_window(args: &WindowArgs, config: &PracticeConfig) -> anyhow::Result<DateWindow> {
    match (&args.start, &args.end) {
        (Some(start), Some(end)) => {
            let (start, end) = (parse_cli_date(start)?, parse_cli_date(end)?);
            if start > end {
                bail!("Window start {} is after its end {}", start, end);
            }
            Ok(DateWindow::between(start, end))
        }
        _ => Ok(DateWindow::TrailingDays(args.days.unwrap_or(config.default_window_days))),
    }
}

fn parse_delimiter(value: &str) -> std::result::Result<u8, String> {
    match value.as_bytes() {
        [byte] if byte.is_ascii() => Ok(*byte),
        _ => Err(format!("delimiter must be a single ASCII character, got '{}'", value)),
    }
}

fn parse_granularity(value: &str) -> std::result::Result<Granularity, String> {
    Granularity::from_name(value).ok_or_else(|| format!("unknown granularity '{}', expected month or week", value))
}

fn parse_period(value: &str) -> std::result::Result<ScenarioPeriod, String> {
    ScenarioPeriod::from_name(value)
        .ok_or_else(|| format!("unknown period '{}', expected last30days, last90days, lastyear or ytd", value))
}

fn parse_adjustment(value: &str) -> std::result::Result<(String, f64), String> {
    let (description, mbt) = value
        .rsplit_once('=')
        .ok_or_else(|| format!("expected DESCRIPTION=MBT, got '{}'", value))?;
    let mbt: f64 = mbt.trim().parse().map_err(|_| format!("'{}' is not a number", mbt.trim()))?;
    if !mbt.is_finite() || mbt < 0.0 {
        return Err(format!("MBT must be a non-negative number, got {}", mbt));
    }
    Ok((description.trim().to_string(), mbt))
}

fn load_dataset(config: &PracticeConfig) -> anyhow::Result<PracticeDataset> {
    if config.data_dir.is_none() {
        bail!("No data directory given; pass --data-dir or set PRACTICE_DATA_DIR");
    }
    let dataset = PracticeDatasetBuilder::from_global_config().build()?;
    if dataset.status() == DatasetStatus::Empty {
        log::warn!("No practice data could be loaded; views will be empty");
    }
    Ok(dataset)
}

fn read_scenario(path: &Path) -> anyhow::Result<Scenario> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario {}", path.display()))?;
    let scenario: Scenario = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&contents)
            .with_context(|| format!("Invalid scenario file {}", path.display()))?,
        _ => serde_json::from_str(&contents)
            .with_context(|| format!("Invalid scenario file {}", path.display()))?,
    };
    Ok(scenario)
}

fn emit<T: Serialize>(view: &T, output: &OutputArgs) -> anyhow::Result<()> {
    let value = to_value(view)?;
    let value = match &output.series {
        Some(field) => select_field(&value, field)?.clone(),
        None => value,
    };

    let exporter: Box<dyn ViewExporter> = match output.format {
        FormatOpt::Csv => Box::new(
            CsvExporter::new()
                .with_delimiter(output.delimiter)
                .with_headers(!output.no_header),
        ),
        format => exporter_for(format.into(), !output.compact),
    };
    match &output.output {
        Some(path) => {
            exporter.export(&value, path)?;
            eprintln!("Wrote {}", path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            exporter.write_value(&value, &mut lock)?;
        }
    }
    Ok(())
}

fn cmd_stats(args: StatsArgs, config: &PracticeConfig, output: &OutputArgs) -> anyhow::Result<()> {
    let dataset = load_dataset(config)?;
    let stats = dataset.statistics();
    if args.summary {
        stats.print_summary();
        Ok(())
    } else {
        emit(&stats, output)
    }
}

fn cmd_providers(args: ProvidersArgs, config: &PracticeConfig, as_of: NaiveDate, output: &OutputArgs) -> anyhow::Result<()> {
    let dataset = load_dataset(config)?;
    let window = resolve_window(&args.window, config)?;
    let summaries = dataset.analytics(as_of).provider_summaries(window, &args.location);
    emit(&summaries, output)
}

fn cmd_provider(args: ProviderArgs, config: &PracticeConfig, as_of: NaiveDate, output: &OutputArgs) -> anyhow::Result<()> {
    let dataset = load_dataset(config)?;
    let provider = ProviderId::from(args.provider.as_str());
    if dataset.doctor(&provider).is_none() {
        log::warn!("Provider {} is not in doctors.csv", provider);
    }

    let peers = if args.peers.is_empty() {
        PeerSelection::AllOthers
    } else {
        PeerSelection::Explicit(args.peers.iter().map(|id| ProviderId::from(id.trim())).collect())
    };

    let request = ProviderAnalysisRequest::new(provider)
        .peers(peers)
        .window(resolve_window(&args.window, config)?)
        .location(args.location)
        .granularity(args.granularity);

    emit(&dataset.analytics(as_of).provider_analysis(&request), output)
}

fn cmd_financial(args: FinancialArgs, config: &PracticeConfig, as_of: NaiveDate, output: &OutputArgs) -> anyhow::Result<()> {
    let dataset = load_dataset(config)?;
    let window = resolve_window(&args.window, config)?;
    let limit = args.claims_limit.unwrap_or(config.outstanding_claims_limit);
    emit(&dataset.analytics(as_of).financial(window, limit), output)
}

fn cmd_scenario(args: ScenarioArgs, config: &PracticeConfig, as_of: NaiveDate, output: &OutputArgs) -> anyhow::Result<()> {
    let dataset = load_dataset(config)?;
    let analytics = dataset.analytics(as_of);

    if args.baseline {
        return emit(&analytics.scenario_baseline(args.period), output);
    }

    let mut scenario = match &args.scenario {
        Some(path) => read_scenario(path)?,
        None => Scenario::new(args.name),
    };
    for (description, mbt) in args.adjustments {
        scenario = scenario.with_mbt(description, mbt);
    }
    if scenario.adjustments.is_empty() {
        log::info!("Scenario '{}' has no adjustments; scenario revenue equals the baseline", scenario.name);
    }

    emit(&analytics.model_scenario(args.period, &scenario), output)
}

fn cmd_recent(args: RecentArgs, config: &PracticeConfig, as_of: NaiveDate, output: &OutputArgs) -> anyhow::Result<()> {
    let dataset = load_dataset(config)?;
    let limit = args.limit.unwrap_or(config.recent_patients_limit);
    emit(&dataset.analytics(as_of).recent_patients(limit), output)
}

fn cmd_config(args: ConfigArgs, config: &PracticeConfig) -> anyhow::Result<()> {
    if args.init {
        let path = PracticeConfig::default_config_path()
            .context("No configuration directory is available on this system")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        config.save(&path)?;
        println!("Configuration written to {}", path.display());
        return Ok(());
    }

    let rendered = toml::to_string_pretty(config).context("Failed to render configuration")?;
    print!("{}", rendered);
    Ok(())
}
