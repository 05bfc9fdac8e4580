//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bizintel_core::explorer;
use bizintel_core::export::{self, ReportRow};
use bizintel_core::generator::ChatCompletionsGenerator;
use bizintel_core::input::parse_batch_file;
use bizintel_core::jobs::BatchProgress;
use bizintel_core::orchestrator::Orchestrator;
use bizintel_core::pipeline::{AnalysisDeps, EntityAnalysis, analyze_entity};
use bizintel_core::store::ScopedStorage;
use bizintel_shared::{
    AppConfig, CampaignRecord, CustomerRecord, GenerationConfig, JobStatus, OfferingRecord,
    PlaybookRecord, init_config, load_config, load_config_from,
};
use bizintel_storage::Storage;
use chrono::Utc;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use serde::de::DeserializeOwned;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// bizintel: prospect analysis grounded in your own customer data.
#[derive(Parser)]
#[command(
    name = "bizintel",
    version,
    about = "Analyze prospects against your customer, product, campaign and sales-play data.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.bizintel/bizintel.toml.
    #[arg(long, global = true, env = "BIZINTEL_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Analyze a single company.
    Analyze {
        /// Company to analyze.
        #[arg(long)]
        company: String,

        /// What the analysis should focus on.
        #[arg(long)]
        directive: String,

        /// Identity recorded with the stored analysis.
        #[arg(long)]
        analyst: Option<String>,

        /// Print the full result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Analyze every row of a CSV/XLSX file with company_name and directive columns.
    Batch {
        /// Batch input file.
        file: PathBuf,

        /// Identity recorded with the stored analyses.
        #[arg(long)]
        analyst: Option<String>,

        /// Write the ranked report here (.xlsx or .csv).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Status polling interval in milliseconds.
        #[arg(long, default_value = "500")]
        poll_ms: u64,
    },

    /// Export every stored analysis as a ranked report.
    Export {
        /// Output path (.xlsx or .csv). Defaults to bi_analysis_<timestamp>.xlsx.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Import reference data from CSV files.
    Seed {
        /// Customers CSV.
        #[arg(long)]
        customers: Option<PathBuf>,

        /// Products CSV.
        #[arg(long)]
        products: Option<PathBuf>,

        /// Marketing campaigns CSV.
        #[arg(long)]
        campaigns: Option<PathBuf>,

        /// Sales plays CSV.
        #[arg(long)]
        plays: Option<PathBuf>,
    },

    /// Inspect the reference data.
    Explore {
        /// List customers with their latest prospect score.
        #[arg(long, conflicts_with = "table")]
        with_scores: bool,

        /// Print the rows of one table (customers, products, marketing_budget,
        /// sales_plays, analysis_complete) as JSON.
        #[arg(long)]
        table: Option<String>,

        /// Maximum number of rows printed with --table.
        #[arg(long, default_value_t = explorer::DEFAULT_ROW_LIMIT, requires = "table")]
        limit: usize,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "bizintel=info",
        1 => "bizintel=debug",
        _ => "bizintel=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Analyze {
            company,
            directive,
            analyst,
            json,
        } => cmd_analyze(config_path, &company, &directive, analyst, json).await,
        Command::Batch {
            file,
            analyst,
            out,
            poll_ms,
        } => cmd_batch(config_path, &file, analyst, out.as_deref(), poll_ms).await,
        Command::Export { out } => cmd_export(config_path, out).await,
        Command::Seed {
            customers,
            products,
            campaigns,
            plays,
        } => {
            let files = SeedFiles {
                customers,
                products,
                campaigns,
                plays,
            };
            cmd_seed(config_path, files).await
        }
        Command::Explore {
            with_scores,
            table,
            limit,
        } => cmd_explore(config_path, with_scores, table.as_deref(), limit).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path).await,
        },
    }
}

// ---------------------------------------------------------------------------
// Shared setup
// ---------------------------------------------------------------------------

fn load(config_path: Option<&Path>) -> Result<AppConfig> {
    Ok(match config_path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

async fn open_store(config: &AppConfig) -> Result<ScopedStorage> {
    let path = config.store.resolved_database_path()?;
    let storage = Storage::open(&path).await?;
    info!(path = %path.display(), namespace = %config.store.namespace, "record store opened");
    Ok(ScopedStorage::new(
        Arc::new(storage),
        config.store.namespace.clone(),
    ))
}

/// Open an existing database for reporting; writes are rejected.
async fn open_store_readonly(config: &AppConfig) -> Result<ScopedStorage> {
    let path = config.store.resolved_database_path()?;
    if !path.exists() {
        return Err(eyre!(
            "no database at {}; run `bizintel seed` or `bizintel analyze` first",
            path.display()
        ));
    }
    let storage = Storage::open_readonly(&path).await?;
    info!(
        path = %path.display(),
        namespace = %config.store.namespace,
        "record store opened read-only"
    );
    Ok(ScopedStorage::new(
        Arc::new(storage),
        config.store.namespace.clone(),
    ))
}

async fn analysis_deps(config: &AppConfig) -> Result<AnalysisDeps> {
    // Validate the key before touching the database
    let generation = GenerationConfig::from_app_config(config)?;
    let generator = ChatCompletionsGenerator::new(&generation)?;
    info!(model = %generator.model(), "narrative generator ready");
    let store = open_store(config).await?;
    Ok(AnalysisDeps::new(
        Arc::new(store),
        Arc::new(generator),
        &generation,
    ))
}

fn analyst_or_default(analyst: Option<String>, config: &AppConfig) -> String {
    analyst.unwrap_or_else(|| config.defaults.analyst.clone())
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_analyze(
    config_path: Option<&Path>,
    company: &str,
    directive: &str,
    analyst: Option<String>,
    json: bool,
) -> Result<()> {
    let config = load(config_path)?;
    let deps = analysis_deps(&config).await?;
    let analyst = analyst_or_default(analyst, &config);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")?
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner.set_message(format!("Analyzing {company}"));

    let result = analyze_entity(company, directive, &analyst, &deps).await;
    spinner.finish_and_clear();
    let analysis = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        print_analysis(&analysis);
    }
    Ok(())
}

fn print_analysis(analysis: &EntityAnalysis) {
    let record = &analysis.record;
    let ctx = &analysis.context;

    println!();
    println!("  Company:   {}", analysis.entity);
    match &ctx.customer_match {
        Some(name) => println!("  Customer:  existing ({name})"),
        None => println!("  Customer:  new prospect"),
    }
    println!(
        "  Prospect:  {} ({})",
        record.prospect_level, record.prospect_score
    );
    println!("  Industry:  {}", record.industry);
    println!("  Location:  {}", record.location);
    println!("  Employees: {}", record.employees);
    println!("  Revenue:   {}", record.revenue);
    println!("  Auditor:   {}", record.auditor_status);
    println!(
        "  Context:   {} offerings, {} campaigns, {} sales plays",
        ctx.offerings_found, ctx.campaigns_found, ctx.playbooks_found
    );
    println!();
    println!("{}", analysis.narrative);
}

/// Progress bar driven by the batch worker.
struct BarProgress {
    bar: ProgressBar,
}

impl BatchProgress for BarProgress {
    fn entity_started(&self, index: usize, total: usize, company: &str) {
        self.bar
            .set_message(format!("[{}/{total}] {company}", index + 1));
    }

    fn entity_finished(&self, _index: usize, _total: usize, company: &str, succeeded: bool) {
        if !succeeded {
            self.bar.println(format!("  skipped: {company}"));
        }
    }
}

async fn cmd_batch(
    config_path: Option<&Path>,
    file: &Path,
    analyst: Option<String>,
    out: Option<&Path>,
    poll_ms: u64,
) -> Result<()> {
    let config = load(config_path)?;
    let entries = parse_batch_file(file)?;
    let deps = analysis_deps(&config).await?;
    let analyst = analyst_or_default(analyst, &config);

    let bar = ProgressBar::new(entries.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );
    bar.enable_steady_tick(Duration::from_millis(120));

    let orchestrator = Orchestrator::new(deps)
        .with_retention(config.jobs.retention())
        .with_progress(Arc::new(BarProgress { bar: bar.clone() }));
    let handle = orchestrator.submit(entries, &analyst).await?;
    let id = handle.id();
    info!(job = %id, total = handle.total(), file = %file.display(), "batch submitted");

    let job = loop {
        let job = orchestrator.status(id).await?;
        bar.set_position(job.completed as u64);
        if job.status.is_finished() {
            break job;
        }
        tokio::time::sleep(Duration::from_millis(poll_ms)).await;
    };
    bar.finish_and_clear();
    handle.wait().await?;

    if job.status == JobStatus::Failed {
        return Err(eyre!(
            "batch job {id} failed: {}",
            job.error.as_deref().unwrap_or("unknown error")
        ));
    }

    println!();
    println!(
        "  Job {id}: {}/{} analyzed ({:.0}%)",
        job.completed,
        job.total,
        job.progress_percent()
    );
    let rows = export::ranked_rows(&job.results);
    print_rows(&rows);

    if let Some(path) = out {
        write_report(path, &rows)?;
        println!("  Report written to {}", path.display());
    }
    Ok(())
}

fn print_rows(rows: &[ReportRow]) {
    println!();
    println!(
        "  {:>4}  {:<32} {:<8} {:>5}  {}",
        "Rank", "Company", "Level", "Score", "Auditor Status"
    );
    for row in rows {
        println!(
            "  {:>4}  {:<32} {:<8} {:>5}  {}",
            row.rank,
            truncate(&row.company, 32),
            truncate(&row.prospect_level, 8),
            truncate(&row.score, 5),
            row.auditor_status
        );
    }
    println!();
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn write_report(path: &Path, rows: &[ReportRow]) -> Result<()> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));

    if is_csv {
        let file = std::fs::File::create(path)
            .map_err(|e| eyre!("cannot create {}: {e}", path.display()))?;
        export::write_csv(rows, file)?;
    } else {
        let bytes = export::write_xlsx(rows)?;
        std::fs::write(path, bytes).map_err(|e| eyre!("cannot write {}: {e}", path.display()))?;
    }
    Ok(())
}

async fn cmd_export(config_path: Option<&Path>, out: Option<PathBuf>) -> Result<()> {
    let config = load(config_path)?;
    let store = open_store_readonly(&config).await?;

    let analyses = store.storage().list_analyses(store.namespace()).await?;
    if analyses.is_empty() {
        println!("No analyses stored in namespace '{}'.", store.namespace());
        return Ok(());
    }

    let rows = export::rows_from_analyses(&analyses);
    let path = out.unwrap_or_else(|| PathBuf::from(export::export_file_name(Utc::now())));
    write_report(&path, &rows)?;
    println!("Exported {} analyses to {}", rows.len(), path.display());
    Ok(())
}

struct SeedFiles {
    customers: Option<PathBuf>,
    products: Option<PathBuf>,
    campaigns: Option<PathBuf>,
    plays: Option<PathBuf>,
}

fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut rdr = csv::Reader::from_path(path)
        .map_err(|e| eyre!("cannot open {}: {e}", path.display()))?;
    rdr.deserialize()
        .collect::<std::result::Result<Vec<T>, _>>()
        .map_err(|e| eyre!("{}: {e}", path.display()))
}

async fn cmd_seed(config_path: Option<&Path>, files: SeedFiles) -> Result<()> {
    let config = load(config_path)?;
    let store = open_store(&config).await?;
    let (storage, ns) = (store.storage(), store.namespace());

    if let Some(path) = &files.customers {
        let records: Vec<CustomerRecord> = read_csv(path)?;
        for record in &records {
            storage.insert_customer(ns, record).await?;
        }
        println!("  customers:        {}", records.len());
    }
    if let Some(path) = &files.products {
        let records: Vec<OfferingRecord> = read_csv(path)?;
        for record in &records {
            storage.insert_product(ns, record).await?;
        }
        println!("  products:         {}", records.len());
    }
    if let Some(path) = &files.campaigns {
        let records: Vec<CampaignRecord> = read_csv(path)?;
        for record in &records {
            storage.insert_campaign(ns, record).await?;
        }
        println!("  marketing_budget: {}", records.len());
    }
    if let Some(path) = &files.plays {
        let records: Vec<PlaybookRecord> = read_csv(path)?;
        for record in &records {
            storage.insert_sales_play(ns, record).await?;
        }
        println!("  sales_plays:      {}", records.len());
    }

    info!(namespace = %ns, "reference data seeded");
    Ok(())
}

async fn cmd_explore(
    config_path: Option<&Path>,
    with_scores: bool,
    table: Option<&str>,
    limit: usize,
) -> Result<()> {
    let config = load(config_path)?;
    let store = open_store_readonly(&config).await?;

    if let Some(name) = table {
        let collection = explorer::Collection::from_name(name).ok_or_else(|| {
            let known: Vec<&str> = explorer::Collection::ALL.iter().map(|c| c.name()).collect();
            eyre!("unknown table '{name}' (expected one of: {})", known.join(", "))
        })?;
        let rows = explorer::list_rows(&store, collection, limit).await?;
        info!(table = collection.name(), rows = rows.len(), limit, "rows listed");
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if with_scores {
        let customers = explorer::customers_with_scores(&store).await?;
        println!();
        for scored in &customers {
            let score = scored
                .prospect_score
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".into());
            println!(
                "  {:<32} {:<20} {:>5}",
                truncate(&scored.customer.company_name, 32),
                truncate(scored.customer.industry.as_deref().unwrap_or("-"), 20),
                score
            );
        }
        println!();
        return Ok(());
    }

    println!();
    println!("  Namespace: {}", store.namespace());
    for count in explorer::collection_counts(&store).await? {
        println!("  {:<20} {:>6}", count.name, count.rows);
    }
    println!();
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = load(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
