//! # AlphaForge
//!
//! Command-line frontend for alpha-expression polishing.
//!
//! ## Commands
//! - `polish` - greedy per-dimension hill-climb from a seed expression
//! - `expand` - offline exhaustive expansion of a seed into candidates
//! - `simulate` - batch-evaluate a file of expressions through the platform

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use alphaforge_brain::{
    BrainClient, Credentials, EvalScheduler, PerformanceVector, SimulationSettings, SystemClock,
    DEFAULT_BASE_URL, DEFAULT_COMPETITION, DEFAULT_WINDOW,
};
use alphaforge_search::{
    complete_search, complete_search_bounded, complete_search_limited, dedup_candidates,
    Candidate, Dimension, GreedySearch, Metric, RankTables,
};

#[derive(Parser, Debug)]
#[command(name = "alphaforge")]
#[command(about = "AlphaForge - alpha expression rewriting and evaluation")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Polish a seed expression with the greedy hill-climb
    Polish {
        /// Seed expression, e.g. "rank(close)"
        #[arg(long)]
        alpha: String,

        #[command(flatten)]
        tables: TableArgs,

        #[command(flatten)]
        platform: PlatformArgs,

        #[command(flatten)]
        settings: SettingsArgs,

        /// Metric used to rank candidates
        #[arg(long, value_enum, default_value_t = MetricArg::Sharpe)]
        metric: MetricArg,

        /// Output CSV path (defaults to polish_<timestamp>.csv)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Expand a seed into the full candidate set without evaluating anything
    Expand {
        /// Seed expression, e.g. "rank(close)"
        #[arg(long)]
        alpha: String,

        #[command(flatten)]
        tables: TableArgs,

        /// Dimensions to expand along, in order
        #[arg(
            long,
            value_enum,
            value_delimiter = ',',
            default_value = "fields,operators"
        )]
        dimensions: Vec<DimensionArg>,

        /// Drop repeated expressions, keeping first occurrences
        #[arg(long, default_value_t = false)]
        dedup: bool,

        /// Candidate cap; 0 means unbounded. Defaults to the built-in cap
        /// of 500.
        #[arg(long)]
        limit: Option<usize>,

        /// Output CSV path; omit to print expressions to stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Evaluate a file of expressions (one per line) as a bounded batch
    Simulate {
        /// Input file, one expression per line; `#` lines are skipped
        #[arg(long)]
        input: PathBuf,

        #[command(flatten)]
        platform: PlatformArgs,

        #[command(flatten)]
        settings: SettingsArgs,

        /// Maximum simultaneously outstanding jobs
        #[arg(long, default_value_t = DEFAULT_WINDOW)]
        window: usize,

        /// Output CSV path (defaults to simulate_<timestamp>.csv)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
pub struct TableArgs {
    /// Field equivalence table CSV (id,group,rank)
    #[arg(long, default_value = "data/fields.csv")]
    pub fields_table: PathBuf,

    /// Operator equivalence table CSV (name,group,rank)
    #[arg(long, default_value = "data/operators.csv")]
    pub operators_table: PathBuf,
}

impl TableArgs {
    fn load(&self) -> anyhow::Result<RankTables> {
        RankTables::load(&self.fields_table, &self.operators_table).with_context(|| {
            format!(
                "loading rank tables from {} and {}",
                self.fields_table.display(),
                self.operators_table.display()
            )
        })
    }
}

#[derive(Args, Debug)]
pub struct PlatformArgs {
    /// JSON credential file {"username": ..., "password": ...}
    #[arg(long, default_value = "credential.json")]
    pub credentials: PathBuf,

    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Competition used for the score-delta probe
    #[arg(long, default_value = DEFAULT_COMPETITION)]
    pub competition: String,

    /// Skip the correlation and competition probes
    #[arg(long, default_value_t = false)]
    pub no_aux: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SettingsArgs {
    #[arg(long, default_value = "USA")]
    pub region: String,

    #[arg(long, default_value = "TOP3000")]
    pub universe: String,

    #[arg(long, default_value = "INDUSTRY")]
    pub neutralization: String,

    #[arg(long, default_value_t = 1)]
    pub delay: u32,

    #[arg(long, default_value_t = 0)]
    pub decay: u32,

    #[arg(long, default_value_t = 0.05)]
    pub truncation: f64,
}

impl SettingsArgs {
    fn to_settings(&self) -> SimulationSettings {
        SimulationSettings {
            region: self.region.clone(),
            universe: self.universe.clone(),
            neutralization: self.neutralization.clone(),
            delay: self.delay,
            decay: self.decay,
            truncation: self.truncation,
            ..SimulationSettings::default()
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum MetricArg {
    Sharpe,
    Fitness,
    Returns,
}

impl From<MetricArg> for Metric {
    fn from(arg: MetricArg) -> Self {
        match arg {
            MetricArg::Sharpe => Metric::Sharpe,
            MetricArg::Fitness => Metric::Fitness,
            MetricArg::Returns => Metric::Returns,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum DimensionArg {
    Fields,
    Operators,
    Parameter,
}

impl From<DimensionArg> for Dimension {
    fn from(arg: DimensionArg) -> Self {
        match arg {
            DimensionArg::Fields => Dimension::Fields,
            DimensionArg::Operators => Dimension::Operators,
            DimensionArg::Parameter => Dimension::Parameter,
        }
    }
}

/// Main entry point for the CLI.
pub fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Polish {
            alpha,
            tables,
            platform,
            settings,
            metric,
            out,
        } => run_polish(&alpha, &tables, &platform, &settings, metric, out),
        Commands::Expand {
            alpha,
            tables,
            dimensions,
            dedup,
            limit,
            out,
        } => run_expand(&alpha, &tables, &dimensions, dedup, limit, out),
        Commands::Simulate {
            input,
            platform,
            settings,
            window,
            out,
        } => run_simulate(&input, &platform, &settings, window, out),
    }
}

fn run_polish(
    alpha: &str,
    tables: &TableArgs,
    platform: &PlatformArgs,
    settings: &SettingsArgs,
    metric: MetricArg,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    // Canonicalize the seed up front so every rewrite compares apples to
    // apples and a malformed seed fails before any network traffic.
    let seed = alphaforge_expr::parse(alpha)
        .context("seed expression does not parse")?
        .render();
    let tables = tables.load()?;
    let mut scheduler = connect(platform, settings.to_settings())?;

    println!("Evaluating seed: {seed}");
    let seed_result = scheduler.evaluate(&seed);
    let outcome = GreedySearch::new(&tables, &mut scheduler)
        .with_metric(metric.into())
        .run(&seed, seed_result)?;

    println!("Best expression: {}", outcome.expression);
    if outcome.decay > 0 {
        println!("Adopted decay:   {}", outcome.decay);
    }
    if let Some(sharpe) = outcome.result.as_ref().and_then(|r| r.sharpe) {
        println!("Sharpe:          {sharpe:.4}");
    }

    let out = out.unwrap_or_else(|| stamped_path("polish"));
    write_results(&out, &[(outcome.expression, outcome.result)])?;
    println!("Results written: {}", out.display());
    Ok(())
}

fn run_expand(
    alpha: &str,
    tables: &TableArgs,
    dimensions: &[DimensionArg],
    dedup: bool,
    limit: Option<usize>,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let seed = alphaforge_expr::parse(alpha)
        .context("seed expression does not parse")?
        .render();
    let tables = tables.load()?;
    let dimensions: Vec<Dimension> = dimensions.iter().map(|&d| d.into()).collect();

    let mut candidates = match limit {
        None => complete_search_bounded(&seed, &dimensions, &tables)?,
        Some(0) => complete_search(&seed, &dimensions, &tables)?,
        Some(limit) => complete_search_limited(&seed, &dimensions, &tables, limit)?,
    };
    if dedup {
        candidates = dedup_candidates(candidates);
    }
    tracing::info!(count = candidates.len(), "expansion finished");

    match out {
        Some(path) => {
            write_candidates(&path, &candidates)?;
            println!("{} candidates written: {}", candidates.len(), path.display());
        }
        None => {
            for candidate in &candidates {
                println!("{}", candidate.expression);
            }
        }
    }
    Ok(())
}

fn run_simulate(
    input: &Path,
    platform: &PlatformArgs,
    settings: &SettingsArgs,
    window: usize,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let expressions = read_expressions(input)?;
    if expressions.is_empty() {
        anyhow::bail!("no expressions found in {}", input.display());
    }
    println!(
        "Evaluating {} expressions, window {}...",
        expressions.len(),
        window
    );

    let mut scheduler = connect(platform, settings.to_settings())?;
    let results = scheduler.evaluate_batch(expressions, window);

    let scored = results.iter().filter(|(_, r)| r.is_some()).count();
    println!("Scored {scored}/{} expressions", results.len());

    let out = out.unwrap_or_else(|| stamped_path("simulate"));
    write_results(&out, &results)?;
    println!("Results written: {}", out.display());
    Ok(())
}

fn connect(
    platform: &PlatformArgs,
    settings: SimulationSettings,
) -> anyhow::Result<EvalScheduler<BrainClient, SystemClock>> {
    let credentials = Credentials::load(&platform.credentials).with_context(|| {
        format!(
            "loading credentials from {}",
            platform.credentials.display()
        )
    })?;
    let client = BrainClient::with_base_url(credentials, &platform.base_url)?
        .with_competition(&platform.competition);
    client.authenticate().context("authentication failed")?;
    Ok(EvalScheduler::new(client, SystemClock, settings).with_aux(!platform.no_aux))
}

/// Parse one expression per line, skipping blanks and `#` comments.
fn read_expressions(path: &Path) -> anyhow::Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading expressions from {}", path.display()))?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

fn stamped_path(prefix: &str) -> PathBuf {
    PathBuf::from(format!(
        "{prefix}_{}.csv",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    ))
}

fn write_results(
    path: &Path,
    results: &[(String, Option<PerformanceVector>)],
) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for (expression, result) in results {
        let mut vector = result.clone().unwrap_or_default();
        vector.expression = Some(expression.clone());
        writer.serialize(&vector)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_candidates(path: &Path, candidates: &[Candidate]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(["expression", "dimension", "symbol", "depth"])?;
    for candidate in candidates {
        writer.write_record([
            candidate.expression.as_str(),
            dimension_name(candidate.dimension),
            candidate.symbol.as_str(),
            &candidate.depth.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn dimension_name(dimension: Dimension) -> &'static str {
    match dimension {
        Dimension::Fields => "fields",
        Dimension::Operators => "operators",
        Dimension::Parameter => "parameter",
    }
}
