//! FactorLab CLI — screen a market by composite factor score.
//!
//! Commands:
//! - `rank` — momentum, technical and fundamental scores combined into one ranking
//! - `momentum` — the momentum-only screen
//! - `markets` — list market presets and their default universes
//! - `cache status` — report what the Parquet price cache holds

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use factorlab_core::config::CacheConfig;
use factorlab_core::data::{FetchProgress, ParquetCache, SilentProgress, Sources, StdoutProgress};
use factorlab_core::domain::{Market, Period};
use factorlab_core::scoring::{momentum, rank_map};
use factorlab_core::{screen_with_progress, ProviderKind, ScreenConfig};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "factorlab",
    about = "FactorLab CLI — multi-factor equity screening"
)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank tickers by weighted composite score.
    Rank {
        #[command(flatten)]
        screen: ScreenArgs,

        /// Composite weight for momentum.
        #[arg(long)]
        momentum_weight: Option<f64>,

        /// Composite weight for technical indicators.
        #[arg(long)]
        technical_weight: Option<f64>,

        /// Composite weight for fundamentals.
        #[arg(long)]
        fundamental_weight: Option<f64>,

        /// Rescale the weights to sum to 1 when they are off by more than 0.01.
        #[arg(long, default_value_t = false)]
        normalize_weights: bool,

        /// Skip fundamentals; every ticker scores neutral on that factor.
        #[arg(long, default_value_t = false)]
        no_fundamentals: bool,

        /// Read fundamentals from a CSV with a `ticker` column.
        #[arg(long)]
        fundamentals_csv: Option<PathBuf>,

        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,

        /// Write the report here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Rank tickers by price momentum alone.
    Momentum {
        #[command(flatten)]
        screen: ScreenArgs,
    },
    /// List market presets.
    Markets,
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report cached date ranges and bar counts.
    Status {
        /// Tickers to report. Defaults to everything in the cache.
        tickers: Vec<String>,

        /// Cache directory.
        #[arg(long, default_value = ".factorlab/cache")]
        cache_dir: PathBuf,

        /// Print JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

/// Universe, data source and window flags shared by `rank` and `momentum`.
#[derive(Args)]
struct ScreenArgs {
    /// TOML config file; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Market preset: UK or MY.
    #[arg(long)]
    market: Option<Market>,

    /// Explicit tickers (comma or space separated); replaces the market list.
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    tickers: Vec<String>,

    /// Price source: yahoo, alpha-vantage, csv or synthetic.
    #[arg(long)]
    provider: Option<ProviderKind>,

    /// Directory of <TICKER>.csv files. Implies --provider csv.
    #[arg(long)]
    csv_dir: Option<PathBuf>,

    /// Seed for the synthetic provider.
    #[arg(long)]
    seed: Option<u64>,

    /// History period: 1mo, 3mo, 6mo, 1y, 2y, 5y, 10y, ytd, max.
    #[arg(long)]
    period: Option<Period>,

    /// Momentum lookback in trading days.
    #[arg(long)]
    window: Option<usize>,

    /// Number of tickers to keep. Negative values keep none.
    #[arg(long, allow_hyphen_values = true)]
    top_n: Option<i64>,

    /// Parquet price cache directory.
    #[arg(long)]
    cache_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Rank {
            screen,
            momentum_weight,
            technical_weight,
            fundamental_weight,
            normalize_weights,
            no_fundamentals,
            fundamentals_csv,
            format,
            output,
        } => {
            let mut config = screen.to_config()?;
            if let Some(w) = momentum_weight {
                config.weights.momentum = w;
            }
            if let Some(w) = technical_weight {
                config.weights.technical = w;
            }
            if let Some(w) = fundamental_weight {
                config.weights.fundamental = w;
            }
            if normalize_weights {
                config.weights.normalize = true;
            }
            if no_fundamentals && fundamentals_csv.is_some() {
                bail!("--no-fundamentals and --fundamentals-csv are mutually exclusive");
            }
            if no_fundamentals {
                config.provider.fundamentals = false;
            }
            if fundamentals_csv.is_some() {
                config.provider.fundamentals_csv = fundamentals_csv;
            }
            run_rank(&config, format, output.as_deref())
        }
        Commands::Momentum { screen } => run_momentum(&screen.to_config()?),
        Commands::Markets => {
            run_markets();
            Ok(())
        }
        Commands::Cache { action } => match action {
            CacheAction::Status {
                tickers,
                cache_dir,
                json,
            } => run_cache_status(&cache_dir, tickers, json),
        },
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

impl ScreenArgs {
    fn to_config(&self) -> Result<ScreenConfig> {
        let mut config = match &self.config {
            Some(path) => ScreenConfig::from_file(path)?,
            None => ScreenConfig::default(),
        };

        if let Some(market) = self.market {
            config.screen.market = market;
        }
        if !self.tickers.is_empty() {
            config.screen.tickers = self.tickers.clone();
        }
        if let Some(dir) = &self.csv_dir {
            if matches!(self.provider, Some(kind) if kind != ProviderKind::Csv) {
                bail!("--csv-dir only applies to the csv provider");
            }
            config.provider.kind = ProviderKind::Csv;
            config.provider.dir = Some(dir.clone());
        }
        if let Some(kind) = self.provider {
            config.provider.kind = kind;
        }
        if let Some(seed) = self.seed {
            config.provider.seed = seed;
        }
        if let Some(period) = self.period {
            config.screen.period = period;
        }
        if let Some(window) = self.window {
            config.screen.momentum_window = window;
        }
        if let Some(n) = self.top_n {
            config.screen.top_n = usize::try_from(n).unwrap_or(0);
        }
        if let Some(dir) = &self.cache_dir {
            config.cache = Some(CacheConfig { dir: dir.clone() });
        }

        config.validate()?;
        debug!(
            provider = %config.provider.kind,
            market = %config.screen.market,
            period = %config.screen.period,
            window = config.screen.momentum_window,
            "resolved screen config"
        );
        Ok(config)
    }
}

fn run_rank(config: &ScreenConfig, format: OutputFormat, output: Option<&Path>) -> Result<()> {
    let sources = Sources::from_config(config)?;

    // Progress lines would corrupt machine-readable output on stdout.
    let progress: &dyn FetchProgress = if format == OutputFormat::Table && output.is_none() {
        &StdoutProgress
    } else {
        &SilentProgress
    };
    let report = screen_with_progress(&*sources.prices, &*sources.fundamentals, config, progress)?;

    let rendered = match format {
        OutputFormat::Table => report.to_table(),
        OutputFormat::Json => report.to_json()?,
        OutputFormat::Csv => report.to_csv()?,
    };

    match output {
        Some(path) => {
            std::fs::write(path, rendered)?;
            println!(
                "Wrote {} ranked of {} scored tickers to {}",
                report.ranked.len(),
                report.scored_count(),
                path.display()
            );
        }
        None => {
            if format == OutputFormat::Table {
                println!();
            }
            print!("{rendered}");
        }
    }
    Ok(())
}

fn run_momentum(config: &ScreenConfig) -> Result<()> {
    let tickers = config.tickers()?;
    if tickers.is_empty() {
        bail!("no tickers to screen");
    }

    let sources = Sources::from_config(config)?;
    let batch = sources
        .prices
        .fetch_with_progress(&tickers, config.screen.period, &StdoutProgress);
    if batch.series.is_empty() {
        bail!("none of the {} requested tickers returned prices", tickers.len());
    }

    let window = config.screen.momentum_window;
    let scores = momentum(&batch.series, window);
    let ranked = rank_map(&scores, config.screen.top_n);

    println!();
    println!(
        "Top {} {} stocks to consider based on momentum:",
        config.screen.top_n, config.screen.market
    );
    for entry in &ranked {
        println!(
            "{}: {:.2}% momentum over last {window} days",
            entry.ticker,
            entry.score * 100.0
        );
    }
    Ok(())
}

fn run_markets() {
    println!(
        "{:<4} {:<24} {:<30} {:<8} {:>7}",
        "Code", "Exchange", "Index", "Currency", "Tickers"
    );
    println!("{}", "-".repeat(77));
    for market in Market::ALL {
        let info = market.info();
        println!(
            "{:<4} {:<24} {:<30} {:<8} {:>7}",
            info.code,
            info.name,
            info.index_name,
            format!("{} ({})", info.currency, info.currency_symbol),
            info.tickers.len()
        );
    }
}

fn run_cache_status(cache_dir: &Path, tickers: Vec<String>, json: bool) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }

    let cache = ParquetCache::new(cache_dir);
    let symbols = if tickers.is_empty() {
        cache.cached_symbols()
    } else {
        factorlab_core::data::dedup_tickers(&tickers)
    };
    let rows = cache.status(&symbols);

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("Cache is empty: {}", cache_dir.display());
        return Ok(());
    }

    let cached = rows.iter().filter(|r| r.cached).count();
    println!("Cache: {}", cache_dir.display());
    println!("Symbols: {cached} cached of {}", rows.len());
    println!();
    println!("{:<14} {:<25} {:>8} {:<14}", "Symbol", "Date Range", "Bars", "Source");
    println!("{}", "-".repeat(64));
    for row in &rows {
        let range = match (row.start_date, row.end_date) {
            (Some(start), Some(end)) => format!("{start} to {end}"),
            _ => "(not cached)".to_string(),
        };
        println!(
            "{:<14} {:<25} {:>8} {:<14}",
            row.symbol,
            range,
            row.bar_count.map(|n| n.to_string()).unwrap_or_default(),
            row.source.as_deref().unwrap_or("")
        );
    }
    Ok(())
}
