use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use paperwatch_core::{ExitCode, PipelineConfig};
use paperwatch_science::dedup::{load_canonical_identities, load_local_identities};
use paperwatch_science::http::RateLimitedClient;
use paperwatch_science::pipeline::{RunOptions, RunReport, ScanReport};
use paperwatch_science::sync::sync_files;
use paperwatch_science::Pipeline;

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "paperwatch",
    about = "Keeps an awesome-list of research papers up to date",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format (for scripts and CI).
    /// Also enabled by setting PAPERWATCH_JSON=1.
    #[arg(long, global = true)]
    json: bool,

    /// Config file to use instead of the default location.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log per-paper decisions (same as RUST_LOG=debug).
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, deduplicate, classify and rewrite the listing.
    Run {
        /// Do everything except writing the listing.
        #[arg(long)]
        dry_run: bool,
        /// Listing to write instead of `listing.output_path`.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Fetch and deduplicate only; list new candidates by citations.
    Scan {
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Show how many papers the curated list and local listing already hold.
    Known {
        /// Local listing to read instead of `listing.output_path`.
        #[arg(long)]
        local: Option<PathBuf>,
    },

    /// Splice new listing entries into a checkout of the curated list.
    Sync {
        /// Path to the curated list's README.
        #[arg(long)]
        canonical: PathBuf,
        /// Generated listing to read entries from.
        #[arg(long)]
        listing: Option<PathBuf>,
    },

    /// Config management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show version information.
    Version,
}

// ─── Config Actions ──────────────────────────────────────────────────────────

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration.
    Show,
    /// Print the config file location.
    Path,
    /// Write a config file with default values.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

// ─── Main ────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let start = Instant::now();
    let cli = Cli::parse();

    let json_output = cli.json || std::env::var("PAPERWATCH_JSON").as_deref() == Ok("1");
    init_tracing(cli.verbose);

    let config_path = cli.config.clone().unwrap_or_else(PipelineConfig::config_path);
    let config = PipelineConfig::load_from(&config_path)?;

    match cli.command {
        // ── Run ────────────────────────────────────────────────────────────

        Commands::Run { dry_run, output } => {
            let pipeline = Pipeline::new(config)?;
            let options = RunOptions { dry_run, output };
            let report = block_on(pipeline.run(&options, Utc::now()))??;
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({"status":"ok","data":report,"meta":{"duration_ms":dur}}))?;
            } else {
                print_run_report(&report);
            }
        }

        // ── Scan ───────────────────────────────────────────────────────────

        Commands::Scan { limit } => {
            let pipeline = Pipeline::new(config)?;
            let mut report = block_on(pipeline.scan())?;
            let total = report.candidates.len();
            report.candidates.truncate(limit);
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": { "report": report, "total": total, "limit": limit },
                    "meta": { "duration_ms": dur }
                }))?;
            } else {
                print_scan_report(&report, total);
            }
        }

        // ── Known ──────────────────────────────────────────────────────────

        Commands::Known { local } => {
            let local_path = local.unwrap_or_else(|| config.listing.output_path.clone());
            let client = RateLimitedClient::new(
                "canonical",
                Duration::ZERO,
                config.sources.request_timeout(),
                &config.sources.user_agent,
            )?;
            let canonical =
                block_on(load_canonical_identities(&client, &config.listing.canonical_url))?;
            let local_set = load_local_identities(&local_path);
            let merged = canonical.clone().merged(local_set.clone());
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": {
                        "canonical": { "url": config.listing.canonical_url, "ids": canonical.ids.len(), "titles": canonical.titles.len() },
                        "local": { "path": local_path, "ids": local_set.ids.len(), "titles": local_set.titles.len() },
                        "merged": { "ids": merged.ids.len(), "titles": merged.titles.len() }
                    },
                    "meta": { "duration_ms": dur }
                }))?;
            } else {
                println!("{:<10} {:>6} {:>7}", "source", "ids", "titles");
                println!("{:<10} {:>6} {:>7}", "canonical", canonical.ids.len(), canonical.titles.len());
                println!("{:<10} {:>6} {:>7}", "local", local_set.ids.len(), local_set.titles.len());
                println!("{:<10} {:>6} {:>7}", "merged", merged.ids.len(), merged.titles.len());
            }
        }

        // ── Sync ───────────────────────────────────────────────────────────

        Commands::Sync { canonical, listing } => {
            if !canonical.exists() {
                eprintln!("Curated list not found: {}", canonical.display());
                std::process::exit(ExitCode::NotFound as i32);
            }
            let listing = listing.unwrap_or_else(|| config.listing.output_path.clone());
            let outcome = sync_files(&canonical, &listing)?;
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({"status":"ok","data":outcome,"meta":{"duration_ms":dur}}))?;
            } else if outcome.added == 0 {
                println!("No new papers to add.");
            } else {
                println!("Added {} papers to {}:", outcome.added, canonical.display());
                for (category, count) in &outcome.per_category {
                    println!("  {category}: {count}");
                }
            }
        }

        // ── Config ─────────────────────────────────────────────────────────

        Commands::Config { action } => {
            let dur = start.elapsed().as_millis();
            match action {
                ConfigAction::Show => {
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":config,"meta":{"duration_ms":dur}}))?;
                    } else {
                        print!("{}", toml::to_string_pretty(&config)?);
                    }
                }
                ConfigAction::Path => {
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":{"path":config_path,"exists":config_path.exists()}}))?;
                    } else {
                        println!("{}", config_path.display());
                    }
                }
                ConfigAction::Init { force } => {
                    if config_path.exists() && !force {
                        eprintln!(
                            "Config already exists at {} (use --force to overwrite)",
                            config_path.display()
                        );
                        std::process::exit(ExitCode::InvalidArgs as i32);
                    }
                    PipelineConfig::default().save_to(&config_path)?;
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":{"path":config_path}}))?;
                    } else {
                        println!("Wrote default config to {}", config_path.display());
                    }
                }
            }
        }

        // ── Version ────────────────────────────────────────────────────────

        Commands::Version => {
            let version = env!("CARGO_PKG_VERSION");
            if json_output {
                print_json(&serde_json::json!({"status":"ok","data":{"version":version}}))?;
            } else {
                println!("paperwatch v{version}");
            }
        }
    }

    Ok(())
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Runtime::new()?;
    Ok(runtime.block_on(future))
}

fn print_json(val: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}

fn print_run_report(report: &RunReport) {
    println!("Known papers:   {} ids, {} titles", report.known_ids, report.known_titles);
    println!(
        "Fetched:        {} (OpenAlex {}, arXiv {}/{}, Semantic Scholar {})",
        report.fetched.total,
        report.fetched.openalex,
        report.fetched.arxiv_admitted,
        report.fetched.arxiv_checked,
        report.fetched.semantic_scholar
    );
    println!("Duplicates:     {}", report.duplicates);
    println!("New papers:     {}", report.new_papers);

    if report.new_papers == 0 {
        println!("\nNo new papers to add!");
        return;
    }

    println!("\nSummary by category:");
    for c in &report.categories {
        println!("  {}: {} papers", c.label, c.count);
    }
    if report.retained_entries > 0 {
        println!("  (kept {} entries from earlier runs)", report.retained_entries);
    }

    if report.written {
        println!("\nListing written to {}", report.output.display());
    } else if report.dry_run {
        println!("\nDry run: {} not modified", report.output.display());
    }
}

fn print_scan_report(report: &ScanReport, total: usize) {
    println!(
        "{} new candidates ({} duplicates skipped, {} fetched)",
        total, report.duplicates, report.fetched.total
    );
    for paper in &report.candidates {
        println!(
            "{:>6}  {:<12}  {}",
            paper.citation_count,
            paper.id_str(),
            paper.title
        );
    }
    if total > report.candidates.len() {
        println!("... and {} more", total - report.candidates.len());
    }
}
