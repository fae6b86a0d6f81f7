use std::collections::{HashMap, HashSet};
use std::io::BufRead;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use serde::Serialize;

use flyweight::config::{self, Config};
use flyweight::{
    FlyweightFactory, KeyedRepository, Keyed, Retention, StringInterner, StrongKeyedRepository,
    WeakKeyedRepository, debug_log,
};

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "flyweight")]
#[command(version)]
#[command(disable_help_subcommand = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Intern strings and report how many were distinct
    Intern(InternArgs),
    /// Race lookups across threads and verify one instance per key
    Stress(StressArgs),
    /// Manage configuration
    Config(ConfigArgs),
}

#[derive(Args)]
struct InternArgs {
    /// Values to intern. Reads lines from stdin when omitted.
    values: Vec<String>,

    /// Output the report as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Args)]
struct StressArgs {
    /// Worker threads
    #[arg(long, default_value_t = 8)]
    threads: usize,

    /// Distinct keys to race on
    #[arg(long, default_value_t = 16)]
    keys: usize,

    /// Lookups per thread
    #[arg(long, default_value_t = 1000)]
    rounds: usize,

    /// Use weak retention and report how many slots a purge reclaims
    #[arg(long, default_value_t = false)]
    weak: bool,

    /// Output the report as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Args)]
struct ConfigArgs {
    #[command(subcommand)]
    subcommand: ConfigSubcommands,
}

#[derive(Subcommand)]
enum ConfigSubcommands {
    /// Create default configuration file
    Init {
        #[arg(long, default_value_t = false)]
        overwrite: bool,
    },
    /// Show current configuration
    Show,
    /// Set configuration value
    Set {
        /// Configuration key (initial-capacity, shard-amount, auto-purge-threshold, debug-log)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InternReport {
    values: usize,
    distinct: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StressReport {
    retention: &'static str,
    threads: usize,
    keys: usize,
    lookups: usize,
    distinct_instances: usize,
    violations: Vec<String>,
    reclaimed: Option<usize>,
}

/// Instance type raced by the stress command.
#[derive(Debug)]
struct Probe {
    key: String,
}

impl Keyed for Probe {
    type Key = String;

    fn key(&self) -> &String {
        &self.key
    }
}

impl FlyweightFactory for Probe {
    fn create(key: &String) -> Self {
        Probe { key: key.clone() }
    }
}

fn main() {
    let cli = Cli::parse();

    // Load config file to get defaults
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: ignoring config file: {e:#}");
        None
    });
    let config = config.unwrap_or_default();
    debug_log::init(config.logging.debug_log);

    match cli.command {
        Commands::Intern(args) => {
            if let Err(e) = run_intern(args) {
                eprintln!("Error interning values: {e:#}");
                std::process::exit(1);
            }
        }
        Commands::Stress(args) => match run_stress(args, &config) {
            Ok(true) => {}
            Ok(false) => std::process::exit(1),
            Err(e) => {
                eprintln!("Error running stress test: {e:#}");
                std::process::exit(1);
            }
        },
        Commands::Config(config_args) => handle_config_subcommand(config_args),
    }
}

fn run_intern(args: InternArgs) -> Result<()> {
    let values = if args.values.is_empty() {
        std::io::stdin()
            .lock()
            .lines()
            .collect::<std::io::Result<Vec<_>>>()
            .context("Failed to read values from stdin")?
    } else {
        args.values
    };

    let interner = StringInterner::new();
    for value in &values {
        interner.get(value);
    }

    let report = InternReport {
        values: values.len(),
        distinct: interner.len(),
    };

    if args.json {
        println!("{}", simd_json::to_string_pretty(&report)?);
    } else {
        println!("Interned {} value(s), {} distinct", report.values, report.distinct);
    }
    Ok(())
}

/// Returns `Ok(false)` when the canonical-instance invariant was violated.
fn run_stress(args: StressArgs, config: &Config) -> Result<bool> {
    anyhow::ensure!(args.threads > 0, "--threads must be at least 1");
    anyhow::ensure!(args.keys > 0, "--keys must be at least 1");

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(args.threads)
        .build()
        .context("Failed to build thread pool")?;

    let report = if args.weak {
        let repo: WeakKeyedRepository<String, Probe> =
            WeakKeyedRepository::with_config(&config.repository)?;
        let mut report = pool.install(|| race(&repo, &args));
        report.reclaimed = Some(repo.purge());
        report
    } else {
        let repo: StrongKeyedRepository<String, Probe> =
            StrongKeyedRepository::with_config(&config.repository)?;
        pool.install(|| race(&repo, &args))
    };

    if args.json {
        println!("{}", simd_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{} retention: {} lookup(s) over {} key(s) on {} thread(s), {} distinct instance(s)",
            report.retention, report.lookups, report.keys, report.threads, report.distinct_instances
        );
        if let Some(reclaimed) = report.reclaimed {
            println!("Purge reclaimed {reclaimed} slot(s)");
        }
        for key in &report.violations {
            eprintln!("Invariant violated: key {key} resolved to more than one instance");
        }
    }

    Ok(report.violations.is_empty())
}

fn race<R: Retention<Probe>>(
    repo: &KeyedRepository<String, Probe, R>,
    args: &StressArgs,
) -> StressReport {
    let lookups = args.threads * args.rounds;
    // Every instance is held until the end so weak entries cannot be
    // legitimately rebuilt mid-run.
    let observed: Vec<(String, Arc<Probe>)> = (0..lookups)
        .into_par_iter()
        .map(|i| {
            let key = format!("key-{}", i % args.keys);
            let instance = repo.get_or_create(key.clone());
            (key, instance)
        })
        .collect();

    let mut by_key: HashMap<&str, HashSet<usize>> = HashMap::new();
    for (key, instance) in &observed {
        by_key
            .entry(key.as_str())
            .or_default()
            .insert(Arc::as_ptr(instance) as usize);
    }

    let mut violations: Vec<String> = by_key
        .iter()
        .filter(|(_, pointers)| pointers.len() > 1)
        .map(|(key, _)| key.to_string())
        .collect();
    violations.sort();

    StressReport {
        retention: if R::COLLECTIBLE { "weak" } else { "strong" },
        threads: args.threads,
        keys: args.keys,
        lookups,
        distinct_instances: by_key.values().map(HashSet::len).sum(),
        violations,
        reclaimed: None,
    }
}

fn handle_config_subcommand(config_args: ConfigArgs) {
    match config_args.subcommand {
        ConfigSubcommands::Init { overwrite } => {
            if let Err(e) = config::create_default_config(overwrite) {
                eprintln!("Error creating config: {e}");
                std::process::exit(1);
            }
        }
        ConfigSubcommands::Show => {
            if let Err(e) = config::show_config() {
                eprintln!("Error showing config: {e}");
                std::process::exit(1);
            }
        }
        ConfigSubcommands::Set { key, value } => {
            if let Err(e) = config::set_config_value(&key, &value) {
                eprintln!("Error setting config: {e:#}");
                std::process::exit(1);
            }
        }
    }
}
