use chrono::Local;
use clap::Parser;
use std::path::PathBuf;
use watchdog_timer::{load_config, AppConfig, Watchdog};

/// Console driver for the watchdog timer: pets the dog on a fixed cadence,
/// then goes quiet and lets it expire.
#[derive(Parser, Debug)]
#[command(name = "watchdog-timer", version, about)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "watchdog.toml")]
    config: PathBuf,

    /// Watchdog interval in milliseconds (overrides config)
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Number of times to arm the watchdog (overrides config)
    #[arg(long)]
    pets: Option<u32>,

    /// Delay between arms in milliseconds (overrides config)
    #[arg(long)]
    pet_every_ms: Option<u64>,

    /// Time to wait after the last arm before stopping (overrides config)
    #[arg(long)]
    linger_ms: Option<u64>,

    /// Validate config and print resolved settings, don't run
    #[arg(long)]
    dry_run: bool,

    /// Print the final counters as JSON
    #[arg(long)]
    stats_json: bool,

    /// Extra logging (arm and supersede decisions)
    #[arg(short, long)]
    verbose: bool,

    /// Only warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn default_filter(cli: &Cli) -> &'static str {
    if cli.verbose {
        "watchdog_timer=debug"
    } else if cli.quiet {
        "watchdog_timer=warn"
    } else {
        "watchdog_timer=info"
    }
}

/// Merge CLI flags over the file configuration.
fn apply_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(ms) = cli.interval_ms {
        config.watchdog.interval_ms = ms;
    }
    if let Some(pets) = cli.pets {
        config.demo.pets = pets;
    }
    if let Some(ms) = cli.pet_every_ms {
        config.demo.pet_every_ms = ms;
    }
    if let Some(ms) = cli.linger_ms {
        config.demo.linger_ms = ms;
    }
}

fn now() -> String {
    Local::now().format("%H:%M:%S%.3f").to_string()
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter(&cli))),
        )
        .with_target(false)
        .with_thread_ids(false)
        .init();

    tracing::debug!(?cli, "parsed CLI arguments");

    let mut config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to load config");
            std::process::exit(1);
        }
    };
    apply_overrides(&mut config, &cli);
    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "invalid settings");
        std::process::exit(1);
    }

    if cli.dry_run {
        println!("Config file: {}", cli.config.display());
        println!("Interval:    {} ms", config.watchdog.interval_ms);
        println!("Pets:        {}", config.demo.pets);
        println!("Pet every:   {} ms", config.demo.pet_every_ms);
        println!("Linger:      {} ms", config.demo.linger_ms);
        println!("Dry run: config validated, not running.");
        return;
    }

    let dog = match Watchdog::from_config(&config.watchdog) {
        Ok(dog) => dog,
        Err(e) => {
            tracing::error!(error = %e, "failed to create watchdog");
            std::process::exit(1);
        }
    };
    dog.set_failure_hook(|failure| eprintln!("{failure}"));

    println!("Started at {}", now());

    for _ in 0..config.demo.pets {
        if let Err(e) = dog.arm(|| println!("Update now! Watchdog expired at {}", now())) {
            tracing::error!(error = %e, "failed to arm watchdog");
            std::process::exit(1);
        }
        tokio::time::sleep(config.demo.pet_every()).await;
    }

    tokio::time::sleep(config.demo.linger()).await;
    dog.stop();

    let stats = dog.stats();
    if cli.stats_json {
        match serde_json::to_string_pretty(&stats) {
            Ok(json) => println!("{json}"),
            Err(e) => tracing::error!(error = %e, "failed to serialize stats"),
        }
    } else {
        println!(
            "armed {} | fired {} | superseded {} | cancelled {} | failed {}",
            stats.armed, stats.fired, stats.superseded, stats.cancelled, stats.failed
        );
    }
}
