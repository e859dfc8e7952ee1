use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::{debug, info, warn};

use brokerscript::backend;
use brokerscript::config::{self as cfg, ConfigStore};
use brokerscript::executor::Runtime;

/// brokerscript CLI
#[derive(Debug, Parser)]
#[command(
    name = brokerscript::PKG_NAME,
    version = brokerscript::PKG_VERSION,
    about = "Replay declarative browser action lists stored in an INI file"
)]
struct Args {
    /// Path to the JSON run profile
    #[arg(short = 'p', long = "profile", default_value = "profile.json")]
    profile: PathBuf,

    /// INI store to use instead of the one named by the profile
    #[arg(long = "store")]
    store: Option<PathBuf>,

    /// Section holding the action lists (defaults to the profile's `actions_section`)
    #[arg(long = "section")]
    section: Option<String>,

    /// Action list keys to run, in order (defaults to the profile's `runs`)
    runs: Vec<String>,

    /// Enable dry-run mode (log backend calls instead of driving a UI)
    #[arg(long = "dry-run")]
    dry_run: bool,

    /// Parse, resolve and validate the lists, then exit without running them
    #[arg(long = "check")]
    check: bool,

    /// Set log level (e.g., trace, debug, info, warn, error). Overrides RUST_LOG.
    #[arg(long = "log-level")]
    log_level: Option<String>,

    /// Print the JSON Schema for the run profile and exit
    #[arg(long = "print-schema")]
    print_schema: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.log_level.as_deref() {
        Some(level) => brokerscript::init_tracing_with_level(
            brokerscript::parse_level(level).unwrap_or(tracing::Level::INFO),
        ),
        None => brokerscript::init_tracing(),
    }

    if args.print_schema {
        let schema = cfg::generate_schema();
        let json = serde_json::to_string_pretty(&schema)?;
        println!("{json}");
        return Ok(());
    }

    info!(
        version = brokerscript::PKG_VERSION,
        profile = %args.profile.display(),
        dry_run = args.dry_run,
        "Starting brokerscript"
    );

    let profile = cfg::load_from_path_async(&args.profile).await?;
    let store_path = args
        .store
        .clone()
        .unwrap_or_else(|| PathBuf::from(&profile.store));
    let store = ConfigStore::load(&store_path)?;
    debug!(target: "brokerscript", store = %store_path.display(), "Store loaded successfully");

    let section = args
        .section
        .clone()
        .unwrap_or_else(|| profile.actions_section.clone());
    if !store.has_section(&section) {
        bail!(
            "Store {} has no section [{section}]",
            store_path.display()
        );
    }
    let runs = if args.runs.is_empty() {
        profile.runs.clone()
    } else {
        args.runs.clone()
    };
    if runs.is_empty() {
        warn!("No action lists requested; name them on the command line or in the profile's `runs`");
        return Ok(());
    }

    let runtime = Runtime::new(store, profile.interpreter.clone());

    if args.check {
        for key in &runs {
            let actions = runtime.load(&section, key)?;
            info!(%key, actions = actions.len(), "Action list is valid");
        }
        return Ok(());
    }

    // Backends block; keep them off the async workers
    let backend_config = profile.backend.clone();
    let dry_run = args.dry_run;
    let task = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<(String, Vec<String>)>> {
        let mut backend =
            backend::open(&backend_config, dry_run).context("Failed to open backend")?;
        info!(backend = backend.name(), "Backend ready");
        runtime.run_all(&section, &runs, backend.as_mut())
    });

    tokio::select! {
        joined = task => {
            let results = joined.context("Interpreter thread panicked")??;
            for (key, texts) in results {
                debug!(%key, texts = texts.len(), "Printing collected texts");
                for text in texts {
                    println!("{text}");
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            // The blocking thread cannot be interrupted mid-call
            warn!("Received Ctrl+C, aborting");
            std::process::exit(130);
        }
    }

    info!("brokerscript exited");
    Ok(())
}
