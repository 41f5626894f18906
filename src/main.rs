//! store-guard command line.
//!
//! ```text
//! store-guard check <path>             validate a config file
//! store-guard schedule [-c path]       print the backoff schedule
//! store-guard simulate [-c path] ...   run a guarded insert against injected faults
//! store-guard watch <path>             follow a config file until Ctrl-C
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};

use store_guard::config::{load_config, ConfigWatcher, GuardConfig, RetryConfig};
use store_guard::lifecycle::{signals, Shutdown};
use store_guard::observability::logging;
use store_guard::op_id;
use store_guard::resilience::backoff::{calculate_backoff, max_backoff};
use store_guard::resilience::{CallSite, RetryContext, RetryPolicy};
use store_guard::store::{
    Document, DocumentStore, FaultyStore, InMemoryStore, Namespace, StoreError, StoreIdentity,
};

#[derive(Parser)]
#[command(name = "store-guard")]
#[command(about = "Inspect and exercise the document-store retry policy", long_about = None)]
struct Cli {
    /// Config file (TOML). Built-in defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a config file and print the effective values
    Check {
        path: PathBuf,
    },
    /// Print the backoff delay for every retry count up to the ceiling
    Schedule,
    /// Run a guarded insert against a store that fails on cue
    Simulate {
        /// Transient failures to inject before the store recovers
        #[arg(short, long, default_value_t = 3)]
        transient: usize,

        /// Follow the transient failures with a duplicate-key failure
        #[arg(short, long)]
        permanent: bool,
    },
    /// Follow a config file and apply retry changes until interrupted
    Watch {
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GuardConfig::default(),
    };
    logging::init_logging(&config.observability);

    match cli.command {
        Commands::Check { path } => check(&path)?,
        Commands::Schedule => print_schedule(&config.retries),
        Commands::Simulate { transient, permanent } => {
            simulate(&config, transient, permanent).await?
        }
        Commands::Watch { path } => watch(&path).await?,
    }

    Ok(())
}

fn check(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(path)?;
    println!("{}: ok", path.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn print_schedule(retries: &RetryConfig) {
    println!("retry  delay");
    for retry_count in 1..=retries.max_retries {
        println!(
            "{:>5}  {} ms",
            retry_count,
            calculate_backoff(retry_count, retries).as_millis()
        );
    }
    println!(
        "ceiling {} retries, max delay {} ms",
        retries.max_retries,
        max_backoff(retries).as_millis()
    );
}

async fn simulate(
    config: &GuardConfig,
    transient: usize,
    permanent: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = FaultyStore::new(InMemoryStore::new().with_identity(StoreIdentity {
        library: Some("simulation".to_string()),
        nodes: vec!["localhost:27017".to_string()],
        host: Some("localhost".to_string()),
    }));
    store.inject_transient(transient);
    if permanent {
        store.inject(StoreError::DuplicateKey {
            namespace: "simulation.events".to_string(),
            key: "{ _id: \"event-1\" }".to_string(),
        });
    }

    let policy = RetryPolicy::new(config.retries.clone());
    let context = RetryContext::new();
    let namespace = Namespace::new("simulation", "events");
    let site = CallSite::new(op_id!("insert_event")).with_host(&store);

    let started = tokio::time::Instant::now();
    let result = policy
        .run_in(&context, &site, || {
            let mut doc = Document::new();
            doc.insert("_id".to_string(), "event-1".into());
            store.insert_one(&namespace, doc)
        })
        .await;
    let elapsed = started.elapsed();

    match &result {
        Ok(id) => println!("inserted {}", id),
        Err(e) => println!("failed: {}", e),
    }
    println!(
        "attempts {}, elapsed {} ms, faults left {}",
        store.calls(),
        elapsed.as_millis(),
        store.pending_faults()
    );
    result?;
    Ok(())
}

async fn watch(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(path)?;
    let policy = RetryPolicy::new(config.retries.clone());
    print_schedule(&policy.config());

    let shutdown = Arc::new(Shutdown::new());
    let (watcher, updates) = ConfigWatcher::new(path, config);
    let _watcher = watcher.run()?;

    let follower = policy.follow(updates, shutdown.subscribe());
    signals::trigger_on_ctrl_c(shutdown.clone());
    follower.await?;

    tracing::info!(max_retries = policy.config().max_retries, "Watch finished");
    Ok(())
}
