mod config;
use clap::{Parser, Subcommand};
use config::Config;
use hodgepodge_core::{
    ClusterStore, HodgeError, KvStoreBuilder, Result, SpecUpdateMode, StolonctlUpdater,
    StoreLayout, UpdateSpecOperation, UpdateSpecOperationRequest, resolve_superuser_connection,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "hodgepodge-ctl")]
#[command(about = "Inspect and update sharded stolon cluster metadata")]
struct Cli {
    /// Path to configuration file
    #[arg(long = "conf", default_value = "hodgepodge.yaml")]
    conf: String,

    /// Override cluster_name from config
    #[arg(long)]
    cluster_name: Option<String>,

    /// Override store endpoints from config, comma separated
    #[arg(long)]
    store_endpoints: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print global cluster data
    Clusterdata,
    /// Print the replication group directory
    Repgroups,
    /// Print current masters of all replication groups
    Masters,
    /// Push a new stolon spec to every replication group and record it
    UpdateSpec {
        /// Merge into the current spec instead of replacing it
        #[arg(long)]
        patch: bool,

        /// Spec file, or '-' for stdin
        #[arg(default_value = "-")]
        file: String,
    },
    /// Print the superuser connection string of a replication group's master
    Connstr {
        /// Replication group id
        rgid: i32,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hodgepodge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let cfg = match load_config(&cli) {
        Ok(cfg) => cfg,
        Err(error) => {
            tracing::error!("Failed to load config: {}", error);
            std::process::exit(1);
        }
    };

    let store = match open_store(&cfg).await {
        Ok(store) => store,
        Err(error) => {
            tracing::error!("Failed to open store: {}", error);
            std::process::exit(1);
        }
    };

    let outcome = run(&cfg, &store, cli.command).await;
    if let Err(error) = store.close().await {
        tracing::warn!("Failed to close store: {}", error);
    }

    if let Err(error) = outcome {
        tracing::error!("{}", error);
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut cfg = Config::from_file(&cli.conf)?;

    if let Some(name) = cli.cluster_name.as_deref() {
        tracing::info!("Using cluster name override '{}' via CLI", name);
        cfg.cluster_name = name.to_string();
    }
    if let Some(endpoints) = cli.store_endpoints.as_deref() {
        cfg.store.endpoints = endpoints
            .split(',')
            .map(|endpoint| endpoint.trim().to_string())
            .filter(|endpoint| !endpoint.is_empty())
            .collect();
    }

    cfg.validate()?;
    Ok(cfg)
}

async fn open_store(cfg: &Config) -> Result<Arc<ClusterStore>> {
    let kv = KvStoreBuilder::new()
        .backend(cfg.store.backend.as_str())
        .etcd_endpoints(cfg.store.endpoints.clone())
        .build()
        .await?;
    let layout = StoreLayout::new(&cfg.store.prefix, &cfg.cluster_name)?;
    Ok(Arc::new(ClusterStore::new(kv, layout)))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn read_spec(file: &str) -> Result<serde_json::Value> {
    let raw = if file == "-" {
        let mut raw = String::new();
        tokio::io::stdin().read_to_string(&mut raw).await?;
        raw
    } else {
        tokio::fs::read_to_string(file).await?
    };

    serde_json::from_str(&raw).map_err(|e| HodgeError::decode(format!("spec from {}", file), e))
}

async fn run(cfg: &Config, store: &Arc<ClusterStore>, command: Commands) -> Result<()> {
    let not_initialized = || HodgeError::ClusterNotInitialized {
        cluster: cfg.cluster_name.clone(),
    };

    match command {
        Commands::Clusterdata => {
            let cldata = store.get_cluster_data().await?.ok_or_else(not_initialized)?;
            print_json(&cldata.value)
        }
        Commands::Repgroups => {
            let rgs = store
                .get_rep_groups()
                .await?
                .map(|rgs| rgs.value)
                .unwrap_or_default();
            print_json(&rgs)
        }
        Commands::Masters => {
            let masters = store
                .get_masters()
                .await?
                .map(|masters| masters.value)
                .unwrap_or_default();
            print_json(&masters)
        }
        Commands::UpdateSpec { patch, file } => {
            let spec = read_spec(&file).await?;
            let mode = if patch {
                SpecUpdateMode::Patch
            } else {
                SpecUpdateMode::Replace
            };

            let updater = Arc::new(StolonctlUpdater::new(&cfg.stolonctl.path));
            let result = UpdateSpecOperation::new(store.clone(), updater)
                .with_max_conflict_retries(cfg.spec_update.max_conflict_retries)
                .run(UpdateSpecOperationRequest { spec, mode })
                .await?;

            tracing::info!(
                "updated {} replication groups: {:?}",
                result.updated_groups.len(),
                result.updated_groups
            );
            print_json(&result.spec)
        }
        Commands::Connstr { rgid } => {
            let cldata = store.get_cluster_data().await?.ok_or_else(not_initialized)?;
            let rgs = store
                .get_rep_groups()
                .await?
                .map(|rgs| rgs.value)
                .unwrap_or_default();
            let rg = rgs.get(&rgid).ok_or_else(|| {
                HodgeError::Config(format!("unknown replication group {}", rgid))
            })?;

            let params = resolve_superuser_connection(&**store, rgid, rg, &cldata.value).await?;
            println!("{}", params.to_connstr());
            Ok(())
        }
    }
}
