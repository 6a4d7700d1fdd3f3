use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use mockd_config::{StoreCfg, load_or_default, to_service_config};
use mockd_core::{
    AlertLevel, Alerts, DetachedRuntime, EnvironmentsService, JsonFileStore, Memory,
    MutationReceipt, Store, Uuid,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(version, about = "Mockd - manage mock API environments and routes")]
struct Args {
    /// Path to config file (yaml/json/toml)
    #[arg(short, long, default_value = "./mockd.yaml")]
    config: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every environment with its routes
    List,
    /// Add an environment built from the default template
    AddEnvironment,
    /// Add a default route to an environment
    AddRoute { environment: usize },
    /// Remove an environment
    RemoveEnvironment { index: usize },
    /// Remove one route of an environment
    RemoveRoute { environment: usize, route: usize },
    /// Append a copy of an environment
    DuplicateEnvironment { index: usize },
    /// Append a copy of a route to its environment
    DuplicateRoute { environment: usize, route: usize },
    /// Write all environments to a checksummed export file
    Export { path: PathBuf },
    /// Append the environments of an export file
    Import { path: PathBuf },
}

/// Alerts for a terminal user.
struct ConsoleAlerts;

impl Alerts for ConsoleAlerts {
    fn show_alert(&self, level: AlertLevel, message: &str) {
        match level {
            AlertLevel::Success => println!("{message}"),
            AlertLevel::Error => eprintln!("error: {message}"),
        }
    }
}

fn open_store(cfg: &StoreCfg) -> Result<Arc<dyn Store>> {
    let store: Arc<dyn Store> = match cfg.engine.as_str() {
        "lmdb" => Arc::new(Memory::open_lmdb(&cfg.path)?),
        "memory" => Arc::new(Memory::memory()),
        "json" => Arc::new(
            JsonFileStore::open(&cfg.path).with_context(|| format!("open store {}", cfg.path))?,
        ),
        other => bail!("Unknown store engine: {}", other),
    };
    Ok(store)
}

fn environment_uuid(service: &EnvironmentsService, index: usize) -> Result<Uuid> {
    service
        .environment_at(index)
        .map(|e| e.uuid)
        .ok_or_else(|| anyhow!("no environment at index {} ({} total)", index, service.len()))
}

fn list(service: &EnvironmentsService) {
    let environments = service.snapshot();
    if environments.is_empty() {
        println!("no environments");
    }
    for (i, env) in environments.iter().enumerate() {
        let flag = if env.duplicates.is_empty() {
            String::new()
        } else {
            format!("  [port shared with {:?}]", env.duplicates)
        };
        println!("{i}: {} (port {}, {} routes){flag}", env.name, env.port, env.routes.len());
        for (j, route) in env.routes.iter().enumerate() {
            let flag = if route.duplicates.is_empty() {
                String::new()
            } else {
                format!("  [duplicate of {:?}]", route.duplicates)
            };
            let content_type = route
                .header("Content-Type")
                .map(|h| format!(" ({})", h.value))
                .unwrap_or_default();
            println!(
                "    {j}: {} /{} -> {}{content_type}{flag}",
                route.method.to_uppercase(),
                route.endpoint,
                route.status_code
            );
        }
    }
}

async fn run(service: &EnvironmentsService, command: Command) -> Result<Option<MutationReceipt>> {
    let receipt = match command {
        Command::List => {
            list(service);
            return Ok(None);
        }
        Command::AddEnvironment => {
            let added = service.add_environment();
            println!("added environment {}", added.output);
            added.receipt
        }
        Command::AddRoute { environment } => {
            let uuid = environment_uuid(service, environment)?;
            let added = service.add_route(&uuid)?;
            println!("added route {} to environment {}", added.output, environment);
            added.receipt
        }
        Command::RemoveEnvironment { index } => {
            let removed = service.remove_environment(index).await?;
            println!("removed environment {}", removed.output.name);
            removed.receipt
        }
        Command::RemoveRoute { environment, route } => {
            let uuid = environment_uuid(service, environment)?;
            let removed = service.remove_route(&uuid, route)?;
            println!(
                "removed route {} /{}",
                removed.output.method.to_uppercase(),
                removed.output.endpoint
            );
            removed.receipt
        }
        Command::DuplicateEnvironment { index } => {
            let copy = service.duplicate_environment(index)?;
            println!("duplicated environment {} as {}", index, copy.output);
            copy.receipt
        }
        Command::DuplicateRoute { environment, route } => {
            let uuid = environment_uuid(service, environment)?;
            let copy = service.duplicate_route(&uuid, route)?;
            println!("duplicated route {} as {}", route, copy.output);
            copy.receipt
        }
        Command::Export { path } => {
            service.export_environments(&path).await?;
            return Ok(None);
        }
        Command::Import { path } => service.import_environments(&path).await?.receipt,
    };
    Ok(Some(receipt))
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_or_default(&args.config)?;
    let _guard = mockd_tracing::init(&config.tracing)?;

    let store = open_store(&config.store)?;
    let service = EnvironmentsService::start(
        to_service_config(&config),
        store,
        Arc::new(DetachedRuntime),
        Arc::new(ConsoleAlerts),
    );

    let outcome: Result<()> = async {
        service.load().await?;
        match run(&service, args.command).await? {
            Some(receipt) => Ok(receipt.persisted().await?),
            None => Ok(()),
        }
    }
    .await;

    service.shutdown().await;
    info!("done");
    outcome
}
