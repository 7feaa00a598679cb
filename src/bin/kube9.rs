//! kube9 - cluster status CLI
//!
//! Diagnostic interface over kube9-core. Every command prints JSON.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kube9_core::{Config, Kube9, Kube9Core, SyncOptions};
use serde::Serialize;

/// kube9 cluster status CLI
#[derive(Parser)]
#[command(name = "kube9")]
#[command(version)]
#[command(about = "Operator, ArgoCD and resource status for kubeconfig contexts")]
struct Args {
    /// Config file (default: ~/.kube9/config.toml, then /etc/kube9/config.toml)
    #[arg(short, long, env = "KUBE9_CONFIG")]
    config: Option<PathBuf>,

    /// Kubeconfig file (default: the KUBECONFIG path list, then ~/.kube/config)
    #[arg(long)]
    kubeconfig: Option<PathBuf>,

    /// Kubeconfig context
    #[arg(long, env = "KUBE9_CONTEXT")]
    context: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Operator status and cluster mode
    Status {
        /// Bypass the cache
        #[arg(long)]
        refresh: bool,
    },

    /// Whether ArgoCD is installed
    Argocd {
        /// Bypass the cache
        #[arg(long)]
        refresh: bool,
    },

    /// List ArgoCD applications, or show one
    Apps {
        /// Show a single application (`namespace/name`)
        name: Option<String>,
        /// Bypass the cache
        #[arg(long)]
        refresh: bool,
    },

    /// Sync an application (`namespace/name`) and wait for the result
    Sync {
        name: String,
        /// Revision to sync to
        #[arg(long)]
        revision: Option<String>,
        /// Delete resources no longer in the source
        #[arg(long)]
        prune: bool,
        /// Only start the sync, do not wait
        #[arg(long)]
        no_wait: bool,
    },

    /// Refresh an application (`namespace/name`)
    Refresh {
        name: String,
        /// Hard refresh (bypass ArgoCD's manifest cache)
        #[arg(long)]
        hard: bool,
    },

    /// List cluster resources
    Resources {
        /// nodes | pods | services | deployments
        kind: String,
        /// Namespace (default: all)
        #[arg(short, long)]
        namespace: Option<String>,
        /// Bypass the cache
        #[arg(long)]
        refresh: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;

    let mut builder = Kube9::builder().config(&config);
    if let Some(path) = args.kubeconfig {
        builder = builder.kubeconfig(path);
    }
    let core = builder.build()?;

    run(&core, &args.context, args.command).await
}

async fn run(
    core: &Kube9Core,
    context: &str,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Status { refresh } => {
            print_json(&core.operator().get_status(context, refresh).await)?;
        }
        Command::Argocd { refresh } => {
            print_json(&core.argocd_detection().is_installed(context, refresh).await)?;
        }
        Command::Apps {
            name: Some(name),
            ..
        } => {
            let (namespace, name) = split_name(&name)?;
            print_json(&core.applications().get_application(context, namespace, name).await?)?;
        }
        Command::Apps {
            name: None,
            refresh,
        } => {
            print_json(&core.applications().get_applications(context, refresh).await)?;
        }
        Command::Sync {
            name,
            revision,
            prune,
            no_wait,
        } => {
            let (namespace, name) = split_name(&name)?;
            let mut options = SyncOptions::new().prune(prune);
            if let Some(revision) = revision {
                options = options.revision(revision);
            }
            let apps = core.applications();
            if no_wait {
                print_json(&apps.sync(context, namespace, name, &options).await?)?;
            } else {
                print_json(&apps.sync_and_track(context, namespace, name, &options).await?)?;
            }
        }
        Command::Refresh { name, hard } => {
            let (namespace, name) = split_name(&name)?;
            let apps = core.applications();
            let app = if hard {
                apps.hard_refresh(context, namespace, name).await?
            } else {
                apps.refresh(context, namespace, name).await?
            };
            print_json(&app)?;
        }
        Command::Resources {
            kind,
            namespace,
            refresh,
        } => {
            let lister = core.resources();
            let ns = namespace.as_deref();
            let items = match kind.as_str() {
                "nodes" => lister.nodes(context, refresh).await,
                "pods" => lister.pods(context, ns, refresh).await,
                "services" => lister.services(context, ns, refresh).await,
                "deployments" => lister.deployments(context, ns, refresh).await,
                other => return Err(format!("unsupported resource kind: {other}").into()),
            };
            print_json(&items)?;
        }
    }
    Ok(())
}

fn split_name(qualified: &str) -> Result<(&str, &str), Box<dyn std::error::Error>> {
    qualified
        .split_once('/')
        .filter(|(ns, name)| !ns.is_empty() && !name.is_empty())
        .ok_or_else(|| format!("expected namespace/name, got '{qualified}'").into())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
