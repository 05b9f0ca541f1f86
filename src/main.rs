//! mup - rolling Kubernetes version upgrade for Cluster API machines.
//!
//! Upgrades the single control plane machine first, waits until its node
//! reports Ready at the target kubelet version, then upgrades every worker
//! machine concurrently. The first worker failure in listing order is
//! reported and the remaining workers are cancelled.

mod config;
mod error;
mod k8s;
mod logging;
mod machine;
mod upgrade;
mod version;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, error, info};

use config::{Args, Config};
use error::MupError;
use k8s::{KubeMachineRepository, KubeNodeOracle};
use upgrade::ClusterHandle;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let config = match Config::from_args(args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(2);
        }
    };

    if let Err(e) = logging::init(config.log_format, &config.log_level) {
        eprintln!("Failed to initialize logging: {e}");
        std::process::exit(1);
    }

    debug!(
        version = config::VERSION,
        commit = config::COMMIT,
        build_date = config::BUILD_DATE,
        "Starting mup"
    );

    if let Err(e) = run(&config).await {
        let machine = e.downcast_ref::<MupError>().and_then(MupError::machine);
        error!(machine, "{e:#}");
        std::process::exit(1);
    }
}

/// Main application logic.
async fn run(config: &Config) -> Result<()> {
    let client =
        k8s::client::build_client(config.kubeconfig.as_deref(), config.context.as_deref()).await?;

    let cluster = ClusterHandle::new(
        Arc::new(KubeMachineRepository::new(client.clone(), &config.namespace)),
        Arc::new(KubeNodeOracle::new(client)),
    );

    let plan = upgrade::upgrade_cluster(&config.target_version, &cluster, &config.upgrade).await?;

    if config.upgrade.dry_run {
        print!("{}", plan.render());
        println!("Dry run: no machines were updated");
    } else {
        info!(
            machines = plan.machine_count(),
            version = %plan.target_version,
            "Cluster upgrade completed"
        );
    }
    Ok(())
}
