use std::{sync::Arc, time::Duration};

use clap::Parser;
use owo_colors::OwoColorize;

use fleet_autoscaler::args::{Cli, Commands, ScalingArgs};
use fleet_autoscaler::collaborators::{self, ClusterRegistry, HttpComputeProvider, SecretStore};
use fleet_autoscaler::drainer::Drainer;
use fleet_autoscaler::metrics_source::MetricsSourceAdapter;
use fleet_autoscaler::provisioner::Provisioner;
use fleet_autoscaler::reconciler::{Reconciler, TickOutcome};
use fleet_autoscaler::state::{DistributedLock, StateStore};
use fleet_autoscaler::util::{
    self,
    colors::{FG1, FG2},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fleet_common::init();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(scaling_args) => run(scaling_args).await,
        Commands::Tick(scaling_args) => tick_once(scaling_args).await,
    }
}

async fn build_reconciler(scaling_args: &ScalingArgs) -> anyhow::Result<Reconciler> {
    let config = scaling_args.to_scaling_config();

    println!(
        "{}",
        format!(
            "\u{1f9ee} fleet-autoscaler \u{2022} cluster={} \u{2022} workers={}..{}",
            config.cluster_id, config.min_workers, config.max_workers
        )
        .color(FG1)
    );

    let pool = fleet_common::redis::init_redis(&scaling_args.redis).await;
    let kube_client = match &scaling_args.kubeconfig {
        Some(path) => {
            let kubeconfig = kube::config::Kubeconfig::read_from(path)?;
            let kube_config = kube::Config::from_custom_kubeconfig(kubeconfig, &Default::default()).await?;
            kube::Client::try_from(kube_config)?
        }
        None => kube::Client::try_default().await?,
    };

    let secret_store = scaling_args.secret_store_url.as_ref().map(|url| SecretStore::new(url.clone()));
    let join_token = match &secret_store {
        Some(s) => s.get("cluster_join_token").await?,
        None => None,
    };
    let metrics_source_token = match &secret_store {
        Some(s) => s.get("metrics_source_token").await?,
        None => None,
    };
    let webhook_url = match &secret_store {
        Some(s) => s.get("notifier_webhook_url").await?.or_else(|| scaling_args.notifier_url.clone()),
        None => scaling_args.notifier_url.clone(),
    };

    let registry = Arc::new(ClusterRegistry::new(kube_client));
    let provider = Arc::new(HttpComputeProvider::new(scaling_args.compute_provider_url.clone(), None));
    let metrics_source = MetricsSourceAdapter::new(scaling_args.metrics_source_url.clone(), metrics_source_token);
    let lock = DistributedLock::new(pool.clone());
    let store = StateStore::new(pool);
    let provisioner = Provisioner::new(
        provider.clone(),
        scaling_args.instance_template_id.clone(),
        scaling_args.cluster_id.clone(),
        config.spot_percentage,
        Duration::from_secs(config.join_deadline_secs),
        join_token,
    );
    let drainer = Drainer::new(
        registry.clone(),
        provider.clone(),
        Duration::from_secs(config.drain_timeout_secs),
    );
    let notifier = collaborators::Notifier::new(webhook_url, None);

    if let Some(port) = scaling_args.metrics_port {
        fleet_common::metrics::spawn_metrics_server(port, config.cluster_id.clone());
    }

    Ok(Reconciler::new(
        config, lock, store, metrics_source, provider, registry, provisioner, drainer, notifier,
    ))
}

async fn run(scaling_args: ScalingArgs) -> anyhow::Result<()> {
    let reconciler = build_reconciler(&scaling_args).await?;
    let interval = Duration::from_secs(scaling_args.tick_interval_secs);
    let shutdown = fleet_common::shutdown::shutdown_token();

    println!("{}", "\u{25b6} entering resident reconciliation loop".color(FG2));

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                println!("{}", "\u{23f9} shutdown signal received, exiting after current tick".color(FG2));
                break;
            }
            outcome = reconciler.tick() => {
                log_outcome(&outcome);
            }
        }

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    Ok(())
}

async fn tick_once(scaling_args: ScalingArgs) -> anyhow::Result<()> {
    let reconciler = build_reconciler(&scaling_args).await?;
    let outcome = reconciler.tick().await;
    log_outcome(&outcome);
    outcome.map(|_| ()).map_err(Into::into)
}

fn log_outcome(outcome: &Result<TickOutcome, util::Error>) {
    match outcome {
        Ok(TickOutcome::LockContended) => tracing::debug!("tick skipped: lock contended"),
        Ok(TickOutcome::Noop) => tracing::info!("tick complete: no scaling action"),
        Ok(TickOutcome::ScaledUp) => tracing::info!("tick complete: scaled up"),
        Ok(TickOutcome::ScaledDown) => tracing::info!("tick complete: scaled down"),
        Err(e) => tracing::error!(code = e.code(), error = %e, "tick failed"),
    }
}
