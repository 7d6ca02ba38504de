use crate::{
    admission::Admission,
    config::Config,
    fetch::ApiNamespaces,
    index::{self, Index},
    k8s,
    metrics::AdmissionMetrics,
    placement::Placement,
};
use anyhow::{bail, Result};
use clap::Parser;
use kube::runtime::watcher;
use prometheus_client::registry::Registry;
use std::{path::PathBuf, sync::Arc};
use tokio::time::Duration;
use tracing::{info, info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(name = "placement", about = "A pod placement admission controller")]
pub struct Args {
    #[clap(
        long,
        default_value = "placement=info,warn",
        env = "PLACEMENT_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    server: kubert::ServerArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Disables the admission controller server.
    #[clap(long)]
    admission_controller_disabled: bool,

    /// Path to the plugin configuration file, holding the cluster default node selector and
    /// tolerations.
    #[clap(long, env = "PLACEMENT_CONTROLLER_CONFIG")]
    config: Option<PathBuf>,

    /// Bounds the time spent fetching a namespace that has not yet been indexed.
    #[clap(long, default_value = "5000")]
    namespace_fetch_timeout_ms: u64,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            server,
            admission_controller_disabled,
            config,
            namespace_fetch_timeout_ms,
        } = self;

        let server = if admission_controller_disabled {
            None
        } else {
            Some(server)
        };

        // Build the namespace index, which is maintained by a watch and read by the admission
        // controller to resolve each pod's namespace policy.
        let index = Index::shared();

        let mut prom = <Registry>::default();
        index::metrics::register(
            prom.sub_registry_with_prefix("placement"),
            index.clone(),
        );
        let admission_metrics =
            AdmissionMetrics::register(prom.sub_registry_with_prefix("placement_admission"));
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .with_optional_server(server)
            .build()
            .await?;

        // The configuration is read after logging is initialized so that skipped documents are
        // reported.
        let config = Arc::new(Config::load(config.as_deref())?);
        info!(
            selector = %config.cluster_default_selector,
            tolerations = config.cluster_default_tolerations.len(),
            "Loaded cluster defaults"
        );

        let namespaces = runtime.watch_all::<k8s::Namespace>(watcher::Config::default());
        tokio::spawn(
            kubert::index::cluster(index.clone(), namespaces).instrument(info_span!("namespaces")),
        );

        let client = ApiNamespaces::new(
            runtime.client(),
            Duration::from_millis(namespace_fetch_timeout_ms),
        );
        let placement = Placement::new(config, index, Arc::new(client), admission_metrics);
        let runtime = runtime.spawn_server(move || Admission::new(placement.clone()));

        // Block the main thread on the shutdown signal. Once it fires, wait for the background tasks to
        // complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}
