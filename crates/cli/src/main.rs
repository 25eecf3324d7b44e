use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use fleetmon_collectors::exposition::{render_json, render_text};
use fleetmon_collectors::{CollectorSet, Scrape, Thresholds, DEFAULT_SINK_CAP};
use fleetmon_core::FleetSource;
use fleetmon_kubehub::KubeFleetSource;
use fleetmon_store::MemoryFleet;
use tokio::signal;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "fleetctl", version, about = "Fleet health signals for cluster deployments")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Kubernetes namespace (default: all namespaces)
    #[arg(long = "ns", global = true)]
    namespace: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the gauge families this exporter produces
    Describe,
    /// Run one scrape (or one every --every seconds) and print the samples
    Collect(CollectArgs),
}

#[derive(Args, Debug, Default)]
struct CollectArgs {
    /// Read records from a YAML file instead of the cluster
    #[arg(long = "fixture")]
    fixture: Option<PathBuf>,

    /// Thresholds YAML file
    #[arg(long = "config")]
    config: Option<PathBuf>,

    #[arg(long = "provision-min-secs")]
    provision_min_secs: Option<u64>,

    #[arg(long = "restarts-min")]
    restarts_min: Option<u32>,

    #[arg(long = "deprovision-min-secs")]
    deprovision_min_secs: Option<u64>,

    #[arg(long = "clustersync-min-secs")]
    clustersync_min_secs: Option<u64>,

    /// Abort a scrape that takes longer than this
    #[arg(long = "timeout-secs", default_value_t = 30)]
    timeout_secs: u64,

    /// Repeat the scrape on this interval until Ctrl-C
    #[arg(long = "every")]
    every: Option<u64>,
}

impl CollectArgs {
    /// File, then environment, then flags.
    fn thresholds(&self) -> Result<Thresholds> {
        let mut t = Thresholds::load(self.config.as_deref())?;
        self.apply_flags(&mut t);
        Ok(t)
    }

    fn apply_flags(&self, t: &mut Thresholds) {
        if let Some(v) = self.provision_min_secs { t.provision_underway_min_secs = v; }
        if let Some(v) = self.restarts_min { t.provision_restarts_min = v; }
        if let Some(v) = self.deprovision_min_secs { t.deprovision_underway_min_secs = v; }
        if let Some(v) = self.clustersync_min_secs { t.clustersync_failing_min_secs = v; }
    }
}

fn init_tracing() {
    let env = std::env::var("FLEETMON_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn metrics_addr(raw: Option<&str>) -> Option<SocketAddr> {
    let addr = raw?;
    match addr.parse::<SocketAddr>() {
        Ok(sock) => Some(sock),
        Err(_) => {
            warn!(addr = %addr, "invalid FLEETMON_METRICS_ADDR; expected host:port");
            None
        }
    }
}

/// Self-metrics stay no-ops unless FLEETMON_METRICS_ADDR names a listener.
fn init_metrics() {
    let raw = std::env::var("FLEETMON_METRICS_ADDR").ok();
    let Some(sock) = metrics_addr(raw.as_deref()) else { return };
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    match builder.with_http_listener(sock).install() {
        Ok(()) => info!(addr = %sock, "Prometheus metrics exporter listening"),
        Err(e) => warn!(error = %e, "failed to install metrics exporter"),
    }
}

async fn build_source(fixture: Option<&PathBuf>, ns: Option<String>) -> Result<Arc<dyn FleetSource>> {
    match fixture {
        Some(path) => {
            let text = std::fs::read_to_string(path).with_context(|| format!("reading fixture {}", path.display()))?;
            let fleet = MemoryFleet::new();
            let n = fleet.load_yaml(&text)?;
            if ns.is_some() {
                warn!("--ns is ignored with --fixture");
            }
            info!(path = %path.display(), records = n, "fixture loaded");
            Ok(Arc::new(fleet))
        }
        None => Ok(Arc::new(KubeFleetSource::try_default(ns).await?)),
    }
}

async fn scrape_once(set: &CollectorSet, timeout: Duration) -> Result<Scrape> {
    let scrape = match tokio::time::timeout(timeout, set.collect_all(DEFAULT_SINK_CAP)).await {
        Ok(s) => s,
        Err(_) => bail!("scrape did not finish within {}s", timeout.as_secs()),
    };
    if !scrape.is_complete() {
        for r in scrape.failures() {
            if let Err(e) = &r.result {
                error!(collector = r.collector, error = %e, "collector failed");
            }
        }
        bail!("{} of {} collectors failed", scrape.failures().count(), scrape.reports.len());
    }
    Ok(scrape)
}

fn print_scrape(set: &CollectorSet, scrape: &Scrape, output: Output) -> Result<()> {
    match output {
        Output::Human => print!("{}", render_text(&set.describe_all(), &scrape.samples)?),
        Output::Json => println!("{}", serde_json::to_string_pretty(&render_json(&scrape.samples))?),
    }
    Ok(())
}

/// Scrape on every tick until `shutdown` resolves, including mid-scrape.
async fn run_every(set: &CollectorSet, timeout: Duration, every: Duration, output: Output, shutdown: impl Future) -> Result<()> {
    tokio::pin!(shutdown);
    let mut tick = tokio::time::interval(every);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = tick.tick() => {
                tokio::select! {
                    _ = &mut shutdown => break,
                    res = scrape_once(set, timeout) => match res {
                        Ok(scrape) => print_scrape(set, &scrape, output)?,
                        Err(e) => error!(error = %e, "scrape failed"),
                    },
                }
            }
        }
    }
    info!("shutdown requested; stopping collect loop");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();

    match cli.command {
        Commands::Describe => {
            // describe never lists, so an empty fleet is enough
            let set = CollectorSet::standard(Arc::new(MemoryFleet::new()), &Thresholds::default())?;
            let descs = set.describe_all();
            match cli.output {
                Output::Human => {
                    for d in &descs {
                        println!("{}", d.name);
                        println!("  {}", d.help);
                        println!("  labels: {}", d.labels.join(", "));
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&descs)?),
            }
        }
        Commands::Collect(args) => {
            let thresholds = args.thresholds()?;
            info!(ns = ?cli.namespace, fixture = ?args.fixture, thresholds = ?thresholds, "collect invoked");
            let source = build_source(args.fixture.as_ref(), cli.namespace.clone()).await?;
            let set = CollectorSet::standard(source, &thresholds)?;
            let timeout = Duration::from_secs(args.timeout_secs.max(1));

            let Some(every) = args.every else {
                let scrape = scrape_once(&set, timeout).await?;
                return print_scrape(&set, &scrape, cli.output);
            };
            let every = Duration::from_secs(every.max(1));
            run_every(&set, timeout, every, cli.output, signal::ctrl_c()).await?;
        }
    }
    Ok(())
}
