use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use phm_broker::{BrokerChannel, InMemoryBroker, KafkaBroker};
use phm_config::{BrokerConfig, BrokerKind, PipelineConfig};
use phm_gateway::GatewayState;
use phm_kie::{EngineDiagnostics, EngineSession, KieServerClient};
use phm_model::Trigger;
use phm_pipeline::{EngineClients, Pipeline};

/// PHM - trigger orchestration from ingress to process instance
#[derive(Parser)]
#[command(name = "phm")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the pipeline configuration file (JSON)
  #[arg(long, short, global = true, default_value = "phm.json")]
  config: PathBuf,

  /// KIE server password, overriding the configuration file
  #[arg(long, global = true, env = "KIE_SERVER_PASSWORD", hide_env_values = true)]
  kie_password: Option<String>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run the gateway and the pipeline until interrupted
  Serve,

  /// Send one trigger to a running gateway
  Publish {
    #[arg(long)]
    trigger_id: String,

    #[arg(long)]
    member_id: String,
  },

  /// List the containers deployed on the KIE server
  Containers,
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
    )
    .with_writer(std::io::stderr)
    .init();

  match cli.command {
    Some(Commands::Serve) => {
      let config = load_config(&cli.config, cli.kie_password)?;
      run(serve(config))
    }
    Some(Commands::Publish {
      trigger_id,
      member_id,
    }) => {
      let config = PipelineConfig::from_file(&cli.config)
        .with_context(|| format!("failed to load config: {}", cli.config.display()))?;
      run(publish(config, Trigger::new(trigger_id, member_id)))
    }
    Some(Commands::Containers) => {
      let config = load_config(&cli.config, cli.kie_password)?;
      run(containers(config))
    }
    None => {
      println!("phm - use --help to see available commands");
      Ok(())
    }
  }
}

fn run(task: impl std::future::Future<Output = Result<()>>) -> Result<()> {
  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(task)
}

/// Load and validate the configuration. Any problem is fatal before traffic
/// is accepted.
fn load_config(path: &Path, kie_password: Option<String>) -> Result<PipelineConfig> {
  let mut config = PipelineConfig::from_file(path)
    .with_context(|| format!("failed to load config: {}", path.display()))?;
  if kie_password.is_some() {
    config.kie.password = kie_password;
  }
  config
    .validate()
    .with_context(|| format!("invalid config: {}", path.display()))?;
  Ok(config)
}

async fn serve(config: PipelineConfig) -> Result<()> {
  let kie = Arc::new(
    KieServerClient::connect(&config.kie)
      .await
      .context("failed to connect to kie server")?,
  );

  let broker = connect_broker(&config.broker)?;
  let pipeline = Pipeline::start(&config, broker.clone(), EngineClients::shared(kie.clone()))
    .await
    .context("failed to start pipeline")?;

  let cancel = CancellationToken::new();
  let signal_cancel = cancel.clone();
  tokio::spawn(async move {
    match tokio::signal::ctrl_c().await {
      Ok(()) => {
        info!("shutdown requested");
        signal_cancel.cancel();
      }
      Err(e) => error!(error = %e, "failed to listen for shutdown signal"),
    }
  });

  let state = GatewayState::new(pipeline.publisher(), kie);
  let served = phm_gateway::serve(config.http.listen, state, cancel.clone()).await;
  cancel.cancel();

  // Stop ingress before the pipeline drains, then the broker.
  let stopped = pipeline.shutdown().await;
  broker.close().await;

  served.context("gateway failed")?;
  stopped.context("pipeline did not shut down cleanly")?;
  Ok(())
}

fn connect_broker(config: &BrokerConfig) -> Result<Arc<dyn BrokerChannel>> {
  match config.kind {
    BrokerKind::Kafka => {
      let broker = KafkaBroker::new(config.endpoint(), config.send_timeout())
        .with_context(|| format!("failed to create kafka client for {}", config.endpoint()))?;
      Ok(Arc::new(broker))
    }
    BrokerKind::Memory => {
      warn!("in-memory broker: accepted triggers not yet consumed are lost on exit");
      Ok(Arc::new(InMemoryBroker::with_retention(
        config.partitions,
        config.retention,
      )))
    }
  }
}

async fn publish(config: PipelineConfig, trigger: Trigger) -> Result<()> {
  let url = format!("http://{}/trigger", gateway_addr(config.http.listen));
  let response = reqwest::Client::new()
    .post(&url)
    .json(&trigger)
    .send()
    .await
    .with_context(|| format!("failed to reach gateway at {}", url))?;

  let status = response.status();
  let body = response.text().await.context("failed to read gateway response")?;
  if !status.is_success() {
    bail!("gateway rejected trigger ({}): {}", status, body);
  }

  let ack: serde_json::Value =
    serde_json::from_str(&body).context("gateway returned an invalid acknowledgement")?;
  println!("{}", serde_json::to_string_pretty(&ack)?);
  Ok(())
}

async fn containers(config: PipelineConfig) -> Result<()> {
  let kie = KieServerClient::connect(&config.kie)
    .await
    .context("failed to connect to kie server")?;
  let containers = kie.list_containers().await;
  kie.close().await;

  let containers = containers.context("failed to list containers")?;
  println!("{}", serde_json::to_string_pretty(&containers)?);
  Ok(())
}

/// Address a local client should use to reach the gateway.
fn gateway_addr(listen: SocketAddr) -> SocketAddr {
  if listen.ip().is_unspecified() {
    SocketAddr::from((Ipv4Addr::LOCALHOST, listen.port()))
  } else {
    listen
  }
}
