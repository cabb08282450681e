use std::sync::Arc;

use clap::Parser;
use swarm_core::cli::{Cli, Command, RunArgs};
use swarm_core::config::{FleetConfig, FIRMWARE_TAG, HANDSHAKE_DEADLINE, SEND_DEADLINE};
use swarm_core::fleet::Fleet;
use swarm_core::ids;
use swarm_core::session::TickContext;
use swarm_core::telemetry;
use swarm_core::transport::websocket::config::WebSocketConfig;
use swarm_core::transport::websocket::WebSocketConnector;
use swarm_payloads::StockPayloads;
use tracing::info;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("swarm: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init(&telemetry::LogConfig::from_env())?;

    match (cli.command, cli.run) {
        (Some(Command::Gen(args)), _) => {
            ids::generate(&args.ids_file, args.count)?;
            info!(file = %args.ids_file.display(), count = args.count, "device IDs written");
            Ok(())
        }
        (None, Some(args)) => run_fleet(args).await,
        (None, None) => anyhow::bail!("missing run arguments; see --help"),
    }
}

async fn run_fleet(args: RunArgs) -> anyhow::Result<()> {
    let config = FleetConfig::from_args(args).await?;
    info!(addr = %config.addr, "server address resolved");

    let device_ids = ids::load(&config.ids_file)?;
    info!(
        devices = device_ids.len(),
        shards = config.shard_count.min(device_ids.len()),
        "fleet loaded"
    );

    let connector = WebSocketConnector::new(WebSocketConfig {
        host: config.host.clone(),
        port: config.port,
        path: config.path.clone(),
        addr: config.addr,
        firmware: FIRMWARE_TAG.to_owned(),
    });

    let ctx = TickContext {
        connector: Arc::new(connector),
        provider: Arc::new(StockPayloads::new(config.bad_payloads)),
        send_events: config.send_events,
        handshake_deadline: HANDSHAKE_DEADLINE,
        send_deadline: SEND_DEADLINE,
    };

    let fleet = Arc::new(Fleet::new(
        device_ids,
        config.reconnect_interval,
        config.dispatch_interval,
        ctx,
    ));

    // Schedulers run until the process is killed; there is no shutdown path.
    let schedulers = fleet.spawn_schedulers(config.shard_count);
    for scheduler in schedulers {
        let _ = scheduler.await;
    }
    Ok(())
}
