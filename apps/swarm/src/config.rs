use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::net::lookup_host;

use crate::cli::RunArgs;

/// Firmware version every simulated device reports during the handshake.
pub const FIRMWARE_TAG: &str = "1.0.0";
/// Wall-clock bound on the WebSocket handshake.
pub const HANDSHAKE_DEADLINE: Duration = Duration::from_millis(8000);
/// Wall-clock bound on each outbound send.
pub const SEND_DEADLINE: Duration = Duration::from_millis(5000);

/// Validated runtime configuration for a fleet run.
#[derive(Debug, Clone)]
pub struct FleetConfig {
    pub host: String,
    pub path: String,
    pub port: u16,
    /// Resolved once at startup; resolution failure aborts before any
    /// session exists.
    pub addr: SocketAddr,
    pub dispatch_interval: Duration,
    pub reconnect_interval: Duration,
    pub shard_count: usize,
    pub bad_payloads: bool,
    pub send_events: bool,
    pub ids_file: PathBuf,
}

impl FleetConfig {
    pub async fn from_args(args: RunArgs) -> Result<Self> {
        if args.thread_count < 1 {
            bail!("thread count must be at least 1");
        }

        let addr = lookup_host((args.host.as_str(), args.port))
            .await
            .with_context(|| format!("failed to resolve {}:{}", args.host, args.port))?
            .next()
            .with_context(|| format!("no addresses found for {}:{}", args.host, args.port))?;

        Ok(Self {
            host: args.host,
            path: args.path,
            port: args.port,
            addr,
            dispatch_interval: Duration::from_secs(args.dispatch_interval),
            reconnect_interval: Duration::from_secs(args.reconnect_interval),
            shard_count: args.thread_count,
            bad_payloads: args.bad.enabled(),
            send_events: args.events.enabled(),
            ids_file: args.ids_file,
        })
    }
}
