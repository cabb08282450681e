use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Simulate a fleet of devices holding WebSocket sessions against one
/// server.
#[derive(Parser, Debug)]
#[command(
    name = "swarm",
    about = "Device-fleet WebSocket load client",
    version,
    args_conflicts_with_subcommands = true,
    subcommand_negates_reqs = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub run: Option<RunArgs>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a fresh device-ID file and exit.
    Gen(GenArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Server host name or address.
    pub host: String,
    /// WebSocket endpoint path on the server.
    pub path: String,
    /// Server TCP port.
    pub port: u16,
    /// Seconds between steady-state dispatches per device.
    #[arg(value_name = "DISPATCH_INTERVAL_S")]
    pub dispatch_interval: u64,
    /// Seconds between reconnect attempts per device.
    #[arg(value_name = "RECONNECT_INTERVAL_S")]
    pub reconnect_interval: u64,
    /// Number of scheduler threads (at least 1).
    pub thread_count: usize,
    /// Append deliberately malformed frames to every batch?
    #[arg(value_enum)]
    pub bad: BadPayloads,
    /// Send an event payload on each dispatch?
    #[arg(value_enum)]
    pub events: EventPayloads,
    /// Device-ID file, one ID per line.
    pub ids_file: PathBuf,
}

#[derive(Args, Debug)]
pub struct GenArgs {
    /// Output device-ID file.
    pub ids_file: PathBuf,
    /// Number of IDs to write.
    pub count: usize,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BadPayloads {
    /// Append a malformed frame to every batch.
    Bad,
    /// Send only well-formed frames.
    NoBad,
}

impl BadPayloads {
    pub fn enabled(self) -> bool {
        matches!(self, BadPayloads::Bad)
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventPayloads {
    /// Request an event payload on each dispatch.
    Events,
    /// Steady-state payloads only.
    NoEvents,
}

impl EventPayloads {
    pub fn enabled(self) -> bool {
        matches!(self, EventPayloads::Events)
    }
}
