use std::net::IpAddr;

use clap::{Args, Parser, Subcommand};

/// Port used when none is given, inherited from the original protocol.
pub const DEFAULT_PORT: u16 = 63212;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Wait for an incoming chat connection.
    Listen(ListenArgs),
    /// Connect to a listening peer.
    Connect(ConnectArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ListenArgs {
    /// Port to listen on. Use 0 for an ephemeral port.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: IpAddr,
}

#[derive(Args, Debug, Clone)]
pub struct ConnectArgs {
    /// Host running a listening peer.
    pub host: String,

    /// Port the peer is listening on.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
}
