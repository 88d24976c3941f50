use anyhow::{Context, Result};
use tokio::net::TcpStream;
use tracing::info;

use crate::{
    cli::ConnectArgs,
    session::{run_session, SessionEnd},
};

/// Connect to a listening peer and chat until either side closes.
///
/// The session outcome becomes the process outcome: any session failure
/// propagates as an error and a nonzero exit.
pub async fn run(args: ConnectArgs) -> Result<()> {
    let stream = TcpStream::connect((args.host.as_str(), args.port))
        .await
        .with_context(|| format!("failed to connect to {}:{}", args.host, args.port))?;

    info!("connected to {}:{}", args.host, args.port);

    let end = run_session(stream, tokio::io::stdin(), tokio::io::stdout())
        .await
        .context("chat session failed")?;

    match end {
        SessionEnd::LocalClosed => info!("session closed from this end"),
        SessionEnd::PeerClosed => info!("peer closed the session"),
    }
    Ok(())
}
