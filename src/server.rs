use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::{
    cli::ListenArgs,
    session::{run_session, SessionEnd},
};

/// Listen for peers and chat with one at a time.
///
/// Connections are served sequentially: each accepted socket runs a session
/// to completion before the next accept. A failed session ends only that
/// conversation; the listener keeps accepting. Local end-of-input ends the
/// process, since every later session would terminate immediately anyway.
pub async fn run(args: ListenArgs) -> Result<()> {
    let addr = SocketAddr::new(args.bind, args.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("listening on {}", listener.local_addr()?);

    // One stdin/stdout handle for the whole process: tokio's Stdin buffers
    // bytes consumed by a read that a finished session left in flight, and a
    // fresh handle per session would lose them.
    let mut stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!(error = ?err, "failed to accept connection");
                continue;
            }
        };
        info!(%peer, "peer connected");

        match run_session(stream, &mut stdin, &mut stdout).await {
            Ok(SessionEnd::LocalClosed) => {
                info!("session closed from this end");
                return Ok(());
            }
            Ok(SessionEnd::PeerClosed) => info!(%peer, "peer disconnected"),
            Err(err) => warn!(%peer, error = %err, "session failed"),
        }
    }
}
