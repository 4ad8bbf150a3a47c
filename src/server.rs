//! The command listener.
//!
//! Each TCP connection carries a single command line. The daemon writes the
//! reply, one line per item, and closes the connection.

mod dispatch;
mod protocol;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::config::ServerSettings;
use crate::error::Result;

pub use dispatch::Dispatcher;
pub use protocol::{Command, ParseError};

/// Longest command line read from a client.
const MAX_COMMAND_BYTES: u64 = 4096;

pub async fn bind(settings: &ServerSettings) -> Result<TcpListener> {
    let listener = TcpListener::bind((settings.bind_address.as_str(), settings.port)).await?;
    info!(addr = %listener.local_addr()?, "listening for commands");
    Ok(listener)
}

/// Accept connections until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, dispatcher: Arc<Dispatcher>, shutdown: F)
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((socket, peer)) => {
                    let dispatcher = dispatcher.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(socket, peer, &dispatcher).await {
                            debug!(%peer, error = %e, "connection dropped");
                        }
                    });
                }
                Err(e) => warn!(error = %e, "failed to accept connection"),
            },
            _ = &mut shutdown => break,
        }
    }
    info!("command listener stopped");
}

async fn handle_connection(
    socket: TcpStream,
    peer: SocketAddr,
    dispatcher: &Dispatcher,
) -> std::io::Result<()> {
    let (reader, mut writer) = socket.into_split();
    let mut raw = Vec::new();
    BufReader::new(reader.take(MAX_COMMAND_BYTES))
        .read_until(b'\n', &mut raw)
        .await?;
    // Bytes that are not UTF-8 still get a parse error back.
    let line = String::from_utf8_lossy(&raw);
    debug!(%peer, line = line.trim(), "received");

    for reply in dispatcher.handle_line(&line).await {
        writer.write_all(reply.as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }
    writer.shutdown().await
}
