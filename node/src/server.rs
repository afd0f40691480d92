//! Websocket ingest server (§5). One task per accepted connection reads
//! text frames, hands them to the `IngestCoordinator`, and writes back
//! whatever replies it produces. Idle connections are probed and, absent
//! a response, dropped, the way the teacher's index-node server bounds
//! its own long-lived connections.

use std::convert::TryFrom;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use honeygraph::env::ENV_VARS;
use honeygraph::types::NetworkPrefix;
use honeygraph_core::{parse_inbound, IngestCoordinator, InboundMessage, OutboundMessage};
use slog::{debug, info, o, warn, Logger};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;

/// Accepts connections until the listener is closed or the process exits.
pub async fn run(addr: SocketAddr, coordinator: Arc<IngestCoordinator>, logger: Logger) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(logger, "listening for ingest connections"; "addr" => %addr);

    loop {
        let (stream, peer) = listener.accept().await?;
        let coordinator = coordinator.clone();
        let logger = logger.new(o!("peer" => peer.to_string()));
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer, coordinator, logger.clone()).await {
                warn!(logger, "connection ended with error"; "error" => %e);
            }
        });
    }
}

/// One connection's lifecycle: handshake, wait for `identify`, then pump
/// messages through the coordinator until the peer disconnects or goes
/// idle past the configured grace period.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    coordinator: Arc<IngestCoordinator>,
    logger: Logger,
) -> anyhow::Result<()> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let (mut write, mut read) = ws.split();

    let idle = ENV_VARS.conn_idle();
    let probe_timeout = ENV_VARS.conn_probe_timeout();

    let mut identity: Option<(NetworkPrefix, String)> = None;
    let mut awaiting_pong = false;

    loop {
        let next = tokio::time::timeout(idle, read.next()).await;

        let frame = match next {
            Ok(Some(Ok(frame))) => {
                awaiting_pong = false;
                frame
            }
            Ok(Some(Err(e))) => return Err(e.into()),
            Ok(None) => break,
            Err(_) if awaiting_pong => {
                info!(logger, "peer unresponsive to probe, closing"; "peer" => %peer);
                break;
            }
            Err(_) => {
                awaiting_pong = true;
                write.send(Message::Ping(Vec::new())).await?;
                match tokio::time::timeout(probe_timeout, read.next()).await {
                    Ok(Some(Ok(frame))) => {
                        awaiting_pong = false;
                        frame
                    }
                    _ => {
                        info!(logger, "peer did not answer liveness probe, closing"; "peer" => %peer);
                        break;
                    }
                }
            }
        };

        match frame {
            Message::Text(text) => {
                for reply in handle_text(&coordinator, &mut identity, &text, &logger).await {
                    write.send(Message::Text(reply.to_json())).await?;
                }
            }
            Message::Ping(payload) => {
                write.send(Message::Pong(payload)).await?;
            }
            Message::Pong(_) => {}
            Message::Close(_) => break,
            Message::Binary(_) => {}
            _ => {}
        }
    }

    if let Some((network, node_id)) = identity {
        coordinator.disconnect(&network, &node_id);
    }
    Ok(())
}

async fn handle_text(
    coordinator: &Arc<IngestCoordinator>,
    identity: &mut Option<(NetworkPrefix, String)>,
    text: &str,
    logger: &Logger,
) -> Vec<OutboundMessage> {
    let msg = match parse_inbound(text) {
        Ok(msg) => msg,
        Err(e) => {
            debug!(logger, "dropping malformed frame"; "error" => %e);
            return vec![OutboundMessage::Error { error: e.to_string() }];
        }
    };

    if identity.is_none() {
        if let InboundMessage::Identify { node_id, network, .. } = &msg {
            match NetworkPrefix::try_from(network.as_str()) {
                Ok(prefix) => {
                    let connected = coordinator.connect(&prefix, node_id);
                    *identity = Some((prefix, node_id.clone()));
                    return vec![connected];
                }
                Err(e) => return vec![OutboundMessage::Error { error: e.to_string() }],
            }
        }
        return vec![OutboundMessage::Error {
            error: "first message on a connection must be identify".to_owned(),
        }];
    }

    let (network, node_id) = identity.as_ref().expect("checked above");
    coordinator.handle_message(network, node_id, msg).await
}
