use std::sync::Arc;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use spectra_rs::append_with_limit;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{error, info, warn};

use crate::logs::event_entry;
use crate::protocol::BridgeOutbound;
use crate::session::SessionCore;
use crate::state::EVENT_LOG_LIMIT;
use crate::types::{AcquisitionState, AnalyzerPatch, ConnectionState, LogLevel};

/// Drive one bridge connection: open the socket, announce the session, then
/// pump inbound frames into the validator and outbound messages onto the
/// wire until either side closes.
///
/// The session owns exactly one of these tasks at a time; reconnecting
/// aborts the previous one before this runs.
pub(crate) async fn run(
    core: Arc<SessionCore>,
    url: String,
    mut outbound_rx: UnboundedReceiver<BridgeOutbound>,
) {
    let (socket, _response) = match connect_async(&url).await {
        Ok(pair) => pair,
        Err(err) => {
            error!("failed to open bridge socket: {err}");
            core.clear_outbound();
            core.mutate(|prev| AnalyzerPatch {
                connection_state: Some(ConnectionState::Disconnected),
                acquisition_state: Some(AcquisitionState::Idle),
                event_log: Some(append_with_limit(
                    &prev.event_log,
                    event_entry(
                        LogLevel::Error,
                        "connection",
                        "Failed to open WebSocket",
                        Some(err.to_string()),
                    ),
                    EVENT_LOG_LIMIT,
                )),
                ..Default::default()
            });
            return;
        }
    };

    info!("bridge connected: {url}");
    let (mut sink, mut stream) = socket.split();

    core.mutate(|prev| AnalyzerPatch {
        connection_state: Some(ConnectionState::Connected),
        acquisition_state: Some(AcquisitionState::Armed),
        last_sync: Some(Some(Utc::now())),
        event_log: Some(append_with_limit(
            &prev.event_log,
            event_entry(
                LogLevel::Info,
                "connection",
                "Analyzer connected (bridge)",
                None,
            ),
            EVENT_LOG_LIMIT,
        )),
        ..Default::default()
    });

    match serde_json::to_string(&BridgeOutbound::handshake()) {
        Ok(json) => {
            if let Err(err) = sink.send(Message::Text(json.into())).await {
                error!("failed to send handshake: {err}");
            }
        }
        Err(err) => error!("failed to serialize handshake: {err}"),
    }

    loop {
        tokio::select! {
            outgoing = outbound_rx.recv() => {
                let Some(message) = outgoing else { break };
                match serde_json::to_string(&message) {
                    Ok(json) => {
                        if let Err(err) = sink.send(Message::Text(json.into())).await {
                            error!("bridge send failed: {err}");
                            break;
                        }
                    }
                    Err(err) => error!("failed to serialize outbound message: {err}"),
                }
            }

            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => core.handle_raw_message(&text),
                    Some(Ok(Message::Ping(data))) => {
                        if sink.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("bridge closed by peer");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!("bridge socket error: {err}");
                        core.log_event(
                            LogLevel::Error,
                            "connection",
                            "Bridge connection error",
                            Some(err.to_string()),
                        );
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    core.clear_outbound();
    core.mutate(|prev| AnalyzerPatch {
        connection_state: Some(ConnectionState::Disconnected),
        acquisition_state: Some(AcquisitionState::Idle),
        event_log: Some(append_with_limit(
            &prev.event_log,
            event_entry(LogLevel::Info, "connection", "Analyzer link closed.", None),
            EVENT_LOG_LIMIT,
        )),
        ..Default::default()
    });
}
