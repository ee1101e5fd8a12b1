use std::sync::Arc;

use actix_web::{Error, HttpRequest, HttpResponse, get, rt, web};
use actix_ws::{AggregatedMessage, AggregatedMessageStream, CloseCode, CloseReason, Session};
use beacon_service::broadcast::{ClientMessage, ConnectionId, ServerMessage, SubscriptionRegistry};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::state::AppState;

macros_utils::routes! {
    route ws_route,
}

/// Live status subscriptions.
///
/// Clients send `subscribe`/`unsubscribe`/`ping` frames and receive
/// `subscribed`, `pong` and `status_update` messages.
#[get("/ws")]
pub async fn ws_route(
    req: HttpRequest,
    body: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let (response, session, stream) = actix_ws::handle(&req, body)?;

    let registry = Arc::clone(&state.registry);
    let (id, outbox) = registry.connect().await;
    info!(connection = %id, peer = ?req.peer_addr(), "WebSocket session opened");

    // Fragmented text frames arrive as one message
    let stream = stream.aggregate_continuations();
    rt::spawn(run_session(registry, id, session, stream, outbox));

    Ok(response)
}

/// Pump client frames into the registry and outbox messages to the client
/// until either side goes away.
///
/// Replies to the client's own frames go straight to the socket and never
/// queue behind broadcasts in the outbox.
async fn run_session(
    registry: Arc<SubscriptionRegistry>,
    id: ConnectionId,
    mut session: Session,
    mut stream: AggregatedMessageStream,
    mut outbox: mpsc::Receiver<ServerMessage>,
) {
    let reason: Option<CloseReason> = 'session: loop {
        tokio::select! {
            frame = stream.recv() => match frame {
                Some(Ok(AggregatedMessage::Text(text))) => match ClientMessage::parse(&text) {
                    Ok(Some(message)) => {
                        for reply in registry.handle_client_message(id, message).await {
                            if !send(&mut session, &reply).await {
                                break 'session None;
                            }
                        }
                    }
                    Ok(None) => debug!(connection = %id, "Ignoring unrecognized frame"),
                    Err(e) => {
                        warn!(connection = %id, error = %e, "Closing session on malformed frame");
                        break 'session Some((CloseCode::Invalid, e.to_string()).into());
                    }
                },
                Some(Ok(AggregatedMessage::Ping(bytes))) => {
                    if session.pong(&bytes).await.is_err() {
                        break 'session None;
                    }
                }
                Some(Ok(AggregatedMessage::Close(reason))) => break 'session reason,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(connection = %id, error = %e, "WebSocket protocol error");
                    break 'session Some(CloseCode::Protocol.into());
                }
                None => break 'session None,
            },
            outgoing = outbox.recv() => match outgoing {
                Some(message) => {
                    if !send(&mut session, &message).await {
                        break 'session None;
                    }
                }
                // Dropped by the registry: slow subscriber or server shutdown
                None => break 'session Some(CloseCode::Away.into()),
            },
        }
    };

    registry.disconnect(id).await;
    let _ = session.close(reason).await;
    info!(connection = %id, "WebSocket session closed");
}

/// Returns `false` once the client is gone
async fn send(session: &mut Session, message: &ServerMessage) -> bool {
    match message.to_json() {
        Ok(json) => session.text(json).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "Failed to encode outgoing message");
            true
        }
    }
}
