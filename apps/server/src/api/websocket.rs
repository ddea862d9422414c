//! WebSocket feed of tracker events.
//!
//! Every execution, test case and session change is pushed to connected
//! clients so open views refresh without polling.

use actix_web::{FromRequest, HttpRequest, HttpResponse, ResponseError, web};
use actix_ws::Message;
use futures_util::StreamExt;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::auth::OperatorAuth;
use crate::models::Operator;
use crate::services::EventBroadcaster;

/// Ping interval for keeping connections alive.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Timeout for receiving pong response.
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Checks the operator header, then upgrades to a WebSocket.
pub async fn websocket_handler(
    req: HttpRequest,
    stream: web::Payload,
    broadcaster: web::Data<EventBroadcaster>,
) -> Result<HttpResponse, actix_web::Error> {
    let auth = match OperatorAuth::extract(&req).await {
        Ok(auth) => auth,
        Err(e) => return Ok(e.error_response()),
    };

    let (response, session, msg_stream) = actix_ws::handle(&req, stream)?;

    info!(
        operator = %auth.operator,
        subscribers = broadcaster.subscriber_count() + 1,
        "WebSocket connection established"
    );

    actix_web::rt::spawn(handle_websocket_connection(
        session,
        msg_stream,
        broadcaster.get_ref().clone(),
        auth.operator,
    ));

    Ok(response)
}

async fn handle_websocket_connection(
    mut session: actix_ws::Session,
    mut msg_stream: actix_ws::MessageStream,
    broadcaster: EventBroadcaster,
    operator: Operator,
) {
    let mut rx = broadcaster.subscribe();
    let mut last_pong = Instant::now();
    let mut ping_interval = tokio::time::interval(PING_INTERVAL);

    loop {
        tokio::select! {
            Some(msg_result) = msg_stream.next() => {
                match msg_result {
                    Ok(Message::Ping(bytes)) => {
                        if session.pong(&bytes).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Pong(_)) => {
                        last_pong = Instant::now();
                    }
                    Ok(Message::Text(text)) => {
                        debug!(operator = %operator, message = %text, "Ignoring client text message");
                    }
                    Ok(Message::Close(reason)) => {
                        info!(operator = %operator, reason = ?reason, "Client requested close");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(operator = %operator, error = %e, "WebSocket message error");
                        break;
                    }
                }
            }

            event_result = rx.recv() => {
                match event_result {
                    Ok(event) => match serde_json::to_string(&event) {
                        Ok(json) => {
                            if session.text(json).await.is_err() {
                                warn!(operator = %operator, "Failed to send event, closing connection");
                                break;
                            }
                        }
                        Err(e) => warn!(error = %e, "Failed to serialize event"),
                    },
                    // Lagging clients resync on their next read.
                    Err(RecvError::Lagged(count)) => {
                        warn!(operator = %operator, missed = count, "Client lagged, missed events");
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            _ = ping_interval.tick() => {
                if last_pong.elapsed() > PING_INTERVAL + PONG_TIMEOUT {
                    warn!(operator = %operator, "Pong timeout, closing connection");
                    break;
                }
                if session.ping(b"").await.is_err() {
                    break;
                }
            }
        }
    }

    let _ = session.close(None).await;
    info!(operator = %operator, "WebSocket connection closed");
}

/// Configure WebSocket routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/ws").route(web::get().to(websocket_handler)));
}
