//! The `/ws` upgrade: wires one socket's read/write pumps to a
//! [`crate::hub::ClientHandle`], enforcing the heartbeat and inbound frame
//! limits the hub's constants describe.

use std::time::Instant;

use actix_web::{web, HttpRequest, HttpResponse};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::api::AppState;
use crate::hub::{ClientHandle, MAX_INBOUND_FRAME_BYTES, OUTBOUND_QUEUE_CAPACITY, PING_INTERVAL, PONG_TIMEOUT};

pub async fn handle(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
) -> actix_web::Result<HttpResponse> {
    let (response, mut session, mut msg_stream) = actix_ws::handle(&req, stream)?;

    let client_id = Uuid::new_v4();
    let (outbound_tx, mut outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
    state.hub.register(ClientHandle {
        id: client_id,
        sender: outbound_tx,
    });

    let hub = state.hub.clone();
    actix_web::rt::spawn(async move {
        let mut last_pong = Instant::now();
        let mut ping_ticker = tokio::time::interval(PING_INTERVAL);
        ping_ticker.tick().await; // first tick fires immediately

        loop {
            tokio::select! {
                outbound = outbound_rx.recv() => {
                    let Some(payload) = outbound else { break };
                    if session.text(payload.to_string()).await.is_err() {
                        break;
                    }
                }

                incoming = msg_stream.next() => {
                    match incoming {
                        Some(Ok(actix_ws::Message::Text(text))) => {
                            if text.len() > MAX_INBOUND_FRAME_BYTES {
                                debug!(client_id = %client_id, "closing client for oversized frame");
                                break;
                            }
                        }
                        Some(Ok(actix_ws::Message::Binary(bytes))) => {
                            if bytes.len() > MAX_INBOUND_FRAME_BYTES {
                                debug!(client_id = %client_id, "closing client for oversized frame");
                                break;
                            }
                        }
                        Some(Ok(actix_ws::Message::Ping(bytes))) => {
                            if session.pong(&bytes).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(actix_ws::Message::Pong(_))) => {
                            last_pong = Instant::now();
                        }
                        Some(Ok(actix_ws::Message::Close(_))) | None => break,
                        Some(Err(_)) => break,
                        _ => {}
                    }
                }

                _ = ping_ticker.tick() => {
                    if last_pong.elapsed() > PONG_TIMEOUT {
                        debug!(client_id = %client_id, "closing unresponsive client");
                        break;
                    }
                    if session.ping(b"").await.is_err() {
                        break;
                    }
                }
            }
        }

        hub.unregister(client_id);
        let _ = session.close(None).await;
    });

    Ok(response)
}
