//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a WebSocket connection.
//! Each connection owns one `SessionController` and translates client messages
//! into its operations. Closing the socket abandons the session.

use crate::web::{
    protocol::{ClientMessage, DictionaryEntryDto, ServerMessage, SummaryDto},
    state::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use chrono::Utc;
use futures::{
    stream::{SplitSink, SplitStream, StreamExt},
    SinkExt,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;
use vocab_reader_core::{
    domain::DictionaryEntry,
    session::{AdvanceOutcome, SessionController, SessionState},
};

type WsSender = SplitSink<WebSocket, Message>;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(ws: WebSocketUpgrade, State(app_state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

/// Serializes and sends one message. Returns `false` once the client is gone.
async fn send(sender: &mut WsSender, message: &ServerMessage) -> bool {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize server message: {}", e);
            return true;
        }
    };
    sender.send(Message::Text(json.into())).await.is_ok()
}

/// Whether a received frame ends the connection.
fn is_disconnect(frame: &Option<Result<Message, axum::Error>>) -> bool {
    matches!(frame, None | Some(Err(_)) | Some(Ok(Message::Close(_))))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {
    info!("New WebSocket connection established.");
    let (mut sender, mut receiver) = socket.split();
    let mut controller = SessionController::new(app_state.session_services());

    // --- 1. Initialization Phase ---
    let article_id = match receiver.next().await {
        Some(Ok(Message::Text(init_json))) => {
            match serde_json::from_str::<ClientMessage>(&init_json) {
                Ok(ClientMessage::Init { article_id }) => article_id,
                _ => {
                    error!("First message was not a valid Init message.");
                    let reply = ServerMessage::error("The first message must be init.");
                    send(&mut sender, &reply).await;
                    return;
                }
            }
        }
        _ => {
            error!("Client disconnected before sending Init message.");
            return;
        }
    };

    if !load_session(&mut controller, article_id, &mut sender, &mut receiver).await {
        controller.abandon();
        info!("WebSocket connection closed during load.");
        return;
    }

    // --- 2. Main Message Loop ---
    loop {
        let frame = receiver.next().await;
        if is_disconnect(&frame) {
            info!("Client disconnected.");
            break;
        }
        let Some(Ok(Message::Text(text))) = frame else {
            continue;
        };
        match serde_json::from_str::<ClientMessage>(&text) {
            Ok(message) => {
                if !handle_client_message(message, &mut controller, &mut sender).await {
                    break;
                }
            }
            Err(e) => {
                warn!("Failed to deserialize client message: {}", e);
                if !send(&mut sender, &ServerMessage::error("Unrecognized message.")).await {
                    break;
                }
            }
        }
    }

    // --- 3. Cleanup ---
    controller.abandon();
    info!("WebSocket connection closed.");
}

/// Runs the load while still watching the socket, so a client that leaves
/// mid-rewrite abandons the call. Returns `false` if the connection should close.
async fn load_session(
    controller: &mut SessionController,
    article_id: Uuid,
    sender: &mut WsSender,
    receiver: &mut SplitStream<WebSocket>,
) -> bool {
    info!("Loading article {} for a reading session", article_id);
    let mut phase = controller.watch_state();

    let outcome = {
        let load = controller.load(article_id);
        tokio::pin!(load);
        loop {
            tokio::select! {
                result = &mut load => {
                    let ready = result
                        .map(|text| ServerMessage::ready(text, text.sentences.len().min(1)));
                    break Some(ready);
                }
                Ok(()) = phase.changed() => {
                    let name = *phase.borrow_and_update();
                    if name == "rewriting" && !send(sender, &ServerMessage::Rewriting).await {
                        break None;
                    }
                }
                frame = receiver.next() => {
                    if is_disconnect(&frame) {
                        info!("Client left while the article was loading.");
                        break None;
                    }
                    if !send(sender, &ServerMessage::error("The article is still loading.")).await {
                        break None;
                    }
                }
            }
        }
    };

    match outcome {
        Some(Ok(ready)) => send(sender, &ready).await,
        Some(Err(e)) => {
            error!("Failed to load article {}: {}", article_id, e);
            send(sender, &ServerMessage::error(e.user_message())).await;
            false
        }
        None => false,
    }
}

/// Helper function to handle the logic for the different `ClientMessage` variants.
/// Returns `false` once the client can no longer be reached.
async fn handle_client_message(
    message: ClientMessage,
    controller: &mut SessionController,
    sender: &mut WsSender,
) -> bool {
    let reply = match message {
        ClientMessage::Init { .. } => {
            warn!("Received subsequent Init message, which is ignored.");
            return true;
        }
        ClientMessage::Advance { at } => match controller.advance(at.unwrap_or_else(Utc::now)) {
            Ok(AdvanceOutcome::Revealed { visible_sentence_count }) => ServerMessage::Revealed {
                visible_sentence_count,
                can_finish: controller.can_finish(),
            },
            // The popup swallows the key press.
            Ok(AdvanceOutcome::Blocked) => return true,
            Ok(AdvanceOutcome::AtEnd) => match controller.state() {
                SessionState::Reading {
                    visible_sentence_count,
                    ..
                } => ServerMessage::Revealed {
                    visible_sentence_count: *visible_sentence_count,
                    can_finish: true,
                },
                _ => return true,
            },
            Err(e) => ServerMessage::error(e.to_string()),
        },
        ClientMessage::Lookup { word } => match controller.lookup(&word).await {
            Ok(entry) => ServerMessage::LookupResult {
                word,
                entry: entry.map(DictionaryEntryDto::from),
                error: None,
            },
            Err(e) => ServerMessage::LookupResult {
                word,
                entry: None,
                error: Some(e.user_message()),
            },
        },
        ClientMessage::ClosePopup => {
            controller.close_popup();
            return true;
        }
        ClientMessage::MarkUnfamiliar { entry } => {
            let entry = DictionaryEntry::from(entry);
            let success = match controller.mark_unfamiliar(&entry).await {
                Ok(added) => added,
                Err(e) => {
                    error!("Failed to add '{}' to the unfamiliar words: {}", entry.word, e);
                    false
                }
            };
            ServerMessage::WordMarked {
                word: entry.word,
                success,
            }
        }
        ClientMessage::Finish { at } => match controller.finish(at.unwrap_or_else(Utc::now)) {
            Ok(summary) => ServerMessage::Summary {
                summary: SummaryDto::from(summary),
            },
            Err(e) => ServerMessage::error(e.to_string()),
        },
        ClientMessage::Restart { at } => match controller.restart(at.unwrap_or_else(Utc::now)) {
            Ok(()) => match controller.state() {
                SessionState::Reading {
                    text,
                    visible_sentence_count,
                    ..
                } => ServerMessage::ready(text, *visible_sentence_count),
                other => ServerMessage::error(format!("Session is {}.", other.name())),
            },
            Err(e) => ServerMessage::error(e.to_string()),
        },
        ClientMessage::SaveRewritten { title } => match controller.save_rewritten(&title).await {
            Ok(article) => {
                info!("Saved the rewritten text as article {}", article.id);
                ServerMessage::ArticleSaved {
                    article: article.into(),
                }
            }
            Err(e) => {
                error!("Failed to save the rewritten text: {}", e);
                ServerMessage::error(e.user_message())
            }
        },
    };
    send(sender, &reply).await
}
