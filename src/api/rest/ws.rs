use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::auth::AuthUser;
use crate::engine::lifecycle;
use crate::models::event::ParcelEvent;
use crate::models::user::Actor;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilter {
    /// Only stream events for this parcel when set.
    pub tracking_id: Option<String>,
}

pub async fn ws_handler(
    AuthUser(actor): AuthUser,
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(filter): Query<EventFilter>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state, actor, filter))
}

/// Events reach a subscriber only for parcels its listing would include.
fn is_visible(state: &AppState, actor: &Actor, filter: &EventFilter, event: &ParcelEvent) -> bool {
    if let Some(tracking_id) = &filter.tracking_id {
        if &event.tracking_id != tracking_id {
            return false;
        }
    }

    state
        .parcels
        .get(&event.parcel_id)
        .is_some_and(|parcel| lifecycle::can_view(actor, &parcel))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, actor: Actor, filter: EventFilter) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.parcel_events_tx.subscribe();

    info!(user_id = %actor.id, tracking_id = ?filter.tracking_id, "websocket client connected");

    let mut send_task = tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "websocket client lagging, events dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            if !is_visible(&state, &actor, &filter, &event) {
                continue;
            }

            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize parcel event for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!("websocket client disconnected");
}
