//! Server-sent events for the webapp.
//!
//! Each stream receives only the events published for its own user. A slow
//! stream that falls behind the hub skips the missed events.

use std::convert::Infallible;

use async_stream::stream;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use devops_relay_core::UserId;
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::chat::HostEvent;
use crate::middleware::RequireUser;
use crate::state::AppState;

fn user_events(
    mut receiver: broadcast::Receiver<HostEvent>,
    user_id: UserId,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream! {
        loop {
            match receiver.recv().await {
                Ok(event) if event.user_id == user_id => {
                    let data = serde_json::to_string(&event.data)
                        .unwrap_or_else(|_| "null".to_string());
                    yield Ok(Event::default().event(event.event).data(data));
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(user_id = %user_id, skipped, "Event stream lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}

/// `GET /events`
pub async fn stream(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.events().subscribe();
    Sse::new(user_events(receiver, user_id)).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::EventHub;
    use futures::StreamExt;

    fn event(name: &str, user: &str) -> HostEvent {
        HostEvent {
            event: name.to_string(),
            user_id: UserId::new(user),
            data: serde_json::json!({"user": user}),
        }
    }

    #[tokio::test]
    async fn test_stream_skips_other_users() {
        let hub = EventHub::default();
        let stream = user_events(hub.subscribe(), UserId::new("u1"));
        let mut stream = std::pin::pin!(stream);

        hub.publish(event("disconnect", "u2"));
        hub.publish(event("disconnect", "u1"));
        drop(hub);

        assert!(stream.next().await.is_some());
        assert!(stream.next().await.is_none());
    }
}
