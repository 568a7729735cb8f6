use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::sse::{Handshake, ServerEvent},
    services::session_controller::SessionController,
};

const EVENT_HANDSHAKE: &str = "handshake";

/// Subscribe to the UI stream of `controller`, greeting the new client first.
pub fn subscribe(controller: &SessionController) -> broadcast::Receiver<ServerEvent> {
    let receiver = controller.subscribe_ui();
    let handshake = Handshake {
        peer_id: controller.peer_id(),
        message: "connected to peer UI stream".into(),
    };
    match ServerEvent::json(Some(EVENT_HANDSHAKE.to_string()), &handshake) {
        Ok(event) => controller.session().ui().broadcast(event),
        Err(err) => warn!(error = %err, "failed to serialize handshake"),
    }
    receiver
}

/// Convert a broadcast receiver into an SSE response, forwarding events and
/// cleaning up once the client disconnects.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    peer_id: Uuid,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            let mut event = Event::default().data(payload.data);
                            if let Some(name) = payload.event {
                                event = event.event(name);
                            }

                            if tx.send(Ok(event)).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(peer = %peer_id, skipped, "UI stream lagged");
                            continue;
                        }
                    }
                }
            }
        }
        info!(peer = %peer_id, "UI stream disconnected");
    });

    // axum drops this stream when the client goes away
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
