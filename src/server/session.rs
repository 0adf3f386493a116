use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::server::hub::{HubHandle, SessionHandle};

/// One physical connection's read/write adapters.
///
/// The session owns the transport exclusively; the hub owns the decision
/// of when the outbound queue closes. Each side is torn down by a message
/// (queue-closed sentinel, unregister command), never by a shared flag.
pub struct Session {
    id: Uuid,
    client_id: String,
    hub: HubHandle,
    queue_capacity: usize,
    ping_interval: Duration,
    pong_timeout: Duration,
}

impl Session {
    pub fn new(client_id: String, hub: HubHandle, config: &AppConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_id,
            hub,
            queue_capacity: config.send_queue_capacity,
            ping_interval: Duration::from_secs(config.ping_interval_secs),
            pong_timeout: Duration::from_secs(config.pong_timeout_secs),
        }
    }

    /// Registers with the hub and drives the connection until it closes.
    pub async fn run(self, socket: WebSocket) {
        let (outbound_tx, outbound_rx) = mpsc::channel(self.queue_capacity);
        self.hub.register(SessionHandle::new(
            self.id,
            self.client_id.clone(),
            outbound_tx,
        ));

        let (sink, stream) = socket.split();
        let writer = tokio::spawn(write_loop(sink, outbound_rx, self.ping_interval));

        self.read_loop(stream).await;
        self.hub.unregister(self.id);

        // Unregistering drops the queue sender, which lets the writer
        // close the transport and finish.
        let _ = writer.await;
    }

    /// Pulls inbound frames until the peer goes away. Inbound data is not
    /// interpreted; any frame, pongs included, counts as liveness.
    async fn read_loop(&self, mut stream: SplitStream<WebSocket>) {
        loop {
            match time::timeout(self.pong_timeout, stream.next()).await {
                Ok(Some(Ok(Message::Close(_)))) | Ok(None) => {
                    debug!(client_id = %self.client_id, "peer closed connection");
                    break;
                }
                Ok(Some(Ok(_))) => {}
                Ok(Some(Err(e))) => {
                    debug!(client_id = %self.client_id, error = %e, "read error");
                    break;
                }
                Err(_) => {
                    warn!(client_id = %self.client_id, "keepalive timeout, dropping session");
                    break;
                }
            }
        }
    }
}

/// Drains the outbound queue into the transport and sends periodic
/// keepalive pings. A closed queue is the sentinel for "the hub evicted
/// this session" (or the read side already reported the disconnect).
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Message>,
    ping_interval: Duration,
) {
    let mut ticker = time::interval_at(time::Instant::now() + ping_interval, ping_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            message = outbound.recv() => match message {
                Some(message) => {
                    if sink.send(message).await.is_err() {
                        break;
                    }
                }
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            _ = ticker.tick() => {
                if sink.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        }
    }
    let _ = sink.close().await;
}
