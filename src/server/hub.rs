use std::collections::HashMap;

use axum::extract::ws::Message;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Hub-side handle to one connected session's outbound queue.
///
/// The hub holds the only sender for the queue; removing the handle from
/// the registry drops the sender, which is what "closing the queue" means.
/// That makes the close happen exactly once, on the hub's own task.
#[derive(Debug)]
pub struct SessionHandle {
    id: Uuid,
    client_id: String,
    sender: mpsc::Sender<Message>,
}

impl SessionHandle {
    pub fn new(id: Uuid, client_id: impl Into<String>, sender: mpsc::Sender<Message>) -> Self {
        Self {
            id,
            client_id: client_id.into(),
            sender,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

/// Commands consumed by the hub's control loop, strictly one at a time.
#[derive(Debug)]
pub enum HubCommand {
    Register(SessionHandle),
    Unregister(Uuid),
    Broadcast(String),
    SessionCount(oneshot::Sender<usize>),
}

/// Cloneable entry point for submitting commands to the hub.
#[derive(Debug, Clone)]
pub struct HubHandle {
    commands: mpsc::UnboundedSender<HubCommand>,
}

impl HubHandle {
    /// Adds a session to the live set. Registration always succeeds.
    pub fn register(&self, session: SessionHandle) {
        let _ = self.commands.send(HubCommand::Register(session));
    }

    /// Removes a session and closes its outbound queue. A no-op if the
    /// session is already gone, so the read and write loops can both
    /// report the same disconnect.
    pub fn unregister(&self, id: Uuid) {
        let _ = self.commands.send(HubCommand::Unregister(id));
    }

    /// Queues a payload for delivery to every live session.
    pub fn broadcast(&self, payload: String) {
        let _ = self.commands.send(HubCommand::Broadcast(payload));
    }

    /// Number of live sessions. The query rides the command channel, so
    /// the answer reflects every command submitted before it.
    pub async fn session_count(&self) -> usize {
        let (reply, answer) = oneshot::channel();
        if self.commands.send(HubCommand::SessionCount(reply)).is_err() {
            return 0;
        }
        answer.await.unwrap_or(0)
    }
}

/// The session registry. All mutations happen on the single task driving
/// [`Hub::run`], which gives register/unregister/broadcast a total order
/// without any locking.
pub struct Hub {
    commands: mpsc::UnboundedReceiver<HubCommand>,
    sessions: HashMap<Uuid, SessionHandle>,
}

impl Hub {
    pub fn new() -> (Self, HubHandle) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let hub = Hub {
            commands: receiver,
            sessions: HashMap::new(),
        };
        (hub, HubHandle { commands: sender })
    }

    /// Control loop. Runs until every [`HubHandle`] has been dropped; in
    /// the server binary that is the lifetime of the process. Per-session
    /// failures are handled by eviction and never stop the loop.
    pub async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            self.handle(command);
        }
        debug!("hub control loop stopped");
    }

    fn handle(&mut self, command: HubCommand) {
        match command {
            HubCommand::Register(session) => {
                info!(
                    client_id = %session.client_id,
                    session_id = %session.id,
                    total = self.sessions.len() + 1,
                    "session connected"
                );
                self.sessions.insert(session.id, session);
            }
            HubCommand::Unregister(id) => {
                if let Some(session) = self.sessions.remove(&id) {
                    info!(
                        client_id = %session.client_id,
                        total = self.sessions.len(),
                        "session disconnected"
                    );
                }
            }
            HubCommand::Broadcast(payload) => self.broadcast(payload),
            HubCommand::SessionCount(reply) => {
                let _ = reply.send(self.sessions.len());
            }
        }
    }

    /// Fire-and-forget sweep over the live set. A session whose queue is
    /// full gets evicted instead of blocking the broadcaster; it has to
    /// reconnect to resume receiving events.
    fn broadcast(&mut self, payload: String) {
        let mut evicted = Vec::new();
        for (id, session) in &self.sessions {
            match session.sender.try_send(Message::Text(payload.clone())) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(
                        client_id = %session.client_id,
                        "outbound queue full, evicting slow session"
                    );
                    evicted.push(*id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    evicted.push(*id);
                }
            }
        }
        for id in evicted {
            self.sessions.remove(&id);
        }
    }
}
