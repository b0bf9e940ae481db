use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::command::Channel;
use crate::connection::{self, ConnectionStatus, Inbound, Port, SessionConfig};
use crate::correlator::Continuation;
use crate::error::MixBoardError;
use crate::session::{Action, Session, SessionEvent, Snapshot};

const MESSAGE_CAPACITY: usize = 32;
const INBOUND_CAPACITY: usize = 256;

/// Messages understood by the session actor
#[derive(Debug)]
pub enum SessionMessage {
    /// Open both channels, replacing any existing connections
    Connect {
        respond_to: oneshot::Sender<Result<(), MixBoardError>>,
    },
    Send {
        command: String,
        reply: Option<oneshot::Sender<String>>,
        respond_to: oneshot::Sender<Result<(), MixBoardError>>,
    },
    Perform {
        action: Action,
        respond_to: oneshot::Sender<Result<(), MixBoardError>>,
    },
    Snapshot {
        respond_to: oneshot::Sender<Snapshot>,
    },
    Shutdown {
        respond_to: oneshot::Sender<()>,
    },
}

/// Handle to communicate with a session actor
#[derive(Clone)]
pub struct SessionHandle {
    sender: mpsc::Sender<SessionMessage>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    /// Start an idle session actor. Call [`connect`](Self::connect) to open
    /// the device channels. Must be called inside a tokio runtime.
    pub fn spawn(config: SessionConfig) -> Self {
        let (sender, receiver) = mpsc::channel(MESSAGE_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
        let session = Session::new(config.channel);
        let events = session.event_sender();

        let actor = SessionActor {
            config,
            session,
            receiver,
            inbound_tx,
            inbound_rx,
            generation: 0,
            command: None,
            event: None,
        };
        tokio::spawn(actor.run());

        Self { sender, events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Connect both channels. Fails only if the command channel cannot be
    /// opened; an unreachable event channel is reported as a status event.
    pub async fn connect(&self) -> Result<(), MixBoardError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SessionMessage::Connect { respond_to: tx })
            .await
            .map_err(|_| MixBoardError::ActorGone)?;
        rx.await.map_err(|_| MixBoardError::ActorGone)?
    }

    /// Drop both connections and open fresh ones. Pending replies fail with
    /// [`MixBoardError::Abandoned`].
    pub async fn reconnect(&self) -> Result<(), MixBoardError> {
        self.connect().await
    }

    /// Fire-and-forget command
    pub async fn send(&self, command: impl Into<String>) -> Result<(), MixBoardError> {
        self.submit(command.into(), None).await
    }

    /// Send a command and wait for its response line
    pub async fn request(&self, command: impl Into<String>) -> Result<String, MixBoardError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.submit(command.into(), Some(reply_tx)).await?;
        reply_rx.await.map_err(|_| MixBoardError::Abandoned)
    }

    async fn submit(
        &self,
        command: String,
        reply: Option<oneshot::Sender<String>>,
    ) -> Result<(), MixBoardError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SessionMessage::Send {
                command,
                reply,
                respond_to: tx,
            })
            .await
            .map_err(|_| MixBoardError::ActorGone)?;
        rx.await.map_err(|_| MixBoardError::ActorGone)?
    }

    pub async fn perform(&self, action: Action) -> Result<(), MixBoardError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SessionMessage::Perform {
                action,
                respond_to: tx,
            })
            .await
            .map_err(|_| MixBoardError::ActorGone)?;
        rx.await.map_err(|_| MixBoardError::ActorGone)?
    }

    pub async fn select_channel(&self, channel: Channel) -> Result<(), MixBoardError> {
        self.perform(Action::SelectChannel(channel)).await
    }

    pub async fn snapshot(&self) -> Result<Snapshot, MixBoardError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SessionMessage::Snapshot { respond_to: tx })
            .await
            .map_err(|_| MixBoardError::ActorGone)?;
        rx.await.map_err(|_| MixBoardError::ActorGone)
    }

    pub async fn current_channel(&self) -> Result<Channel, MixBoardError> {
        Ok(self.snapshot().await?.channel)
    }

    /// Close both connections and stop the actor
    pub async fn shutdown(&self) -> Result<(), MixBoardError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SessionMessage::Shutdown { respond_to: tx })
            .await
            .map_err(|_| MixBoardError::ActorGone)?;
        rx.await.map_err(|_| MixBoardError::ActorGone)
    }
}

/// One open channel. The write half is held even on the event channel;
/// dropping it would half-close the socket.
struct Link {
    writer: OwnedWriteHalf,
    reader: JoinHandle<()>,
}

impl Drop for Link {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

struct SessionActor {
    config: SessionConfig,
    session: Session,
    receiver: mpsc::Receiver<SessionMessage>,
    inbound_tx: mpsc::Sender<Inbound>,
    inbound_rx: mpsc::Receiver<Inbound>,
    /// Bumped on every connect; inbound traffic tagged with an older value
    /// belongs to a replaced connection
    generation: u64,
    command: Option<Link>,
    event: Option<Link>,
}

impl SessionActor {
    async fn run(mut self) {
        debug!("Session actor started");

        loop {
            tokio::select! {
                message = self.receiver.recv() => {
                    let Some(message) = message else {
                        debug!("All session handles dropped");
                        break;
                    };
                    if !self.handle_message(message).await {
                        break;
                    }
                }
                Some(inbound) = self.inbound_rx.recv() => {
                    self.handle_inbound(inbound).await;
                }
            }
        }

        self.teardown();
        debug!("Session actor stopped");
    }

    /// Returns false when the actor should stop
    async fn handle_message(&mut self, message: SessionMessage) -> bool {
        match message {
            SessionMessage::Connect { respond_to } => {
                let result = self.connect().await;
                let _ = respond_to.send(result);
            }
            SessionMessage::Send {
                command,
                reply,
                respond_to,
            } => {
                let result = self
                    .session
                    .send_command(&command, reply.map(Continuation::Reply));
                self.flush().await;
                let _ = respond_to.send(result);
            }
            SessionMessage::Perform { action, respond_to } => {
                let result = self.session.perform(action);
                self.flush().await;
                let _ = respond_to.send(result);
            }
            SessionMessage::Snapshot { respond_to } => {
                let _ = respond_to.send(self.session.snapshot());
            }
            SessionMessage::Shutdown { respond_to } => {
                info!("Shutting down MixBoard session");
                self.teardown();
                let _ = respond_to.send(());
                return false;
            }
        }
        true
    }

    async fn connect(&mut self) -> Result<(), MixBoardError> {
        self.teardown();
        self.generation += 1;
        let generation = self.generation;

        self.session
            .notify_connection(Port::Command, ConnectionStatus::Connecting);
        self.session
            .notify_connection(Port::Event, ConnectionStatus::Connecting);

        let (command, event) = tokio::join!(
            connection::open(&self.config, Port::Command),
            connection::open(&self.config, Port::Event),
        );

        match event {
            Ok((reader, writer)) => {
                self.event = Some(self.link(Port::Event, generation, reader, writer));
                self.session
                    .notify_connection(Port::Event, ConnectionStatus::Ok);
            }
            Err(e) => {
                warn!("Event channel unavailable: {}", e);
                self.session
                    .notify_connection(Port::Event, ConnectionStatus::Failed(e.to_string()));
            }
        }

        match command {
            Ok((reader, writer)) => {
                self.command = Some(self.link(Port::Command, generation, reader, writer));
                self.session.set_command_ready(true);
                self.session
                    .notify_connection(Port::Command, ConnectionStatus::Ok);
                info!("Connected to MixBoard at {}", self.config.host);

                let tx = self.inbound_tx.clone();
                let delay = self.config.initial_query_delay;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(Inbound::InitialQueries { generation }).await;
                });
                Ok(())
            }
            Err(e) => {
                warn!("Command channel unavailable: {}", e);
                self.session
                    .notify_connection(Port::Command, ConnectionStatus::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    fn link(
        &self,
        port: Port,
        generation: u64,
        reader: tokio::net::tcp::OwnedReadHalf,
        writer: OwnedWriteHalf,
    ) -> Link {
        let reader = tokio::spawn(connection::read_loop(
            port,
            generation,
            reader,
            self.inbound_tx.clone(),
        ));
        Link { writer, reader }
    }

    async fn handle_inbound(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Data {
                port,
                generation,
                data,
            } => {
                if generation != self.generation {
                    return;
                }
                if self.config.protocol_log {
                    debug!(
                        target: "mixboard::protocol",
                        %port,
                        "{}",
                        String::from_utf8_lossy(&data).trim_end()
                    );
                }
                self.session.receive(port, &data);
                self.flush().await;
            }
            Inbound::Closed {
                port,
                generation,
                error,
            } => {
                if generation != self.generation {
                    return;
                }
                self.lost(port, error);
            }
            Inbound::InitialQueries { generation } => {
                if generation != self.generation || !self.session.is_command_ready() {
                    return;
                }
                self.session.refresh_input_list();
                self.session.refresh_mix_state();
                self.flush().await;
            }
        }
    }

    /// Write queued commands to the command channel
    async fn flush(&mut self) {
        let frames = self.session.take_outbox();
        if frames.is_empty() {
            return;
        }
        let Some(link) = self.command.as_mut() else {
            return;
        };

        let mut failure = None;
        for frame in &frames {
            if let Err(e) = link.writer.write_all(frame.as_bytes()).await {
                failure = Some(e);
                break;
            }
        }

        if let Some(e) = failure {
            warn!("Write to command channel failed: {}", e);
            self.lost(Port::Command, Some(e.to_string()));
        }
    }

    /// A channel broke or was closed by the device
    fn lost(&mut self, port: Port, error: Option<String>) {
        match port {
            Port::Command => {
                self.command = None;
                self.session.set_command_ready(false);
                self.session.abandon_pending();
            }
            Port::Event => {
                self.event = None;
            }
        }
        self.session.reset_framing(port);
        self.session
            .notify_connection(port, ConnectionStatus::Disconnected(error));
    }

    fn teardown(&mut self) {
        if self.command.take().is_some() {
            self.session
                .notify_connection(Port::Command, ConnectionStatus::Disconnected(None));
        }
        if self.event.take().is_some() {
            self.session
                .notify_connection(Port::Event, ConnectionStatus::Disconnected(None));
        }
        self.session.set_command_ready(false);
        self.session.abandon_pending();
        self.session.take_outbox();
        self.session.reset_framing(Port::Command);
        self.session.reset_framing(Port::Event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn commands_fail_before_connect() {
        let handle = SessionHandle::spawn(SessionConfig::default());
        let err = handle.send("UPDATEGUI").await.unwrap_err();
        assert!(matches!(err, MixBoardError::NotConnected));
        let err = handle.request("MBC_GETVERSION").await.unwrap_err();
        assert!(matches!(err, MixBoardError::NotConnected));

        let snapshot = handle.snapshot().await.unwrap();
        assert!(!snapshot.command_connected);
        assert_eq!(snapshot.pending, 0);
    }

    #[tokio::test]
    async fn local_actions_work_offline() {
        let config = SessionConfig {
            channel: Channel::Ch2,
            ..SessionConfig::default()
        };
        let handle = SessionHandle::spawn(config);
        assert_eq!(handle.current_channel().await.unwrap(), Channel::Ch2);
        handle.select_channel(Channel::Ch1).await.unwrap();
        assert_eq!(handle.current_channel().await.unwrap(), Channel::Ch1);
    }

    #[tokio::test]
    async fn refused_connection_is_reported() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = SessionConfig {
            port,
            event_port: port,
            initial_query_delay: Duration::from_millis(1),
            ..SessionConfig::default()
        };
        let handle = SessionHandle::spawn(config);
        let mut events = handle.subscribe();

        let err = handle.connect().await.unwrap_err();
        assert!(matches!(err, MixBoardError::Io { port: Port::Command, .. }));

        let mut failed = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let SessionEvent::Connection {
                port,
                status: ConnectionStatus::Failed(_),
            } = event
            {
                failed.push(port);
            }
        }
        failed.sort_by_key(|p| *p == Port::Event);
        assert_eq!(failed, vec![Port::Command, Port::Event]);
    }

    #[tokio::test]
    async fn handle_reports_stopped_actor() {
        let handle = SessionHandle::spawn(SessionConfig::default());
        handle.shutdown().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let err = handle.snapshot().await.unwrap_err();
        assert!(matches!(err, MixBoardError::ActorGone));
    }
}
