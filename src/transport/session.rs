//! # Transport Session
//!
//! Actor that owns the one logical connection to the simulator.
//!
//! ## Lifecycle
//!
//! ```text
//! Disconnected ──(timer)──> Connecting ──(ok)──> Connected
//!      ^                        │                    │
//!      └────────(error)─────────┴──(close / error)───┘
//! ```
//!
//! Every failure schedules exactly one reconnect after
//! `reconnect_delay_ms`. Only [`SessionTask::shutdown`] stops the cycle.
//!
//! ## Ordering
//!
//! The task is the only consumer of its command channel and the only owner
//! of the socket and queue. Messages leave the queue strictly in the order
//! they were sent, and a message is removed only after the link accepted
//! it. Queued messages are not flushed on reconnect by themselves; the
//! next `send` or an explicit `flush` drains them.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::link::{Connector, FrameSink, FrameSource, Link};
use super::queue::OutboundQueue;
use super::reconnect::ReconnectTimer;
use crate::config::ServerConfig;
use crate::error::{Result, TeleopError};
use crate::protocol::codec;
use crate::protocol::messages::{CameraUpdate, ControlCommand, InboundMessage, OutboundMessage};

/// Inbound messages buffered per subscriber before it starts lagging.
const INBOUND_CAPACITY: usize = 16;

type ConnectFuture = Pin<Box<dyn Future<Output = Result<Link>> + Send>>;

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Requests from handles to the session task.
#[derive(Debug)]
pub(crate) enum SessionCommand {
    Send(OutboundMessage),
    Flush,
}

/// Cloneable front door to the session.
///
/// Sending never fails: while the session is disconnected messages are
/// queued, and after the session has stopped they are discarded.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    inbound: broadcast::Sender<InboundMessage>,
    state: watch::Receiver<ConnectionState>,
}

impl SessionHandle {
    /// Queue a message for delivery
    pub fn send(&self, message: OutboundMessage) {
        if self.commands.send(SessionCommand::Send(message)).is_err() {
            debug!("Session stopped, message discarded");
        }
    }

    /// Send absolute joint targets
    pub fn send_control(&self, joints: BTreeMap<String, f64>) {
        self.send(OutboundMessage::Control { data: joints });
    }

    /// Send a camera viewpoint change
    pub fn send_camera(&self, update: CameraUpdate) {
        self.send(update.into());
    }

    /// Send an end-effector command
    pub fn send_command(&self, command: ControlCommand) {
        self.send(command.into());
    }

    /// Drain queued messages if connected
    pub fn flush(&self) {
        if self.commands.send(SessionCommand::Flush).is_err() {
            debug!("Session stopped, flush ignored");
        }
    }

    /// Receiver for every inbound message parsed from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<InboundMessage> {
        self.inbound.subscribe()
    }

    #[must_use]
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// A handle wired to a bare channel instead of a session task.
    #[cfg(test)]
    pub(crate) fn detached() -> (Self, mpsc::UnboundedReceiver<SessionCommand>) {
        let (commands, receiver) = mpsc::unbounded_channel();
        let (inbound, _) = broadcast::channel(INBOUND_CAPACITY);
        let (_, state) = watch::channel(ConnectionState::Disconnected);
        (
            Self {
                commands,
                inbound,
                state,
            },
            receiver,
        )
    }
}

/// Outcome of the first connection attempt.
#[derive(Debug)]
pub struct InitialConnect {
    receiver: oneshot::Receiver<Result<()>>,
}

impl InitialConnect {
    /// Waits for the first attempt to finish.
    ///
    /// # Errors
    ///
    /// `InitialConnect` if the first attempt failed or the session stopped
    /// before it finished. Later reconnects are not reported here.
    pub async fn outcome(self) -> Result<()> {
        self.receiver.await.unwrap_or_else(|_| {
            Err(TeleopError::InitialConnect(
                "session stopped before connecting".to_string(),
            ))
        })
    }
}

/// Owner of the running session task.
#[derive(Debug)]
pub struct SessionTask {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SessionTask {
    /// Cancels any pending reconnect, closes the socket and waits for the
    /// task to exit. Nothing is broadcast afterwards. Safe to call more
    /// than once.
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Session task ended abnormally: {}", e);
            }
            info!("Transport session stopped");
        }
    }
}

impl Drop for SessionTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Session state owned by the task.
pub struct TransportSession<C: Connector> {
    connector: Arc<C>,
    reconnect_delay: Duration,
    queue: OutboundQueue,
    reconnect: ReconnectTimer,
    connecting: Option<ConnectFuture>,
    sink: Option<Box<dyn FrameSink>>,
    source: Option<Box<dyn FrameSource>>,
    inbound: broadcast::Sender<InboundMessage>,
    state: watch::Sender<ConnectionState>,
    initial: Option<oneshot::Sender<Result<()>>>,
}

impl<C: Connector + 'static> TransportSession<C> {
    /// Starts the session task and its first connection attempt.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use arm_teleop::config::ServerConfig;
    /// use arm_teleop::transport::{TransportSession, WsConnector};
    ///
    /// # async fn run() -> arm_teleop::error::Result<()> {
    /// let config = ServerConfig::default();
    /// let connector = WsConnector::new(config.url()).with_connect_timeout(config.connect_timeout());
    /// let (handle, mut task, initial) = TransportSession::spawn(&config, connector);
    ///
    /// initial.outcome().await?;
    /// handle.flush();
    /// task.shutdown().await;
    /// # Ok(())
    /// # }
    /// ```
    pub fn spawn(config: &ServerConfig, connector: C) -> (SessionHandle, SessionTask, InitialConnect) {
        let (commands, receiver) = mpsc::unbounded_channel();
        let (inbound, _) = broadcast::channel(INBOUND_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (initial_tx, initial_rx) = oneshot::channel();
        let cancel = CancellationToken::new();

        let session = Self {
            connector: Arc::new(connector),
            reconnect_delay: config.reconnect_delay(),
            queue: OutboundQueue::new(config.max_queued_messages),
            reconnect: ReconnectTimer::new(),
            connecting: None,
            sink: None,
            source: None,
            inbound: inbound.clone(),
            state: state_tx,
            initial: Some(initial_tx),
        };

        info!("Starting transport session for {}", config.url());
        let task = tokio::spawn(session.run(receiver, cancel.clone()));

        let handle = SessionHandle {
            commands,
            inbound,
            state: state_rx,
        };
        let task = SessionTask {
            cancel,
            task: Some(task),
        };
        let initial = InitialConnect {
            receiver: initial_rx,
        };
        (handle, task, initial)
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
        cancel: CancellationToken,
    ) {
        self.begin_connect();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = pending_connect(&mut self.connecting) => {
                    self.connecting = None;
                    self.on_connect_result(result);
                }
                _ = self.reconnect.expired(), if self.reconnect.is_armed() => {
                    self.begin_connect();
                }
                frame = next_frame(&mut self.source) => {
                    self.on_frame(frame).await;
                }
                command = commands.recv() => match command {
                    Some(command) => self.on_command(command).await,
                    None => {
                        info!("All session handles dropped");
                        break;
                    }
                },
            }
        }

        self.close().await;
    }

    fn begin_connect(&mut self) {
        debug!("Opening connection");
        self.state.send_replace(ConnectionState::Connecting);
        let connector = Arc::clone(&self.connector);
        self.connecting = Some(Box::pin(async move { connector.connect().await }));
    }

    fn on_connect_result(&mut self, result: Result<Link>) {
        match result {
            Ok((sink, source)) => {
                info!("Connected to simulator");
                self.sink = Some(sink);
                self.source = Some(source);
                self.state.send_replace(ConnectionState::Connected);
                self.resolve_initial(Ok(()));
            }
            Err(e) => {
                warn!("Connection failed: {}", e);
                self.resolve_initial(Err(TeleopError::InitialConnect(e.to_string())));
                self.enter_disconnected();
            }
        }
    }

    async fn on_frame(&mut self, frame: Option<Result<String>>) {
        match frame {
            Some(Ok(text)) => match codec::decode(&text) {
                Ok(message) => {
                    // No subscribers is not an error
                    let _ = self.inbound.send(message);
                }
                Err(e) => warn!("Dropping malformed inbound message: {}", e),
            },
            Some(Err(e)) => {
                warn!("Connection error: {}", e);
                self.drop_link().await;
            }
            None => {
                info!("Connection closed by simulator");
                self.drop_link().await;
            }
        }
    }

    async fn on_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Send(message) => {
                self.queue.push(message);
                if self.sink.is_some() {
                    self.drain().await;
                } else {
                    debug!("Not connected, {} message(s) queued", self.queue.len());
                }
            }
            SessionCommand::Flush => {
                if self.sink.is_some() {
                    self.drain().await;
                }
            }
        }
    }

    /// Sends queued messages in order until the queue is empty or a send
    /// fails. A failed message stays at the front.
    async fn drain(&mut self) {
        while let Some(message) = self.queue.front() {
            let text = match codec::encode(message) {
                Ok(text) => text,
                Err(e) => {
                    error!("Discarding unencodable message: {}", e);
                    self.queue.pop_front();
                    continue;
                }
            };

            let Some(sink) = self.sink.as_mut() else {
                return;
            };
            match sink.send_text(text).await {
                Ok(()) => {
                    self.queue.pop_front();
                }
                Err(e) => {
                    warn!("Send failed, {} message(s) kept: {}", self.queue.len(), e);
                    self.drop_link().await;
                    return;
                }
            }
        }
    }

    async fn drop_link(&mut self) {
        self.source = None;
        if let Some(mut sink) = self.sink.take() {
            if let Err(e) = sink.close().await {
                debug!("Close after failure: {}", e);
            }
        }
        self.enter_disconnected();
    }

    fn enter_disconnected(&mut self) {
        self.state.send_replace(ConnectionState::Disconnected);
        self.reconnect.schedule(self.reconnect_delay);
        debug!("Reconnecting in {:?}", self.reconnect_delay);
    }

    fn resolve_initial(&mut self, outcome: Result<()>) {
        if let Some(initial) = self.initial.take() {
            let _ = initial.send(outcome);
        }
    }

    async fn close(&mut self) {
        self.reconnect.cancel();
        self.connecting = None;
        self.source = None;
        if let Some(mut sink) = self.sink.take() {
            if let Err(e) = sink.close().await {
                debug!("Close failed: {}", e);
            }
        }
        if !self.queue.is_empty() {
            info!("Discarding {} unsent message(s)", self.queue.len());
        }
        self.state.send_replace(ConnectionState::Disconnected);
    }
}

async fn pending_connect(connecting: &mut Option<ConnectFuture>) -> Result<Link> {
    match connecting {
        Some(future) => future.await,
        None => std::future::pending().await,
    }
}

async fn next_frame(source: &mut Option<Box<dyn FrameSource>>) -> Option<Result<String>> {
    match source {
        Some(source) => source.next_text().await,
        None => std::future::pending().await,
    }
}
