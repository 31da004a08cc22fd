// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The host-facing sync client.
//!
//! [`SyncClient`] is a cheap, cloneable handle. Creating one spawns a single
//! driver task that owns the [`Machine`], the transport and both timers;
//! handle methods only enqueue commands for it. The driver stops once every
//! `SyncClient` is dropped. Handlers that call back into the client should
//! capture a [`WeakSyncClient`] so they do not keep it running.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::Duration;

use cairn_core::{ClientMessage, SyncEvent, SyncEventType};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::dispatcher::{Dispatcher, HandlerId, Notification, Signal};
use crate::error::{ConnectError, Fault, SyncError, SyncResult};
use crate::machine::{Action, ConnectionState, Input, Machine, Metrics};
use crate::transport::{
    BoxFuture, Connector, Transport, TransportError, TransportResult, WebSocketConnector,
};

/// Requests from handles to the driver.
enum Command {
    Connect(oneshot::Sender<Result<(), ConnectError>>),
    Disconnect,
    Publish(SyncEvent),
    Subscribe {
        event_types: Vec<SyncEventType>,
        project: Option<String>,
    },
    Unsubscribe {
        event_types: Vec<SyncEventType>,
    },
    Flush(oneshot::Sender<()>),
}

/// State visible to handles without a round trip to the driver.
#[derive(Debug, Default)]
struct Shared {
    state: ConnectionState,
    metrics: Metrics,
}

/// Client for a reasoning-event relay.
///
/// ```no_run
/// # async fn demo() -> cairn::SyncResult<()> {
/// use cairn::{ClientConfig, SyncClient, SyncEventType};
///
/// let config = ClientConfig::new("ws://localhost:43216", "alice", "alice-laptop");
/// let client = SyncClient::new(config)?;
/// client.on_event(|event| println!("{}: {}", event.user(), event.title()));
/// client.connect().await?;
/// client.subscribe(SyncEventType::ALL.to_vec(), None)?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SyncClient {
    commands: mpsc::UnboundedSender<Command>,
    shared: Arc<RwLock<Shared>>,
    dispatcher: Arc<Dispatcher>,
    config: Arc<ClientConfig>,
}

impl std::fmt::Debug for SyncClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncClient")
            .field("url", &self.config.url)
            .field("state", &self.state())
            .finish()
    }
}

impl SyncClient {
    /// Creates a client that connects over WebSocket.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: ClientConfig) -> SyncResult<Self> {
        let connector = Arc::new(WebSocketConnector::new(config.clone()));
        Self::with_connector(config, connector)
    }

    /// Creates a client that opens transports through `connector`.
    pub fn with_connector(config: ClientConfig, connector: Arc<dyn Connector>) -> SyncResult<Self> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SyncError::Runtime(e.to_string()))?;

        let (commands, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(RwLock::new(Shared::default()));
        let dispatcher = Arc::new(Dispatcher::new());

        let driver = Driver {
            keepalive_interval: config.keepalive_interval(),
            send_timeout: config.send_timeout(),
            machine: Machine::new(config.clone()),
            connector,
            dispatcher: Arc::clone(&dispatcher),
            shared: Arc::clone(&shared),
            commands: rx,
            opening: None,
            transport: None,
            keepalive: None,
            reconnect: None,
            waiters: Vec::new(),
        };
        runtime.spawn(driver.run());

        Ok(SyncClient {
            commands,
            shared,
            dispatcher,
            config: Arc::new(config),
        })
    }

    /// Get the config this client was created with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns a handle that does not keep the driver alive.
    pub fn downgrade(&self) -> WeakSyncClient {
        WeakSyncClient {
            commands: self.commands.downgrade(),
            shared: Arc::downgrade(&self.shared),
            dispatcher: Arc::downgrade(&self.dispatcher),
            config: Arc::downgrade(&self.config),
        }
    }

    /// Opens the connection and waits for the outcome.
    ///
    /// Resolves `Ok(())` immediately if already connected or connecting,
    /// without opening a second transport.
    pub async fn connect(&self) -> SyncResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Connect(tx))?;
        rx.await.map_err(|_| SyncError::Closed)??;
        Ok(())
    }

    /// Closes the connection and suppresses auto-reconnect.
    ///
    /// Takes effect once the driver processes it; await [`SyncClient::flush`]
    /// to observe the resulting state.
    pub fn disconnect(&self) -> SyncResult<()> {
        self.send(Command::Disconnect)
    }

    /// True while the state is `Connected`.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Get the current connection state.
    pub fn state(&self) -> ConnectionState {
        self.read().state
    }

    /// A copy of the current counters.
    pub fn metrics(&self) -> Metrics {
        self.read().metrics.clone()
    }

    /// Publishes an event. Dropped with a warning if not connected.
    pub fn publish(&self, event: SyncEvent) -> SyncResult<()> {
        self.send(Command::Publish(event))
    }

    /// Asks the relay for events of the given types, optionally scoped to a
    /// project. Subscriptions are additive.
    pub fn subscribe(
        &self,
        event_types: Vec<SyncEventType>,
        project: Option<String>,
    ) -> SyncResult<()> {
        self.send(Command::Subscribe {
            event_types,
            project,
        })
    }

    /// Stops relay delivery of the given types.
    pub fn unsubscribe(&self, event_types: Vec<SyncEventType>) -> SyncResult<()> {
        self.send(Command::Unsubscribe { event_types })
    }

    /// Waits until every command sent before this call has been processed.
    pub async fn flush(&self) -> SyncResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Flush(tx))?;
        rx.await.map_err(|_| SyncError::Closed)
    }

    /// Registers a handler for `signal`.
    pub fn on<F>(&self, signal: Signal, handler: F) -> HandlerId
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.dispatcher.on(signal, Arc::new(handler))
    }

    /// Removes a handler registered with [`SyncClient::on`] or one of the
    /// typed variants.
    pub fn off(&self, signal: Signal, id: HandlerId) -> bool {
        self.dispatcher.off(signal, id)
    }

    /// Registers a handler for received events.
    pub fn on_event<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        self.on(Signal::Event, move |notification| {
            if let Notification::Event(event) = notification {
                handler(event);
            }
        })
    }

    /// Registers a handler for runtime faults.
    pub fn on_error<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&Fault) + Send + Sync + 'static,
    {
        self.on(Signal::Error, move |notification| {
            if let Notification::Error(fault) = notification {
                handler(fault);
            }
        })
    }

    /// Registers a handler for state transitions.
    pub fn on_state_change<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(ConnectionState) + Send + Sync + 'static,
    {
        self.on(Signal::StateChange, move |notification| {
            if let Notification::StateChange(state) = notification {
                handler(*state);
            }
        })
    }

    fn send(&self, command: Command) -> SyncResult<()> {
        self.commands.send(command).map_err(|_| SyncError::Closed)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Shared> {
        self.shared.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A [`SyncClient`] that does not keep the driver alive.
///
/// Obtained from [`SyncClient::downgrade`].
#[derive(Clone)]
pub struct WeakSyncClient {
    commands: mpsc::WeakUnboundedSender<Command>,
    shared: Weak<RwLock<Shared>>,
    dispatcher: Weak<Dispatcher>,
    config: Weak<ClientConfig>,
}

impl WeakSyncClient {
    /// Returns a strong handle, or `None` once every `SyncClient` is gone.
    pub fn upgrade(&self) -> Option<SyncClient> {
        Some(SyncClient {
            commands: self.commands.upgrade()?,
            shared: self.shared.upgrade()?,
            dispatcher: self.dispatcher.upgrade()?,
            config: self.config.upgrade()?,
        })
    }
}

impl std::fmt::Debug for WeakSyncClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakSyncClient").finish_non_exhaustive()
    }
}

/// What woke the driver.
enum Wake {
    Command(Option<Command>),
    Opened(TransportResult<Box<dyn Transport>>),
    Frame(TransportResult<Option<String>>),
    KeepaliveTick,
    ReconnectDue,
}

/// Owns all mutable client state. Runs until every handle is dropped.
struct Driver {
    machine: Machine,
    connector: Arc<dyn Connector>,
    dispatcher: Arc<Dispatcher>,
    shared: Arc<RwLock<Shared>>,
    commands: mpsc::UnboundedReceiver<Command>,
    opening: Option<BoxFuture<'static, TransportResult<Box<dyn Transport>>>>,
    transport: Option<Box<dyn Transport>>,
    keepalive_interval: Option<Duration>,
    /// Bound on each transport write and close.
    send_timeout: Duration,
    keepalive: Option<Interval>,
    reconnect: Option<Pin<Box<Sleep>>>,
    waiters: Vec<oneshot::Sender<Result<(), ConnectError>>>,
}

impl Driver {
    async fn run(mut self) {
        loop {
            let wake = tokio::select! {
                command = self.commands.recv() => Wake::Command(command),
                result = settle(&mut self.opening) => Wake::Opened(result),
                frame = recv(&mut self.transport) => Wake::Frame(frame),
                _ = next_tick(&mut self.keepalive) => Wake::KeepaliveTick,
                _ = expire(&mut self.reconnect) => Wake::ReconnectDue,
            };

            match wake {
                Wake::Command(None) => break,
                Wake::Command(Some(command)) => self.command(command).await,
                Wake::Opened(Ok(transport)) => {
                    self.transport = Some(transport);
                    self.apply(Input::Opened).await;
                }
                Wake::Opened(Err(e)) => self.apply(Input::OpenFailed(e.to_string())).await,
                Wake::Frame(Ok(Some(text))) => self.apply(Input::Frame(text)).await,
                Wake::Frame(Ok(None)) => {
                    self.transport = None;
                    self.apply(Input::Closed("closed by relay".to_string())).await;
                }
                Wake::Frame(Err(e)) => {
                    self.transport = None;
                    self.apply(Input::Closed(e.to_string())).await;
                }
                Wake::KeepaliveTick => self.apply(Input::KeepaliveTick).await,
                Wake::ReconnectDue => {
                    self.reconnect = None;
                    self.apply(Input::ReconnectDue).await;
                }
            }
        }

        debug!("all client handles dropped, stopping driver");
        self.close_transport().await;
    }

    async fn command(&mut self, command: Command) {
        match command {
            Command::Connect(reply) => {
                self.waiters.push(reply);
                self.apply(Input::Connect).await;
            }
            Command::Disconnect => self.apply(Input::Disconnect).await,
            Command::Publish(event) => self.apply(Input::Publish(event)).await,
            Command::Subscribe {
                event_types,
                project,
            } => {
                self.apply(Input::Subscribe {
                    event_types,
                    project,
                })
                .await
            }
            Command::Unsubscribe { event_types } => {
                self.apply(Input::Unsubscribe { event_types }).await
            }
            Command::Flush(reply) => {
                let _ = reply.send(());
            }
        }
    }

    /// Feeds `input` to the machine and carries out the resulting actions.
    async fn apply(&mut self, input: Input) {
        let mut queue: VecDeque<Action> = self.machine.handle(input, Instant::now()).into();
        self.sync_shared();

        while let Some(action) = queue.pop_front() {
            match action {
                Action::Open => self.opening = Some(self.connector.connect()),
                Action::AbortOpen => self.opening = None,
                Action::Close => self.close_transport().await,
                Action::Send(msg) => {
                    let json = match msg.to_json() {
                        Ok(json) => json,
                        Err(e) => {
                            warn!("failed to encode {}: {}", msg.kind(), e);
                            continue;
                        }
                    };
                    let Some(transport) = self.transport.as_mut() else {
                        continue;
                    };
                    let sent = tokio::time::timeout(self.send_timeout, transport.send(json))
                        .await
                        .unwrap_or_else(|_| Err(TransportError::SendTimeout(self.send_timeout)));
                    match sent {
                        Ok(()) => {
                            if matches!(msg, ClientMessage::Publish { .. }) {
                                self.machine.note_published();
                                self.sync_shared();
                            }
                        }
                        Err(e) => {
                            self.close_transport().await;
                            let followup = self
                                .machine
                                .handle(Input::Closed(e.to_string()), Instant::now());
                            self.sync_shared();
                            queue.extend(followup);
                        }
                    }
                }
                Action::StartKeepalive => {
                    if let Some(period) = self.keepalive_interval {
                        let mut interval =
                            tokio::time::interval_at(Instant::now() + period, period);
                        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                        self.keepalive = Some(interval);
                    }
                }
                Action::StopKeepalive => self.keepalive = None,
                Action::ScheduleReconnect(delay) => {
                    self.reconnect = Some(Box::pin(tokio::time::sleep(delay)));
                }
                Action::CancelReconnect => self.reconnect = None,
                Action::Notify(notification) => self.dispatcher.emit(&notification),
                Action::ResolveConnect(result) => {
                    for waiter in self.waiters.drain(..) {
                        let _ = waiter.send(result.clone());
                    }
                }
                // The newest waiter belongs to the `Connect` being handled.
                Action::ReplyConnect(result) => {
                    if let Some(waiter) = self.waiters.pop() {
                        let _ = waiter.send(result);
                    }
                }
            }
        }
    }

    async fn close_transport(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if tokio::time::timeout(self.send_timeout, transport.close())
                .await
                .is_err()
            {
                debug!("transport close timed out after {:?}", self.send_timeout);
            }
        }
    }

    fn sync_shared(&self) {
        let mut shared = self.shared.write().unwrap_or_else(PoisonError::into_inner);
        shared.state = self.machine.state();
        shared.metrics = self.machine.metrics().clone();
    }
}

async fn settle(
    opening: &mut Option<BoxFuture<'static, TransportResult<Box<dyn Transport>>>>,
) -> TransportResult<Box<dyn Transport>> {
    match opening.as_mut() {
        Some(open) => {
            let result = open.await;
            *opening = None;
            result
        }
        None => std::future::pending().await,
    }
}

async fn recv(transport: &mut Option<Box<dyn Transport>>) -> TransportResult<Option<String>> {
    match transport.as_mut() {
        Some(transport) => transport.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_tick(keepalive: &mut Option<Interval>) {
    match keepalive.as_mut() {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn expire(reconnect: &mut Option<Pin<Box<Sleep>>>) {
    match reconnect.as_mut() {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
