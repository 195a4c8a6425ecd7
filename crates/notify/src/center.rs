use std::pin::Pin;
use std::sync::Arc;

use diary_models::{AdvisorId, NotificationId, NotificationPage};
use futures::StreamExt;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::FuturesUnordered;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tracing::{debug, info, warn};

use crate::api::{NotificationApi, NotificationBackend};
use crate::backoff::ReconnectPolicy;
use crate::error::{ClientError, ClientResult};
use crate::frame::{self, Frame};
use crate::health::{HealthProbe, HttpHealthProbe};
use crate::machine::{ConnectionMachine, ConnectionState, Effect};
use crate::session::Session;
use crate::store::NotificationStore;
use crate::transport::{SseTransport, Transport, TransportEvent, TransportStream};
use crate::view::{Banner, Indicator, LoadState, ViewState};

/// Foreground visibility of the host view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

enum Command {
    ForceReconnect,
    SetVisibility(Visibility),
    MarkRead(NotificationId, oneshot::Sender<ClientResult<()>>),
    DismissBanner,
    Unmount,
}

/// Live notification list for one advisor.
///
/// Owns its collaborators until [`mount`](Self::mount) moves them onto a
/// single event-loop task. Everything that mutates state (frames, timer
/// expiry, visibility changes, user commands) is handled on that task one at
/// a time.
pub struct NotificationCenter {
    advisor_id: Option<AdvisorId>,
    backend: Arc<dyn NotificationBackend>,
    transport: Arc<dyn Transport>,
    health: Arc<dyn HealthProbe>,
    policy: ReconnectPolicy,
}

impl NotificationCenter {
    /// Wires the HTTP collaborators for `session`.
    pub fn new(session: Session) -> Self {
        let policy = ReconnectPolicy::from(&session.settings().reconnect);
        Self {
            advisor_id: session.advisor_id,
            backend: Arc::new(NotificationApi::new(session.clone())),
            transport: Arc::new(SseTransport::new(session.clone())),
            health: Arc::new(HttpHealthProbe::new(session)),
            policy,
        }
    }

    /// Builds a center from explicit collaborators.
    pub fn with_parts(
        advisor_id: Option<AdvisorId>,
        backend: Arc<dyn NotificationBackend>,
        transport: Arc<dyn Transport>,
        health: Arc<dyn HealthProbe>,
        policy: ReconnectPolicy,
    ) -> Self {
        Self {
            advisor_id,
            backend,
            transport,
            health,
            policy,
        }
    }

    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Starts the event loop. Must be called within a tokio runtime.
    pub fn mount(self) -> CenterHandle {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(ViewState::default());

        let runtime = Runtime {
            advisor_id: self.advisor_id,
            backend: self.backend,
            transport: self.transport,
            health: self.health,
            machine: ConnectionMachine::new(self.policy),
            store: NotificationStore::new(),
            stream: None,
            reconnect: None,
            pending: FuturesUnordered::new(),
            probing: false,
            hydrating: false,
            banner: None,
            load: LoadState::Loading,
            visibility: Visibility::Visible,
            view_tx,
        };
        let task = tokio::spawn(runtime.run(command_rx));

        CenterHandle {
            commands: command_tx,
            view: view_rx,
            task: Some(task),
        }
    }
}

/// Control surface of a mounted center. Dropping it tears the center down.
pub struct CenterHandle {
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<ViewState>,
    task: Option<JoinHandle<()>>,
}

impl CenterHandle {
    /// Manual retry: resets the reconnect counter and connects immediately.
    pub fn force_reconnect(&self) -> ClientResult<()> {
        self.send(Command::ForceReconnect)
    }

    pub fn set_visibility(&self, visibility: Visibility) -> ClientResult<()> {
        self.send(Command::SetVisibility(visibility))
    }

    pub fn dismiss_banner(&self) -> ClientResult<()> {
        self.send(Command::DismissBanner)
    }

    /// Acknowledges `id` on the backend, then flags it read locally.
    pub async fn mark_read(&self, id: NotificationId) -> ClientResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::MarkRead(id, tx))?;
        rx.await.map_err(|_| ClientError::Closed)?
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.view.clone()
    }

    pub fn snapshot(&self) -> ViewState {
        self.view.borrow().clone()
    }

    /// Closes the connection, cancels any pending reconnect and waits for
    /// the event loop to finish.
    pub async fn unmount(mut self) {
        let _ = self.commands.send(Command::Unmount);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    fn send(&self, command: Command) -> ClientResult<()> {
        self.commands.send(command).map_err(|_| ClientError::Closed)
    }
}

impl Drop for CenterHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Result of a backend call started by the loop and awaited alongside it.
enum Outcome {
    Probed(bool),
    Hydrated(AdvisorId, ClientResult<NotificationPage>),
    MarkedRead(NotificationId, ClientResult<()>, oneshot::Sender<ClientResult<()>>),
}

struct Runtime {
    advisor_id: Option<AdvisorId>,
    backend: Arc<dyn NotificationBackend>,
    transport: Arc<dyn Transport>,
    health: Arc<dyn HealthProbe>,
    machine: ConnectionMachine,
    store: NotificationStore,
    stream: Option<TransportStream>,
    reconnect: Option<Pin<Box<Sleep>>>,
    pending: FuturesUnordered<BoxFuture<'static, Outcome>>,
    probing: bool,
    hydrating: bool,
    banner: Option<Banner>,
    load: LoadState,
    visibility: Visibility,
    view_tx: watch::Sender<ViewState>,
}

impl Runtime {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        self.start();
        self.publish();

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Unmount) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(outcome) = self.pending.next(), if !self.pending.is_empty() => {
                    self.handle_outcome(outcome);
                }
                event = next_event(&mut self.stream) => self.handle_transport(event),
                () = reconnect_due(&mut self.reconnect) => {
                    self.reconnect = None;
                    debug!(attempt = self.machine.attempts(), "Reconnect timer fired");
                    let effects = self.machine.on_reconnect_due();
                    self.apply(effects);
                }
            }
            self.publish();
        }

        // In-flight calls are dropped with their futures; pending `mark_read`
        // callers observe `ClientError::Closed`.
        self.pending.clear();
        let effects = self.machine.disconnect();
        self.apply(effects);
        self.store.clear();
        self.publish();
        info!(advisor_id = ?self.advisor_id, "Notification center unmounted");
    }

    fn start(&mut self) {
        let Some(advisor_id) = self.advisor_id else {
            warn!("No advisor id, notifications disabled");
            self.load = LoadState::Ready;
            return;
        };
        info!(%advisor_id, "Mounting notification center");
        self.probe();
    }

    fn probe(&mut self) {
        if self.probing {
            return;
        }
        self.probing = true;
        let health = self.health.clone();
        self.pending
            .push(async move { Outcome::Probed(health.is_healthy().await) }.boxed());
    }

    fn hydrate(&mut self, advisor_id: AdvisorId) {
        if self.hydrating {
            return;
        }
        self.hydrating = true;
        let backend = self.backend.clone();
        self.pending.push(
            async move { Outcome::Hydrated(advisor_id, backend.fetch_all(advisor_id).await) }
                .boxed(),
        );
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::ForceReconnect => self.force_reconnect(),
            Command::SetVisibility(visibility) => self.on_visibility(visibility),
            Command::MarkRead(id, reply) => {
                let backend = self.backend.clone();
                self.pending.push(
                    async move { Outcome::MarkedRead(id, backend.mark_read(id).await, reply) }
                        .boxed(),
                );
            }
            Command::DismissBanner => {
                if self.banner.as_ref().is_some_and(Banner::is_dismissable) {
                    self.banner = None;
                }
            }
            Command::Unmount => {}
        }
    }

    fn handle_outcome(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Probed(healthy) => {
                self.probing = false;
                self.on_probed(healthy);
            }
            Outcome::Hydrated(advisor_id, result) => {
                self.hydrating = false;
                match result {
                    Ok(page) => {
                        info!(%advisor_id, count = page.data.len(), "Notifications loaded");
                        self.store.replace_all(page.data);
                        self.load = LoadState::Ready;
                    }
                    Err(e) => {
                        warn!(%advisor_id, %e, "Failed to load notifications");
                        self.load = LoadState::Failed(e.to_string());
                    }
                }
                self.reconnect_now();
            }
            Outcome::MarkedRead(id, result, reply) => {
                if result.is_ok() {
                    self.store.mark_read(id);
                }
                let _ = reply.send(result);
            }
        }
    }

    fn on_probed(&mut self, healthy: bool) {
        if self.machine.state() != ConnectionState::Disconnected {
            debug!("Already reconnecting, health result ignored");
            return;
        }
        if healthy {
            self.force_reconnect();
            return;
        }

        warn!(attempts = self.machine.attempts(), "Backend unavailable");
        // Exhaustion stays visible until the user retries.
        self.banner = Some(if self.machine.is_exhausted() {
            Banner::Exhausted
        } else {
            Banner::ServerUnavailable
        });
    }

    fn force_reconnect(&mut self) {
        info!(advisor_id = ?self.advisor_id, "Forcing reconnect");
        self.banner = None;
        // The stream opens once the list is in, so the list never replaces pushes.
        if self.load == LoadState::Loading
            && let Some(advisor_id) = self.advisor_id
        {
            self.hydrate(advisor_id);
            return;
        }
        self.reconnect_now();
    }

    fn reconnect_now(&mut self) {
        // The machine only learns its target on the first connect.
        let effects = match self.machine.target() {
            Some(_) => self.machine.force_reconnect(),
            None => self.machine.connect(self.advisor_id),
        };
        self.apply(effects);
    }

    fn on_visibility(&mut self, visibility: Visibility) {
        let regained = self.visibility == Visibility::Hidden && visibility == Visibility::Visible;
        self.visibility = visibility;
        if !regained || self.machine.state() != ConnectionState::Disconnected {
            return;
        }

        debug!("Visible again while disconnected, probing backend");
        self.probe();
    }

    fn handle_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Open => {
                info!(advisor_id = ?self.advisor_id, "Notification stream connected");
                let effects = self.machine.on_open();
                self.apply(effects);
                self.banner = None;
            }
            TransportEvent::Frame { event, data } => self.handle_frame(&event, &data),
            TransportEvent::Error(reason) => {
                warn!(%reason, attempts = self.machine.attempts(), "Notification stream error");
                let effects = self.machine.on_error();
                self.apply(effects);
            }
        }
    }

    fn handle_frame(&mut self, event: &str, data: &str) {
        let frame = match frame::parse(event, data) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(%event, %e, "Dropping malformed frame");
                return;
            }
        };

        match frame {
            Frame::Connected => debug!("Stream acknowledged"),
            Frame::Heartbeat => debug!("Heartbeat"),
            Frame::Notification(notification) => {
                let id = notification.id;
                if self.store.merge(*notification) {
                    info!(%id, "Notification received");
                } else {
                    debug!(%id, "Duplicate notification discarded");
                }
            }
            Frame::NotificationRead { notification_id } => {
                if !self.store.mark_read(notification_id) {
                    debug!(%notification_id, "Read ack for unknown notification");
                }
            }
            Frame::Unknown { event, data } => {
                debug!(?event, %data, "Ignoring unknown frame");
            }
        }
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::CloseTransport => {
                    if self.stream.take().is_some() {
                        debug!("Push connection closed");
                    }
                }
                Effect::CancelReconnect => self.reconnect = None,
                Effect::OpenTransport(advisor_id) => {
                    debug!(%advisor_id, "Opening push connection");
                    self.stream = Some(self.transport.open(advisor_id));
                }
                Effect::ScheduleReconnect(delay) => {
                    info!(?delay, attempt = self.machine.attempts(), "Reconnect scheduled");
                    self.reconnect = Some(Box::pin(tokio::time::sleep(delay)));
                    self.banner = Some(Banner::Reconnecting {
                        attempt: self.machine.attempts(),
                        delay,
                    });
                }
                Effect::Exhausted => self.banner = Some(Banner::Exhausted),
            }
        }
    }

    fn publish(&self) {
        let connection = self.machine.state();
        self.view_tx.send_replace(ViewState {
            connection,
            indicator: Indicator::from(connection),
            banner: self.banner.clone(),
            load: self.load.clone(),
            notifications: self.store.as_slice().to_vec(),
            unread: self.store.unread_count(),
            reconnect_attempts: self.machine.attempts(),
        });
    }
}

async fn next_event(stream: &mut Option<TransportStream>) -> TransportEvent {
    match stream {
        Some(stream) => stream
            .next()
            .await
            .unwrap_or_else(|| TransportEvent::Error("stream ended".to_string())),
        None => std::future::pending().await,
    }
}

async fn reconnect_due(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
