use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, Sse},
    },
    routing::{get, put},
};
use diary_config::Settings;
use diary_models::{Notification, NotificationId, NotificationPage};
use diary_notify::Session;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
enum Pushed {
    Frame { event: Option<String>, data: String },
    Close,
}

/// Shared, test-controlled state of the stub backend.
pub struct BackendState {
    healthy: AtomicBool,
    stall_health: AtomicBool,
    fail_list: AtomicBool,
    notifications: Mutex<Vec<Notification>>,
    read: Mutex<Vec<NotificationId>>,
    streams: AtomicUsize,
    active: AtomicUsize,
    events: broadcast::Sender<Pushed>,
}

/// Counts a stream as active until its response body is dropped.
struct ActiveStream(Arc<BackendState>);

impl ActiveStream {
    fn new(state: Arc<BackendState>) -> Self {
        state.active.fetch_add(1, Ordering::SeqCst);
        Self(state)
    }
}

impl Drop for ActiveStream {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A running stub of the diary backend's notification endpoints.
pub struct TestBackend {
    pub base_url: String,
    pub client: reqwest::Client,
    state: Arc<BackendState>,
    server: JoinHandle<()>,
}

impl TestBackend {
    /// Spawn the stub on a random local port.
    pub async fn spawn() -> Self {
        let (events, _) = broadcast::channel(64);
        let state = Arc::new(BackendState {
            healthy: AtomicBool::new(true),
            stall_health: AtomicBool::new(false),
            fail_list: AtomicBool::new(false),
            notifications: Mutex::new(Vec::new()),
            read: Mutex::new(Vec::new()),
            streams: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            events,
        });

        let app = Router::new()
            .route("/health", get(health))
            .route("/api/notification/all", get(list))
            .route("/api/notification/stream", get(stream))
            .route("/api/notification/{id}/read", put(mark_read))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        tracing::debug!(%addr, "Stub backend listening");

        let base_url = format!("http://{}", addr);
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            base_url,
            client,
            state,
            server,
        }
    }

    /// Client settings pointing at this backend with a fast reconnect policy.
    pub fn settings(&self, advisor_id: u64) -> Settings {
        let mut settings = Settings::for_base_url(self.base_url.clone());
        settings.api.advisor_id = Some(advisor_id);
        settings.reconnect.base_delay_ms = 20;
        settings.reconnect.max_delay_ms = 200;
        settings
    }

    pub fn session(&self, advisor_id: u64) -> Session {
        Session::with_client(self.settings(advisor_id), self.client.clone())
    }

    pub fn seed(&self, notifications: Vec<Notification>) {
        *self.state.notifications.lock().unwrap() = notifications;
    }

    /// Push a notification record to every open stream.
    pub fn push(&self, notification: &Notification) {
        let data = serde_json::to_string(notification).expect("Failed to encode notification");
        self.push_raw(None, &data);
    }

    pub fn push_raw(&self, event: Option<&str>, data: &str) {
        let _ = self.state.events.send(Pushed::Frame {
            event: event.map(str::to_string),
            data: data.to_string(),
        });
    }

    /// End every open stream from the server side.
    pub fn close_streams(&self) {
        let _ = self.state.events.send(Pushed::Close);
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.state.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Make `/health` accept requests and never answer.
    pub fn stall_health(&self, stall: bool) {
        self.state.stall_health.store(stall, Ordering::SeqCst);
    }

    pub fn fail_list(&self, fail: bool) {
        self.state.fail_list.store(fail, Ordering::SeqCst);
    }

    /// Number of stream connections accepted so far.
    pub fn stream_count(&self) -> usize {
        self.state.streams.load(Ordering::SeqCst)
    }

    /// Streams whose response body is still alive.
    pub fn active_streams(&self) -> usize {
        self.state.active.load(Ordering::SeqCst)
    }

    pub fn read_ids(&self) -> Vec<NotificationId> {
        self.state.read.lock().unwrap().clone()
    }
}

impl Drop for TestBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

#[derive(Debug, Deserialize)]
struct ListParams {
    advisor_id: u64,
    page: Option<u64>,
    limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct StreamParams {
    advisor_id: u64,
}

async fn health(State(state): State<Arc<BackendState>>) -> StatusCode {
    if state.stall_health.load(Ordering::SeqCst) {
        std::future::pending::<()>().await;
    }
    if state.healthy.load(Ordering::SeqCst) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn list(
    State(state): State<Arc<BackendState>>,
    Query(params): Query<ListParams>,
) -> Response {
    if state.fail_list.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "message": "database unavailable" })),
        )
            .into_response();
    }

    let owned: Vec<Notification> = state
        .notifications
        .lock()
        .unwrap()
        .iter()
        .filter(|n| n.user_id == params.advisor_id)
        .cloned()
        .collect();
    let total = owned.len() as u64;
    let (page, limit) = (params.page.unwrap_or(1).max(1), params.limit.unwrap_or(total));
    let data: Vec<Notification> = owned
        .into_iter()
        .skip(((page - 1) * limit) as usize)
        .take(limit as usize)
        .collect();

    Json(NotificationPage {
        count: data.len() as u64,
        data,
        limit,
        message: "ok".to_string(),
        page,
        total,
    })
    .into_response()
}

async fn stream(
    State(state): State<Arc<BackendState>>,
    Query(params): Query<StreamParams>,
) -> Response {
    if !state.healthy.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let mut rx = state.events.subscribe();
    state.streams.fetch_add(1, Ordering::SeqCst);
    let active = ActiveStream::new(state.clone());
    let advisor_id = params.advisor_id;

    let events = async_stream::stream! {
        let _active = active;
        let hello = serde_json::json!({ "type": "connected", "advisor_id": advisor_id });
        yield Ok::<_, Infallible>(Event::default().data(hello.to_string()));
        loop {
            match rx.recv().await {
                Ok(Pushed::Frame { event, data }) => {
                    let frame = Event::default().data(data);
                    yield Ok(match event {
                        Some(name) => frame.event(name),
                        None => frame,
                    });
                }
                Ok(Pushed::Close) | Err(broadcast::error::RecvError::Closed) => break,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
            }
        }
    };

    Sse::new(events).into_response()
}

async fn mark_read(State(state): State<Arc<BackendState>>, Path(id): Path<u64>) -> Response {
    let id = NotificationId(id);
    let found = state
        .notifications
        .lock()
        .unwrap()
        .iter_mut()
        .find(|n| n.id == id)
        .map(|n| n.is_read = true)
        .is_some();
    if !found {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "message": "notification not found" })),
        )
            .into_response();
    }

    state.read.lock().unwrap().push(id);
    let data = serde_json::json!({ "notification_id": id });
    let _ = state.events.send(Pushed::Frame {
        event: Some("notification_read".to_string()),
        data: data.to_string(),
    });
    Json(serde_json::json!({ "message": "ok" })).into_response()
}
