use async_stream::stream;
use diary_models::AdvisorId;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use tracing::debug;

use crate::session::Session;

/// Signal delivered by a push connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Open,
    Frame { event: String, data: String },
    /// The connection failed or was closed by the peer. Always the last item.
    Error(String),
}

/// A live push connection. Dropping it closes the connection.
pub type TransportStream = BoxStream<'static, TransportEvent>;

/// Opens push connections for an advisor.
pub trait Transport: Send + Sync + 'static {
    fn open(&self, advisor_id: AdvisorId) -> TransportStream;
}

/// Server-sent events over a long-lived HTTP GET.
pub struct SseTransport {
    session: Session,
}

impl SseTransport {
    pub fn new(session: Session) -> Self {
        Self { session }
    }
}

impl Transport for SseTransport {
    fn open(&self, advisor_id: AdvisorId) -> TransportStream {
        let url = self.session.url(&self.session.settings().api.stream_path);
        let request = self
            .session
            .authorize(self.session.client().get(&url))
            .query(&[("advisor_id", advisor_id.get())])
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");

        let events = stream! {
            let resp = match request.send().await {
                Ok(resp) => resp,
                Err(e) => {
                    yield TransportEvent::Error(e.to_string());
                    return;
                }
            };
            if !resp.status().is_success() {
                yield TransportEvent::Error(format!("stream rejected with status {}", resp.status()));
                return;
            }

            debug!(%advisor_id, "Push stream open");
            yield TransportEvent::Open;

            let mut frames = resp.bytes_stream().eventsource();
            while let Some(frame) = frames.next().await {
                match frame {
                    Ok(ev) => yield TransportEvent::Frame { event: ev.event, data: ev.data },
                    Err(e) => {
                        yield TransportEvent::Error(e.to_string());
                        return;
                    }
                }
            }
            yield TransportEvent::Error("stream closed by server".to_string());
        };

        events.boxed()
    }
}
