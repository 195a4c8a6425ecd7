use async_trait::async_trait;
use tracing::debug;

use crate::session::Session;

/// Answers whether the backend is reachable before a (re)connect is attempted.
#[async_trait]
pub trait HealthProbe: Send + Sync + 'static {
    async fn is_healthy(&self) -> bool;
}

/// Probes the liveness endpoint; any transport failure or non-2xx counts as down.
pub struct HttpHealthProbe {
    session: Session,
}

impl HttpHealthProbe {
    pub fn new(session: Session) -> Self {
        Self { session }
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn is_healthy(&self) -> bool {
        let url = self.session.url(&self.session.settings().api.health_path);
        let request = self
            .session
            .client()
            .get(&url)
            .timeout(self.session.request_timeout());
        match request.send().await {
            Ok(resp) => {
                let healthy = resp.status().is_success();
                debug!(%url, status = %resp.status(), healthy, "Health probe");
                healthy
            }
            Err(e) => {
                debug!(%url, %e, "Health probe failed");
                false
            }
        }
    }
}
