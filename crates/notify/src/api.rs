use async_trait::async_trait;
use diary_models::{AdvisorId, NotificationId, NotificationPage};
use reqwest::Response;
use tracing::debug;

use crate::error::{ClientError, ClientResult};
use crate::session::Session;

/// One-shot REST calls against the notification endpoints.
#[derive(Debug, Clone)]
pub struct NotificationApi {
    session: Session,
}

impl NotificationApi {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// Loads every notification for `advisor_id`.
    pub async fn fetch_all(&self, advisor_id: AdvisorId) -> ClientResult<NotificationPage> {
        let url = self.session.url(&self.session.settings().api.list_path);
        let resp = self
            .session
            .authorize(self.session.client().get(&url))
            .query(&[("advisor_id", advisor_id.get())])
            .timeout(self.session.request_timeout())
            .send()
            .await?;
        let page: NotificationPage = check(resp).await?.json().await?;
        debug!(%advisor_id, count = page.data.len(), total = page.total, "Fetched notifications");
        Ok(page)
    }

    pub async fn fetch_page(
        &self,
        advisor_id: AdvisorId,
        page: u64,
        limit: u64,
    ) -> ClientResult<NotificationPage> {
        let url = self.session.url(&self.session.settings().api.list_path);
        let resp = self
            .session
            .authorize(self.session.client().get(&url))
            .query(&[("advisor_id", advisor_id.get()), ("page", page), ("limit", limit)])
            .timeout(self.session.request_timeout())
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    /// Acknowledges a notification as read on the backend.
    pub async fn mark_read(&self, id: NotificationId) -> ClientResult<()> {
        let url = self.session.url(&format!("/api/notification/{}/read", id));
        let resp = self
            .session
            .authorize(self.session.client().put(&url))
            .timeout(self.session.request_timeout())
            .send()
            .await?;
        check(resp).await?;
        debug!(%id, "Notification marked read");
        Ok(())
    }
}

/// Backend operations the notification center depends on.
#[async_trait]
pub trait NotificationBackend: Send + Sync + 'static {
    async fn fetch_all(&self, advisor_id: AdvisorId) -> ClientResult<NotificationPage>;

    async fn mark_read(&self, id: NotificationId) -> ClientResult<()>;
}

#[async_trait]
impl NotificationBackend for NotificationApi {
    async fn fetch_all(&self, advisor_id: AdvisorId) -> ClientResult<NotificationPage> {
        NotificationApi::fetch_all(self, advisor_id).await
    }

    async fn mark_read(&self, id: NotificationId) -> ClientResult<()> {
        NotificationApi::mark_read(self, id).await
    }
}

async fn check(resp: Response) -> ClientResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ClientError::Status {
        status: status.as_u16(),
        body,
    })
}
