use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::{
    backend::{
        BackendError, Endpoint, IngestionStatus, PROGRESSIVE_SEGMENTS, StatsBackend, StatsEnvelope, StatsQuery,
        USERS_SEGMENTS, UsersEnvelope,
    },
    models::user::CrmUser,
    session::TokenStore,
};

/// [`StatsBackend`] over the dashboard's HTTP API.
///
/// Every request carries the session token from the [`TokenStore`] as a
/// bearer token. A missing token fails without a request; a 401/403 clears
/// the stored token so the next attempt starts from a fresh login.
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    tokens: Arc<dyn TokenStore>,
}

impl HttpBackend {
    pub fn new(base_url: &str, tokens: Arc<dyn TokenStore>) -> Result<Self, BackendError> {
        let base_url = Url::parse(base_url).map_err(|e| BackendError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(BackendError::InvalidUrl(base_url.to_string()));
        }
        let client = Client::builder()
            .user_agent(concat!("crm_insights/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url,
            tokens,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BackendError> {
        let Some(token) = self.tokens.get() else {
            self.clear_token();
            return Err(BackendError::MissingToken);
        };

        let response = request.bearer_auth(token.expose_secret()).send().await?;
        let status = response.status();
        debug!(url = %response.url(), %status, "Backend responded");

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            self.clear_token();
            return Err(BackendError::Unauthorized { status: status.as_u16() });
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown API error".to_string());
            return Err(BackendError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    fn clear_token(&self) {
        if let Err(e) = self.tokens.clear() {
            warn!(error = %e, "Could not clear session token");
        }
    }
}

#[async_trait]
impl StatsBackend for HttpBackend {
    async fn fetch(&self, endpoint: &Endpoint, query: &StatsQuery) -> Result<StatsEnvelope, BackendError> {
        let url = self.url(&endpoint.segments())?;
        self.send(self.client.get(url).query(&query.to_pairs())).await
    }

    async fn start_ingestion(&self, query: &StatsQuery) -> Result<IngestionStatus, BackendError> {
        let url = self.url(&PROGRESSIVE_SEGMENTS)?;
        self.send(self.client.post(url).query(&query.to_pairs())).await
    }

    async fn ingestion_status(&self, job_id: &str) -> Result<IngestionStatus, BackendError> {
        let url = self.url(&PROGRESSIVE_SEGMENTS)?;
        self.send(self.client.get(url).query(&[("job_id", job_id)])).await
    }

    async fn users(&self) -> Result<Vec<CrmUser>, BackendError> {
        let url = self.url(&USERS_SEGMENTS)?;
        let envelope: UsersEnvelope = self.send(self.client.get(url)).await?;
        envelope.into_users()
    }
}
