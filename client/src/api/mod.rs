pub mod auth;
pub mod payment;
pub mod schedule;

use std::time::Duration;

use reqwest::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    Method, RequestBuilder, StatusCode, Url,
};
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::{
    auth::AppContext,
    error::{ClientError, Result},
    models::common::{ApiEnvelope, ApiFailure},
};

pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// JSON client for the clinic backend.
///
/// Every request carries the session's bearer token when one is present. A 401
/// from any endpoint signs the user out before the error reaches the caller.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    ctx: AppContext,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration, ctx: AppContext) -> Result<Self> {
        // a trailing slash keeps the last path segment when joining endpoints
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| ClientError::InvalidInput(format!("invalid API URL {base_url}: {e}")))?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url, ctx })
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    fn url(&self, endpoint: &str) -> Result<Url> {
        self.base_url
            .join(endpoint.trim_start_matches('/'))
            .map_err(|e| ClientError::InvalidInput(format!("invalid endpoint {endpoint}: {e}")))
    }

    fn request(&self, method: Method, endpoint: &str) -> Result<RequestBuilder> {
        Ok(self
            .http
            .request(method, self.url(endpoint)?)
            .header(CONTENT_TYPE, "application/json"))
    }

    /// Sends one request and unwraps the `{data}` envelope.
    ///
    /// `Ok(None)` means the backend answered 2xx without a payload.
    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        req: RequestBuilder,
    ) -> Result<Option<T>> {
        let request_id = Uuid::new_v4();
        let mut req = req.header(REQUEST_ID_HEADER, request_id.to_string());
        if let Some(token) = self.ctx.token().await {
            req = req.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        tracing::debug!(%method, endpoint, %request_id, "Sending request");
        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.bytes().await?;

        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(%method, endpoint, %request_id, "Backend rejected credentials; signing out");
            if let Err(e) = self.ctx.logout().await {
                tracing::error!("Failed to clear stored session: {}", e);
            }
            return Err(ClientError::Unauthorized);
        }

        if !status.is_success() {
            let message = serde_json::from_slice::<ApiFailure>(&body)
                .ok()
                .and_then(|f| f.message)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_string());
            tracing::debug!(%status, endpoint, %request_id, "Request failed: {}", message);
            return Err(ClientError::Api { status, message });
        }

        if body.is_empty() {
            return Ok(None);
        }
        let envelope: ApiEnvelope<T> = serde_json::from_slice(&body)?;
        Ok(envelope.data)
    }

    fn require<T>(endpoint: &str, data: Option<T>) -> Result<T> {
        data.ok_or_else(|| {
            ClientError::Internal(anyhow::anyhow!("response from {endpoint} carried no data"))
        })
    }

    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let req = self.request(Method::GET, endpoint)?.query(query);
        let data = self.execute(Method::GET, endpoint, req).await?;
        Self::require(endpoint, data)
    }

    pub(crate) async fn post<B, T>(&self, endpoint: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let req = self.request(Method::POST, endpoint)?.json(body);
        let data = self.execute(Method::POST, endpoint, req).await?;
        Self::require(endpoint, data)
    }

    /// POST whose response payload is not needed.
    pub(crate) async fn post_discard<B>(&self, endpoint: &str, body: &B) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        let req = self.request(Method::POST, endpoint)?.json(body);
        self.execute::<serde_json::Value>(Method::POST, endpoint, req)
            .await?;
        Ok(())
    }

    pub(crate) async fn delete(&self, endpoint: &str) -> Result<()> {
        let req = self.request(Method::DELETE, endpoint)?;
        self.execute::<serde_json::Value>(Method::DELETE, endpoint, req)
            .await?;
        Ok(())
    }
}
