//! Bearer-authenticated JSON REST client.

use std::sync::Arc;
use std::time::Duration;

use nexus_auth::CredentialStore;
use nexus_settings::ApiSettings;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::errors::ApiError;

/// REST client sharing the credential slot with the realtime channel.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialStore>,
    unauthorized: Arc<watch::Sender<u64>>,
}

impl ApiClient {
    /// Create a client for `base_url`.
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let (tx, _rx) = watch::channel(0);
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            credentials,
            unauthorized: Arc::new(tx),
        })
    }

    /// Create a client from the `api` settings section.
    pub fn from_settings(
        settings: &ApiSettings,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, ApiError> {
        Self::new(
            settings.base_url.clone(),
            Duration::from_millis(settings.timeout_ms),
            credentials,
        )
    }

    /// Counter bumped every time the server rejects the credential.
    ///
    /// Hosts watch this to disconnect the realtime session.
    pub fn unauthorized(&self) -> watch::Receiver<u64> {
        self.unauthorized.subscribe()
    }

    /// `GET path`, decoding the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send(Method::GET, path, None::<&()>).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// `POST path` with a JSON body, decoding the JSON response.
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self.send(Method::POST, path, Some(body)).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// `DELETE path`, discarding the body.
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let _ = self.send(Method::DELETE, path, None::<&()>).await?;
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<reqwest::Response, ApiError> {
        let credential = self.credentials.load().ok_or(ApiError::NoCredential)?;
        let url = self.url(path);
        debug!(%method, %url, "api request");

        let mut request = self
            .http
            .request(method, &url)
            .header(reqwest::header::AUTHORIZATION, credential.bearer_header());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.reject_credential(&url);
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    fn reject_credential(&self, url: &str) {
        warn!(%url, "credential rejected, clearing stored credential");
        if let Err(e) = self.credentials.clear() {
            warn!(error = %e, "failed to clear credential");
        }
        self.unauthorized.send_modify(|n| *n += 1);
    }
}
