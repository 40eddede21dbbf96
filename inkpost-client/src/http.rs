use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::models::ErrorResponse;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::borrow::Cow;

/// Thin wrapper over `reqwest::Client` bound to the API base URL.
///
/// Every call is a single round trip. Non-2xx answers become
/// [`ClientError::Request`]; nothing is retried.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    pub fn new(config: &ClientConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: config.base_url.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Percent-encodes an id so it stays a single path segment.
    pub fn segment(value: &str) -> Cow<'_, str> {
        urlencoding::encode(value)
    }

    /// Starts a request; `token` becomes a bearer `Authorization` header.
    pub fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        tracing::debug!(%method, path, authorized = token.is_some(), "API request");

        let request = self.client.request(method, self.url(path));
        match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    pub async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(Self::error_from(response).await);
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Like [`send`](Self::send), but a 404 or an empty / `null` body
    /// resolves to `None`.
    pub async fn send_optional<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Option<T>, ClientError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Self::error_from(response).await);
        }

        let body = response.text().await?;
        let body = body.trim();
        if body.is_empty() || body == "null" {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(body)?))
    }

    /// Sends and ignores whatever body a successful answer carries.
    pub async fn send_empty(&self, request: RequestBuilder) -> Result<(), ClientError> {
        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        Ok(())
    }

    async fn error_from(response: Response) -> ClientError {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        let message = serde_json::from_str::<ErrorResponse>(&text)
            .ok()
            .and_then(ErrorResponse::into_message)
            .unwrap_or_else(|| {
                if text.trim().is_empty() {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                } else {
                    text
                }
            });

        tracing::debug!(status = status.as_u16(), %message, "API request failed");

        ClientError::Request {
            status: status.as_u16(),
            message,
        }
    }
}
