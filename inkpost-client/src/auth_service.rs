use crate::error::{AuthError, ClientError};
use crate::http::HttpClient;
use crate::models::{AuthEnvelope, DataEnvelope, LoginCredentials, ProfileUpdate, RegisterData, User};
use crate::storage::SessionStore;
use reqwest::Method;
use std::sync::Arc;

/// Login, registration and profile calls against `/User`.
///
/// Reads the persisted token and user but never writes them; the
/// session owns the writes.
#[derive(Clone)]
pub struct AuthService {
    http: HttpClient,
    store: Arc<dyn SessionStore>,
}

impl AuthService {
    pub fn new(http: HttpClient, store: Arc<dyn SessionStore>) -> Self {
        Self { http, store }
    }

    pub async fn login(&self, credentials: &LoginCredentials) -> Result<(User, String), ClientError> {
        tracing::debug!("Login called for email: {}", credentials.email);

        let request = self
            .http
            .request(Method::POST, "/User/login", None)
            .json(credentials);
        let envelope: AuthEnvelope = self
            .http
            .send(request)
            .await
            .map_err(credential_failure)?;

        Ok((envelope.data, envelope.token))
    }

    pub async fn register(&self, data: &RegisterData) -> Result<(User, String), ClientError> {
        tracing::debug!("Register called for username: {}", data.username);

        let request = self
            .http
            .request(Method::POST, "/User/register", None)
            .json(data);
        let envelope: AuthEnvelope = self
            .http
            .send(request)
            .await
            .map_err(credential_failure)?;

        Ok((envelope.data, envelope.token))
    }

    /// Resolves the persisted token to its user via `/User/me`.
    pub async fn current_user(&self) -> Result<User, ClientError> {
        let token = self.store.token()?.ok_or(AuthError::NotAuthenticated)?;

        let request = self.http.request(Method::GET, "/User/me", Some(&token));
        let envelope: DataEnvelope<User> =
            self.http.send(request).await.map_err(token_failure)?;

        Ok(envelope.data)
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, ClientError> {
        let token = self.store.token()?;
        let user = self.store.user()?;
        let (Some(token), Some(user)) = (token, user) else {
            return Err(AuthError::NotAuthenticated.into());
        };

        let path = format!("/User/update/{}", HttpClient::segment(&user.id));
        let request = self
            .http
            .request(Method::PUT, &path, Some(&token))
            .json(update);
        let envelope: DataEnvelope<User> =
            self.http.send(request).await.map_err(token_failure)?;

        Ok(envelope.data)
    }
}

fn credential_failure(err: ClientError) -> ClientError {
    match err {
        ClientError::Request { status, message } => match status {
            400 | 401 | 403 | 404 => AuthError::InvalidCredentials(message).into(),
            500.. => AuthError::Unavailable(message).into(),
            _ => AuthError::Rejected { status, message }.into(),
        },
        other => unavailable(other),
    }
}

fn token_failure(err: ClientError) -> ClientError {
    match err {
        ClientError::Request { status, message } => match status {
            401 | 403 => AuthError::TokenRejected(message).into(),
            500.. => AuthError::Unavailable(message).into(),
            _ => AuthError::Rejected { status, message }.into(),
        },
        other => unavailable(other),
    }
}

fn unavailable(err: ClientError) -> ClientError {
    match err {
        ClientError::Auth(_) | ClientError::Storage(_) => err,
        other => AuthError::Unavailable(other.to_string()).into(),
    }
}
