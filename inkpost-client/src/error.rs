use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    // Ошибки аутентификации
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    // HTTP ошибки
    #[error("Request failed with HTTP {status}: {message}")]
    Request { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    // Ошибки сериализации/десериализации
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Хранилище сессии
    #[error("Session storage error: {0}")]
    Storage(String),

    // Бизнес-логика ошибки
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("user is not authenticated")]
    NotAuthenticated,

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("token rejected: {0}")]
    TokenRejected(String),

    #[error("rejected with HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("auth service unavailable: {0}")]
    Unavailable(String),
}

impl ClientError {
    pub fn is_auth(&self) -> bool {
        matches!(self, ClientError::Auth(_))
    }

    /// Non-2xx answers and transport failures.
    pub fn is_request_error(&self) -> bool {
        matches!(self, ClientError::Request { .. } | ClientError::Transport(_))
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(self, ClientError::InvalidInput(_))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Request { status, .. } => Some(*status),
            ClientError::Auth(AuthError::Rejected { status, .. }) => Some(*status),
            ClientError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn auth_error(&self) -> Option<&AuthError> {
        match self {
            ClientError::Auth(e) => Some(e),
            _ => None,
        }
    }
}

impl AuthError {
    /// The server refused the persisted token, so it should be forgotten.
    pub fn invalidates_session(&self) -> bool {
        matches!(self, AuthError::TokenRejected(_))
    }
}
