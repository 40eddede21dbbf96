pub mod auth_service;
pub mod config;
pub mod content;
pub mod error;
pub mod http;
pub mod models;
pub mod post_service;
pub mod session;
pub mod storage;

pub use auth_service::AuthService;
pub use config::ClientConfig;
pub use error::{AuthError, ClientError};
pub use post_service::PostService;
pub use session::{Session, SessionState};
pub use storage::{FileStore, MemoryStore, SessionStore};

use http::HttpClient;
use std::sync::Arc;

/// Wires the transport, the session store, both services and the session
/// around one base URL.
#[derive(Clone)]
pub struct BlogClient {
    http: HttpClient,
    auth: AuthService,
    posts: PostService,
    session: Arc<Session>,
}

impl BlogClient {
    pub fn new(config: &ClientConfig, store: Arc<dyn SessionStore>) -> Self {
        let http = HttpClient::new(config);
        let auth = AuthService::new(http.clone(), store.clone());
        let posts = PostService::new(http.clone(), store.clone());
        let session = Arc::new(Session::new(auth.clone(), store));

        Self {
            http,
            auth,
            posts,
            session,
        }
    }

    /// Client with an in-memory store; nothing survives the process.
    pub fn ephemeral(config: &ClientConfig) -> Self {
        Self::new(config, Arc::new(MemoryStore::new()))
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    pub fn posts(&self) -> &PostService {
        &self.posts
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }
}
