//! Persisted session slots: the bearer token and the cached user record.
//!
//! Both services and the session go through [`SessionStore`], so a
//! different backend (keychain, encrypted file) only needs a new impl.

use crate::error::ClientError;
use crate::models::User;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";

pub trait SessionStore: Send + Sync {
    fn token(&self) -> Result<Option<String>, ClientError>;
    fn set_token(&self, token: &str) -> Result<(), ClientError>;
    fn clear_token(&self) -> Result<(), ClientError>;

    fn user(&self) -> Result<Option<User>, ClientError>;
    fn set_user(&self, user: &User) -> Result<(), ClientError>;
    fn clear_user(&self) -> Result<(), ClientError>;

    /// Clears both slots, attempting the second even if the first fails.
    fn clear(&self) -> Result<(), ClientError> {
        let token = self.clear_token();
        let user = self.clear_user();
        token.and(user)
    }
}

// ==================== In-memory ====================

#[derive(Debug, Default)]
struct Slots {
    token: Option<String>,
    user: Option<User>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: RwLock<Slots>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&Slots) -> T) -> Result<T, ClientError> {
        let slots = self
            .slots
            .read()
            .map_err(|_| ClientError::Storage("memory store lock poisoned".into()))?;
        Ok(f(&slots))
    }

    fn write(&self, f: impl FnOnce(&mut Slots)) -> Result<(), ClientError> {
        let mut slots = self
            .slots
            .write()
            .map_err(|_| ClientError::Storage("memory store lock poisoned".into()))?;
        f(&mut slots);
        Ok(())
    }
}

impl SessionStore for MemoryStore {
    fn token(&self) -> Result<Option<String>, ClientError> {
        self.read(|s| s.token.clone())
    }

    fn set_token(&self, token: &str) -> Result<(), ClientError> {
        self.write(|s| s.token = Some(token.to_string()))
    }

    fn clear_token(&self) -> Result<(), ClientError> {
        self.write(|s| s.token = None)
    }

    fn user(&self) -> Result<Option<User>, ClientError> {
        self.read(|s| s.user.clone())
    }

    fn set_user(&self, user: &User) -> Result<(), ClientError> {
        self.write(|s| s.user = Some(user.clone()))
    }

    fn clear_user(&self) -> Result<(), ClientError> {
        self.write(|s| s.user = None)
    }
}

// ==================== Files ====================

/// One file per slot inside `dir`: `token` and `user.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn token_path(&self) -> PathBuf {
        self.dir.join(TOKEN_KEY)
    }

    pub fn user_path(&self) -> PathBuf {
        self.dir.join(format!("{USER_KEY}.json"))
    }

    fn write_private(&self, path: &Path, contents: &str) -> Result<(), ClientError> {
        fs::create_dir_all(&self.dir).map_err(|e| storage_err(&self.dir, e))?;
        fs::write(path, contents).map_err(|e| storage_err(path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(path)
                .map_err(|e| storage_err(path, e))?
                .permissions();
            perms.set_mode(0o600);
            fs::set_permissions(path, perms).map_err(|e| storage_err(path, e))?;
        }

        Ok(())
    }
}

fn storage_err(path: &Path, e: std::io::Error) -> ClientError {
    ClientError::Storage(format!("{}: {}", path.display(), e))
}

fn read_optional(path: &Path) -> Result<Option<String>, ClientError> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(storage_err(path, e)),
    }
}

fn remove_optional(path: &Path) -> Result<(), ClientError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(storage_err(path, e)),
    }
}

impl SessionStore for FileStore {
    fn token(&self) -> Result<Option<String>, ClientError> {
        Ok(read_optional(&self.token_path())?
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()))
    }

    fn set_token(&self, token: &str) -> Result<(), ClientError> {
        self.write_private(&self.token_path(), token)
    }

    fn clear_token(&self) -> Result<(), ClientError> {
        remove_optional(&self.token_path())
    }

    fn user(&self) -> Result<Option<User>, ClientError> {
        match read_optional(&self.user_path())? {
            Some(raw) if !raw.trim().is_empty() => Ok(Some(serde_json::from_str(&raw)?)),
            _ => Ok(None),
        }
    }

    fn set_user(&self, user: &User) -> Result<(), ClientError> {
        let raw = serde_json::to_string_pretty(user)?;
        self.write_private(&self.user_path(), &raw)
    }

    fn clear_user(&self) -> Result<(), ClientError> {
        remove_optional(&self.user_path())
    }
}
