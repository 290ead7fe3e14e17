use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::warn;

const DEFAULT_ADMIN_USERNAME: &str = "admin";
const DEFAULT_ADMIN_PASSWORD: &str = "admin123";
const SESSION_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: String,
    /// Stored as `salt$hex(sha256("{salt}${password}"))`.
    pub password: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

/// The slice of a user that lives in a session and in API responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub username: String,
    pub role: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("user file io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("user file is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
}

/// JSON-array user file. Only read at login time; the single mutation is the
/// first-start bootstrap of the default admin account.
pub struct UserStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl UserStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub async fn init(&self) -> Result<(), AuthError> {
        let _guard = self.lock.lock().await;
        if fs::try_exists(&self.path).await? {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let default_user = User {
            username: DEFAULT_ADMIN_USERNAME.to_string(),
            password: encode_password(DEFAULT_ADMIN_PASSWORD),
            role: "admin".to_string(),
            created_at: Utc::now(),
        };
        let data = serde_json::to_string_pretty(&[&default_user])?;
        fs::write(&self.path, data).await?;
        warn!(
            username = DEFAULT_ADMIN_USERNAME,
            "created default admin user; change the password before going live"
        );
        Ok(())
    }

    /// Check credentials; `Ok(None)` covers both unknown users and wrong
    /// passwords so the caller cannot tell the two apart.
    pub async fn verify(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<SessionUser>, AuthError> {
        let _guard = self.lock.lock().await;
        let data = fs::read_to_string(&self.path).await?;
        let users: Vec<User> = serde_json::from_str(&data)?;

        let matched = users
            .into_iter()
            .find(|user| user.username == username)
            .filter(|user| verify_password(password, &user.password))
            .map(|user| SessionUser {
                username: user.username,
                role: user.role,
            });
        Ok(matched)
    }
}

fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b"$");
    hasher.update(password.as_bytes());
    hex(hasher.finalize().as_slice())
}

fn encode_password(password: &str) -> String {
    let salt = generate_token();
    let salt = &salt[..16];
    format!("{salt}${}", hash_password(password, salt))
}

fn verify_password(password: &str, stored: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, digest)) => hash_password(password, salt) == digest,
        None => false,
    }
}

struct Session {
    user: SessionUser,
    expires_at: DateTime<Utc>,
}

/// In-process session map; restarting the service signs everyone out.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, user: SessionUser) -> String {
        let token = generate_token();
        let session = Session {
            user,
            expires_at: Utc::now() + Duration::hours(SESSION_TTL_HOURS),
        };
        self.sessions.write().await.insert(token.clone(), session);
        token
    }

    /// Resolve a token, dropping it when expired.
    pub async fn get(&self, token: &str) -> Option<SessionUser> {
        {
            let sessions = self.sessions.read().await;
            let session = sessions.get(token)?;
            if session.expires_at > Utc::now() {
                return Some(session.user.clone());
            }
        }
        self.sessions.write().await.remove(token);
        None
    }

    pub async fn destroy(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }
}

static TOKEN_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Opaque token from hashing the clock, a process-wide counter, and the pid.
fn generate_token() -> String {
    let mut hasher = Sha256::new();
    hasher.update(Utc::now().timestamp_nanos_opt().unwrap_or(0).to_le_bytes());
    hasher.update(TOKEN_COUNTER.fetch_add(1, Ordering::Relaxed).to_le_bytes());
    hasher.update(std::process::id().to_le_bytes());
    hex(hasher.finalize().as_slice())
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
