//! Session state: the bearer token and role of the signed-in user.
//!
//! The session is owned by an [`AppContext`] that callers pass around
//! explicitly. It is hydrated once from a [`SessionStore`] at startup and
//! cleared on logout or when the backend answers 401.

use std::{collections::HashSet, fmt, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::{clock::Clock, error::Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    Admin,
    Doctor,
    Receptionist,
    WarehouseStaff,
    Patient,
}

impl Role {
    pub fn can_manage_schedule(&self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn can_take_payment(&self) -> bool {
        matches!(self, Role::Admin | Role::Receptionist | Role::Patient)
    }

    /// Path prefix used by role-scoped endpoints such as payments.
    pub fn api_segment(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Doctor => "doctor",
            Role::Receptionist => "receptionist",
            Role::WarehouseStaff => "warehouse-staff",
            Role::Patient => "patient",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Admin => "Admin",
            Role::Doctor => "Doctor",
            Role::Receptionist => "Receptionist",
            Role::WarehouseStaff => "WarehouseStaff",
            Role::Patient => "Patient",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: Option<String>,
    pub role: Option<Role>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

/// Where the session survives between runs.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> Result<Option<Session>>;
    async fn save(&self, session: &Session) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// JSON file holding `{token, role}`.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> Result<Option<Session>> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "Ignoring unreadable session file: {}", e);
                Ok(None)
            }
        }
    }

    async fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&self.path, serde_json::to_vec_pretty(session)?).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Default)]
pub struct MemorySessionStore {
    slot: Mutex<Option<Session>>,
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Result<Option<Session>> {
        Ok(self.slot.lock().await.clone())
    }

    async fn save(&self, session: &Session) -> Result<()> {
        *self.slot.lock().await = Some(session.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.slot.lock().await = None;
        Ok(())
    }
}

/// Application-wide context handed to the API client and commands.
#[derive(Clone)]
pub struct AppContext {
    session: Arc<RwLock<Session>>,
    store: Arc<dyn SessionStore>,
}

impl AppContext {
    /// Reads the persisted session. A JWT whose `exp` has passed is dropped
    /// (and the store cleared) rather than sent to the backend.
    pub async fn hydrate(store: Arc<dyn SessionStore>, clock: &dyn Clock) -> Result<Self> {
        let mut session = store.load().await?.unwrap_or_default();

        if let Some(token) = &session.token {
            if token_expired(token, clock.now_unix()) {
                tracing::info!("Stored token has expired; starting signed out");
                store.clear().await?;
                session = Session::default();
            }
        }

        Ok(Self {
            session: Arc::new(RwLock::new(session)),
            store,
        })
    }

    pub async fn login(&self, role: Role, token: String) -> Result<()> {
        let session = Session {
            token: Some(token),
            role: Some(role),
        };
        self.store.save(&session).await?;
        *self.session.write().await = session;
        tracing::info!(%role, "Signed in");
        Ok(())
    }

    pub async fn logout(&self) -> Result<()> {
        *self.session.write().await = Session::default();
        self.store.clear().await
    }

    pub async fn token(&self) -> Option<String> {
        self.session.read().await.token.clone()
    }

    pub async fn role(&self) -> Option<Role> {
        self.session.read().await.role
    }

    pub async fn session(&self) -> Session {
        self.session.read().await.clone()
    }
}

#[derive(Debug, Deserialize)]
struct ExpiryClaims {
    exp: Option<i64>,
}

/// Reads `exp` from a JWT without verifying it; the backend is the authority
/// on signatures. Tokens that are not JWTs never count as expired.
fn token_expired(token: &str, now: i64) -> bool {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();

    match decode::<ExpiryClaims>(token, &DecodingKey::from_secret(&[]), &validation) {
        Ok(data) => data.claims.exp.is_some_and(|exp| exp <= now),
        Err(_) => false,
    }
}
