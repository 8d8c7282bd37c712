use std::{collections::BTreeMap, collections::HashMap, sync::Arc, time::Duration};

use reqwest::{
    StatusCode,
    header::{HeaderMap, SET_COOKIE},
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::profile::Profile;

/// Login endpoints in the order they are tried: current 3x-ui first, then the x-ui layout.
pub const LOGIN_PATHS: &[&str] = &["/login", "/xui/login"];

pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(20);

/// Cookies captured from a login response, keyed by cookie name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieSet(BTreeMap<String, String>);

impl CookieSet {
    /// Collects `name=value` pairs from every `Set-Cookie` header; attributes are dropped.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut out = BTreeMap::new();
        for value in headers.get_all(SET_COOKIE) {
            let Ok(raw) = value.to_str() else {
                continue;
            };
            let pair = raw.split(';').next().unwrap_or_default();
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            let (name, value) = (name.trim(), value.trim());
            if name.is_empty() || value.is_empty() {
                continue;
            }
            out.insert(name.to_string(), value.to_string());
        }
        Self(out)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Value for a `Cookie` request header, `None` when there is nothing to send.
    pub fn header_value(&self) -> Option<String> {
        if self.0.is_empty() {
            return None;
        }
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{k}={v}")).collect();
        Some(parts.join("; "))
    }
}

/// An authenticated handle for one panel: where to send requests and which cookies to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    base_url: String,
    cookies: CookieSet,
}

impl Session {
    pub fn new(base_url: impl Into<String>, cookies: CookieSet) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cookies,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn cookies(&self) -> &CookieSet {
        &self.cookies
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Process-wide cookie cache keyed by panel base URL.
///
/// Cloning shares the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Arc<Mutex<HashMap<String, CookieSet>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, base_url: &str) -> Option<CookieSet> {
        self.inner.lock().await.get(base_url).cloned()
    }

    pub async fn insert(&self, base_url: &str, cookies: CookieSet) {
        self.inner
            .lock()
            .await
            .insert(base_url.to_string(), cookies);
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginFailure {
    Status(u16),
    Transport(String),
}

impl std::fmt::Display for LoginFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Status(status) => write!(f, "status {status}"),
            Self::Transport(reason) => write!(f, "transport error: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginAttempt {
    pub path: String,
    pub failure: LoginFailure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    Authentication {
        profile: String,
        attempts: Vec<LoginAttempt>,
    },
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication { profile, attempts } => {
                write!(f, "login failed for profile {profile}")?;
                if !attempts.is_empty() {
                    let tried: Vec<String> = attempts
                        .iter()
                        .map(|a| format!("{}: {}", a.path, a.failure))
                        .collect();
                    write!(f, " ({})", tried.join("; "))?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for SessionError {}

/// Logs into panels and hands out cached sessions.
#[derive(Debug, Clone)]
pub struct SessionManager {
    client: reqwest::Client,
    store: SessionStore,
    login_timeout: Duration,
}

impl SessionManager {
    pub fn new(client: reqwest::Client, store: SessionStore) -> Self {
        Self {
            client,
            store,
            login_timeout: DEFAULT_LOGIN_TIMEOUT,
        }
    }

    pub fn with_login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Returns the cached session for the profile's panel, logging in first when nothing
    /// (or only an empty cookie set) is cached.
    ///
    /// Concurrent first logins for the same panel are not deduplicated; the last one wins.
    pub async fn ensure_session(&self, profile: &Profile) -> Result<Session, SessionError> {
        if let Some(cookies) = self.store.get(&profile.base_url).await
            && !cookies.is_empty()
        {
            return Ok(Session::new(&profile.base_url, cookies));
        }

        let cookies = self.login(profile).await?;
        self.store.insert(&profile.base_url, cookies.clone()).await;
        Ok(Session::new(&profile.base_url, cookies))
    }

    async fn login(&self, profile: &Profile) -> Result<CookieSet, SessionError> {
        let mut attempts = Vec::with_capacity(LOGIN_PATHS.len());

        for path in LOGIN_PATHS {
            let url = format!("{}{path}", profile.base_url);
            let form = [
                ("username", profile.username.as_str()),
                ("password", profile.password.as_str()),
            ];
            let res = self
                .client
                .post(url)
                .timeout(self.login_timeout)
                .form(&form)
                .send()
                .await;

            let failure = match res {
                Ok(resp) if matches!(resp.status(), StatusCode::OK | StatusCode::FOUND) => {
                    let cookies = CookieSet::from_headers(resp.headers());
                    info!(
                        profile = %profile.name,
                        path,
                        status = resp.status().as_u16(),
                        cookies = cookies.len(),
                        "panel login ok"
                    );
                    return Ok(cookies);
                }
                Ok(resp) => LoginFailure::Status(resp.status().as_u16()),
                Err(err) => LoginFailure::Transport(err.to_string()),
            };
            debug!(profile = %profile.name, path, %failure, "panel login candidate failed");
            attempts.push(LoginAttempt {
                path: path.to_string(),
                failure,
            });
        }

        warn!(profile = %profile.name, attempts = attempts.len(), "panel login failed");
        Err(SessionError::Authentication {
            profile: profile.name.clone(),
            attempts,
        })
    }
}
