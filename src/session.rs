//! Header/Cookie Session State
//!
//! Tracks which outbound identity the workbench speaks with. In browser identity requests
//! carry the ambient cookie jar; in mobile identity they carry a set of header overrides
//! that simulate a mobile client. Switching to mobile captures the ambient cookies so that
//! switching back can reissue them.

use crate::error::SessionError;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Outbound header overrides installed by a mobile session
pub type HeaderOverrides = BTreeMap<String, String>;

/// Header whose value is the mobile client's cookie line
pub const MOBILE_COOKIE_HEADER: &str = "MOBILE-COOKIE";

/// Days a restored cookie lives for
pub const DEFAULT_COOKIE_TTL_DAYS: i64 = 10;

/// Injected cookie capability; the browser `document.cookie` equivalent.
pub trait CookieStore: Send + Sync {
    /// Ambient cookies as a `name=value; name=value` line.
    fn cookie_string(&self) -> String;

    fn get_cookie(&self, name: &str) -> Option<String>;

    /// Set a cookie. `None` TTL means a session cookie; a negative TTL expires it.
    fn set_cookie(&self, name: &str, value: &str, ttl_days: Option<i64>);

    fn delete_cookie(&self, name: &str) {
        self.set_cookie(name, "", Some(-1));
    }

    /// Delete-then-set when the cookie exists, plain set otherwise.
    fn override_or_set_cookie(&self, name: &str, value: &str, ttl_days: Option<i64>) {
        if self.get_cookie(name).is_some() {
            self.delete_cookie(name);
        }
        self.set_cookie(name, value, ttl_days);
    }
}

/// One stored cookie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCookie {
    pub value: String,
    pub expires: Option<DateTime<Utc>>,
}

impl StoredCookie {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires.map_or(true, |at| at > now)
    }
}

/// In-process cookie jar. Cookies are kept in name order.
#[derive(Debug, Default)]
pub struct MemoryCookieStore {
    cookies: RwLock<BTreeMap<String, StoredCookie>>,
}

impl MemoryCookieStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a jar from a `name=value; ...` line with session lifetime.
    pub fn from_cookie_string(line: &str) -> Self {
        let store = Self::new();
        for (name, value) in parse_cookie_string(line) {
            store.set_cookie(&name, &value, None);
        }
        store
    }

    pub fn from_entries(entries: BTreeMap<String, StoredCookie>) -> Self {
        Self {
            cookies: RwLock::new(entries),
        }
    }

    /// Live entries, for persistence.
    pub fn entries(&self) -> BTreeMap<String, StoredCookie> {
        let now = Utc::now();
        self.cookies
            .read()
            .iter()
            .filter(|(_, cookie)| cookie.is_live(now))
            .map(|(name, cookie)| (name.clone(), cookie.clone()))
            .collect()
    }
}

impl CookieStore for MemoryCookieStore {
    fn cookie_string(&self) -> String {
        let now = Utc::now();
        self.cookies
            .read()
            .iter()
            .filter(|(_, cookie)| cookie.is_live(now))
            .map(|(name, cookie)| format!("{}={}", name, cookie.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn get_cookie(&self, name: &str) -> Option<String> {
        let now = Utc::now();
        self.cookies
            .read()
            .get(name)
            .filter(|cookie| cookie.is_live(now))
            .map(|cookie| cookie.value.clone())
    }

    fn set_cookie(&self, name: &str, value: &str, ttl_days: Option<i64>) {
        let mut cookies = self.cookies.write();
        match ttl_days {
            Some(days) if days < 0 => {
                cookies.remove(name);
            }
            _ => {
                let expires = ttl_days.map(|days| Utc::now() + Duration::days(days));
                cookies.insert(
                    name.to_string(),
                    StoredCookie {
                        value: value.to_string(),
                        expires,
                    },
                );
            }
        }
    }
}

/// Split a `name=value; name=value` line into pairs. Segments without a name are skipped;
/// a segment without `=` is a cookie with an empty value.
pub fn parse_cookie_string(line: &str) -> Vec<(String, String)> {
    line.split(';')
        .filter_map(|segment| {
            let segment = segment.trim();
            if segment.is_empty() {
                return None;
            }
            let (name, value) = segment.split_once('=').unwrap_or((segment, ""));
            let name = name.trim();
            if name.is_empty() {
                None
            } else {
                Some((name.to_string(), value.to_string()))
            }
        })
        .collect()
}

/// Parse a `NAME=VALUE` header assignment.
pub fn parse_header_assignment(assignment: &str) -> Result<(String, String), SessionError> {
    match assignment.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(SessionError::InvalidHeader(assignment.to_string())),
    }
}

/// Active outbound identity
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum SessionIdentity {
    #[default]
    Browser,
    Mobile {
        headers: HeaderOverrides,
        /// Ambient cookies captured on activation; `None` when nothing was captured here.
        cookie_snapshot: Option<String>,
    },
}

impl SessionIdentity {
    pub fn is_mobile(&self) -> bool {
        matches!(self, SessionIdentity::Mobile { .. })
    }

    pub fn headers(&self) -> Option<&HeaderOverrides> {
        match self {
            SessionIdentity::Browser => None,
            SessionIdentity::Mobile { headers, .. } => Some(headers),
        }
    }

    /// The mobile client's cookie line, if one was supplied as a header.
    pub fn mobile_cookie(&self) -> Option<&str> {
        self.headers()
            .and_then(|headers| headers.get(MOBILE_COOKIE_HEADER))
            .map(String::as_str)
    }
}

/// Owner of the session identity and the only writer of header overrides
pub struct SessionState {
    identity: SessionIdentity,
    cookies: std::sync::Arc<dyn CookieStore>,
    cookie_ttl_days: i64,
}

impl SessionState {
    pub fn new(cookies: std::sync::Arc<dyn CookieStore>) -> Self {
        Self {
            identity: SessionIdentity::Browser,
            cookies,
            cookie_ttl_days: DEFAULT_COOKIE_TTL_DAYS,
        }
    }

    pub fn with_cookie_ttl_days(mut self, days: i64) -> Self {
        self.cookie_ttl_days = days;
        self
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn headers(&self) -> Option<&HeaderOverrides> {
        self.identity.headers()
    }

    pub fn is_mobile(&self) -> bool {
        self.identity.is_mobile()
    }

    pub fn cookie_store(&self) -> &std::sync::Arc<dyn CookieStore> {
        &self.cookies
    }

    /// Browser -> Mobile. Re-activating an already mobile session swaps the headers but
    /// keeps the cookies captured by the first activation.
    pub fn activate(&mut self, headers: HeaderOverrides) {
        let cookie_snapshot = match &self.identity {
            SessionIdentity::Mobile {
                cookie_snapshot: Some(existing),
                ..
            } => existing.clone(),
            _ => self.cookies.cookie_string(),
        };
        info!(
            header_count = headers.len(),
            captured_cookies = parse_cookie_string(&cookie_snapshot).len(),
            "mobile identity activated"
        );
        self.identity = SessionIdentity::Mobile {
            headers,
            cookie_snapshot: Some(cookie_snapshot),
        };
    }

    /// Mobile -> Browser, reissuing captured cookies. Returns how many were reissued.
    pub fn deactivate(&mut self) -> usize {
        let snapshot = match std::mem::take(&mut self.identity) {
            SessionIdentity::Mobile {
                cookie_snapshot, ..
            } => cookie_snapshot,
            SessionIdentity::Browser => None,
        };

        let mut restored = 0;
        if let Some(snapshot) = snapshot {
            for (name, value) in parse_cookie_string(&snapshot) {
                self.cookies
                    .override_or_set_cookie(&name, &value, Some(self.cookie_ttl_days));
                restored += 1;
            }
        }
        info!(restored, "browser identity restored");
        restored
    }

    /// Drop to browser identity without touching the cookie jar.
    pub fn clear(&mut self) {
        debug!("session identity cleared without cookie restore");
        self.identity = SessionIdentity::Browser;
    }

    /// Install an identity reconstructed elsewhere (snapshot restore, persisted state).
    pub fn install(&mut self, identity: SessionIdentity) {
        self.identity = identity;
    }
}
