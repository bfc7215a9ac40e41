//! Session configuration

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Hijack windows a retired record outlives when sessions never expire
const RETIRED_WINDOWS: u32 = 10;
/// Floor for the retired record TTL
const MIN_RETIRED_TTL: Duration = Duration::from_millis(100);

/// Configuration for the session manager
///
/// Built once and handed to [`Manager::new`](crate::Manager::new); the
/// manager never mutates it.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Salt mixed into the hash that turns a raw identifier into a store key
    pub secret: Vec<u8>,

    /// Keys for signing cookies.
    /// The first key signs new cookies.
    /// All keys are tried when verifying (for key rotation).
    /// Empty disables signing.
    pub keys: Vec<Vec<u8>>,

    /// Name of the session cookie (default: "sess")
    pub cookie_name: String,

    /// Cookie path (default: "/")
    pub cookie_path: String,

    /// Cookie domain (default: None - current domain only)
    pub cookie_domain: Option<String>,

    /// HttpOnly flag for cookie (default: true)
    pub cookie_http_only: bool,

    /// When to set the Secure flag (default: never)
    pub secure: SecureMode,

    /// Honor `X-Forwarded-Proto` from a reverse proxy (default: false)
    pub trust_proxy: bool,

    /// SameSite attribute for cookie
    pub cookie_same_site: SameSite,

    /// Cookie max age in seconds (default: None = browser session cookie)
    pub max_age: Option<u64>,

    /// Store TTL in seconds, falls back to `max_age`.
    /// None or 0 stores without expiry.
    pub idle_timeout: Option<u64>,

    /// Persist new sessions that were never modified (default: false)
    pub save_uninitialized: bool,

    /// Write unmodified sessions back to the store (default: false)
    pub resave: bool,

    /// Minimum time between two resaves of an unmodified session
    pub resave_after: Duration,

    /// Extend the store TTL on every read and re-send the cookie on every
    /// request (default: false)
    pub rolling: bool,

    /// Delete the superseded record on regeneration instead of keeping a
    /// tombstone for hijack detection (default: false)
    pub delete_old_session: bool,

    /// Grace period after rotation during which replaying the old
    /// identifier is not reported as hijacked (default: 30s)
    pub hijack_window: Duration,

    /// Lifetime of the record kept after rotation.
    /// None falls back to the store TTL, or to ten hijack windows when
    /// sessions never expire.
    pub old_session_ttl: Option<Duration>,

    /// Use the raw identifier as the store key (default: false)
    pub disable_hash_id: bool,

    /// Custom identifier generator (default: 32 random bytes, base64url)
    pub generate_id: Option<IdGenerator>,
}

/// When the cookie gets the Secure flag
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecureMode {
    /// Never set
    Never,
    /// Set only when the request came over TLS, or through a trusted proxy
    /// that reports https
    PreferTls,
    /// Always set
    Always,
}

/// SameSite cookie attribute
#[derive(Clone, Debug, PartialEq)]
pub enum SameSite {
    /// Strict - cookie only sent for same-site requests
    Strict,
    /// Lax - cookie sent for same-site requests and top-level navigations
    Lax,
    /// None - cookie sent for all requests (requires Secure)
    None,
}

/// Shared identifier generator
#[derive(Clone)]
pub struct IdGenerator(Arc<dyn Fn() -> String + Send + Sync>);

impl IdGenerator {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn generate(&self) -> String {
        (self.0)()
    }
}

impl fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IdGenerator(..)")
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: Vec::new(),
            keys: Vec::new(),
            cookie_name: "sess".to_string(),
            cookie_path: "/".to_string(),
            cookie_domain: None,
            cookie_http_only: true,
            secure: SecureMode::Never,
            trust_proxy: false,
            cookie_same_site: SameSite::Lax,
            max_age: None,
            idle_timeout: None,
            save_uninitialized: false,
            resave: false,
            resave_after: Duration::ZERO,
            rolling: false,
            delete_old_session: false,
            hijack_window: Duration::from_secs(30),
            old_session_ttl: None,
            disable_hash_id: false,
            generate_id: None,
        }
    }
}

impl SessionConfig {
    /// Create a new session configuration with the given hashing secret
    pub fn new<S: Into<Vec<u8>>>(secret: S) -> Self {
        Self {
            secret: secret.into(),
            ..Default::default()
        }
    }

    /// Set the signing keys, primary first
    pub fn with_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Vec<u8>>,
    {
        self.keys = keys.into_iter().map(|k| k.into()).collect();
        self
    }

    /// Set the cookie name (default: "sess")
    pub fn with_cookie_name<S: Into<String>>(mut self, name: S) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Set the cookie path (default: "/")
    pub fn with_cookie_path<S: Into<String>>(mut self, path: S) -> Self {
        self.cookie_path = path.into();
        self
    }

    /// Set the cookie domain
    pub fn with_cookie_domain<S: Into<String>>(mut self, domain: S) -> Self {
        self.cookie_domain = Some(domain.into());
        self
    }

    /// Set the HttpOnly flag (default: true)
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.cookie_http_only = http_only;
        self
    }

    /// Set the Secure flag policy (default: never)
    pub fn with_secure(mut self, secure: SecureMode) -> Self {
        self.secure = secure;
        self
    }

    /// Trust `X-Forwarded-Proto` for [`SecureMode::PreferTls`]
    pub fn with_trust_proxy(mut self, trust: bool) -> Self {
        self.trust_proxy = trust;
        self
    }

    /// Set the SameSite attribute (default: Lax)
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.cookie_same_site = same_site;
        self
    }

    /// Set max age in seconds
    /// Pass None for session cookie (expires when browser closes)
    pub fn with_max_age(mut self, max_age: impl Into<Option<u64>>) -> Self {
        self.max_age = max_age.into();
        self
    }

    /// Set max age from Duration
    pub fn with_max_age_duration(mut self, duration: impl Into<Option<Duration>>) -> Self {
        self.max_age = duration.into().map(|d| d.as_secs());
        self
    }

    /// Set the store TTL in seconds (default: same as max age)
    pub fn with_idle_timeout(mut self, idle_timeout: impl Into<Option<u64>>) -> Self {
        self.idle_timeout = idle_timeout.into();
        self
    }

    /// Set whether to save uninitialized sessions (default: false)
    pub fn with_save_uninitialized(mut self, save: bool) -> Self {
        self.save_uninitialized = save;
        self
    }

    /// Set whether to write back unmodified sessions (default: false)
    pub fn with_resave(mut self, resave: bool) -> Self {
        self.resave = resave;
        self
    }

    /// Skip resaves until this long after the previous save
    pub fn with_resave_after(mut self, after: Duration) -> Self {
        self.resave_after = after;
        self
    }

    /// Set whether to extend expiry on every request (default: false)
    pub fn with_rolling(mut self, rolling: bool) -> Self {
        self.rolling = rolling;
        self
    }

    /// Set whether regeneration deletes the old record (default: false)
    pub fn with_delete_old_session(mut self, delete: bool) -> Self {
        self.delete_old_session = delete;
        self
    }

    /// Set the hijack grace window (default: 30s)
    pub fn with_hijack_window(mut self, window: Duration) -> Self {
        self.hijack_window = window;
        self
    }

    /// Set how long a rotated-away record is kept
    pub fn with_old_session_ttl(mut self, ttl: impl Into<Option<Duration>>) -> Self {
        self.old_session_ttl = ttl.into();
        self
    }

    /// Store sessions under their raw identifier (default: false)
    pub fn with_disable_hash_id(mut self, disable: bool) -> Self {
        self.disable_hash_id = disable;
        self
    }

    /// Replace the identifier generator
    pub fn with_id_generator<F>(mut self, f: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.generate_id = Some(IdGenerator::new(f));
        self
    }

    /// Get max age as Duration
    pub fn max_age_duration(&self) -> Option<Duration> {
        self.max_age.map(Duration::from_secs)
    }

    /// TTL handed to the store; zero means no expiry
    pub fn store_ttl(&self) -> Duration {
        self.idle_timeout
            .filter(|secs| *secs > 0)
            .or(self.max_age)
            .map(Duration::from_secs)
            .unwrap_or(Duration::ZERO)
    }

    /// TTL of the record left behind by a rotation; never zero
    pub fn retired_ttl(&self) -> Duration {
        let ttl = match self.old_session_ttl.filter(|ttl| !ttl.is_zero()) {
            Some(ttl) => ttl,
            None if !self.store_ttl().is_zero() => self.store_ttl(),
            None => self.hijack_window.saturating_mul(RETIRED_WINDOWS),
        };
        ttl.max(MIN_RETIRED_TTL)
    }
}
