//! Session manager: binds requests to stored sessions and commits them back

use chrono::Utc;
use salvo_core::http::cookie::{self, Cookie};
use salvo_core::{Request, Response};
use serde_json::Value;
use std::sync::Arc;

use crate::config::{SameSite, SecureMode, SessionConfig};
use crate::error::SessionError;
use crate::id::{generate_id, hash_id};
use crate::session::{Rotation, Session, SessionData, DESTROYED_KEY, FLASH_KEY, TIMESTAMP_KEY};
use crate::signature::Signer;
use crate::store::{SessionStore, StoreOption};

const FORWARDED_PROTO: &str = "x-forwarded-proto";

struct ManagerInner {
    config: SessionConfig,
    store: Arc<dyn SessionStore>,
    signer: Signer,
}

/// Session manager
///
/// Cheap to clone; clones share the store and configuration.
///
/// The store only ever sees hashed identifiers (unless hashing is disabled)
/// and an identifier the store does not know is never adopted: the request
/// gets a fresh session instead, so a client cannot pick its own session id.
#[derive(Clone)]
pub struct Manager {
    inner: Arc<ManagerInner>,
}

impl Manager {
    /// Create a new manager over `store`
    pub fn new<S: SessionStore>(store: S, config: SessionConfig) -> Self {
        Self::with_shared_store(Arc::new(store), config)
    }

    /// Create a new manager over a store shared with other components
    pub fn with_shared_store(store: Arc<dyn SessionStore>, config: SessionConfig) -> Self {
        let signer = Signer::new(config.keys.clone());
        Self {
            inner: Arc::new(ManagerInner {
                config,
                store,
                signer,
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    fn generate_id(&self) -> String {
        match &self.inner.config.generate_id {
            Some(generator) => generator.generate(),
            None => generate_id(),
        }
    }

    fn hash_id(&self, raw_id: &str) -> String {
        if self.inner.config.disable_hash_id {
            raw_id.to_string()
        } else {
            hash_id(raw_id, &self.inner.config.secret)
        }
    }

    fn get_option(&self) -> StoreOption {
        StoreOption::new(self.inner.config.store_ttl()).with_rolling(self.inner.config.rolling)
    }

    fn set_option(&self) -> StoreOption {
        StoreOption::new(self.inner.config.store_ttl())
    }

    /// Decide the Secure flag for cookies answering `req`
    fn is_secure(&self, req: &Request) -> bool {
        match self.inner.config.secure {
            SecureMode::Never => false,
            SecureMode::Always => true,
            SecureMode::PreferTls => {
                if req.scheme().as_str() == "https" {
                    return true;
                }
                self.inner.config.trust_proxy
                    && req
                        .headers()
                        .get(FORWARDED_PROTO)
                        .and_then(|v| v.to_str().ok())
                        .is_some_and(|proto| proto.eq_ignore_ascii_case("https"))
            }
        }
    }

    /// Raw identifier carried by the request, if present and correctly signed
    fn raw_id_from_cookie(&self, req: &Request, name: &str) -> Option<String> {
        let value = req.cookie(name)?.value();
        if value.is_empty() {
            return None;
        }

        // URL decode the value in case a client or proxy encoded it
        let decoded = match urlencoding::decode(value) {
            Ok(d) => d.into_owned(),
            Err(_) => value.to_string(),
        };

        match self.inner.signer.decode(&decoded) {
            Ok(raw_id) => Some(raw_id.to_string()),
            Err(e) => {
                tracing::debug!("Ignoring session cookie {}: {}", name, e);
                None
            }
        }
    }

    fn fresh_session(&self, name: &str, secure: bool) -> Session {
        let raw_id = self.generate_id();
        Session {
            id: self.hash_id(&raw_id),
            raw_id,
            name: name.to_string(),
            secure,
            is_new: true,
            manager: Some(self.clone()),
            ..Default::default()
        }
    }

    /// Load the session named `name` for this request
    ///
    /// A missing, empty, badly signed or unknown cookie yields a new
    /// session. Store failures other than "not found" are returned as is.
    pub async fn get(&self, req: &Request, name: &str) -> Result<Session, SessionError> {
        let secure = self.is_secure(req);

        if let Some(raw_id) = self.raw_id_from_cookie(req, name) {
            let id = self.hash_id(&raw_id);
            match self.inner.store.get(&id, self.get_option()).await {
                Ok(data) => {
                    return Ok(Session {
                        id,
                        raw_id,
                        name: name.to_string(),
                        secure,
                        data,
                        manager: Some(self.clone()),
                        ..Default::default()
                    });
                }
                Err(SessionError::NotFound) => {
                    // never adopt an identifier the store does not know
                    tracing::debug!("Session {} not found, starting a new one", name);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(self.fresh_session(name, secure))
    }

    /// Persist the session and write its cookie to the response
    ///
    /// Must run before the response is sent.
    pub async fn save(&self, res: &mut Response, session: &mut Session) -> Result<(), SessionError> {
        if session.destroyed {
            if !session.deleted {
                self.inner.store.del(&session.id).await?;
                session.deleted = true;
            }
            if let Some(old_id) = session.rotation.as_mut().and_then(|r| r.old_id.take()) {
                self.inner.store.del(&old_id).await?;
            }
            self.remove_cookie(res, session);
            return Ok(());
        }

        let flash = match session.flash.as_ref() {
            Some(flash) if flash.changed() => Some(flash.encode()?),
            _ => None,
        };
        if let Some(encoded) = flash {
            if encoded.is_empty() {
                session.data.remove(FLASH_KEY);
            } else {
                session.data.insert_value(FLASH_KEY, Value::String(encoded));
            }
        }

        let persist = self.should_persist(session);
        if persist {
            session
                .data
                .insert_value(TIMESTAMP_KEY, Value::from(Utc::now().timestamp()));
            self.inner
                .store
                .set(&session.id, &session.data, self.set_option())
                .await?;
        }

        if let Some(old_id) = session.rotation.as_mut().and_then(|r| r.old_id.take()) {
            self.retire(&old_id).await?;
        }

        if self.should_set_cookie(session, persist) {
            self.set_cookie(res, session);
        }
        Ok(())
    }

    fn should_persist(&self, session: &Session) -> bool {
        if session.changed() {
            return true;
        }
        if session.is_new && self.inner.config.save_uninitialized {
            return true;
        }
        // a session never saved has no timestamp and is always due
        if !self.inner.config.resave {
            return false;
        }

        let last_save = session.data.get_i64(TIMESTAMP_KEY).unwrap_or(0);
        let resave_after = self.inner.config.resave_after.as_secs() as i64;
        Utc::now().timestamp() >= last_save.saturating_add(resave_after)
    }

    fn should_set_cookie(&self, session: &Session, persisted: bool) -> bool {
        if session.raw_id.is_empty() {
            return false;
        }
        session.changed() || self.inner.config.rolling || (session.is_new && persisted)
    }

    /// Deal with the record a rotation left behind
    async fn retire(&self, old_id: &str) -> Result<(), SessionError> {
        if self.inner.config.delete_old_session {
            return self.inner.store.del(old_id).await;
        }

        let mut tombstone = SessionData::new();
        tombstone.insert_value(TIMESTAMP_KEY, Value::from(0));
        tombstone.insert_value(DESTROYED_KEY, Value::from(Utc::now().timestamp_millis()));
        let opt = StoreOption::new(self.inner.config.retired_ttl());
        self.inner.store.set(old_id, &tombstone, opt).await
    }

    /// Delete the session record now; the cookie is cleared on save
    pub async fn destroy(&self, session: &mut Session) -> Result<(), SessionError> {
        if session.manager.is_none() {
            return Err(SessionError::Misuse("destroy"));
        }
        self.inner.store.del(&session.id).await?;
        session.destroyed = true;
        session.deleted = true;
        Ok(())
    }

    /// Give the session a new identifier, keeping its data
    ///
    /// Use when the user's privilege level changes. Only the first call per
    /// request rotates; the superseded record is handled on save.
    pub fn regenerate(&self, session: &mut Session) -> Result<(), SessionError> {
        if session.manager.is_none() {
            return Err(SessionError::Misuse("regenerate"));
        }
        if session.rotation.is_some() {
            return Ok(());
        }

        session.rotation = Some(Rotation {
            old_id: (!session.is_new).then(|| session.id.clone()),
            old_data: session.data.clone(),
        });
        session.raw_id = self.generate_id();
        session.id = self.hash_id(&session.raw_id);
        session.changed = true;
        Ok(())
    }

    /// Clear all session data and regenerate the identifier
    pub fn renew(&self, session: &mut Session) -> Result<(), SessionError> {
        if session.manager.is_none() {
            return Err(SessionError::Misuse("renew"));
        }
        session.clear();
        if let Some(flash) = session.flash.as_mut() {
            flash.clear();
        }
        self.regenerate(session)
    }

    fn set_cookie(&self, res: &mut Response, session: &Session) {
        let config = &self.inner.config;
        let value = self.inner.signer.encode(&session.raw_id);

        let mut cookie_builder = Cookie::build((session.name.clone(), value))
            .path(config.cookie_path.clone())
            .http_only(config.cookie_http_only)
            .secure(session.secure)
            .same_site(cookie_same_site(&config.cookie_same_site));

        if let Some(domain) = config.cookie_domain.clone() {
            cookie_builder = cookie_builder.domain(domain);
        }

        if let Some(max_age) = config.max_age.filter(|secs| *secs > 0) {
            cookie_builder = cookie_builder.max_age(cookie::time::Duration::seconds(max_age as i64));
        }

        res.add_cookie(cookie_builder.build());
    }

    /// Expire the session cookie immediately
    fn remove_cookie(&self, res: &mut Response, session: &Session) {
        let config = &self.inner.config;

        let mut cookie_builder = Cookie::build((session.name.clone(), String::new()))
            .path(config.cookie_path.clone())
            .http_only(config.cookie_http_only)
            .secure(session.secure)
            .max_age(cookie::time::Duration::ZERO);

        if let Some(domain) = config.cookie_domain.clone() {
            cookie_builder = cookie_builder.domain(domain);
        }

        res.add_cookie(cookie_builder.build());
    }
}

fn cookie_same_site(same_site: &SameSite) -> cookie::SameSite {
    match same_site {
        SameSite::Strict => cookie::SameSite::Strict,
        SameSite::Lax => cookie::SameSite::Lax,
        SameSite::None => cookie::SameSite::None,
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("config", &self.inner.config)
            .field("signed", &self.inner.signer.is_enabled())
            .finish()
    }
}
