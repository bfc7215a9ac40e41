//! # salvo-session-manager
//!
//! Server-side session management for the Salvo web framework.
//!
//! The browser only ever holds an opaque, optionally signed identifier.
//! Session data lives in a pluggable store under a hash of that identifier,
//! so a leaked store does not leak usable cookies.
//!
//! ## Features
//!
//! - **Signed identifiers**: HMAC-SHA256 over the raw id, verified against
//!   every configured key so keys can be rotated without logging users out
//! - **Hashed store keys**: the raw identifier never reaches the store
//! - **Safe rotation**: `regenerate` and `renew` retire the old record,
//!   optionally keeping a short-lived marker to detect hijacked cookies
//! - **Pluggable storage**: in-memory with a background sweeper, Redis, a
//!   retry wrapper, or a custom [`SessionStore`]
//! - **Flash messages**: one-shot values stored inside the session
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use salvo::prelude::*;
//! use salvo_session_manager::{MemoryStore, SessionConfig, SessionDepotExt, SessionHandler};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = MemoryStore::new();
//!     store.start_sweeper(std::time::Duration::from_secs(60));
//!
//!     let config = SessionConfig::new("your-secret-key")
//!         .with_keys(["signing-key"])
//!         .with_max_age(86400);
//!
//!     let router = Router::new()
//!         .hoop(SessionHandler::new(store, config))
//!         .get(index);
//!
//!     let acceptor = TcpListener::new("127.0.0.1:5800").bind().await;
//!     Server::new(acceptor).serve(router).await;
//! }
//!
//! #[handler]
//! async fn index(depot: &mut Depot) -> String {
//!     let session = depot.session_mut().unwrap();
//!     let views: i32 = session.get("views").unwrap_or(0);
//!     session.set("views", views + 1).unwrap();
//!     format!("views: {}", views + 1)
//! }
//! ```

pub mod codec;
pub mod config;
pub mod depot_ext;
pub mod error;
pub mod flash;
pub mod handler;
pub mod id;
pub mod manager;
pub mod session;
pub mod signature;
pub mod store;

#[cfg(test)]
mod test_utils;

pub use codec::{Codec, JsonCodec};
pub use config::{IdGenerator, SameSite, SecureMode, SessionConfig};
pub use depot_ext::SessionDepotExt;
pub use error::SessionError;
pub use flash::Flash;
pub use handler::SessionHandler;
pub use manager::Manager;
pub use session::{Session, SessionData};
pub use store::{MemoryStore, RetryStore, SessionStore, StoreOption};

#[cfg(feature = "redis-store")]
pub use store::RedisStore;
