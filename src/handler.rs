//! Session middleware for Salvo

use async_trait::async_trait;
use salvo_core::http::StatusCode;
use salvo_core::prelude::*;

use crate::config::SessionConfig;
use crate::depot_ext::SESSION_KEY;
use crate::manager::Manager;
use crate::session::Session;
use crate::store::SessionStore;

/// Session middleware for Salvo
///
/// Loads the session before the rest of the chain runs, exposes it through
/// [`SessionDepotExt`](crate::SessionDepotExt), and saves it once the chain
/// returns, before the response leaves.
#[derive(Clone, Debug)]
pub struct SessionHandler {
    manager: Manager,
}

impl SessionHandler {
    /// Create a new session handler
    pub fn new<S: SessionStore>(store: S, config: SessionConfig) -> Self {
        Self::from_manager(Manager::new(store, config))
    }

    /// Wrap an existing manager
    pub fn from_manager(manager: Manager) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Manager {
        &self.manager
    }
}

#[async_trait]
impl Handler for SessionHandler {
    async fn handle(&self, req: &mut Request, depot: &mut Depot, res: &mut Response, ctrl: &mut FlowCtrl) {
        let name = &self.manager.config().cookie_name;

        let session = match self.manager.get(req, name).await {
            Ok(session) => session,
            Err(e) => {
                // do not hand out a fresh session when the store may just be down
                tracing::error!("Failed to load session: {}", e);
                res.status_code(StatusCode::INTERNAL_SERVER_ERROR);
                ctrl.skip_rest();
                return;
            }
        };

        depot.insert(SESSION_KEY, session);

        // Continue with the request
        ctrl.call_next(req, depot, res).await;

        let Ok(mut session) = depot.remove::<Session>(SESSION_KEY) else {
            tracing::warn!("Session was taken out of the depot, nothing to save");
            return;
        };

        if let Err(e) = self.manager.save(res, &mut session).await {
            tracing::error!("Failed to save session: {}", e);
            res.status_code(StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::test_utils::RecordingStore;
    use crate::SessionDepotExt;
    use salvo::http::cookie::Cookie;
    use salvo::http::header::SET_COOKIE;
    use salvo::test::{ResponseExt, TestClient};

    const URL: &str = "http://127.0.0.1:5800";

    #[handler]
    async fn counter(depot: &mut Depot) -> String {
        let session = depot.session_mut().expect("session");
        let views: i32 = session.get("views").unwrap_or(0);
        session.set("views", views + 1).expect("encodable");
        (views + 1).to_string()
    }

    #[handler]
    async fn peek(depot: &mut Depot) -> String {
        let session = depot.session().expect("session");
        session.get::<i32>("views").unwrap_or(0).to_string()
    }

    #[handler]
    async fn regenerate(depot: &mut Depot) -> &'static str {
        depot.session_mut().expect("session").regenerate().expect("bound session");
        "ok"
    }

    #[handler]
    async fn logout(depot: &mut Depot) -> &'static str {
        depot.session_mut().expect("session").destroy().expect("bound session");
        "bye"
    }

    fn service<S: SessionStore>(store: S, config: SessionConfig) -> Service {
        let router = Router::new()
            .hoop(SessionHandler::new(store, config))
            .get(counter)
            .push(Router::with_path("peek").get(peek))
            .push(Router::with_path("regenerate").get(regenerate))
            .push(Router::with_path("logout").get(logout));
        Service::new(router)
    }

    /// The session cookie written by `res`, as a `name=value` request header
    ///
    /// The response jar also holds the cookies the request carried, so only
    /// its delta and the serialized headers count.
    fn session_cookie(res: &Response) -> Option<String> {
        if let Some(cookie) = res.cookies().delta().find(|c| c.name() == "sess") {
            return Some(format!("sess={}", cookie.value()));
        }
        res.headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| Cookie::parse(v.to_string()).ok())
            .find(|c| c.name() == "sess")
            .map(|c| format!("sess={}", c.value()))
    }

    async fn get(service: &Service, path: &str, cookie: Option<&str>) -> (String, Response) {
        let mut client = TestClient::get(format!("{}{}", URL, path));
        if let Some(cookie) = cookie {
            client = client.add_header("cookie", cookie, true);
        }
        let mut res = client.send(service).await;
        let body = res.take_string().await.unwrap_or_default();
        (body, res)
    }

    #[tokio::test]
    async fn test_counter_across_requests() {
        let service = service(MemoryStore::new(), SessionConfig::new("secret"));

        let (body, res) = get(&service, "/", None).await;
        assert_eq!(body, "1");
        let cookie = session_cookie(&res).expect("cookie after first write");

        let (body, _) = get(&service, "/", Some(&cookie)).await;
        assert_eq!(body, "2");

        let (body, res) = get(&service, "/peek", Some(&cookie)).await;
        assert_eq!(body, "2");
        assert!(session_cookie(&res).is_none());
    }

    #[tokio::test]
    async fn test_unchanged_session_sets_no_cookie() {
        let store = MemoryStore::new();
        let service = service(store.clone(), SessionConfig::new("secret"));

        let (_, res) = get(&service, "/", None).await;
        let cookie = session_cookie(&res).unwrap();

        let (body, res) = get(&service, "/peek", Some(&cookie)).await;
        assert_eq!(body, "1");
        assert!(session_cookie(&res).is_none());
        assert!(res.headers().get(SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn test_anonymous_read_sets_no_cookie() {
        let service = service(MemoryStore::new(), SessionConfig::new("secret"));
        let (body, res) = get(&service, "/peek", None).await;
        assert_eq!(body, "0");
        assert!(session_cookie(&res).is_none());
    }

    #[tokio::test]
    async fn test_store_failure_is_server_error() {
        let store = RecordingStore::new();
        store.fail_next(1);
        let service = service(store, SessionConfig::new("secret"));

        let (body, res) = get(&service, "/", Some("sess=some-id")).await;
        assert_eq!(res.status_code, Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert_ne!(body, "1");
    }

    #[tokio::test]
    async fn test_regenerate_rotates_cookie() {
        let service = service(
            MemoryStore::new(),
            SessionConfig::new("secret").with_keys(["k1"]),
        );

        let (_, res) = get(&service, "/", None).await;
        let first = session_cookie(&res).unwrap();

        let (_, res) = get(&service, "/regenerate", Some(&first)).await;
        let second = session_cookie(&res).unwrap();
        assert_ne!(first, second);

        let (body, _) = get(&service, "/peek", Some(&second)).await;
        assert_eq!(body, "1");
    }

    #[tokio::test]
    async fn test_logout_clears_cookie() {
        let store = MemoryStore::new();
        let service = service(store.clone(), SessionConfig::new("secret"));

        let (_, res) = get(&service, "/", None).await;
        let cookie = session_cookie(&res).unwrap();
        assert_eq!(store.len(), 1);

        let (_, res) = get(&service, "/logout", Some(&cookie)).await;
        assert_eq!(session_cookie(&res).as_deref(), Some("sess="));
        assert!(store.is_empty());

        let (body, _) = get(&service, "/peek", Some(&cookie)).await;
        assert_eq!(body, "0");
    }
}
