//! Basic example using in-memory session store

use std::time::Duration;

use salvo::prelude::*;
use salvo_session_manager::{MemoryStore, SessionConfig, SessionDepotExt, SessionHandler};

#[handler]
async fn index(depot: &mut Depot) -> String {
    let session = depot.session_mut().expect("Session not found");

    let views: i32 = session.get("views").unwrap_or(0);
    if let Err(e) = session.set("views", views + 1) {
        return format!("Failed to count view: {}", e);
    }

    let notices = session.flash().values("notice");
    let notices: Vec<String> = notices
        .into_iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();

    format!(
        "Hello! You have viewed this page {} time(s).\nNotices: {:?}",
        views + 1,
        notices
    )
}

#[handler]
async fn get_user(depot: &mut Depot) -> String {
    let session = depot.session().expect("Session not found");

    match session.get::<String>("user") {
        Some(user) => format!("Logged in as: {}", user),
        None => "Not logged in".to_string(),
    }
}

#[handler]
async fn login(req: &mut Request, depot: &mut Depot, res: &mut Response) -> String {
    let session = depot.session_mut().expect("Session not found");
    let username = req
        .query::<String>("name")
        .unwrap_or_else(|| "anonymous".to_string());

    // new identity, new identifier
    if let Err(e) = session.regenerate() {
        res.status_code(StatusCode::INTERNAL_SERVER_ERROR);
        return format!("Failed to rotate session: {}", e);
    }
    let saved = session
        .set("user", &username)
        .and_then(|_| session.flash().add("notice", format!("Welcome, {}", username)));
    if let Err(e) = saved {
        res.status_code(StatusCode::INTERNAL_SERVER_ERROR);
        return format!("Failed to log in: {}", e);
    }

    format!("User set to: {}", username)
}

#[handler]
async fn logout(depot: &mut Depot) -> &'static str {
    let session = depot.session_mut().expect("Session not found");

    // Drop the data and hand out a fresh identifier
    match session.renew() {
        Ok(()) => "Logged out successfully",
        Err(_) => "Nothing to log out from",
    }
}

#[handler]
async fn destroy_session(depot: &mut Depot) -> &'static str {
    let session = depot.session_mut().expect("Session not found");

    match session.destroy() {
        Ok(()) => "Session destroyed",
        Err(_) => "Session could not be destroyed",
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let store = MemoryStore::new();
    store.start_sweeper(Duration::from_secs(60));

    let config = SessionConfig::new("your-super-secret-key-change-in-production")
        .with_keys(["signing-key-2", "signing-key-1"])
        .with_max_age(3600)
        .with_idle_timeout(1800)
        .with_rolling(true);

    let router = Router::new()
        .hoop(SessionHandler::new(store, config))
        .get(index)
        .push(Router::with_path("user").get(get_user))
        .push(Router::with_path("login").get(login))
        .push(Router::with_path("logout").get(logout))
        .push(Router::with_path("destroy").get(destroy_session));

    let acceptor = TcpListener::new("127.0.0.1:5800").bind().await;
    println!("Server running at http://127.0.0.1:5800");
    println!("Try these endpoints:");
    println!("  GET /                 - View counter and flash notices");
    println!("  GET /user             - Get current user");
    println!("  GET /login?name=alice - Log in (rotates the session id)");
    println!("  GET /logout           - Renew the session");
    println!("  GET /destroy          - Destroy session");

    Server::new(acceptor).serve(router).await;
}
