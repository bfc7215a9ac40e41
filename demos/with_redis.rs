//! Redis session store example
//!
//! Sessions live in Redis under `sess:<hashed id>`, so several instances of
//! this server can share them. Transient Redis errors are retried.

use std::time::Duration;

use salvo::prelude::*;
use salvo_session_manager::{RedisStore, RetryStore, SecureMode, SessionConfig, SessionDepotExt, SessionHandler};
use serde::Serialize;

#[derive(Serialize, Default)]
struct JsonResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    counter: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'static str>,
}

#[handler]
async fn health() -> Json<JsonResponse> {
    Json(JsonResponse {
        status: Some("ok"),
        ..Default::default()
    })
}

#[handler]
async fn get_session_info(depot: &mut Depot) -> Json<serde_json::Value> {
    let session = depot.session().expect("Session not found");

    Json(serde_json::json!({
        "isNew": session.is_new(),
        "hijacked": session.hijacked(),
        "data": session.data(),
    }))
}

#[handler]
async fn set_data(req: &mut Request, depot: &mut Depot, res: &mut Response) -> Json<JsonResponse> {
    let session = depot.session_mut().expect("Session not found");

    let key = req
        .query::<String>("key")
        .unwrap_or_else(|| "testKey".to_string());
    let value = req
        .query::<String>("value")
        .unwrap_or_else(|| "testValue".to_string());

    if session.set(&key, &value).is_err() {
        res.status_code(StatusCode::BAD_REQUEST);
        return Json(JsonResponse::default());
    }

    Json(JsonResponse {
        action: Some("set"),
        key: Some(key),
        value: Some(serde_json::Value::String(value)),
        ..Default::default()
    })
}

#[handler]
async fn counter(depot: &mut Depot) -> Json<JsonResponse> {
    let session = depot.session_mut().expect("Session not found");

    let count = session.get::<i32>("counter").unwrap_or(0) + 1;
    if let Err(e) = session.set("counter", count) {
        tracing::warn!("Failed to store counter: {}", e);
    }

    Json(JsonResponse {
        action: Some("count"),
        counter: Some(count),
        ..Default::default()
    })
}

#[handler]
async fn clear_session(depot: &mut Depot) -> Json<JsonResponse> {
    let session = depot.session_mut().expect("Session not found");
    let status = match session.destroy() {
        Ok(()) => "destroyed",
        Err(_) => "detached",
    };

    Json(JsonResponse {
        action: Some("clear"),
        status: Some(status),
        ..Default::default()
    })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let redis_url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string());
    println!("Connecting to Redis at {}", redis_url);

    let store = RedisStore::from_url(&redis_url)
        .await
        .expect("Failed to connect to Redis");
    let store = RetryStore::new(store)
        .with_max_attempts(5)
        .with_backoff(Duration::from_millis(50));

    let secret = std::env::var("SESSION_SECRET").unwrap_or_else(|_| "keyboard cat".to_string());
    let config = SessionConfig::new(secret.as_str())
        .with_keys([secret.clone()])
        .with_secure(SecureMode::PreferTls)
        .with_trust_proxy(true)
        .with_max_age(86400)
        .with_delete_old_session(false);

    let router = Router::new()
        .push(Router::with_path("health").get(health))
        .push(
            Router::new()
                .hoop(SessionHandler::new(store, config))
                .push(Router::with_path("session").get(get_session_info))
                .push(Router::with_path("set").get(set_data))
                .push(Router::with_path("counter").get(counter))
                .push(Router::with_path("clear").get(clear_session)),
        );

    let port = std::env::var("PORT").unwrap_or_else(|_| "5800".to_string());
    let addr = format!("127.0.0.1:{}", port);

    let acceptor = TcpListener::new(addr.clone()).bind().await;
    println!("Server running at http://{}", addr);
    println!();
    println!("Endpoints:");
    println!("  GET /health     - Health check (no session)");
    println!("  GET /session    - Get session info");
    println!("  GET /set        - Set data (key=x&value=y)");
    println!("  GET /counter    - Increment counter");
    println!("  GET /clear      - Destroy session");

    Server::new(acceptor).serve(router).await;
}
