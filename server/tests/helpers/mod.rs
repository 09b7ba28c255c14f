//! Reusable test helpers for HTTP integration tests.
//!
//! Provides `TestApp` for building and sending requests through the full axum
//! router, backed by a real bot engine wired to a recording chat client and a
//! counting fulfillment invoker.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{self, Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use stars_server::api::{create_router, AppState};
use stars_server::bot::sessions::{OrderLedger, SessionKey, SessionStore};
use stars_server::bot::telegram::TelegramError;
use stars_server::bot::{ChatApi, Engine, EngineHandle};
use stars_server::config::Config;
use stars_server::fulfillment::{
    FulfillmentError, FulfillmentInvoker, FulfillmentPool, StarsAmount,
};
use stars_server::payments::signing;

// ============================================================================
// Test doubles
// ============================================================================

/// Chat client that records every outbound message.
#[derive(Default)]
pub struct RecordingChat {
    sent: Mutex<Vec<(i64, String)>>,
}

impl RecordingChat {
    /// Messages sent so far, in order.
    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatApi for RecordingChat {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }

    async fn set_webhook(&self, _: &str, _: Option<&str>) -> Result<(), TelegramError> {
        Ok(())
    }
}

/// What the fake automation answers.
#[derive(Debug, Clone, Copy)]
pub enum InvokerOutcome {
    Delivered,
    Declined,
    Errors,
}

/// Fulfillment invoker that records each call.
pub struct CountingInvoker {
    outcome: InvokerOutcome,
    calls: Mutex<Vec<(u64, String)>>,
}

impl CountingInvoker {
    pub fn new(outcome: InvokerOutcome) -> Self {
        Self {
            outcome,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(u64, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl FulfillmentInvoker for CountingInvoker {
    fn attempt_fulfillment(
        &self,
        quantity: StarsAmount,
        recipient: &str,
    ) -> Result<bool, FulfillmentError> {
        self.calls
            .lock()
            .unwrap()
            .push((quantity.get(), recipient.to_string()));
        match self.outcome {
            InvokerOutcome::Delivered => Ok(true),
            InvokerOutcome::Declined => Ok(false),
            InvokerOutcome::Errors => Err(FulfillmentError::Automation("browser crashed".into())),
        }
    }
}

// ============================================================================
// Test App
// ============================================================================

/// A test application wrapping the full axum router and a live engine.
pub struct TestApp {
    pub router: Router,
    pub config: Arc<Config>,
    pub chat: Arc<RecordingChat>,
    pub invoker: Arc<CountingInvoker>,
    pub sessions: SessionStore,
    pub ledger: OrderLedger,
}

impl TestApp {
    /// Create a test app whose automation always delivers.
    pub async fn new() -> Self {
        Self::build(Config::default_for_test(), InvokerOutcome::Delivered)
    }

    /// Create a test app with a specific automation outcome.
    pub async fn with_outcome(outcome: InvokerOutcome) -> Self {
        Self::build(Config::default_for_test(), outcome)
    }

    /// Create a test app with a custom config.
    pub async fn with_config(config: Config) -> Self {
        Self::build(config, InvokerOutcome::Delivered)
    }

    fn build(config: Config, outcome: InvokerOutcome) -> Self {
        let chat = Arc::new(RecordingChat::default());
        let invoker = Arc::new(CountingInvoker::new(outcome));
        let pool = FulfillmentPool::spawn(
            Arc::clone(&invoker) as Arc<dyn FulfillmentInvoker>,
            config.fulfillment_workers,
            config.fulfillment_queue_capacity,
        );
        let (engine, handle) = Engine::new(
            Arc::clone(&chat) as Arc<dyn ChatApi>,
            pool,
            config.engine_queue_capacity,
        );
        let sessions = engine.sessions();
        let ledger = engine.ledger();
        engine.spawn();

        let state = AppState::new(config.clone(), handle);
        Self {
            router: create_router(state),
            config: Arc::new(config),
            chat,
            invoker,
            sessions,
            ledger,
        }
    }

    /// Router whose engine has already stopped.
    pub fn without_engine() -> Router {
        let (handle, rx) = EngineHandle::channel(1);
        drop(rx);
        create_router(AppState::new(Config::default_for_test(), handle))
    }

    /// Build an HTTP request with the given method and URI.
    pub fn request(method: Method, uri: &str) -> http::request::Builder {
        Request::builder().method(method).uri(uri)
    }

    /// Send a request through the router via `tower::ServiceExt::oneshot`.
    pub async fn oneshot(&self, request: Request<Body>) -> Response<Body> {
        oneshot(&self.router, request).await
    }

    /// POST a signed IPN body.
    pub async fn post_ipn(&self, body: &str) -> Response<Body> {
        let signature = signing::sign_payload(&self.config.ipn_secret_key, body.as_bytes());
        let req = Self::request(Method::POST, "/payment-ipn")
            .header("x-signature", signature)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.oneshot(req).await
    }

    /// POST a text message from `user` to the chat webhook.
    pub async fn send_text(&self, user: &TestUser, update_id: i64, text: &str) -> Response<Body> {
        let req = Self::request(Method::POST, "/chat-webhook")
            .header("content-type", "application/json")
            .body(Body::from(text_update(user, update_id, text).to_string()))
            .unwrap();
        self.oneshot(req).await
    }

    /// Send several messages in order, asserting each is accepted.
    pub async fn converse(&self, user: &TestUser, texts: &[&str]) {
        for (i, text) in texts.iter().enumerate() {
            let resp = self.send_text(user, i as i64 + 1, text).await;
            assert_eq!(resp.status(), 200, "message {text:?} rejected");
        }
    }
}

/// Send a request through any router.
pub async fn oneshot(router: &Router, request: Request<Body>) -> Response<Body> {
    router
        .clone()
        .oneshot(request)
        .await
        .expect("oneshot request failed")
}

// ============================================================================
// Chat helpers
// ============================================================================

/// A Telegram user chatting privately with the bot.
pub struct TestUser {
    pub id: i64,
    pub username: Option<&'static str>,
}

impl TestUser {
    pub const fn session_key(&self) -> SessionKey {
        SessionKey {
            chat_id: self.id,
            user_id: self.id,
        }
    }
}

/// JSON for a private-chat text message update.
pub fn text_update(user: &TestUser, update_id: i64, text: &str) -> serde_json::Value {
    let mut from = serde_json::json!({
        "id": user.id,
        "is_bot": false,
        "first_name": "Test",
    });
    if let Some(username) = user.username {
        from["username"] = serde_json::json!(username);
    }
    serde_json::json!({
        "update_id": update_id,
        "message": {
            "message_id": update_id,
            "date": 1_700_000_000,
            "from": from,
            "chat": {"id": user.id, "type": "private"},
            "text": text,
        }
    })
}

// ============================================================================
// Response & timing helpers
// ============================================================================

/// Collect a response body as a UTF-8 string.
pub async fn body_to_string(response: Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to collect response body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("Response body is not UTF-8")
}

/// Collect a response body and parse it as JSON.
pub async fn body_to_json(response: Response<Body>) -> serde_json::Value {
    let body = body_to_string(response).await;
    serde_json::from_str(&body)
        .unwrap_or_else(|e| panic!("Failed to parse response as JSON: {e}\nBody: {body}"))
}

/// Poll until `check` holds; the engine processes asynchronously.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached within 5s");
}
