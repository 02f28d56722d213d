//! Integration tests for Elizabeth.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p elizabeth-integration-tests
//! ```
//!
//! Every test starts two servers on ephemeral ports: a scripted stand-in for
//! the Armtek web service ([`FakeArmtek`]) and the Elizabeth API itself
//! ([`TestApp`]) with in-memory stores, wired to the stand-in through the
//! real HTTP client. No database or network access is needed.
//!
//! # Test Categories
//!
//! - `armtek_client` - transport behavior against the upstream
//! - `search_api` - search and history endpoints end to end
//! - `credentials_api` - account registration and context discovery
//! - `characteristics_api` - callback store

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use elizabeth_server::armtek::PartialContext;
use elizabeth_server::db::MemoryStore;
use elizabeth_server::{AppState, ServerConfig, routes};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;

/// Login configured as the server's default Armtek account.
pub const DEFAULT_LOGIN: &str = "demo@example.com";
/// Password configured as the server's default Armtek account.
pub const DEFAULT_PASSWORD: &str = "demo-password";
/// Sales organization of the default account.
pub const DEFAULT_VKORG: &str = "4000";
/// Payer of the default account.
pub const DEFAULT_KUNNR_RG: &str = "43232305";

/// How the fake upstream answers a path.
#[derive(Debug, Clone)]
pub enum Reply {
    /// 200 with a JSON body.
    Json(Value),
    /// 200 with an HTML body.
    Html(String),
    /// A non-2xx status with a plain-text body.
    Status(u16, String),
    /// A JSON body after a delay.
    Delayed(Duration, Value),
}

/// One request received by the fake upstream.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub form: HashMap<String, String>,
    pub authorization: Option<String>,
}

#[derive(Default)]
struct FakeState {
    replies: Mutex<HashMap<String, Reply>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Scripted stand-in for the Armtek web service.
#[derive(Clone)]
pub struct FakeArmtek {
    pub base_url: String,
    state: Arc<FakeState>,
}

impl FakeArmtek {
    /// Start the stand-in on an ephemeral port.
    ///
    /// Unscripted paths answer 404.
    ///
    /// # Errors
    ///
    /// Returns an error if no local port can be bound.
    pub async fn start() -> std::io::Result<Self> {
        let state = Arc::new(FakeState::default());
        let app = Router::new()
            .fallback(fake_handler)
            .with_state(state.clone());
        let addr = serve(app).await?;

        Ok(Self {
            base_url: format!("http://{addr}"),
            state,
        })
    }

    /// Script the answer for `path`, replacing any earlier one.
    pub fn reply(&self, path: &str, reply: Reply) -> &Self {
        self.state
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_string(), reply);
        self
    }

    /// Everything received so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Requests received for `path`.
    #[must_use]
    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }
}

async fn fake_handler(
    State(state): State<Arc<FakeState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    let query = uri.query().map(parse_pairs).unwrap_or_default();
    let form = std::str::from_utf8(&body).map(parse_pairs).unwrap_or_default();
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    state
        .requests
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(RecordedRequest {
            method,
            path: path.clone(),
            query,
            form,
            authorization,
        });

    let reply = state
        .replies
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&path)
        .cloned();

    match reply {
        Some(Reply::Json(body)) => axum::Json(body).into_response(),
        Some(Reply::Html(body)) => axum::response::Html(body).into_response(),
        Some(Reply::Status(code, body)) => (
            StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body,
        )
            .into_response(),
        Some(Reply::Delayed(delay, body)) => {
            tokio::time::sleep(delay).await;
            axum::Json(body).into_response()
        }
        None => (StatusCode::NOT_FOUND, format!("no reply scripted for {path}")).into_response(),
    }
}

fn parse_pairs(raw: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(raw.as_bytes())
        .into_owned()
        .collect()
}

/// A running Elizabeth API.
pub struct TestApp {
    pub base_url: String,
    pub client: reqwest::Client,
}

impl TestApp {
    /// Start the API against `upstream` with the default account configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot start.
    pub async fn start(upstream: &FakeArmtek) -> Result<Self, Box<dyn std::error::Error>> {
        Self::start_with(upstream, |_| {}).await
    }

    /// Like [`TestApp::start`], with a hook to adjust the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot start.
    pub async fn start_with(
        upstream: &FakeArmtek,
        configure: impl FnOnce(&mut ServerConfig),
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = test_config(upstream);
        configure(&mut config);

        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(config, store.clone(), store)?;
        let addr = serve(routes::app(state)).await?;

        Ok(Self {
            base_url: format!("http://{addr}"),
            client: reqwest::Client::new(),
        })
    }

    /// Absolute URL for an API path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Request builder authenticated as `user_id`.
    #[must_use]
    pub fn as_user(&self, method: reqwest::Method, path: &str, user_id: i32) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header(elizabeth_server::middleware::USER_ID_HEADER, user_id.to_string())
    }
}

/// Configuration pointing at `upstream`, with a short timeout and the
/// default account set.
#[must_use]
pub fn test_config(upstream: &FakeArmtek) -> ServerConfig {
    let mut config = ServerConfig::with_secret_key(SecretString::from(
        "integration-test-secret-key-0123456789abcdef",
    ));
    config.armtek.base_url.clone_from(&upstream.base_url);
    config.armtek.timeout = Duration::from_secs(2);
    config.armtek.default_login = Some((
        DEFAULT_LOGIN.to_string(),
        SecretString::from(DEFAULT_PASSWORD),
    ));
    config.armtek.default_context = PartialContext {
        vkorg: Some(DEFAULT_VKORG.to_string()),
        kunnr_rg: Some(DEFAULT_KUNNR_RG.to_string()),
        ..PartialContext::default()
    };
    config
}

async fn serve(app: Router) -> std::io::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "test server stopped");
        }
    });
    Ok(addr)
}

/// Successful Armtek envelope around `resp`.
#[must_use]
pub fn envelope(resp: Value) -> Value {
    json!({ "STATUS": 200, "MESSAGES": [], "RESP": resp })
}

/// A search row with the columns strict parsing requires.
#[must_use]
pub fn search_row(artid: &str, pin: &str, brand: &str, analog: bool) -> Value {
    json!({
        "PIN": pin,
        "BRAND": brand,
        "NAME": format!("{brand} {pin}"),
        "ARTID": artid,
        "ANALOG": if analog { "X" } else { "" },
        "PARNR": "1500",
        "KEYZAK": "MOV0005524",
        "RVALUE": "12",
        "RETDAYS": "14",
        "RDPRF": "1",
        "MINBM": "1",
        "VENSL": "95.5",
        "PRICE": "412.30",
        "WAERS": "RUB",
        "DLVDT": "20260311120000"
    })
}
