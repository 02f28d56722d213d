//! Armtek HTTP transport.
//!
//! [`ArmtekClient`] sends authenticated requests and decodes JSON bodies.
//! [`StubTransport`] answers the same calls with synthesized data for
//! offline development. Both implement [`ArmtekTransport`], the seam the
//! search and profile services are written against.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::{Value, json};
use tracing::instrument;
use url::Url;

use super::session::{SessionStatus, detect_session_status, looks_like_html};
use super::{ArmtekError, Credentials};

/// Search endpoint.
pub const SEARCH_PATH: &str = "/api/ws_search/search";
/// Sales organizations available to the login.
pub const VKORG_LIST_PATH: &str = "/api/ws_user/getUserVkorgList";
/// Client structure for one sales organization.
pub const USER_INFO_PATH: &str = "/api/ws_user/getUserInfo";

/// Length of the body excerpt included in HTTP errors.
const ERROR_EXCERPT_CHARS: usize = 200;

/// Form or query parameters as `(name, value)` pairs.
pub type Params = [(&'static str, String)];

/// Transport used by the Armtek services.
///
/// Implementations return the decoded JSON body; envelope validation is the
/// caller's job.
#[async_trait]
pub trait ArmtekTransport: Send + Sync {
    /// Send a GET request with query parameters.
    async fn get(&self, path: &str, params: &Params) -> Result<Value, ArmtekError>;

    /// Send a form-encoded POST request.
    async fn post_form(&self, path: &str, form: &Params) -> Result<Value, ArmtekError>;
}

// =============================================================================
// Real client
// =============================================================================

/// Authenticated Armtek web-service client.
///
/// Cheap to clone. The underlying connection pool is released when the last
/// clone is dropped.
#[derive(Clone)]
pub struct ArmtekClient {
    inner: Arc<ArmtekClientInner>,
}

struct ArmtekClientInner {
    http: reqwest::Client,
    base_url: Url,
    credentials: Credentials,
}

impl std::fmt::Debug for ArmtekClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArmtekClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("login", &self.inner.credentials.login)
            .finish_non_exhaustive()
    }
}

/// Build the shared HTTP client with the request timeout applied.
///
/// # Errors
///
/// Returns `ArmtekError::Http` if the TLS backend cannot be initialized.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, ArmtekError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("elizabeth/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ArmtekError::Http(format!("failed to build HTTP client: {e}")))
}

impl ArmtekClient {
    /// Create a client with its own connection pool.
    ///
    /// # Errors
    ///
    /// Returns `ArmtekError::Http` if the base URL is invalid or the HTTP
    /// client cannot be built.
    pub fn new(
        base_url: &str,
        timeout: Duration,
        credentials: Credentials,
    ) -> Result<Self, ArmtekError> {
        Self::with_http(build_http_client(timeout)?, base_url, credentials)
    }

    /// Create a client on top of an existing `reqwest::Client`.
    ///
    /// # Errors
    ///
    /// Returns `ArmtekError::Http` if the base URL is invalid.
    pub fn with_http(
        http: reqwest::Client,
        base_url: &str,
        credentials: Credentials,
    ) -> Result<Self, ArmtekError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ArmtekError::Http(format!("invalid Armtek base URL {base_url}: {e}")))?;

        Ok(Self {
            inner: Arc::new(ArmtekClientInner {
                http,
                base_url,
                credentials,
            }),
        })
    }

    /// Login this client authenticates as.
    #[must_use]
    pub fn login(&self) -> &str {
        &self.inner.credentials.login
    }

    fn endpoint(&self, path: &str, params: &Params) -> Result<Url, ArmtekError> {
        let mut url = self
            .inner
            .base_url
            .join(path)
            .map_err(|e| ArmtekError::Http(format!("invalid Armtek path {path}: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("format", "json");
            for (name, value) in params {
                query.append_pair(name, value);
            }
        }
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, ArmtekError> {
        let credentials = &self.inner.credentials;
        let response = request
            .basic_auth(&credentials.login, Some(credentials.password.expose_secret()))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ArmtekError::Http(format!(
                "Armtek HTTP {}: {}",
                status.as_u16(),
                excerpt(&body)
            )));
        }

        decode_body(&body)
    }
}

#[async_trait]
impl ArmtekTransport for ArmtekClient {
    #[instrument(skip(self, params), fields(login = %self.login()))]
    async fn get(&self, path: &str, params: &Params) -> Result<Value, ArmtekError> {
        let url = self.endpoint(path, params)?;
        self.send(self.inner.http.get(url)).await
    }

    #[instrument(skip(self, form), fields(login = %self.login()))]
    async fn post_form(&self, path: &str, form: &Params) -> Result<Value, ArmtekError> {
        let url = self.endpoint(path, &[])?;
        let credentials = &self.inner.credentials;

        // The search endpoint also expects the credentials in the form body.
        let mut body: Vec<(&str, &str)> = Vec::with_capacity(form.len() + 2);
        if path == SEARCH_PATH {
            body.push(("LOGIN", credentials.login.as_str()));
            body.push(("PASSWORD", credentials.password.expose_secret()));
        }
        body.extend(form.iter().map(|(k, v)| (*k, v.as_str())));

        self.send(self.inner.http.post(url).form(&body)).await
    }
}

/// Decode a 2xx body, recognizing HTML login and challenge pages.
fn decode_body(body: &str) -> Result<Value, ArmtekError> {
    serde_json::from_str(body).map_err(|e| {
        if looks_like_html(body) {
            match detect_session_status(body) {
                SessionStatus::Ok => {
                    ArmtekError::ResponseFormat("received an HTML page instead of JSON".to_string())
                }
                status => ArmtekError::InteractiveLoginRequired(status),
            }
        } else {
            ArmtekError::ResponseFormat(format!("invalid JSON body: {e}: {}", excerpt(body)))
        }
    })
}

fn excerpt(body: &str) -> String {
    body.chars().take(ERROR_EXCERPT_CHARS).collect()
}

// =============================================================================
// Stub transport
// =============================================================================

/// Offline transport returning synthesized envelopes.
///
/// Every search yields exactly one non-analog offer whose `ARTID` is
/// `<PIN>-<BRAND>` (or `<PIN>-STUB` without a brand).
#[derive(Debug, Clone, Copy, Default)]
pub struct StubTransport;

impl StubTransport {
    fn search_response(form: &Params) -> Value {
        let field = |name: &str| {
            form.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let pin = field("PIN").unwrap_or_default();
        let label = field("BRAND").unwrap_or_else(|| "STUB".to_string());

        json!({
            "STATUS": 200,
            "MESSAGES": [],
            "RESP": {
                "ARRAY": [{
                    "PIN": pin,
                    "BRAND": label,
                    "NAME": format!("{pin} {label} (stub)"),
                    "ARTID": format!("{}-{}", pin.to_uppercase(), label.to_uppercase()),
                    "ANALOG": "",
                    "PARNR": "STUB",
                    "KEYZAK": "STB",
                    "RVALUE": "10",
                    "RETDAYS": "7",
                    "RDPRF": "1",
                    "MINBM": "1",
                    "VENSL": "0.99",
                    "PRICE": "0",
                    "WAERS": "RUB",
                    "PNOTE": "stub data",
                    "stub": true
                }]
            }
        })
    }
}

#[async_trait]
impl ArmtekTransport for StubTransport {
    async fn get(&self, path: &str, _params: &Params) -> Result<Value, ArmtekError> {
        match path {
            VKORG_LIST_PATH => Ok(json!({
                "STATUS": 200,
                "MESSAGES": [],
                "RESP": [{"VKORG": "STUB", "PROGRAM_NAME": "STUB"}]
            })),
            other => Err(ArmtekError::Http(format!("stub transport: no GET handler for {other}"))),
        }
    }

    async fn post_form(&self, path: &str, form: &Params) -> Result<Value, ArmtekError> {
        match path {
            SEARCH_PATH => Ok(Self::search_response(form)),
            USER_INFO_PATH => Ok(json!({
                "STATUS": 200,
                "MESSAGES": [],
                "RESP": {
                    "STRUCTURE": {
                        "KUNAG": "STUB",
                        "VKORG": "STUB",
                        "SORTL": "Stub customer",
                        "RG_TAB": [{"KUNNR": "STUB", "DEFAULT": "X"}],
                        "ZA_TAB": [],
                        "EXW_TAB": [],
                        "DOGOVOR_TAB": []
                    }
                }
            })),
            other => Err(ArmtekError::Http(format!("stub transport: no POST handler for {other}"))),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::armtek::PartialContext;
    use secrecy::SecretString;

    fn credentials() -> Credentials {
        Credentials::new("user", SecretString::from("hunter2-secret"), PartialContext::default())
            .unwrap()
    }

    #[test]
    fn test_endpoint_appends_format_and_params() {
        let client =
            ArmtekClient::new("https://ws.armtek.ru", Duration::from_secs(5), credentials())
                .unwrap();
        let url = client
            .endpoint(VKORG_LIST_PATH, &[("VKORG", "4000".to_string())])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://ws.armtek.ru/api/ws_user/getUserVkorgList?format=json&VKORG=4000"
        );
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let err = ArmtekClient::new("not a url", Duration::from_secs(5), credentials()).unwrap_err();
        assert!(matches!(err, ArmtekError::Http(_)));
    }

    #[test]
    fn test_debug_hides_password() {
        let client =
            ArmtekClient::new("https://ws.armtek.ru", Duration::from_secs(5), credentials())
                .unwrap();
        let debug = format!("{client:?}");
        assert!(debug.contains("user"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_decode_body_variants() {
        assert_eq!(decode_body("{\"STATUS\":200}").unwrap()["STATUS"], 200);
        assert!(matches!(
            decode_body("not json"),
            Err(ArmtekError::ResponseFormat(_))
        ));
        assert!(matches!(
            decode_body("<html><input id=\"login\"></html>"),
            Err(ArmtekError::InteractiveLoginRequired(SessionStatus::LoginRequired))
        ));
    }

    #[test]
    fn test_excerpt_is_bounded() {
        let long = "x".repeat(1000);
        assert_eq!(excerpt(&long).len(), ERROR_EXCERPT_CHARS);
    }

    #[tokio::test]
    async fn test_stub_search_synthesizes_artid() {
        let body = StubTransport
            .post_form(SEARCH_PATH, &[("PIN", "oc90".to_string())])
            .await
            .unwrap();
        assert_eq!(body["RESP"]["ARRAY"][0]["ARTID"], "OC90-STUB");

        let body = StubTransport
            .post_form(
                SEARCH_PATH,
                &[("PIN", "oc90".to_string()), ("BRAND", "Mahle".to_string())],
            )
            .await
            .unwrap();
        assert_eq!(body["RESP"]["ARRAY"][0]["ARTID"], "OC90-MAHLE");
    }
}
