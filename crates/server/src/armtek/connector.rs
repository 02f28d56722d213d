//! Per-request transport construction.
//!
//! Credentials are resolved per user, so every search or discovery needs a
//! transport bound to them. [`HttpConnector`] shares one `reqwest::Client`
//! (and thus one connection pool) across all of them.

use std::sync::Arc;

use secrecy::SecretString;

use super::client::{ArmtekClient, ArmtekTransport, StubTransport, build_http_client};
use super::{ArmtekError, Credentials, PartialContext};
use crate::config::ArmtekConfig;

/// Placeholder identity used when the stub answers without real credentials.
const STUB_ACCOUNT: &str = "STUB";

/// Builds a transport for a set of credentials.
pub trait ArmtekConnector: Send + Sync {
    /// Transport authenticated as `credentials`.
    ///
    /// # Errors
    ///
    /// Returns `ArmtekError::Http` if the transport cannot be configured.
    fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn ArmtekTransport>, ArmtekError>;

    /// Whether connections are answered offline.
    fn is_stub(&self) -> bool {
        false
    }
}

/// Connector for the real web service, or the offline stub.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    http: reqwest::Client,
    base_url: String,
    stub: bool,
}

impl HttpConnector {
    /// # Errors
    ///
    /// Returns `ArmtekError::Http` if the HTTP client cannot be built.
    pub fn from_config(config: &ArmtekConfig) -> Result<Self, ArmtekError> {
        Ok(Self {
            http: build_http_client(config.timeout)?,
            base_url: config.base_url.clone(),
            stub: config.enable_stub,
        })
    }
}

impl ArmtekConnector for HttpConnector {
    fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn ArmtekTransport>, ArmtekError> {
        if self.stub {
            return Ok(Arc::new(StubTransport));
        }
        let client = ArmtekClient::with_http(self.http.clone(), &self.base_url, credentials.clone())?;
        Ok(Arc::new(client))
    }

    fn is_stub(&self) -> bool {
        self.stub
    }
}

/// Credentials accepted by the stub when nothing is configured.
#[must_use]
pub fn stub_credentials() -> Option<Credentials> {
    Credentials::new(
        STUB_ACCOUNT,
        SecretString::from(STUB_ACCOUNT),
        PartialContext {
            vkorg: Some(STUB_ACCOUNT.to_string()),
            kunnr_rg: Some(STUB_ACCOUNT.to_string()),
            ..PartialContext::default()
        },
    )
}
