//! Scripted transport for unit tests.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use super::client::{ArmtekTransport, Params};
use super::connector::ArmtekConnector;
use super::{ArmtekError, Credentials};

/// One recorded request.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: &'static str,
    pub path: String,
    pub params: Vec<(String, String)>,
}

impl RecordedCall {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Replays canned bodies in order and records every request.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Value>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new(responses: impl IntoIterator<Item = Value>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    #[allow(clippy::unwrap_used)]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    #[allow(clippy::unwrap_used)]
    fn record(&self, method: &'static str, path: &str, params: &Params) -> Result<Value, ArmtekError> {
        self.calls.lock().unwrap().push(RecordedCall {
            method,
            path: path.to_string(),
            params: params
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect(),
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ArmtekError::Http("no scripted response left".to_string()))
    }
}

#[async_trait]
impl ArmtekTransport for ScriptedTransport {
    async fn get(&self, path: &str, params: &Params) -> Result<Value, ArmtekError> {
        self.record("GET", path, params)
    }

    async fn post_form(&self, path: &str, form: &Params) -> Result<Value, ArmtekError> {
        self.record("POST", path, form)
    }
}

/// Connector handing out one shared scripted transport.
///
/// Records the login of every connection.
pub struct ScriptedConnector {
    pub transport: Arc<ScriptedTransport>,
    logins: Mutex<Vec<String>>,
}

impl ScriptedConnector {
    pub fn new(responses: impl IntoIterator<Item = Value>) -> Self {
        Self {
            transport: Arc::new(ScriptedTransport::new(responses)),
            logins: Mutex::new(Vec::new()),
        }
    }

    #[allow(clippy::unwrap_used)]
    pub fn logins(&self) -> Vec<String> {
        self.logins.lock().unwrap().clone()
    }
}

impl ArmtekConnector for ScriptedConnector {
    #[allow(clippy::unwrap_used)]
    fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn ArmtekTransport>, ArmtekError> {
        self.logins.lock().unwrap().push(credentials.login.clone());
        Ok(self.transport.clone())
    }
}
