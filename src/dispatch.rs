use crate::{
    fault::Mutation,
    session::{SessionState, Slot},
    types::FiredRequest,
};
use anyhow::{Context, Result};
use log::{debug, info};
use reqwest::Client;
use serde_json::Value;

/// Result of one request, already shaped into a log line.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub success: bool,
    /// HTTP status, `None` when the call never got a response.
    pub status: Option<u16>,
    pub mutation: Option<Mutation>,
    pub captured: Option<(Slot, String)>,
    pub message: String,
}

/// Issues requests and turns every result into an [`Outcome`].
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: Client,
}

impl Dispatcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .with_context(|| "Failed to build HTTP client.")?;
        Ok(Self { client })
    }

    /// Sends `req` once. `capture` names where a created id may sit in a
    /// success body and which session slot receives it.
    pub async fn dispatch(
        &self,
        req: &FiredRequest,
        capture: Option<(&str, Slot)>,
        session: &SessionState,
    ) -> Outcome {
        debug!("{} {} body={:?}", req.method, req.url, req.body);
        let mut builder = self.client.request(req.method.to_reqwest(), &req.url);
        if let Some(body) = &req.body {
            builder = builder.json(body);
        }
        let resp = match builder.send().await {
            Ok(resp) => resp,
            Err(e) => {
                debug!("{} failed before a response: {}", req.url, e);
                return outcome(req, false, None, None);
            }
        };
        let status = resp.status();
        if !status.is_success() {
            return outcome(req, false, Some(status.as_u16()), None);
        }
        let captured = match capture {
            Some((pointer, slot)) => match resp.json::<Value>().await {
                Ok(body) => extract_id(&body, pointer).map(|id| {
                    info!("{} = {}", slot, id);
                    session.set(slot, id.clone());
                    (slot, id)
                }),
                Err(e) => {
                    debug!("{} returned a body that is not JSON: {}", req.url, e);
                    None
                }
            },
            None => None,
        };
        outcome(req, true, Some(status.as_u16()), captured)
    }
}

fn extract_id(body: &Value, pointer: &str) -> Option<String> {
    match body.pointer(pointer)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn outcome(
    req: &FiredRequest,
    success: bool,
    status: Option<u16>,
    captured: Option<(Slot, String)>,
) -> Outcome {
    Outcome {
        success,
        status,
        mutation: req.mutation,
        captured,
        message: line(req, success, status),
    }
}

/// `<label> ✅ (<status>): <url>`, with `ERR` standing in for a missing status.
pub fn line(req: &FiredRequest, success: bool, status: Option<u16>) -> String {
    let marker = if success { "✅" } else { "❌" };
    let code = status.map_or_else(|| "ERR".to_string(), |s| s.to_string());
    let line = format!("{} {} ({}): {}", req.label, marker, code, req.url);
    match req.mutation {
        Some(m) => format!("🧪 [{}] {}", m, line),
        None => line,
    }
}
