use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: String,
    pub tenant_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
    pub session_id: String,
    #[serde(default)]
    pub degraded: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub tenant_id: String,
    pub service: String,
    pub operation: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

/// Liveness report; breaker details are kept as raw JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub open_partitions: usize,
    #[serde(default)]
    pub breakers: Value,
}

impl Health {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[derive(Debug)]
pub enum SdkError {
    /// The request never produced a response.
    Http(reqwest::Error),
    /// The gateway answered with an error status.
    Api { status: StatusCode, body: ErrorBody },
    /// The response body did not match the expected shape.
    Decode(String),
}

impl std::fmt::Display for SdkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SdkError::Http(e) => write!(f, "HTTP error: {}", e),
            SdkError::Api { status, body } => {
                write!(f, "gateway returned {} ({}): {}", status, body.error, body.message)
            }
            SdkError::Decode(e) => write!(f, "decode error: {}", e),
        }
    }
}

impl std::error::Error for SdkError {}

impl From<reqwest::Error> for SdkError {
    fn from(e: reqwest::Error) -> Self {
        SdkError::Http(e)
    }
}

impl SdkError {
    /// Error kind reported by the gateway ("validation", "breaker_open", ...).
    pub fn kind(&self) -> Option<&str> {
        match self {
            SdkError::Api { body, .. } => Some(&body.error),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            SdkError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub struct GatewayClient {
    client: Client,
    base_url: String,
}

impl GatewayClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Send one message of a conversation.
    pub async fn chat(&self, tenant_id: &str, session_id: &str, message: &str) -> Result<ChatReply, SdkError> {
        let req = ChatRequest {
            message: message.to_string(),
            session_id: session_id.to_string(),
            tenant_id: tenant_id.to_string(),
        };
        self.post("/v1/chat", &req).await
    }

    /// Idempotent tool read; returns the `result` payload.
    pub async fn tool_read(&self, call: &ToolCall) -> Result<Value, SdkError> {
        let body: Value = self.post("/v1/tools/read", call).await?;
        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Non-idempotent tool write; returns the `result` payload.
    pub async fn tool_write(&self, call: &ToolCall) -> Result<Value, SdkError> {
        let body: Value = self.post("/v1/tools/write", call).await?;
        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }

    pub async fn health(&self) -> Result<Health, SdkError> {
        let resp = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        Self::decode(resp).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, SdkError> {
        let resp = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await?;
        Self::decode(resp).await
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, SdkError> {
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            let body = serde_json::from_str::<ErrorBody>(&text).unwrap_or(ErrorBody {
                error: "unknown".to_string(),
                message: text,
            });
            return Err(SdkError::Api { status, body });
        }

        serde_json::from_str(&text).map_err(|e| SdkError::Decode(e.to_string()))
    }
}
