//! Platform client error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("transport error calling {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned HTTP {status}: {message}")]
    Status {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("{endpoint}: not found ({message})")]
    NotFound { endpoint: String, message: String },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("failed to decode {endpoint} response: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unexpected {endpoint} response: {message}")]
    Unexpected { endpoint: String, message: String },

    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

impl PlatformError {
    /// The Platform reported that the addressed entity does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, PlatformError::NotFound { .. })
    }

    /// Classify a non-2xx response
    pub fn from_status(endpoint: &str, status: u16, body: &str) -> Self {
        let message = extract_message(body);
        match status {
            401 | 403 => PlatformError::Auth(format!("{}: {}", endpoint, message)),
            404 => PlatformError::NotFound {
                endpoint: endpoint.to_string(),
                message,
            },
            _ if message.to_ascii_lowercase().contains("not found") => PlatformError::NotFound {
                endpoint: endpoint.to_string(),
                message,
            },
            _ => PlatformError::Status {
                endpoint: endpoint.to_string(),
                status,
                message,
            },
        }
    }
}

/// Error bodies are either plain text or a JSON document carrying the
/// message under one of a few keys.
fn extract_message(body: &str) -> String {
    let trimmed = body.trim();
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(trimmed)
    {
        for key in ["message", "error", "msg", "detail"] {
            if let Some(serde_json::Value::String(msg)) = map.get(key) {
                return msg.clone();
            }
        }
    }
    if let Ok(serde_json::Value::String(msg)) = serde_json::from_str::<serde_json::Value>(trimmed) {
        return msg;
    }
    trimmed.to_string()
}

pub type Result<T> = std::result::Result<T, PlatformError>;
