//! Error types shared by the dispatch core.
//!
//! `BuildError` is raised while assembling handlers and is fatal to startup.
//! `ProxyError` is raised per request and always maps onto a well-formed
//! HTTP response.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Configuration problems detected while building a handler.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("missing required property '{0}'")]
    MissingProperty(&'static str),

    #[error("load balancer requires at least one node")]
    NoNodes,

    #[error("invalid upstream '{upstream}': {reason}")]
    InvalidUpstream { upstream: String, reason: String },

    #[error("invalid redirect root '{root}': {reason}")]
    InvalidRoot { root: String, reason: String },

    #[error("invalid priority rule for node {node}: {reason}")]
    InvalidRule { node: String, reason: String },
}

/// Failures while serving a single request.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("connecting to upstream {upstream} timed out after {timeout:?}")]
    ConnectTimeout { upstream: String, timeout: Duration },

    #[error("upstream {upstream} did not respond within {timeout:?}")]
    ReadTimeout { upstream: String, timeout: Duration },

    #[error("failed to connect to upstream {upstream}: {source}")]
    Connect {
        upstream: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("upstream {upstream} failed: {source}")]
    Upstream {
        upstream: String,
        #[source]
        source: hyper_util::client::legacy::Error,
    },

    #[error("response body from {upstream} aborted: {reason}")]
    Body { upstream: String, reason: String },

    #[error("cannot build upstream target: {0}")]
    InvalidTarget(String),

    #[error("priority evaluation failed: {0}")]
    Evaluator(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::ConnectTimeout { .. } | ProxyError::ReadTimeout { .. } => {
                StatusCode::GATEWAY_TIMEOUT
            }
            ProxyError::Connect { .. } | ProxyError::Upstream { .. } | ProxyError::Body { .. } => {
                StatusCode::BAD_GATEWAY
            }
            ProxyError::InvalidTarget(_) => StatusCode::BAD_REQUEST,
            ProxyError::Evaluator(_) | ProxyError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ProxyError::ConnectTimeout { .. } => "UPSTREAM_CONNECT_TIMEOUT",
            ProxyError::ReadTimeout { .. } => "UPSTREAM_READ_TIMEOUT",
            ProxyError::Connect { .. } => "UPSTREAM_UNREACHABLE",
            ProxyError::Upstream { .. } => "UPSTREAM_ERROR",
            ProxyError::Body { .. } => "UPSTREAM_BODY_ERROR",
            ProxyError::InvalidTarget(_) => "INVALID_TARGET",
            ProxyError::Evaluator(_) => "EVALUATOR_ERROR",
            ProxyError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the failure happened on the upstream side of the proxy.
    pub fn is_gateway_error(&self) -> bool {
        matches!(
            self.status_code(),
            StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT
        )
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = json!({
            "error": self.error_code(),
            "message": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}
