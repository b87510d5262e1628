//! Response construction helpers.
//!
//! # Responsibilities
//! - Build redirect responses (302 temporary, 308 permanent)
//! - Answer "no content" handler results
//!
//! # Design Decisions
//! - 308 keeps the request method, so permanent redirects are safe for
//!   non-GET requests
//! - Redirect bodies are empty; the `Location` header carries the target

use axum::body::Body;
use axum::http::{header, HeaderValue, Response, StatusCode};

use crate::error::ProxyError;

/// Flavour of a redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    /// 302 Found; clients must not cache the target.
    Temporary,
    /// 308 Permanent Redirect.
    Permanent,
}

impl RedirectKind {
    pub fn status(self) -> StatusCode {
        match self {
            RedirectKind::Temporary => StatusCode::FOUND,
            RedirectKind::Permanent => StatusCode::PERMANENT_REDIRECT,
        }
    }
}

/// Build a redirect response toward `location`.
pub fn redirect(location: &str, kind: RedirectKind) -> Result<Response<Body>, ProxyError> {
    let value = HeaderValue::from_str(location)
        .map_err(|_| ProxyError::InvalidTarget(format!("invalid redirect location '{}'", location)))?;

    Response::builder()
        .status(kind.status())
        .header(header::LOCATION, value)
        .header(header::CONTENT_LENGTH, 0)
        .body(Body::empty())
        .map_err(|e| ProxyError::Internal(e.to_string()))
}

/// Response for handlers that produced no content.
pub fn no_content() -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NO_CONTENT;
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temporary_redirect() {
        let response = redirect("https://example.com/a?b=1", RedirectKind::Temporary).unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "https://example.com/a?b=1");
    }

    #[test]
    fn permanent_redirect() {
        let response = redirect("https://example.com/", RedirectKind::Permanent).unwrap();
        assert_eq!(response.status(), StatusCode::PERMANENT_REDIRECT);
    }

    #[test]
    fn invalid_location_is_rejected() {
        let err = redirect("https://example.com/\n", RedirectKind::Temporary).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
