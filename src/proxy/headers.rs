//! Header manipulation for forwarded requests and responses.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers in both directions
//! - Add Forwarded / X-Forwarded-* headers to upstream requests
//! - Rewrite upstream `Location` headers to the externally visible base
//!
//! # Design Decisions
//! - Headers named by `Connection` are hop-by-hop as well
//! - X-Forwarded-For is appended to, never replaced
//! - Forwarded follows RFC 7239 (`for`, `host`, `proto`)

use axum::http::header::{self, HeaderMap, HeaderValue};

use crate::net::RequestContext;

/// Headers that only apply to a single connection leg.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "upgrade-insecure-requests",
];

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_FORWARDED_HOST: &str = "x-forwarded-host";
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Whether `name` is a hop-by-hop header.
pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Remove hop-by-hop headers, including those listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect();

    for name in listed {
        headers.remove(name.as_str());
    }
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}

/// Add forwarding information about the original client.
pub fn append_forwarding(headers: &mut HeaderMap, ctx: Option<&RequestContext>, host: Option<&str>) {
    let proto = ctx.map(|c| c.endpoint.scheme()).unwrap_or("http");

    let mut forwarded = Vec::new();
    if let Some(ctx) = ctx {
        let ip = ctx.client.ip();
        if ip.is_ipv6() {
            forwarded.push(format!("for=\"[{}]\"", ip));
        } else {
            forwarded.push(format!("for={}", ip));
        }

        let mut chain: Vec<String> = headers
            .get_all(X_FORWARDED_FOR)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect();
        chain.push(ip.to_string());
        if let Ok(value) = HeaderValue::from_str(&chain.join(", ")) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }

    if let Some(host) = host {
        forwarded.push(format!("host=\"{}\"", host));
        if let Ok(value) = HeaderValue::from_str(host) {
            headers.insert(X_FORWARDED_HOST, value);
        }
    }

    forwarded.push(format!("proto={}", proto));
    headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static(proto));

    if let Ok(value) = HeaderValue::from_str(&forwarded.join(";")) {
        headers.append(header::FORWARDED, value);
    }
}

/// Point `Location` / `Content-Location` headers at `external_base` instead of the upstream.
pub fn rewrite_location(headers: &mut HeaderMap, upstream: &str, external_base: &str) {
    for name in [header::LOCATION, header::CONTENT_LOCATION] {
        let rewritten = headers
            .get(&name)
            .and_then(|v| v.to_str().ok())
            .and_then(|location| rewrite(location, upstream, external_base));

        if let Some(value) = rewritten.and_then(|r| HeaderValue::from_str(&r).ok()) {
            headers.insert(name, value);
        }
    }
}

fn rewrite(location: &str, upstream: &str, external_base: &str) -> Option<String> {
    let prefix_len = upstream.len();
    if location.len() < prefix_len || !location[..prefix_len].eq_ignore_ascii_case(upstream) {
        return None;
    }

    let rest = &location[prefix_len..];
    match rest.chars().next() {
        None | Some('/') | Some('?') | Some('#') => Some(format!("{}{}", external_base, rest)),
        _ => None,
    }
}
