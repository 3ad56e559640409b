//! Request metadata captured for audit records

use axum::{
    extract::{ConnectInfo, Request},
    http::{header, HeaderMap, Method},
};
use std::net::{IpAddr, SocketAddr};

/// Endpoint and client details of one request
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub path: String,
    pub method: Method,
    pub ip: Option<IpAddr>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn from_request(request: &Request) -> Self {
        let connect_ip = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        Self {
            path: request.uri().path().to_string(),
            method: request.method().clone(),
            ip: extract_ip_address(request.headers()).or(connect_ip),
            user_agent: request
                .headers()
                .get(header::USER_AGENT)
                .and_then(|h| h.to_str().ok())
                .map(|s| s.to_string()),
        }
    }
}

/// Client IP from proxy headers, X-Forwarded-For first
fn extract_ip_address(headers: &HeaderMap) -> Option<IpAddr> {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(forwarded_str) = forwarded.to_str() {
            if let Some(first_ip) = forwarded_str.split(',').next() {
                if let Ok(ip) = first_ip.trim().parse() {
                    return Some(ip);
                }
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            if let Ok(ip) = ip_str.trim().parse() {
                return Some(ip);
            }
        }
    }

    None
}
