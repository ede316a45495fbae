//! CORS response headers
//!
//! Applied to every relay response, preflight or not. The allow-origin value
//! comes from the configured `OriginPolicy`.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, header},
    middleware::Next,
    response::Response,
};

use crate::config::{CorsConfig, OriginPolicy};

pub const ALLOW_METHODS: &str = "GET,OPTIONS,PATCH,DELETE,POST,PUT";

pub const ALLOW_HEADERS: &str = "X-CSRF-Token, X-Requested-With, Accept, Accept-Version, \
Content-Length, Content-MD5, Content-Type, Date, X-Api-Version";

/// Middleware that stamps CORS headers onto the inner response
pub async fn apply_cors(
    State(cors): State<Arc<CorsConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let origin = request.headers().get(header::ORIGIN).cloned();
    let mut response = next.run(request).await;
    insert_cors_headers(&cors, origin.as_ref(), response.headers_mut());
    response
}

/// Write the CORS header set for a request with the given `Origin`
pub fn insert_cors_headers(cors: &CorsConfig, origin: Option<&HeaderValue>, headers: &mut HeaderMap) {
    match &cors.allow_origin {
        OriginPolicy::Any => {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("*"),
            );
        }
        OriginPolicy::Mirror => {
            if let Some(origin) = origin {
                headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
            }
            headers.append(header::VARY, HeaderValue::from_static("Origin"));
        }
        OriginPolicy::Exact(allowed) => match HeaderValue::from_str(allowed) {
            Ok(value) => {
                headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
            }
            Err(e) => tracing::warn!("Configured CORS origin is not a valid header value: {e}"),
        },
    }

    if cors.allow_credentials {
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
    }
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
}
