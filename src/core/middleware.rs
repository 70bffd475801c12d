use crate::core::error::AppError;
use crate::features::rate_limits::models::{RateLimitDecision, RequestClass};
use crate::features::rate_limits::RateLimiter;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::prelude::*;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestId, RequestId};
use tracing::Span;
use uuid::Uuid;

/// Request ID generator using UUID v7 (time-ordered)
#[derive(Clone, Copy)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Custom MakeSpan that includes request_id in the tracing span
#[derive(Clone, Debug)]
pub struct MakeSpanWithRequestId;

impl<B> tower_http::trace::MakeSpan<B> for MakeSpanWithRequestId {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> Span {
        let request_id = request
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");

        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

pub fn cors_layer(allowed_origins: Vec<String>) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    // If origins list contains "*", allow any origin
    if allowed_origins.iter().any(|o| o == "*") {
        cors.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(AllowOrigin::list(origins))
    }
}

pub fn basic_auth_middleware(
    valid_credentials: Arc<String>,
) -> impl Fn(
    Request,
    Next,
)
    -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, Response>> + Send>>
       + Clone {
    move |req: Request, next: Next| {
        let credentials = valid_credentials.clone();
        Box::pin(async move {
            let auth_header = req
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|header| header.to_str().ok());

            if let Some(auth_header) = auth_header {
                if let Some(encoded) = auth_header.strip_prefix("Basic ") {
                    if let Ok(decoded) = BASE64_STANDARD.decode(encoded) {
                        if let Ok(creds) = String::from_utf8(decoded) {
                            if creds == *credentials {
                                return Ok(next.run(req).await);
                            }
                        }
                    }
                }
            }

            Err((
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, "Basic realm=\"Swagger UI\"")],
                "Unauthorized",
            )
                .into_response())
        })
    }
}

/// First address of `X-Forwarded-For`, else `X-Real-IP`
fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    let from_header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    from_header("x-forwarded-for").or_else(|| from_header("x-real-ip"))
}

/// `userId` query parameter, if any
fn query_user_id(req: &Request) -> Option<String> {
    req.uri().query()?.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        if key != "userId" {
            return None;
        }
        let value = urlencoding::decode(value).ok()?;
        let value = value.trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// Identity a request is rate limited under
fn rate_limit_key(req: &Request) -> String {
    if let Some(user_id) = query_user_id(req) {
        return format!("user:{}", user_id);
    }
    if let Some(ip) = forwarded_ip(req.headers()) {
        return format!("ip:{}", ip);
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| format!("ip:{}", addr.ip()))
        .unwrap_or_else(|| "ip:unknown".to_string())
}

/// Apply the read or write budget of the caller
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<dyn RateLimiter>>,
    req: Request,
    next: Next,
) -> Response {
    let key = rate_limit_key(&req);
    let class = RequestClass::from_method(req.method());

    match limiter.check(&key, class).await {
        RateLimitDecision::Allowed { .. } => next.run(req).await,
        RateLimitDecision::Limited { retry_after, limit } => {
            tracing::warn!(
                "Rate limit exceeded: key={}, class={}, limit={}",
                key,
                class.as_str(),
                limit
            );
            let mut response = AppError::RateLimitExceeded(format!(
                "Too many requests, retry in {} seconds",
                retry_after
            ))
            .into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::rate_limits::models::RateLimitRule;
    use crate::features::rate_limits::FixedWindowRateLimiter;
    use axum::{middleware::from_fn_with_state, routing::get, Router};
    use axum_test::TestServer;
    use std::time::Duration;

    fn request(uri: &str, headers: &[(&str, &str)]) -> Request {
        let mut builder = axum::http::Request::builder().uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(axum::body::Body::empty()).unwrap()
    }

    #[test]
    fn test_rate_limit_key_prefers_user_id() {
        let req = request(
            "/files/1?role=OWNER&userId=u%201",
            &[("x-forwarded-for", "10.0.0.1")],
        );
        assert_eq!(rate_limit_key(&req), "user:u 1");

        let req = request("/files/1", &[("x-forwarded-for", "10.0.0.1, 10.0.0.2")]);
        assert_eq!(rate_limit_key(&req), "ip:10.0.0.1");

        let req = request("/files/1?userId=", &[("x-real-ip", "10.0.0.3")]);
        assert_eq!(rate_limit_key(&req), "ip:10.0.0.3");

        assert_eq!(rate_limit_key(&request("/", &[])), "ip:unknown");
    }

    #[tokio::test]
    async fn test_rate_limit_middleware_returns_429_with_retry_after() {
        let limiter: Arc<dyn RateLimiter> = Arc::new(FixedWindowRateLimiter::new(
            RateLimitRule::new(5, Duration::from_secs(60)),
            RateLimitRule::new(1, Duration::from_secs(60)),
        ));
        let app = Router::new()
            .route("/ping", get(|| async { "pong" }).post(|| async { "pong" }))
            .layer(from_fn_with_state(limiter, rate_limit_middleware));
        let server = TestServer::new(app).unwrap();

        server.post("/ping?userId=u1").await.assert_status_ok();
        let limited = server.post("/ping?userId=u1").await;
        limited.assert_status(StatusCode::TOO_MANY_REQUESTS);
        assert!(limited.headers().contains_key(header::RETRY_AFTER));

        // reads have their own budget
        server.get("/ping?userId=u1").await.assert_status_ok();
        // other callers are unaffected
        server.post("/ping?userId=u2").await.assert_status_ok();
    }
}
