use std::time::Duration;

use axum::http::Method;

/// Budget a request is charged against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestClass {
    Read,
    Write,
}

impl RequestClass {
    /// Mutating verbs use the write budget
    pub fn from_method(method: &Method) -> Self {
        match *method {
            Method::POST | Method::PUT | Method::PATCH | Method::DELETE => RequestClass::Write,
            _ => RequestClass::Read,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestClass::Read => "read",
            RequestClass::Write => "write",
        }
    }
}

/// Maximum requests per fixed window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitRule {
    pub const fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }
}

/// Outcome of charging one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed { remaining: u32, limit: u32 },
    Limited { retry_after: u64, limit: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_class_from_method() {
        for method in [Method::POST, Method::PUT, Method::PATCH, Method::DELETE] {
            assert_eq!(RequestClass::from_method(&method), RequestClass::Write);
        }
        for method in [Method::GET, Method::HEAD, Method::OPTIONS] {
            assert_eq!(RequestClass::from_method(&method), RequestClass::Read);
        }
    }
}
