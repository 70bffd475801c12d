use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::core::config::RateLimitConfig;
use crate::features::rate_limits::models::{RateLimitDecision, RateLimitRule, RequestClass};

/// Admission control keyed by caller identity (or IP) and request class
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Charge one request for `key` and report whether it may proceed
    async fn check(&self, key: &str, class: RequestClass) -> RateLimitDecision;
}

#[derive(Debug, Clone)]
struct WindowState {
    count: u32,
    window_start: Instant,
}

/// In-process fixed-window limiter with separate read and write budgets
pub struct FixedWindowRateLimiter {
    read: RateLimitRule,
    write: RateLimitRule,
    states: RwLock<HashMap<(String, RequestClass), WindowState>>,
}

impl FixedWindowRateLimiter {
    pub fn new(read: RateLimitRule, write: RateLimitRule) -> Self {
        Self {
            read,
            write,
            states: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            RateLimitRule::new(config.read_max_requests, config.read_window),
            RateLimitRule::new(config.write_max_requests, config.write_window),
        )
    }

    fn rule(&self, class: RequestClass) -> RateLimitRule {
        match class {
            RequestClass::Read => self.read,
            RequestClass::Write => self.write,
        }
    }

    /// Drop windows that ended long ago
    pub async fn cleanup(&self) {
        let now = Instant::now();
        let horizon = self.read.window.max(self.write.window) * 2;
        let mut states = self.states.write().await;
        states.retain(|_, state| now.duration_since(state.window_start) < horizon);
    }
}

#[async_trait]
impl RateLimiter for FixedWindowRateLimiter {
    async fn check(&self, key: &str, class: RequestClass) -> RateLimitDecision {
        let rule = self.rule(class);
        let now = Instant::now();
        let mut states = self.states.write().await;

        let state = states
            .entry((key.to_string(), class))
            .or_insert_with(|| WindowState {
                count: 0,
                window_start: now,
            });

        if now.duration_since(state.window_start) >= rule.window {
            state.count = 0;
            state.window_start = now;
        }

        if state.count >= rule.max_requests {
            let elapsed = now.duration_since(state.window_start);
            let retry_after = rule.window.saturating_sub(elapsed).as_secs().max(1);
            return RateLimitDecision::Limited {
                retry_after,
                limit: rule.max_requests,
            };
        }

        state.count += 1;
        RateLimitDecision::Allowed {
            remaining: rule.max_requests.saturating_sub(state.count),
            limit: rule.max_requests,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn limiter(read: u32, write: u32, window: Duration) -> FixedWindowRateLimiter {
        FixedWindowRateLimiter::new(
            RateLimitRule::new(read, window),
            RateLimitRule::new(write, window),
        )
    }

    #[tokio::test]
    async fn test_limits_after_budget_is_spent() {
        let limiter = limiter(2, 1, Duration::from_secs(60));

        assert_eq!(
            limiter.check("u1", RequestClass::Read).await,
            RateLimitDecision::Allowed {
                remaining: 1,
                limit: 2
            }
        );
        assert!(matches!(
            limiter.check("u1", RequestClass::Read).await,
            RateLimitDecision::Allowed { remaining: 0, .. }
        ));
        match limiter.check("u1", RequestClass::Read).await {
            RateLimitDecision::Limited { retry_after, limit } => {
                assert_eq!(limit, 2);
                assert!(retry_after >= 1 && retry_after <= 60);
            }
            other => panic!("expected limited, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_budgets_are_separate_per_key_and_class() {
        let limiter = limiter(1, 1, Duration::from_secs(60));

        assert!(matches!(
            limiter.check("u1", RequestClass::Write).await,
            RateLimitDecision::Allowed { .. }
        ));
        assert!(matches!(
            limiter.check("u1", RequestClass::Write).await,
            RateLimitDecision::Limited { .. }
        ));
        assert!(matches!(
            limiter.check("u1", RequestClass::Read).await,
            RateLimitDecision::Allowed { .. }
        ));
        assert!(matches!(
            limiter.check("u2", RequestClass::Write).await,
            RateLimitDecision::Allowed { .. }
        ));
    }

    #[tokio::test]
    async fn test_window_resets() {
        let limiter = limiter(1, 1, Duration::from_millis(20));

        assert!(matches!(
            limiter.check("u1", RequestClass::Read).await,
            RateLimitDecision::Allowed { .. }
        ));
        assert!(matches!(
            limiter.check("u1", RequestClass::Read).await,
            RateLimitDecision::Limited { .. }
        ));

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(matches!(
            limiter.check("u1", RequestClass::Read).await,
            RateLimitDecision::Allowed { .. }
        ));
    }

    #[tokio::test]
    async fn test_cleanup_drops_stale_windows() {
        let limiter = limiter(5, 5, Duration::from_millis(5));
        limiter.check("u1", RequestClass::Read).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        limiter.cleanup().await;
        assert!(limiter.states.read().await.is_empty());
    }
}
