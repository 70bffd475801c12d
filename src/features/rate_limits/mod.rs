//! Per-caller admission control.
//!
//! The limiter is injected into the HTTP middleware as a trait object and
//! never reaches the file service.

pub mod models;
pub mod services;

pub use services::{FixedWindowRateLimiter, RateLimiter};
