//! Caller identity.
//!
//! Role and user id are trusted as supplied by the caller. The request
//! extractor in `core::extractor` is the only place that knows where they come
//! from, so a verifying implementation can replace it without touching the
//! file service.

pub mod model;

pub use model::{Requester, Role};
