//! Turnstile - In-Memory Fixed-Window Rate Limiting
//!
//! This crate implements a per-process rate limiter that tracks request counts
//! per key in fixed time windows, plus a background sweeper that reclaims
//! expired keys. A small HTTP admission service exposes the limiter to callers
//! that identify themselves through reverse-proxy address headers.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
