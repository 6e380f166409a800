//! Tollgate - Fixed-Window Rate Limiting for HTTP APIs
//!
//! This crate implements per-route, per-caller admission control for HTTP
//! endpoints. Each request is keyed by its route and a caller identity (an
//! explicit user id, or the client address taken from proxy headers) and counted
//! against a fixed window. Denied requests get a `429` carrying enough state for
//! clients to back off correctly.
//!
//! Counters live in process memory behind the [`ratelimit::CounterStore`] trait.
//! Several replicas each enforce their own limit, so the effective limit is
//! `limit × replicas` until a shared store is plugged in.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
