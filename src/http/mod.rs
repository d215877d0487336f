//! Resilient request sending.
//!
//! A sender chain is an ordered list of [`Layer`]s around a raw transport:
//!
//! ```text
//! LoggingLayer → RetryLayer → TimeoutLayer → ClassifyLayer → TokenLayer → transport
//! ```
//!
//! Only [`ApiError`](crate::error::ApiError) leaves the chain.
//!
//! [`Layer`]: sender::Layer

pub mod auth;
pub mod backoff;
pub mod classify;
pub mod logging;
pub mod request;
pub mod retry;
pub mod sender;
pub mod timeout;
pub mod transport;
