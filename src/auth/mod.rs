//! Bearer token acquisition and caching.

pub mod credentials;
pub mod token;
