//! HTTP middleware applied by the router builder.

pub mod security;

pub use security::security_headers;
