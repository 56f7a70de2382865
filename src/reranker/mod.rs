//! Reranker provider implementations.

pub mod http;

pub use http::{HttpRerankerConfig, HttpRerankerProvider};
