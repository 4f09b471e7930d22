#![deny(missing_docs)]

//! Core library for embedding PDF, image, and JSON blobs into a Qdrant search index.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Blob decoding and section splitting.
pub mod extract;
/// Structured logging and tracing setup.
pub mod logging;
/// Embed metrics helpers.
pub mod metrics;
/// Qdrant search index integration.
pub mod qdrant;
/// The embed facade and its Qdrant-backed implementation.
pub mod service;
