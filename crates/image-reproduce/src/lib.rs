//! Image Reproduce - relay between a browser UI and a multimodal LLM API
//!
//! Streams image analyses back as Server-Sent-Events, generates images
//! with a bounded number of attempts and serves the static front-end.

pub mod api;
pub mod assets;
pub mod config;
pub mod error;
pub mod image;
pub mod relay;
pub mod testing;
pub mod upstream;

pub use error::{ReproduceError, Result};
