//! HTTP surface: JSON API routes plus the static front-end fallback

pub mod handlers;
mod server;
pub mod types;

pub use server::{AppState, ReproduceServer, create_router};
pub use types::{AnalyzeRequest, GenerateRequest, ImageResponse};
