//! Image provider backed by the Gemini `generateContent` HTTP API.
//!
//! Wraps the endpoint with [`reqwest`] and implements
//! [`gen_core::ImageProvider`] so the dispatcher can call it.

mod gemini;

pub use gemini::{GeminiConfig, GeminiProvider, extract_first_image, request_body};
