//! Concrete provider backends
//!
//! All three speak the OpenAI-compatible chat-completions wire format
//! (Gemini through its compatibility endpoint), so the request and
//! response types live in `wire` and each provider module contributes
//! configuration, error sanitization, and capability differences.

pub mod gemini;
pub mod groq;
pub mod openai;
pub mod wire;

/// Mask an API key for safe display
#[must_use]
pub fn mask_api_key(key: &str) -> String {
    if key.len() <= 8 {
        return "****".to_string();
    }
    format!("{}...{}", &key[..4], &key[key.len() - 4..])
}
