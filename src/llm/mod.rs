//! # Chat Capability
//!
//! Every language-model stage (classifier, captioner, interpreters,
//! synthesizer, chat reply) talks to one narrow trait: send a prompt,
//! optionally with an image, get text back. Prompt wording lives with the
//! stage; transport details live behind the trait.
//!
//! - [`openai`]: OpenAI-compatible `/chat/completions` over HTTP

pub mod openai;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::Result;

pub use openai::{OpenAiChatModel, OpenAiConfig};

/// Image sent alongside a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    pub mime: String,
    pub data: Vec<u8>,
}

impl ImageAttachment {
    /// Sniff the MIME type from the bytes, defaulting to JPEG.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        let mime = image::guess_format(&data)
            .map(|f| f.to_mime_type().to_string())
            .unwrap_or_else(|_| "image/jpeg".to_string());
        Self { mime, data }
    }

    /// `data:<mime>;base64,<payload>`
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.data))
    }
}

/// One completion request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub image: Option<ImageAttachment>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl ChatRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_image(mut self, image: ImageAttachment) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Text completion capability.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Complete one request. Failures are [`LabelbotError::Capability`](crate::error::LabelbotError::Capability).
    async fn complete(&self, request: ChatRequest) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_url_sniffs_png() {
        let png = crate::render::Bitmap::new(2, 2).to_png().unwrap();
        let att = ImageAttachment::from_bytes(png);
        assert_eq!(att.mime, "image/png");
        assert!(att.data_url().starts_with("data:image/png;base64,iVBOR"));
    }

    #[test]
    fn test_unknown_bytes_default_to_jpeg() {
        assert_eq!(ImageAttachment::from_bytes(vec![1, 2, 3]).mime, "image/jpeg");
    }
}
