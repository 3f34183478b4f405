//! Vision captioner: image in, short description out.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::classifier::ClassificationTag;
use super::deadline;
use crate::error::{LabelbotError, Result};
use crate::llm::{ChatModel, ChatRequest, ImageAttachment};

pub const CAPTION_PROMPT: &str = "What is in this image? Provide a brief description.";

const CAPTION_MAX_TOKENS: u32 = 300;

#[derive(Clone)]
pub struct Captioner {
    model: Arc<dyn ChatModel>,
    timeout: Duration,
}

impl Captioner {
    pub fn new(model: Arc<dyn ChatModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    /// Describe `image`. Every failure, timeouts included, is
    /// [`LabelbotError::CaptionUnavailable`].
    pub async fn caption(&self, tag: ClassificationTag, image: &[u8]) -> Result<String> {
        let request = ChatRequest::new(format!("{} {}", tag.prefix(), CAPTION_PROMPT))
            .with_image(ImageAttachment::from_bytes(image.to_vec()))
            .with_max_tokens(CAPTION_MAX_TOKENS);

        let caption = deadline("captioner", self.timeout, self.model.complete(request))
            .await
            .map_err(|e| LabelbotError::CaptionUnavailable(e.to_string()))?;
        let caption = caption.trim().to_string();
        if caption.is_empty() {
            return Err(LabelbotError::CaptionUnavailable("empty caption".to_string()));
        }
        debug!(chars = caption.len(), "caption ready");
        Ok(caption)
    }
}
