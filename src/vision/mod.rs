use async_trait::async_trait;

mod gemini;

pub use gemini::GeminiClient;

/// Instruction sent with every photo. The model is asked for a single JSON
/// object; [`NOT_FOOD_SENTINEL`] is the agreed answer for non-food images.
pub const FOOD_PROMPT: &str = r#"Identify this food and provide its name, calorie content, fat content, and energy value.
If this is not a food image, please respond with 'This is not a food image'.
Format the response as JSON with fields: food_name, calories, fat, energy.

IMPORTANT: Provide only numeric values (no text) for calories, fat, and energy fields.
If exact values are unknown, provide your best estimate as a single number.

For example: {"food_name": "Apple", "calories": 52, "fat": 0.2, "energy": 218}"#;

pub const NOT_FOOD_SENTINEL: &str = "this is not a food image";

/// An image ready to be sent inline.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub mime_type: &'static str,
    pub base64_data: String,
}

#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    /// Worth one more attempt: timeouts, connection errors, 429 and 5xx.
    #[error("transient vision service failure: {0}")]
    Transient(String),
    #[error("vision service failure: {0}")]
    Permanent(String),
}

impl VisionError {
    pub fn is_transient(&self) -> bool {
        matches!(self, VisionError::Transient(_))
    }
}

/// Multimodal model that turns a prompt plus an image into free text.
#[async_trait]
pub trait FoodVision: Send + Sync {
    async fn describe(&self, prompt: &str, image: &ImageInput) -> Result<String, VisionError>;
}
